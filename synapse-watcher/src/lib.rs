//! Zookeeper-backed [`synapse_core::Watcher`].
//!
//! A [`ZookeeperWatcher`] watches one registry path, treating every
//! direct child as a backend server: the child's data is the server's
//! JSON payload (see [`wire`]), and the child list itself is the
//! membership set. Connection and watch-management detail lives in
//! [`root`] (session/children) and [`node`] (per-child data).

mod config;
mod node;
mod root;
mod session;
mod watcher;
mod wire;

pub use config::ZookeeperWatcherConfig;
pub use watcher::ZookeeperWatcher;
