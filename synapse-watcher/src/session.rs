//! Bridges `zookeeper-async`'s synchronous [`Watcher`] callback to an
//! async `mpsc` channel, since every watch registered against the
//! client (session events, children-changed, data-changed) fires
//! exactly once and we want to `.await` the next one from a task.

use tokio::sync::mpsc;
use zookeeper_async::{Watcher, WatchedEvent};

/// A one-shot watch registration that forwards its single firing onto
/// an unbounded channel. Registered fresh for every `_w` call, since
/// zookeeper watches do not re-arm themselves.
#[derive(Clone)]
pub struct ChannelWatcher {
    sender: mpsc::UnboundedSender<WatchedEvent>,
}

impl ChannelWatcher {
    /// Construct a watcher paired with the receiver end a task should
    /// `.recv()` on for the next event.
    pub fn new() -> (ChannelWatcher, mpsc::UnboundedReceiver<WatchedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelWatcher { sender }, receiver)
    }
}

impl Watcher for ChannelWatcher {
    fn handle(&self, event: WatchedEvent) {
        // The receiver may already be gone (task cancelled between
        // registering the watch and the event firing); that's fine,
        // there's nothing left to notify.
        let _ = self.sender.send(event);
    }
}
