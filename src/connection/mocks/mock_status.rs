//! Mocked implementation of StatusSink for use in test

use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver};

use crate::connection::status::{Status, StatusSink};

/// Routes every status update into a channel
pub struct MockStatusSink(mpsc::UnboundedSender<Status>);

impl MockStatusSink {
    /// Constructor. Returns self and the RX side of the associated channel.
    pub fn new() -> (Self, UnboundedReceiver<Status>) {
        let (tx, rx) = unbounded_channel();
        (Self(tx), rx)
    }
}

impl StatusSink for MockStatusSink {
    fn on_status_changed(&self, status: &Status) {
        self.0.send(status.clone()).ok();
    }
}
