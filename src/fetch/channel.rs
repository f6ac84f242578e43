//! Async channel bridging fetch completions into the tick loop.
//!
//! Fetch futures run on the engine's task set; their results cross back
//! into synchronous engine state through this channel, drained once per
//! tick. The sender side is cloned into each spawned task.

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use crate::data::{CodeCatalog, FrameKey, FrameMetadata, RawCatalog};
use crate::fetch::service::FetchResult;

/// A completed fetch operation of any kind.
#[derive(Debug)]
pub enum FetchEvent {
    /// Full listing refresh finished.
    Listing(FetchResult<RawCatalog>),
    /// Code descriptor refresh finished.
    Codes(FetchResult<CodeCatalog>),
    /// One frame image fetch finished.
    Image {
        key: FrameKey,
        result: FetchResult<Vec<u8>>,
    },
    /// One frame metadata fetch finished.
    Metadata {
        key: FrameKey,
        result: FetchResult<FrameMetadata>,
    },
}

/// Channel for fetch completion events.
pub struct FetchChannel {
    sender: UnboundedSender<FetchEvent>,
    receiver: UnboundedReceiver<FetchEvent>,
}

impl FetchChannel {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Sender handle for a spawned fetch task.
    pub fn sender(&self) -> UnboundedSender<FetchEvent> {
        self.sender.clone()
    }

    /// Non-blocking receive for completed fetches.
    ///
    /// Returns `None` once the pending events are drained.
    pub fn try_recv(&mut self) -> Option<FetchEvent> {
        self.receiver.try_next().ok().flatten()
    }
}

impl Default for FetchChannel {
    fn default() -> Self {
        Self::new()
    }
}
