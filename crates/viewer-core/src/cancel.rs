//! Cancellation for superseded page loads.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation flag shared between a load request and its worker.
///
/// All clones observe the same state. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Scale rounded to thousandths, so equal zoom levels compare equal.
pub fn scale_key(scale: f32) -> u32 {
    (scale.max(0.0) * 1000.0).round() as u32
}

/// Identity of one in-flight extraction for a page.
#[derive(Debug, Clone)]
pub struct PageLoadTicket {
    pub page: u32,
    pub scale_key: u32,
    pub generation: u64,
    token: CancellationToken,
}

impl PageLoadTicket {
    pub(crate) fn new(page: u32, scale: f32, generation: u64) -> Self {
        Self { page, scale_key: scale_key(scale), generation, token: CancellationToken::new() }
    }

    /// Token a worker can poll to stop early.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}
