//! Selection generations.
//!
//! Every selection change advances a shared counter. Work started for an
//! older selection holds a [`SelectionToken`] and stops once the counter has
//! moved past it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The shared generation counter.
#[derive(Debug, Clone, Default)]
pub struct SelectionCounter {
    current: Arc<AtomicU32>,
}

impl SelectionCounter {
    /// Start a new generation and return its token.
    pub fn advance(&self) -> SelectionToken {
        let id = self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        SelectionToken {
            id,
            current: Arc::clone(&self.current),
        }
    }

    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    /// Token for the current generation.
    pub fn token(&self) -> SelectionToken {
        SelectionToken {
            id: self.current(),
            current: Arc::clone(&self.current),
        }
    }
}

/// One generation of the selection.
#[derive(Debug, Clone)]
pub struct SelectionToken {
    id: u32,
    current: Arc<AtomicU32>,
}

impl SelectionToken {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether no newer selection has been made since this token was issued.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.id
    }
}
