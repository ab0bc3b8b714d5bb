//! Redraw coalescing.
//!
//! Any number of redraw requests between two display refreshes collapse
//! into one pending redraw.  The redraw runs fast only if every request
//! folded into it asked for fast.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RedrawScheduler {
    pending: bool,
    fast: bool,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a request into the pending redraw. Returns `true` when this
    /// request scheduled a new redraw (the host should ask for a frame).
    pub fn request(&mut self, fast: bool) -> bool {
        if self.pending {
            self.fast &= fast;
            return false;
        }
        self.pending = true;
        self.fast = fast;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Take the pending redraw, returning its `fast` flag.
    pub fn take(&mut self) -> Option<bool> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(self.fast)
    }
}

// ===================================================================
// Tests
// ===================================================================
