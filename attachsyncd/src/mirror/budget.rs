use std::ops::ControlFlow;

pub const DEFAULT_UPLOAD_BUDGET: u32 = 10;

/// Signal that the run used up its uploads and must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExhausted;

/// Caps the number of uploads a single run may perform.
#[derive(Debug, Clone)]
pub struct UploadGate {
    limit: u32,
    remaining: u32,
}

impl UploadGate {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Accounts for one completed upload.
    pub fn consume_one(&mut self) -> ControlFlow<BudgetExhausted> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            ControlFlow::Break(BudgetExhausted)
        } else {
            ControlFlow::Continue(())
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn used(&self) -> u32 {
        self.limit - self.remaining
    }
}

impl Default for UploadGate {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_BUDGET)
    }
}
