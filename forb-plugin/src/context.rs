//! Evaluation Context

use forb_core::DEFAULT_PRECISION;

/// Evaluation context passed to expression constants and functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    /// Working precision in decimal digits
    pub precision: u32,
}

impl EvalContext {
    pub fn new() -> Self {
        Self { precision: DEFAULT_PRECISION }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision.max(1);
        self
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}
