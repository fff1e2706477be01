// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulator configuration.

/// Default per-work-item instruction budget.
pub const DEFAULT_MAX_STEPS: u64 = 1 << 24;

/// Execution knobs for a [`Simulator`](crate::Simulator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Run only the first and last work-group of each NDRange.
    pub quick_mode: bool,
    /// Instruction budget per work-item. Exceeding it is reported as a stuck kernel; `None`
    /// removes the limit.
    pub max_steps_per_work_item: Option<u64>,
    /// Report loads of bytes never written since allocation.
    pub track_uninitialized: bool,
    /// Report misaligned loads, stores, and pointer casts.
    pub check_alignment: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            quick_mode: false,
            max_steps_per_work_item: Some(DEFAULT_MAX_STEPS),
            track_uninitialized: false,
            check_alignment: true,
        }
    }
}

impl SimConfig {
    /// Enables or disables quick mode.
    #[must_use]
    pub fn with_quick_mode(mut self, quick: bool) -> Self {
        self.quick_mode = quick;
        self
    }

    /// Sets the per-work-item instruction budget.
    #[must_use]
    pub fn with_max_steps(mut self, limit: u64) -> Self {
        self.max_steps_per_work_item = Some(limit);
        self
    }

    /// Removes the instruction budget. A work-item that never returns then runs forever.
    #[must_use]
    pub fn without_step_limit(mut self) -> Self {
        self.max_steps_per_work_item = None;
        self
    }

    /// Enables or disables uninitialized-read reporting.
    #[must_use]
    pub fn with_uninitialized_tracking(mut self, on: bool) -> Self {
        self.track_uninitialized = on;
        self
    }

    /// Enables or disables alignment diagnostics.
    #[must_use]
    pub fn with_alignment_checks(mut self, on: bool) -> Self {
        self.check_alignment = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_finite() {
        let config = SimConfig::default();
        assert_eq!(config.max_steps_per_work_item, Some(DEFAULT_MAX_STEPS));
        assert_eq!(config.clone().with_max_steps(10).max_steps_per_work_item, Some(10));
        assert_eq!(config.without_step_limit().max_steps_per_work_item, None);
    }
}
