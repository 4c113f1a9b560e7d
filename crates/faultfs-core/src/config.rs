//! Fault configuration, fixed for the lifetime of the process.

use std::time::Duration;

use thiserror::Error;

use crate::faults::FaultType;

/// Errors from building a [`FaultSpec`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("unknown fault type code {0} (expected 0..=13)")]
    UnknownFaultType(i64),

    #[error("unknown fault type name {0:?}")]
    UnknownFaultName(String),

    #[error("percent {percent} out of range (max {max})")]
    PercentOutOfRange { percent: u32, max: u32 },

    #[error("fault type {0} needs a non-zero delay")]
    MissingDelay(FaultType),
}

/// How `percent` maps onto a random draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbabilityMode {
    /// Draw from `0..99` and trigger when `draw < percent`.  The scale is
    /// out of 99, not 100: `percent = 50` fires with probability 50/99,
    /// `98` with 98/99, and `99` on every call.
    #[default]
    Compatible,
    /// Draw from `0..100`; `percent` is a true percentage and `100` always
    /// fires.
    Exact,
}

impl ProbabilityMode {
    /// Size of the draw space.
    pub fn draw_bound(self) -> u32 {
        match self {
            ProbabilityMode::Compatible => 99,
            ProbabilityMode::Exact => 100,
        }
    }

    /// Largest accepted `percent`.
    pub fn max_percent(self) -> u32 {
        match self {
            ProbabilityMode::Compatible => 99,
            ProbabilityMode::Exact => 100,
        }
    }

    /// Probability that one armed evaluation triggers.
    pub fn trigger_probability(self, percent: u32) -> f64 {
        let bound = self.draw_bound();
        f64::from(percent.min(bound)) / f64::from(bound)
    }
}

/// The single armed fault: which slot, how often, and for delay slots how
/// long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSpec {
    fault_type: FaultType,
    percent: u32,
    delay: Duration,
    mode: ProbabilityMode,
}

impl FaultSpec {
    /// Build a spec in [`ProbabilityMode::Compatible`].
    pub fn new(fault_type: FaultType, percent: u32, delay: Duration) -> Result<Self, SpecError> {
        Self::with_mode(fault_type, percent, delay, ProbabilityMode::Compatible)
    }

    pub fn with_mode(
        fault_type: FaultType,
        percent: u32,
        delay: Duration,
        mode: ProbabilityMode,
    ) -> Result<Self, SpecError> {
        let max = mode.max_percent();
        if percent > max {
            return Err(SpecError::PercentOutOfRange { percent, max });
        }
        if fault_type.uses_delay() && delay.is_zero() {
            return Err(SpecError::MissingDelay(fault_type));
        }
        Ok(Self {
            fault_type,
            percent,
            delay,
            mode,
        })
    }

    pub fn fault_type(&self) -> FaultType {
        self.fault_type
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn mode(&self) -> ProbabilityMode {
        self.mode
    }

    /// Probability that an evaluation of the armed slot triggers.
    pub fn trigger_probability(&self) -> f64 {
        self.mode.trigger_probability(self.percent)
    }
}
