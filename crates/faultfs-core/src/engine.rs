//! Decision engine: whether a slot's fault fires on this call.
//!
//! The [`DecisionEngine`] pairs the process-wide [`FaultSpec`] with a shared
//! [`RandomSource`].  Hooks ask it once per call and per phase; an unarmed
//! slot answers `false` without touching the random source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::FaultSpec;
use crate::faults::{FaultType, Slot};
use crate::random::{RandomSource, SeededRng};

/// Evaluate one slot against a spec.
///
/// Returns `false` without drawing when `slot` is not the armed slot.
/// Otherwise takes exactly one draw in `0..bound` (see
/// [`ProbabilityMode`](crate::config::ProbabilityMode)) and triggers when the
/// draw is below `percent`.
pub fn should_trigger(slot: Slot, spec: &FaultSpec, rng: &dyn RandomSource) -> bool {
    if spec.fault_type().slot() != slot {
        return false;
    }
    let draw = rng.below(spec.mode().draw_bound());
    draw < spec.percent()
}

/// Counters for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStats {
    pub slot: Slot,
    pub fault: FaultType,
    /// Decisions taken for this slot.
    pub evaluated: u64,
    /// Decisions that fired.
    pub triggered: u64,
}

/// Shared, thread-safe decision engine.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use faultfs_core::config::FaultSpec;
/// use faultfs_core::engine::DecisionEngine;
/// use faultfs_core::faults::{FaultType, OpKind, Slot};
/// use faultfs_core::random::SeededRng;
///
/// let spec = FaultSpec::new(FaultType::OpenFileEio, 0, Duration::ZERO).unwrap();
/// let engine = DecisionEngine::with_source(spec, Arc::new(SeededRng::from_seed(1)));
///
/// assert!(!engine.should_trigger(Slot::pre(OpKind::Open)));
/// assert!(!engine.should_trigger(Slot::post(OpKind::Open)));
/// assert_eq!(engine.stats_for(Slot::pre(OpKind::Open)).evaluated, 1);
/// ```
pub struct DecisionEngine {
    spec: FaultSpec,
    rng: Arc<dyn RandomSource>,
    evaluated: [AtomicU64; 14],
    triggered: [AtomicU64; 14],
}

impl DecisionEngine {
    /// Engine with a clock-seeded generator.
    pub fn new(spec: FaultSpec) -> Self {
        Self::with_source(spec, Arc::new(SeededRng::from_time()))
    }

    /// Engine drawing from the given source.
    pub fn with_source(spec: FaultSpec, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            spec,
            rng,
            evaluated: std::array::from_fn(|_| AtomicU64::new(0)),
            triggered: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn spec(&self) -> &FaultSpec {
        &self.spec
    }

    /// The one slot that can ever fire.
    pub fn armed_slot(&self) -> Slot {
        self.spec.fault_type().slot()
    }

    pub fn is_armed(&self, slot: Slot) -> bool {
        self.armed_slot() == slot
    }

    /// Decide whether `slot` fires for the current call.
    pub fn should_trigger(&self, slot: Slot) -> bool {
        let idx = slot.index();
        self.evaluated[idx].fetch_add(1, Ordering::Relaxed);
        let fire = should_trigger(slot, &self.spec, self.rng.as_ref());
        if fire {
            self.triggered[idx].fetch_add(1, Ordering::Relaxed);
        }
        fire
    }

    pub fn stats_for(&self, slot: Slot) -> SlotStats {
        let idx = slot.index();
        SlotStats {
            slot,
            fault: slot.fault_type(),
            evaluated: self.evaluated[idx].load(Ordering::Relaxed),
            triggered: self.triggered[idx].load(Ordering::Relaxed),
        }
    }

    /// Counters for every slot, in slot-table order.
    pub fn stats(&self) -> Vec<SlotStats> {
        crate::policy::POLICY_TABLE
            .iter()
            .map(|p| self.stats_for(p.slot))
            .collect()
    }

    /// Total faults fired across all slots.
    pub fn faults_injected(&self) -> u64 {
        self.triggered
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("spec", &self.spec)
            .field("faults_injected", &self.faults_injected())
            .finish()
    }
}
