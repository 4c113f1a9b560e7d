//! Hook surface: one pre/post pair per intercepted operation.
//!
//! A host calls the pre-hook before the real operation and the post-hook
//! after it, moving the [`OpContext`] from one into the other:
//!
//! ```text
//! host ── pre_xxx(path, args) ──→ PreDecision ── short-circuit? ──→ caller
//!                                      │
//!                               real operation
//!                                      │
//! host ── post_xxx(ret, ctx)  ──→ PostDecision ── override? ──────→ caller
//! ```
//!
//! [`FaultHooks`] implements every method through the slot
//! [policy table](crate::policy), so all fourteen slots share one decision
//! path.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, trace};

use crate::config::FaultSpec;
use crate::context::OpContext;
use crate::engine::DecisionEngine;
use crate::faults::{Errno, OpKind, Slot};
use crate::policy::{policy, Injection, INJECTED_READ_PAYLOAD};

/// Result of a pre-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreDecision {
    /// The host must skip the real operation and reply with `error`
    /// (or `data`, if set).
    pub triggered: bool,
    /// Context to hand to the matching post-hook.
    pub ctx: OpContext,
    pub error: Option<Errno>,
    /// Short-circuit reply data.
    pub data: Option<Vec<u8>>,
    /// The hook blocked the call before returning.  The host still runs the
    /// real operation.
    pub delayed: bool,
}

impl PreDecision {
    pub fn passthrough(ctx: OpContext) -> Self {
        Self {
            triggered: false,
            ctx,
            error: None,
            data: None,
            delayed: false,
        }
    }

    pub fn outcome(&self) -> PreOutcome {
        if self.triggered {
            PreOutcome::ShortCircuited
        } else if self.delayed {
            PreOutcome::DelayedThenReal
        } else {
            PreOutcome::Passthrough
        }
    }
}

/// Result of a post-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDecision {
    /// The host must replace the real result with `error` and/or `data`.
    pub triggered: bool,
    pub data: Option<Vec<u8>>,
    pub error: Option<Errno>,
}

impl PostDecision {
    pub fn passthrough() -> Self {
        Self {
            triggered: false,
            data: None,
            error: None,
        }
    }

    pub fn outcome(&self) -> PostOutcome {
        if self.triggered {
            PostOutcome::Overridden
        } else {
            PostOutcome::Passthrough
        }
    }
}

/// Where a call went after its pre-hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreOutcome {
    ShortCircuited,
    DelayedThenReal,
    Passthrough,
}

/// Where a call went after its post-hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Overridden,
    Passthrough,
}

/// Callbacks a pass-through filesystem invokes around each real operation.
///
/// `ret` arguments are the real operation's return code: `0` on success or
/// a positive errno.  Every method defaults to passthrough, so an
/// implementation only overrides the operations it cares about.
pub trait Hook: Send + Sync {
    /// Called once before the filesystem starts serving.
    fn init(&self) {}

    fn pre_open(&self, path: &str, _flags: u32) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_open(&self, _ret: i32, _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }

    fn pre_read(&self, path: &str, _len: u64, _offset: u64) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_read(&self, _ret: i32, _buf: &[u8], _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }

    fn pre_write(&self, path: &str, _buf: &[u8], _offset: u64) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_write(&self, _ret: i32, _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }

    fn pre_mkdir(&self, path: &str, _mode: u32) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_mkdir(&self, _ret: i32, _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }

    fn pre_rmdir(&self, path: &str) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_rmdir(&self, _ret: i32, _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }

    fn pre_opendir(&self, path: &str) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_opendir(&self, _ret: i32, _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }

    fn pre_fsync(&self, path: &str, _flags: u32) -> PreDecision {
        PreDecision::passthrough(OpContext::new(path))
    }

    fn post_fsync(&self, _ret: i32, _ctx: OpContext) -> PostDecision {
        PostDecision::passthrough()
    }
}

/// Hook that never interferes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl Hook for NoopHook {}

/// Fault-injecting hooks driven by a [`DecisionEngine`].
#[derive(Debug, Clone)]
pub struct FaultHooks {
    engine: Arc<DecisionEngine>,
}

impl FaultHooks {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }

    /// Hooks over a clock-seeded engine.
    pub fn from_spec(spec: FaultSpec) -> Self {
        Self::new(Arc::new(DecisionEngine::new(spec)))
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    fn delay(&self) -> Duration {
        self.engine.spec().delay()
    }

    /// Decide and apply the pre-phase fault for `op`.
    fn apply_pre(&self, op: OpKind, path: &str) -> PreDecision {
        let slot = Slot::pre(op);
        let mut decision = PreDecision::passthrough(OpContext::new(path));
        if !self.fires(slot, &decision.ctx) {
            return decision;
        }
        match policy(slot).injection {
            Injection::Error(errno) => {
                info!("{slot}: returning {errno} for {}", decision.ctx);
                decision.triggered = true;
                decision.error = Some(errno);
            }
            Injection::Delay => {
                let delay = self.delay();
                info!("{slot}: sleeping {delay:?} for {}", decision.ctx);
                thread::sleep(delay);
                decision.delayed = true;
            }
            Injection::Substitute => {
                info!(
                    "{slot}: returning injected buffer ({} bytes) for {}",
                    INJECTED_READ_PAYLOAD.len(),
                    decision.ctx
                );
                decision.triggered = true;
                decision.data = Some(INJECTED_READ_PAYLOAD.to_vec());
            }
        }
        decision
    }

    /// Decide and apply the post-phase fault for `op`.
    fn apply_post(&self, op: OpKind, ctx: &OpContext) -> PostDecision {
        let slot = Slot::post(op);
        let mut decision = PostDecision::passthrough();
        if !self.fires(slot, ctx) {
            return decision;
        }
        match policy(slot).injection {
            Injection::Error(errno) => {
                info!("{slot}: returning {errno} for {ctx}");
                decision.triggered = true;
                decision.error = Some(errno);
            }
            Injection::Delay => {
                let delay = self.delay();
                info!("{slot}: sleeping {delay:?} for {ctx}");
                thread::sleep(delay);
            }
            Injection::Substitute => {
                info!(
                    "{slot}: returning injected buffer ({} bytes) for {ctx}",
                    INJECTED_READ_PAYLOAD.len()
                );
                decision.triggered = true;
                decision.data = Some(INJECTED_READ_PAYLOAD.to_vec());
            }
        }
        decision
    }

    fn fires(&self, slot: Slot, ctx: &OpContext) -> bool {
        if policy(slot).requires_path && ctx.is_root() {
            trace!("{slot}: skipped for root path");
            return false;
        }
        let fire = self.engine.should_trigger(slot);
        if !fire {
            trace!("{slot}: passthrough for {ctx}");
        }
        fire
    }
}

impl Hook for FaultHooks {
    fn init(&self) {
        let spec = self.engine.spec();
        info!(
            "fault hooks armed: {} at {} ({:?}), percent {}, delay {:?}",
            spec.fault_type(),
            spec.fault_type().slot(),
            spec.mode(),
            spec.percent(),
            spec.delay()
        );
    }

    fn pre_open(&self, path: &str, _flags: u32) -> PreDecision {
        self.apply_pre(OpKind::Open, path)
    }

    fn post_open(&self, _ret: i32, ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::Open, &ctx)
    }

    fn pre_read(&self, path: &str, _len: u64, _offset: u64) -> PreDecision {
        self.apply_pre(OpKind::Read, path)
    }

    fn post_read(&self, _ret: i32, _buf: &[u8], ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::Read, &ctx)
    }

    fn pre_write(&self, path: &str, _buf: &[u8], _offset: u64) -> PreDecision {
        self.apply_pre(OpKind::Write, path)
    }

    fn post_write(&self, _ret: i32, ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::Write, &ctx)
    }

    fn pre_mkdir(&self, path: &str, _mode: u32) -> PreDecision {
        self.apply_pre(OpKind::Mkdir, path)
    }

    fn post_mkdir(&self, _ret: i32, ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::Mkdir, &ctx)
    }

    fn pre_rmdir(&self, path: &str) -> PreDecision {
        self.apply_pre(OpKind::Rmdir, path)
    }

    fn post_rmdir(&self, _ret: i32, ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::Rmdir, &ctx)
    }

    fn pre_opendir(&self, path: &str) -> PreDecision {
        self.apply_pre(OpKind::OpenDir, path)
    }

    fn post_opendir(&self, _ret: i32, ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::OpenDir, &ctx)
    }

    fn pre_fsync(&self, path: &str, _flags: u32) -> PreDecision {
        self.apply_pre(OpKind::Fsync, path)
    }

    fn post_fsync(&self, _ret: i32, ctx: OpContext) -> PostDecision {
        self.apply_post(OpKind::Fsync, &ctx)
    }
}
