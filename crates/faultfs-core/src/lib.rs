//! Two-phase fault injection hooks for a pass-through filesystem.
//!
//! A pass-through filesystem forwards every operation to a real directory.
//! This crate decides, around each forwarded call, whether the caller sees
//! the real result, an injected errno, an injected delay, or substituted
//! data.
//!
//! 1. **[`faults`]**: fault types, operation kinds, phases and slots
//! 2. **[`config`]**: the single, immutable [`FaultSpec`](config::FaultSpec)
//! 3. **[`policy`]**: what each (operation, phase) slot injects
//! 4. **[`random`]**: injectable thread-safe random sources
//! 5. **[`engine`]**: the per-call trigger decision
//! 6. **[`hooks`]**: the [`Hook`](hooks::Hook) trait and the fault-injecting
//!    implementation
//! 7. **[`host`]**: a reference pass-through host driving a hook over
//!    `std::fs`
//!
//! # Architecture
//!
//! ```text
//! Host (FUSE / PassthroughHost)    Hooks                  Engine
//! ─────────────────────────────    ─────                  ──────
//! pre_xxx(path, args)       ──→ apply_pre(slot)    ──→ should_trigger(slot)
//! real syscall (unless short-circuited)                   │
//! post_xxx(ret, ctx)        ──→ apply_post(slot)   ──→ RandomSource::below()
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod faults;
pub mod hooks;
pub mod host;
pub mod policy;
pub mod random;
