//! Slot policy table.
//!
//! Maps every (operation, phase) slot to the fault type that arms it and the
//! effect it has once triggered.  The hooks never branch on the fault type
//! themselves; they look their slot up here and hand the entry to one
//! generic apply routine.

use crate::faults::{Errno, FaultType, OpKind, Phase, Slot};

/// Fixed payload substituted for real file contents by an injected read
/// fault.
pub const INJECTED_READ_PAYLOAD: &[u8] = b"Hello FaultFS hooked error Data!\n";

/// What a triggered slot does to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// Pre phase: skip the real operation and fail with this error.
    /// Post phase: replace the real result with this error.
    Error(Errno),
    /// Block the calling thread for the configured delay, then continue.
    Delay,
    /// Replace the returned data with [`INJECTED_READ_PAYLOAD`].
    Substitute,
}

/// Policy entry for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    pub slot: Slot,
    pub fault: FaultType,
    pub injection: Injection,
    /// Only evaluated when the call's path is non-empty.
    pub requires_path: bool,
}

const fn entry(
    op: OpKind,
    phase: Phase,
    fault: FaultType,
    injection: Injection,
    requires_path: bool,
) -> SlotPolicy {
    SlotPolicy {
        slot: Slot::new(op, phase),
        fault,
        injection,
        requires_path,
    }
}

/// The full table, indexed by [`Slot::index`].
pub static POLICY_TABLE: [SlotPolicy; 14] = [
    entry(
        OpKind::Open,
        Phase::Pre,
        FaultType::OpenFileEio,
        Injection::Error(Errno::Io),
        false,
    ),
    entry(
        OpKind::Open,
        Phase::Post,
        FaultType::OpenFileEperm,
        Injection::Error(Errno::Perm),
        false,
    ),
    entry(
        OpKind::Read,
        Phase::Pre,
        FaultType::ReadFileDelay,
        Injection::Delay,
        false,
    ),
    entry(
        OpKind::Read,
        Phase::Post,
        FaultType::ReadFileErr,
        Injection::Substitute,
        false,
    ),
    entry(
        OpKind::Write,
        Phase::Pre,
        FaultType::WriteFileDelay,
        Injection::Delay,
        false,
    ),
    entry(
        OpKind::Write,
        Phase::Post,
        FaultType::WriteFileEnospc,
        Injection::Error(Errno::NoSpace),
        false,
    ),
    entry(
        OpKind::Mkdir,
        Phase::Pre,
        FaultType::MkdirEacces,
        Injection::Error(Errno::Access),
        false,
    ),
    entry(
        OpKind::Mkdir,
        Phase::Post,
        FaultType::MkdirEperm,
        Injection::Error(Errno::Perm),
        false,
    ),
    entry(
        OpKind::Rmdir,
        Phase::Pre,
        FaultType::RmdirEacces,
        Injection::Error(Errno::Access),
        false,
    ),
    entry(
        OpKind::Rmdir,
        Phase::Post,
        FaultType::RmdirEperm,
        Injection::Error(Errno::Perm),
        false,
    ),
    entry(
        OpKind::OpenDir,
        Phase::Pre,
        FaultType::OpenDirEacces,
        Injection::Error(Errno::Access),
        true,
    ),
    entry(
        OpKind::OpenDir,
        Phase::Post,
        FaultType::OpenDirEperm,
        Injection::Error(Errno::Perm),
        true,
    ),
    entry(
        OpKind::Fsync,
        Phase::Pre,
        FaultType::FsyncDelay,
        Injection::Delay,
        true,
    ),
    entry(
        OpKind::Fsync,
        Phase::Post,
        FaultType::FsyncEio,
        Injection::Error(Errno::Io),
        true,
    ),
];

/// Look up the policy for a slot.
pub fn policy(slot: Slot) -> &'static SlotPolicy {
    &POLICY_TABLE[slot.index()]
}
