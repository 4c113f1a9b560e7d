//! Fault type definitions for the pass-through filesystem.
//!
//! Every intercepted filesystem call passes through two hook phases.  Each
//! (operation, phase) pair is a *slot*, and each slot carries exactly one
//! [`FaultType`].  Only the configured fault type is ever armed; every other
//! slot stays inert for the whole process lifetime.

use std::fmt;
use std::io;
use std::str::FromStr;

use crate::config::SpecError;

/// Filesystem operations that can be intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Open,
    Read,
    Write,
    Mkdir,
    Rmdir,
    OpenDir,
    Fsync,
}

impl OpKind {
    /// All operation kinds, in slot-table order.
    pub const ALL: [OpKind; 7] = [
        OpKind::Open,
        OpKind::Read,
        OpKind::Write,
        OpKind::Mkdir,
        OpKind::Rmdir,
        OpKind::OpenDir,
        OpKind::Fsync,
    ];

    /// Lower-case name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Open => "open",
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Mkdir => "mkdir",
            OpKind::Rmdir => "rmdir",
            OpKind::OpenDir => "opendir",
            OpKind::Fsync => "fsync",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hook phase relative to the real operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Before the real operation runs.
    Pre,
    /// After the real operation has completed.
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pre => f.write_str("pre"),
            Phase::Post => f.write_str("post"),
        }
    }
}

/// One (operation, phase) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub op: OpKind,
    pub phase: Phase,
}

impl Slot {
    pub const fn new(op: OpKind, phase: Phase) -> Self {
        Self { op, phase }
    }

    pub const fn pre(op: OpKind) -> Self {
        Self::new(op, Phase::Pre)
    }

    pub const fn post(op: OpKind) -> Self {
        Self::new(op, Phase::Post)
    }

    /// Dense index in `0..14`: operations in [`OpKind::ALL`] order, pre
    /// before post.
    pub const fn index(self) -> usize {
        let phase = match self.phase {
            Phase::Pre => 0,
            Phase::Post => 1,
        };
        (self.op as usize) * 2 + phase
    }

    /// The fault type that arms this slot.
    pub fn fault_type(self) -> FaultType {
        crate::policy::policy(self).fault
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.phase, self.op)
    }
}

/// The fault injected by one slot.
///
/// Discriminants are the numeric codes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FaultType {
    /// `open` fails with `EIO` before touching the real file.
    OpenFileEio = 0,
    /// `open` runs, then its result is replaced with `EPERM`.
    OpenFileEperm = 1,
    /// `read` is delayed before running.
    ReadFileDelay = 2,
    /// `read` runs, then its data is replaced with a fixed payload.
    ReadFileErr = 3,
    /// `write` runs, then its result is replaced with `ENOSPC`.
    WriteFileEnospc = 4,
    /// `write` is delayed before running.
    WriteFileDelay = 5,
    /// `mkdir` fails with `EACCES` before touching the real directory.
    MkdirEacces = 6,
    /// `mkdir` runs, then its result is replaced with `EPERM`.
    MkdirEperm = 7,
    /// `rmdir` fails with `EACCES` before touching the real directory.
    RmdirEacces = 8,
    /// `rmdir` runs, then its result is replaced with `EPERM`.
    RmdirEperm = 9,
    /// `fsync` is delayed before running.
    FsyncDelay = 10,
    /// `fsync` runs, then its result is replaced with `EIO`.
    FsyncEio = 11,
    /// `opendir` fails with `EACCES` before touching the real directory.
    OpenDirEacces = 12,
    /// `opendir` runs, then its result is replaced with `EPERM`.
    OpenDirEperm = 13,
}

impl FaultType {
    /// All fault types in code order.
    pub const ALL: [FaultType; 14] = [
        FaultType::OpenFileEio,
        FaultType::OpenFileEperm,
        FaultType::ReadFileDelay,
        FaultType::ReadFileErr,
        FaultType::WriteFileEnospc,
        FaultType::WriteFileDelay,
        FaultType::MkdirEacces,
        FaultType::MkdirEperm,
        FaultType::RmdirEacces,
        FaultType::RmdirEperm,
        FaultType::FsyncDelay,
        FaultType::FsyncEio,
        FaultType::OpenDirEacces,
        FaultType::OpenDirEperm,
    ];

    /// Numeric configuration code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a fault type by its numeric code.
    pub fn from_code(code: i64) -> Result<Self, SpecError> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(SpecError::UnknownFaultType(code))
    }

    /// The slot this fault type arms.
    pub fn slot(self) -> Slot {
        use FaultType::*;
        match self {
            OpenFileEio => Slot::pre(OpKind::Open),
            OpenFileEperm => Slot::post(OpKind::Open),
            ReadFileDelay => Slot::pre(OpKind::Read),
            ReadFileErr => Slot::post(OpKind::Read),
            WriteFileEnospc => Slot::post(OpKind::Write),
            WriteFileDelay => Slot::pre(OpKind::Write),
            MkdirEacces => Slot::pre(OpKind::Mkdir),
            MkdirEperm => Slot::post(OpKind::Mkdir),
            RmdirEacces => Slot::pre(OpKind::Rmdir),
            RmdirEperm => Slot::post(OpKind::Rmdir),
            FsyncDelay => Slot::pre(OpKind::Fsync),
            FsyncEio => Slot::post(OpKind::Fsync),
            OpenDirEacces => Slot::pre(OpKind::OpenDir),
            OpenDirEperm => Slot::post(OpKind::OpenDir),
        }
    }

    /// Whether this fault type sleeps instead of failing the call.
    pub fn uses_delay(self) -> bool {
        matches!(
            crate::policy::policy(self.slot()).injection,
            crate::policy::Injection::Delay
        )
    }

    /// Canonical display name.
    pub fn name(self) -> &'static str {
        use FaultType::*;
        match self {
            OpenFileEio => "OpenFileEIO",
            OpenFileEperm => "OpenFileEPERM",
            ReadFileDelay => "ReadFileDelay",
            ReadFileErr => "ReadFileErr",
            WriteFileEnospc => "WriteFileENOSPC",
            WriteFileDelay => "WriteFileDelay",
            MkdirEacces => "MkDirEACCES",
            MkdirEperm => "MkDirEPERM",
            RmdirEacces => "RmDirEACCES",
            RmdirEperm => "RmDirEPERM",
            FsyncDelay => "FsyncDelay",
            FsyncEio => "FsyncEIO",
            OpenDirEacces => "OpenDirEACCES",
            OpenDirEperm => "OpenDirEPERM",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for FaultType {
    type Error = SpecError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// Accepts a numeric code or a name, case-insensitively.  The historical
/// spellings `RmDirEACCESS`, `OpenDirEACCESS`, `FsycnDelay` and `FsycnEIO`
/// are accepted too.
impl FromStr for FaultType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code);
        }
        let wanted = s.to_ascii_lowercase();
        let alias = match wanted.as_str() {
            "rmdireaccess" => Some(FaultType::RmdirEacces),
            "opendireaccess" => Some(FaultType::OpenDirEacces),
            "fsycndelay" => Some(FaultType::FsyncDelay),
            "fsycneio" => Some(FaultType::FsyncEio),
            _ => None,
        };
        alias
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|ft| ft.name().eq_ignore_ascii_case(&wanted))
            })
            .ok_or_else(|| SpecError::UnknownFaultName(s.to_string()))
    }
}

/// POSIX error codes the hooks can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    /// `EIO`: I/O failure.
    Io,
    /// `EPERM`: operation not permitted.
    Perm,
    /// `EACCES`: permission denied.
    Access,
    /// `ENOSPC`: no space left on device.
    NoSpace,
}

impl Errno {
    /// Raw errno value for this platform.
    pub fn raw(self) -> i32 {
        match self {
            Errno::Io => libc::EIO,
            Errno::Perm => libc::EPERM,
            Errno::Access => libc::EACCES,
            Errno::NoSpace => libc::ENOSPC,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Errno::Io => "EIO",
            Errno::Perm => "EPERM",
            Errno::Access => "EACCES",
            Errno::NoSpace => "ENOSPC",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Errno> for io::Error {
    fn from(errno: Errno) -> Self {
        io::Error::from_raw_os_error(errno.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_table_order() {
        for (idx, ft) in FaultType::ALL.iter().enumerate() {
            assert_eq!(ft.code() as usize, idx);
            assert_eq!(FaultType::from_code(idx as i64).unwrap(), *ft);
        }
    }

    #[test]
    fn unknown_codes_rejected() {
        assert!(matches!(
            FaultType::from_code(14),
            Err(SpecError::UnknownFaultType(14))
        ));
        assert!(FaultType::from_code(-1).is_err());
    }

    #[test]
    fn every_slot_armed_by_exactly_one_fault() {
        let mut seen = [false; 14];
        for ft in FaultType::ALL {
            let idx = ft.slot().index();
            assert!(!seen[idx], "slot {} armed twice", ft.slot());
            seen[idx] = true;
            assert_eq!(ft.slot().fault_type(), ft);
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn write_slots_are_swapped_relative_to_codes() {
        assert_eq!(FaultType::WriteFileEnospc.slot(), Slot::post(OpKind::Write));
        assert_eq!(FaultType::WriteFileDelay.slot(), Slot::pre(OpKind::Write));
    }

    #[test]
    fn parse_names_codes_and_aliases() {
        assert_eq!("0".parse::<FaultType>().unwrap(), FaultType::OpenFileEio);
        assert_eq!(
            "openfileeperm".parse::<FaultType>().unwrap(),
            FaultType::OpenFileEperm
        );
        assert_eq!("FsycnDelay".parse::<FaultType>().unwrap(), FaultType::FsyncDelay);
        assert_eq!(
            "RmDirEACCESS".parse::<FaultType>().unwrap(),
            FaultType::RmdirEacces
        );
        assert!("NoSuchFault".parse::<FaultType>().is_err());
    }

    #[test]
    fn delay_types() {
        let delays: Vec<_> = FaultType::ALL
            .into_iter()
            .filter(|ft| ft.uses_delay())
            .collect();
        assert_eq!(
            delays,
            vec![
                FaultType::ReadFileDelay,
                FaultType::WriteFileDelay,
                FaultType::FsyncDelay
            ]
        );
    }

    #[test]
    fn errno_values() {
        assert_eq!(Errno::Io.raw(), libc::EIO);
        assert_eq!(Errno::NoSpace.to_string(), "ENOSPC");
        let err: io::Error = Errno::Access.into();
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
    }
}
