//! Reference pass-through host.
//!
//! Drives a [`Hook`] around real `std::fs` operations on an underlying
//! directory, following the host side of the hook contract: call the
//! pre-hook, skip the real operation if it short-circuits, otherwise run it,
//! then let the post-hook override the outcome.  A FUSE adapter does the
//! same thing with kernel requests instead of method calls.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::{DirBuilderExt, FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use log::debug;

use crate::context::OpContext;
use crate::faults::{Errno, OpKind};
use crate::hooks::{Hook, PostDecision, PostOutcome, PreDecision, PreOutcome};

/// Outcome of one call through the host.
#[derive(Debug)]
pub struct HostReply<T> {
    pub pre: PreOutcome,
    /// `None` when the call was short-circuited.
    pub post: Option<PostOutcome>,
    pub result: io::Result<T>,
}

impl<T> HostReply<T> {
    pub fn into_result(self) -> io::Result<T> {
        self.result
    }

    /// Whether the real operation ran.
    pub fn reached_real_op(&self) -> bool {
        self.pre != PreOutcome::ShortCircuited
    }

    /// Raw errno the caller observes, if the call failed.
    pub fn errno(&self) -> Option<i32> {
        self.result.as_ref().err().and_then(|e| e.raw_os_error())
    }
}

/// Return code a post-hook sees for a real result.
fn retcode<T>(res: &io::Result<T>) -> i32 {
    match res {
        Ok(_) => 0,
        Err(e) => e.raw_os_error().unwrap_or(libc::EIO),
    }
}

/// Pass-through filesystem rooted at an underlying directory.
///
/// Paths handed to the host are relative to the root; `""` is the root
/// itself.
///
/// # Example
///
/// ```
/// use faultfs_core::hooks::NoopHook;
/// use faultfs_core::host::PassthroughHost;
///
/// let dir = tempfile::tempdir().unwrap();
/// let host = PassthroughHost::new(dir.path(), NoopHook);
/// host.mkdir("sub", 0o755).into_result().unwrap();
/// assert_eq!(host.opendir("").into_result().unwrap(), vec!["sub".to_string()]);
/// ```
pub struct PassthroughHost<H: Hook> {
    root: PathBuf,
    hook: H,
}

impl<H: Hook> PassthroughHost<H> {
    /// Create a host and run the hook's `init`.
    pub fn new(root: impl Into<PathBuf>, hook: H) -> Self {
        let root = root.into();
        hook.init();
        debug!("pass-through host rooted at {}", root.display());
        Self { root, hook }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// `path` must already be normalized.
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Open `path` with POSIX `flags` (`O_RDONLY`, `O_WRONLY | O_CREAT`, ...).
    pub fn open(&self, path: &str, flags: i32) -> HostReply<File> {
        let path = normalize(path);
        let pre = self.hook.pre_open(path, flags as u32);
        let real = self.resolve(path);
        self.call(
            OpKind::Open,
            pre,
            || open_options(flags).open(&real),
            |res, ctx| self.hook.post_open(retcode(res), ctx),
            |_| None,
        )
    }

    /// Read up to `len` bytes at `offset`.
    pub fn read(&self, path: &str, len: u64, offset: u64) -> HostReply<Vec<u8>> {
        let path = normalize(path);
        let pre = self.hook.pre_read(path, len, offset);
        let real = self.resolve(path);
        self.call(
            OpKind::Read,
            pre,
            || {
                let mut file = File::open(&real)?;
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = Vec::new();
                file.take(len).read_to_end(&mut buf)?;
                Ok(buf)
            },
            |res, ctx| {
                let buf = res.as_ref().map(Vec::as_slice).unwrap_or(&[]);
                self.hook.post_read(retcode(res), buf, ctx)
            },
            Some,
        )
    }

    /// Write `data` at `offset`, returning the number of bytes written.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> HostReply<usize> {
        let path = normalize(path);
        let pre = self.hook.pre_write(path, data, offset);
        let real = self.resolve(path);
        self.call(
            OpKind::Write,
            pre,
            || {
                let file = OpenOptions::new().write(true).open(&real)?;
                file.write_all_at(data, offset)?;
                Ok(data.len())
            },
            |res, ctx| self.hook.post_write(retcode(res), ctx),
            |_| None,
        )
    }

    pub fn mkdir(&self, path: &str, mode: u32) -> HostReply<()> {
        let path = normalize(path);
        let pre = self.hook.pre_mkdir(path, mode);
        let real = self.resolve(path);
        self.call(
            OpKind::Mkdir,
            pre,
            || DirBuilder::new().mode(mode).create(&real),
            |res, ctx| self.hook.post_mkdir(retcode(res), ctx),
            |_| None,
        )
    }

    pub fn rmdir(&self, path: &str) -> HostReply<()> {
        let path = normalize(path);
        let pre = self.hook.pre_rmdir(path);
        let real = self.resolve(path);
        self.call(
            OpKind::Rmdir,
            pre,
            || fs::remove_dir(&real),
            |res, ctx| self.hook.post_rmdir(retcode(res), ctx),
            |_| None,
        )
    }

    /// List a directory's entry names, sorted.
    pub fn opendir(&self, path: &str) -> HostReply<Vec<String>> {
        let path = normalize(path);
        let pre = self.hook.pre_opendir(path);
        let real = self.resolve(path);
        self.call(
            OpKind::OpenDir,
            pre,
            || {
                let mut names = fs::read_dir(&real)?
                    .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
                    .collect::<io::Result<Vec<_>>>()?;
                names.sort();
                Ok(names)
            },
            |res, ctx| self.hook.post_opendir(retcode(res), ctx),
            |_| None,
        )
    }

    /// Flush a file to stable storage; `datasync` skips metadata.
    pub fn fsync(&self, path: &str, datasync: bool) -> HostReply<()> {
        let path = normalize(path);
        let pre = self.hook.pre_fsync(path, u32::from(datasync));
        let real = self.resolve(path);
        self.call(
            OpKind::Fsync,
            pre,
            || {
                let file = File::open(&real)?;
                if datasync {
                    file.sync_data()
                } else {
                    file.sync_all()
                }
            },
            |res, ctx| self.hook.post_fsync(retcode(res), ctx),
            |_| None,
        )
    }

    /// Run one call through the pre → real → post sequence.
    ///
    /// `from_data` turns hook-supplied bytes into a reply for operations
    /// that return data; for the others it yields `None` and the bytes are
    /// ignored.
    fn call<T>(
        &self,
        op: OpKind,
        pre: PreDecision,
        real: impl FnOnce() -> io::Result<T>,
        post: impl FnOnce(&io::Result<T>, OpContext) -> PostDecision,
        from_data: impl Fn(Vec<u8>) -> Option<T>,
    ) -> HostReply<T> {
        let pre_outcome = pre.outcome();
        if pre_outcome == PreOutcome::ShortCircuited {
            let result = match pre.data.and_then(&from_data) {
                Some(value) => Ok(value),
                None => Err(pre.error.unwrap_or(Errno::Io).into()),
            };
            debug!("{op} {}: short-circuited", pre.ctx);
            return HostReply {
                pre: pre_outcome,
                post: None,
                result,
            };
        }

        let ctx = pre.ctx;
        let label = ctx.to_string();
        let result = real();
        let decision = post(&result, ctx);
        let post_outcome = decision.outcome();
        let result = if decision.triggered {
            match (decision.error, decision.data.and_then(&from_data)) {
                (Some(errno), _) => Err(errno.into()),
                (None, Some(value)) => Ok(value),
                (None, None) => result,
            }
        } else {
            result
        };
        debug!("{op} {label}: {pre_outcome:?} then {post_outcome:?}");
        HostReply {
            pre: pre_outcome,
            post: Some(post_outcome),
            result,
        }
    }
}

/// Mount-relative form of `path`: leading slashes dropped, so `"/"` and
/// `""` both name the root.  Hooks and the real operation see the same
/// string.
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

fn open_options(flags: i32) -> OpenOptions {
    let mut opts = OpenOptions::new();
    match flags & libc::O_ACCMODE {
        libc::O_WRONLY => opts.write(true),
        libc::O_RDWR => opts.read(true).write(true),
        _ => opts.read(true),
    };
    if flags & libc::O_APPEND != 0 {
        opts.append(true);
    }
    if flags & libc::O_TRUNC != 0 {
        opts.truncate(true);
    }
    if flags & libc::O_CREAT != 0 {
        if flags & libc::O_EXCL != 0 {
            opts.create_new(true);
        } else {
            opts.create(true);
        }
    }
    opts.mode(0o644);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultSpec;
    use crate::engine::DecisionEngine;
    use crate::faults::FaultType;
    use crate::hooks::{FaultHooks, NoopHook};
    use crate::policy::INJECTED_READ_PAYLOAD;
    use crate::random::ScriptedSource;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Host whose armed slot fires on every call.
    fn armed(ft: FaultType, delay: Duration) -> (TempDir, PassthroughHost<FaultHooks>) {
        let dir = tempfile::tempdir().unwrap();
        let spec = FaultSpec::new(ft, 1, delay).unwrap();
        let engine = DecisionEngine::with_source(spec, Arc::new(ScriptedSource::new(vec![0])));
        let host = PassthroughHost::new(dir.path(), FaultHooks::new(Arc::new(engine)));
        (dir, host)
    }

    fn seed_file(dir: &TempDir, name: &str, contents: &[u8]) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn noop_hook_passes_real_results() {
        let dir = tempfile::tempdir().unwrap();
        let host = PassthroughHost::new(dir.path(), NoopHook);

        host.mkdir("d", 0o755).into_result().unwrap();
        host.open("d/f", libc::O_WRONLY | libc::O_CREAT)
            .into_result()
            .unwrap();
        assert_eq!(host.write("d/f", b"hello world", 0).into_result().unwrap(), 11);
        host.fsync("d/f", false).into_result().unwrap();
        assert_eq!(host.read("d/f", 5, 6).into_result().unwrap(), b"world");
        assert_eq!(host.opendir("d").into_result().unwrap(), vec!["f"]);

        let reply = host.rmdir("d");
        assert_eq!(reply.pre, PreOutcome::Passthrough);
        assert_eq!(reply.post, Some(PostOutcome::Passthrough));
        assert_eq!(reply.errno(), Some(libc::ENOTEMPTY));
    }

    #[test]
    fn real_errors_pass_through_untouched() {
        let (_dir, host) = armed(FaultType::OpenFileEio, Duration::ZERO);
        // Only pre_open is armed, so the real mkdir's ENOENT reaches the
        // caller unchanged.
        let reply = host.mkdir("missing/child", 0o755);
        assert_eq!(reply.errno(), Some(libc::ENOENT));
    }

    #[test]
    fn open_eio_short_circuits_before_touching_disk() {
        let (dir, host) = armed(FaultType::OpenFileEio, Duration::ZERO);
        let reply = host.open("new.txt", libc::O_WRONLY | libc::O_CREAT);
        assert!(!reply.reached_real_op());
        assert_eq!(reply.post, None);
        assert_eq!(reply.errno(), Some(libc::EIO));
        assert!(!dir.path().join("new.txt").exists());
    }

    #[test]
    fn open_eperm_overrides_after_real_open() {
        let (dir, host) = armed(FaultType::OpenFileEperm, Duration::ZERO);
        let reply = host.open("created.txt", libc::O_WRONLY | libc::O_CREAT);
        assert!(reply.reached_real_op());
        assert_eq!(reply.post, Some(PostOutcome::Overridden));
        assert_eq!(reply.errno(), Some(libc::EPERM));
        // The real open ran, so the file exists even though the caller saw
        // EPERM.
        assert!(dir.path().join("created.txt").exists());
    }

    #[test]
    fn read_returns_injected_payload() {
        let (dir, host) = armed(FaultType::ReadFileErr, Duration::ZERO);
        seed_file(&dir, "data.bin", b"the real contents");
        let reply = host.read("data.bin", 4096, 0);
        assert_eq!(reply.post, Some(PostOutcome::Overridden));
        assert_eq!(reply.into_result().unwrap(), INJECTED_READ_PAYLOAD);
        assert_eq!(
            fs::read(dir.path().join("data.bin")).unwrap(),
            b"the real contents"
        );
    }

    #[test]
    fn read_delay_then_real_data() {
        let delay = Duration::from_millis(100);
        let (dir, host) = armed(FaultType::ReadFileDelay, delay);
        seed_file(&dir, "slow.txt", b"eventually");
        let start = Instant::now();
        let reply = host.read("slow.txt", 64, 0);
        assert!(start.elapsed() >= delay);
        assert_eq!(reply.pre, PreOutcome::DelayedThenReal);
        assert_eq!(reply.post, Some(PostOutcome::Passthrough));
        assert_eq!(reply.into_result().unwrap(), b"eventually");
    }

    #[test]
    fn write_enospc_after_data_landed() {
        let (dir, host) = armed(FaultType::WriteFileEnospc, Duration::ZERO);
        seed_file(&dir, "out.txt", b"");
        let reply = host.write("out.txt", b"persisted", 0);
        assert_eq!(reply.errno(), Some(libc::ENOSPC));
        assert_eq!(fs::read(dir.path().join("out.txt")).unwrap(), b"persisted");
    }

    #[test]
    fn write_delay_then_real_write() {
        let delay = Duration::from_millis(50);
        let (dir, host) = armed(FaultType::WriteFileDelay, delay);
        seed_file(&dir, "w.txt", b"");
        let start = Instant::now();
        assert_eq!(host.write("w.txt", b"abc", 0).into_result().unwrap(), 3);
        assert!(start.elapsed() >= delay);
        assert_eq!(fs::read(dir.path().join("w.txt")).unwrap(), b"abc");
    }

    #[test]
    fn mkdir_faults() {
        let (dir, host) = armed(FaultType::MkdirEacces, Duration::ZERO);
        assert_eq!(host.mkdir("a", 0o755).errno(), Some(libc::EACCES));
        assert!(!dir.path().join("a").exists());

        let (dir, host) = armed(FaultType::MkdirEperm, Duration::ZERO);
        assert_eq!(host.mkdir("b", 0o755).errno(), Some(libc::EPERM));
        assert!(dir.path().join("b").is_dir());
    }

    #[test]
    fn rmdir_faults() {
        let (dir, host) = armed(FaultType::RmdirEacces, Duration::ZERO);
        fs::create_dir(dir.path().join("keep")).unwrap();
        assert_eq!(host.rmdir("keep").errno(), Some(libc::EACCES));
        assert!(dir.path().join("keep").is_dir());

        let (dir, host) = armed(FaultType::RmdirEperm, Duration::ZERO);
        fs::create_dir(dir.path().join("gone")).unwrap();
        assert_eq!(host.rmdir("gone").errno(), Some(libc::EPERM));
        assert!(!dir.path().join("gone").exists());
    }

    #[test]
    fn opendir_faults_spare_the_root() {
        for (ft, errno) in [
            (FaultType::OpenDirEacces, libc::EACCES),
            (FaultType::OpenDirEperm, libc::EPERM),
        ] {
            let (dir, host) = armed(ft, Duration::ZERO);
            fs::create_dir(dir.path().join("sub")).unwrap();
            assert_eq!(host.opendir("sub").errno(), Some(errno), "{ft}");
            assert_eq!(host.opendir("").into_result().unwrap(), vec!["sub"], "{ft}");
        }
    }

    #[test]
    fn fsync_faults() {
        let (dir, host) = armed(FaultType::FsyncEio, Duration::ZERO);
        seed_file(&dir, "f", b"x");
        assert_eq!(host.fsync("f", true).errno(), Some(libc::EIO));

        let delay = Duration::from_millis(50);
        let (dir, host) = armed(FaultType::FsyncDelay, delay);
        seed_file(&dir, "f", b"x");
        let start = Instant::now();
        let reply = host.fsync("f", false);
        assert!(start.elapsed() >= delay);
        assert_eq!(reply.pre, PreOutcome::DelayedThenReal);
        reply.into_result().unwrap();
    }

    #[test]
    fn leading_slash_is_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let host = PassthroughHost::new(dir.path(), NoopHook);
        host.mkdir("/abs", 0o700).into_result().unwrap();
        assert!(dir.path().join("abs").is_dir());
    }

    #[test]
    fn slash_root_is_guarded_like_empty_root() {
        for ft in [
            FaultType::OpenDirEacces,
            FaultType::OpenDirEperm,
            FaultType::FsyncEio,
            FaultType::FsyncDelay,
        ] {
            let delay = Duration::from_millis(200);
            let (dir, host) = armed(ft, delay);
            fs::create_dir(dir.path().join("sub")).unwrap();

            for root in ["", "/", "//"] {
                let start = Instant::now();
                let listing = host.opendir(root);
                assert_eq!(listing.pre, PreOutcome::Passthrough, "{ft} {root:?}");
                assert_eq!(listing.post, Some(PostOutcome::Passthrough), "{ft} {root:?}");
                assert_eq!(listing.into_result().unwrap(), vec!["sub"], "{ft} {root:?}");

                let sync = host.fsync(root, false);
                assert_eq!(sync.pre, PreOutcome::Passthrough, "{ft} {root:?}");
                assert_eq!(sync.post, Some(PostOutcome::Passthrough), "{ft} {root:?}");
                assert!(start.elapsed() < delay, "{ft} {root:?}");
            }
            assert_eq!(host.hook().engine().stats_for(ft.slot()).evaluated, 0);
        }
    }

    #[test]
    fn hooks_see_normalized_path() {
        struct Paths(std::sync::Mutex<Vec<String>>);
        impl Hook for Paths {
            fn pre_mkdir(&self, path: &str, _mode: u32) -> PreDecision {
                self.0.lock().unwrap().push(path.to_string());
                PreDecision::passthrough(OpContext::new(path))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let host = PassthroughHost::new(dir.path(), Paths(std::sync::Mutex::new(Vec::new())));
        host.mkdir("/a", 0o755).into_result().unwrap();
        host.mkdir("a/b", 0o755).into_result().unwrap();
        assert_eq!(*host.hook().0.lock().unwrap(), vec!["a", "a/b"]);
    }

    #[test]
    fn concurrent_calls_share_one_engine() {
        let dir = tempfile::tempdir().unwrap();
        let spec = FaultSpec::new(FaultType::OpenFileEperm, 99, Duration::ZERO).unwrap();
        let engine = Arc::new(DecisionEngine::with_source(
            spec,
            Arc::new(crate::random::SeededRng::from_seed(4)),
        ));
        let host = Arc::new(PassthroughHost::new(
            dir.path(),
            FaultHooks::new(Arc::clone(&engine)),
        ));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let host = Arc::clone(&host);
                thread::spawn(move || {
                    for i in 0..50 {
                        let name = format!("t{t}-{i}");
                        let reply = host.open(&name, libc::O_WRONLY | libc::O_CREAT);
                        assert_eq!(reply.errno(), Some(libc::EPERM));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(engine.faults_injected(), 200);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 200);
    }
}
