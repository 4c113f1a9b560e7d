//! Scripted workload for the `exercise` subcommand.
//!
//! Each round creates a directory, writes a file into it, syncs and reads it
//! back, lists the directory and the root, then removes everything again.
//! Every call goes through the hooks; cleanup that the hooks refused is
//! finished directly on the underlying directory so no residue is left.

use std::fs;
use std::io;

use faultfs_core::faults::OpKind;
use faultfs_core::hooks::{Hook, PostOutcome, PreOutcome};
use faultfs_core::host::{HostReply, PassthroughHost};

/// Outcome of one workload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub op: OpKind,
    pub path: String,
    pub pre: PreOutcome,
    pub post: Option<PostOutcome>,
    /// Errno the caller observed, if the call failed.
    pub errno: Option<i32>,
    /// A read succeeded but returned something other than what was written.
    pub corrupted: bool,
}

impl CallRecord {
    fn new<T>(op: OpKind, path: &str, reply: &HostReply<T>) -> Self {
        Self {
            op,
            path: path.to_string(),
            pre: reply.pre,
            post: reply.post,
            errno: reply.errno(),
            corrupted: false,
        }
    }
}

fn payload(round: u32) -> Vec<u8> {
    format!("faultfs workload round {round}\n").into_bytes()
}

/// Run `rounds` rounds against `host` and record every call.
pub fn run<H: Hook>(host: &PassthroughHost<H>, rounds: u32) -> io::Result<Vec<CallRecord>> {
    let mut records = Vec::new();
    for round in 0..rounds {
        let dir = format!("faultfs-workload-{round}");
        let file = format!("{dir}/data.txt");
        let data = payload(round);

        let reply = host.mkdir(&dir, 0o755);
        records.push(CallRecord::new(OpKind::Mkdir, &dir, &reply));

        let reply = host.open(&file, libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC);
        records.push(CallRecord::new(OpKind::Open, &file, &reply));

        let reply = host.write(&file, &data, 0);
        records.push(CallRecord::new(OpKind::Write, &file, &reply));

        let reply = host.fsync(&file, false);
        records.push(CallRecord::new(OpKind::Fsync, &file, &reply));

        let reply = host.read(&file, data.len() as u64 * 2, 0);
        let mut record = CallRecord::new(OpKind::Read, &file, &reply);
        if let Ok(ref got) = reply.result {
            // Only a complete earlier write makes the contents predictable.
            let expected_known = records
                .iter()
                .rev()
                .find(|r| r.op == OpKind::Write)
                .map_or(false, |w| w.errno.is_none());
            record.corrupted = expected_known && *got != data;
        }
        records.push(record);

        let reply = host.opendir(&dir);
        records.push(CallRecord::new(OpKind::OpenDir, &dir, &reply));

        let reply = host.opendir("");
        records.push(CallRecord::new(OpKind::OpenDir, "", &reply));

        remove_if_present(&host.root().join(&file))?;
        let reply = host.rmdir(&dir);
        records.push(CallRecord::new(OpKind::Rmdir, &dir, &reply));

        let leftover = host.root().join(&dir);
        if leftover.exists() {
            fs::remove_dir_all(&leftover)?;
        }
    }
    Ok(records)
}

fn remove_if_present(path: &std::path::Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
