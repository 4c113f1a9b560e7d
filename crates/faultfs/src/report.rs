//! Format CLI reports for human consumption.

use std::path::Path;

use faultfs_core::config::{FaultSpec, ProbabilityMode};
use faultfs_core::engine::SlotStats;
use faultfs_core::faults::OpKind;
use faultfs_core::hooks::{PostOutcome, PreOutcome};
use faultfs_core::policy::{policy, Injection};

use crate::workload::CallRecord;

const RULE: &str = "───────────────────────────────────────────────────────────────\n";

fn describe_injection(spec: &FaultSpec) -> String {
    let slot = spec.fault_type().slot();
    match policy(slot).injection {
        Injection::Error(errno) if slot.phase == faultfs_core::faults::Phase::Pre => {
            format!("short-circuit with {errno}")
        }
        Injection::Error(errno) => format!("override result with {errno}"),
        Injection::Delay => format!("sleep {:?} before the real call", spec.delay()),
        Injection::Substitute => "replace returned data with the injected payload".to_string(),
    }
}

fn describe_mode(mode: ProbabilityMode) -> &'static str {
    match mode {
        ProbabilityMode::Compatible => "compatible (draw 0..99)",
        ProbabilityMode::Exact => "exact (draw 0..100)",
    }
}

/// Summary of a validated configuration.
pub fn format_config(spec: &FaultSpec, mountpoint: &Path, original: &Path) -> String {
    let slot = spec.fault_type().slot();
    let mut output = String::new();

    output.push_str(RULE);
    output.push_str("  FaultFS configuration\n");
    output.push_str(RULE);
    output.push_str(&format!(
        "Fault type:        {} (code {})\n",
        spec.fault_type(),
        spec.fault_type().code()
    ));
    output.push_str(&format!("Armed slot:        {}\n", slot));
    output.push_str(&format!("Effect:            {}\n", describe_injection(spec)));
    if policy(slot).requires_path {
        output.push_str("Guard:             skipped for the mount root\n");
    }
    output.push_str(&format!("Percent:           {}\n", spec.percent()));
    output.push_str(&format!("Mode:              {}\n", describe_mode(spec.mode())));
    output.push_str(&format!(
        "Trigger chance:    {:.4}\n",
        spec.trigger_probability()
    ));
    output.push_str(&format!("Mountpoint:        {}\n", mountpoint.display()));
    output.push_str(&format!("Original:          {}\n", original.display()));
    output
}

/// Observed versus expected trigger rate for a probe run.
pub fn format_probe(spec: &FaultSpec, stats: &SlotStats, seed: u64) -> String {
    let observed = if stats.evaluated == 0 {
        0.0
    } else {
        stats.triggered as f64 / stats.evaluated as f64
    };
    let mut output = String::new();
    output.push_str(RULE);
    output.push_str(&format!("  Probe: {} at {}\n", stats.fault, stats.slot));
    output.push_str(RULE);
    output.push_str(&format!("Seed:              {}\n", seed));
    output.push_str(&format!("Decisions:         {}\n", stats.evaluated));
    output.push_str(&format!("Triggered:         {}\n", stats.triggered));
    output.push_str(&format!("Observed rate:     {:.4}\n", observed));
    output.push_str(&format!(
        "Expected rate:     {:.4}\n",
        spec.trigger_probability()
    ));
    output
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct OpTally {
    calls: u64,
    short_circuited: u64,
    delayed: u64,
    overridden: u64,
    failed: u64,
    corrupted: u64,
}

fn tally(records: &[CallRecord], op: OpKind) -> OpTally {
    let mut t = OpTally::default();
    for r in records.iter().filter(|r| r.op == op) {
        t.calls += 1;
        match r.pre {
            PreOutcome::ShortCircuited => t.short_circuited += 1,
            PreOutcome::DelayedThenReal => t.delayed += 1,
            PreOutcome::Passthrough => {}
        }
        if r.post == Some(PostOutcome::Overridden) {
            t.overridden += 1;
        }
        if r.errno.is_some() {
            t.failed += 1;
        }
        if r.corrupted {
            t.corrupted += 1;
        }
    }
    t
}

/// Per-operation outcomes and per-slot counters for an exercise run.
pub fn format_exercise(
    spec: &FaultSpec,
    records: &[CallRecord],
    stats: &[SlotStats],
    seed: u64,
) -> String {
    let mut output = String::new();
    output.push_str(RULE);
    output.push_str(&format!(
        "  Exercise: {} at {} (percent {})\n",
        spec.fault_type(),
        spec.fault_type().slot(),
        spec.percent()
    ));
    output.push_str(RULE);
    output.push_str(&format!("Seed:              {}\n", seed));
    output.push_str(&format!("Calls:             {}\n", records.len()));
    output.push_str(&format!(
        "Failed calls:      {}\n\n",
        records.iter().filter(|r| r.errno.is_some()).count()
    ));

    output.push_str(&format!(
        "{:<9} {:>6} {:>8} {:>8} {:>10} {:>7} {:>9}\n",
        "op", "calls", "short", "delayed", "overridden", "failed", "corrupted"
    ));
    for op in OpKind::ALL {
        let t = tally(records, op);
        if t.calls == 0 {
            continue;
        }
        output.push_str(&format!(
            "{:<9} {:>6} {:>8} {:>8} {:>10} {:>7} {:>9}\n",
            op.name(),
            t.calls,
            t.short_circuited,
            t.delayed,
            t.overridden,
            t.failed,
            t.corrupted
        ));
    }

    output.push('\n');
    output.push_str("Slot counters:\n");
    for s in stats.iter().filter(|s| s.evaluated > 0) {
        output.push_str(&format!(
            "  {:<14} {:<16} {:>6} evaluated {:>6} triggered\n",
            s.slot.to_string(),
            s.fault.name(),
            s.evaluated,
            s.triggered
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultfs_core::faults::{FaultType, Slot};
    use std::time::Duration;

    fn record(
        op: OpKind,
        pre: PreOutcome,
        post: Option<PostOutcome>,
        errno: Option<i32>,
    ) -> CallRecord {
        CallRecord {
            op,
            path: "p".to_string(),
            pre,
            post,
            errno,
            corrupted: false,
        }
    }

    #[test]
    fn config_report_names_slot_and_effect() {
        let spec = FaultSpec::new(FaultType::OpenDirEacces, 25, Duration::ZERO).unwrap();
        let out = format_config(&spec, Path::new("/mnt/faultfs"), Path::new("/mnt/fs"));
        assert!(out.contains("OpenDirEACCES (code 12)"));
        assert!(out.contains("pre_opendir"));
        assert!(out.contains("short-circuit with EACCES"));
        assert!(out.contains("skipped for the mount root"));
    }

    #[test]
    fn config_report_for_delay() {
        let spec =
            FaultSpec::new(FaultType::WriteFileDelay, 5, Duration::from_millis(250)).unwrap();
        let out = format_config(&spec, Path::new("/m"), Path::new("/o"));
        assert!(out.contains("sleep 250ms"));
        assert!(!out.contains("Guard"));
    }

    #[test]
    fn probe_report_rates() {
        let spec = FaultSpec::new(FaultType::FsyncEio, 50, Duration::ZERO).unwrap();
        let stats = SlotStats {
            slot: Slot::post(OpKind::Fsync),
            fault: FaultType::FsyncEio,
            evaluated: 4,
            triggered: 1,
        };
        let out = format_probe(&spec, &stats, 9);
        assert!(out.contains("Observed rate:     0.2500"));
        assert!(out.contains("Expected rate:     0.5051"));
    }

    #[test]
    fn tally_counts_each_outcome() {
        let records = vec![
            record(OpKind::Open, PreOutcome::ShortCircuited, None, Some(5)),
            record(OpKind::Open, PreOutcome::Passthrough, Some(PostOutcome::Overridden), Some(1)),
            record(OpKind::Open, PreOutcome::DelayedThenReal, Some(PostOutcome::Passthrough), None),
            record(OpKind::Read, PreOutcome::Passthrough, Some(PostOutcome::Passthrough), None),
        ];
        let t = tally(&records, OpKind::Open);
        assert_eq!(
            t,
            OpTally {
                calls: 3,
                short_circuited: 1,
                delayed: 1,
                overridden: 1,
                failed: 2,
                corrupted: 0,
            }
        );
    }

    #[test]
    fn exercise_report_skips_idle_ops_and_slots() {
        let spec = FaultSpec::new(FaultType::OpenFileEio, 99, Duration::ZERO).unwrap();
        let records = vec![record(OpKind::Open, PreOutcome::ShortCircuited, None, Some(5))];
        let stats = vec![SlotStats {
            slot: Slot::pre(OpKind::Open),
            fault: FaultType::OpenFileEio,
            evaluated: 1,
            triggered: 1,
        }];
        let out = format_exercise(&spec, &records, &stats, 1);
        assert!(out.contains("open"));
        assert!(!out.contains("rmdir"));
        assert!(out.contains("OpenFileEIO"));
        assert!(out.contains("Failed calls:      1"));
    }
}
