//! Scheduler loop driven end to end over an in-memory serial link.
//!
//! All tests use a manual clock, so every deadline is exact and the runs are
//! deterministic.

use std::sync::Arc;

use sbp_protocol::{parse_response_line, NoopHooks, ProtocolError, ProtocolState, ResponseLine};
use sbp_runner::clock::{Clock, ManualClock};
use sbp_runner::sensors::{LocalSnapshots, SyntheticSensors};
use sbp_runner::serial::{ChannelSerial, SerialHost};
use sbp_runner::{PeriodOutcome, Scheduler, SchedulerConfig};

type LocalScheduler = Scheduler<ChannelSerial, LocalSnapshots<SyntheticSensors>, NoopHooks>;

fn local_scheduler(clock: &Arc<ManualClock>) -> (LocalScheduler, SerialHost) {
    let (serial, host) = ChannelSerial::new_pair();
    let scheduler = Scheduler::new(
        ProtocolState::new(0xCAFE),
        NoopHooks,
        serial,
        LocalSnapshots::new(SyntheticSensors::new(42)),
        clock.clone(),
        SchedulerConfig::default(),
    );
    (scheduler, host)
}

/// Parse every response line the host has received, skipping telemetry.
fn responses(host: &SerialHost) -> Vec<ResponseLine> {
    host.drain()
        .iter()
        .filter(|line| line.starts_with('R'))
        .map(|line| parse_response_line(line).unwrap())
        .collect()
}

// ============================================================================
// Command handling
// ============================================================================

#[test]
fn test_handshake_and_start() {
    let clock = Arc::new(ManualClock::new(0));
    let (mut scheduler, host) = local_scheduler(&clock);

    host.send_line("C[A1B2C3D4]HS[]");
    host.send_line("C[00000002]START[AB]");

    assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Telemetry);
    let out = host.drain();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], "R[A1B2C3D4]HS[1]\n");
    assert_eq!(out[1], "R[00000002]START[]\n");
    assert!(out[2].starts_with("P[0]AX["), "unexpected line {:?}", out[2]);
    assert!(out[2].contains("BA[") && out[2].contains("BB["));
    assert!(!out[2].contains("CX["));
    assert!(out[2].ends_with("]\n"));

    // Telemetry goes out exactly on the deadline.
    assert_eq!(clock.now_us(), 20_000);
    assert!(scheduler.state().send_periodic);
}

#[test]
fn test_every_command_gets_one_response() {
    let clock = Arc::new(ManualClock::new(0));
    let (mut scheduler, host) = local_scheduler(&clock);

    host.send_line("C[01]HS[]");
    host.send_line("C[02]PER[5]");
    host.send_line("C[03]NOPE[]");
    host.send_line("C[04]START[AQ]");
    host.send_line("garbage");
    host.send_line("C[05]MBID[]");

    assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Disabled);
    let lines = responses(&host);
    let ids: Vec<&str> = lines.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["01", "02", "03", "04", "05"]);

    assert_eq!((lines[0].token.as_str(), lines[0].value.as_str()), ("HS", "1"));
    assert_eq!(lines[1].error(), Some(ProtocolError::CommandValue));
    assert_eq!(lines[2].error(), Some(ProtocolError::CommandType));
    assert_eq!(lines[3].error(), Some(ProtocolError::CommandValue));
    assert_eq!((lines[4].token.as_str(), lines[4].value.as_str()), ("MBID", "51966"));

    assert_eq!(scheduler.stats().commands, 6);
    assert!(!scheduler.state().send_periodic);
}

#[test]
fn test_oversized_response_becomes_error() {
    let clock = Arc::new(ManualClock::new(0));
    let (serial, host) = ChannelSerial::new_pair();
    let mut scheduler = Scheduler::new(
        ProtocolState::new(1).with_versions(2, "v".repeat(120)),
        NoopHooks,
        serial,
        LocalSnapshots::new(SyntheticSensors::new(0)),
        clock.clone(),
        SchedulerConfig::default(),
    );

    host.send_line("C[01]SWVER[]");
    host.send_line("C[02]HS[]");
    scheduler.run_period().unwrap();

    let lines = responses(&host);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].id, "01");
    assert_eq!(lines[0].error(), Some(ProtocolError::LengthExceeded));
    assert_eq!(lines[1].id, "02");
    assert!(!lines[1].is_error());
}

// ============================================================================
// Telemetry timing
// ============================================================================

#[test]
fn test_one_message_per_period_without_drift() {
    let clock = Arc::new(ManualClock::new(0));
    let (mut scheduler, host) = local_scheduler(&clock);
    host.send_line("C[1]START[A]");

    for n in 1..=10u64 {
        // Input arriving mid-period must not shift the schedule.
        host.send_line("C[2]HS[]");
        assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Telemetry);
        assert_eq!(clock.now_us(), 20_000 * n);
        assert_eq!(scheduler.next_deadline_us(), 20_000 * (n + 1));
    }

    let telemetry: Vec<String> = host
        .drain()
        .into_iter()
        .filter(|line| line.starts_with('P'))
        .collect();
    assert_eq!(telemetry.len(), 10);
    assert!(telemetry[9].starts_with("P[9]"));
}

#[test]
fn test_period_change_applies_to_next_deadline() {
    let clock = Arc::new(ManualClock::new(0));
    let (mut scheduler, host) = local_scheduler(&clock);

    host.send_line("C[1]PER[50]");
    scheduler.run_period().unwrap();
    assert_eq!(host.drain(), vec!["R[1]PER[50]\n"]);
    assert_eq!(scheduler.next_deadline_us(), 70_000);

    scheduler.run_period().unwrap();
    assert_eq!(scheduler.next_deadline_us(), 120_000);
}

#[test]
fn test_stop_resumes_on_period_boundary() {
    let clock = Arc::new(ManualClock::new(0));
    let (mut scheduler, host) = local_scheduler(&clock);

    host.send_line("C[1]START[T]");
    assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Telemetry);

    host.send_line("C[2]STOP[]");
    assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Disabled);
    host.send_line("C[3]STOP[]");
    assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Disabled);

    host.send_line("C[4]START[T]");
    assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Telemetry);
    assert_eq!(clock.now_us(), 80_000);

    let out = host.drain();
    assert_eq!(out.iter().filter(|l| l.starts_with('P')).count(), 2);
    assert!(out.contains(&"R[2]STOP[]\n".to_string()));
    assert!(out.contains(&"R[3]STOP[]\n".to_string()));
}

#[test]
fn test_compact_stream() {
    let clock = Arc::new(ManualClock::new(0));
    let (mut scheduler, host) = local_scheduler(&clock);

    host.send_line("C[1]ZSTART[]");
    for _ in 0..300 {
        scheduler.run_period().unwrap();
    }

    let lines: Vec<String> = host
        .drain()
        .into_iter()
        .filter(|line| line.starts_with('P'))
        .collect();
    assert_eq!(lines.len(), 300);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line.len(), 14, "line {line:?}");
        assert_eq!(&line[1..3], format!("{:02X}", i % 256));
        assert!(line[1..13].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
