//! Cooperative main loop.
//!
//! One hard deadline per period: the next telemetry emission. Until shortly
//! before it, the loop handles at most one serial command per iteration and
//! otherwise idles in short sleeps. At the deadline it spins to the exact
//! tick, emits one message and advances the deadline by exactly one period,
//! so processing jitter never accumulates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sbp_protocol::{
    encode_periodic, encode_waiting, process_line, CommandHooks, ProtocolState, Response,
    MAX_LINE_LENGTH,
};

use crate::clock::Clock;
use crate::error::RunnerResult;
use crate::sensors::SnapshotSource;
use crate::serial::SerialPort;

/// Timing parameters of the main loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time reserved before each deadline for encoding and transmission.
    pub safety_buffer_ms: u64,

    /// Longest single idle sleep while waiting for input.
    pub idle_sleep_us: u64,

    /// Lateness at the deadline that triggers a warning.
    pub max_lag_ms: u64,

    /// Warn about lag at most once per interval.
    pub lag_warn_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            safety_buffer_ms: 3,
            idle_sleep_us: 1_000,
            max_lag_ms: 5,
            lag_warn_interval_ms: 5_000,
        }
    }
}

/// Result of one scheduler period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodOutcome {
    /// A telemetry line was sent.
    Telemetry,
    /// No fresh data; the waiting indication was sent.
    Waiting,
    /// Telemetry is off; nothing was sent.
    Disabled,
    /// Encoding failed; the message was dropped.
    Dropped,
}

/// Counters kept by the scheduler.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub periods: u64,
    pub commands: u64,
    pub telemetry: u64,
    pub waiting: u64,
    pub dropped: u64,
    pub lag_warnings: u64,
    pub max_lag_us: u64,
}

/// The main loop of a serial-facing role.
pub struct Scheduler<P, S, H> {
    state: ProtocolState,
    hooks: H,
    serial: P,
    source: S,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    next_deadline_us: u64,
    packet_id: u32,
    last_lag_warn_us: Option<u64>,
    stats: SchedulerStats,
}

impl<P, S, H> Scheduler<P, S, H>
where
    P: SerialPort,
    S: SnapshotSource,
    H: CommandHooks,
{
    /// Create a scheduler whose first deadline is one period from now.
    pub fn new(
        state: ProtocolState,
        hooks: H,
        serial: P,
        source: S,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let next_deadline_us = clock.now_us() + period_us(&state);
        Scheduler {
            state,
            hooks,
            serial,
            source,
            clock,
            config,
            next_deadline_us,
            packet_id: 0,
            last_lag_warn_us: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Time of the next telemetry deadline in clock microseconds.
    pub fn next_deadline_us(&self) -> u64 {
        self.next_deadline_us
    }

    /// Run periods until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> RunnerResult<()> {
        tracing::info!(
            "scheduler started, period {} ms, safety buffer {} ms",
            self.state.period_ms,
            self.config.safety_buffer_ms
        );
        while !shutdown.load(Ordering::Relaxed) {
            self.run_period()?;
        }
        tracing::info!(
            "scheduler stopped after {} periods ({} commands, {} telemetry, {} waiting, {} dropped)",
            self.stats.periods,
            self.stats.commands,
            self.stats.telemetry,
            self.stats.waiting,
            self.stats.dropped
        );
        Ok(())
    }

    /// Run one period: serve commands, then meet the deadline.
    pub fn run_period(&mut self) -> RunnerResult<PeriodOutcome> {
        let deadline = self.next_deadline_us;
        let budget_end = deadline.saturating_sub(self.config.safety_buffer_ms * 1_000);

        loop {
            let now = self.clock.now_us();
            if now >= budget_end {
                break;
            }
            if self.poll_command()? {
                continue;
            }
            let idle = (budget_end - now).min(self.config.idle_sleep_us);
            self.clock.sleep(Duration::from_micros(idle));
        }

        self.check_lag(deadline);

        let outcome = if self.state.send_periodic {
            self.clock.spin_until(deadline);
            self.emit()?
        } else {
            PeriodOutcome::Disabled
        };

        self.stats.periods += 1;
        self.next_deadline_us = deadline + period_us(&self.state);
        Ok(outcome)
    }

    /// Handle at most one pending command. Returns whether one was read.
    fn poll_command(&mut self) -> RunnerResult<bool> {
        let Some(line) = self.serial.read_line() else {
            return Ok(false);
        };
        self.stats.commands += 1;

        let Some(response) = process_line(&mut self.state, &mut self.hooks, &line) else {
            tracing::debug!(
                "ignored serial line: {:?}",
                String::from_utf8_lossy(&line)
            );
            return Ok(true);
        };

        // A response that does not fit is replaced by an error, which always does.
        let mut buf = [0u8; MAX_LINE_LENGTH];
        let len = match response.encode_into(&mut buf) {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!("response to {} does not fit: {e}", response.id());
                Response::error(response.id(), e).encode_into(&mut buf)?
            }
        };
        self.serial.write(&buf[..len])?;
        Ok(true)
    }

    fn emit(&mut self) -> RunnerResult<PeriodOutcome> {
        let snapshot = self.source.snapshot(self.clock.now_ms());
        let packet_id = self.packet_id;
        self.packet_id = self.packet_id.wrapping_add(1);

        let mut buf = [0u8; MAX_LINE_LENGTH];
        let (encoded, outcome) = if snapshot.fresh {
            (
                encode_periodic(
                    packet_id,
                    self.state.compact_mode,
                    self.state.enabled_sensors,
                    &snapshot.data,
                    &mut buf,
                ),
                PeriodOutcome::Telemetry,
            )
        } else {
            (
                encode_waiting(packet_id, self.state.compact_mode, &mut buf),
                PeriodOutcome::Waiting,
            )
        };

        match encoded {
            Ok(len) => {
                self.serial.write(&buf[..len])?;
                match outcome {
                    PeriodOutcome::Waiting => self.stats.waiting += 1,
                    _ => self.stats.telemetry += 1,
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!("telemetry packet {packet_id:X} dropped: {e}");
                self.stats.dropped += 1;
                Ok(PeriodOutcome::Dropped)
            }
        }
    }

    fn check_lag(&mut self, deadline: u64) {
        let now = self.clock.now_us();
        let lag = now.saturating_sub(deadline);
        self.stats.max_lag_us = self.stats.max_lag_us.max(lag);
        if lag <= self.config.max_lag_ms * 1_000 {
            return;
        }

        let due = match self.last_lag_warn_us {
            Some(last) => now.saturating_sub(last) >= self.config.lag_warn_interval_ms * 1_000,
            None => true,
        };
        if due {
            self.last_lag_warn_us = Some(now);
            self.stats.lag_warnings += 1;
            tracing::warn!("main loop {} us behind the telemetry deadline", lag);
        }
    }
}

fn period_us(state: &ProtocolState) -> u64 {
    u64::from(state.period_ms) * 1_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sensors::{LocalSnapshots, SyntheticSensors};
    use crate::serial::ChannelSerial;
    use sbp_protocol::NoopHooks;

    #[test]
    fn test_deadline_advances_by_period_when_disabled() {
        let clock = Arc::new(ManualClock::new(0));
        let (serial, host) = ChannelSerial::new_pair();
        let mut scheduler = Scheduler::new(
            ProtocolState::new(1),
            NoopHooks,
            serial,
            LocalSnapshots::new(SyntheticSensors::new(0)),
            clock.clone(),
            SchedulerConfig::default(),
        );

        assert_eq!(scheduler.next_deadline_us(), 20_000);
        for n in 1..=5u64 {
            assert_eq!(scheduler.run_period().unwrap(), PeriodOutcome::Disabled);
            assert_eq!(scheduler.next_deadline_us(), 20_000 * (n + 1));
        }
        assert!(host.drain().is_empty());
        // Idle periods stop at the safety buffer, never past the deadline.
        assert!(clock.now_us() < 100_000);
    }

    #[test]
    fn test_late_loop_warns_once() {
        let clock = Arc::new(ManualClock::new(0));
        let (serial, _host) = ChannelSerial::new_pair();
        let mut scheduler = Scheduler::new(
            ProtocolState::new(1),
            NoopHooks,
            serial,
            LocalSnapshots::new(SyntheticSensors::new(0)),
            clock.clone(),
            SchedulerConfig::default(),
        );

        clock.set_us(100_000);
        scheduler.run_period().unwrap();
        scheduler.run_period().unwrap();
        assert_eq!(scheduler.stats().lag_warnings, 1);
        assert_eq!(scheduler.stats().max_lag_us, 80_000);
        // Still drift-free: deadlines are not re-based on the late clock.
        assert_eq!(scheduler.next_deadline_us(), 60_000);
    }
}
