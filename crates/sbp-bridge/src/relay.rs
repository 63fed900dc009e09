//! Radio-to-serial bridge relay.
//!
//! [`BridgeRelay`] is shared between the radio receive path and the main
//! loop. Roster, active device and the latest snapshot sit behind a single
//! mutex; radio transmits happen after the lock is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use sbp_protocol::{SensorData, SensorSnapshot};
use sbp_radio::{
    decode_packet, frequency_from_id, PacketResult, PacketSequencer, RadioCommand, RadioLink,
    RadioPacket, RadioPayload, DISPLAY_ROWS,
};

use crate::roster::{RecordOutcome, RemoteRoster, FORGET_TIMEOUT_MS};

/// Minimum time between two accepted switch requests.
pub const SWITCH_COOLDOWN_MS: u64 = 1_000;

/// Relay timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Silence after which a non-active remote is forgotten.
    pub forget_timeout_ms: u64,
    /// Debounce interval for switch requests.
    pub switch_cooldown_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            forget_timeout_ms: FORGET_TIMEOUT_MS,
            switch_cooldown_ms: SWITCH_COOLDOWN_MS,
        }
    }
}

/// What happened to one received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Sensor data from the active device; the snapshot was updated.
    Relayed { device_id: u32 },
    /// Sensor data from a non-active device; only the roster was updated.
    Tracked { device_id: u32 },
    /// A response packet from a remote.
    Response { device_id: u32, command: RadioCommand },
    /// A command packet, which the bridge does not act on.
    Ignored,
    /// The datagram could not be decoded.
    Malformed,
}

/// Counters kept by the relay.
#[derive(Debug, Default)]
pub struct RelayStats {
    pub received: AtomicU64,
    pub malformed: AtomicU64,
    pub relayed: AtomicU64,
}

struct RelayInner {
    roster: RemoteRoster,
    snapshot: SensorSnapshot,
    last_switch_ms: Option<u64>,
}

/// Tracks remotes and relays the active one's readings to the main loop.
pub struct BridgeRelay {
    inner: Mutex<RelayInner>,
    link: Arc<dyn RadioLink>,
    sequencer: PacketSequencer,
    config: RelayConfig,
    stats: RelayStats,
}

impl BridgeRelay {
    pub fn new(link: Arc<dyn RadioLink>, config: RelayConfig) -> Self {
        BridgeRelay {
            inner: Mutex::new(RelayInner {
                roster: RemoteRoster::new(config.forget_timeout_ms),
                snapshot: SensorSnapshot::default(),
                last_switch_ms: None,
            }),
            link,
            sequencer: PacketSequencer::new(),
            config,
            stats: RelayStats::default(),
        }
    }

    /// Handle one datagram from the radio.
    ///
    /// Malformed datagrams are counted and dropped.
    pub fn on_radio_receive(&self, bytes: &[u8], now_ms: u64) -> ReceiveOutcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let packet = match decode_packet(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                log::debug!("dropping radio datagram: {e}");
                return ReceiveOutcome::Malformed;
            }
        };

        match packet.payload {
            RadioPayload::SensorData(reading) => {
                let device_id = packet.device_id;
                let mut inner = self.inner.lock();
                let outcome = inner.roster.record(device_id, now_ms);
                if outcome == RecordOutcome::Activated {
                    log::info!("remote {device_id} is now active");
                }
                if inner.roster.active() == Some(device_id) {
                    inner.snapshot = SensorSnapshot::fresh(SensorData::from(reading));
                    self.stats.relayed.fetch_add(1, Ordering::Relaxed);
                    ReceiveOutcome::Relayed { device_id }
                } else {
                    ReceiveOutcome::Tracked { device_id }
                }
            }
            RadioPayload::Response { command, .. } => {
                log::debug!("response {:?} from {}", command, packet.device_id);
                ReceiveOutcome::Response {
                    device_id: packet.device_id,
                    command,
                }
            }
            RadioPayload::Command { .. } => ReceiveOutcome::Ignored,
        }
    }

    /// Copy out the latest snapshot and clear its fresh flag.
    pub fn take_snapshot(&self) -> SensorSnapshot {
        let mut inner = self.inner.lock();
        let snapshot = inner.snapshot;
        inner.snapshot.fresh = false;
        snapshot
    }

    /// Switch the active device to the next tracked one.
    ///
    /// Requests inside the cooldown window are ignored and return `None`.
    /// A switch to a different device sends it a blink command.
    pub fn request_switch(&self, now_ms: u64) -> Option<u32> {
        let (previous, next) = {
            let mut inner = self.inner.lock();
            if let Some(last) = inner.last_switch_ms {
                if now_ms.saturating_sub(last) < self.config.switch_cooldown_ms {
                    return None;
                }
            }
            inner.last_switch_ms = Some(now_ms);
            let previous = inner.roster.active();
            let next = inner.roster.switch_next()?;
            if previous != Some(next) {
                inner.snapshot.fresh = false;
            }
            (previous, next)
        };

        if previous != Some(next) {
            log::info!("switched active remote to {next}");
            if let Err(e) = self.send_command(next, RadioCommand::Blink) {
                log::warn!("failed to send blink to {next}: {e}");
            }
        }
        Some(next)
    }

    /// Pin `device_id` as the active device and retune to its channel.
    pub fn set_active(&self, device_id: u32, now_ms: u64) -> PacketResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.roster.active() != Some(device_id) {
                inner.roster.set_active(device_id, now_ms);
                inner.snapshot.fresh = false;
            }
        }
        let frequency = frequency_from_id(device_id);
        log::info!("pinned remote {device_id}, channel {frequency}");
        self.link.set_frequency(frequency)
    }

    /// Send a command to `target_id` (or the broadcast id).
    pub fn send_command(&self, target_id: u32, command: RadioCommand) -> PacketResult<()> {
        let packet = RadioPacket::command(self.sequencer.next_id(), target_id, command);
        self.link.send_packet(&packet)
    }

    /// Send a 5x5 image to `target_id`.
    pub fn send_display(&self, target_id: u32, rows: [u8; DISPLAY_ROWS]) -> PacketResult<()> {
        let packet = RadioPacket::display(self.sequencer.next_id(), target_id, rows);
        self.link.send_packet(&packet)
    }

    pub fn active_device(&self) -> Option<u32> {
        self.inner.lock().roster.active()
    }

    pub fn tracked_devices(&self) -> Vec<u32> {
        self.inner.lock().roster.ids()
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }
}
