//! UDP stand-in for the board radio.
//!
//! Each channel maps to two UDP ports: remotes transmit on the uplink port
//! (`base_port + frequency`) and listen on the downlink port
//! (`base_port + MAX_FREQUENCY + frequency`); the bridge does the opposite.
//! Retuning is an atomic store; the receive thread notices and rebinds.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sbp_protocol::MAX_FREQUENCY;
use sbp_radio::{PacketError, RadioLink, PACKET_SIZE};

/// How long the receive thread blocks before re-checking the channel.
const RECEIVE_POLL: Duration = Duration::from_millis(50);

/// Which side of the link this radio listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioSide {
    /// Listens to remotes (uplink), transmits commands (downlink).
    Bridge,
    /// Listens to commands (downlink), transmits data (uplink).
    Remote,
}

/// UDP radio settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpRadioConfig {
    /// Address datagrams are sent to.
    pub peer_addr: IpAddr,
    /// Address the receive socket binds to.
    pub bind_addr: IpAddr,
    /// First port of the channel range.
    pub base_port: u16,
}

impl Default for UdpRadioConfig {
    fn default() -> Self {
        UdpRadioConfig {
            peer_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: 47_000,
        }
    }
}

impl UdpRadioConfig {
    fn uplink_port(&self, frequency: u8) -> u16 {
        self.base_port.wrapping_add(u16::from(frequency))
    }

    fn downlink_port(&self, frequency: u8) -> u16 {
        self.base_port
            .wrapping_add(u16::from(MAX_FREQUENCY))
            .wrapping_add(u16::from(frequency))
    }
}

/// Radio link over UDP datagrams.
pub struct UdpRadio {
    config: UdpRadioConfig,
    side: RadioSide,
    frequency: Arc<AtomicU8>,
    tx: UdpSocket,
}

impl UdpRadio {
    pub fn new(config: UdpRadioConfig, side: RadioSide, frequency: u8) -> Result<Self, PacketError> {
        check_frequency(frequency)?;
        let unspecified = match config.bind_addr {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        };
        let tx = UdpSocket::bind(SocketAddr::new(unspecified, 0))
            .map_err(|e| PacketError::transmit(e.to_string()))?;
        tx.set_broadcast(true)
            .map_err(|e| PacketError::transmit(e.to_string()))?;
        Ok(UdpRadio {
            config,
            side,
            frequency: Arc::new(AtomicU8::new(frequency)),
            tx,
        })
    }

    pub fn frequency(&self) -> u8 {
        self.frequency.load(Ordering::Acquire)
    }

    fn listen_port(config: &UdpRadioConfig, side: RadioSide, frequency: u8) -> u16 {
        match side {
            RadioSide::Bridge => config.uplink_port(frequency),
            RadioSide::Remote => config.downlink_port(frequency),
        }
    }

    /// Start the receive thread, calling `on_receive` for every datagram.
    ///
    /// The thread exits once `shutdown` is set.
    pub fn spawn_receiver<F>(
        &self,
        shutdown: Arc<AtomicBool>,
        mut on_receive: F,
    ) -> std::io::Result<JoinHandle<()>>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let config = self.config.clone();
        let side = self.side;
        let frequency = self.frequency.clone();

        thread::Builder::new()
            .name("radio-rx".into())
            .spawn(move || {
                let mut buf = [0u8; 2 * PACKET_SIZE];
                while !shutdown.load(Ordering::Relaxed) {
                    let tuned = frequency.load(Ordering::Acquire);
                    let port = Self::listen_port(&config, side, tuned);
                    let sock = match UdpSocket::bind(SocketAddr::new(config.bind_addr, port)) {
                        Ok(sock) => sock,
                        Err(e) => {
                            tracing::error!("radio bind to port {port} failed: {e}, retrying");
                            thread::sleep(Duration::from_secs(1));
                            continue;
                        }
                    };
                    if let Err(e) = sock.set_read_timeout(Some(RECEIVE_POLL)) {
                        tracing::warn!("radio read timeout not set: {e}");
                    }
                    tracing::info!("radio listening on channel {tuned} (port {port})");

                    while !shutdown.load(Ordering::Relaxed)
                        && frequency.load(Ordering::Acquire) == tuned
                    {
                        match sock.recv_from(&mut buf) {
                            Ok((size, _)) => on_receive(&buf[..size]),
                            Err(ref e)
                                if e.kind() == std::io::ErrorKind::TimedOut
                                    || e.kind() == std::io::ErrorKind::WouldBlock => {}
                            Err(e) => tracing::warn!("radio receive failed: {e}"),
                        }
                    }
                }
            })
    }
}

fn check_frequency(frequency: u8) -> Result<(), PacketError> {
    if frequency >= MAX_FREQUENCY {
        return Err(PacketError::transmit(format!(
            "frequency {frequency} out of range"
        )));
    }
    Ok(())
}

impl RadioLink for UdpRadio {
    fn transmit(&self, frame: &[u8; PACKET_SIZE]) -> Result<(), PacketError> {
        let frequency = self.frequency();
        let port = match self.side {
            RadioSide::Bridge => self.config.downlink_port(frequency),
            RadioSide::Remote => self.config.uplink_port(frequency),
        };
        self.tx
            .send_to(frame, SocketAddr::new(self.config.peer_addr, port))
            .map(|_| ())
            .map_err(|e| PacketError::transmit(e.to_string()))
    }

    fn set_frequency(&self, frequency: u8) -> Result<(), PacketError> {
        check_frequency(frequency)?;
        if self.frequency.swap(frequency, Ordering::AcqRel) != frequency {
            tracing::debug!("radio retuned to channel {frequency}");
        }
        Ok(())
    }
}
