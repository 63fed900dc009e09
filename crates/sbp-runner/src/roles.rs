//! Wiring of each role from its configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use sbp_bridge::BridgeRelay;
use sbp_protocol::{PersistField, ProtocolState, MAX_FREQUENCY};
use sbp_radio::{frequency_from_id, RadioLink};

use crate::clock::{Clock, SystemClock};
use crate::config::{Role, RunnerConfig};
use crate::error::RunnerResult;
use crate::hooks::FirmwareHooks;
use crate::persist::NvWord;
use crate::radio::{RadioSide, UdpRadio};
use crate::remote::RemoteNode;
use crate::scheduler::Scheduler;
use crate::sensors::{BridgeSnapshots, LocalSnapshots, SyntheticSensors};
use crate::serial::StdioSerial;

/// Run the configured role until `shutdown` is set.
pub fn run(config: &RunnerConfig, shutdown: Arc<AtomicBool>) -> RunnerResult<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    tracing::info!(
        "starting {:?} as device {} (hw {}, sw {})",
        config.role,
        config.local_id,
        config.hw_version,
        config.sw_version
    );
    match config.role {
        Role::LocalSensors => run_local_sensors(config, clock, &shutdown),
        Role::RadioBridge => run_bridge(config, clock, shutdown),
        Role::RadioRemote => run_remote(config, clock, shutdown),
    }
}

fn config_word(config: &RunnerConfig) -> NvWord {
    match &config.persist_path {
        Some(path) => NvWord::file(path),
        None => NvWord::in_memory(),
    }
}

fn initial_state(config: &RunnerConfig) -> ProtocolState {
    ProtocolState::new(config.local_id)
        .with_period_ms(config.period_ms)
        .with_radio_frequency(config.initial_frequency())
        .with_versions(config.hw_version, config.sw_version.clone())
}

fn run_local_sensors(
    config: &RunnerConfig,
    clock: Arc<dyn Clock>,
    shutdown: &AtomicBool,
) -> RunnerResult<()> {
    let word = config_word(config);
    let mut state = initial_state(config);
    if let Some(frequency) = word.load()? {
        match u8::try_from(frequency) {
            Ok(frequency) if frequency < MAX_FREQUENCY => state.radio_frequency = frequency,
            _ => tracing::warn!("ignoring stored frequency {frequency}"),
        }
    }

    let hooks = FirmwareHooks::new(word, clock.clone()).persisting(PersistField::RadioFrequency);
    let mut scheduler = Scheduler::new(
        state,
        hooks,
        StdioSerial::spawn()?,
        LocalSnapshots::new(SyntheticSensors::new(config.sensor_seed)),
        clock,
        config.scheduler.clone(),
    );
    scheduler.run(shutdown)
}

fn run_bridge(
    config: &RunnerConfig,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
) -> RunnerResult<()> {
    let word = config_word(config);
    let mut state = initial_state(config);
    let committed = word.load()?;
    if let Some(remote_id) = committed {
        state.remote_id = Some(remote_id);
        state.radio_frequency = frequency_from_id(remote_id);
    }

    let radio = Arc::new(UdpRadio::new(
        config.radio.clone(),
        RadioSide::Bridge,
        state.radio_frequency,
    )?);
    let link: Arc<dyn RadioLink> = radio.clone();
    let relay = Arc::new(BridgeRelay::new(link.clone(), config.relay));
    if let Some(remote_id) = committed {
        relay.set_active(remote_id, clock.now_ms())?;
    }

    let receiver = {
        let relay = relay.clone();
        let clock = clock.clone();
        radio.spawn_receiver(shutdown.clone(), move |bytes| {
            relay.on_radio_receive(bytes, clock.now_ms());
        })?
    };

    let mut source = BridgeSnapshots::new(relay.clone());
    if config.switch_button {
        source = source.with_switch_button(Box::new(SyntheticSensors::new(
            config.sensor_seed.wrapping_add(1),
        )));
    }

    let hooks = FirmwareHooks::new(word, clock.clone())
        .persisting(PersistField::RemoteId)
        .with_radio(link)
        .with_relay(relay);
    let mut scheduler = Scheduler::new(
        state,
        hooks,
        StdioSerial::spawn()?,
        source,
        clock,
        config.scheduler.clone(),
    );

    let result = scheduler.run(&shutdown);
    stop(&shutdown, receiver);
    result
}

fn run_remote(
    config: &RunnerConfig,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
) -> RunnerResult<()> {
    let radio = Arc::new(UdpRadio::new(
        config.radio.clone(),
        RadioSide::Remote,
        config.initial_frequency(),
    )?);
    let node = Arc::new(RemoteNode::new(
        config.local_id,
        radio.clone(),
        Box::new(SyntheticSensors::new(config.sensor_seed)),
    ));

    let receiver = {
        let node = node.clone();
        radio.spawn_receiver(shutdown.clone(), move |bytes| {
            node.on_radio_receive(bytes);
        })?
    };

    node.run(clock.as_ref(), &shutdown);
    stop(&shutdown, receiver);
    Ok(())
}

fn stop(shutdown: &AtomicBool, receiver: JoinHandle<()>) {
    shutdown.store(true, Ordering::Relaxed);
    if receiver.join().is_err() {
        tracing::error!("radio receive thread panicked");
    }
}
