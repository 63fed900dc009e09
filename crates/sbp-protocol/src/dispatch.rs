//! Command dispatch.
//!
//! Matches a parsed [`Command`] to its handler, applies it to the
//! [`ProtocolState`], invokes the injected [`CommandHooks`] and produces
//! exactly one [`Response`]. A handler that fails leaves the state exactly as
//! it was before the call.

use crate::commands::{Command, CommandId, CommandType};
use crate::error::{PersistError, ProtocolError, ProtocolResult};
use crate::responses::Response;
use crate::state::{ProtocolState, MAX_FREQUENCY, MAX_PERIOD_MS, MIN_PERIOD_MS, PROTOCOL_VERSION};
use crate::telemetry::SensorSet;

/// Which piece of configuration a hook call concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistField {
    /// Radio channel; value is the new frequency.
    RadioFrequency,
    /// Remote device id; value is the new id.
    RemoteId,
    /// Streaming configuration; value from [`streaming_value`].
    Streaming,
}

/// Side effects injected into the dispatcher.
pub trait CommandHooks {
    /// Persist or apply a configuration change.
    ///
    /// Returning an error makes the command fail and rolls the state back.
    fn persist(&mut self, field: PersistField, value: u32) -> Result<(), PersistError>;

    /// Channel the radio is on after the remote id became `remote_id`, when
    /// applying the id retunes it.
    fn remote_frequency(&self, _remote_id: u32) -> Option<u8> {
        None
    }
}

/// Hooks that accept every change without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl CommandHooks for NoopHooks {
    fn persist(&mut self, _field: PersistField, _value: u32) -> Result<(), PersistError> {
        Ok(())
    }
}

impl<F> CommandHooks for F
where
    F: FnMut(PersistField, u32) -> Result<(), PersistError>,
{
    fn persist(&mut self, field: PersistField, value: u32) -> Result<(), PersistError> {
        self(field, value)
    }
}

/// Pack a streaming configuration into a hook value: sensor bits in the low
/// byte, compact flag in bit 8.
pub fn streaming_value(sensors: SensorSet, compact: bool) -> u32 {
    u32::from(sensors.bits()) | (u32::from(compact) << 8)
}

/// Dispatch a parsed command and build its response.
pub fn dispatch<H>(state: &mut ProtocolState, hooks: &mut H, command: &Command<'_>) -> Response
where
    H: CommandHooks + ?Sized,
{
    let saved = state.clone();
    match handle(state, hooks, command) {
        Ok(value) => {
            log::debug!(
                "command {} {}[{}] -> [{}]",
                command.id,
                command.command_type,
                command.value,
                value
            );
            Response::success(command.id, command.command_type, value)
        }
        Err(error) => {
            *state = saved;
            log::debug!(
                "command {} {}[{}] failed: {}",
                command.id,
                command.command_type,
                command.value,
                error
            );
            Response::error(command.id, error)
        }
    }
}

/// Parse and dispatch one command line.
///
/// Lines that fail to parse still get an error response when their id can be
/// recovered; otherwise they are dropped and `None` is returned.
pub fn process_line<H>(state: &mut ProtocolState, hooks: &mut H, line: &[u8]) -> Option<Response>
where
    H: CommandHooks + ?Sized,
{
    match Command::parse(line) {
        Ok(command) => Some(dispatch(state, hooks, &command)),
        Err(error) => match CommandId::scan(line) {
            Some(id) => {
                log::debug!("rejecting command {}: {}", id, error);
                Some(Response::error(id, error))
            }
            None => {
                log::debug!("dropping unparseable line ({} bytes): {}", line.len(), error);
                None
            }
        },
    }
}

fn handle<H>(state: &mut ProtocolState, hooks: &mut H, command: &Command<'_>) -> ProtocolResult<String>
where
    H: CommandHooks + ?Sized,
{
    let value = command.value;
    match command.command_type {
        CommandType::Handshake => Ok(PROTOCOL_VERSION.to_string()),
        CommandType::RadioFrequency => {
            if !value.is_empty() {
                let frequency: u8 = parse_number(value)?;
                if frequency >= MAX_FREQUENCY {
                    return Err(ProtocolError::CommandValue);
                }
                state.radio_frequency = frequency;
                persist(hooks, PersistField::RadioFrequency, u32::from(frequency))?;
            }
            Ok(state.radio_frequency.to_string())
        }
        CommandType::Period => {
            let period: u32 = parse_number(value)?;
            if !(MIN_PERIOD_MS..=MAX_PERIOD_MS).contains(&period) {
                return Err(ProtocolError::CommandValue);
            }
            state.period_ms = period;
            Ok(period.to_string())
        }
        CommandType::RemoteId => {
            if !value.is_empty() {
                let remote_id: u32 = parse_number(value)?;
                state.remote_id = Some(remote_id);
                persist(hooks, PersistField::RemoteId, remote_id)?;
                if let Some(frequency) = hooks.remote_frequency(remote_id) {
                    state.radio_frequency = frequency;
                }
            }
            Ok(state.remote_id.map(|id| id.to_string()).unwrap_or_default())
        }
        CommandType::LocalId => Ok(state.local_id().to_string()),
        CommandType::SoftwareVersion => Ok(state.sw_version.clone()),
        CommandType::HardwareVersion => Ok(state.hw_version.to_string()),
        CommandType::Start => {
            let sensors = SensorSet::from_letters(value)?;
            start_streaming(state, hooks, sensors, false)
        }
        CommandType::CompactStart => start_streaming(state, hooks, SensorSet::compact(), true),
        CommandType::Stop => {
            state.send_periodic = false;
            Ok(String::new())
        }
    }
}

fn start_streaming<H>(
    state: &mut ProtocolState,
    hooks: &mut H,
    sensors: SensorSet,
    compact: bool,
) -> ProtocolResult<String>
where
    H: CommandHooks + ?Sized,
{
    state.enabled_sensors = sensors;
    state.send_periodic = true;
    state.compact_mode = compact;
    persist(hooks, PersistField::Streaming, streaming_value(sensors, compact))?;
    Ok(String::new())
}

fn persist<H>(hooks: &mut H, field: PersistField, value: u32) -> ProtocolResult<()>
where
    H: CommandHooks + ?Sized,
{
    hooks.persist(field, value).map_err(|e| {
        log::warn!("persisting {:?}={} failed: {}", field, value, e);
        ProtocolError::from(e)
    })
}

/// Parse an unsigned decimal value; signs and whitespace are rejected.
fn parse_number<T: std::str::FromStr>(value: &str) -> ProtocolResult<T> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::CommandValue);
    }
    value.parse().map_err(|_| ProtocolError::CommandValue)
}
