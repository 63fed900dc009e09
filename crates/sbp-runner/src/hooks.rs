//! Command side effects for the host build.

use std::sync::Arc;

use sbp_bridge::BridgeRelay;
use sbp_protocol::{CommandHooks, PersistError, PersistField};
use sbp_radio::{frequency_from_id, RadioLink};

use crate::clock::Clock;
use crate::persist::NvWord;

/// Persistence and radio side effects of configuration commands.
///
/// One field is backed by the write-once [`NvWord`]; which one depends on the
/// role (the bridge commits the remote id, the other roles the frequency).
pub struct FirmwareHooks {
    word: NvWord,
    persisted: Option<PersistField>,
    radio: Option<Arc<dyn RadioLink>>,
    relay: Option<Arc<BridgeRelay>>,
    clock: Arc<dyn Clock>,
}

impl FirmwareHooks {
    pub fn new(word: NvWord, clock: Arc<dyn Clock>) -> Self {
        FirmwareHooks {
            word,
            persisted: None,
            radio: None,
            relay: None,
            clock,
        }
    }

    /// Commit `field` to the configuration word.
    pub fn persisting(mut self, field: PersistField) -> Self {
        self.persisted = Some(field);
        self
    }

    /// Retune `radio` when the frequency changes.
    pub fn with_radio(mut self, radio: Arc<dyn RadioLink>) -> Self {
        self.radio = Some(radio);
        self
    }

    /// Pin the active remote on `relay` when the remote id changes.
    pub fn with_relay(mut self, relay: Arc<BridgeRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// The configuration word.
    pub fn word(&self) -> &NvWord {
        &self.word
    }
}

impl FirmwareHooks {
    /// Apply the radio and relay side effects of a change.
    fn apply(&self, field: PersistField, value: u32) -> Result<(), PersistError> {
        match field {
            PersistField::RadioFrequency => {
                if let Some(radio) = &self.radio {
                    let frequency = u8::try_from(value)
                        .map_err(|_| PersistError::Storage(format!("frequency {value}")))?;
                    radio
                        .set_frequency(frequency)
                        .map_err(|e| PersistError::Storage(e.to_string()))?;
                }
            }
            PersistField::RemoteId => {
                if let Some(relay) = &self.relay {
                    relay
                        .set_active(value, self.clock.now_ms())
                        .map_err(|e| PersistError::Storage(e.to_string()))?;
                }
            }
            PersistField::Streaming => {
                tracing::debug!("streaming configuration {value:#x}");
            }
        }
        Ok(())
    }
}

impl CommandHooks for FirmwareHooks {
    /// Rejects a conflicting value before touching the radio, and commits the
    /// word only once the side effects succeeded.
    fn persist(&mut self, field: PersistField, value: u32) -> Result<(), PersistError> {
        let persisted = self.persisted == Some(field);
        if persisted {
            self.word.check(value)?;
        }
        self.apply(field, value)?;
        if persisted {
            self.word.commit(value)?;
        }
        Ok(())
    }

    fn remote_frequency(&self, remote_id: u32) -> Option<u8> {
        self.relay.as_ref().map(|_| frequency_from_id(remote_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use parking_lot::Mutex;
    use sbp_protocol::{process_line, ProtocolState};
    use sbp_radio::{PacketError, PACKET_SIZE};

    /// Radio whose retune can be made to fail.
    #[derive(Default)]
    struct TunableRadio {
        offline: Mutex<bool>,
        tuned: Mutex<Option<u8>>,
    }

    impl RadioLink for TunableRadio {
        fn transmit(&self, _frame: &[u8; PACKET_SIZE]) -> Result<(), PacketError> {
            Ok(())
        }

        fn set_frequency(&self, frequency: u8) -> Result<(), PacketError> {
            if *self.offline.lock() {
                return Err(PacketError::transmit("radio offline"));
            }
            *self.tuned.lock() = Some(frequency);
            Ok(())
        }
    }

    fn hooks(field: PersistField) -> FirmwareHooks {
        FirmwareHooks::new(NvWord::in_memory(), Arc::new(ManualClock::default())).persisting(field)
    }

    fn run(state: &mut ProtocolState, hooks: &mut FirmwareHooks, line: &str) -> String {
        let response = process_line(state, hooks, line.as_bytes()).unwrap();
        String::from_utf8(response.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_remote_id_committed_once() {
        let mut state = ProtocolState::new(1);
        let mut hooks = hooks(PersistField::RemoteId);

        assert_eq!(run(&mut state, &mut hooks, "C[1]RMBID[555]"), "R[1]RMBID[555]\n");
        assert_eq!(hooks.word().load().unwrap(), Some(555));

        // A different id is rejected and the committed one is still reported.
        assert_eq!(run(&mut state, &mut hooks, "C[2]RMBID[777]"), "R[2]ERROR[-7]\n");
        assert_eq!(run(&mut state, &mut hooks, "C[3]RMBID[]"), "R[3]RMBID[555]\n");

        // Re-sending the committed id is fine.
        assert_eq!(run(&mut state, &mut hooks, "C[4]RMBID[555]"), "R[4]RMBID[555]\n");
    }

    #[test]
    fn test_frequency_not_persisted_when_other_field() {
        let mut state = ProtocolState::new(1);
        let mut hooks = hooks(PersistField::RemoteId);

        assert_eq!(run(&mut state, &mut hooks, "C[1]RF[10]"), "R[1]RF[10]\n");
        assert_eq!(run(&mut state, &mut hooks, "C[2]RF[11]"), "R[2]RF[11]\n");
        assert_eq!(hooks.word().load().unwrap(), None);
    }

    #[test]
    fn test_frequency_committed() {
        let mut state = ProtocolState::new(1);
        let mut hooks = hooks(PersistField::RadioFrequency);

        assert_eq!(run(&mut state, &mut hooks, "C[1]RF[10]"), "R[1]RF[10]\n");
        assert_eq!(run(&mut state, &mut hooks, "C[2]RF[11]"), "R[2]ERROR[-7]\n");
        assert_eq!(state.radio_frequency, 10);
    }

    #[test]
    fn test_failed_retune_leaves_word_unset() {
        let radio = Arc::new(TunableRadio::default());
        let mut hooks = hooks(PersistField::RadioFrequency).with_radio(radio.clone());
        let mut state = ProtocolState::new(1);

        *radio.offline.lock() = true;
        assert_eq!(run(&mut state, &mut hooks, "C[1]RF[10]"), "R[1]ERROR[-7]\n");
        assert_eq!(hooks.word().load().unwrap(), None);
        assert_eq!(state.radio_frequency, 0);

        *radio.offline.lock() = false;
        assert_eq!(run(&mut state, &mut hooks, "C[2]RF[10]"), "R[2]RF[10]\n");
        assert_eq!(hooks.word().load().unwrap(), Some(10));
        assert_eq!(*radio.tuned.lock(), Some(10));
    }

    #[test]
    fn test_conflicting_value_does_not_retune() {
        let radio = Arc::new(TunableRadio::default());
        let mut hooks = hooks(PersistField::RadioFrequency).with_radio(radio.clone());
        let mut state = ProtocolState::new(1);

        run(&mut state, &mut hooks, "C[1]RF[10]");
        assert_eq!(run(&mut state, &mut hooks, "C[2]RF[11]"), "R[2]ERROR[-7]\n");
        assert_eq!(*radio.tuned.lock(), Some(10));
    }
}
