//! Bounded roster of recently heard remote devices.
//!
//! The roster keeps at most [`ROSTER_CAPACITY`] devices and one active slot.
//! Silent entries are aged out opportunistically on every update, except the
//! active one, which stays until it is switched away from.

/// Maximum number of tracked remotes.
pub const ROSTER_CAPACITY: usize = 32;

/// Silence after which a non-active remote may be forgotten.
pub const FORGET_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RosterEntry {
    device_id: u32,
    /// Time of the last packet heard from this device.
    last_seen_ms: u64,
}

/// What a [`RemoteRoster::record`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The device became the active one.
    Activated,
    /// A known device was refreshed.
    Refreshed,
    /// A new device was tracked as inactive.
    Added,
    /// A new device was tracked after evicting `evicted`.
    Replaced { evicted: u32 },
}

/// Fixed-capacity table of remote devices plus the active index.
#[derive(Debug, Clone)]
pub struct RemoteRoster {
    slots: [Option<RosterEntry>; ROSTER_CAPACITY],
    active: Option<usize>,
    forget_timeout_ms: u64,
}

impl Default for RemoteRoster {
    fn default() -> Self {
        Self::new(FORGET_TIMEOUT_MS)
    }
}

impl RemoteRoster {
    pub fn new(forget_timeout_ms: u64) -> Self {
        RemoteRoster {
            slots: [None; ROSTER_CAPACITY],
            active: None,
            forget_timeout_ms,
        }
    }

    /// Note a packet heard from `device_id` at `now_ms`.
    pub fn record(&mut self, device_id: u32, now_ms: u64) -> RecordOutcome {
        self.forget_silent(now_ms);

        if let Some(index) = self.position(device_id) {
            self.slots[index] = Some(RosterEntry {
                device_id,
                last_seen_ms: now_ms,
            });
            if self.active.is_none() {
                self.active = Some(index);
                return RecordOutcome::Activated;
            }
            return RecordOutcome::Refreshed;
        }

        let (index, evicted) = match self.slots.iter().position(Option::is_none) {
            Some(index) => (index, None),
            None => match self.oldest_inactive() {
                Some(index) => (index, self.slots[index].map(|e| e.device_id)),
                // Only reachable with a single-slot roster holding the active device.
                None => return RecordOutcome::Refreshed,
            },
        };

        self.slots[index] = Some(RosterEntry {
            device_id,
            last_seen_ms: now_ms,
        });

        if self.active.is_none() {
            self.active = Some(index);
            RecordOutcome::Activated
        } else if let Some(evicted) = evicted {
            log::debug!("roster full, evicted {evicted} for {device_id}");
            RecordOutcome::Replaced { evicted }
        } else {
            RecordOutcome::Added
        }
    }

    /// Clear inactive entries silent for longer than the forget timeout.
    ///
    /// Returns the number of entries removed.
    pub fn forget_silent(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(self.forget_timeout_ms);
        let mut removed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if Some(index) == self.active {
                continue;
            }
            if let Some(entry) = slot {
                if entry.last_seen_ms < cutoff {
                    log::debug!("forgetting silent remote {}", entry.device_id);
                    *slot = None;
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Advance the active slot to the next occupied slot, cycling.
    ///
    /// With a single tracked device this re-selects it. Returns the new
    /// active id, or `None` when the roster is empty.
    pub fn switch_next(&mut self) -> Option<u32> {
        let start = self.active.map_or(0, |i| i + 1);
        let next = (0..ROSTER_CAPACITY)
            .map(|offset| (start + offset) % ROSTER_CAPACITY)
            .find(|&index| self.slots[index].is_some())?;
        self.active = Some(next);
        self.active()
    }

    /// Pin `device_id` as the active device, tracking it if needed.
    pub fn set_active(&mut self, device_id: u32, now_ms: u64) {
        if self.position(device_id).is_none() {
            // Force a fresh slot for the device without letting it auto-activate
            // in place of a different one.
            let previous = self.active.take();
            self.record(device_id, now_ms);
            if self.position(device_id).is_none() {
                self.active = previous;
                return;
            }
        }
        self.active = self.position(device_id);
    }

    /// Id of the active device.
    pub fn active(&self) -> Option<u32> {
        self.active
            .and_then(|index| self.slots[index])
            .map(|entry| entry.device_id)
    }

    pub fn contains(&self, device_id: u32) -> bool {
        self.position(device_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked device ids in slot order.
    pub fn ids(&self) -> Vec<u32> {
        self.slots.iter().flatten().map(|e| e.device_id).collect()
    }

    fn position(&self, device_id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(e) if e.device_id == device_id))
    }

    fn oldest_inactive(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != self.active)
            .filter_map(|(index, slot)| slot.map(|e| (index, e.last_seen_ms)))
            .min_by_key(|&(_, last_seen)| last_seen)
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_device_becomes_active() {
        let mut roster = RemoteRoster::default();
        assert_eq!(roster.active(), None);
        assert_eq!(roster.record(10, 0), RecordOutcome::Activated);
        assert_eq!(roster.record(20, 5), RecordOutcome::Added);
        assert_eq!(roster.record(10, 6), RecordOutcome::Refreshed);
        assert_eq!(roster.active(), Some(10));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_silent_inactive_forgotten() {
        let mut roster = RemoteRoster::default();
        roster.record(1, 0);
        roster.record(2, 0);
        roster.record(3, 1_500);

        // 2 is silent past the timeout; 1 is active and exempt.
        roster.record(3, 2_100);
        assert!(roster.contains(1));
        assert!(!roster.contains(2));
        assert!(roster.contains(3));
        assert_eq!(roster.active(), Some(1));
    }

    #[test]
    fn test_active_never_aged() {
        let mut roster = RemoteRoster::default();
        roster.record(1, 0);
        assert_eq!(roster.forget_silent(1_000_000), 0);
        assert_eq!(roster.active(), Some(1));
    }

    #[test]
    fn test_full_roster_evicts_oldest_inactive() {
        let mut roster = RemoteRoster::default();
        roster.record(1000, 0);
        for id in 1..ROSTER_CAPACITY as u32 {
            roster.record(id, 100 + u64::from(id));
        }
        assert_eq!(roster.len(), ROSTER_CAPACITY);

        let outcome = roster.record(5000, 500);
        assert_eq!(outcome, RecordOutcome::Replaced { evicted: 1 });
        assert!(roster.contains(5000));
        assert_eq!(roster.active(), Some(1000));
    }

    #[test]
    fn test_full_roster_with_stale_entry() {
        // Active X, stale Y, roster otherwise full: a packet from Z evicts Y.
        let (x, y, z) = (0xA, 0xB, 0xC);
        let mut roster = RemoteRoster::default();
        roster.record(x, 0);
        roster.record(y, 0);
        for id in 100..(100 + ROSTER_CAPACITY as u32 - 2) {
            roster.record(id, 1_900);
        }
        assert_eq!(roster.len(), ROSTER_CAPACITY);

        roster.record(z, 2_500);
        assert!(!roster.contains(y));
        assert_eq!(roster.active(), Some(x));
        assert!(roster.contains(z));
    }

    #[test]
    fn test_active_never_evicted_under_pressure() {
        let mut roster = RemoteRoster::default();
        roster.record(7, 0);
        for id in 100..400u32 {
            roster.record(id, u64::from(id));
            assert_eq!(roster.active(), Some(7));
            assert!(roster.len() <= ROSTER_CAPACITY);
        }
    }

    #[test]
    fn test_switch_next_cycles() {
        let mut roster = RemoteRoster::default();
        roster.record(1, 0);
        roster.record(2, 0);
        roster.record(3, 0);

        assert_eq!(roster.switch_next(), Some(2));
        assert_eq!(roster.switch_next(), Some(3));
        assert_eq!(roster.switch_next(), Some(1));
    }

    #[test]
    fn test_switch_next_single_device() {
        let mut roster = RemoteRoster::default();
        assert_eq!(roster.switch_next(), None);
        roster.record(42, 0);
        assert_eq!(roster.switch_next(), Some(42));
        assert_eq!(roster.switch_next(), Some(42));
    }

    #[test]
    fn test_switch_skips_forgotten_slots() {
        let mut roster = RemoteRoster::default();
        roster.record(1, 0);
        roster.record(2, 0);
        roster.record(3, 3_000);
        // Slot of 2 cleared by aging.
        assert!(!roster.contains(2));
        assert_eq!(roster.switch_next(), Some(3));
        assert!(roster.contains(roster.active().unwrap()));
    }

    #[test]
    fn test_set_active() {
        let mut roster = RemoteRoster::default();
        roster.record(1, 0);
        roster.set_active(99, 10);
        assert_eq!(roster.active(), Some(99));
        assert!(roster.contains(1));

        roster.set_active(1, 20);
        assert_eq!(roster.active(), Some(1));
    }
}
