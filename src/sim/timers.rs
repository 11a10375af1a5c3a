//! Cancelable scheduled callbacks
//!
//! The only suspension points in the simulation. Each scheduled task gets a
//! handle that can be revoked before it fires; `clear` revokes everything and
//! is called when a new match starts.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::weapon::WeaponKind;

/// Handle to a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// Work a timer performs when it comes due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduledTask {
    /// Retire a projectile whose lifetime elapsed
    ProjectileExpire { projectile_id: u32 },
    /// Periodic spawner poll
    SpawnTick,
    /// Shotgun repeat shot granted by the Double buff
    SecondShot { weapon: WeaponKind, aim_angle: f32 },
    /// End of a kill hit-stop
    HitStopResume,
    /// Perk choices become clickable
    PerkChoiceUnlock,
}

/// A timer that came due
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    /// When it was scheduled to fire (may be earlier than the tick that ran it)
    pub due_ms: u64,
    pub task: ScheduledTask,
}

/// Min-ordered timer queue keyed by (due time, handle)
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BTreeMap<(u64, TimerHandle), ScheduledTask>,
    due_by_handle: HashMap<TimerHandle, u64>,
    next_handle: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run once `now >= due_ms`
    pub fn schedule(&mut self, due_ms: u64, task: ScheduledTask) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.queue.insert((due_ms, handle), task);
        self.due_by_handle.insert(handle, due_ms);
        handle
    }

    /// Revoke a pending timer. Returns false if it already fired or was revoked.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.due_by_handle.remove(&handle) {
            Some(due) => self.queue.remove(&(due, handle)).is_some(),
            None => false,
        }
    }

    /// Pop the earliest task due at `now`, if any
    pub fn pop_due(&mut self, now_ms: u64) -> Option<FiredTimer> {
        let (&(due_ms, handle), _) = self.queue.first_key_value()?;
        if due_ms > now_ms {
            return None;
        }
        self.due_by_handle.remove(&handle);
        self.queue
            .remove(&(due_ms, handle))
            .map(|task| FiredTimer { handle, due_ms, task })
    }

    /// Revoke every pending timer
    pub fn clear(&mut self) {
        let revoked = self.queue.len();
        self.queue.clear();
        self.due_by_handle.clear();
        if revoked > 0 {
            log::debug!("Revoked {} pending timers", revoked);
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due_by_handle.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_due_order() {
        let mut timers = Scheduler::new();
        timers.schedule(300, ScheduledTask::HitStopResume);
        timers.schedule(100, ScheduledTask::SpawnTick);
        timers.schedule(200, ScheduledTask::PerkChoiceUnlock);

        assert!(timers.pop_due(50).is_none());
        assert_eq!(timers.pop_due(150).map(|fired| fired.due_ms), Some(100));
        timers.schedule(100, ScheduledTask::SpawnTick);
        let order: Vec<_> = std::iter::from_fn(|| timers.pop_due(1000)).map(|fired| fired.task).collect();
        assert_eq!(
            order,
            vec![
                ScheduledTask::SpawnTick,
                ScheduledTask::PerkChoiceUnlock,
                ScheduledTask::HitStopResume
            ]
        );
    }

    #[test]
    fn test_cancel_revokes_once() {
        let mut timers = Scheduler::new();
        let handle = timers.schedule(100, ScheduledTask::ProjectileExpire { projectile_id: 7 });
        assert!(timers.is_pending(handle));
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(timers.pop_due(1000).is_none());
    }

    #[test]
    fn test_clear_revokes_everything() {
        let mut timers = Scheduler::new();
        let a = timers.schedule(10, ScheduledTask::SpawnTick);
        timers.schedule(20, ScheduledTask::HitStopResume);
        timers.clear();
        assert!(timers.is_empty());
        assert!(!timers.is_pending(a));
        // Handles are never reused after a clear
        let b = timers.schedule(10, ScheduledTask::SpawnTick);
        assert_ne!(a, b);
    }
}
