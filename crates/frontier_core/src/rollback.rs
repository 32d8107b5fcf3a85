//! Bounded rollback buffer.
//!
//! When enabled, the simulator keeps a snapshot every `interval` ticks in a
//! ring of `capacity` entries and journals every enqueued command. Rolling
//! back to a tick restores the newest snapshot at or before it and
//! resimulates the journaled input. Everything after the rollback tick
//! (snapshots, hashes, frames and input) is discarded.

use std::collections::VecDeque;

use tracing::info;

use crate::error::{GameError, Result};
use crate::simulation::Simulator;
use crate::snapshot::WorldSnapshot;

/// Ring of periodic snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackBuffer {
    interval: u64,
    capacity: usize,
    snapshots: VecDeque<WorldSnapshot>,
}

impl RollbackBuffer {
    /// Empty buffer. Interval and capacity are at least 1.
    #[must_use]
    pub fn new(interval: u64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            interval: interval.max(1),
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    /// Ticks between snapshots.
    #[must_use]
    pub const fn interval(&self) -> u64 {
        self.interval
    }

    /// Snapshots kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Oldest tick that can be rolled back to.
    #[must_use]
    pub fn oldest_tick(&self) -> Option<u64> {
        self.snapshots.front().map(|s| s.tick)
    }

    /// Whether the tick just simulated should be captured.
    const fn is_due(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    /// Store a snapshot, replacing one of the same tick and evicting the
    /// oldest once full.
    pub(crate) fn push(&mut self, snapshot: WorldSnapshot) {
        self.discard_after(snapshot.tick.saturating_sub(1));
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    fn newest_at_or_before(&self, tick: u64) -> Option<&WorldSnapshot> {
        self.snapshots.iter().rev().find(|s| s.tick <= tick)
    }

    /// Drop snapshots newer than `tick`.
    pub(crate) fn discard_after(&mut self, tick: u64) {
        while self.snapshots.back().is_some_and(|s| s.tick > tick) {
            self.snapshots.pop_back();
        }
    }

    /// Drop every snapshot and keep only `snapshot`.
    pub(crate) fn reset_to(&mut self, snapshot: WorldSnapshot) {
        self.snapshots.clear();
        self.snapshots.push_back(snapshot);
    }
}

impl Simulator {
    /// Enable rollback with the intervals from [`SimConfig`](crate::config::SimConfig).
    pub fn enable_rollback(&mut self) {
        let (interval, capacity) = (self.config.rollback_interval, self.config.rollback_capacity);
        self.configure_rollback(interval, capacity);
    }

    /// Enable rollback with a snapshot every `interval` ticks, keeping
    /// `capacity` of them. The state at the end of the current tick is
    /// captured immediately.
    pub fn configure_rollback(&mut self, interval: u64, capacity: usize) {
        let mut buffer = RollbackBuffer::new(interval, capacity);
        buffer.push(self.end_of_tick_snapshot());
        info!(
            tick = self.world.tick,
            interval = buffer.interval(),
            capacity = buffer.capacity(),
            "rollback enabled"
        );
        self.rollback = Some(buffer);
    }

    /// Snapshot without the input journaled since the current tick ended.
    ///
    /// Those commands sit at the back of the pending queue and are
    /// re-injected from the journal on the next tick after a restore, so
    /// keeping them in the snapshot would run them twice.
    fn end_of_tick_snapshot(&self) -> WorldSnapshot {
        let mut snapshot = self.capture_snapshot();
        let tick = self.world.tick;
        let journaled_now = self.timeline.journal[..self.playback_cursor.min(self.timeline.journal.len())]
            .iter()
            .rev()
            .take_while(|e| e.enqueue_tick == tick)
            .count();
        let keep = snapshot.pending_commands.len().saturating_sub(journaled_now);
        snapshot.pending_commands.truncate(keep);
        snapshot
    }

    /// Disable rollback and drop its snapshots.
    pub fn disable_rollback(&mut self) {
        self.rollback = None;
    }

    /// The rollback buffer, when enabled.
    #[must_use]
    pub const fn rollback_buffer(&self) -> Option<&RollbackBuffer> {
        self.rollback.as_ref()
    }

    /// Capture the tick that just ran if it falls on the interval.
    pub(crate) fn record_rollback_snapshot(&mut self) {
        if self.resimulating {
            return;
        }
        let tick = self.world.tick;
        if !self.rollback.as_ref().is_some_and(|b| b.is_due(tick)) {
            return;
        }
        let snapshot = self.capture_snapshot();
        let Some(buffer) = self.rollback.as_mut() else {
            return;
        };
        buffer.push(snapshot);
        let oldest = buffer.oldest_tick().unwrap_or(tick);

        // Without a replay timeline, input older than the window is dead.
        if !self.replay_recording {
            let stale = self.timeline.journal.partition_point(|e| e.enqueue_tick < oldest);
            if stale > 0 {
                self.timeline.journal.drain(..stale);
                self.playback_cursor = self.playback_cursor.saturating_sub(stale);
            }
        }
    }

    /// Rewind to the state at the end of `tick`.
    ///
    /// Input enqueued at or after `tick` is discarded along with every
    /// later snapshot, hash and replay frame. Fails without mutation when
    /// rollback is disabled, `tick` lies in the future, or it is older
    /// than the buffer.
    pub fn try_rollback_to_tick(&mut self, tick: u64) -> Result<()> {
        let current = self.world.tick;
        if tick > current {
            return Err(GameError::InvalidState(format!(
                "cannot roll back to future tick {tick} (current tick {current})"
            )));
        }
        let buffer = self
            .rollback
            .as_ref()
            .ok_or_else(|| GameError::InvalidState("rollback is not enabled".to_string()))?;
        let snapshot = buffer.newest_at_or_before(tick).cloned().ok_or_else(|| {
            GameError::InvalidState(format!(
                "tick {tick} is older than the rollback window (oldest {:?})",
                buffer.oldest_tick()
            ))
        })?;

        let base = snapshot.tick;
        self.apply_snapshot(&snapshot);
        self.playback_cursor = self.timeline.journal.partition_point(|e| e.enqueue_tick < base);
        self.resimulate_to(tick);

        let keep = self.timeline.journal.partition_point(|e| e.enqueue_tick < tick);
        self.timeline.journal.truncate(keep);
        self.playback_cursor = self.timeline.journal.len();
        self.timeline.discard_after(tick);
        if let Some(buffer) = self.rollback.as_mut() {
            buffer.discard_after(tick);
        }
        self.hashes.truncate_after(tick);
        self.events.clear();
        info!(from = current, to = tick, base, "rolled back");
        Ok(())
    }
}
