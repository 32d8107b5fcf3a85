//! Replay recording and scrubbing.
//!
//! While recording, every tick appends a [`ReplayFrame`] (hash plus the
//! tick's events) and every `snapshot_interval` ticks a full snapshot is
//! kept. Externally enqueued commands go into a journal stamped with the
//! tick at which they were enqueued. Jumping to a tick restores the nearest
//! earlier snapshot and resimulates forward, re-injecting journaled input,
//! so the restored state is exactly the recorded one.
//!
//! Enqueuing live input while the simulator sits behind the end of the
//! journal discards the recorded future and starts a new branch.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::components::Command;
use crate::config::DEFAULT_REPLAY_SNAPSHOT_INTERVAL;
use crate::error::{GameError, Result};
use crate::events::{DamageEvent, SimEvent};
use crate::simulation::Simulator;
use crate::snapshot::WorldSnapshot;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// What one recorded tick produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Tick number.
    pub tick: u64,
    /// Tick hash.
    pub hash: u64,
    /// Domain events of the tick.
    pub events: Vec<SimEvent>,
    /// Damage records of the tick.
    pub damage: Vec<DamageEvent>,
}

/// A journaled command and the tick it was enqueued at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Simulator tick when the command was enqueued.
    pub enqueue_tick: u64,
    /// The command.
    pub command: Command,
}

/// Snapshots, frames and input journal of a recorded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTimeline {
    snapshot_interval: u64,
    snapshots: BTreeMap<u64, WorldSnapshot>,
    frames: Vec<ReplayFrame>,
    pub(crate) journal: Vec<JournalEntry>,
    last_recorded_tick: Option<u64>,
}

impl Default for ReplayTimeline {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_SNAPSHOT_INTERVAL)
    }
}

impl ReplayTimeline {
    /// Empty timeline taking a snapshot every `snapshot_interval` ticks.
    #[must_use]
    pub fn new(snapshot_interval: u64) -> Self {
        Self {
            snapshot_interval: snapshot_interval.max(1),
            snapshots: BTreeMap::new(),
            frames: Vec::new(),
            journal: Vec::new(),
            last_recorded_tick: None,
        }
    }

    /// Ticks between snapshots.
    #[must_use]
    pub const fn snapshot_interval(&self) -> u64 {
        self.snapshot_interval
    }

    /// Recorded frames in tick order.
    #[must_use]
    pub fn frames(&self) -> &[ReplayFrame] {
        &self.frames
    }

    /// Frame recorded for `tick`.
    #[must_use]
    pub fn frame(&self, tick: u64) -> Option<&ReplayFrame> {
        self.frames
            .binary_search_by_key(&tick, |f| f.tick)
            .ok()
            .map(|i| &self.frames[i])
    }

    /// Journaled input in enqueue order.
    #[must_use]
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Ticks that have a full snapshot.
    pub fn snapshot_ticks(&self) -> impl Iterator<Item = u64> + '_ {
        self.snapshots.keys().copied()
    }

    /// First tick that can be restored.
    #[must_use]
    pub fn first_tick(&self) -> Option<u64> {
        self.snapshots.keys().next().copied()
    }

    /// Newest recorded tick.
    #[must_use]
    pub const fn last_recorded_tick(&self) -> Option<u64> {
        self.last_recorded_tick
    }

    fn nearest_snapshot(&self, tick: u64) -> Option<&WorldSnapshot> {
        self.snapshots.range(..=tick).next_back().map(|(_, s)| s)
    }

    /// Drop every frame and snapshot newer than `tick`.
    pub(crate) fn discard_after(&mut self, tick: u64) {
        self.frames.retain(|f| f.tick <= tick);
        self.snapshots.retain(|t, _| *t <= tick);
        self.last_recorded_tick = self.last_recorded_tick.map(|t| t.min(tick));
    }

    /// Write the timeline to a file, prefixed by [`REPLAY_VERSION`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(&(REPLAY_VERSION, self))
            .map_err(|e| GameError::Serialization(format!("failed to encode replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Read a timeline written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let found: u32 = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Serialization(format!("failed to read replay header: {e}")))?;
        if found != REPLAY_VERSION {
            return Err(GameError::ReplayVersionMismatch {
                expected: REPLAY_VERSION,
                found,
            });
        }
        let (_, timeline): (u32, Self) = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Serialization(format!("failed to decode replay: {e}")))?;
        Ok(timeline)
    }
}

impl Simulator {
    /// Start recording a fresh timeline from the current state.
    ///
    /// The current state becomes the first snapshot. Any previous journal
    /// is discarded, and the rollback buffer restarts from the same state.
    pub fn enable_replay_recording(&mut self) {
        let mut timeline = ReplayTimeline::new(self.timeline.snapshot_interval());
        let tick = self.world.tick;
        let snapshot = self.capture_snapshot();
        if let Some(buffer) = self.rollback.as_mut() {
            buffer.reset_to(snapshot.clone());
        }
        timeline.snapshots.insert(tick, snapshot);
        timeline.last_recorded_tick = Some(tick);
        self.timeline = timeline;
        self.playback_cursor = 0;
        self.replay_recording = true;
        info!(tick, interval = self.timeline.snapshot_interval(), "replay recording enabled");
    }

    /// Stop appending frames. The recorded timeline stays available.
    pub fn disable_replay_recording(&mut self) {
        self.replay_recording = false;
    }

    /// Whether frames are being recorded.
    #[must_use]
    pub const fn is_recording_replay(&self) -> bool {
        self.replay_recording
    }

    /// The recorded timeline.
    #[must_use]
    pub const fn replay_timeline(&self) -> &ReplayTimeline {
        &self.timeline
    }

    /// Save the recorded timeline to a file.
    pub fn save_replay<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.timeline.save(path)
    }

    /// Load a timeline from a file and restore its first recorded tick.
    pub fn load_replay<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let timeline = ReplayTimeline::load(path)?;
        let first = timeline
            .first_tick()
            .ok_or_else(|| GameError::InvalidState("replay has no snapshot".to_string()))?;
        self.timeline = timeline;
        self.replay_recording = true;
        self.try_load_replay_tick(first)
    }

    /// Restore the state recorded at the end of `tick`.
    ///
    /// Later frames and journal entries are kept, so ticking forward
    /// replays the recorded input and reproduces the recorded hashes.
    /// Event buffers are cleared.
    pub fn try_load_replay_tick(&mut self, tick: u64) -> Result<()> {
        if self.timeline.last_recorded_tick.map_or(true, |last| tick > last) {
            return Err(GameError::InvalidState(format!("tick {tick} has not been recorded")));
        }
        let snapshot = self
            .timeline
            .nearest_snapshot(tick)
            .cloned()
            .ok_or_else(|| GameError::InvalidState(format!("no replay snapshot at or before tick {tick}")))?;
        let base = snapshot.tick;
        self.apply_snapshot(&snapshot);
        self.playback_cursor = self.timeline.journal.partition_point(|e| e.enqueue_tick < base);
        self.resimulate_to(tick);
        self.events.clear();
        if let Some(buffer) = self.rollback.as_mut() {
            buffer.discard_after(tick);
        }
        info!(tick, from_snapshot = base, "replay scrubbed");
        Ok(())
    }

    /// Tick without recording until the world reaches `tick`.
    pub(crate) fn resimulate_to(&mut self, tick: u64) {
        self.resimulating = true;
        while self.world.tick < tick {
            self.tick();
        }
        self.resimulating = false;
    }

    /// Record an externally enqueued command.
    pub(crate) fn journal_command(&mut self, command: Command) {
        if self.resimulating || !(self.replay_recording || self.rollback.is_some()) {
            return;
        }
        let tick = self.world.tick;
        if self.playback_cursor < self.timeline.journal.len() {
            debug!(
                tick,
                discarded = self.timeline.journal.len() - self.playback_cursor,
                "live input truncates recorded future"
            );
            self.timeline.journal.truncate(self.playback_cursor);
            self.timeline.discard_after(tick);
        }
        self.timeline.journal.push(JournalEntry {
            enqueue_tick: tick,
            command,
        });
        self.playback_cursor = self.timeline.journal.len();
    }

    /// Re-inject journaled commands enqueued before the current tick.
    pub(crate) fn inject_playback_commands(&mut self) {
        let tick = self.world.tick;
        while let Some(entry) = self.timeline.journal.get(self.playback_cursor) {
            if entry.enqueue_tick >= tick {
                break;
            }
            self.world.pending_commands.push_back(entry.command);
            self.playback_cursor += 1;
        }
    }

    /// Append the frame of the tick that just ran.
    pub(crate) fn record_replay_frame(&mut self) {
        let tick = self.world.tick;
        if self.timeline.last_recorded_tick.is_some_and(|last| tick <= last) {
            return;
        }
        self.timeline.frames.push(ReplayFrame {
            tick,
            hash: self.last_tick_hash,
            events: self.events.tick_sim_events().to_vec(),
            damage: self.events.tick_damage_events().to_vec(),
        });
        if tick % self.timeline.snapshot_interval == 0 {
            let snapshot = self.capture_snapshot();
            self.timeline.snapshots.insert(tick, snapshot);
        }
        self.timeline.last_recorded_tick = Some(tick);
    }
}
