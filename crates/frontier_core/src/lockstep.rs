//! Lockstep input synchronization.
//!
//! Every participant schedules its local input `input_delay` ticks ahead
//! and sends it as a command frame. A tick is simulated only once the frame
//! of every participant for that tick has arrived; frames are then
//! injected in participant order, so all peers feed the simulator the same
//! input. After each tick the local hash is broadcast and compared with the
//! peers' hashes. A mismatch is fatal and latches the manager.
//!
//! The manager never touches sockets. Outgoing data goes through a
//! [`LockstepTransport`]; incoming data is handed to
//! [`LockstepManager::receive_remote_frame`] and
//! [`LockstepManager::receive_remote_hash`].

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::components::Command;
use crate::error::{GameError, Result};
use crate::simulation::Simulator;

/// Ticks between issuing a local command and executing it.
pub const DEFAULT_INPUT_DELAY: u64 = 2;

/// Local tick hashes kept for comparison with late peer hashes.
pub const LOCKSTEP_HASH_HISTORY: usize = 64;

/// Session parameters shared by every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockstepConfig {
    /// Number of participants.
    pub player_count: u8,
    /// Index of this participant.
    pub local_player: u8,
    /// Ticks of input delay.
    pub input_delay: u64,
}

impl Default for LockstepConfig {
    fn default() -> Self {
        Self {
            player_count: 2,
            local_player: 0,
            input_delay: DEFAULT_INPUT_DELAY,
        }
    }
}

/// Outgoing half of the network boundary.
pub trait LockstepTransport {
    /// Send the local command frame for `tick` to every peer.
    fn send_frame(&mut self, tick: u64, commands: &[Command]);

    /// Broadcast the local hash of `tick`.
    fn broadcast_hash(&mut self, tick: u64, hash: u64);
}

/// A confirmed divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desync {
    /// Tick whose hashes differ.
    pub tick: u64,
    /// Peer that reported the other hash.
    pub player: u8,
    /// Local hash.
    pub local_hash: u64,
    /// Peer hash.
    pub remote_hash: u64,
}

impl Desync {
    const fn to_error(self) -> GameError {
        GameError::DesyncDetected {
            tick: self.tick,
            local_hash: self.local_hash,
            remote_hash: self.remote_hash,
        }
    }
}

/// Per-participant command frame buffer and hash checker.
#[derive(Debug, Clone)]
pub struct LockstepManager {
    config: LockstepConfig,
    start_tick: u64,
    frames: BTreeMap<u64, Vec<Option<Vec<Command>>>>,
    local_pending: Vec<Command>,
    last_sent_tick: u64,
    local_hashes: VecDeque<(u64, u64)>,
    remote_hashes: BTreeMap<(u64, u8), u64>,
    desync: Option<Desync>,
}

impl LockstepManager {
    /// Manager for a session whose simulator currently sits at `start_tick`.
    ///
    /// The first `input_delay` ticks have no input from anyone.
    #[must_use]
    pub fn new(config: LockstepConfig, start_tick: u64) -> Self {
        let player_count = config.player_count.max(1);
        let config = LockstepConfig {
            player_count,
            local_player: config.local_player.min(player_count - 1),
            ..config
        };
        Self {
            config,
            start_tick,
            frames: BTreeMap::new(),
            local_pending: Vec::new(),
            last_sent_tick: start_tick + config.input_delay,
            local_hashes: VecDeque::with_capacity(LOCKSTEP_HASH_HISTORY),
            remote_hashes: BTreeMap::new(),
            desync: None,
        }
    }

    /// Session parameters.
    #[must_use]
    pub const fn config(&self) -> &LockstepConfig {
        &self.config
    }

    /// The latched divergence, if any.
    #[must_use]
    pub const fn desync(&self) -> Option<Desync> {
        self.desync
    }

    /// Local hash recorded for `tick`.
    #[must_use]
    pub fn local_hash(&self, tick: u64) -> Option<u64> {
        self.local_hashes
            .iter()
            .find(|(t, _)| *t == tick)
            .map(|(_, h)| *h)
    }

    /// Buffer a local command for the next outgoing frame.
    pub fn queue_local_command(&mut self, command: Command) {
        self.local_pending.push(command);
    }

    /// Store a peer's command frame.
    ///
    /// Frames for ticks that were already simulated are rejected.
    pub fn receive_remote_frame(&mut self, player: u8, tick: u64, commands: Vec<Command>) -> Result<()> {
        self.check_peer(player)?;
        if tick <= self.start_tick + self.config.input_delay {
            return Err(GameError::InvalidState(format!(
                "frame for tick {tick} from player {player} falls inside the input delay"
            )));
        }
        if self.local_hashes.back().is_some_and(|(t, _)| tick <= *t) {
            return Err(GameError::InvalidState(format!(
                "frame for tick {tick} from player {player} arrived after the tick ran"
            )));
        }
        let slots = self.slots_mut(tick);
        slots[usize::from(player)] = Some(commands);
        trace!(player, tick, "remote frame received");
        Ok(())
    }

    /// Compare a peer's hash with the local one.
    ///
    /// Hashes for ticks not yet simulated are kept until the tick runs.
    pub fn receive_remote_hash(&mut self, player: u8, tick: u64, hash: u64) -> Result<()> {
        if let Some(desync) = self.desync {
            return Err(desync.to_error());
        }
        self.check_peer(player)?;
        match self.local_hash(tick) {
            Some(local) => self.compare(player, tick, local, hash),
            None => {
                if self.local_hashes.back().map_or(true, |(t, _)| tick > *t) {
                    self.remote_hashes.insert((tick, player), hash);
                }
                Ok(())
            }
        }
    }

    /// Simulate the next tick if every participant's frame has arrived.
    ///
    /// Sends the local frame for the tick `input_delay` ahead first, so a
    /// stalled call still keeps peers supplied. Returns `Ok(false)` while
    /// waiting on a peer.
    pub fn try_advance<T: LockstepTransport>(&mut self, sim: &mut Simulator, transport: &mut T) -> Result<bool> {
        if let Some(desync) = self.desync {
            return Err(desync.to_error());
        }
        let next = sim.current_tick() + 1;
        let send_tick = next + self.config.input_delay;
        if send_tick > self.last_sent_tick {
            let commands = std::mem::take(&mut self.local_pending);
            transport.send_frame(send_tick, &commands);
            let local = usize::from(self.config.local_player);
            self.slots_mut(send_tick)[local] = Some(commands);
            self.last_sent_tick = send_tick;
        }

        if next > self.start_tick + self.config.input_delay {
            let ready = self
                .frames
                .get(&next)
                .is_some_and(|slots| slots.iter().all(Option::is_some));
            if !ready {
                return Ok(false);
            }
            if let Some(slots) = self.frames.remove(&next) {
                for commands in slots.into_iter().flatten() {
                    for command in commands {
                        sim.enqueue_command(Command {
                            issue_tick: next,
                            ..command
                        });
                    }
                }
            }
        }

        sim.tick();
        let hash = sim.last_tick_hash();
        if self.local_hashes.len() == LOCKSTEP_HASH_HISTORY {
            self.local_hashes.pop_front();
        }
        self.local_hashes.push_back((next, hash));
        transport.broadcast_hash(next, hash);

        let early: Vec<(u8, u64)> = self
            .remote_hashes
            .range((next, 0)..=(next, u8::MAX))
            .map(|(&(_, player), &remote)| (player, remote))
            .collect();
        self.remote_hashes.retain(|(t, _), _| *t > next);
        for (player, remote) in early {
            self.compare(player, next, hash, remote)?;
        }
        Ok(true)
    }

    fn compare(&mut self, player: u8, tick: u64, local_hash: u64, remote_hash: u64) -> Result<()> {
        if local_hash == remote_hash {
            return Ok(());
        }
        let desync = Desync {
            tick,
            player,
            local_hash,
            remote_hash,
        };
        error!(tick, player, local_hash, remote_hash, "desync detected");
        self.desync = Some(desync);
        Err(desync.to_error())
    }

    fn check_peer(&self, player: u8) -> Result<()> {
        if player >= self.config.player_count || player == self.config.local_player {
            return Err(GameError::InvalidState(format!("player {player} is not a remote participant")));
        }
        Ok(())
    }

    fn slots_mut(&mut self, tick: u64) -> &mut Vec<Option<Vec<Command>>> {
        let count = usize::from(self.config.player_count);
        self.frames.entry(tick).or_insert_with(|| vec![None; count])
    }
}
