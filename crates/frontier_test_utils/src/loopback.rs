//! In-process lockstep session.
//!
//! Two peers, each with its own simulator and [`LockstepManager`], whose
//! transports write into outboxes that are delivered to the other peer
//! after every round. Delivery can be held back to exercise the barrier.

use frontier_core::components::Command;
use frontier_core::error::Result;
use frontier_core::lockstep::{LockstepConfig, LockstepManager, LockstepTransport};
use frontier_core::simulation::Simulator;

/// Outgoing frames and hashes of one peer, waiting for delivery.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopbackTransport {
    /// Frames sent, in order.
    pub frames: Vec<(u64, Vec<Command>)>,
    /// Hashes broadcast, in order.
    pub hashes: Vec<(u64, u64)>,
}

impl LockstepTransport for LoopbackTransport {
    fn send_frame(&mut self, tick: u64, commands: &[Command]) {
        self.frames.push((tick, commands.to_vec()));
    }

    fn broadcast_hash(&mut self, tick: u64, hash: u64) {
        self.hashes.push((tick, hash));
    }
}

/// One participant.
#[derive(Debug, Clone)]
pub struct LoopbackPeer {
    /// The peer's simulator.
    pub sim: Simulator,
    /// The peer's lockstep manager.
    pub manager: LockstepManager,
    /// Undelivered output.
    pub outbox: LoopbackTransport,
}

/// Outcome of one [`LoopbackSession::round`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Whether peer 0 simulated a tick.
    pub advanced_0: bool,
    /// Whether peer 1 simulated a tick.
    pub advanced_1: bool,
}

/// Two peers wired back to back.
#[derive(Debug, Clone)]
pub struct LoopbackSession {
    /// Participant 0 and 1.
    pub peers: [LoopbackPeer; 2],
}

impl LoopbackSession {
    /// Session between two copies of the simulator built by `setup`.
    pub fn new<F>(setup: F, input_delay: u64) -> Self
    where
        F: Fn() -> Simulator,
    {
        let peer = |local_player: u8| {
            let sim = setup();
            let manager = LockstepManager::new(
                LockstepConfig {
                    player_count: 2,
                    local_player,
                    input_delay,
                },
                sim.current_tick(),
            );
            LoopbackPeer {
                sim,
                manager,
                outbox: LoopbackTransport::default(),
            }
        };
        Self {
            peers: [peer(0), peer(1)],
        }
    }

    /// Queue a command as local input of `player`.
    pub fn queue(&mut self, player: usize, command: Command) {
        self.peers[player].manager.queue_local_command(command);
    }

    /// Let both peers try to advance, then deliver everything sent.
    pub fn round(&mut self) -> Result<RoundOutcome> {
        let outcome = self.advance_only()?;
        self.deliver()?;
        Ok(outcome)
    }

    /// Let both peers try to advance without delivering anything.
    pub fn advance_only(&mut self) -> Result<RoundOutcome> {
        let [p0, p1] = &mut self.peers;
        let advanced_0 = p0.manager.try_advance(&mut p0.sim, &mut p0.outbox)?;
        let advanced_1 = p1.manager.try_advance(&mut p1.sim, &mut p1.outbox)?;
        Ok(RoundOutcome {
            advanced_0,
            advanced_1,
        })
    }

    /// Hand every pending frame and hash to the other peer.
    pub fn deliver(&mut self) -> Result<()> {
        let [p0, p1] = &mut self.peers;
        transfer(p0, 0, p1)?;
        transfer(p1, 1, p0)
    }

    /// Both simulators sit on the same tick with the same hash.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        let [p0, p1] = &self.peers;
        p0.sim.current_tick() == p1.sim.current_tick() && p0.sim.last_tick_hash() == p1.sim.last_tick_hash()
    }
}

fn transfer(from: &mut LoopbackPeer, from_player: u8, to: &mut LoopbackPeer) -> Result<()> {
    for (tick, commands) in from.outbox.frames.drain(..) {
        to.manager.receive_remote_frame(from_player, tick, commands)?;
    }
    for (tick, hash) in from.outbox.hashes.drain(..) {
        to.manager.receive_remote_hash(from_player, tick, hash)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::reference_scenario;

    #[test]
    fn test_held_delivery_stalls_both_peers() {
        let mut session = LoopbackSession::new(|| reference_scenario().0, 2);
        for _ in 0..2 {
            let outcome = session.advance_only().unwrap();
            assert!(outcome.advanced_0 && outcome.advanced_1);
        }
        let stalled = session.advance_only().unwrap();
        assert!(!stalled.advanced_0 && !stalled.advanced_1);
        session.deliver().unwrap();
        let resumed = session.round().unwrap();
        assert!(resumed.advanced_0 && resumed.advanced_1);
        assert!(session.in_sync());
    }
}
