use std::collections::VecDeque;

use crate::error::TransportError;

use super::messages::Payload;

/// One of the three delivery guarantees a payload can travel under. Each
/// channel is a distinct bounded queue per peer so a burst on one never
/// starves another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    ReliableOrdered,
    ReliableUnordered,
    Unreliable,
}

/// Queue depth before a channel is considered backed up.
pub const CHANNEL_CAPACITY: usize = 256;

/// Number of consecutive overloaded ticks tolerated before the peer is
/// disconnected: one tick of backpressure grace before the overload is
/// treated as fatal.
pub const BACKPRESSURE_GRACE_TICKS: u32 = 1;

struct Outgoing {
    payload: Payload,
    /// `PositionUpdate`/`PositionBatch` on the unreliable channel use
    /// newest-wins: a later queued update can replace an unacked stale one
    /// in place rather than growing the queue further.
    is_position_update: bool,
}

fn is_position_update(payload: &Payload) -> bool {
    matches!(payload, Payload::PositionUpdate { .. } | Payload::PositionBatch(_))
}

/// Per-peer send queues across the three channels, split into named
/// channels and given newest-wins drop + backpressure disconnect.
pub struct ChannelSet {
    reliable_ordered: VecDeque<Outgoing>,
    reliable_unordered: VecDeque<Outgoing>,
    unreliable: VecDeque<Outgoing>,
    overloaded_ticks: u32,
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSet {
    pub fn new() -> Self {
        Self {
            reliable_ordered: VecDeque::new(),
            reliable_unordered: VecDeque::new(),
            unreliable: VecDeque::new(),
            overloaded_ticks: 0,
        }
    }

    fn queue_mut(&mut self, channel: Channel) -> &mut VecDeque<Outgoing> {
        match channel {
            Channel::ReliableOrdered => &mut self.reliable_ordered,
            Channel::ReliableUnordered => &mut self.reliable_unordered,
            Channel::Unreliable => &mut self.unreliable,
        }
    }

    /// Enqueues `payload` on `channel`. Position updates on the unreliable
    /// channel replace the newest pending one in place rather than
    /// appending, since only the latest position matters to a lagging peer.
    pub fn enqueue(&mut self, channel: Channel, payload: Payload) -> Result<(), TransportError> {
        let newest_wins = channel == Channel::Unreliable && is_position_update(&payload);
        let queue = self.queue_mut(channel);

        if newest_wins {
            if let Some(back) = queue.back_mut() {
                if back.is_position_update {
                    back.payload = payload;
                    return Ok(());
                }
            }
        }

        if queue.len() >= CHANNEL_CAPACITY {
            if newest_wins {
                queue.pop_front();
            } else {
                return Err(TransportError::BackpressureOverflow);
            }
        }

        queue.push_back(Outgoing {
            payload,
            is_position_update: newest_wins,
        });
        Ok(())
    }

    pub fn drain(&mut self, channel: Channel) -> Vec<Payload> {
        self.queue_mut(channel).drain(..).map(|o| o.payload).collect()
    }

    pub fn depth(&self, channel: Channel) -> usize {
        match channel {
            Channel::ReliableOrdered => self.reliable_ordered.len(),
            Channel::ReliableUnordered => self.reliable_unordered.len(),
            Channel::Unreliable => self.unreliable.len(),
        }
    }

    fn any_channel_full(&self) -> bool {
        self.reliable_ordered.len() >= CHANNEL_CAPACITY
            || self.reliable_unordered.len() >= CHANNEL_CAPACITY
    }

    /// Called once per tick for a peer. Returns `true` once the peer has
    /// been overloaded for longer than the grace period and should be
    /// disconnected.
    pub fn tick_backpressure(&mut self) -> bool {
        if self.any_channel_full() {
            self.overloaded_ticks += 1;
        } else {
            self.overloaded_ticks = 0;
        }
        self.overloaded_ticks > BACKPRESSURE_GRACE_TICKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> Payload {
        Payload::Heartbeat { tick: 0 }
    }

    fn position(tick: u64) -> Payload {
        Payload::PositionUpdate {
            entity_id: 1,
            position: [tick as f32, 0.0, 0.0],
            rotation_compressed: 0,
        }
    }

    #[test]
    fn newest_position_update_replaces_pending_one() {
        let mut channels = ChannelSet::new();
        channels.enqueue(Channel::Unreliable, position(1)).unwrap();
        channels.enqueue(Channel::Unreliable, position(2)).unwrap();
        assert_eq!(channels.depth(Channel::Unreliable), 1);

        let drained = channels.drain(Channel::Unreliable);
        match &drained[0] {
            Payload::PositionUpdate { position, .. } => assert_eq!(position[0], 2.0),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn reliable_channel_overflow_is_rejected_not_dropped() {
        let mut channels = ChannelSet::new();
        for _ in 0..CHANNEL_CAPACITY {
            channels.enqueue(Channel::ReliableOrdered, heartbeat()).unwrap();
        }
        let result = channels.enqueue(Channel::ReliableOrdered, heartbeat());
        assert!(matches!(result, Err(TransportError::BackpressureOverflow)));
    }

    #[test]
    fn backpressure_disconnects_only_after_grace_period() {
        let mut channels = ChannelSet::new();
        for _ in 0..CHANNEL_CAPACITY {
            channels.enqueue(Channel::ReliableOrdered, heartbeat()).unwrap();
        }
        assert!(!channels.tick_backpressure());
        assert!(channels.tick_backpressure());
    }

    #[test]
    fn recovering_below_capacity_resets_overload_counter() {
        let mut channels = ChannelSet::new();
        for _ in 0..CHANNEL_CAPACITY {
            channels.enqueue(Channel::ReliableOrdered, heartbeat()).unwrap();
        }
        assert!(!channels.tick_backpressure());
        channels.drain(Channel::ReliableOrdered);
        assert!(!channels.tick_backpressure());
    }
}
