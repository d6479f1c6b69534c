use std::collections::VecDeque;
use std::time::Instant;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Wrap-aware sequence comparison: `s1` is "newer" than `s2`. This
/// arithmetic is transport-agnostic.
#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone)]
struct PendingPacket {
    sequence: u32,
    send_time: Instant,
    acked: bool,
}

/// Tracks in-flight reliable packets for one peer and derives RTT/unacked
/// counts from incoming ack+bitfield pairs.
#[derive(Debug)]
pub struct AckTracker {
    pending: VecDeque<PendingPacket>,
    max_pending: usize,
    srtt_ms: f32,
    rtt_var_ms: f32,
}

impl AckTracker {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
            srtt_ms: 100.0,
            rtt_var_ms: 50.0,
        }
    }

    pub fn track_packet(&mut self, sequence: u32) {
        while self.pending.len() >= self.max_pending {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingPacket {
            sequence,
            send_time: Instant::now(),
            acked: false,
        });
    }

    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32) -> Vec<u32> {
        let mut acked_sequences = Vec::new();
        let mut rtt_samples = Vec::new();
        let now = Instant::now();

        for pending in &mut self.pending {
            if pending.acked {
                continue;
            }
            let is_acked = if pending.sequence == ack {
                true
            } else if sequence_greater_than(ack, pending.sequence) {
                let diff = ack.wrapping_sub(pending.sequence);
                diff <= 32 && (ack_bitfield & (1 << (diff - 1))) != 0
            } else {
                false
            };

            if is_acked {
                pending.acked = true;
                acked_sequences.push(pending.sequence);
                rtt_samples.push(now.duration_since(pending.send_time).as_secs_f32() * 1000.0);
            }
        }

        for rtt in rtt_samples {
            self.update_rtt(rtt);
        }

        while self.pending.front().is_some_and(|p| p.acked) {
            self.pending.pop_front();
        }

        acked_sequences
    }

    fn update_rtt(&mut self, rtt_ms: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;
        let diff = (rtt_ms - self.srtt_ms).abs();
        self.rtt_var_ms = (1.0 - BETA) * self.rtt_var_ms + BETA * diff;
        self.srtt_ms = (1.0 - ALPHA) * self.srtt_ms + ALPHA * rtt_ms;
    }

    pub fn srtt_ms(&self) -> f32 {
        self.srtt_ms
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.iter().filter(|p| !p.acked).count()
    }
}

/// De-duplicates and orders incoming sequence numbers for one peer,
/// producing the ack + bitfield pair to echo back.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: u32,
    received_bitfield: u32,
    recent_sequences: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: 0,
            received_bitfield: 0,
            recent_sequences: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Returns `true` if this sequence is new (not a duplicate).
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.recent_sequences.contains(&sequence) {
            return false;
        }
        if self.recent_sequences.len() >= self.max_recent {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received);
            self.received_bitfield = if diff <= 32 {
                (self.received_bitfield << diff) | 1
            } else {
                0
            };
            self.last_received = sequence;
        } else {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff > 0 && diff <= 32 {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }
        true
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received, self.received_bitfield)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn receive_tracker_orders_out_of_order_arrivals() {
        let mut tracker = ReceiveTracker::new();
        tracker.record_received(3);
        tracker.record_received(1);
        tracker.record_received(2);
        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
    }

    #[test]
    fn receive_tracker_rejects_duplicates() {
        let mut tracker = ReceiveTracker::new();
        assert!(tracker.record_received(1));
        assert!(!tracker.record_received(1));
    }

    #[test]
    fn ack_tracker_measures_rtt() {
        let mut tracker = AckTracker::new(32);
        tracker.track_packet(1);
        std::thread::sleep(Duration::from_millis(5));
        tracker.process_ack(1, 0);
        assert!(tracker.srtt_ms() > 0.0);
        assert_eq!(tracker.unacked_count(), 0);
    }
}
