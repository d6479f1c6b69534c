use rand::Rng;

/// Debug-only packet loss/jitter injection for testing client prediction
/// and reconciliation against an imperfect link. Draws from `rand` rather
/// than hashing the packet's bytes — this harness never needs to be
/// reproducible across runs, unlike the wire codec.
#[derive(Debug, Clone)]
pub struct PacketLossSimulation {
    pub drop_rate: f32,
    pub extra_latency_ms: u32,
    pub jitter_ms: u32,
    enabled: bool,
}

impl Default for PacketLossSimulation {
    fn default() -> Self {
        Self {
            drop_rate: 0.0,
            extra_latency_ms: 0,
            jitter_ms: 0,
            enabled: false,
        }
    }
}

impl PacketLossSimulation {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(drop_rate: f32, extra_latency_ms: u32, jitter_ms: u32) -> Self {
        Self {
            drop_rate: drop_rate.clamp(0.0, 1.0),
            extra_latency_ms,
            jitter_ms,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` if this send/receive should be dropped.
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        self.enabled && self.drop_rate > 0.0 && rng.gen::<f32>() < self.drop_rate
    }

    /// Extra delay, in milliseconds, to hold this packet before delivery.
    pub fn sample_delay_ms(&self, rng: &mut impl Rng) -> u32 {
        if !self.enabled || self.jitter_ms == 0 {
            return self.extra_latency_ms;
        }
        self.extra_latency_ms + rng.gen_range(0..=self.jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn disabled_simulation_never_drops_or_delays() {
        let sim = PacketLossSimulation::disabled();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(!sim.should_drop(&mut rng));
        }
        assert_eq!(sim.sample_delay_ms(&mut rng), 0);
    }

    #[test]
    fn full_drop_rate_always_drops() {
        let sim = PacketLossSimulation::new(1.0, 0, 0);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..20 {
            assert!(sim.should_drop(&mut rng));
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let sim = PacketLossSimulation::new(0.0, 50, 20);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let delay = sim.sample_delay_ms(&mut rng);
            assert!((50..=70).contains(&delay));
        }
    }
}
