use std::collections::HashMap;

use rand::Rng;

/// Prices drift by a bounded random walk around each item's base price.
/// The economy subsystem is a minimal collaborator, not a full market
/// simulation.
const WALK_STEP_FRACTION: f32 = 0.01;
const MIN_PRICE_FRACTION: f32 = 0.5;
const MAX_PRICE_FRACTION: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
struct PriceState {
    base: f32,
    current: f32,
}

#[derive(Debug, Default)]
pub struct Economy {
    prices: HashMap<u32, PriceState>,
}

impl Economy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_item(&mut self, item_type: u32, base_price: f32) {
        self.prices.entry(item_type).or_insert(PriceState {
            base: base_price,
            current: base_price,
        });
    }

    pub fn price(&self, item_type: u32) -> Option<f32> {
        self.prices.get(&item_type).map(|p| p.current)
    }

    /// Nudges every registered price by a small random fraction of its
    /// base price, clamped to `[0.5x, 2x]` base (pipeline step 6).
    pub fn advance(&mut self, rng: &mut impl Rng) {
        for state in self.prices.values_mut() {
            let step = state.base * WALK_STEP_FRACTION;
            let delta = rng.gen_range(-step..=step);
            let min = state.base * MIN_PRICE_FRACTION;
            let max = state.base * MAX_PRICE_FRACTION;
            state.current = (state.current + delta).clamp(min, max);
        }
    }

    pub fn snapshot(&self) -> HashMap<u32, f32> {
        self.prices.iter().map(|(k, v)| (*k, v.current)).collect()
    }

    pub fn restore(&mut self, prices: &HashMap<u32, f32>) {
        for (item_type, current) in prices {
            if let Some(state) = self.prices.get_mut(item_type) {
                state.current = *current;
            } else {
                self.prices.insert(
                    *item_type,
                    PriceState {
                        base: *current,
                        current: *current,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn price_stays_within_bounds_over_many_steps() {
        let mut economy = Economy::new();
        economy.register_item(1, 100.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            economy.advance(&mut rng);
        }
        let price = economy.price(1).unwrap();
        assert!(price >= 50.0 && price <= 200.0);
    }

    #[test]
    fn restore_reseeds_prices_from_a_snapshot() {
        let mut economy = Economy::new();
        economy.register_item(1, 100.0);
        let mut snapshot = HashMap::new();
        snapshot.insert(1u32, 150.0);
        economy.restore(&snapshot);
        assert_eq!(economy.price(1), Some(150.0));
    }
}
