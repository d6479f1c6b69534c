use std::collections::HashMap;

use glam::Vec3;

use crate::entity::EntityRegistry;
use crate::world::grid_coord;

/// Coarse spatial pre-filter over the entity registry: buckets entities by
/// `grid_coord` (the same `ZONE_SIZE`-keyed bucketing the zone subsystem
/// uses) and only considers a 3x3 neighbourhood around an observer, rather
/// than scanning every registered entity.
///
/// The 3x3 neighbourhood only makes sense for entities with a finite
/// `sync_radius`. An entity type with an infinite radius (a `Building` is
/// meant to be visible globally, not just from nearby zones) is tracked
/// separately in `global` and never bucketed, so it can't fall out of every
/// observer's neighbourhood just because it's far away.
#[derive(Debug, Default)]
pub struct ZoneGrid {
    buckets: HashMap<(i32, i32), Vec<u32>>,
    global: Vec<u32>,
}

impl ZoneGrid {
    pub fn new() -> Self {
        Self { buckets: HashMap::new(), global: Vec::new() }
    }

    /// Rebuilds the grid from the registry's current entity positions.
    /// Cheap enough to redo once per broadcast phase: an O(N) baseline is
    /// explicitly acceptable here; this only trims the constant.
    pub fn rebuild(&mut self, registry: &EntityRegistry) {
        self.buckets.clear();
        self.global.clear();
        for entity in registry.iter() {
            if !entity.active {
                continue;
            }
            if entity.entity_type.sync_radius().is_infinite() {
                self.global.push(entity.net_id);
                continue;
            }
            self.buckets
                .entry(grid_coord(entity.position))
                .or_default()
                .push(entity.net_id);
        }
    }

    /// Candidate entity ids in `center`'s zone and its 8 neighbours, plus
    /// every globally-visible (infinite-radius) entity regardless of
    /// distance.
    pub fn candidates_near(&self, center: Vec3) -> Vec<u32> {
        let (cx, cy) = grid_coord(center);
        let mut candidates = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.buckets.get(&(cx + dx, cy + dy)) {
                    candidates.extend_from_slice(ids);
                }
            }
        }
        candidates.extend_from_slice(&self.global);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;

    #[test]
    fn candidates_include_neighbouring_zones_only() {
        let mut registry = EntityRegistry::new();
        let near = registry.spawn(EntityType::Item, 0);
        registry.get_mut(near.id()).unwrap().position = Vec3::new(50.0, 0.0, 0.0);

        let far = registry.spawn(EntityType::Item, 0);
        registry.get_mut(far.id()).unwrap().position = Vec3::new(5000.0, 0.0, 0.0);

        let mut grid = ZoneGrid::new();
        grid.rebuild(&registry);

        let candidates = grid.candidates_near(Vec3::ZERO);
        assert!(candidates.contains(&near.id()));
        assert!(!candidates.contains(&far.id()));
    }

    #[test]
    fn building_is_a_candidate_regardless_of_distance() {
        let mut registry = EntityRegistry::new();
        let building = registry.spawn(EntityType::Building, 0);
        registry.get_mut(building.id()).unwrap().position = Vec3::new(5000.0, 0.0, 0.0);

        let mut grid = ZoneGrid::new();
        grid.rebuild(&registry);

        let candidates = grid.candidates_near(Vec3::ZERO);
        assert!(candidates.contains(&building.id()));
    }
}
