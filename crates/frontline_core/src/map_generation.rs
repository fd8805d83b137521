//! Seeded map generation: grid size presets, resource sites and start tiles.
//!
//! Everything random is drawn from the caller's RNG, so a simulation seeded
//! with the same value always produces the same map.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::economy::ResourceKind;
use crate::math::{fixed_serde, ratio, sqrt, Fixed, Vec2Fixed};
use crate::territory::TileCoord;

/// Lowest base production rate of a site, per minute.
pub const MIN_SITE_RATE: i32 = 100;
/// Highest base production rate of a site, per minute.
pub const MAX_SITE_RATE: i32 = 2000;
/// Placement attempts per site before giving up on it.
const MAX_ATTEMPTS: u32 = 100;
/// Tile count the per-kind site counts are tuned for.
const REFERENCE_TILES: u32 = 512;

/// Map dimensions preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MapSize {
    /// 16×16 tiles.
    Small,
    /// 32×16 tiles.
    #[default]
    Medium,
    /// 32×32 tiles.
    Large,
}

impl MapSize {
    /// Width and height in tiles.
    #[must_use]
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Self::Small => (16, 16),
            Self::Medium => (32, 16),
            Self::Large => (32, 32),
        }
    }

    /// Total tile count.
    #[must_use]
    pub const fn tile_count(self) -> u32 {
        let (w, h) = self.dimensions();
        w as u32 * h as u32
    }
}

/// Map generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Grid preset.
    pub size: MapSize,
    /// Seed for the simulation RNG.
    pub seed: u64,
    /// Number of factions needing a start tile.
    pub factions: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            size: MapSize::Medium,
            seed: 12345,
            factions: 2,
        }
    }
}

impl MapConfig {
    /// A small two-faction map.
    #[must_use]
    pub fn small() -> Self {
        Self {
            size: MapSize::Small,
            ..Default::default()
        }
    }

    /// A medium two-faction map.
    #[must_use]
    pub fn medium() -> Self {
        Self::default()
    }

    /// A large two-faction map.
    #[must_use]
    pub fn large() -> Self {
        Self {
            size: MapSize::Large,
            ..Default::default()
        }
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the faction count.
    #[must_use]
    pub fn with_factions(mut self, factions: u8) -> Self {
        self.factions = factions;
        self
    }
}

/// A resource site to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePlacement {
    /// Produced resource.
    pub resource: ResourceKind,
    /// Units per minute at level 1.
    #[serde(with = "fixed_serde")]
    pub base_rate: Fixed,
    /// Containing tile.
    pub tile: TileCoord,
    /// Centre in map units.
    pub position: Vec2Fixed,
    /// Footprint side length.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
}

/// Output of [`generate_map`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedMap {
    /// Width in tiles.
    pub width: u16,
    /// Height in tiles.
    pub height: u16,
    /// Resource sites, grouped by kind in [`ResourceKind::ALL`] order.
    pub sites: Vec<SitePlacement>,
    /// One start tile per faction.
    pub start_tiles: Vec<TileCoord>,
}

/// Sites of one kind on a map of the given size.
///
/// Counts are tuned for a 32×16 map and scaled by tile count, never below one.
#[must_use]
pub fn site_count(kind: ResourceKind, size: MapSize) -> u32 {
    let reference = match kind {
        ResourceKind::Oil => 20,
        ResourceKind::Gold => 15,
        ResourceKind::Wheat => 25,
        ResourceKind::Iron => 18,
        ResourceKind::Copper => 12,
        ResourceKind::Uranium => 8,
    };
    (reference * size.tile_count() / REFERENCE_TILES).max(1)
}

/// Footprint of a site: grows with the square root of its rate.
#[must_use]
pub fn site_size(base_rate: Fixed) -> Fixed {
    let span = Fixed::from_num(MAX_SITE_RATE - MIN_SITE_RATE);
    let scale = Fixed::ONE + (base_rate - Fixed::from_num(MIN_SITE_RATE)) / span * 3;
    ratio(4, 5) * sqrt(scale)
}

/// Evenly spread start tiles, one inset from the map edge.
///
/// Two factions face each other across opposite corners; more are walked
/// around the inset rectangle at equal spacing.
#[must_use]
pub fn start_tiles(width: u16, height: u16, factions: u8) -> Vec<TileCoord> {
    let (w, h) = (i32::from(width), i32::from(height));
    if factions == 0 || w < 3 || h < 3 {
        return Vec::new();
    }
    if factions == 2 {
        return vec![TileCoord::new(1, h - 2), TileCoord::new(w - 2, 1)];
    }

    let (span_x, span_y) = (w - 3, h - 3);
    let perimeter = (2 * (span_x + span_y)).max(1);
    let n = i32::from(factions);
    (0..n)
        .map(|i| {
            let mut step = i * perimeter / n;
            if step < span_x {
                return TileCoord::new(1 + step, 1);
            }
            step -= span_x;
            if step < span_y {
                return TileCoord::new(w - 2, 1 + step);
            }
            step -= span_y;
            if step < span_x {
                return TileCoord::new(w - 2 - step, h - 2);
            }
            step -= span_x;
            TileCoord::new(1, h - 2 - step.min(span_y))
        })
        .collect()
}

/// Smallest Chebyshev distance between two start tiles, so that the 3×3
/// starting blocks never touch.
pub const MIN_START_SPACING: i32 = 3;

/// True when every pair of start tiles is at least [`MIN_START_SPACING`] apart.
#[must_use]
pub fn starts_are_spaced(tiles: &[TileCoord]) -> bool {
    tiles.iter().enumerate().all(|(i, a)| {
        tiles[i + 1..]
            .iter()
            .all(|b| (a.x - b.x).abs().max((a.y - b.y).abs()) >= MIN_START_SPACING)
    })
}

/// Generate resource sites and start tiles.
pub fn generate_map<R: Rng>(config: &MapConfig, tile_size: Fixed, rng: &mut R) -> GeneratedMap {
    let (width, height) = config.size.dimensions();
    let margin = tile_size / 10;
    let min_spacing = tile_size / 8;
    let mut sites: Vec<SitePlacement> = Vec::new();

    for kind in ResourceKind::ALL {
        for _ in 0..site_count(kind, config.size) {
            let mut placed = false;
            for _ in 0..MAX_ATTEMPTS {
                let tile = TileCoord::new(
                    rng.gen_range(0..i32::from(width)),
                    rng.gen_range(0..i32::from(height)),
                );
                let origin = Vec2Fixed::new(
                    tile_size * Fixed::from_num(tile.x),
                    tile_size * Fixed::from_num(tile.y),
                );
                let usable = tile_size - margin * 2;
                let position = origin
                    + Vec2Fixed::new(
                        margin + usable * ratio(rng.gen_range(0..=1000), 1000),
                        margin + usable * ratio(rng.gen_range(0..=1000), 1000),
                    );
                if sites.iter().any(|site| site.position.within(position, min_spacing)) {
                    continue;
                }

                let base_rate = Fixed::from_num(rng.gen_range(MIN_SITE_RATE..=MAX_SITE_RATE));
                sites.push(SitePlacement {
                    resource: kind,
                    base_rate,
                    tile,
                    position,
                    size: site_size(base_rate),
                });
                placed = true;
                break;
            }
            if !placed {
                warn!(resource = kind.id(), "No room for resource site");
            }
        }
    }

    debug!(width, height, sites = sites.len(), "Map generated");
    GeneratedMap {
        width,
        height,
        sites,
        start_tiles: start_tiles(width, height, config.factions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    fn generate(config: &MapConfig) -> GeneratedMap {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        generate_map(config, Fixed::from_num(40), &mut rng)
    }

    #[test]
    fn test_site_counts_scale_with_tiles() {
        assert_eq!(site_count(ResourceKind::Oil, MapSize::Medium), 20);
        assert_eq!(site_count(ResourceKind::Oil, MapSize::Small), 10);
        assert_eq!(site_count(ResourceKind::Oil, MapSize::Large), 40);
        assert_eq!(site_count(ResourceKind::Uranium, MapSize::Small), 4);
    }

    #[test]
    fn test_same_seed_same_map() {
        let config = MapConfig::small().with_seed(99);
        assert_eq!(generate(&config), generate(&config));
        assert_ne!(generate(&config).sites, generate(&config.clone().with_seed(100)).sites);
    }

    #[test]
    fn test_sites_respect_margin_and_spacing() {
        let map = generate(&MapConfig::medium().with_seed(7));
        let tile_size = Fixed::from_num(40);
        assert!(!map.sites.is_empty());

        for (i, site) in map.sites.iter().enumerate() {
            let origin_x = tile_size * Fixed::from_num(site.tile.x);
            let origin_y = tile_size * Fixed::from_num(site.tile.y);
            assert!(site.position.x >= origin_x + Fixed::from_num(4));
            assert!(site.position.x <= origin_x + Fixed::from_num(36));
            assert!(site.position.y >= origin_y + Fixed::from_num(4));
            assert!(site.position.y <= origin_y + Fixed::from_num(36));
            assert!(site.base_rate >= Fixed::from_num(MIN_SITE_RATE));
            assert!(site.base_rate <= Fixed::from_num(MAX_SITE_RATE));

            for other in &map.sites[i + 1..] {
                assert!(!site.position.within(other.position, Fixed::from_num(5) - Fixed::DELTA));
            }
        }
    }

    #[test]
    fn test_site_size_grows_with_rate() {
        let smallest = site_size(Fixed::from_num(MIN_SITE_RATE));
        let largest = site_size(Fixed::from_num(MAX_SITE_RATE));
        assert!((smallest.to_num::<f64>() - 0.8).abs() < 0.001);
        // 0.8 * sqrt(4)
        assert!((largest.to_num::<f64>() - 1.6).abs() < 0.001);
    }

    #[test]
    fn test_two_factions_start_in_opposite_corners() {
        assert_eq!(
            start_tiles(32, 16, 2),
            vec![TileCoord::new(1, 14), TileCoord::new(30, 1)]
        );
    }

    #[test]
    fn test_crowded_start_tiles_are_not_spaced() {
        assert!(starts_are_spaced(&start_tiles(16, 16, 8)));
        assert!(starts_are_spaced(&start_tiles(32, 32, 2)));
        assert!(!starts_are_spaced(&start_tiles(16, 16, 20)));
        assert!(!starts_are_spaced(&start_tiles(16, 16, 60)));
        assert!(!starts_are_spaced(&[TileCoord::new(1, 1), TileCoord::new(3, 3)]));
        assert!(starts_are_spaced(&[TileCoord::new(1, 1), TileCoord::new(4, 2)]));
    }

    #[test]
    fn test_start_tiles_distinct_and_in_bounds() {
        for factions in 1..=8u8 {
            let tiles = start_tiles(16, 16, factions);
            assert_eq!(tiles.len(), usize::from(factions));
            let unique: BTreeSet<_> = tiles.iter().copied().collect();
            assert_eq!(unique.len(), tiles.len());
            for tile in tiles {
                assert!((1..=14).contains(&tile.x) && (1..=14).contains(&tile.y), "{tile}");
            }
        }
    }
}
