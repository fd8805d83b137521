//! Territory grid: the tile ownership map.
//!
//! The grid is fully populated at construction and every tile always has a
//! defined owner (possibly `None`). Ownership changes only through the capture
//! engine and starting-territory setup.

use serde::{Deserialize, Serialize};

use crate::factions::FactionId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Grid coordinate of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One territory tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Position in the grid.
    pub coord: TileCoord,
    /// Current owner.
    pub owner: Option<FactionId>,
    /// Capture progress in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub capture_progress: Fixed,
    /// Faction currently making progress.
    pub capturing: Option<FactionId>,
}

impl Tile {
    /// Create an unowned tile.
    #[must_use]
    pub const fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            owner: None,
            capture_progress: Fixed::ZERO,
            capturing: None,
        }
    }
}

/// 4-directional neighbour offsets.
const NEIGHBOURS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Rectangular grid of territory tiles, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerritoryGrid {
    width: i32,
    height: i32,
    #[serde(with = "fixed_serde")]
    tile_size: Fixed,
    tiles: Vec<Tile>,
}

impl TerritoryGrid {
    /// Create a grid of unowned tiles.
    #[must_use]
    pub fn new(width: u16, height: u16, tile_size: Fixed) -> Self {
        let (width, height) = (i32::from(width), i32::from(height));
        let tiles = (0..height)
            .flat_map(|y| (0..width).map(move |x| Tile::new(TileCoord::new(x, y))))
            .collect();
        Self {
            width,
            height,
            tile_size,
            tiles,
        }
    }

    /// Columns.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Rows.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Side length of one tile in map units.
    #[must_use]
    pub const fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    /// Total number of tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether the grid has no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Whether `coord` lies on the grid.
    #[must_use]
    pub const fn in_bounds(&self, coord: TileCoord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.height
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.y * self.width + coord.x) as usize)
        } else {
            None
        }
    }

    /// Tile at `coord`.
    #[must_use]
    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.index(coord).and_then(|i| self.tiles.get(i))
    }

    pub(crate) fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.index(coord).and_then(|i| self.tiles.get_mut(i))
    }

    /// Iterate tiles row by row.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub(crate) fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// Owner of the tile at `coord` (`None` for neutral or off-grid).
    #[must_use]
    pub fn owner_of(&self, coord: TileCoord) -> Option<FactionId> {
        self.tile(coord).and_then(|tile| tile.owner)
    }

    /// In-bounds 4-directional neighbours, in left, right, up, down order.
    #[must_use]
    pub fn adjacent_tiles(&self, coord: TileCoord) -> Vec<TileCoord> {
        NEIGHBOURS
            .iter()
            .map(|(dx, dy)| coord.offset(*dx, *dy))
            .filter(|c| self.in_bounds(*c))
            .collect()
    }

    /// Whether any neighbour of `coord` is owned by `faction`.
    #[must_use]
    pub fn is_adjacent_to_territory(&self, coord: TileCoord, faction: FactionId) -> bool {
        self.adjacent_tiles(coord)
            .into_iter()
            .any(|c| self.owner_of(c) == Some(faction))
    }

    /// Tile containing a map position.
    #[must_use]
    pub fn tile_at(&self, position: Vec2Fixed) -> Option<TileCoord> {
        let x = (position.x / self.tile_size).floor().to_num::<i32>();
        let y = (position.y / self.tile_size).floor().to_num::<i32>();
        let coord = TileCoord::new(x, y);
        self.in_bounds(coord).then_some(coord)
    }

    /// Centre of a tile in map units.
    #[must_use]
    pub fn tile_center(&self, coord: TileCoord) -> Vec2Fixed {
        let half = self.tile_size / 2;
        Vec2Fixed::new(
            Fixed::from_num(coord.x) * self.tile_size + half,
            Fixed::from_num(coord.y) * self.tile_size + half,
        )
    }

    /// Top-left corner of a tile in map units.
    #[must_use]
    pub fn tile_origin(&self, coord: TileCoord) -> Vec2Fixed {
        Vec2Fixed::new(
            Fixed::from_num(coord.x) * self.tile_size,
            Fixed::from_num(coord.y) * self.tile_size,
        )
    }

    /// Tiles owned by `faction`.
    #[must_use]
    pub fn owned_tiles(&self, faction: FactionId) -> Vec<TileCoord> {
        self.tiles
            .iter()
            .filter(|tile| tile.owner == Some(faction))
            .map(|tile| tile.coord)
            .collect()
    }

    /// Number of tiles owned by `faction`.
    #[must_use]
    pub fn territory_count(&self, faction: FactionId) -> usize {
        self.tiles.iter().filter(|tile| tile.owner == Some(faction)).count()
    }

    /// Give `faction` the tile at `coord` plus every unowned neighbour.
    ///
    /// Returns the tiles claimed.
    pub fn claim_starting_territory(&mut self, coord: TileCoord, faction: FactionId) -> Vec<TileCoord> {
        let mut claimed = Vec::new();
        if let Some(tile) = self.tile_mut(coord) {
            tile.owner = Some(faction);
            tile.capture_progress = Fixed::ZERO;
            tile.capturing = None;
            claimed.push(coord);
        } else {
            return claimed;
        }
        for neighbour in self.adjacent_tiles(coord) {
            if let Some(tile) = self.tile_mut(neighbour) {
                if tile.owner.is_none() {
                    tile.owner = Some(faction);
                    claimed.push(neighbour);
                }
            }
        }
        claimed
    }

    /// Map extent in map units (bottom-right corner).
    #[must_use]
    pub fn bounds(&self) -> Vec2Fixed {
        Vec2Fixed::new(
            Fixed::from_num(self.width) * self.tile_size,
            Fixed::from_num(self.height) * self.tile_size,
        )
    }

    /// Clamp a position into the map.
    #[must_use]
    pub fn clamp_to_bounds(&self, position: Vec2Fixed) -> Vec2Fixed {
        position.clamp(Vec2Fixed::ZERO, self.bounds())
    }

    /// Whether a square footprint of `size` centred at `centre` stays on the map.
    #[must_use]
    pub fn footprint_in_bounds(&self, centre: Vec2Fixed, size: Fixed) -> bool {
        let half = size / 2;
        let max = self.bounds();
        centre.x - half >= Fixed::ZERO
            && centre.y - half >= Fixed::ZERO
            && centre.x + half <= max.x
            && centre.y + half <= max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TerritoryGrid {
        TerritoryGrid::new(4, 3, Fixed::from_num(40))
    }

    #[test]
    fn test_grid_is_fully_populated() {
        let grid = grid();
        assert_eq!(grid.len(), 12);
        assert!(grid.tiles().all(|tile| tile.owner.is_none()));
        assert_eq!(grid.tile(TileCoord::new(3, 2)).unwrap().coord, TileCoord::new(3, 2));
        assert!(grid.tile(TileCoord::new(4, 0)).is_none());
    }

    #[test]
    fn test_adjacent_tiles_in_bounds_only() {
        let grid = grid();
        assert_eq!(
            grid.adjacent_tiles(TileCoord::new(0, 0)),
            vec![TileCoord::new(1, 0), TileCoord::new(0, 1)]
        );
        assert_eq!(grid.adjacent_tiles(TileCoord::new(1, 1)).len(), 4);
    }

    #[test]
    fn test_claim_starting_territory_skips_owned_neighbours() {
        let mut grid = grid();
        grid.claim_starting_territory(TileCoord::new(0, 0), FactionId(1));
        let claimed = grid.claim_starting_territory(TileCoord::new(1, 1), FactionId(0));

        // (1,0) and (0,1) already belonged to faction 1
        assert_eq!(claimed.len(), 3);
        assert_eq!(grid.owner_of(TileCoord::new(1, 0)), Some(FactionId(1)));
        assert_eq!(grid.owner_of(TileCoord::new(2, 1)), Some(FactionId(0)));
        assert_eq!(grid.territory_count(FactionId(0)), 3);
        assert_eq!(grid.territory_count(FactionId(1)), 3);
    }

    #[test]
    fn test_is_adjacent_to_territory() {
        let mut grid = grid();
        grid.claim_starting_territory(TileCoord::new(0, 0), FactionId(0));
        assert!(grid.is_adjacent_to_territory(TileCoord::new(2, 0), FactionId(0)));
        assert!(!grid.is_adjacent_to_territory(TileCoord::new(3, 2), FactionId(0)));
    }

    #[test]
    fn test_tile_at_and_center() {
        let grid = grid();
        let coord = grid.tile_at(Vec2Fixed::from_ints(85, 41)).unwrap();
        assert_eq!(coord, TileCoord::new(2, 1));
        assert_eq!(grid.tile_center(coord), Vec2Fixed::from_ints(100, 60));
        assert_eq!(grid.tile_at(Vec2Fixed::from_ints(-1, 5)), None);
        assert_eq!(grid.tile_at(Vec2Fixed::from_ints(160, 5)), None);
    }

    #[test]
    fn test_footprint_in_bounds() {
        let grid = grid();
        assert!(grid.footprint_in_bounds(Vec2Fixed::from_ints(10, 10), Fixed::from_num(4)));
        assert!(!grid.footprint_in_bounds(Vec2Fixed::from_ints(1, 10), Fixed::from_num(4)));
        assert!(!grid.footprint_in_bounds(Vec2Fixed::from_ints(159, 10), Fixed::from_num(4)));
    }
}
