//! Tile maps and the blocking-tile lookup used by the game rules

pub mod tiled;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rand::Rng;
use tracing::{info, warn};

use self::tiled::TiledMap;

/// Read-only view of the loaded maps
pub trait TileIndex: Send + Sync {
    /// Whether the tile blocks movement and bomb placement.
    /// Unknown maps and out-of-bounds tiles block.
    fn is_blocking(&self, map_id: &str, x: i32, y: i32) -> bool;

    /// Grid size of a map, if loaded
    fn dimensions(&self, map_id: &str) -> Option<(u32, u32)>;
}

/// Collision grid of one map
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: u32,
    height: u32,
    blocking: Vec<bool>,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, blocking: Vec<bool>) -> Self {
        debug_assert_eq!(blocking.len(), width as usize * height as usize);
        Self {
            width,
            height,
            blocking,
        }
    }

    /// Build a grid from text rows, `#` marks a blocking tile.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0) as u32;
        let blocking = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        Self::new(width, height, blocking)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn is_blocking(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return true;
        }
        let idx = x as usize + y as usize * self.width as usize;
        self.blocking.get(idx).copied().unwrap_or(true)
    }

    /// Pick a random passable tile: a few random tries, then a scan from a
    /// random offset so a nearly full map still finds its free tiles.
    pub fn random_open_tile<R: Rng>(&self, rng: &mut R) -> Option<(i32, i32)> {
        let total = self.blocking.len();
        if total == 0 {
            return None;
        }

        for _ in 0..32 {
            let idx = rng.gen_range(0..total);
            if !self.blocking[idx] {
                return Some(self.coords(idx));
            }
        }

        let offset = rng.gen_range(0..total);
        (0..total)
            .map(|i| (i + offset) % total)
            .find(|idx| !self.blocking[*idx])
            .map(|idx| self.coords(idx))
    }

    fn coords(&self, idx: usize) -> (i32, i32) {
        let width = self.width as usize;
        ((idx % width) as i32, (idx / width) as i32)
    }
}

/// All maps known to the server, keyed by map id
#[derive(Debug, Default)]
pub struct MapStore {
    maps: HashMap<String, TileGrid>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, map_id: impl Into<String>, grid: TileGrid) {
        self.maps.insert(map_id.into(), grid);
    }

    pub fn get(&self, map_id: &str) -> Option<&TileGrid> {
        self.maps.get(map_id)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Load every `*.json` file in `dir`; the file stem is the map id.
    pub fn load_dir(dir: &Path) -> Result<Self, MapError> {
        let mut store = Self::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(map_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "Skipping map with non UTF-8 name");
                continue;
            };

            let raw = fs::read_to_string(&path)?;
            let grid = TiledMap::parse(&raw)?.into_grid()?;
            let (width, height) = grid.dimensions();
            info!(map_id, width, height, "Loaded map");
            store.insert(map_id.to_string(), grid);
        }

        Ok(store)
    }
}

impl TileIndex for MapStore {
    fn is_blocking(&self, map_id: &str, x: i32, y: i32) -> bool {
        self.maps
            .get(map_id)
            .map(|grid| grid.is_blocking(x, y))
            .unwrap_or(true)
    }

    fn dimensions(&self, map_id: &str) -> Option<(u32, u32)> {
        self.maps.get(map_id).map(TileGrid::dimensions)
    }
}

/// Map loading errors
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Failed to read map: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse map: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Map has no '{0}' layer")]
    MissingLayer(&'static str),

    #[error("Layer holds {actual} tiles, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn out_of_bounds_blocks() {
        let grid = TileGrid::from_rows(&["..", ".."]);
        assert!(!grid.is_blocking(1, 1));
        assert!(grid.is_blocking(-1, 0));
        assert!(grid.is_blocking(0, 2));
        assert!(grid.is_blocking(2, 0));
    }

    #[test]
    fn unknown_map_blocks_everything() {
        let mut store = MapStore::new();
        store.insert("001", TileGrid::from_rows(&["..."]));
        assert!(!store.is_blocking("001", 2, 0));
        assert!(store.is_blocking("002", 0, 0));
        assert_eq!(store.dimensions("001"), Some((3, 1)));
        assert_eq!(store.dimensions("002"), None);
    }

    #[test]
    fn random_open_tile_finds_the_only_gap() {
        let grid = TileGrid::from_rows(&["####", "###.", "####"]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(grid.random_open_tile(&mut rng), Some((3, 1)));
        }
    }

    #[test]
    fn full_map_has_no_open_tile() {
        let grid = TileGrid::from_rows(&["##", "##"]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(grid.random_open_tile(&mut rng), None);
    }
}
