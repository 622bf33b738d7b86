//! Tiled editor JSON map format (only the parts the server reads)

use serde::Deserialize;

use super::{MapError, TileGrid};

/// Name of the layer whose non-zero tiles block movement
pub const COLLISION_LAYER: &str = "Meta";

#[derive(Debug, Deserialize)]
pub struct TiledMap {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub layers: Vec<TiledLayer>,
}

#[derive(Debug, Deserialize)]
pub struct TiledLayer {
    pub name: String,
    #[serde(default)]
    pub data: Vec<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl TiledMap {
    pub fn parse(raw: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build the collision grid from the `Meta` layer: any gid above zero blocks.
    pub fn into_grid(self) -> Result<TileGrid, MapError> {
        let layer = self
            .layers
            .into_iter()
            .find(|layer| layer.name == COLLISION_LAYER)
            .ok_or(MapError::MissingLayer(COLLISION_LAYER))?;

        let width = layer.width.unwrap_or(self.width);
        let height = layer.height.unwrap_or(self.height);
        let expected = width as usize * height as usize;
        if layer.data.len() != expected {
            return Err(MapError::SizeMismatch {
                expected,
                actual: layer.data.len(),
            });
        }

        let blocking = layer.data.iter().map(|gid| *gid > 0).collect();
        Ok(TileGrid::new(width, height, blocking))
    }
}
