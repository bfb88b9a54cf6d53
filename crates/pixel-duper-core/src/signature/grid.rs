use serde::{Deserialize, Serialize};

/// One logical cell of the signature grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: u32,
    pub y: u32,
}

impl GridPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Maps pixel coordinates of a `width`x`height` image onto a fixed
/// `grid_width`x`grid_height` grid, independent of the source resolution.
#[derive(Debug, Clone, Copy)]
pub struct GridMapper {
    grid_width: u32,
    grid_height: u32,
    width: u32,
    height: u32,
}

impl GridMapper {
    /// `width` and `height` must be non-zero.
    pub fn new(grid_width: u32, grid_height: u32, width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0);
        Self {
            grid_width,
            grid_height,
            width,
            height,
        }
    }

    pub fn map(&self, x: u32, y: u32) -> GridPoint {
        // u64 so large images times the grid size cannot overflow
        let gx = u64::from(x) * u64::from(self.grid_width) / u64::from(self.width);
        let gy = u64::from(y) * u64::from(self.grid_height) / u64::from(self.height);
        GridPoint::new(gx as u32, gy as u32)
    }

    pub fn contains(&self, point: &GridPoint) -> bool {
        point.x < self.grid_width && point.y < self.grid_height
    }
}
