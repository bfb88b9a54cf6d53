//! Coarse per-cell color signatures.
//!
//! An image is split into a fixed grid regardless of its resolution and each
//! cell is reduced to the mean color of its pixels. Two encodings or sizes of
//! the same picture end up with nearly identical signatures.

mod color;
mod grid;

pub use color::{Average, Color, ColorAverage};
pub use grid::{GridMapper, GridPoint};

use crate::decode::PixelBuffer;
use crate::error::Error;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    cells: BTreeMap<GridPoint, Color>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average every pixel of `buffer` into a `grid_width`x`grid_height` grid.
    pub fn extract(buffer: &PixelBuffer, grid_width: u32, grid_height: u32) -> Result<Self, Error> {
        if buffer.is_empty() {
            return Err(Error::EmptyImage);
        }

        let mapper = GridMapper::new(grid_width, grid_height, buffer.width(), buffer.height());
        let mut averages: BTreeMap<GridPoint, ColorAverage> = BTreeMap::new();
        for y in 0..buffer.height() {
            for (x, px) in buffer.row_pixels(y).enumerate() {
                averages.entry(mapper.map(x as u32, y)).or_default().add(px);
            }
        }

        let cells = averages
            .into_iter()
            .filter_map(|(point, avg)| avg.value().map(|color| (point, color)))
            .collect();
        Ok(Self { cells })
    }

    pub fn insert(&mut self, point: GridPoint, color: Color) {
        self.cells.insert(point, color);
    }

    pub fn get(&self, point: &GridPoint) -> Option<&Color> {
        self.cells.get(point)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridPoint, &Color)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn quantized(&self, num: i32, den: i32) -> Signature {
        Signature {
            cells: self
                .cells
                .iter()
                .map(|(p, c)| (*p, c.quantize(num, den)))
                .collect(),
        }
    }

    /// True when every cell lies inside the grid and every channel is a valid byte.
    pub fn fits_grid(&self, grid_width: u32, grid_height: u32) -> bool {
        self.cells.len() as u64 <= u64::from(grid_width) * u64::from(grid_height)
            && self
                .cells
                .iter()
                .all(|(p, c)| p.x < grid_width && p.y < grid_height && c.in_range())
    }
}

impl FromIterator<(GridPoint, Color)> for Signature {
    fn from_iter<I: IntoIterator<Item = (GridPoint, Color)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_from_fn(w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> PixelBuffer {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&f(x, y));
            }
        }
        PixelBuffer::new(w, h, 3, data).unwrap()
    }

    #[test]
    fn test_extract_uniform_image() {
        let buf = buffer_from_fn(30, 30, |_, _| [100, 150, 200]);
        let sig = Signature::extract(&buf, 3, 3).unwrap();
        assert_eq!(sig.len(), 9);
        assert!(sig.iter().all(|(_, c)| *c == Color::new(100, 150, 200)));
    }

    #[test]
    fn test_extract_averages_each_cell() {
        // left third black, rest alternating 0/255 columns
        let buf = buffer_from_fn(6, 3, |x, _| {
            if x < 2 {
                [0, 0, 0]
            } else if x % 2 == 0 {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        });
        let sig = Signature::extract(&buf, 3, 3).unwrap();
        assert_eq!(sig.get(&GridPoint::new(0, 0)), Some(&Color::gray(0)));
        // 255 and 0 average to 127.5, rounded up
        assert_eq!(sig.get(&GridPoint::new(1, 2)), Some(&Color::gray(128)));
    }

    #[test]
    fn test_resolution_independent() {
        let small = buffer_from_fn(9, 9, |x, y| [(x * 20) as u8, (y * 20) as u8, 50]);
        let large = buffer_from_fn(90, 90, |x, y| [((x / 10) * 20) as u8, ((y / 10) * 20) as u8, 50]);
        let a = Signature::extract(&small, 3, 3).unwrap().quantized(1, 32);
        let b = Signature::extract(&large, 3, 3).unwrap().quantized(1, 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_small_image_gives_sparse_signature() {
        let buf = buffer_from_fn(2, 1, |_, _| [1, 2, 3]);
        let sig = Signature::extract(&buf, 3, 3).unwrap();
        assert_eq!(sig.len(), 2);
    }

    #[test]
    fn test_empty_buffer_is_error() {
        let buf = PixelBuffer::new(0, 0, 3, Vec::new()).unwrap();
        assert!(matches!(Signature::extract(&buf, 3, 3), Err(Error::EmptyImage)));
    }

    #[test]
    fn test_fits_grid() {
        let sig: Signature = [(GridPoint::new(2, 2), Color::gray(10))].into_iter().collect();
        assert!(sig.fits_grid(3, 3));
        assert!(!sig.fits_grid(2, 2));
        let bad: Signature = [(GridPoint::new(0, 0), Color::gray(300))].into_iter().collect();
        assert!(!bad.fits_grid(3, 3));
    }
}
