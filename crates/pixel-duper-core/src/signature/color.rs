use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl Color {
    pub fn new(r: i32, g: i32, b: i32) -> Self {
        Self { r, g, b }
    }

    pub fn gray(v: i32) -> Self {
        Self::new(v, v, v)
    }

    /// Coarse bucketing used for lookups: `channel * num / den`.
    pub fn quantize(&self, num: i32, den: i32) -> Color {
        Color::new(self.r * num / den, self.g * num / den, self.b * num / den)
    }

    /// Integer approximation of perceived brightness, `(3R + 4G + B) / 8`.
    pub fn luminance(&self) -> i32 {
        (3 * self.r + 4 * self.g + self.b) >> 3
    }

    pub fn in_range(&self) -> bool {
        [self.r, self.g, self.b].iter().all(|c| (0..=255).contains(c))
    }
}

/// Running arithmetic mean of integer samples, rounded to nearest on read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Average {
    sum: f64,
    count: u64,
}

impl Average {
    pub fn add(&mut self, value: i32) {
        self.sum += f64::from(value);
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn value(&self) -> Option<i32> {
        if self.count == 0 {
            return None;
        }
        Some((self.sum / self.count as f64).round() as i32)
    }
}

/// Per-channel running average of one grid cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorAverage {
    r: Average,
    g: Average,
    b: Average,
}

impl ColorAverage {
    pub fn add(&mut self, color: Color) {
        self.r.add(color.r);
        self.g.add(color.g);
        self.b.add(color.b);
    }

    pub fn value(&self) -> Option<Color> {
        Some(Color::new(self.r.value()?, self.g.value()?, self.b.value()?))
    }
}
