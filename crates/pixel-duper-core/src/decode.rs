use crate::error::Error;
use crate::signature::Color;
use image::ImageReader;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Anything shorter than this cannot hold a complete PNG or JPEG header.
pub const MIN_IMAGE_BYTES: usize = 128;

/// A decoded image with 1 (gray) or 3 (RGB) bytes per pixel, rows packed.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self, Error> {
        if channels != 1 && channels != 3 {
            return Err(Error::Decode(format!("invalid pixel size {}", channels)));
        }
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(Error::Decode(format!(
                "pixel data is {} bytes, expected {} for {}x{}x{}",
                data.len(),
                expected,
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.channels;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Iterate the pixels of row `y` as colors; gray pixels expand to all three channels.
    pub fn row_pixels(&self, y: u32) -> impl Iterator<Item = Color> + '_ {
        self.row(y).chunks_exact(self.channels).map(|px| match px {
            [v] => Color::gray(i32::from(*v)),
            [r, g, b] => Color::new(i32::from(*r), i32::from(*g), i32::from(*b)),
            _ => unreachable!("channel count validated on construction"),
        })
    }
}

/// Decoding capability consumed by the process phase.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, Error>;

    /// Read only the header to learn the image size.
    fn peek_dimensions(&self, bytes: &[u8]) -> Result<(u32, u32), Error>;

    /// Image size of the file at `path`. The default reads the whole file.
    fn peek_file_dimensions(&self, path: &Path) -> Result<(u32, u32), Error> {
        self.peek_dimensions(&fs::read(path)?)
    }
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

impl StandardDecoder {
    fn check_length(bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() < MIN_IMAGE_BYTES {
            return Err(Error::Decode(format!(
                "file too short to be an image ({} bytes)",
                bytes.len()
            )));
        }
        Ok(())
    }
}

impl ImageDecoder for StandardDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, Error> {
        Self::check_length(bytes)?;
        let img = image::load_from_memory(bytes)?;
        if img.width() == 0 || img.height() == 0 {
            return Err(Error::EmptyImage);
        }
        let (width, height) = (img.width(), img.height());
        if img.color().has_color() {
            PixelBuffer::new(width, height, 3, img.into_rgb8().into_raw())
        } else {
            PixelBuffer::new(width, height, 1, img.into_luma8().into_raw())
        }
    }

    fn peek_dimensions(&self, bytes: &[u8]) -> Result<(u32, u32), Error> {
        Self::check_length(bytes)?;
        let dims = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(dims)
    }

    /// Reads the header straight from disk instead of loading the file.
    fn peek_file_dimensions(&self, path: &Path) -> Result<(u32, u32), Error> {
        let len = fs::metadata(path)?.len();
        if len < MIN_IMAGE_BYTES as u64 {
            return Err(Error::Decode(format!(
                "file too short to be an image ({} bytes)",
                len
            )));
        }
        let dims = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn encode_png(img: RgbImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn noisy_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = (x * 31 + y * 17) as u8;
            image::Rgb([v, v.wrapping_mul(3), v.wrapping_add(90)])
        })
    }

    #[test]
    fn test_decode_png_to_rgb_buffer() {
        let bytes = encode_png(noisy_image(40, 30));
        let buf = StandardDecoder.decode(&bytes).unwrap();
        assert_eq!((buf.width(), buf.height(), buf.channels()), (40, 30, 3));
        assert_eq!(buf.row(0).len(), 120);
        assert_eq!(buf.bytes(), 40 * 30 * 3);
    }

    #[test]
    fn test_peek_dimensions_without_full_decode() {
        let bytes = encode_png(noisy_image(40, 30));
        assert_eq!(StandardDecoder.peek_dimensions(&bytes).unwrap(), (40, 30));
    }

    #[test]
    fn test_truncated_file_is_decode_error() {
        let bytes = encode_png(noisy_image(40, 30));
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            StandardDecoder.decode(truncated),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_peek_file_dimensions_reads_header_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        fs::write(&path, encode_png(noisy_image(64, 20))).unwrap();
        assert_eq!(StandardDecoder.peek_file_dimensions(&path).unwrap(), (64, 20));

        let tiny = dir.path().join("tiny.png");
        fs::write(&tiny, [0u8; 10]).unwrap();
        assert!(matches!(
            StandardDecoder.peek_file_dimensions(&tiny),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_short_file_rejected() {
        let err = StandardDecoder.decode(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_gray_buffer_expands_pixels() {
        let buf = PixelBuffer::new(2, 1, 1, vec![10, 200]).unwrap();
        let row: Vec<Color> = buf.row_pixels(0).collect();
        assert_eq!(row, vec![Color::gray(10), Color::gray(200)]);
    }

    #[test]
    fn test_buffer_rejects_bad_channel_count() {
        assert!(PixelBuffer::new(1, 1, 4, vec![0; 4]).is_err());
        assert!(PixelBuffer::new(2, 2, 3, vec![0; 5]).is_err());
    }
}
