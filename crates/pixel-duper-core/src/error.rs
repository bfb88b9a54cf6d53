use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Cache grid {found_w}x{found_h} does not match configured grid {expected_w}x{expected_h}")]
    CacheVersionMismatch {
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    #[error("Cache format error: {0}")]
    CacheFormat(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}
