//! Pipeline errors.
//!
//! User-correctable input problems are reported by [`crate::validator::ValidationError`] and never
//! reach this type directly. `Error` covers what can go wrong after validation: payloads that
//! exceed the chosen capacity, malformed intermediate SVG, encoder and I/O failures.

use thiserror::Error;

use crate::qrcode::DataTooLong;

/// Errors raised while generating, composing or packaging a sticker.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload exceeds the capacity table entry for the chosen ECC level.
    #[error("Data too long for QR code ({data_length}/{limit} chars)")]
    DataTooLong {
        /// Characters in the payload.
        data_length: usize,
        /// Approximate limit for the level.
        limit: usize,
    },
    /// The scan URL built from a token failed shape validation.
    #[error("{0}")]
    InvalidUrl(String),
    /// Encoder output or an embedded fragment is not a usable SVG document.
    #[error("Invalid SVG: {0}")]
    InvalidSvg(String),
    /// The matrix encoder rejected the payload.
    #[error("QR encoding failed: {0}")]
    Encode(#[from] DataTooLong),
    /// An encoder profile could not render the matrix.
    #[error("QR rendering failed: {0}")]
    Render(String),
    /// Sticker configuration is unreadable or inconsistent.
    #[error("invalid config: {0}")]
    Config(String),
    /// Filesystem failure while loading assets or saving output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Raster encoding failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result alias used throughout the pipeline.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_too_long_mentions_both_counts() {
        let err = Error::DataTooLong { data_length: 1300, limit: 1273 };
        let message = err.to_string();
        assert!(message.contains("1300"));
        assert!(message.contains("1273"));
    }

    #[test]
    fn test_encoder_errors_convert() {
        let err: Error = DataTooLong::SegmentTooLong.into();
        assert!(matches!(err, Error::Encode(DataTooLong::SegmentTooLong)));
    }
}
