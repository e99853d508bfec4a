//! # peakbook-qr
//!
//! Print-ready QR check-in stickers for Peakbook.
//!
//! A sticker starts from a 20-character token. The token is validated, turned into a scan URL
//! (`https://peakbook.app/scan?token=...`), encoded as a QR Code Model 2 symbol and composed into a
//! 5cm square SVG with bleed: a rounded frame, optional caption, the code, a logo badge and the
//! brand line. The finished document can be saved, wrapped in a print page or previewed.
//!
//! ## Features
//!
//! - Pure validators for tokens, captions, parameter names, scan URLs, filenames and SVG content.
//! - In-house QR encoder covering versions 1 to 40, four error correction levels and the numeric,
//!   alphanumeric and byte modes.
//! - Styled and basic encoder profiles with automatic fallback.
//! - A single composition algorithm that renders either to text or to an element tree.
//! - Graceful degradation: broken QR output becomes a visible placeholder, a missing logo becomes
//!   a fallback badge.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! Generate a sticker for a form submission:
//!
//! ```rust
//! use peakbook_qr::{config::StickerConfig, logo::LogoRef, service::StickerService, validator::QrFormData};
//!
//! let config = StickerConfig::default();
//! let service = StickerService::new(&config, LogoRef::Fallback);
//! let form = QrFormData::new("ABCDEFGHIJ0123456789").with_caption("Scan to check in!");
//!
//! let sticker = service.generate_qr_code(&form).unwrap();
//! assert_eq!(sticker.filename, "peakbook-qr-ABCDEFGHIJ0123456789.svg");
//! assert!(sticker.svg.contains("data-generator=\"Peakbook QR Generator\""));
//! ```
//!
//! Work with the pipeline stages directly:
//!
//! ```rust
//! use peakbook_qr::config::StickerConfig;
//! use peakbook_qr::generator::QrGenerator;
//! use peakbook_qr::logo::LogoRef;
//! use peakbook_qr::sticker::{StickerComposer, StickerOptions};
//!
//! let config = StickerConfig::default();
//! let generator = QrGenerator::new(&config);
//! let qr = generator
//!     .generate_from_token("ABCDEFGHIJ0123456789", "token", &generator.default_options())
//!     .unwrap();
//!
//! let document = StickerComposer::new(&config)
//!     .create_sticker_svg(&qr, &LogoRef::Fallback, "", &StickerOptions::default())
//!     .unwrap();
//! assert_eq!(document.root.attr("width"), Some("211"));
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Product constants, capacity table and the TOML-loadable sticker configuration.
//! - [`validator`]: Input validation and sanitizing.
//! - [`qrcode`]: Core QR code encoding functionality.
//! - [`generator`]: Encoder profiles and QR generation results.
//! - [`svg`]: SVG document model and writers.
//! - [`logo`]: Logo loading with fallback.
//! - [`sticker`]: Sticker layout and composition.
//! - [`export`]: Filenames, saving, print pages and previews.
//! - [`service`]: Form-level entry points.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod logo;
pub mod qrcode;
pub mod service;
pub mod sticker;
pub mod svg;
pub mod validator;

pub use error::{Error, Result};
pub use generator::{GenerationResult, QrGenerator};
pub use qrcode::{QrCode, QrCodeEcc};
pub use service::{GenerateFailure, GeneratedSticker, StickerService};
pub use sticker::{StickerComposer, StickerOptions};
pub use validator::{QrFormData, ValidationError};
