//! Sticker geometry, styling and product constants.
//!
//! Fixed product rules (scan domain, token shape, capacity table) are plain constants. Everything a
//! print shop or theme might tune lives in [`StickerConfig`], which deserializes from TOML with
//! every field optional.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::qrcode::QrCodeEcc;

/// Host every scan URL must point at.
pub const SCAN_DOMAIN: &str = "peakbook.app";
/// Path every scan URL must use.
pub const SCAN_PATH: &str = "/scan";
/// Scheme, host and path shared by all scan URLs.
pub const BASE_URL: &str = "https://peakbook.app/scan";
/// Query parameter carrying the token unless the caller picks another.
pub const DEFAULT_PARAM_NAME: &str = "token";

pub const TOKEN_LENGTH: usize = 20;
/// Characters a token may contain.
pub const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const CAPTION_MAX_LENGTH: usize = 50;
/// Characters that render badly on sticker stock or break markup.
pub const CAPTION_FORBIDDEN: &[char] = &['<', '>', '{', '}', '\\'];

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const SVG_XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
pub const SVG_FILENAME_TEMPLATE: &str = "peakbook-qr-{token}.svg";
pub const GENERATOR_NAME: &str = "Peakbook QR Generator";
pub const GENERATOR_VERSION: &str = "1.0";

/// Screen resolution all pixel values are expressed in.
pub const CSS_DPI: f64 = 96.0;
/// Recommended resolution for professional printing.
pub const PRINT_DPI: u32 = 300;
pub const PREVIEW_SIZE_PX: u32 = 280;
const MIN_PREVIEW_SIZE_PX: u32 = 200;

/// Share of capacity above which a payload is reported as near the limit.
pub const NEAR_LIMIT_RATIO: f64 = 0.8;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("static regex"));

/// Approximate character capacity of the largest symbol at each level.
pub fn capacity_limit(level: QrCodeEcc) -> usize {
    match level {
        QrCodeEcc::Low => 2953,
        QrCodeEcc::Medium => 2331,
        QrCodeEcc::Quartile => 1663,
        QrCodeEcc::High => 1273,
    }
}

/// How much of a level's capacity a payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    pub within_limit: bool,
    pub near_limit: bool,
    pub data_length: usize,
    pub limit: usize,
    pub percent_used: u32,
}

/// Checks `data` against the capacity table for `level`.
///
/// Length is counted in characters, so this is an estimate for multi-byte text.
pub fn check_qr_capacity(data: &str, level: QrCodeEcc) -> CapacityReport {
    let data_length = data.chars().count();
    let limit = capacity_limit(level);
    let warning_threshold = (limit as f64 * NEAR_LIMIT_RATIO).floor() as usize;

    CapacityReport {
        within_limit: data_length <= limit,
        near_limit: data_length > warning_threshold,
        data_length,
        limit,
        percent_used: ((data_length as f64 / limit as f64) * 100.0).round() as u32,
    }
}

/// Builds the scan URL for a token.
///
/// # Example
///
/// ```
/// use peakbook_qr::config::build_url;
///
/// assert_eq!(
///     build_url("ABCDEFGHIJ0123456789", "token"),
///     "https://peakbook.app/scan?token=ABCDEFGHIJ0123456789"
/// );
/// ```
pub fn build_url(token: &str, param_name: &str) -> String {
    format!("{BASE_URL}?{param_name}={token}")
}

pub fn px_to_mm(pixels: f64) -> f64 {
    pixels * 25.4 / CSS_DPI
}

pub fn mm_to_px(mm: f64) -> f64 {
    mm * CSS_DPI / 25.4
}

/// Preview edge length for a container, clamped to 200..=280 px.
pub fn preview_size(container_width: u32) -> u32 {
    container_width
        .saturating_sub(32)
        .min(PREVIEW_SIZE_PX)
        .max(MIN_PREVIEW_SIZE_PX)
}

/// Human-readable recovery rate for a level.
pub fn ecc_description(level: QrCodeEcc) -> &'static str {
    match level {
        QrCodeEcc::Low => "Low (7% recovery)",
        QrCodeEcc::Medium => "Medium (15% recovery)",
        QrCodeEcc::Quartile => "Quartile (25% recovery)",
        QrCodeEcc::High => "High (30% recovery)",
    }
}

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

/// Physical sticker size at 96 DPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StickerGeometry {
    pub size_cm: f64,
    pub size_px: f64,
    pub bleed_cm: f64,
    pub bleed_px: f64,
    pub corner_radius_px: f64,
}

impl Default for StickerGeometry {
    fn default() -> Self {
        Self {
            size_cm: 5.0,
            size_px: 189.0,
            bleed_cm: 0.3,
            bleed_px: 11.0,
            corner_radius_px: 15.0,
        }
    }
}

/// Target size and colors of the printed symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QrSettings {
    pub size_cm: f64,
    pub size_px: f64,
    pub error_correction: QrCodeEcc,
    /// Module color for the basic encoder profile.
    pub color_dark: String,
    /// Background color for the basic encoder profile.
    pub color_light: String,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            size_cm: 4.0,
            size_px: 151.0,
            error_correction: QrCodeEcc::Quartile,
            color_dark: "#000000".to_string(),
            color_light: "#FFFFFF".to_string(),
        }
    }
}

/// Output of the styled encoder profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QrStyling {
    pub width: u32,
    pub height: u32,
    /// Module count assumed when the real symbol size is unknown.
    pub approx_modules: u32,
    /// Corner radius of a data dot, in modules.
    pub dot_radius: f64,
}

impl Default for QrStyling {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            approx_modules: 33,
            dot_radius: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameSettings {
    pub padding_px: f64,
    pub radius_px: f64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            padding_px: 8.0,
            radius_px: 12.0,
        }
    }
}

/// Fixed brand line printed under the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrandSettings {
    pub text: String,
    pub font_size_px: f64,
    pub font_family: String,
    pub font_weight: String,
    pub color: String,
}

impl Default for BrandSettings {
    fn default() -> Self {
        Self {
            text: "peakbook".to_string(),
            font_size_px: 12.0,
            font_family: "\"Noto Naskh Arabic\", Arial, sans-serif".to_string(),
            font_weight: "700".to_string(),
            color: "#2c3239".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionSettings {
    pub font_size_px: f64,
    pub font_family: String,
    pub font_weight: String,
    pub color: String,
    /// Gap between the text blocks and the symbol.
    pub margin_from_qr: f64,
    /// Longest line, in characters, before a caption wraps.
    pub wrap_width: usize,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            font_size_px: 11.0,
            font_family: "\"Noto Naskh Arabic\", Arial, sans-serif".to_string(),
            font_weight: "600".to_string(),
            color: "#1f2937".to_string(),
            margin_from_qr: 8.0,
            wrap_width: 25,
        }
    }
}

/// Logo badge drawn over the center of the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogoSettings {
    pub size_px: f64,
    pub background_padding: f64,
    pub shadow_blur: f64,
    pub shadow_opacity: f64,
    /// Asset used when the caller does not supply one.
    pub default_path: String,
}

impl Default for LogoSettings {
    fn default() -> Self {
        Self {
            size_px: 38.0,
            background_padding: 4.0,
            shadow_blur: 2.0,
            shadow_opacity: 0.15,
            default_path: "/icons/appicon.light.svg".to_string(),
        }
    }
}

/// Sticker color scheme.
///
/// Two schemes ship with the crate; neither is more canonical than the other, so callers pick one
/// explicitly or configure their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorScheme {
    pub background: String,
    pub dots: String,
    pub corners: String,
    pub border: String,
}

impl ColorScheme {
    /// White background with slate modules and frame.
    pub fn standard() -> Self {
        Self {
            background: "#ffffff".to_string(),
            dots: "#2c3239".to_string(),
            corners: "#2c3239".to_string(),
            border: "#2c3239".to_string(),
        }
    }

    /// Glacier-blue background used by the admin panel theme.
    pub fn tinted() -> Self {
        Self {
            background: "#99bdc6".to_string(),
            ..Self::standard()
        }
    }

    /// Fields that are not `#rgb` / `#rrggbb` colors.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        [
            ("background", &self.background),
            ("dots", &self.dots),
            ("corners", &self.corners),
            ("border", &self.border),
        ]
        .into_iter()
        .filter(|(_, value)| !is_hex_color(value))
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::standard()
    }
}

/// Complete sticker configuration.
///
/// # Example
///
/// ```
/// use peakbook_qr::config::StickerConfig;
///
/// let config = StickerConfig::from_toml_str("include_trim_marks = true\n[colors]\nbackground = \"#99bdc6\"\n").unwrap();
/// assert!(config.include_trim_marks);
/// assert_eq!(config.total_size_px(), 211.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StickerConfig {
    pub sticker: StickerGeometry,
    pub qr: QrSettings,
    pub styling: QrStyling,
    pub frame: FrameSettings,
    pub brand: BrandSettings,
    pub caption: CaptionSettings,
    pub logo: LogoSettings,
    pub colors: ColorScheme,
    pub include_trim_marks: bool,
}

impl StickerConfig {
    /// Parses and validates a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on syntax errors, unknown keys or failed validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StickerConfig =
            toml::from_str(content).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file and parses it with [`StickerConfig::from_toml_str`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read, otherwise as `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(Error::Config(message.to_string()));

        if self.sticker.size_px <= 0.0 {
            return invalid("sticker.size_px must be positive");
        }
        if self.sticker.bleed_px < 0.0 {
            return invalid("sticker.bleed_px must not be negative");
        }
        if self.qr.size_px <= 0.0 || self.qr.size_px > self.sticker.size_px {
            return invalid("qr.size_px must be positive and fit inside sticker.size_px");
        }
        if self.frame.padding_px * 2.0 >= self.sticker.size_px {
            return invalid("frame.padding_px leaves no room for content");
        }
        if self.styling.approx_modules < 21 {
            return invalid("styling.approx_modules must be at least 21");
        }
        if self.styling.width == 0 || self.styling.height == 0 {
            return invalid("styling.width and styling.height must be positive");
        }
        if !(0.0..=0.5).contains(&self.styling.dot_radius) {
            return invalid("styling.dot_radius must be between 0 and 0.5");
        }
        if self.caption.font_size_px <= 0.0 || self.brand.font_size_px <= 0.0 {
            return invalid("font sizes must be positive");
        }
        if self.caption.wrap_width == 0 {
            return invalid("caption.wrap_width must be positive");
        }
        if self.logo.size_px <= 0.0 {
            return invalid("logo.size_px must be positive");
        }
        if let Some(field) = self.colors.invalid_fields().first() {
            return Err(Error::Config(format!("colors.{field} must be a hex color")));
        }
        for (name, value) in [
            ("qr.color_dark", &self.qr.color_dark),
            ("qr.color_light", &self.qr.color_light),
            ("brand.color", &self.brand.color),
            ("caption.color", &self.caption.color),
        ] {
            if !is_hex_color(value) {
                return Err(Error::Config(format!("{name} must be a hex color")));
            }
        }
        Ok(())
    }

    /// Canvas edge including bleed on both sides.
    pub fn total_size_px(&self) -> f64 {
        self.sticker.size_px + self.sticker.bleed_px * 2.0
    }
}
