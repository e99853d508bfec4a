//! QR matrix generation.
//!
//! [`QrGenerator`] turns a payload into an SVG fragment through one of two encoder profiles. The
//! styled profile draws rounded dots and finder patterns in the sticker colors; the basic profile
//! draws plain squares in fixed colors and is used whenever the styled profile fails. Either way
//! the caller receives the same [`GenerationResult`] shape.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{
    build_url, check_qr_capacity, CapacityReport, ColorScheme, QrSettings, QrStyling,
    StickerConfig, DEFAULT_PARAM_NAME, SVG_NAMESPACE,
};
use crate::error::{Error, Result};
use crate::qrcode::{QrCode, QrCodeEcc};
use crate::svg::{fmt_num, Element, StringWriter, SvgDocument, SvgWriter};
use crate::validator::validate_url;

/// Which encoder produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderProfile {
    Styled,
    Basic,
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub ecc_level: QrCodeEcc,
    pub colors: ColorScheme,
    /// Nominal output width in pixels.
    pub width: u32,
    pub height: u32,
}

impl GenerationOptions {
    /// Options matching the configured defaults.
    pub fn from_config(config: &StickerConfig) -> Self {
        Self {
            ecc_level: config.qr.error_correction,
            colors: config.colors.clone(),
            width: config.styling.width,
            height: config.styling.height,
        }
    }

    pub fn with_ecc_level(mut self, ecc_level: QrCodeEcc) -> Self {
        self.ecc_level = ecc_level;
        self
    }
}

/// Raw encoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedQr {
    pub svg: String,
    /// Modules along one side of the symbol.
    pub module_count: u32,
}

/// An encoder profile. Implementations render a payload to a standalone SVG string.
pub trait QrEncoder {
    fn profile(&self) -> EncoderProfile;

    /// # Errors
    ///
    /// Any error, or output that does not parse as SVG, makes the generator fall back to its
    /// secondary encoder.
    fn render(&self, data: &str, options: &GenerationOptions) -> Result<EncodedQr>;
}

/// Rounded dots and finder patterns in the sticker color scheme.
#[derive(Debug, Clone)]
pub struct StyledEncoder {
    dot_radius: f64,
}

impl StyledEncoder {
    pub fn new(styling: &QrStyling) -> Self {
        Self {
            dot_radius: styling.dot_radius,
        }
    }
}

impl QrEncoder for StyledEncoder {
    fn profile(&self) -> EncoderProfile {
        EncoderProfile::Styled
    }

    fn render(&self, data: &str, options: &GenerationOptions) -> Result<EncodedQr> {
        let colors = &options.colors;
        if let Some(field) = colors.invalid_fields().first() {
            return Err(Error::Render(format!("{field} color is not a hex color")));
        }

        let qr = QrCode::encode_text(data, options.ecc_level)?;
        let size = qr.size();
        let extent = size.to_string();

        let mut dots = String::new();
        for y in 0..size {
            for x in 0..size {
                if qr.get_module(x, y) && !qr.is_finder(x, y) {
                    dots += &rounded_rect(f64::from(x), f64::from(y), 1.0, 1.0, self.dot_radius);
                }
            }
        }

        let mut writer = StringWriter::new();
        writer.start(
            "svg",
            &[
                ("xmlns", SVG_NAMESPACE.to_string()),
                ("width", options.width.to_string()),
                ("height", options.height.to_string()),
                ("viewBox", format!("0 0 {extent} {extent}")),
                ("data-modules", extent.clone()),
                ("shape-rendering", "geometricPrecision".to_string()),
            ],
        );
        writer.empty(
            "rect",
            &[
                ("class", "qr-background".to_string()),
                ("width", extent.clone()),
                ("height", extent.clone()),
                ("fill", colors.background.clone()),
            ],
        );
        writer.empty(
            "path",
            &[
                ("class", "qr-dots".to_string()),
                ("d", dots),
                ("fill", colors.dots.clone()),
            ],
        );
        for (fx, fy) in [(0, 0), (size - 7, 0), (0, size - 7)] {
            let (fx, fy) = (f64::from(fx), f64::from(fy));
            let ring = rounded_rect(fx, fy, 7.0, 7.0, 1.5) + &rounded_rect(fx + 1.0, fy + 1.0, 5.0, 5.0, 1.0);
            writer.empty(
                "path",
                &[
                    ("class", "qr-corner-square".to_string()),
                    ("d", ring),
                    ("fill", colors.corners.clone()),
                    ("fill-rule", "evenodd".to_string()),
                ],
            );
            writer.empty(
                "path",
                &[
                    ("class", "qr-corner-dot".to_string()),
                    ("d", rounded_rect(fx + 2.0, fy + 2.0, 3.0, 3.0, 0.75)),
                    ("fill", colors.corners.clone()),
                ],
            );
        }
        writer.end();

        Ok(EncodedQr {
            svg: writer.finish(),
            module_count: size as u32,
        })
    }
}

// Closed path for a rectangle with circular corners of radius `r`.
fn rounded_rect(x: f64, y: f64, w: f64, h: f64, r: f64) -> String {
    if r <= 0.0 {
        return format!("M{},{}h{}v{}h-{}z", fmt_num(x), fmt_num(y), fmt_num(w), fmt_num(h), fmt_num(w));
    }
    let (rs, hw, hh) = (fmt_num(r), fmt_num(w - 2.0 * r), fmt_num(h - 2.0 * r));
    format!(
        "M{x},{y}h{hw}a{rs},{rs} 0 0 1 {rs},{rs}v{hh}a{rs},{rs} 0 0 1 -{rs},{rs}h-{hw}a{rs},{rs} 0 0 1 -{rs},-{rs}v-{hh}a{rs},{rs} 0 0 1 {rs},-{rs}z",
        x = fmt_num(x + r),
        y = fmt_num(y),
    )
}

/// Plain square modules in fixed dark/light colors.
#[derive(Debug, Clone)]
pub struct BasicEncoder {
    color_dark: String,
    color_light: String,
}

impl BasicEncoder {
    pub fn new(settings: &QrSettings) -> Self {
        Self {
            color_dark: settings.color_dark.clone(),
            color_light: settings.color_light.clone(),
        }
    }
}

impl QrEncoder for BasicEncoder {
    fn profile(&self) -> EncoderProfile {
        EncoderProfile::Basic
    }

    fn render(&self, data: &str, options: &GenerationOptions) -> Result<EncodedQr> {
        let qr = QrCode::encode_text(data, options.ecc_level)?;
        let size = qr.size();
        let extent = size.to_string();

        let mut modules = Vec::new();
        for y in 0..size {
            for x in 0..size {
                if qr.get_module(x, y) {
                    modules.push(format!("M{x},{y}h1v1h-1z"));
                }
            }
        }

        let mut writer = StringWriter::new();
        writer.start(
            "svg",
            &[
                ("xmlns", SVG_NAMESPACE.to_string()),
                ("version", "1.1".to_string()),
                ("width", options.width.to_string()),
                ("height", options.height.to_string()),
                ("viewBox", format!("0 0 {extent} {extent}")),
                ("data-modules", extent),
                ("stroke", "none".to_string()),
            ],
        );
        writer.empty(
            "rect",
            &[
                ("width", "100%".to_string()),
                ("height", "100%".to_string()),
                ("fill", self.color_light.clone()),
            ],
        );
        writer.empty(
            "path",
            &[("d", modules.join(" ")), ("fill", self.color_dark.clone())],
        );
        writer.end();

        Ok(EncodedQr {
            svg: writer.finish(),
            module_count: size as u32,
        })
    }
}

/// Axis-aligned box in the coordinate space of the parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One drawing primitive of an encoder image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleInfo {
    /// Element name: `rect`, `path`, `circle`, ...
    pub kind: String,
    /// Position in document order.
    pub index: usize,
    pub attributes: Vec<(String, String)>,
    /// Known for `rect` and `circle` primitives.
    pub bounds: Option<Bounds>,
}

/// Structural view of an encoder SVG.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSvg {
    pub root: Element,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// `min-x min-y width height`.
    pub view_box: Option<[f64; 4]>,
    pub modules: Vec<ModuleInfo>,
}

impl ParsedSvg {
    /// Modules along one side of the symbol, from `data-modules` or else the viewBox width.
    pub fn module_count(&self) -> Option<u32> {
        self.root
            .attr("data-modules")
            .and_then(|value| value.parse().ok())
            .or_else(|| self.view_box.map(|vb| vb[2].round() as u32))
            .filter(|&count| count > 0)
    }
}

/// Parses a raw encoder SVG string into its structure and primitive list.
///
/// # Errors
///
/// Returns [`Error::InvalidSvg`] when the text has no `<svg>` root or is not well-formed.
pub fn parse_svg_string(svg: &str) -> Result<ParsedSvg> {
    if !svg.contains("<svg") {
        return Err(Error::InvalidSvg("missing <svg> root element".to_string()));
    }
    let root = SvgDocument::parse(svg)?.root;

    let modules = root
        .descendants()
        .into_iter()
        .enumerate()
        .map(|(index, element)| ModuleInfo {
            kind: element.name.clone(),
            index,
            attributes: element.attributes.clone(),
            bounds: element_bounds(element),
        })
        .collect();

    Ok(ParsedSvg {
        width: root.attr("width").and_then(parse_length),
        height: root.attr("height").and_then(parse_length),
        view_box: root.attr("viewBox").and_then(parse_view_box),
        root,
        modules,
    })
}

fn parse_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

fn parse_view_box(value: &str) -> Option<[f64; 4]> {
    let numbers: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    numbers.try_into().ok()
}

fn element_bounds(element: &Element) -> Option<Bounds> {
    let number = |name: &str| element.attr(name).and_then(parse_length);
    match element.name.as_str() {
        "rect" | "image" | "svg" => Some(Bounds {
            x: number("x").unwrap_or(0.0),
            y: number("y").unwrap_or(0.0),
            width: number("width")?,
            height: number("height")?,
        }),
        "circle" => {
            let r = number("r")?;
            Some(Bounds {
                x: number("cx").unwrap_or(0.0) - r,
                y: number("cy").unwrap_or(0.0) - r,
                width: r * 2.0,
                height: r * 2.0,
            })
        }
        _ => None,
    }
}

/// Output of a generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub svg: String,
    pub width: f64,
    pub height: f64,
    pub modules: Vec<ModuleInfo>,
    /// Modules along one side of the symbol.
    pub module_count: u32,
    /// Encoded payload.
    pub data: String,
    pub ecc_level: QrCodeEcc,
    pub profile: EncoderProfile,
    pub capacity: CapacityReport,
    pub token: Option<String>,
    pub url: Option<String>,
    pub param_name: Option<String>,
}

/// Where a sticker is expected to be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanEnvironment {
    #[default]
    Office,
    Outdoor,
    Mobile,
}

/// Recommends an error correction level.
///
/// A logo overlay always gets `H`, since the badge hides a large share of the symbol. Without a
/// logo, outdoor stickers get `Q`, mobile screens `M` and everything else `H`.
///
/// This is advisory only: [`QrGenerator::generate_from_token`] uses whatever level the caller
/// passes, which defaults to the configured `Q`.
pub fn recommended_ecc(has_logo: bool, environment: ScanEnvironment) -> QrCodeEcc {
    if has_logo {
        return QrCodeEcc::High;
    }
    match environment {
        ScanEnvironment::Outdoor => QrCodeEcc::Quartile,
        ScanEnvironment::Mobile => QrCodeEcc::Medium,
        ScanEnvironment::Office => QrCodeEcc::High,
    }
}

/// Generates QR images with a primary encoder and a fallback.
pub struct QrGenerator<'c> {
    config: &'c StickerConfig,
    primary: Box<dyn QrEncoder + 'c>,
    fallback: Box<dyn QrEncoder + 'c>,
}

impl<'c> QrGenerator<'c> {
    /// Styled encoder first, basic encoder as fallback.
    pub fn new(config: &'c StickerConfig) -> Self {
        Self::with_encoders(
            config,
            Box::new(StyledEncoder::new(&config.styling)),
            Box::new(BasicEncoder::new(&config.qr)),
        )
    }

    pub fn with_encoders(
        config: &'c StickerConfig,
        primary: Box<dyn QrEncoder + 'c>,
        fallback: Box<dyn QrEncoder + 'c>,
    ) -> Self {
        Self {
            config,
            primary,
            fallback,
        }
    }

    pub fn config(&self) -> &StickerConfig {
        self.config
    }

    /// Default options for this generator's configuration.
    pub fn default_options(&self) -> GenerationOptions {
        GenerationOptions::from_config(self.config)
    }

    /// Encodes arbitrary data.
    ///
    /// # Arguments
    ///
    /// * `data` - The payload to encode.
    /// * `options` - Error correction level, colors and nominal size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataTooLong`] before any encoding when `data` exceeds the capacity of the
    /// chosen level. Otherwise fails only if both encoders fail.
    pub fn generate_svg(&self, data: &str, options: &GenerationOptions) -> Result<GenerationResult> {
        let capacity = check_qr_capacity(data, options.ecc_level);
        if !capacity.within_limit {
            return Err(Error::DataTooLong {
                data_length: capacity.data_length,
                limit: capacity.limit,
            });
        }
        debug!(
            data_length = capacity.data_length,
            ecc = %options.ecc_level,
            percent_used = capacity.percent_used,
            "generating QR code"
        );

        let (encoded, parsed, profile) = match render_parsed(self.primary.as_ref(), data, options) {
            Ok((encoded, parsed)) => (encoded, parsed, self.primary.profile()),
            Err(err) => {
                warn!(error = %err, "primary QR encoder failed, falling back");
                let (encoded, parsed) = render_parsed(self.fallback.as_ref(), data, options)?;
                (encoded, parsed, self.fallback.profile())
            }
        };

        let module_count = parsed.module_count().unwrap_or(encoded.module_count);
        debug!(?profile, module_count, "QR code generated");

        Ok(GenerationResult {
            width: parsed.width.unwrap_or(f64::from(options.width)),
            height: parsed.height.unwrap_or(f64::from(options.height)),
            modules: parsed.modules,
            svg: encoded.svg,
            module_count,
            data: data.to_string(),
            ecc_level: options.ecc_level,
            profile,
            capacity,
            token: None,
            url: None,
            param_name: None,
        })
    }

    /// Builds the scan URL for `token` and encodes it.
    ///
    /// An empty `param_name` means the default `token` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when the built URL fails shape validation, otherwise as
    /// [`QrGenerator::generate_svg`].
    pub fn generate_from_token(
        &self,
        token: &str,
        param_name: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult> {
        let param_name = if param_name.is_empty() {
            DEFAULT_PARAM_NAME
        } else {
            param_name
        };
        let url = build_url(token, param_name);
        validate_url(&url).map_err(|err| Error::InvalidUrl(err.to_string()))?;
        debug!(token, url = %url, "generating QR code from token");

        let mut result = self.generate_svg(&url, options)?;
        result.token = Some(token.to_string());
        result.url = Some(url);
        result.param_name = Some(param_name.to_string());
        Ok(result)
    }
}

fn render_parsed(
    encoder: &dyn QrEncoder,
    data: &str,
    options: &GenerationOptions,
) -> Result<(EncodedQr, ParsedSvg)> {
    let encoded = encoder.render(data, options)?;
    let parsed = parse_svg_string(&encoded.svg)?;
    Ok((encoded, parsed))
}
