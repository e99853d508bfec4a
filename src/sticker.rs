//! Sticker composition.
//!
//! [`StickerComposer`] lays out the printable sticker around a generated QR image: canvas with
//! bleed, optional trim marks, a rounded frame whose stroke matches the module size, caption above,
//! the symbol in the remaining space, a logo badge over its center and the brand line below.
//!
//! The layout is computed once by [`StickerComposer::layout`] and then emitted through any
//! [`SvgWriter`], so the string and tree renderings cannot drift apart.

use tracing::{debug, warn};

use crate::config::{
    ColorScheme, StickerConfig, GENERATOR_NAME, GENERATOR_VERSION, SVG_NAMESPACE,
    SVG_XLINK_NAMESPACE,
};
use crate::error::{Error, Result};
use crate::generator::GenerationResult;
use crate::logo::LogoRef;
use crate::svg::{fmt_num, Element, StringWriter, SvgDocument, SvgWriter, TreeWriter, XML_DECLARATION};

const LINE_HEIGHT_RATIO: f64 = 1.4;
const WRAPPED_LINE_RATIO: f64 = 1.2;
const TRIM_MARK_LENGTH: f64 = 8.0;
const TRIM_MARK_OFFSET: f64 = 2.0;
const BADGE_RADIUS_RATIO: f64 = 0.18;
const FALLBACK_LOGO_COLOR: &str = "#2563eb";
const FRAME_FILL: &str = "#ffffff";

/// Axis-aligned rectangle in sticker pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Every coordinate the composer emits.
#[derive(Debug, Clone, PartialEq)]
pub struct StickerLayout {
    /// Canvas edge including bleed.
    pub canvas: f64,
    /// Frame rectangle, inset by bleed and padding.
    pub inner: Rect,
    /// Pixel size of one QR module, also the frame stroke width.
    pub module_px: f64,
    pub caption_lines: Vec<String>,
    pub caption_height: f64,
    pub brand_height: f64,
    pub spacing: f64,
    /// Vertical room left for the symbol after text blocks and gaps.
    pub available_height: f64,
    pub available_width: f64,
    pub qr: Rect,
    /// White rounded square behind the logo.
    pub badge: Rect,
    pub logo: Rect,
    pub caption_baseline: f64,
    pub brand_baseline: f64,
}

/// Per-call composition switches.
#[derive(Debug, Clone, PartialEq)]
pub struct StickerOptions {
    /// Draw corner trim marks in the bleed. Also enabled by the config flag.
    pub include_trim_marks: bool,
    /// Clip content to the rounded die-cut shape.
    pub rounded: bool,
    /// Overrides the configured color scheme.
    pub colors: Option<ColorScheme>,
}

impl Default for StickerOptions {
    fn default() -> Self {
        Self {
            include_trim_marks: false,
            rounded: true,
            colors: None,
        }
    }
}

/// Greedy word wrap. Captions no longer than `width` characters stay on one line; a single word
/// longer than `width` gets a line of its own.
pub fn wrap_caption(caption: &str, width: usize) -> Vec<String> {
    if caption.is_empty() {
        return Vec::new();
    }
    if caption.chars().count() <= width {
        return vec![caption.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in caption.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if candidate.chars().count() <= width {
            current = candidate;
        } else if current.is_empty() {
            lines.push(word.to_string());
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Composes sticker documents for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct StickerComposer<'c> {
    config: &'c StickerConfig,
}

impl<'c> StickerComposer<'c> {
    pub fn new(config: &'c StickerConfig) -> Self {
        Self { config }
    }

    /// Computes the layout for a caption and a symbol of `module_count` modules per side.
    ///
    /// A `module_count` of zero falls back to the configured approximation.
    pub fn layout(&self, caption: &str, module_count: u32) -> StickerLayout {
        let config = self.config;
        let bleed = config.sticker.bleed_px;
        let size = config.sticker.size_px;
        let padding = config.frame.padding_px;

        let inner = Rect {
            x: bleed + padding,
            y: bleed + padding,
            width: size - padding * 2.0,
            height: size - padding * 2.0,
        };

        let modules = if module_count > 0 {
            module_count
        } else {
            config.styling.approx_modules
        };
        let module_px = (config.qr.size_px / f64::from(modules)).round().max(1.0);

        let caption_lines = wrap_caption(caption, config.caption.wrap_width);
        let caption_font = config.caption.font_size_px;
        let caption_height = match caption_lines.len() {
            0 => 0.0,
            n => caption_font * LINE_HEIGHT_RATIO + (n - 1) as f64 * caption_font * WRAPPED_LINE_RATIO,
        };
        let brand_height = config.brand.font_size_px * LINE_HEIGHT_RATIO;
        let spacing = config.caption.margin_from_qr;

        let available_height =
            inner.height - caption_height - brand_height - 2.0 * spacing - module_px;
        let available_width = inner.width - module_px;
        let qr_size = config
            .qr
            .size_px
            .min(available_height)
            .min(available_width)
            .max(0.0);

        // The gap above the code is kept with or without a caption
        let top = caption_height + spacing;
        let qr = Rect {
            x: inner.x + (inner.width - qr_size) / 2.0,
            y: inner.y + top + (available_height - qr_size) / 2.0 + module_px / 2.0,
            width: qr_size,
            height: qr_size,
        };

        let (cx, cy) = qr.center();
        let logo_size = config.logo.size_px;
        let badge_size = logo_size + config.logo.background_padding * 2.0;
        let badge = Rect {
            x: cx - badge_size / 2.0,
            y: cy - badge_size / 2.0,
            width: badge_size,
            height: badge_size,
        };
        let logo = Rect {
            x: cx - logo_size / 2.0,
            y: cy - logo_size / 2.0,
            width: logo_size,
            height: logo_size,
        };

        StickerLayout {
            canvas: config.total_size_px(),
            caption_baseline: inner.y + module_px / 2.0 + caption_font * LINE_HEIGHT_RATIO * 0.75,
            brand_baseline: inner.y + inner.height - module_px / 2.0 - brand_height * 0.3,
            inner,
            module_px,
            caption_lines,
            caption_height,
            brand_height,
            spacing,
            available_height,
            available_width,
            qr,
            badge,
            logo,
        }
    }

    /// Builds the sticker as an element tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] only if the writer produced no root, which a well-formed
    /// composition never does. QR embedding and logo problems are absorbed into the document.
    pub fn create_sticker_svg(
        &self,
        qr: &GenerationResult,
        logo: &LogoRef,
        caption: &str,
        options: &StickerOptions,
    ) -> Result<SvgDocument> {
        let mut writer = TreeWriter::new();
        self.compose(&mut writer, qr, logo, caption, options);
        writer
            .finish()
            .map(SvgDocument::new)
            .ok_or_else(|| Error::Render("sticker composition produced no root element".to_string()))
    }

    /// Renders the sticker straight to text, XML declaration included.
    pub fn render_sticker_string(
        &self,
        qr: &GenerationResult,
        logo: &LogoRef,
        caption: &str,
        options: &StickerOptions,
    ) -> String {
        let mut writer = StringWriter::new();
        self.compose(&mut writer, qr, logo, caption, options);
        format!("{XML_DECLARATION}{}", writer.finish())
    }

    /// Emits the sticker document into `writer`.
    pub fn compose<W: SvgWriter>(
        &self,
        writer: &mut W,
        qr: &GenerationResult,
        logo: &LogoRef,
        caption: &str,
        options: &StickerOptions,
    ) {
        let config = self.config;
        let colors = options.colors.as_ref().unwrap_or(&config.colors);
        let layout = self.layout(caption, qr.module_count);
        debug!(
            caption_lines = layout.caption_lines.len(),
            qr_size = layout.qr.width,
            module_px = layout.module_px,
            "composing sticker"
        );

        let canvas = fmt_num(layout.canvas);
        let size_cm = fmt_num(config.sticker.size_cm);
        let bleed_cm = fmt_num(config.sticker.bleed_cm);
        writer.start(
            "svg",
            &[
                ("xmlns", SVG_NAMESPACE.to_string()),
                ("xmlns:xlink", SVG_XLINK_NAMESPACE.to_string()),
                ("width", canvas.clone()),
                ("height", canvas.clone()),
                ("viewBox", format!("0 0 {canvas} {canvas}")),
                ("data-generator", GENERATOR_NAME.to_string()),
                ("data-version", GENERATOR_VERSION.to_string()),
                ("data-print-size", format!("{size_cm}cm")),
                ("data-bleed", format!("{bleed_cm}cm")),
            ],
        );
        writer.text_element("title", &[], "Peakbook QR Code Sticker");
        writer.text_element(
            "desc",
            &[],
            &format!("QR code sticker for Peakbook check-in, {size_cm}cm × {size_cm}cm with {bleed_cm}cm bleed"),
        );

        self.write_defs(writer);
        writer.empty(
            "rect",
            &[
                ("id", "background".to_string()),
                ("x", "0".to_string()),
                ("y", "0".to_string()),
                ("width", canvas.clone()),
                ("height", canvas),
                ("fill", colors.background.clone()),
            ],
        );

        if options.include_trim_marks || config.include_trim_marks {
            self.write_trim_marks(writer);
        }

        let mut content = vec![("id", "sticker-content".to_string())];
        if options.rounded {
            content.push(("clip-path", "url(#sticker-clip)".to_string()));
        }
        writer.start("g", &content);
        writer.start("g", &[("id", "framed-layout".to_string())]);

        let inner = layout.inner;
        writer.empty(
            "rect",
            &[
                ("id", "frame".to_string()),
                ("x", fmt_num(inner.x)),
                ("y", fmt_num(inner.y)),
                ("width", fmt_num(inner.width)),
                ("height", fmt_num(inner.height)),
                ("rx", fmt_num(config.frame.radius_px)),
                ("ry", fmt_num(config.frame.radius_px)),
                ("fill", FRAME_FILL.to_string()),
                ("stroke", colors.border.clone()),
                ("stroke-width", fmt_num(layout.module_px)),
            ],
        );

        self.write_caption(writer, &layout);
        self.write_qr(writer, qr, &layout);
        self.write_logo(writer, logo, &layout);

        let brand = &config.brand;
        writer.text_element(
            "text",
            &[
                ("id", "brand".to_string()),
                ("x", fmt_num(inner.x + inner.width / 2.0)),
                ("y", fmt_num(layout.brand_baseline)),
                ("text-anchor", "middle".to_string()),
                ("font-family", brand.font_family.clone()),
                ("font-size", fmt_num(brand.font_size_px)),
                ("font-weight", brand.font_weight.clone()),
                ("fill", brand.color.clone()),
            ],
            &brand.text,
        );

        writer.end(); // framed-layout
        writer.end(); // sticker-content
        writer.end(); // svg
    }

    fn write_defs<W: SvgWriter>(&self, writer: &mut W) {
        let logo = &self.config.logo;
        let sticker = &self.config.sticker;

        writer.start("defs", &[]);
        writer.start(
            "filter",
            &[
                ("id", "logo-shadow".to_string()),
                ("x", "-20%".to_string()),
                ("y", "-20%".to_string()),
                ("width", "140%".to_string()),
                ("height", "140%".to_string()),
            ],
        );
        writer.empty(
            "feGaussianBlur",
            &[
                ("in", "SourceAlpha".to_string()),
                ("stdDeviation", fmt_num(logo.shadow_blur)),
                ("result", "blur".to_string()),
            ],
        );
        writer.empty(
            "feOffset",
            &[
                ("in", "blur".to_string()),
                ("dx", "0".to_string()),
                ("dy", "1".to_string()),
                ("result", "offsetBlur".to_string()),
            ],
        );
        writer.start(
            "feComponentTransfer",
            &[("in", "offsetBlur".to_string()), ("result", "shadow".to_string())],
        );
        writer.empty(
            "feFuncA",
            &[("type", "linear".to_string()), ("slope", fmt_num(logo.shadow_opacity))],
        );
        writer.end();
        writer.start("feMerge", &[]);
        writer.empty("feMergeNode", &[("in", "shadow".to_string())]);
        writer.empty("feMergeNode", &[("in", "SourceGraphic".to_string())]);
        writer.end();
        writer.end(); // filter

        writer.start("clipPath", &[("id", "sticker-clip".to_string())]);
        writer.empty(
            "rect",
            &[
                ("x", fmt_num(sticker.bleed_px)),
                ("y", fmt_num(sticker.bleed_px)),
                ("width", fmt_num(sticker.size_px)),
                ("height", fmt_num(sticker.size_px)),
                ("rx", fmt_num(sticker.corner_radius_px)),
                ("ry", fmt_num(sticker.corner_radius_px)),
            ],
        );
        writer.end();
        writer.end(); // defs
    }

    fn write_trim_marks<W: SvgWriter>(&self, writer: &mut W) {
        let bleed = self.config.sticker.bleed_px;
        let far = bleed + self.config.sticker.size_px;
        let (len, off) = (TRIM_MARK_LENGTH, TRIM_MARK_OFFSET);

        let marks = [
            // top left
            (bleed - off, bleed - len - off, bleed - off, bleed - off),
            (bleed - len - off, bleed - off, bleed - off, bleed - off),
            // top right
            (far + off, bleed - len - off, far + off, bleed - off),
            (far + off, bleed - off, far + len + off, bleed - off),
            // bottom left
            (bleed - off, far + off, bleed - off, far + len + off),
            (bleed - len - off, far + off, bleed - off, far + off),
            // bottom right
            (far + off, far + off, far + off, far + len + off),
            (far + off, far + off, far + len + off, far + off),
        ];

        writer.start(
            "g",
            &[
                ("id", "trim-marks".to_string()),
                ("stroke", "#000000".to_string()),
                ("stroke-width", "0.25".to_string()),
                ("opacity", "0.5".to_string()),
                ("fill", "none".to_string()),
            ],
        );
        for (x1, y1, x2, y2) in marks {
            writer.empty(
                "line",
                &[
                    ("x1", fmt_num(x1)),
                    ("y1", fmt_num(y1)),
                    ("x2", fmt_num(x2)),
                    ("y2", fmt_num(y2)),
                    ("class", "trim-mark".to_string()),
                ],
            );
        }
        writer.end();
    }

    fn write_caption<W: SvgWriter>(&self, writer: &mut W, layout: &StickerLayout) {
        let Some(first) = layout.caption_lines.first() else {
            return;
        };
        let caption = &self.config.caption;
        let x = fmt_num(layout.inner.x + layout.inner.width / 2.0);
        let attrs = [
            ("id", "caption".to_string()),
            ("x", x.clone()),
            ("y", fmt_num(layout.caption_baseline)),
            ("text-anchor", "middle".to_string()),
            ("font-family", caption.font_family.clone()),
            ("font-size", fmt_num(caption.font_size_px)),
            ("font-weight", caption.font_weight.clone()),
            ("fill", caption.color.clone()),
        ];

        if layout.caption_lines.len() == 1 {
            writer.text_element("text", &attrs, first);
            return;
        }

        writer.start("text", &attrs);
        for (index, line) in layout.caption_lines.iter().enumerate() {
            let dy = if index == 0 { "0" } else { "1.2em" };
            writer.text_element("tspan", &[("x", x.clone()), ("dy", dy.to_string())], line);
        }
        writer.end();
    }

    fn write_qr<W: SvgWriter>(&self, writer: &mut W, qr: &GenerationResult, layout: &StickerLayout) {
        let slot = layout.qr;
        writer.start(
            "g",
            &[
                ("id", "qr-code".to_string()),
                ("transform", format!("translate({}, {})", fmt_num(slot.x), fmt_num(slot.y))),
            ],
        );
        match embeddable_qr(&qr.svg, slot.width) {
            Ok(element) => element.write_to(writer),
            Err(err) => {
                warn!(error = %err, "QR image could not be embedded, drawing placeholder");
                write_placeholder(writer, slot.width);
            }
        }
        writer.end();
    }

    fn write_logo<W: SvgWriter>(&self, writer: &mut W, logo: &LogoRef, layout: &StickerLayout) {
        let badge = layout.badge;
        let area = layout.logo;
        let radius = fmt_num((badge.width * BADGE_RADIUS_RATIO).floor());

        writer.start("g", &[("id", "logo-overlay".to_string())]);
        writer.empty(
            "rect",
            &[
                ("x", fmt_num(badge.x)),
                ("y", fmt_num(badge.y)),
                ("width", fmt_num(badge.width)),
                ("height", fmt_num(badge.height)),
                ("rx", radius.clone()),
                ("ry", radius),
                ("fill", "#FFFFFF".to_string()),
                ("filter", "url(#logo-shadow)".to_string()),
            ],
        );

        match logo {
            LogoRef::Inline(root) => {
                let mut element = root.clone();
                element.set_attr("x", fmt_num(area.x));
                element.set_attr("y", fmt_num(area.y));
                element.set_attr("width", fmt_num(area.width));
                element.set_attr("height", fmt_num(area.height));
                element.write_to(writer);
            }
            LogoRef::Href(target) => writer.empty(
                "image",
                &[
                    ("x", fmt_num(area.x)),
                    ("y", fmt_num(area.y)),
                    ("width", fmt_num(area.width)),
                    ("height", fmt_num(area.height)),
                    ("href", target.clone()),
                    ("preserveAspectRatio", "xMidYMid meet".to_string()),
                ],
            ),
            LogoRef::Fallback => {
                let (cx, cy) = area.center();
                writer.empty(
                    "circle",
                    &[
                        ("cx", fmt_num(cx)),
                        ("cy", fmt_num(cy)),
                        ("r", fmt_num(area.width / 2.0 - 2.0)),
                        ("fill", FALLBACK_LOGO_COLOR.to_string()),
                    ],
                );
                writer.text_element(
                    "text",
                    &[
                        ("x", fmt_num(cx)),
                        ("y", fmt_num(cy + 4.0)),
                        ("text-anchor", "middle".to_string()),
                        ("font-family", self.config.caption.font_family.clone()),
                        ("font-size", fmt_num(area.width / 2.0)),
                        ("font-weight", "bold".to_string()),
                        ("fill", "#FFFFFF".to_string()),
                    ],
                    &self.brand_initial(),
                );
            }
        }
        writer.end();
    }

    fn brand_initial(&self) -> String {
        self.config
            .brand
            .text
            .chars()
            .next()
            .map_or_else(|| "P".to_string(), |c| c.to_uppercase().collect())
    }
}

// Parses encoder output and resizes it to fill the slot.
fn embeddable_qr(svg: &str, size: f64) -> Result<Element> {
    let mut root = SvgDocument::parse(svg)?.root;
    if root.attr("viewBox").is_none() {
        let dimension = |name: &str| {
            root.attr(name)
                .and_then(|value| value.trim_end_matches("px").parse::<f64>().ok())
                .unwrap_or(size)
        };
        let view_box = format!("0 0 {} {}", fmt_num(dimension("width")), fmt_num(dimension("height")));
        root.set_attr("viewBox", view_box);
    }
    root.set_attr("width", fmt_num(size));
    root.set_attr("height", fmt_num(size));
    root.set_attr("preserveAspectRatio", "xMidYMid meet");
    Ok(root)
}

fn write_placeholder<W: SvgWriter>(writer: &mut W, size: f64) {
    writer.empty(
        "rect",
        &[
            ("width", fmt_num(size)),
            ("height", fmt_num(size)),
            ("fill", "#000000".to_string()),
        ],
    );
    writer.text_element(
        "text",
        &[
            ("x", fmt_num(size / 2.0)),
            ("y", fmt_num(size / 2.0)),
            ("text-anchor", "middle".to_string()),
            ("dominant-baseline", "middle".to_string()),
            ("fill", "#FFFFFF".to_string()),
            ("font-size", "12".to_string()),
        ],
        "QR ERROR",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::QrGenerator;

    const TOKEN: &str = "ABCDEFGHIJ0123456789";

    fn qr_result(config: &StickerConfig) -> GenerationResult {
        let generator = QrGenerator::new(config);
        generator
            .generate_from_token(TOKEN, "token", &generator.default_options())
            .unwrap()
    }

    #[test]
    fn test_string_and_tree_renderings_match() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let qr = qr_result(&config);
        let options = StickerOptions {
            include_trim_marks: true,
            ..StickerOptions::default()
        };

        for logo in [LogoRef::Fallback, LogoRef::href("/icons/appicon.light.svg")] {
            for caption in ["", "Scan to check in!", "Summit register for the north ridge route"] {
                let tree = composer.create_sticker_svg(&qr, &logo, caption, &options).unwrap();
                let text = composer.render_sticker_string(&qr, &logo, caption, &options);
                assert_eq!(tree.to_xml_string(), text);
            }
        }
    }

    #[test]
    fn test_document_structure() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let qr = qr_result(&config);
        let document = composer
            .create_sticker_svg(&qr, &LogoRef::Fallback, "Scan to check in!", &StickerOptions::default())
            .unwrap();
        let root = &document.root;

        assert_eq!(root.attr("width"), Some("211"));
        assert_eq!(root.attr("viewBox"), Some("0 0 211 211"));
        assert_eq!(root.attr("data-generator"), Some("Peakbook QR Generator"));
        assert_eq!(root.attr("data-print-size"), Some("5cm"));
        assert_eq!(root.attr("data-bleed"), Some("0.3cm"));
        assert_eq!(root.find("title").unwrap().text_content(), "Peakbook QR Code Sticker");
        assert!(root.find("desc").unwrap().text_content().contains("5cm × 5cm with 0.3cm bleed"));
        assert_eq!(root.find_by_id("caption").unwrap().text_content(), "Scan to check in!");
        assert_eq!(root.find_by_id("brand").unwrap().text_content(), "peakbook");
        assert_eq!(
            root.find_by_id("sticker-content").unwrap().attr("clip-path"),
            Some("url(#sticker-clip)")
        );
        assert!(root.find_by_id("logo-shadow").is_some());
        assert!(root.find_by_id("trim-marks").is_none());

        let embedded = root.find_by_id("qr-code").unwrap().find("svg").unwrap();
        assert_eq!(embedded.attr("preserveAspectRatio"), Some("xMidYMid meet"));
        assert_eq!(embedded.attr("viewBox"), Some("0 0 37 37"));

        // Serialized output must be well-formed
        roxmltree::Document::parse(&document.to_xml_string()).unwrap();
    }

    #[test]
    fn test_layout_defaults() {
        let config = StickerConfig::default();
        let layout = StickerComposer::new(&config).layout("", 37);
        assert_eq!(layout.canvas, 211.0);
        assert_eq!(layout.inner, Rect { x: 19.0, y: 19.0, width: 173.0, height: 173.0 });
        assert_eq!(layout.module_px, 4.0);
        assert_eq!(layout.caption_height, 0.0);
        assert!((layout.qr.width - 136.2).abs() < 1e-9);
        assert_eq!(layout.badge.width, 46.0);
        let (bx, by) = layout.badge.center();
        let (qx, qy) = layout.qr.center();
        assert!((bx - qx).abs() < 1e-9 && (by - qy).abs() < 1e-9);

        // Frame stroke inner edge to the code, in code modules
        let qr_module = layout.qr.width / 37.0;
        let stroke_edge = layout.inner.y + layout.module_px / 2.0;
        assert!((layout.qr.y - stroke_edge) / qr_module >= 1.0);
        assert!((layout.qr.y - 29.0).abs() < 1e-9);
        let bottom_edge = layout.inner.y + layout.inner.height - layout.module_px / 2.0;
        assert!(layout.qr.y + layout.qr.height + layout.spacing + layout.brand_height <= bottom_edge + 1e-9);

        // Unknown module count uses the configured approximation
        assert_eq!(StickerComposer::new(&config).layout("", 0).module_px, 5.0);
    }

    #[test]
    fn test_caption_reduces_qr_room() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let caption = "Scan here to check in at the summit of this peak";
        let long = "a".repeat(50);

        let empty = composer.layout("", 37);
        for text in [caption, long.as_str()] {
            let captioned = composer.layout(text, 37);
            assert!(empty.available_height > captioned.available_height);
            assert!(empty.qr.height > captioned.qr.height);
            assert!(captioned.qr.y > captioned.caption_baseline);
        }
        assert!(composer.layout(caption, 37).caption_lines.len() > 1);
    }

    #[test]
    fn test_wrap_caption() {
        assert!(wrap_caption("", 25).is_empty());
        assert_eq!(wrap_caption("Scan to check in!", 25), vec!["Scan to check in!"]);
        assert_eq!(
            wrap_caption("Scan here to check in at the summit", 25),
            vec!["Scan here to check in at", "the summit"]
        );
        let long_word = "x".repeat(30);
        assert_eq!(wrap_caption(&format!("{long_word} end"), 25), vec![long_word, "end".to_string()]);
    }

    #[test]
    fn test_wrapped_caption_uses_tspans() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let svg = composer.render_sticker_string(
            &qr_result(&config),
            &LogoRef::Fallback,
            "Scan here to check in at the summit",
            &StickerOptions::default(),
        );
        assert!(svg.contains(r#"dy="0">Scan here to check in at</tspan>"#));
        assert!(svg.contains(r#"dy="1.2em">the summit</tspan>"#));
    }

    #[test]
    fn test_broken_qr_becomes_placeholder() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let mut qr = qr_result(&config);
        qr.svg = "<svg><g></svg>".to_string();

        let document = composer
            .create_sticker_svg(&qr, &LogoRef::Fallback, "", &StickerOptions::default())
            .unwrap();
        let slot = document.root.find_by_id("qr-code").unwrap();
        assert!(slot.find("svg").is_none());
        assert_eq!(slot.find("text").unwrap().text_content(), "QR ERROR");
        roxmltree::Document::parse(&document.to_xml_string()).unwrap();
    }

    #[test]
    fn test_trim_marks_and_square_corners() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let options = StickerOptions {
            include_trim_marks: true,
            rounded: false,
            colors: Some(ColorScheme::tinted()),
        };
        let document = composer
            .create_sticker_svg(&qr_result(&config), &LogoRef::Fallback, "", &options)
            .unwrap();
        let root = &document.root;

        let marks = root.find_by_id("trim-marks").unwrap();
        assert_eq!(marks.elements().count(), 8);
        assert_eq!(marks.elements().next().unwrap().attr("x1"), Some("9"));
        assert_eq!(root.find_by_id("sticker-content").unwrap().attr("clip-path"), None);
        assert_eq!(root.find_by_id("background").unwrap().attr("fill"), Some("#99bdc6"));
    }

    #[test]
    fn test_logo_variants() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let qr = qr_result(&config);
        let overlay = |logo: &LogoRef| {
            let document = composer
                .create_sticker_svg(&qr, logo, "", &StickerOptions::default())
                .unwrap();
            document.root.find_by_id("logo-overlay").unwrap().clone()
        };

        let fallback = overlay(&LogoRef::Fallback);
        assert!(fallback.find("circle").is_some());
        assert_eq!(fallback.find("text").unwrap().text_content(), "P");

        let image = overlay(&LogoRef::href("/icons/appicon.light.svg"));
        assert_eq!(image.find("image").unwrap().attr("width"), Some("38"));

        let inline = LogoRef::from_svg_str(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><rect width="10" height="10"/></svg>"#,
        )
        .unwrap();
        let embedded = overlay(&inline);
        let logo = embedded.find("svg").unwrap();
        assert_eq!(logo.attr("height"), Some("38"));
        assert_eq!(embedded.find("rect").unwrap().attr("rx"), Some("8"));
    }

    #[test]
    fn test_inkscape_logo_stays_well_formed() {
        let config = StickerConfig::default();
        let composer = StickerComposer::new(&config);
        let logo = LogoRef::from_svg_str(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd" version="1.1" inkscape:version="1.3" viewBox="0 0 10 10"><sodipodi:namedview pagecolor="#ffffff"/><g inkscape:groupmode="layer"><circle cx="5" cy="5" r="5"/></g></svg>"##,
        )
        .unwrap();
        let qr = qr_result(&config);

        let xml = composer
            .create_sticker_svg(&qr, &logo, "", &StickerOptions::default())
            .unwrap()
            .to_xml_string();
        assert_eq!(xml, composer.render_sticker_string(&qr, &logo, "", &StickerOptions::default()));
        assert!(!xml.contains("version=\"1.3\""));

        let parsed = roxmltree::Document::parse(&xml).unwrap();
        let overlay = parsed
            .descendants()
            .find(|node| node.attribute("id") == Some("logo-overlay"))
            .unwrap();
        assert!(overlay.descendants().any(|node| node.has_tag_name("circle")));
    }
}
