//! Export and packaging of finished stickers.
//!
//! Covers the download filename, saving to disk, the print HTML shell, preview resizing and a
//! raster or terminal preview of the bare symbol.

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, Luma};
use tracing::info;

use crate::config::{px_to_mm, StickerConfig, SVG_FILENAME_TEMPLATE};
use crate::error::{Error, Result};
use crate::qrcode::{QrCode, QrCodeEcc};
use crate::svg::{escape_xml, fmt_num, SvgDocument};
use crate::validator::{validate_filename, validate_svg_content};

/// Quiet zone, in modules, around raster and terminal previews.
const PREVIEW_BORDER: i32 = 4;

/// Download filename for a token.
///
/// # Example
///
/// ```
/// use peakbook_qr::export::get_filename;
///
/// assert_eq!(get_filename("ABCDEFGHIJ0123456789"), "peakbook-qr-ABCDEFGHIJ0123456789.svg");
/// ```
pub fn get_filename(token: &str) -> String {
    SVG_FILENAME_TEMPLATE.replace("{token}", token)
}

/// Writes an SVG document into `directory`, creating it if needed.
///
/// # Arguments
///
/// * `directory` - Target directory.
/// * `filename` - Requested name; it is sanitized and forced to end in `.svg`.
/// * `svg` - Serialized document.
///
/// # Errors
///
/// Returns [`Error::InvalidSvg`] when the content has no `<svg>` root, or [`Error::Io`] when the
/// file cannot be written.
///
/// # Returns
///
/// The path actually written.
pub fn save_svg(directory: impl AsRef<Path>, filename: &str, svg: &str) -> Result<PathBuf> {
    let content = validate_svg_content(svg);
    if !content.valid {
        return Err(Error::InvalidSvg(content.issues.join(", ")));
    }

    let directory = directory.as_ref();
    let path = directory.join(validate_filename(filename).sanitized);
    if !directory.exists() {
        fs::create_dir_all(directory)?;
    }
    fs::write(&path, svg)?;
    info!(path = %path.display(), bytes = svg.len(), "sticker saved");
    Ok(path)
}

/// Settings for [`print_html`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrintOptions {
    /// Page title. Defaults to `Peakbook QR Sticker - {token}`.
    pub title: Option<String>,
    pub show_instructions: bool,
    /// Preformatted generation timestamp shown in the information block.
    pub generated_at: Option<String>,
    /// Trimmed sticker edge in millimetres.
    pub sticker_mm: f64,
    pub bleed_mm: f64,
    /// Full canvas edge, bleed included, in millimetres.
    pub canvas_mm: f64,
}

impl PrintOptions {
    pub fn from_config(config: &StickerConfig) -> Self {
        Self {
            title: None,
            show_instructions: true,
            generated_at: None,
            sticker_mm: config.sticker.size_cm * 10.0,
            bleed_mm: config.sticker.bleed_cm * 10.0,
            canvas_mm: px_to_mm(config.total_size_px()),
        }
    }
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self::from_config(&StickerConfig::default())
    }
}

/// Wraps a sticker in a printable HTML page.
///
/// The document is embedded unchanged apart from its XML declaration, and CSS pins it to its
/// physical size so that printing at 100% yields a sticker of exactly `sticker_mm` after trimming.
pub fn print_html(svg: &str, token: &str, options: &PrintOptions) -> String {
    let title = options
        .title
        .clone()
        .unwrap_or_else(|| format!("Peakbook QR Sticker - {token}"));
    let canvas = fmt_num(options.canvas_mm);
    let sticker = fmt_num(options.sticker_mm);
    let bleed = fmt_num(options.bleed_mm);

    let mut html = String::new();
    html += "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n";
    html += "<meta charset=\"UTF-8\">\n";
    html += "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n";
    html += &format!("<title>{}</title>\n", escape_xml(&title));
    html += "<style>\n";
    html += "@page { size: A4; margin: 20mm; }\n";
    html += "* { box-sizing: border-box; }\n";
    html += "body { margin: 0; padding: 0; font-family: system-ui, -apple-system, sans-serif; background: white; color: black; }\n";
    html += ".print-container { max-width: 100%; margin: 0 auto; text-align: center; }\n";
    html += ".sticker-wrapper { display: inline-block; margin: 20mm auto; padding: 5mm; border: 1px dashed #ccc; background: white; }\n";
    html += &format!(
        ".sticker-svg svg {{ width: {canvas}mm !important; height: {canvas}mm !important; display: block; margin: 0 auto; }}\n"
    );
    html += ".print-info { margin-top: 10mm; padding: 5mm; border: 1px solid #ddd; background: #f9f9f9; text-align: left; page-break-inside: avoid; }\n";
    html += ".token-info { background: #e3f2fd; padding: 8px; border-radius: 4px; margin: 10px 0; font-family: monospace; font-size: 14px; }\n";
    html += "@media print {\n";
    html += "  body { -webkit-print-color-adjust: exact; print-color-adjust: exact; }\n";
    html += "  .sticker-wrapper { border: none; padding: 0; margin: 10mm auto; }\n";
    html += "  .print-info { page-break-before: always; }\n";
    html += "}\n";
    html += "</style>\n</head>\n<body>\n";
    html += "<div class=\"print-container\">\n";
    html += "<div class=\"sticker-wrapper\"><div class=\"sticker-svg\">\n";
    html += strip_xml_declaration(svg);
    html += "\n</div></div>\n";

    if options.show_instructions {
        html += "<div class=\"print-info\">\n<h2>Sticker Information</h2>\n";
        html += "<div class=\"token-info\">\n";
        html += &format!("<strong>Token:</strong> {}<br>\n", escape_xml(token));
        html += &format!(
            "<strong>Size:</strong> {}cm × {}cm (with {bleed}mm bleed)",
            fmt_num(options.sticker_mm / 10.0),
            fmt_num(options.sticker_mm / 10.0)
        );
        if let Some(generated_at) = &options.generated_at {
            html += &format!("<br>\n<strong>Generated:</strong> {}", escape_xml(generated_at));
        }
        html += "\n</div>\n";
        html += "<h3>Printing Guidelines:</h3>\n<ol>\n";
        html += "<li>Print at 100% scale (no fit to page)</li>\n";
        html += "<li>Use high-quality print settings (300 DPI minimum)</li>\n";
        html += "<li>Print on white or light-colored stock</li>\n";
        html += &format!("<li>For professional printing, inform printer of {bleed}mm bleed margins</li>\n");
        html += "<li>Test scan the printed QR code before bulk production</li>\n";
        html += "</ol>\n<h3>Quality Check:</h3>\n<ul>\n";
        html += "<li>QR modules should be crisp and well-defined</li>\n";
        html += "<li>Logo should be centered and clearly visible</li>\n";
        html += "<li>Caption text should be readable</li>\n";
        html += &format!("<li>Overall sticker should be {sticker}mm × {sticker}mm when trimmed</li>\n");
        html += "</ul>\n</div>\n";
    }

    html += "</div>\n</body>\n</html>\n";
    html
}

fn strip_xml_declaration(svg: &str) -> &str {
    let trimmed = svg.trim_start();
    match trimmed.strip_prefix("<?xml") {
        Some(rest) => rest.find("?>").map_or(trimmed, |end| rest[end + 2..].trim_start()),
        None => trimmed,
    }
}

/// Returns a copy of the document with only its root width and height changed.
///
/// # Errors
///
/// Returns [`Error::InvalidSvg`] when `svg` is not an SVG document.
pub fn preview_svg(svg: &str, size: u32) -> Result<String> {
    let mut document = SvgDocument::parse(svg)?;
    document.root.set_attr("width", size.to_string());
    document.root.set_attr("height", size.to_string());
    Ok(document.to_xml_string())
}

/// Rasterizes a QR code for `data` with a 4-module quiet zone.
///
/// # Arguments
///
/// * `data` - The payload to encode.
/// * `ecc` - Error correction level.
/// * `scale` - Pixels per module, at least 1.
///
/// # Errors
///
/// Returns [`Error::Encode`] when `data` does not fit a version 40 symbol.
pub fn preview_image(data: &str, ecc: QrCodeEcc, scale: u32) -> Result<GrayImage> {
    let qr = QrCode::encode_text(data, ecc)?;
    let scale = scale.max(1);
    let modules = (qr.size() + 2 * PREVIEW_BORDER) as u32;
    let mut img = ImageBuffer::new(modules * scale, modules * scale);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let qr_x = (x / scale) as i32 - PREVIEW_BORDER;
        let qr_y = (y / scale) as i32 - PREVIEW_BORDER;
        *pixel = if qr.get_module(qr_x, qr_y) {
            Luma([0u8])
        } else {
            Luma([255u8])
        };
    }
    Ok(img)
}

/// Writes [`preview_image`] to a PNG file, creating parent directories.
///
/// # Errors
///
/// Returns [`Error::Encode`], [`Error::Io`] or [`Error::Image`].
pub fn save_preview_png(path: impl AsRef<Path>, data: &str, ecc: QrCodeEcc, scale: u32) -> Result<()> {
    let path = path.as_ref();
    let img = preview_image(data, ecc, scale)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    img.save(path)?;
    info!(path = %path.display(), width = img.width(), "preview saved");
    Ok(())
}

/// Draws a symbol with block characters, two per module so it stays square in a terminal.
pub fn render_terminal(qr: &QrCode) -> String {
    let mut out = String::new();
    for y in -PREVIEW_BORDER..qr.size() + PREVIEW_BORDER {
        for x in -PREVIEW_BORDER..qr.size() + PREVIEW_BORDER {
            let c = if qr.get_module(x, y) { '█' } else { ' ' };
            out.push(c);
            out.push(c);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SVG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"211\" height=\"211\" viewBox=\"0 0 211 211\"><rect width=\"1\" height=\"1\"/></svg>";

    #[test]
    fn test_save_svg_sanitizes_name() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("out");
        let path = save_svg(&target, "Peak Sticker", SVG).unwrap();
        assert_eq!(path, target.join("peak_sticker.svg"));
        assert_eq!(fs::read_to_string(&path).unwrap(), SVG);
    }

    #[test]
    fn test_save_svg_rejects_non_svg() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            save_svg(dir.path(), "x.svg", "<html/>"),
            Err(Error::InvalidSvg(_))
        ));
    }

    #[test]
    fn test_print_html() {
        let options = PrintOptions {
            generated_at: Some("2026-10-18 09:00".to_string()),
            ..PrintOptions::default()
        };
        let html = print_html(SVG, "ABCDEFGHIJ0123456789", &options);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Peakbook QR Sticker - ABCDEFGHIJ0123456789</title>"));
        assert!(html.contains("@page { size: A4; margin: 20mm; }"));
        assert!(html.contains("width: 55.83mm"));
        assert!(html.contains("Print at 100% scale"));
        assert!(html.contains("300 DPI"));
        assert!(html.contains("3mm bleed"));
        assert!(html.contains("2026-10-18 09:00"));
        // Embedded document is untouched apart from the declaration
        assert!(!html.contains("<?xml"));
        assert!(html.contains(&SVG[SVG.find("<svg").unwrap()..]));

        let bare = print_html(SVG, "T", &PrintOptions { show_instructions: false, ..options });
        assert!(!bare.contains("Printing Guidelines"));
    }

    #[test]
    fn test_preview_svg_only_touches_root_size() {
        let preview = preview_svg(SVG, 280).unwrap();
        let document = SvgDocument::parse(&preview).unwrap();
        assert_eq!(document.root.attr("width"), Some("280"));
        assert_eq!(document.root.attr("viewBox"), Some("0 0 211 211"));
        assert!(preview_svg("<div/>", 280).is_err());
    }

    #[test]
    fn test_preview_image_has_quiet_zone() {
        let img = preview_image("Hello, world!", QrCodeEcc::Low, 2).unwrap();
        assert_eq!(img.width(), (21 + 8) * 2);
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        // Top-left finder corner starts after the quiet zone
        assert_eq!(img.get_pixel(8, 8), &Luma([0u8]));
    }

    #[test]
    fn test_save_preview_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("previews").join("qr.png");
        save_preview_png(&path, "Hello, world!", QrCodeEcc::Medium, 4).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), (21 + 8) * 4);
    }

    #[test]
    fn test_render_terminal() {
        let qr = QrCode::encode_text("Hello, world!", QrCodeEcc::Low).unwrap();
        let text = render_terminal(&qr);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 29);
        assert_eq!(lines[0].chars().count(), 58);
        assert!(lines[4].starts_with("        ██"));
    }
}
