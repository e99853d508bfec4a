//! Input validation for sticker generation.
//!
//! Every function here is pure and total: malformed input yields a failure value, never a panic.
//! Single-field checks return `Result<(), ValidationError>`; [`validate_all`] collects every
//! failing field instead of stopping at the first.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{
    self, build_url, check_qr_capacity, CapacityReport, CAPTION_FORBIDDEN, CAPTION_MAX_LENGTH,
    DEFAULT_PARAM_NAME, SCAN_DOMAIN, SCAN_PATH, TOKEN_LENGTH,
};
use crate::qrcode::QrCodeEcc;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{20}$").expect("static regex"));
static PARAM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").expect("static regex"));
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

const MAX_FILENAME_LENGTH: usize = 200;
const MAX_SVG_BYTES: usize = 1024 * 1024;

/// A user-correctable input problem. The `Display` text is shown to the operator verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Token is required")]
    TokenRequired,
    #[error("Token must be exactly 20 characters long")]
    TokenInvalidLength,
    #[error("Token can only contain uppercase letters (A-Z) and numbers (0-9)")]
    TokenInvalidChars,
    #[error("Caption cannot exceed 50 characters")]
    CaptionTooLong,
    #[error("Caption contains characters that may not print correctly")]
    CaptionUnprintable,
    #[error("Parameter name is required")]
    ParamRequired,
    #[error("Parameter name must start with a letter and contain only letters, numbers, underscores, or hyphens")]
    ParamInvalid,
    #[error("Invalid URL format")]
    UrlMalformed,
    #[error("URL must use HTTPS protocol")]
    UrlNotHttps,
    #[error("URL must be for peakbook.app domain")]
    UrlWrongDomain,
    #[error("URL must use /scan path")]
    UrlWrongPath,
    #[error("Error correction level must be L, M, Q, or H")]
    EccInvalid,
    #[error("Filename is required")]
    FilenameRequired,
    #[error("Filename is too long")]
    FilenameTooLong,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        use ValidationError::*;
        match self {
            TokenRequired => "TOKEN_REQUIRED",
            TokenInvalidLength => "TOKEN_INVALID_LENGTH",
            TokenInvalidChars => "TOKEN_INVALID_CHARS",
            CaptionTooLong => "CAPTION_TOO_LONG",
            CaptionUnprintable => "CAPTION_UNPRINTABLE",
            ParamRequired => "PARAM_REQUIRED",
            ParamInvalid => "PARAM_INVALID",
            UrlMalformed => "URL_MALFORMED",
            UrlNotHttps => "URL_NOT_HTTPS",
            UrlWrongDomain => "URL_WRONG_DOMAIN",
            UrlWrongPath => "URL_WRONG_PATH",
            EccInvalid => "ECC_INVALID",
            FilenameRequired => "FILENAME_REQUIRED",
            FilenameTooLong => "FILENAME_TOO_LONG",
        }
    }
}

/// Form input as submitted by the admin screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrFormData {
    pub token: String,
    pub caption: Option<String>,
    pub param_name: Option<String>,
    pub ecc_level: Option<String>,
}

impl QrFormData {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_param_name(mut self, param_name: impl Into<String>) -> Self {
        self.param_name = Some(param_name.into());
        self
    }

    pub fn with_ecc_level(mut self, ecc_level: impl Into<String>) -> Self {
        self.ecc_level = Some(ecc_level.into());
        self
    }

    /// The caption, or `""` when absent.
    pub fn caption(&self) -> &str {
        self.caption.as_deref().unwrap_or("")
    }

    /// The parameter name, falling back to `token` when absent or empty.
    pub fn param_name(&self) -> &str {
        match self.param_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_PARAM_NAME,
        }
    }

    /// The requested level letter, ignoring an empty selection.
    pub fn ecc_level(&self) -> Option<&str> {
        self.ecc_level.as_deref().filter(|level| !level.is_empty())
    }
}

/// Per-field messages from [`validate_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecc_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// The first message in field order: token, caption, paramName, eccLevel, url.
    pub fn first(&self) -> Option<&str> {
        [&self.token, &self.caption, &self.param_name, &self.ecc_level, &self.url]
            .into_iter()
            .find_map(|message| message.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormValidation {
    pub valid: bool,
    pub errors: ValidationErrors,
}

/// Checks a token: required, then exactly 20 characters, then `[A-Z0-9]` only.
pub fn validate_token(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::TokenRequired);
    }
    if token.chars().count() != TOKEN_LENGTH {
        return Err(ValidationError::TokenInvalidLength);
    }
    if !TOKEN_PATTERN.is_match(token) {
        return Err(ValidationError::TokenInvalidChars);
    }
    Ok(())
}

/// Checks an optional caption. The empty caption is valid.
pub fn validate_caption(caption: &str) -> Result<(), ValidationError> {
    if caption.is_empty() {
        return Ok(());
    }
    if caption.chars().count() > CAPTION_MAX_LENGTH {
        return Err(ValidationError::CaptionTooLong);
    }
    if caption.contains(CAPTION_FORBIDDEN) {
        return Err(ValidationError::CaptionUnprintable);
    }
    Ok(())
}

pub fn validate_parameter_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::ParamRequired);
    }
    if !PARAM_PATTERN.is_match(name) {
        return Err(ValidationError::ParamInvalid);
    }
    Ok(())
}

/// Checks that `url` is an `https://peakbook.app/scan` URL.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|_| ValidationError::UrlMalformed)?;
    if parsed.scheme() != "https" {
        return Err(ValidationError::UrlNotHttps);
    }
    if parsed.host_str() != Some(SCAN_DOMAIN) {
        return Err(ValidationError::UrlWrongDomain);
    }
    if parsed.path() != SCAN_PATH {
        return Err(ValidationError::UrlWrongPath);
    }
    Ok(())
}

/// Parses one of `L`, `M`, `Q`, `H`.
pub fn validate_ecc_level(level: &str) -> Result<QrCodeEcc, ValidationError> {
    level.parse().map_err(|_| ValidationError::EccInvalid)
}

/// Runs every field check and, only if all pass, validates the resulting scan URL.
pub fn validate_all(form: &QrFormData) -> FormValidation {
    let mut errors = ValidationErrors::default();
    let message = |err: ValidationError| err.to_string();

    errors.token = validate_token(&form.token).err().map(message);
    errors.caption = validate_caption(form.caption()).err().map(message);
    errors.param_name = validate_parameter_name(form.param_name()).err().map(message);
    if let Some(level) = form.ecc_level() {
        errors.ecc_level = validate_ecc_level(level).err().map(message);
    }

    if errors.is_empty() {
        let url = build_url(&form.token, form.param_name());
        errors.url = validate_url(&url).err().map(message);
    }

    FormValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// What [`sanitize_input`] should clean for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Token,
    Caption,
    Param,
    Text,
}

/// Cleans raw input so it has a chance of passing validation.
///
/// Input is trimmed first. Tokens are uppercased and reduced to `[A-Z0-9]`; captions and text
/// lose `< > { } \`; parameter names are lowercased, reduced to `[a-z0-9_-]` and prefixed with
/// `t` when they would not start with a letter.
pub fn sanitize_input(input: &str, kind: InputKind) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match kind {
        InputKind::Token => trimmed
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect(),
        InputKind::Caption | InputKind::Text => trimmed
            .chars()
            .filter(|c| !CAPTION_FORBIDDEN.contains(c))
            .collect(),
        InputKind::Param => {
            let cleaned: String = trimmed
                .to_lowercase()
                .chars()
                .filter(|&c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
                .collect();
            match cleaned.chars().next() {
                Some(first) if !first.is_ascii_lowercase() => format!("t{cleaned}"),
                _ => cleaned,
            }
        }
    }
}

/// Live help line for the token field.
pub fn token_help_text(token: &str) -> String {
    if token.is_empty() {
        return "Enter a 20-character token".to_string();
    }

    let length = token.chars().count();
    if length < TOKEN_LENGTH {
        let remaining = TOKEN_LENGTH - length;
        let plural = if remaining == 1 { "" } else { "s" };
        return format!("{remaining} more character{plural} needed");
    }
    if length > TOKEN_LENGTH {
        return "Token is too long".to_string();
    }

    match validate_token(token) {
        Ok(()) => "✓ Token is valid".to_string(),
        Err(err) => err.to_string(),
    }
}

/// Sanitizes keystrokes for the token field and caps them at 20 characters.
pub fn format_token_input(input: &str) -> String {
    sanitize_input(input, InputKind::Token)
        .chars()
        .take(TOKEN_LENGTH)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scannability {
    pub scannable: bool,
    pub warning: Option<String>,
    pub capacity: CapacityReport,
}

/// Reports whether `url` fits the capacity of `level`, warning from 80% upwards.
pub fn check_scannability(url: &str, level: QrCodeEcc) -> Scannability {
    let capacity = check_qr_capacity(url, level);
    let warning = if !capacity.within_limit {
        Some("URL is too long for QR code generation".to_string())
    } else if capacity.near_limit {
        Some(format!("URL is using {}% of QR code capacity", capacity.percent_used))
    } else {
        None
    };

    Scannability {
        scannable: capacity.within_limit,
        warning,
        capacity,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameCheck {
    pub valid: bool,
    pub error: Option<ValidationError>,
    /// Best-effort safe name, present even when `valid` is false.
    pub sanitized: String,
}

/// Makes a download filename safe for every common filesystem and forces `.svg`.
pub fn validate_filename(name: &str) -> FilenameCheck {
    if name.is_empty() {
        return FilenameCheck {
            valid: false,
            error: Some(ValidationError::FilenameRequired),
            sanitized: "sticker.svg".to_string(),
        };
    }

    let replaced = UNSAFE_FILENAME_CHARS.replace_all(name, "_");
    let mut sanitized = WHITESPACE_RUN.replace_all(&replaced, "_").to_lowercase();
    if !sanitized.ends_with(".svg") {
        sanitized.push_str(".svg");
    }

    if sanitized.chars().count() > MAX_FILENAME_LENGTH {
        let stem: String = sanitized.chars().take(MAX_FILENAME_LENGTH - 4).collect();
        return FilenameCheck {
            valid: false,
            error: Some(ValidationError::FilenameTooLong),
            sanitized: format!("{stem}.svg"),
        };
    }

    FilenameCheck {
        valid: true,
        error: None,
        sanitized,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SvgContentCheck {
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Structural sanity checks. Only a missing `<svg` tag (or empty input) is fatal.
pub fn validate_svg_content(svg: &str) -> SvgContentCheck {
    if svg.trim().is_empty() {
        return SvgContentCheck {
            valid: false,
            issues: vec!["SVG content is empty".to_string()],
        };
    }

    let mut issues = Vec::new();
    let mut valid = true;

    if !svg.contains("<svg") {
        issues.push("Missing SVG root element".to_string());
        valid = false;
    }
    if !svg.contains("xmlns") {
        issues.push("Missing SVG namespace - may not display properly".to_string());
    }
    if !svg.contains("viewBox") && !svg.contains("width=") {
        issues.push("Missing dimensions - SVG may not scale properly".to_string());
    }
    if svg.len() > MAX_SVG_BYTES {
        issues.push("SVG file is very large - consider optimizing".to_string());
    }

    SvgContentCheck { valid, issues }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintDimensionCheck {
    pub valid: bool,
    pub warnings: Vec<String>,
}

/// Flags print sizes that are unlikely to scan well. Never fails outright.
pub fn validate_print_dimensions(width_px: f64, height_px: f64) -> PrintDimensionCheck {
    let width_mm = config::px_to_mm(width_px);
    let height_mm = config::px_to_mm(height_px);
    let mut warnings = Vec::new();

    if width_mm < 10.0 || height_mm < 10.0 {
        warnings.push("Sticker size may be too small for reliable scanning".to_string());
    }
    if width_mm > 200.0 || height_mm > 200.0 {
        warnings.push("Sticker size is unusually large for typical use".to_string());
    }
    if (width_mm - height_mm).abs() > 2.0 {
        warnings.push("Sticker is not square - this may affect scanning".to_string());
    }

    PrintDimensionCheck {
        valid: true,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOKEN: &str = "ABCDEFGHIJ0123456789";

    #[test]
    fn test_static_patterns_compile() {
        assert!(TOKEN_PATTERN.is_match(TOKEN));
        assert!(PARAM_PATTERN.is_match("peak_1-a"));
        assert!(UNSAFE_FILENAME_CHARS.is_match("a\\b"));
        assert!(WHITESPACE_RUN.is_match(" \t"));
    }

    #[test]
    fn test_token_checks_run_in_order() {
        assert_eq!(validate_token(""), Err(ValidationError::TokenRequired));
        assert_eq!(validate_token("short"), Err(ValidationError::TokenInvalidLength));
        assert_eq!(validate_token("abcdefghij0123456789"), Err(ValidationError::TokenInvalidChars));
        // Wrong length wins over bad characters
        assert_eq!(validate_token("abc"), Err(ValidationError::TokenInvalidLength));
        assert_eq!(validate_token(TOKEN), Ok(()));
        assert_eq!(ValidationError::TokenInvalidLength.code(), "TOKEN_INVALID_LENGTH");
    }

    #[test]
    fn test_caption_rules() {
        assert!(validate_caption("").is_ok());
        assert!(validate_caption("Scan to check in!").is_ok());
        assert_eq!(validate_caption(&"a".repeat(50)), Ok(()));
        assert_eq!(validate_caption(&"a".repeat(51)), Err(ValidationError::CaptionTooLong));
        assert_eq!(
            ValidationError::CaptionTooLong.to_string(),
            "Caption cannot exceed 50 characters"
        );
        for bad in ["a<b", "a>b", "{x}", "back\\slash"] {
            assert_eq!(validate_caption(bad), Err(ValidationError::CaptionUnprintable));
        }
    }

    #[test]
    fn test_parameter_names() {
        assert_eq!(validate_parameter_name(""), Err(ValidationError::ParamRequired));
        assert_eq!(validate_parameter_name("1token"), Err(ValidationError::ParamInvalid));
        assert_eq!(validate_parameter_name("to ken"), Err(ValidationError::ParamInvalid));
        assert!(validate_parameter_name("t").is_ok());
        assert!(validate_parameter_name("peak_id-2").is_ok());
    }

    #[test]
    fn test_url_shape() {
        assert!(validate_url(&build_url(TOKEN, "token")).is_ok());
        assert_eq!(validate_url("not a url"), Err(ValidationError::UrlMalformed));
        assert_eq!(validate_url("http://peakbook.app/scan?token=X"), Err(ValidationError::UrlNotHttps));
        assert_eq!(validate_url("https://example.com/scan?token=X"), Err(ValidationError::UrlWrongDomain));
        assert_eq!(validate_url("https://peakbook.app/scan/x?token=X"), Err(ValidationError::UrlWrongPath));
    }

    #[test]
    fn test_ecc_level() {
        assert_eq!(validate_ecc_level("H"), Ok(QrCodeEcc::High));
        assert_eq!(validate_ecc_level("X"), Err(ValidationError::EccInvalid));
        assert_eq!(validate_ecc_level(""), Err(ValidationError::EccInvalid));
    }

    #[test]
    fn test_validate_all_collects_every_field() {
        let form = QrFormData::new("short")
            .with_caption("a".repeat(51))
            .with_param_name("9x")
            .with_ecc_level("Z");
        let result = validate_all(&form);
        assert!(!result.valid);
        assert!(result.errors.token.is_some());
        assert!(result.errors.caption.is_some());
        assert!(result.errors.param_name.is_some());
        assert!(result.errors.ecc_level.is_some());
        // URL is only checked once everything else passes
        assert!(result.errors.url.is_none());
        assert_eq!(result.errors.first(), Some("Token must be exactly 20 characters long"));
    }

    #[test]
    fn test_validate_all_defaults() {
        let result = validate_all(&QrFormData::new(TOKEN).with_param_name(""));
        assert!(result.valid);
        assert!(result.errors.is_empty());
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"valid":true,"errors":{}}"#);
    }

    #[test]
    fn test_form_deserializes_from_camel_case() {
        let form: QrFormData =
            serde_json::from_str(r#"{"token":"ABCDEFGHIJ0123456789","paramName":"t","eccLevel":"H"}"#).unwrap();
        assert_eq!(form.param_name(), "t");
        assert_eq!(form.ecc_level(), Some("H"));
        assert_eq!(form.caption(), "");
    }

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input("  abc-123 def ", InputKind::Token), "ABC123DEF");
        assert_eq!(sanitize_input("Hi <there> {x}", InputKind::Caption), "Hi there x");
        assert_eq!(sanitize_input("Peak ID", InputKind::Param), "peakid");
        assert_eq!(sanitize_input("9lives", InputKind::Param), "t9lives");
        assert_eq!(sanitize_input("_x", InputKind::Param), "t_x");
        assert_eq!(sanitize_input("   ", InputKind::Text), "");
    }

    #[test]
    fn test_token_help_text() {
        assert_eq!(token_help_text(""), "Enter a 20-character token");
        assert_eq!(token_help_text("ABCDEFGHIJ012345678"), "1 more character needed");
        assert_eq!(token_help_text("ABC"), "17 more characters needed");
        assert_eq!(token_help_text(TOKEN), "✓ Token is valid");
        assert_eq!(token_help_text("abcdefghij0123456789"), ValidationError::TokenInvalidChars.to_string());
        assert_eq!(token_help_text(&"A".repeat(21)), "Token is too long");
        assert_eq!(format_token_input("abcdefghij0123456789xyz"), TOKEN);
    }

    #[test]
    fn test_scannability_warnings() {
        let ok = check_scannability(&build_url(TOKEN, "token"), QrCodeEcc::High);
        assert!(ok.scannable);
        assert!(ok.warning.is_none());

        let near = check_scannability(&"x".repeat(1100), QrCodeEcc::High);
        assert!(near.scannable);
        assert_eq!(near.warning.as_deref(), Some("URL is using 86% of QR code capacity"));

        let over = check_scannability(&"x".repeat(1300), QrCodeEcc::High);
        assert!(!over.scannable);
        assert!(over.warning.is_some());
    }

    #[test]
    fn test_filenames() {
        let empty = validate_filename("");
        assert!(!empty.valid);
        assert_eq!(empty.sanitized, "sticker.svg");

        let check = validate_filename("My Sticker: v1?.SVG");
        assert!(check.valid);
        assert_eq!(check.sanitized, "my_sticker__v1_.svg");

        let check = validate_filename("peakbook-qr-ABC");
        assert_eq!(check.sanitized, "peakbook-qr-abc.svg");

        let long = validate_filename(&"a".repeat(300));
        assert!(!long.valid);
        assert_eq!(long.error, Some(ValidationError::FilenameTooLong));
        assert_eq!(long.sanitized.chars().count(), 200);
        assert!(long.sanitized.ends_with(".svg"));
    }

    #[test]
    fn test_svg_content_checks() {
        assert!(!validate_svg_content("  ").valid);

        let missing = validate_svg_content("<html></html>");
        assert!(!missing.valid);
        assert!(missing.issues.contains(&"Missing SVG root element".to_string()));

        let bare = validate_svg_content("<svg></svg>");
        assert!(bare.valid);
        assert_eq!(bare.issues.len(), 2);

        let good = validate_svg_content(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"/>"#);
        assert!(good.valid);
        assert!(good.issues.is_empty());
    }

    #[test]
    fn test_print_dimensions() {
        let standard = validate_print_dimensions(211.0, 211.0);
        assert!(standard.valid);
        assert!(standard.warnings.is_empty());

        let tiny = validate_print_dimensions(20.0, 40.0);
        assert!(tiny.valid);
        assert_eq!(tiny.warnings.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_wrong_length_tokens_fail_on_length(token in "[A-Za-z0-9]{0,40}") {
            prop_assume!(token.chars().count() != TOKEN_LENGTH);
            let expected = if token.is_empty() {
                ValidationError::TokenRequired
            } else {
                ValidationError::TokenInvalidLength
            };
            prop_assert_eq!(validate_token(&token), Err(expected));
        }

        #[test]
        fn prop_charset_tokens_are_valid(token in "[A-Z0-9]{20}") {
            prop_assert_eq!(validate_token(&token), Ok(()));
        }

        #[test]
        fn prop_token_sanitizing_is_idempotent(input in "\\PC{0,40}") {
            let once = sanitize_input(&input, InputKind::Token);
            prop_assert_eq!(sanitize_input(&once, InputKind::Token), once.clone());
        }

        #[test]
        fn prop_valid_tokens_build_valid_urls(token in "[A-Z0-9]{20}") {
            prop_assert_eq!(validate_url(&build_url(&token, DEFAULT_PARAM_NAME)), Ok(()));
        }

        #[test]
        fn prop_high_capacity_below_low(data in "\\PC{0,64}") {
            prop_assert!(
                check_qr_capacity(&data, QrCodeEcc::High).limit
                    < check_qr_capacity(&data, QrCodeEcc::Low).limit
            );
        }
    }
}
