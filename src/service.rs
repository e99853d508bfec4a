//! Entry points used by the surrounding application.
//!
//! [`StickerService::generate_qr_code`] runs the whole pipeline for one form submission:
//! validation, QR generation, composition and packaging metadata. Input problems come back as
//! per-field messages; nothing past validation is attempted when any field fails.

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{StickerConfig, TOKEN_ALPHABET, TOKEN_LENGTH};
use crate::export::get_filename;
use crate::generator::QrGenerator;
use crate::logo::LogoRef;
use crate::sticker::{StickerComposer, StickerOptions};
use crate::validator::{self, token_help_text, validate_all, QrFormData, ValidationErrors};

/// A finished sticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedSticker {
    pub svg: String,
    pub token: String,
    pub url: String,
    pub filename: String,
}

/// Why a generation request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct GenerateFailure {
    /// Message suitable for display.
    pub error: String,
    /// Per-field messages when validation failed.
    pub errors: Option<ValidationErrors>,
}

/// Wire shape of a generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<GeneratedSticker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl From<Result<GeneratedSticker, GenerateFailure>> for GenerateResponse {
    fn from(result: Result<GeneratedSticker, GenerateFailure>) -> Self {
        match result {
            Ok(sticker) => Self {
                success: true,
                data: Some(sticker),
                error: None,
                errors: None,
            },
            Err(failure) => Self {
                success: false,
                data: None,
                error: Some(failure.error),
                errors: failure.errors,
            },
        }
    }
}

/// Generates stickers for one configuration and logo.
#[derive(Debug, Clone)]
pub struct StickerService<'c> {
    config: &'c StickerConfig,
    logo: LogoRef,
}

impl<'c> StickerService<'c> {
    pub fn new(config: &'c StickerConfig, logo: LogoRef) -> Self {
        Self { config, logo }
    }

    /// Validates the form and produces a sticker with default composition options.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerateFailure`] carrying per-field messages when validation fails, or a single
    /// message when generation itself fails.
    pub fn generate_qr_code(&self, form: &QrFormData) -> Result<GeneratedSticker, GenerateFailure> {
        self.generate_qr_code_with(form, &StickerOptions::default())
    }

    /// Like [`StickerService::generate_qr_code`] with explicit composition options.
    ///
    /// # Errors
    ///
    /// See [`StickerService::generate_qr_code`].
    pub fn generate_qr_code_with(
        &self,
        form: &QrFormData,
        options: &StickerOptions,
    ) -> Result<GeneratedSticker, GenerateFailure> {
        let validation = validate_all(form);
        if !validation.valid {
            let message = validation
                .errors
                .first()
                .unwrap_or("Validation failed")
                .to_string();
            info!(token = %form.token, error = %message, "sticker request rejected");
            return Err(GenerateFailure {
                error: message,
                errors: Some(validation.errors),
            });
        }

        let failure = |err: crate::error::Error| {
            error!(token = %form.token, error = %err, "sticker generation failed");
            GenerateFailure {
                error: err.to_string(),
                errors: None,
            }
        };

        let ecc_level = form
            .ecc_level()
            .and_then(|level| level.parse().ok())
            .unwrap_or(self.config.qr.error_correction);
        let generator = QrGenerator::new(self.config);
        let generation_options = generator.default_options().with_ecc_level(ecc_level);
        let qr = generator
            .generate_from_token(&form.token, form.param_name(), &generation_options)
            .map_err(failure)?;

        let document = StickerComposer::new(self.config)
            .create_sticker_svg(&qr, &self.logo, form.caption(), options)
            .map_err(failure)?;

        let url = qr.url.unwrap_or_default();
        info!(token = %form.token, url = %url, profile = ?qr.profile, "sticker generated");
        Ok(GeneratedSticker {
            svg: document.to_xml_string(),
            filename: get_filename(&form.token),
            token: form.token.clone(),
            url,
        })
    }

    /// [`StickerService::generate_qr_code`] in response form.
    pub fn generate_response(&self, form: &QrFormData) -> GenerateResponse {
        self.generate_qr_code(form).into()
    }
}

/// A fresh random token.
pub fn generate_random_token() -> String {
    generate_random_token_with(&mut rand::thread_rng())
}

/// A random token drawn from `rng`.
pub fn generate_random_token_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..TOKEN_LENGTH)
        .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
        .collect()
}

/// Live feedback for the token field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenFeedback {
    pub valid: bool,
    pub error: Option<String>,
    pub help_text: String,
}

/// Validates a token and pairs the result with its help text.
pub fn validate_token(token: &str) -> TokenFeedback {
    let result = validator::validate_token(token);
    TokenFeedback {
        valid: result.is_ok(),
        error: result.err().map(|err| err.to_string()),
        help_text: token_help_text(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TOKEN: &str = "ABCDEFGHIJ0123456789";

    fn service(config: &StickerConfig) -> StickerService<'_> {
        StickerService::new(config, LogoRef::Fallback)
    }

    #[test]
    fn test_generates_sticker_for_valid_form() {
        let config = StickerConfig::default();
        let form = QrFormData::new(TOKEN)
            .with_caption("Scan to check in!")
            .with_ecc_level("Q");
        let sticker = service(&config).generate_qr_code(&form).unwrap();

        assert_eq!(sticker.url, "https://peakbook.app/scan?token=ABCDEFGHIJ0123456789");
        assert_eq!(sticker.filename, "peakbook-qr-ABCDEFGHIJ0123456789.svg");
        assert_eq!(sticker.token, TOKEN);
        assert!(sticker.svg.starts_with("<?xml"));
        assert!(sticker.svg.trim_end().ends_with("</svg>"));

        let document = roxmltree::Document::parse(&sticker.svg).unwrap();
        let texts: Vec<String> = document
            .descendants()
            .filter(|node| node.has_tag_name("text"))
            .map(|node| {
                node.descendants()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect()
            })
            .collect();
        assert!(texts.iter().any(|text| text == "Scan to check in!"));
        assert!(texts.iter().any(|text| text == "peakbook"));
    }

    #[test]
    fn test_custom_parameter_name() {
        let config = StickerConfig::default();
        let form = QrFormData::new(TOKEN).with_param_name("peak").with_ecc_level("H");
        let sticker = service(&config).generate_qr_code(&form).unwrap();
        assert_eq!(sticker.url, "https://peakbook.app/scan?peak=ABCDEFGHIJ0123456789");
    }

    #[test]
    fn test_short_token_is_rejected() {
        let config = StickerConfig::default();
        let failure = service(&config)
            .generate_qr_code(&QrFormData::new("short"))
            .unwrap_err();
        assert_eq!(failure.error, "Token must be exactly 20 characters long");
        assert!(failure.errors.unwrap().token.is_some());
    }

    #[test]
    fn test_long_caption_is_rejected() {
        let config = StickerConfig::default();
        let form = QrFormData::new(TOKEN).with_caption("a".repeat(51));
        let failure = service(&config).generate_qr_code(&form).unwrap_err();
        assert_eq!(failure.error, "Caption cannot exceed 50 characters");
        assert_eq!(failure.errors.unwrap().caption.as_deref(), Some(failure.error.as_str()));
    }

    #[test]
    fn test_response_shapes() {
        let config = StickerConfig::default();
        let service = service(&config);

        let ok = serde_json::to_value(service.generate_response(&QrFormData::new(TOKEN))).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"]["filename"], "peakbook-qr-ABCDEFGHIJ0123456789.svg");
        assert!(ok.get("error").is_none());

        let failed =
            serde_json::to_value(service.generate_response(&QrFormData::new(TOKEN).with_ecc_level("X")))
                .unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "Error correction level must be L, M, Q, or H");
        assert_eq!(failed["errors"]["eccLevel"], "Error correction level must be L, M, Q, or H");
        assert!(failed.get("data").is_none());
    }

    #[test]
    fn test_random_tokens_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let token = generate_random_token_with(&mut rng);
            assert!(validator::validate_token(&token).is_ok(), "{token}");
        }
        assert_eq!(generate_random_token().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_token_feedback() {
        let valid = validate_token(TOKEN);
        assert!(valid.valid);
        assert_eq!(valid.error, None);
        assert_eq!(valid.help_text, "✓ Token is valid");

        let partial = validate_token("ABC");
        assert!(!partial.valid);
        assert_eq!(partial.help_text, "17 more characters needed");
        let json = serde_json::to_value(&partial).unwrap();
        assert_eq!(json["helpText"], "17 more characters needed");
        assert_eq!(json["error"], "Token must be exactly 20 characters long");
    }
}
