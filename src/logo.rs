//! Logo assets for the sticker badge.
//!
//! Loading never fails the pipeline: an unreadable or malformed asset degrades to
//! [`LogoRef::Fallback`], which the composer draws as a filled circle with the brand initial.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::LogoSettings;
use crate::error::{Error, Result};
use crate::svg::{Element, SvgDocument};

/// The logo drawn inside the badge.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LogoRef {
    /// Vector logo embedded into the document.
    Inline(Element),
    /// External image referenced by URL or path.
    Href(String),
    /// No usable asset.
    #[default]
    Fallback,
}

impl LogoRef {
    /// The configured default asset, referenced rather than embedded.
    pub fn from_settings(settings: &LogoSettings) -> Self {
        LogoRef::Href(settings.default_path.clone())
    }

    pub fn href(target: impl Into<String>) -> Self {
        LogoRef::Href(target.into())
    }

    /// Parses an SVG logo for inline embedding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSvg`] when `text` is not an `<svg>` document.
    pub fn from_svg_str(text: &str) -> Result<Self> {
        Ok(LogoRef::Inline(SvgDocument::parse(text)?.root))
    }

    /// Loads a logo file. SVG files are embedded, anything else is referenced by path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file is missing or unreadable and [`Error::InvalidSvg`]
    /// for a malformed SVG.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_svg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

        if is_svg {
            let text = fs::read_to_string(path)?;
            return Self::from_svg_str(&text);
        }

        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("logo not found: {}", path.display()),
            )));
        }
        Ok(LogoRef::Href(path.display().to_string()))
    }

    /// Like [`LogoRef::try_load`], but degrades to [`LogoRef::Fallback`] on any error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(logo) => {
                debug!(path = %path.display(), "logo loaded");
                logo
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "logo unavailable, using fallback badge");
                LogoRef::Fallback
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LogoRef::Fallback)
    }
}
