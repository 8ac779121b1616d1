//! Configuration types for the convert/merge client.
//!
//! Everything that is fixed for the lifetime of a [`crate::session::Session`]
//! lives in [`ClientConfig`], built via its [`ClientConfigBuilder`]. The
//! per-workflow knobs the user edits while working (output format, quality)
//! live in [`ImageOptions`] and are owned by the image workflow itself.

use crate::error::ConvmergeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default service address used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for a client session.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use convmerge::{ClientConfig, OutputFormat};
///
/// let config = ClientConfig::builder()
///     .base_url("http://127.0.0.1:8000")
///     .output_dir("downloads")
///     .default_format(OutputFormat::Webp)
///     .build()
///     .unwrap();
/// ```
///
/// Deserializing goes through the builder, so a config read from a file is
/// validated the same way as one built in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ClientConfigFile")]
pub struct ClientConfig {
    /// Base address of the conversion service. Default: `http://localhost:8000`.
    ///
    /// Endpoint paths (`/convert-image`, `/merge-pdfs`) are appended to it.
    pub base_url: String,

    /// Directory downloaded artifacts are saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// How long the transient reference to a downloaded payload outlives the
    /// save action, in milliseconds. Range: 1–60 000. Default: 2000.
    pub release_grace_ms: u64,

    /// Output format the image workflow starts with. Default: [`OutputFormat::Jpg`].
    pub default_format: OutputFormat,

    /// Quality the image workflow starts with. Default: 90.
    pub default_quality: Quality,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("."),
            release_grace_ms: 2000,
            default_format: OutputFormat::default(),
            default_quality: Quality::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Join an endpoint path onto the configured base address.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Starting options for a fresh image workflow.
    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            format: self.default_format,
            quality: self.default_quality,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn release_grace_ms(mut self, ms: u64) -> Self {
        self.config.release_grace_ms = ms;
        self
    }

    pub fn default_format(mut self, format: OutputFormat) -> Self {
        self.config.default_format = format;
        self
    }

    pub fn default_quality(mut self, quality: u8) -> Self {
        self.config.default_quality = Quality::new(quality);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConvmergeError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            ConvmergeError::InvalidConfig(format!("base URL '{}' is not valid: {}", c.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConvmergeError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.release_grace_ms == 0 || c.release_grace_ms > 60_000 {
            return Err(ConvmergeError::InvalidConfig(format!(
                "release grace must be 1–60000 ms, got {}",
                c.release_grace_ms
            )));
        }
        Ok(self.config)
    }
}

/// Serialized shape of [`ClientConfig`]; every field is optional.
#[derive(Deserialize)]
#[serde(default)]
struct ClientConfigFile {
    base_url: String,
    output_dir: PathBuf,
    release_grace_ms: u64,
    default_format: OutputFormat,
    default_quality: u8,
}

impl Default for ClientConfigFile {
    fn default() -> Self {
        let config = ClientConfig::default();
        Self {
            base_url: config.base_url,
            output_dir: config.output_dir,
            release_grace_ms: config.release_grace_ms,
            default_format: config.default_format,
            default_quality: config.default_quality.get(),
        }
    }
}

impl TryFrom<ClientConfigFile> for ClientConfig {
    type Error = ConvmergeError;

    fn try_from(file: ClientConfigFile) -> Result<Self, Self::Error> {
        ClientConfig::builder()
            .base_url(file.base_url)
            .output_dir(file.output_dir)
            .release_grace_ms(file.release_grace_ms)
            .default_format(file.default_format)
            .default_quality(file.default_quality)
            .build()
    }
}

// ── Image options ────────────────────────────────────────────────────────

/// Output format requested from `/convert-image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG, lossy. (default)
    #[default]
    Jpg,
    /// Alternate spelling of [`OutputFormat::Jpg`]; saved with a `.jpg` extension.
    Jpeg,
    Png,
    /// WebP, lossy.
    Webp,
    Bmp,
    Tiff,
}

impl OutputFormat {
    /// Every format the service accepts, in menu order.
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Jpg,
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
    ];

    /// Value sent in the `out` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// File extension used for the downloaded artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            other => other.as_str(),
        }
    }

    /// Whether the encoder honours a quality setting.
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            OutputFormat::Jpg | OutputFormat::Jpeg | OutputFormat::Webp
        )
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| {
                ConvmergeError::InvalidConfig(format!("unsupported output format: {s}"))
            })
    }
}

/// Encoder quality, always within 1–100.
///
/// Deserialized values are clamped like [`Quality::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    /// Clamp `value` into the valid range.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl From<u8> for Quality {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options for the image-conversion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageOptions {
    pub format: OutputFormat,
    /// Stored even when inert so switching back to a lossy format restores it.
    pub quality: Quality,
}

impl ImageOptions {
    pub fn new(format: OutputFormat, quality: u8) -> Self {
        Self {
            format,
            quality: Quality::new(quality),
        }
    }

    /// The quality the encoder will actually apply, or `None` when the
    /// selected format ignores it.
    pub fn effective_quality(&self) -> Option<Quality> {
        self.format.is_lossy().then_some(self.quality)
    }

    /// Filename for the converted artifact of `base_name`.
    pub fn artifact_name(&self, base_name: &str) -> String {
        format!("{}.{}", base_name, self.format.extension())
    }
}
