use serde::{Deserialize, Serialize};

/// Renderer call policy.
///
/// Every renderer call is bounded by `timeout_secs`. A call failing with a
/// retryable error is attempted up to `retry_count` times in total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Page geometry used by the built-in text template renderer and for
/// placeholder pages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Page width in points
    #[serde(default = "default_page_width")]
    pub width: f32,
    /// Page height in points
    #[serde(default = "default_page_height")]
    pub height: f32,
    /// Margin on every side in points
    #[serde(default = "default_margin")]
    pub margin: f32,
    /// Body font size in points
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Maximum number of text lines on one page
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,
}

const fn default_page_width() -> f32 {
    612.0
}

const fn default_page_height() -> f32 {
    792.0
}

const fn default_margin() -> f32 {
    72.0
}

const fn default_font_size() -> f32 {
    11.0
}

const fn default_lines_per_page() -> usize {
    48
}

impl PageLayout {
    /// Distance between two baselines.
    pub fn line_height(&self) -> f32 {
        self.font_size * 1.25
    }

    /// Check that the layout can hold at least one line of text.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.lines_per_page == 0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "layout.lines_per_page".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.width <= 2.0 * self.margin || self.height <= 2.0 * self.margin {
            return Err(crate::error::Error::ConfigInvalid {
                field: "layout.margin".to_string(),
                reason: "margins leave no room for content".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: default_page_width(),
            height: default_page_height(),
            margin: default_margin(),
            font_size: default_font_size(),
            lines_per_page: default_lines_per_page(),
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Renderer timeout and retry policy
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Page geometry for rendered and placeholder pages
    #[serde(default)]
    pub layout: PageLayout,

    /// Pages containing any of these markers never produce rule bookmarks
    #[serde(default = "default_skip_page_markers")]
    pub skip_page_markers: Vec<String>,

    /// Indentation prepended once per depth level in table of contents rows
    #[serde(default = "default_toc_indent")]
    pub toc_indent: String,

    /// Write the editable mirror of the table of contents next to the output
    #[serde(default = "default_true")]
    pub write_toc_document: bool,
}

fn default_skip_page_markers() -> Vec<String> {
    vec!["This page intentionally left blank".to_string()]
}

fn default_toc_indent() -> String {
    "   ".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            renderer: RendererConfig::default(),
            layout: PageLayout::default(),
            skip_page_markers: default_skip_page_markers(),
            toc_indent: default_toc_indent(),
            write_toc_document: default_true(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}"))
        })?;
        config.layout.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/report-builder/config.toml, ./report-builder.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("report-builder").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = std::path::PathBuf::from("report-builder.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./report-builder.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./report-builder.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BuildConfig = toml::from_str(
            r#"
            toc_indent = "  "

            [renderer]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.renderer.timeout_secs, 5);
        assert_eq!(config.renderer.retry_count, 3);
        assert_eq!(config.toc_indent, "  ");
        assert_eq!(config.layout, PageLayout::default());
        assert!(config.write_toc_document);
    }

    #[test]
    fn test_layout_validation() {
        let layout = PageLayout {
            lines_per_page: 0,
            ..PageLayout::default()
        };
        assert!(layout.validate().is_err());
        assert!(PageLayout::default().validate().is_ok());
    }
}
