//! Session configuration.
//!
//! [`SessionConfig`] is the declarative input a host supplies when it renders a
//! terminal. The values are frozen once a session is created: changing them means
//! tearing the session down and building a new one (see
//! [`TerminalAdapter::update_config`](crate::adapter::TerminalAdapter::update_config)).
//!
//! # Default Values
//!
//! | Field | Default |
//! |-------|---------|
//! | `columns` | 80 |
//! | `rows` | 25 (`None` or `0` enables auto-fit) |
//! | `font_family` | engine default |
//! | `font_size` | engine default |
//! | `letter_spacing` | 0 |
//! | `scrollback` | 1000 |
//!
//! # Loading from TOML
//!
//! ```
//! use gpui_terminal_host::SessionConfig;
//!
//! let config = SessionConfig::from_toml_str(
//!     r#"
//!     columns = 120
//!     rows = 0
//!     font_family = "JetBrains Mono"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.columns, 120);
//! assert!(config.auto_fit());
//! ```

use anyhow::Context as _;
use serde::Deserialize;

/// Column count used when the host does not set one.
pub const DEFAULT_COLUMNS: usize = 80;

/// Row count used when the host does not set one.
pub const DEFAULT_ROWS: usize = 25;

/// Scrollback history kept by the engine when the host does not set one.
pub const DEFAULT_SCROLLBACK: usize = 1000;

/// Host-supplied configuration for one terminal session.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial number of columns.
    pub columns: usize,

    /// Initial number of rows. `None` or `Some(0)` hands sizing over to the
    /// geometry coordinator, which fits the terminal to the viewport.
    pub rows: Option<usize>,

    /// Font family name, passed through to the engine verbatim.
    pub font_family: Option<String>,

    /// Font size in pixels, passed through to the engine verbatim.
    pub font_size: Option<f32>,

    /// Extra horizontal space between cells, in pixels.
    pub letter_spacing: f32,

    /// Lines of scrollback history kept by the engine.
    pub scrollback: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: Some(DEFAULT_ROWS),
            font_family: None,
            font_size: None,
            letter_spacing: 0.0,
            scrollback: DEFAULT_SCROLLBACK,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("invalid terminal session configuration")
    }

    /// Whether the row count is left to the viewport.
    pub fn auto_fit(&self) -> bool {
        matches!(self.rows, None | Some(0))
    }

    /// Options the engine is constructed with.
    ///
    /// In auto-fit mode the engine starts at [`DEFAULT_ROWS`] and is resized by the
    /// first fit before anything is painted.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            columns: self.columns.max(1),
            rows: self.rows.filter(|rows| *rows > 0).unwrap_or(DEFAULT_ROWS),
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            letter_spacing: self.letter_spacing,
            scrollback: self.scrollback,
            cursor_blink: true,
            screen_reader_mode: true,
        }
    }
}

/// Construction options handed to an engine factory.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOptions {
    pub columns: usize,
    pub rows: usize,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    /// Extra pixels between cells. Honored by the cell-metrics fit and by
    /// renderers through `AlacrittyEngine::cell_advance`.
    pub letter_spacing: f32,
    pub scrollback: usize,
    /// Always `true`.
    pub cursor_blink: bool,
    /// Always `true`. Informational: alacritty has no screen-reader mode, so the
    /// bundled engine stores the flag and hosts decide what to do with it.
    pub screen_reader_mode: bool,
}
