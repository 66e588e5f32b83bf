//! Alacritty-backed engine.
//!
//! [`AlacrittyEngine`] implements [`Engine`] on top of alacritty's [`Term`]. Data
//! written into it is fed through the VTE parser, which updates the grid:
//!
//! ```text
//! write(data) → VTE Parser → Term handlers → Grid updates
//!                             ├─ print()         (regular characters)
//!                             ├─ esc_dispatch()  (escape sequences)
//!                             ├─ csi_dispatch()  (colors, cursor, DSR replies)
//!                             └─ osc_dispatch()  (title changes)
//! ```
//!
//! Replies the terminal generates (`Event::PtyWrite`) and keys typed into the
//! surface come back out as [`TerminalEvent::Input`], titles as
//! [`TerminalEvent::Title`].
//!
//! # Example
//!
//! ```
//! use gpui_terminal_host::SessionConfig;
//! use gpui_terminal_host::engine::Engine;
//! use gpui_terminal_host::host::Surface;
//! use gpui_terminal_host::terminal::AlacrittyEngine;
//!
//! let (tx, _rx) = flume::unbounded();
//! let options = SessionConfig::default().engine_options();
//! let mut engine = AlacrittyEngine::new(&options, tx).unwrap();
//! engine.open(Surface::new().id());
//! engine.write("\x1b[31mRed text\x1b[0m");
//! assert_eq!(engine.visible_lines()[0], "Red text");
//! ```

use crate::config::EngineOptions;
use crate::engine::{Engine, EngineFactory};
use crate::event::{EngineEventProxy, EventSender, TerminalEvent};
use crate::geometry::ResizeGeometry;
use crate::host::SurfaceId;
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::{Config, Term, TermMode};
use alacritty_terminal::vte::ansi::{CursorShape, CursorStyle, Processor};
use parking_lot::Mutex;
use std::sync::Arc;

/// Simple dimensions implementation for terminal initialization and resizing.
struct TermDimensions {
    columns: usize,
    screen_lines: usize,
}

impl TermDimensions {
    fn new(geometry: ResizeGeometry) -> Self {
        Self {
            columns: geometry.columns,
            screen_lines: geometry.rows,
        }
    }
}

impl Dimensions for TermDimensions {
    fn total_lines(&self) -> usize {
        // Scrollback is managed by the Term itself.
        self.screen_lines
    }

    fn screen_lines(&self) -> usize {
        self.screen_lines
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn last_column(&self) -> Column {
        Column(self.columns.saturating_sub(1))
    }
}

/// Builds an [`AlacrittyEngine`] per session.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlacrittyFactory;

impl EngineFactory for AlacrittyFactory {
    type Engine = AlacrittyEngine;

    fn create(
        &self,
        options: &EngineOptions,
        events: EventSender,
    ) -> anyhow::Result<AlacrittyEngine> {
        AlacrittyEngine::new(options, events)
    }
}

/// Terminal engine backed by alacritty's grid and VTE parser.
///
/// The `Term` sits behind `Arc<parking_lot::Mutex<>>` so a renderer can read the
/// grid while the session owns the engine.
pub struct AlacrittyEngine {
    term: Arc<Mutex<Term<EngineEventProxy>>>,
    parser: Processor,
    events: EventSender,
    options: EngineOptions,
    geometry: ResizeGeometry,
    surface: Option<SurfaceId>,
    focused: bool,
    disposed: bool,
    last_refresh: Option<(usize, usize)>,
}

impl AlacrittyEngine {
    pub fn new(options: &EngineOptions, events: EventSender) -> anyhow::Result<Self> {
        anyhow::ensure!(
            options.columns > 0 && options.rows > 0,
            "terminal dimensions must be non-zero, got {}x{}",
            options.columns,
            options.rows
        );

        let config = Config {
            scrolling_history: options.scrollback,
            default_cursor_style: CursorStyle {
                shape: CursorShape::Block,
                blinking: options.cursor_blink,
            },
            ..Config::default()
        };
        let geometry = ResizeGeometry {
            rows: options.rows,
            columns: options.columns,
        };
        let term = Term::new(
            config,
            &TermDimensions::new(geometry),
            EngineEventProxy::new(events.clone()),
        );

        Ok(Self {
            term: Arc::new(Mutex::new(term)),
            parser: Processor::new(),
            events,
            options: options.clone(),
            geometry,
            surface: None,
            focused: false,
            disposed: false,
            last_refresh: None,
        })
    }

    /// The options this engine was constructed with.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Horizontal distance between the starts of two neighbouring cells when a
    /// glyph is `glyph_width` wide. The grid carries no spacing; renderers lay
    /// cells out with this advance so the drawn width matches the fit.
    pub fn cell_advance(&self, glyph_width: f32) -> f32 {
        glyph_width + self.options.letter_spacing
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The most recent row range passed to [`Engine::refresh`].
    pub fn last_refresh(&self) -> Option<(usize, usize)> {
        self.last_refresh
    }

    /// Current terminal mode; key encoding depends on `APP_CURSOR`.
    pub fn mode(&self) -> TermMode {
        *self.term.lock().mode()
    }

    /// Text of each visible row, trailing blanks trimmed.
    pub fn visible_lines(&self) -> Vec<String> {
        self.with_term(|term| {
            let grid = term.grid();
            (0..term.screen_lines())
                .map(|line| {
                    let row = &grid[Line(line as i32)];
                    let text: String =
                        (0..term.columns()).map(|column| row[Column(column)].c).collect();
                    text.trim_end().to_owned()
                })
                .collect()
        })
    }

    /// Execute a function with read access to the terminal.
    pub fn with_term<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Term<EngineEventProxy>) -> R,
    {
        let term = self.term.lock();
        f(&term)
    }

    /// Shared handle to the underlying terminal, for renderers.
    pub fn term_arc(&self) -> Arc<Mutex<Term<EngineEventProxy>>> {
        Arc::clone(&self.term)
    }

    fn live(&self, operation: &'static str) -> bool {
        if self.disposed {
            tracing::trace!(operation, "engine disposed, ignoring");
        }
        !self.disposed
    }
}

impl Engine for AlacrittyEngine {
    fn open(&mut self, surface: SurfaceId) {
        if self.live("open") {
            self.surface = Some(surface);
        }
    }

    fn write(&mut self, data: &str) {
        if !self.live("write") {
            return;
        }
        let mut term = self.term.lock();
        self.parser.advance(&mut *term, data.as_bytes());
    }

    fn resize(&mut self, geometry: ResizeGeometry) {
        if !self.live("resize") || geometry.rows == 0 || geometry.columns == 0 {
            return;
        }
        self.geometry = geometry;
        self.term.lock().resize(TermDimensions::new(geometry));
    }

    fn focus(&mut self) {
        if self.live("focus") {
            self.focused = true;
            self.term.lock().is_focused = true;
        }
    }

    fn key_input(&mut self, text: &str) {
        if self.live("key input") && !text.is_empty() {
            let _ = self.events.send(TerminalEvent::Input(text.to_owned()));
        }
    }

    fn refresh(&mut self, start: usize, end: usize) {
        if self.live("refresh") {
            let last_row = self.geometry.rows.saturating_sub(1);
            self.last_refresh = Some((start.min(last_row), end.min(last_row)));
        }
    }

    fn geometry(&self) -> ResizeGeometry {
        self.geometry
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.surface = None;
        self.focused = false;
        self.term.lock().is_focused = false;
    }
}
