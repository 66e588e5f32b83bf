//! Terminal session management.
//!
//! A [`TerminalSession`] wraps exactly one live engine and is the only place the
//! engine's destructive operations are called from. It exists from mount to
//! unmount of the adapter; dropping it disposes the engine.
//!
//! Engine events are queued in a channel and delivered by [`dispatch_events`].
//! Delivery happens with the session unborrowed, so a callback may call straight
//! back into the session through a [`ControlHandle`](crate::handle::ControlHandle)
//! (an echoing transport does exactly that).

use crate::config::SessionConfig;
use crate::engine::{Engine, EngineFactory};
use crate::event::{EventReceiver, TerminalEvent};
use crate::geometry::ResizeGeometry;
use crate::host::SurfaceId;
use anyhow::Context as _;
use std::cell::RefCell;
use std::rc::Rc;

/// Receives every unit of input the user types into the terminal.
pub type DataCallback = Rc<dyn Fn(&str)>;

/// Receives title changes reported by the terminal.
pub type TitleCallback = Rc<dyn Fn(&str)>;

/// One live engine and its wiring.
pub struct TerminalSession<E: Engine> {
    engine: E,
    events: EventReceiver,
    config: SessionConfig,
    surface: Option<SurfaceId>,
    on_data: Option<DataCallback>,
    on_title_changed: Option<TitleCallback>,
    disposed: bool,
}

impl<E: Engine> TerminalSession<E> {
    /// Construct the engine for `config`. Factory errors are returned as-is, with
    /// context.
    pub fn create<F>(config: SessionConfig, factory: &F) -> anyhow::Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        let options = config.engine_options();
        let (events_tx, events_rx) = flume::unbounded();
        let engine = factory
            .create(&options, events_tx)
            .context("failed to construct terminal engine")?;

        tracing::debug!(
            columns = options.columns,
            rows = options.rows,
            auto_fit = config.auto_fit(),
            "created terminal session"
        );

        Ok(Self {
            engine,
            events: events_rx,
            config,
            surface: None,
            on_data: None,
            on_title_changed: None,
            disposed: false,
        })
    }

    /// Attach the engine to `surface`. A session is mounted exactly once.
    pub fn mount(&mut self, surface: SurfaceId) -> anyhow::Result<()> {
        anyhow::ensure!(!self.disposed, "cannot mount a disposed terminal session");
        if let Some(existing) = self.surface {
            anyhow::bail!(
                "terminal session is already mounted on surface {}",
                existing.get()
            );
        }

        self.engine.open(surface);
        self.surface = Some(surface);
        tracing::debug!(surface = surface.get(), "mounted terminal session");
        Ok(())
    }

    /// Forward typed input to `on_data`. A later call replaces the earlier wiring.
    pub fn wire_incoming_keystrokes(&mut self, on_data: Option<DataCallback>) {
        if self.on_data.is_some() {
            tracing::debug!("replacing keystroke wiring");
        }
        self.on_data = on_data;
    }

    /// Forward title changes to `on_title_changed`.
    pub fn wire_title_change(&mut self, on_title_changed: Option<TitleCallback>) {
        self.on_title_changed = on_title_changed;
    }

    pub fn focus(&mut self) {
        if self.live("focus") {
            self.engine.focus();
        }
    }

    pub fn write(&mut self, data: &str) {
        if self.live("write") {
            self.engine.write(data);
        }
    }

    pub fn resize(&mut self, geometry: ResizeGeometry) {
        if self.live("resize") {
            self.engine.resize(geometry);
        }
    }

    /// Redraw every visible row.
    pub fn refresh_all(&mut self) {
        if self.live("refresh") {
            let rows = self.engine.geometry().rows;
            self.engine.refresh(0, rows.saturating_sub(1));
        }
    }

    pub fn key_input(&mut self, text: &str) {
        if self.live("key input") {
            self.engine.key_input(text);
        }
    }

    pub fn geometry(&self) -> ResizeGeometry {
        self.engine.geometry()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release the engine. Only the first call has an effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.engine.dispose();
        self.on_data = None;
        self.on_title_changed = None;
        while self.events.try_recv().is_ok() {}
        tracing::debug!("disposed terminal session");
    }

    fn live(&self, operation: &'static str) -> bool {
        let live = self.surface.is_some() && !self.disposed;
        if !live {
            tracing::trace!(operation, "terminal session not live, ignoring");
        }
        live
    }

    fn next_event(&self) -> Option<(TerminalEvent, Option<DataCallback>)> {
        if self.disposed {
            return None;
        }
        let event = self.events.try_recv().ok()?;
        let callback = match event {
            TerminalEvent::Input(_) => self.on_data.clone(),
            TerminalEvent::Title(_) => self.on_title_changed.clone(),
        };
        Some((event, callback))
    }
}

impl<E: Engine> Drop for TerminalSession<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Deliver queued engine events, in order, to the wired callbacks.
///
/// Events without a wired callback are dropped.
pub fn dispatch_events<E: Engine>(session: &RefCell<TerminalSession<E>>) {
    loop {
        let next = match session.try_borrow() {
            Ok(session) => session.next_event(),
            Err(_) => {
                tracing::trace!("terminal session busy, deferring event dispatch");
                return;
            }
        };
        let Some((event, callback)) = next else {
            return;
        };

        if let Some(callback) = callback {
            match &event {
                TerminalEvent::Input(text) | TerminalEvent::Title(text) => callback(text.as_str()),
            }
        }
    }
}
