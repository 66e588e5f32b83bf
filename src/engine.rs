//! The engine seam.
//!
//! An engine is the embeddable terminal emulator: it parses output, keeps the
//! grid, captures keyboard input and draws into a surface. The adapter never
//! looks inside it; it drives it through [`Engine`] and listens to the events the
//! engine pushes into the channel handed to its factory.
//!
//! Construction goes through an [`EngineFactory`], so hosts (and tests) decide
//! which engine a session builds. Any `Fn(&EngineOptions, EventSender) ->
//! anyhow::Result<E>` is a factory.

use crate::config::EngineOptions;
use crate::event::EventSender;
use crate::geometry::ResizeGeometry;
use crate::host::SurfaceId;

/// Operations the adapter performs on a live engine.
///
/// Destructive operations ([`dispose`](Self::dispose)) are only ever called by the
/// session that owns the engine.
pub trait Engine: 'static {
    /// Attach the engine's output to a drawing surface.
    fn open(&mut self, surface: SurfaceId);

    /// Write data into the display buffer, escape sequences included.
    fn write(&mut self, data: &str);

    /// Change the grid size.
    fn resize(&mut self, geometry: ResizeGeometry);

    /// Take input focus.
    fn focus(&mut self);

    /// Keyboard input captured by the surface. The engine reports it back as
    /// [`TerminalEvent::Input`](crate::event::TerminalEvent::Input).
    fn key_input(&mut self, text: &str);

    /// Redraw rows `start..=end`.
    fn refresh(&mut self, start: usize, end: usize);

    /// Current grid size.
    fn geometry(&self) -> ResizeGeometry;

    /// Release everything the engine holds.
    fn dispose(&mut self);
}

/// Builds engines for new sessions.
pub trait EngineFactory {
    type Engine: Engine;

    fn create(&self, options: &EngineOptions, events: EventSender) -> anyhow::Result<Self::Engine>;
}

impl<F, E> EngineFactory for F
where
    F: Fn(&EngineOptions, EventSender) -> anyhow::Result<E>,
    E: Engine,
{
    type Engine = E;

    fn create(&self, options: &EngineOptions, events: EventSender) -> anyhow::Result<E> {
        self(options, events)
    }
}
