//! The terminal component.
//!
//! [`TerminalAdapter`] is what a host embeds. It takes declarative
//! [`TerminalProps`] and owns everything that lives between mount and unmount:
//! the session, the geometry coordinator (auto-fit only), the unload guard and
//! the control handle published through `inner_ref`. Unmount cancels the pending
//! fit, disposes the engine, detaches the coordinator, releases the guard and
//! clears `inner_ref`, in that order.

use crate::config::SessionConfig;
use crate::engine::{Engine, EngineFactory};
use crate::geometry::{FitAddon, GeometryCoordinator, ResizeCallback, ResizeGeometry};
use crate::handle::{ControlHandle, HandleRef};
use crate::host::{Scheduler, Surface, UnloadRequest};
use crate::session::{DataCallback, TerminalSession, TitleCallback, dispatch_events};
use crate::unload::UnloadGuard;
use std::cell::RefCell;
use std::rc::Rc;

/// Declarative inputs of the terminal component.
pub struct TerminalProps<E: Engine> {
    pub config: SessionConfig,
    pub on_title_changed: Option<TitleCallback>,
    pub on_data: Option<DataCallback>,
    pub on_resize: Option<ResizeCallback>,
    pub inner_ref: Option<HandleRef<E>>,
}

impl<E: Engine> Clone for TerminalProps<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            on_title_changed: self.on_title_changed.clone(),
            on_data: self.on_data.clone(),
            on_resize: self.on_resize.clone(),
            inner_ref: self.inner_ref.clone(),
        }
    }
}

impl<E: Engine> Default for TerminalProps<E> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<E: Engine> TerminalProps<E> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            on_title_changed: None,
            on_data: None,
            on_resize: None,
            inner_ref: None,
        }
    }

    /// Set a callback for title changes.
    pub fn with_title_callback(mut self, callback: impl Fn(&str) + 'static) -> Self {
        self.on_title_changed = Some(Rc::new(callback));
        self
    }

    /// Set a callback receiving everything the user types.
    pub fn with_data_callback(mut self, callback: impl Fn(&str) + 'static) -> Self {
        self.on_data = Some(Rc::new(callback));
        self
    }

    /// Set a callback for applied fits, called with `(columns, rows)`.
    pub fn with_resize_callback(mut self, callback: impl Fn(usize, usize) + 'static) -> Self {
        self.on_resize = Some(Rc::new(callback));
        self
    }

    /// Publish the control handle into `inner_ref` while mounted.
    pub fn with_inner_ref(mut self, inner_ref: HandleRef<E>) -> Self {
        self.inner_ref = Some(inner_ref);
        self
    }
}

/// A mountable terminal bound to one surface.
pub struct TerminalAdapter<F: EngineFactory> {
    props: TerminalProps<F::Engine>,
    surface: Surface,
    scheduler: Rc<dyn Scheduler>,
    factory: F,
    fit: Rc<dyn FitAddon>,
    session: Option<Rc<RefCell<TerminalSession<F::Engine>>>>,
    geometry: Option<GeometryCoordinator<F::Engine>>,
    unload_guard: Option<UnloadGuard>,
}

impl<F: EngineFactory> TerminalAdapter<F> {
    pub fn new(
        props: TerminalProps<F::Engine>,
        surface: Surface,
        scheduler: Rc<dyn Scheduler>,
        factory: F,
        fit: Rc<dyn FitAddon>,
    ) -> Self {
        Self {
            props,
            surface,
            scheduler,
            factory,
            fit,
            session: None,
            geometry: None,
            unload_guard: None,
        }
    }

    /// Create the session and wire it to the host.
    pub fn mount(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(self.session.is_none(), "terminal is already mounted");

        let mut session = TerminalSession::create(self.props.config.clone(), &self.factory)?;
        session.wire_incoming_keystrokes(self.props.on_data.clone());
        session.wire_title_change(self.props.on_title_changed.clone());
        session.mount(self.surface.id())?;
        let session = Rc::new(RefCell::new(session));

        if self.props.config.auto_fit() {
            self.geometry = Some(GeometryCoordinator::activate(
                &session,
                Rc::clone(&self.fit),
                Rc::clone(&self.scheduler),
                self.props.on_resize.clone(),
            ));
        }
        self.unload_guard = Some(UnloadGuard::attach(&self.surface));

        if let Some(inner_ref) = &self.props.inner_ref {
            inner_ref.set(ControlHandle::new(&session));
        }
        self.session = Some(session);
        Ok(())
    }

    /// Tear the session down. Safe to call when not mounted.
    pub fn unmount(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Some(geometry) = &self.geometry {
            geometry.cancel_pending();
        }
        match session.try_borrow_mut() {
            Ok(mut session) => session.dispose(),
            // The last strong reference disposes it on drop.
            Err(_) => tracing::warn!("terminal session busy during unmount, deferring dispose"),
        }
        if let Some(mut geometry) = self.geometry.take() {
            geometry.detach();
        }
        if let Some(mut guard) = self.unload_guard.take() {
            guard.release();
        }
        if let Some(inner_ref) = &self.props.inner_ref {
            inner_ref.clear();
        }
        tracing::debug!(surface = self.surface.id().get(), "unmounted terminal");
    }

    /// Replace the configuration, recreating a mounted session if it changed.
    ///
    /// Returns whether anything changed.
    pub fn update_config(&mut self, config: SessionConfig) -> anyhow::Result<bool> {
        if config == self.props.config {
            return Ok(false);
        }
        self.props.config = config;
        if self.is_mounted() {
            tracing::debug!("terminal configuration changed, remounting");
            self.unmount();
            self.mount()?;
        }
        Ok(true)
    }

    /// The host's viewport changed size. Schedules a debounced fit when
    /// auto-fitting; ignored otherwise.
    pub fn viewport_resized(&self) {
        if let Some(geometry) = &self.geometry {
            geometry.viewport_resized();
        }
    }

    /// The host is about to close. The answer asks for confirmation while the
    /// mounted terminal has focus.
    pub fn request_unload(&self) -> UnloadRequest {
        let request = UnloadRequest::default();
        if let Some(guard) = &self.unload_guard {
            guard.handle_unload(&request);
        }
        request
    }

    /// Feed keyboard input captured by the surface into the engine.
    pub fn key_input(&self, text: &str) {
        let Some(session) = &self.session else {
            return;
        };
        if let Ok(mut session) = session.try_borrow_mut() {
            session.key_input(text);
        }
        dispatch_events(session);
    }

    /// Deliver engine events queued since the last dispatch.
    pub fn dispatch_events(&self) {
        if let Some(session) = &self.session {
            dispatch_events(session);
        }
    }

    /// Control handle for the current session; detached when not mounted.
    pub fn handle(&self) -> ControlHandle<F::Engine> {
        self.session
            .as_ref()
            .map(ControlHandle::new)
            .unwrap_or_default()
    }

    /// Run `f` against the live engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&F::Engine) -> R) -> Option<R> {
        let session = self.session.as_ref()?.try_borrow().ok()?;
        Some(f(session.engine()))
    }

    pub fn geometry(&self) -> Option<ResizeGeometry> {
        let session = self.session.as_ref()?.try_borrow().ok()?;
        Some(session.geometry())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.props.config
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the geometry coordinator is sizing the grid.
    pub fn is_auto_fitting(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn is_guarded(&self) -> bool {
        self.unload_guard
            .as_ref()
            .is_some_and(UnloadGuard::is_guarded)
    }

    pub fn has_pending_fit(&self) -> bool {
        self.geometry
            .as_ref()
            .is_some_and(GeometryCoordinator::has_pending_fit)
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

impl<F: EngineFactory> Drop for TerminalAdapter<F> {
    fn drop(&mut self) {
        self.unmount();
    }
}
