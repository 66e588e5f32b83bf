//! The imperative control handle.
//!
//! A [`ControlHandle`] is how a host (or the transport it runs) drives a mounted
//! session: push received data in, focus the terminal, announce that the
//! connection closed. It holds only a weak reference to the session, so every
//! call made before mount or after unmount is a silent no-op. Transports racing
//! the component lifecycle never fault.
//!
//! [`HandleRef`] plays the role of a component ref: the adapter fills it on mount
//! and clears it on unmount.
//!
//! # Example
//!
//! ```ignore
//! let handle = adapter.handle();
//! handle.on_data_received("$ ");
//! handle.on_connection_closed("");  // red "disconnected"
//! ```

use crate::engine::Engine;
use crate::session::{TerminalSession, dispatch_events};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Reason shown by [`ControlHandle::on_connection_closed`] when none is given.
pub const DEFAULT_CLOSE_REASON: &str = "disconnected";

const ERROR_STYLE: &str = "\x1b[31m";
const RESET_STYLE: &str = "\x1b[m";

/// Build the line written when the connection closes.
pub fn connection_closed_line(reason: &str) -> String {
    let reason = if reason.is_empty() {
        DEFAULT_CLOSE_REASON
    } else {
        reason
    };
    format!("{ERROR_STYLE}{reason}{RESET_STYLE}\r\n")
}

/// Weak, inert-after-dispose access to one session.
pub struct ControlHandle<E: Engine> {
    session: Weak<RefCell<TerminalSession<E>>>,
}

impl<E: Engine> Clone for ControlHandle<E> {
    fn clone(&self) -> Self {
        Self {
            session: Weak::clone(&self.session),
        }
    }
}

impl<E: Engine> Default for ControlHandle<E> {
    fn default() -> Self {
        Self::detached()
    }
}

impl<E: Engine> ControlHandle<E> {
    pub(crate) fn new(session: &Rc<RefCell<TerminalSession<E>>>) -> Self {
        Self {
            session: Rc::downgrade(session),
        }
    }

    /// A handle bound to no session.
    pub fn detached() -> Self {
        Self {
            session: Weak::new(),
        }
    }

    /// Whether the session behind this handle is still mounted.
    pub fn is_live(&self) -> bool {
        self.session
            .upgrade()
            .and_then(|session| session.try_borrow().ok().map(|session| !session.is_disposed()))
            .unwrap_or(false)
    }

    pub fn focus_terminal(&self) {
        self.with_session("focus_terminal", |session| session.focus());
    }

    /// Write data received from the transport, verbatim.
    pub fn on_data_received(&self, data: &str) {
        self.with_session("on_data_received", |session| session.write(data));
    }

    /// Show `reason` (or "disconnected") as an error line and redraw every row.
    pub fn on_connection_closed(&self, reason: &str) {
        let line = connection_closed_line(reason);
        self.with_session("on_connection_closed", |session| {
            session.write(&line);
            session.refresh_all();
        });
    }

    fn with_session(&self, operation: &'static str, f: impl FnOnce(&mut TerminalSession<E>)) {
        let Some(session) = self.session.upgrade() else {
            tracing::trace!(operation, "no terminal session, ignoring");
            return;
        };

        match session.try_borrow_mut() {
            Ok(mut guard) if !guard.is_disposed() => f(&mut guard),
            Ok(_) => {
                tracing::trace!(operation, "terminal session disposed, ignoring");
                return;
            }
            Err(_) => {
                tracing::trace!(operation, "terminal session busy, ignoring");
                return;
            }
        }

        // Writes can make the terminal answer (status reports and the like).
        dispatch_events(&session);
    }
}

/// A slot the adapter fills with the current session's handle.
pub struct HandleRef<E: Engine> {
    current: Rc<RefCell<Option<ControlHandle<E>>>>,
}

impl<E: Engine> Clone for HandleRef<E> {
    fn clone(&self) -> Self {
        Self {
            current: Rc::clone(&self.current),
        }
    }
}

impl<E: Engine> Default for HandleRef<E> {
    fn default() -> Self {
        Self {
            current: Rc::new(RefCell::new(None)),
        }
    }
}

impl<E: Engine> HandleRef<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle of the mounted session, if any.
    pub fn current(&self) -> Option<ControlHandle<E>> {
        self.current.borrow().clone()
    }

    pub(crate) fn set(&self, handle: ControlHandle<E>) {
        *self.current.borrow_mut() = Some(handle);
    }

    pub(crate) fn clear(&self) {
        self.current.borrow_mut().take();
    }
}
