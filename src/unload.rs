//! Unload confirmation while the terminal has focus.
//!
//! Closing the host (or navigating away) drops the remote session, so while the
//! terminal surface holds focus the guard asks the host to confirm first. The
//! guard reads focus from the surface when asked, so focus the surface already
//! had at mount counts the same as focus gained later.

use crate::host::{Surface, UnloadRequest};

/// Cancel the default unload and ask for confirmation. The empty return value is
/// what browsers historically required to show the prompt.
fn confirm_unload(request: &UnloadRequest) {
    request.prevent_default();
    request.set_return_value("");
}

/// Answers unload requests for one mounted surface.
pub struct UnloadGuard {
    surface: Surface,
    released: bool,
}

impl UnloadGuard {
    pub fn attach(surface: &Surface) -> Self {
        let guard = Self {
            surface: surface.clone(),
            released: false,
        };
        if guard.is_guarded() {
            tracing::debug!("terminal focused at mount, unload confirmation armed");
        }
        guard
    }

    pub fn is_guarded(&self) -> bool {
        !self.released && self.surface.is_focused()
    }

    /// Ask for confirmation on `request` while guarded.
    pub fn handle_unload(&self, request: &UnloadRequest) {
        if self.is_guarded() {
            tracing::debug!(surface = self.surface.id().get(), "confirming unload");
            confirm_unload(request);
        }
    }

    /// Stop answering unload requests, even while focused.
    pub fn release(&mut self) {
        self.released = true;
    }
}
