//! Host seams.
//!
//! The adapter runs no event loop of its own. The host reports viewport resizes
//! and close requests by calling into [`TerminalAdapter`](crate::TerminalAdapter),
//! records focus and layout on the shared [`Surface`], and lends a [`Scheduler`]
//! for the resize debounce. The GPUI host (`view`) schedules on GPUI's executor
//! and keeps its window listeners as GPUI subscriptions.
//!
//! Everything here is `!Send`: the adapter lives on the UI thread.

use crate::geometry::PixelSize;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Runs deferred callbacks on the host's UI thread.
pub trait Scheduler {
    /// Run `callback` once `delay` has elapsed, unless the handle is dropped first.
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle;
}

/// A scheduled callback. Dropping the handle cancels it if it has not run.
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    _task: Box<dyn Any>,
}

impl TimerHandle {
    /// Wrap whatever the scheduler cancels on drop, such as a GPUI `Task`.
    pub fn new(task: impl Any) -> Self {
        Self {
            _task: Box::new(task),
        }
    }

    pub fn cancel(self) {}
}

/// What the unload handler answers when the host is about to close.
///
/// The host shows its "leave this page?" prompt when
/// [`confirmation_required`](Self::confirmation_required) is true.
#[derive(Debug, Default)]
pub struct UnloadRequest {
    default_prevented: Cell<bool>,
    return_value: RefCell<Option<String>>,
}

impl UnloadRequest {
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn set_return_value(&self, value: impl Into<String>) {
        *self.return_value.borrow_mut() = Some(value.into());
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn return_value(&self) -> Option<String> {
        self.return_value.borrow().clone()
    }

    pub fn confirmation_required(&self) -> bool {
        self.default_prevented() || self.return_value.borrow().is_some()
    }
}

/// Opaque identifier of a drawing surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// A drawing region owned by the host.
///
/// Clones share state: the host keeps one clone to report focus and layout, the
/// adapter keeps another to read them.
#[derive(Clone)]
pub struct Surface {
    id: SurfaceId,
    focused: Rc<Cell<bool>>,
    bounds: Rc<Cell<Option<PixelSize>>>,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    pub fn new() -> Self {
        Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            focused: Rc::new(Cell::new(false)),
            bounds: Rc::new(Cell::new(None)),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.set(focused);
    }

    pub fn is_focused(&self) -> bool {
        self.focused.get()
    }

    /// Record the laid-out size. `None` means the surface is not measurable.
    pub fn set_bounds(&self, bounds: Option<PixelSize>) {
        self.bounds.set(bounds);
    }

    pub fn bounds(&self) -> Option<PixelSize> {
        self.bounds.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DropFlag(Rc<Cell<bool>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[test]
    fn test_timer_handle_drops_task() {
        let dropped = Rc::new(Cell::new(false));
        let handle = TimerHandle::new(DropFlag(dropped.clone()));
        assert!(!dropped.get());

        handle.cancel();
        assert!(dropped.get());
    }

    #[test]
    fn test_unload_request_flags() {
        let request = UnloadRequest::default();
        assert!(!request.confirmation_required());

        request.prevent_default();
        request.set_return_value("");
        assert!(request.default_prevented());
        assert_eq!(request.return_value().as_deref(), Some(""));
        assert!(request.confirmation_required());
    }

    #[test]
    fn test_surface_ids_are_unique() {
        let a = Surface::new();
        let b = Surface::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_surface_clones_share_state() {
        let surface = Surface::new();
        let host_side = surface.clone();

        host_side.set_focused(true);
        host_side.set_bounds(Some(PixelSize::new(640.0, 480.0)));

        assert!(surface.is_focused());
        assert_eq!(surface.bounds(), Some(PixelSize::new(640.0, 480.0)));
    }
}
