//! Terminal geometry.
//!
//! When the host leaves the row count unset, the [`GeometryCoordinator`] keeps
//! the grid sized to the surface:
//!
//! 1. At mount it fits once, synchronously, so the first paint is already right.
//! 2. Every viewport resize the host reports (re)schedules a fit
//!    [`RESIZE_DEBOUNCE`] later on the host's [`Scheduler`]; scheduling cancels
//!    the fit still pending, so a burst of resizes collapses into the last one.
//! 3. Each fit is applied to the session straight away and reported through the
//!    resize callback. Nothing is remembered between fits.
//!
//! Explicit rows always win: no coordinator is created for them.
//!
//! The fit itself is a [`FitAddon`]. [`CellMetricsFit`] divides the surface's
//! pixel size by the cell size; hosts with their own measurement plug in any
//! `Fn() -> Option<ResizeGeometry>`.

use crate::engine::Engine;
use crate::host::{Scheduler, Surface, TimerHandle};
use crate::session::TerminalSession;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Quiet period a burst of viewport resizes must be followed by before a fit runs.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Called with `(columns, rows)` after every applied fit.
pub type ResizeCallback = Rc<dyn Fn(usize, usize)>;

/// A size in logical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelSize {
    pub width: f32,
    pub height: f32,
}

impl PixelSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Space kept free around the grid, in logical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Insets {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Insets {
    pub fn all(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// Grid dimensions in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResizeGeometry {
    pub rows: usize,
    pub columns: usize,
}

/// Proposes a grid size for the current surface.
pub trait FitAddon {
    /// `None` when the surface cannot be measured yet.
    fn propose_dimensions(&self) -> Option<ResizeGeometry>;
}

impl<F> FitAddon for F
where
    F: Fn() -> Option<ResizeGeometry>,
{
    fn propose_dimensions(&self) -> Option<ResizeGeometry> {
        self()
    }
}

/// Fits the grid to a surface from the size of one cell.
///
/// Letter spacing widens every cell, so it is added to the measured glyph width
/// before dividing.
pub struct CellMetricsFit {
    surface: Surface,
    cell: PixelSize,
    letter_spacing: f32,
    padding: Insets,
}

impl CellMetricsFit {
    pub fn new(surface: Surface, cell: PixelSize) -> Self {
        Self {
            surface,
            cell,
            letter_spacing: 0.0,
            padding: Insets::default(),
        }
    }

    pub fn with_letter_spacing(mut self, letter_spacing: f32) -> Self {
        self.letter_spacing = letter_spacing;
        self
    }

    pub fn with_padding(mut self, padding: Insets) -> Self {
        self.padding = padding;
        self
    }
}

impl FitAddon for CellMetricsFit {
    fn propose_dimensions(&self) -> Option<ResizeGeometry> {
        let bounds = self.surface.bounds()?;
        let cell_width = self.cell.width + self.letter_spacing;
        let cell_height = self.cell.height;
        if cell_width <= 0.0 || cell_height <= 0.0 {
            return None;
        }

        let available_width = bounds.width - self.padding.left - self.padding.right;
        let available_height = bounds.height - self.padding.top - self.padding.bottom;

        let columns = ((available_width / cell_width).max(0.0) as usize).max(1);
        let rows = ((available_height / cell_height).max(0.0) as usize).max(1);
        Some(ResizeGeometry { rows, columns })
    }
}

struct FitState<E: Engine> {
    fit: Rc<dyn FitAddon>,
    session: Weak<RefCell<TerminalSession<E>>>,
    on_resize: Option<ResizeCallback>,
    scheduler: Rc<dyn Scheduler>,
    pending: Option<TimerHandle>,
}

/// Keeps an auto-fit session sized to its surface.
pub struct GeometryCoordinator<E: Engine> {
    state: Rc<RefCell<FitState<E>>>,
    attached: bool,
}

impl<E: Engine> GeometryCoordinator<E> {
    /// Fit `session` once, then refit on every reported viewport resize.
    pub fn activate(
        session: &Rc<RefCell<TerminalSession<E>>>,
        fit: Rc<dyn FitAddon>,
        scheduler: Rc<dyn Scheduler>,
        on_resize: Option<ResizeCallback>,
    ) -> Self {
        let state = Rc::new(RefCell::new(FitState {
            fit,
            session: Rc::downgrade(session),
            on_resize,
            scheduler,
            pending: None,
        }));

        if apply_fit(&state).is_none() {
            tracing::debug!("surface not measurable at mount, keeping initial geometry");
        }

        Self {
            state,
            attached: true,
        }
    }

    /// The viewport changed size: (re)schedule a fit [`RESIZE_DEBOUNCE`] from now.
    pub fn viewport_resized(&self) {
        if self.attached {
            schedule_fit(&self.state);
        }
    }

    /// Ask the fit addon for a size without applying it.
    pub fn compute_fit(&self) -> Option<ResizeGeometry> {
        let fit = Rc::clone(&self.state.borrow().fit);
        fit.propose_dimensions()
    }

    pub fn has_pending_fit(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Drop the debounced fit, if one is waiting.
    pub fn cancel_pending(&self) {
        let pending = self.state.borrow_mut().pending.take();
        drop(pending);
    }

    /// Stop following the viewport.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl<E: Engine> Drop for GeometryCoordinator<E> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.pending.take();
        }
    }
}

fn schedule_fit<E: Engine>(state: &Rc<RefCell<FitState<E>>>) {
    let scheduler = Rc::clone(&state.borrow().scheduler);
    let weak_state = Rc::downgrade(state);
    let handle = scheduler.schedule(
        RESIZE_DEBOUNCE,
        Box::new(move || {
            if let Some(state) = weak_state.upgrade() {
                let fired = state.borrow_mut().pending.take();
                apply_fit(&state);
                drop(fired);
            }
        }),
    );

    // Replacing the handle cancels the fit scheduled by the previous resize.
    let previous = state.borrow_mut().pending.replace(handle);
    drop(previous);
}

fn apply_fit<E: Engine>(state: &RefCell<FitState<E>>) -> Option<ResizeGeometry> {
    let (fit, session, on_resize) = {
        let state = state.borrow();
        (
            Rc::clone(&state.fit),
            state.session.upgrade()?,
            state.on_resize.clone(),
        )
    };

    let geometry = fit.propose_dimensions()?;
    {
        let mut session = session.try_borrow_mut().ok()?;
        if session.is_disposed() {
            return None;
        }
        session.resize(geometry);
    }

    tracing::debug!(
        columns = geometry.columns,
        rows = geometry.rows,
        "fitted terminal to surface"
    );
    if let Some(on_resize) = on_resize {
        on_resize(geometry.columns, geometry.rows);
    }
    Some(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::testing::{FakeEngine, ManualScheduler, Recorder};
    use std::cell::Cell;

    const FITTED: ResizeGeometry = ResizeGeometry {
        rows: 40,
        columns: 120,
    };

    fn mounted_session(recorder: &Recorder) -> Rc<RefCell<TerminalSession<FakeEngine>>> {
        let config = SessionConfig {
            rows: None,
            ..Default::default()
        };
        let mut session = TerminalSession::create(config, &recorder.factory()).unwrap();
        session.mount(Surface::new().id()).unwrap();
        Rc::new(RefCell::new(session))
    }

    fn counting_fit(calls: Rc<Cell<usize>>, geometry: Option<ResizeGeometry>) -> Rc<dyn FitAddon> {
        Rc::new(move || {
            calls.set(calls.get() + 1);
            geometry
        })
    }

    struct Fixture {
        recorder: Recorder,
        scheduler: ManualScheduler,
        session: Rc<RefCell<TerminalSession<FakeEngine>>>,
        fits: Rc<Cell<usize>>,
    }

    impl Fixture {
        fn new() -> Self {
            let recorder = Recorder::new();
            let session = mounted_session(&recorder);
            Self {
                recorder,
                scheduler: ManualScheduler::new(),
                session,
                fits: Rc::new(Cell::new(0)),
            }
        }

        fn activate(&self, geometry: Option<ResizeGeometry>) -> GeometryCoordinator<FakeEngine> {
            let fit = counting_fit(self.fits.clone(), geometry);
            GeometryCoordinator::activate(&self.session, fit, self.scheduler.shared(), None)
        }
    }

    #[test]
    fn test_cell_metrics_fit() {
        let surface = Surface::new();
        surface.set_bounds(Some(PixelSize::new(800.0, 600.0)));

        let fit = CellMetricsFit::new(surface, PixelSize::new(8.0, 16.0));
        let expected = ResizeGeometry {
            rows: 37,
            columns: 100,
        };
        assert_eq!(fit.propose_dimensions(), Some(expected));
    }

    #[test]
    fn test_cell_metrics_fit_with_padding_and_letter_spacing() {
        let surface = Surface::new();
        surface.set_bounds(Some(PixelSize::new(816.0, 616.0)));

        let fit = CellMetricsFit::new(surface, PixelSize::new(8.0, 16.0))
            .with_letter_spacing(2.0)
            .with_padding(Insets::all(8.0));
        let expected = ResizeGeometry {
            rows: 37,
            columns: 80,
        };
        assert_eq!(fit.propose_dimensions(), Some(expected));
    }

    #[test]
    fn test_cell_metrics_fit_unmeasurable() {
        let surface = Surface::new();
        let fit = CellMetricsFit::new(surface.clone(), PixelSize::new(8.0, 16.0));
        assert_eq!(fit.propose_dimensions(), None);

        surface.set_bounds(Some(PixelSize::new(800.0, 600.0)));
        let zero_cell = CellMetricsFit::new(surface, PixelSize::new(0.0, 16.0));
        assert_eq!(zero_cell.propose_dimensions(), None);
    }

    #[test]
    fn test_cell_metrics_fit_minimum_one_cell() {
        let surface = Surface::new();
        surface.set_bounds(Some(PixelSize::new(2.0, 2.0)));
        let fit =
            CellMetricsFit::new(surface, PixelSize::new(8.0, 16.0)).with_padding(Insets::all(4.0));
        assert_eq!(
            fit.propose_dimensions(),
            Some(ResizeGeometry {
                rows: 1,
                columns: 1
            })
        );
    }

    #[test]
    fn test_activation_fits_once_synchronously() {
        let fixture = Fixture::new();
        let coordinator = fixture.activate(Some(FITTED));

        assert_eq!(fixture.fits.get(), 1);
        assert_eq!(fixture.recorder.resizes(), vec![FITTED]);
        assert!(coordinator.is_attached());
        assert!(!coordinator.has_pending_fit());
        assert_eq!(fixture.scheduler.pending(), 0);
    }

    #[test]
    fn test_resize_burst_collapses_to_one_fit() {
        let fixture = Fixture::new();
        let coordinator = fixture.activate(Some(FITTED));

        for _ in 0..5 {
            coordinator.viewport_resized();
            fixture.scheduler.advance(Duration::from_millis(40));
        }
        assert_eq!(fixture.fits.get(), 1);
        assert_eq!(fixture.scheduler.pending(), 1);

        // Last resize was 40ms ago; the fit lands 100ms after it.
        fixture.scheduler.advance(Duration::from_millis(59));
        assert_eq!(fixture.fits.get(), 1);
        fixture.scheduler.advance(Duration::from_millis(1));

        assert_eq!(fixture.fits.get(), 2);
        assert_eq!(fixture.recorder.resizes().len(), 2);
        assert_eq!(fixture.scheduler.pending(), 0);
        assert!(!coordinator.has_pending_fit());
    }

    #[test]
    fn test_separate_quiet_periods_fit_separately() {
        let fixture = Fixture::new();
        let coordinator = fixture.activate(Some(FITTED));

        coordinator.viewport_resized();
        fixture.scheduler.advance(Duration::from_millis(150));
        coordinator.viewport_resized();
        fixture.scheduler.advance(Duration::from_millis(150));

        assert_eq!(fixture.fits.get(), 3);
    }

    #[test]
    fn test_unmeasurable_surface_leaves_geometry() {
        let fixture = Fixture::new();
        let coordinator = fixture.activate(None);

        coordinator.viewport_resized();
        fixture.scheduler.advance(RESIZE_DEBOUNCE);

        assert_eq!(fixture.fits.get(), 2);
        assert!(fixture.recorder.resizes().is_empty());
    }

    #[test]
    fn test_resize_callback_receives_columns_then_rows() {
        let fixture = Fixture::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        let on_resize: ResizeCallback =
            Rc::new(move |columns, rows| seen_clone.borrow_mut().push((columns, rows)));
        let _coordinator = GeometryCoordinator::activate(
            &fixture.session,
            Rc::new(|| Some(FITTED)),
            fixture.scheduler.shared(),
            Some(on_resize),
        );

        assert_eq!(*seen.borrow(), vec![(120, 40)]);
    }

    #[test]
    fn test_cancel_and_detach() {
        let fixture = Fixture::new();
        let mut coordinator = fixture.activate(Some(FITTED));

        coordinator.viewport_resized();
        assert!(coordinator.has_pending_fit());

        coordinator.cancel_pending();
        coordinator.detach();
        assert!(!coordinator.is_attached());
        assert_eq!(fixture.scheduler.pending(), 0);

        coordinator.viewport_resized();
        fixture.scheduler.advance(Duration::from_secs(1));
        assert_eq!(fixture.fits.get(), 1);
    }

    #[test]
    fn test_drop_cancels_pending_fit() {
        let fixture = Fixture::new();
        let coordinator = fixture.activate(Some(FITTED));

        coordinator.viewport_resized();
        drop(coordinator);

        assert_eq!(fixture.scheduler.pending(), 0);
        fixture.scheduler.advance(Duration::from_secs(1));
        assert_eq!(fixture.fits.get(), 1);
    }

    #[test]
    fn test_compute_fit_does_not_resize() {
        let fixture = Fixture::new();
        let coordinator = GeometryCoordinator::activate(
            &fixture.session,
            Rc::new(|| Some(FITTED)),
            fixture.scheduler.shared(),
            None,
        );

        assert_eq!(coordinator.compute_fit(), Some(FITTED));
        assert_eq!(fixture.recorder.resizes().len(), 1);
    }
}
