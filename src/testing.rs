//! Recording engine and manual clock used by the unit tests.

use crate::config::EngineOptions;
use crate::engine::{Engine, EngineFactory};
use crate::event::{EventSender, TerminalEvent};
use crate::geometry::ResizeGeometry;
use crate::host::{Scheduler, SurfaceId, TimerHandle};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Open(SurfaceId),
    Write(String),
    Resize(ResizeGeometry),
    Focus,
    Refresh(usize, usize),
    Dispose,
}

#[derive(Default)]
struct RecorderState {
    options: Option<EngineOptions>,
    events: Option<EventSender>,
    calls: Vec<Call>,
    disposed: bool,
}

/// Shared view into every engine built by [`Recorder::factory`].
#[derive(Clone, Default)]
pub struct Recorder {
    state: Rc<RefCell<RecorderState>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> RecorderFactory {
        RecorderFactory {
            state: Rc::clone(&self.state),
        }
    }

    pub fn options(&self) -> Option<EngineOptions> {
        self.state.borrow().options.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn resizes(&self) -> Vec<ResizeGeometry> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Resize(geometry) => Some(geometry),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Emit an event as if the engine produced it.
    pub fn emit(&self, event: TerminalEvent) {
        if let Some(events) = &self.state.borrow().events {
            let _ = events.send(event);
        }
    }
}

/// Builds [`FakeEngine`]s that report into the recorder.
pub struct RecorderFactory {
    state: Rc<RefCell<RecorderState>>,
}

impl EngineFactory for RecorderFactory {
    type Engine = FakeEngine;

    fn create(&self, options: &EngineOptions, events: EventSender) -> anyhow::Result<FakeEngine> {
        {
            let mut recorder = self.state.borrow_mut();
            recorder.options = Some(options.clone());
            recorder.events = Some(events.clone());
        }
        Ok(FakeEngine {
            state: Rc::clone(&self.state),
            events,
            geometry: ResizeGeometry {
                rows: options.rows,
                columns: options.columns,
            },
            disposed: false,
        })
    }
}

pub struct FakeEngine {
    state: Rc<RefCell<RecorderState>>,
    events: EventSender,
    geometry: ResizeGeometry,
    disposed: bool,
}

impl FakeEngine {
    fn record(&self, call: Call) {
        assert!(!self.disposed, "{call:?} called on a disposed engine");
        self.state.borrow_mut().calls.push(call);
    }
}

impl Engine for FakeEngine {
    fn open(&mut self, surface: SurfaceId) {
        self.record(Call::Open(surface));
    }

    fn write(&mut self, data: &str) {
        self.record(Call::Write(data.to_owned()));
    }

    fn resize(&mut self, geometry: ResizeGeometry) {
        self.record(Call::Resize(geometry));
        self.geometry = geometry;
    }

    fn focus(&mut self) {
        self.record(Call::Focus);
    }

    fn key_input(&mut self, text: &str) {
        let _ = self.events.send(TerminalEvent::Input(text.to_owned()));
    }

    fn refresh(&mut self, start: usize, end: usize) {
        self.record(Call::Refresh(start, end));
    }

    fn geometry(&self) -> ResizeGeometry {
        self.geometry
    }

    fn dispose(&mut self) {
        self.record(Call::Dispose);
        self.disposed = true;
        self.state.borrow_mut().disposed = true;
    }
}

struct TimerEntry {
    id: u64,
    deadline: Duration,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct TimerQueue {
    now: Duration,
    next_id: u64,
    entries: Vec<TimerEntry>,
}

/// A scheduler on a clock that only moves when the test advances it.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<TimerQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Rc<dyn Scheduler> {
        Rc::new(self.clone())
    }

    /// Move the clock forward, running every callback that falls due, earliest
    /// first. Callbacks run with the queue unborrowed.
    pub fn advance(&self, by: Duration) {
        let target = self.queue.borrow().now + by;
        loop {
            let due = {
                let mut queue = self.queue.borrow_mut();
                let next = queue
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.deadline <= target)
                    .min_by_key(|(_, entry)| (entry.deadline, entry.id))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let entry = queue.entries.remove(index);
                        queue.now = entry.deadline;
                        entry
                    }
                    None => {
                        queue.now = target;
                        break;
                    }
                }
            };
            (due.callback)();
        }
    }

    /// Callbacks that have neither run nor been cancelled.
    pub fn pending(&self) -> usize {
        self.queue.borrow().entries.len()
    }
}

struct CancelOnDrop {
    id: u64,
    queue: Weak<RefCell<TimerQueue>>,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.upgrade()
            && let Ok(mut queue) = queue.try_borrow_mut()
        {
            queue.entries.retain(|entry| entry.id != self.id);
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        let deadline = queue.now + delay;
        queue.entries.push(TimerEntry {
            id,
            deadline,
            callback,
        });
        TimerHandle::new(CancelOnDrop {
            id,
            queue: Rc::downgrade(&self.queue),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_callbacks_run_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_a = log.clone();
        let _a = scheduler.schedule(
            Duration::from_millis(30),
            Box::new(move || log_a.borrow_mut().push("a")),
        );
        let log_b = log.clone();
        let _b = scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || log_b.borrow_mut().push("b")),
        );

        scheduler.advance(Duration::from_millis(9));
        assert!(log.borrow().is_empty());

        scheduler.advance(Duration::from_millis(25));
        assert_eq!(*log.borrow(), vec!["b", "a"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_dropped_handle_cancels() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(false));

        let fired_clone = fired.clone();
        let handle = scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || fired_clone.set(true)),
        );
        assert_eq!(scheduler.pending(), 1);
        handle.cancel();

        scheduler.advance(Duration::from_millis(50));
        assert!(!fired.get());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_schedule_from_callback() {
        let scheduler = ManualScheduler::new();
        let count = Rc::new(Cell::new(0));
        let keep: Rc<RefCell<Vec<TimerHandle>>> = Rc::new(RefCell::new(Vec::new()));

        let (inner, count_clone, keep_clone) = (scheduler.clone(), count.clone(), keep.clone());
        let _first = scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                count_clone.set(count_clone.get() + 1);
                let count_inner = count_clone.clone();
                let next = inner.schedule(
                    Duration::from_millis(10),
                    Box::new(move || count_inner.set(count_inner.get() + 1)),
                );
                keep_clone.borrow_mut().push(next);
            }),
        );

        scheduler.advance(Duration::from_millis(20));
        assert_eq!(count.get(), 2);
    }
}
