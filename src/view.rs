//! GPUI host for the terminal component.
//!
//! [`TerminalView`] embeds a [`TerminalAdapter`] in a GPUI window and plays the
//! host environment for it:
//!
//! - Window bounds changes update the surface bounds and report a viewport resize
//! - Focus and blur of the view's [`FocusHandle`] drive the surface focus, which
//!   arms the unload guard
//! - Closing the window asks the adapter first and prompts for confirmation
//!   while the terminal is focused
//! - The resize debounce runs on GPUI's executors; a ~60fps tick delivers
//!   engine events
//!
//! Output from a transport reaches the terminal through [`TerminalView::handle`].
//!
//! # Example
//!
//! ```ignore
//! let terminal = cx.new(|cx| TerminalView::new(props, window, cx));
//! terminal.update(cx, |terminal, _| terminal.mount())?;
//! terminal.read(cx).focus_handle().focus(window);
//! ```

use crate::adapter::{TerminalAdapter, TerminalProps};
use crate::geometry::{CellMetricsFit, Insets, PixelSize};
use crate::handle::ControlHandle;
use crate::host::{Scheduler, Surface, TimerHandle, UnloadRequest};
use crate::input::keystroke_to_input;
use crate::terminal::{AlacrittyEngine, AlacrittyFactory};
use alacritty_terminal::term::TermMode;
use gpui::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Font family used when the configuration leaves it unset.
pub const DEFAULT_FONT_FAMILY: &str = "monospace";

/// Font size in pixels used when the configuration leaves it unset.
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

const PADDING: f32 = 8.0;
const TICK: Duration = Duration::from_millis(16);

/// A terminal in a GPUI window.
pub struct TerminalView {
    adapter: TerminalAdapter<AlacrittyFactory>,
    surface: Surface,
    focus_handle: FocusHandle,
    font_family: SharedString,
    font_size: Pixels,
    cell: PixelSize,
    pending_title: Rc<RefCell<Option<String>>>,
    _subscriptions: Vec<Subscription>,
    _tick: Task<()>,
}

impl TerminalView {
    /// Build the view. The terminal itself starts with [`mount`](Self::mount).
    pub fn new(
        mut props: TerminalProps<AlacrittyEngine>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let font_family: SharedString = props
            .config
            .font_family
            .clone()
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_owned())
            .into();
        let font_size = px(props.config.font_size.unwrap_or(DEFAULT_FONT_SIZE));
        let cell = measure_cell(window, &font_family, font_size);

        let scheduler = Rc::new(GpuiScheduler {
            foreground: cx.foreground_executor().clone(),
            background: cx.background_executor().clone(),
        });
        let surface = Surface::new();
        surface.set_bounds(Some(viewport(window)));

        // Titles are applied to the window on the next render.
        let pending_title = Rc::new(RefCell::new(None));
        let host_title_callback = props.on_title_changed.take();
        let title_sink = Rc::clone(&pending_title);
        props.on_title_changed = Some(Rc::new(move |title: &str| {
            *title_sink.borrow_mut() = Some(title.to_owned());
            if let Some(callback) = &host_title_callback {
                callback(title);
            }
        }));

        let fit = CellMetricsFit::new(surface.clone(), cell)
            .with_letter_spacing(props.config.letter_spacing)
            .with_padding(Insets::all(PADDING));
        let adapter =
            TerminalAdapter::new(props, surface.clone(), scheduler, AlacrittyFactory, Rc::new(fit));

        let focus_handle = cx.focus_handle();
        let subscriptions = vec![
            cx.observe_window_bounds(window, |view: &mut Self, window, _cx| {
                view.surface.set_bounds(Some(viewport(window)));
                view.adapter.viewport_resized();
            }),
            cx.on_focus(&focus_handle, window, |view: &mut Self, _window, cx| {
                view.surface.set_focused(true);
                view.adapter.handle().focus_terminal();
                cx.notify();
            }),
            cx.on_blur(&focus_handle, window, |view: &mut Self, _window, cx| {
                view.surface.set_focused(false);
                cx.notify();
            }),
        ];

        let this = cx.entity().downgrade();
        window.on_window_should_close(cx, move |window, cx| {
            let Some(view) = this.upgrade() else {
                return true;
            };
            let request = view.read(cx).adapter.request_unload();
            confirm_close(&request, window, cx)
        });

        let tick = cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
            loop {
                cx.background_executor().timer(TICK).await;
                if this.update(cx, |view, cx| view.tick(cx)).is_err() {
                    break; // View dropped
                }
            }
        });

        Self {
            adapter,
            surface,
            focus_handle,
            font_family,
            font_size,
            cell,
            pending_title,
            _subscriptions: subscriptions,
            _tick: tick,
        }
    }

    /// Start the terminal session.
    pub fn mount(&mut self) -> anyhow::Result<()> {
        self.adapter.mount()
    }

    pub fn unmount(&mut self) {
        self.adapter.unmount();
    }

    /// Control handle for the mounted session.
    pub fn handle(&self) -> ControlHandle<AlacrittyEngine> {
        self.adapter.handle()
    }

    pub fn adapter(&self) -> &TerminalAdapter<AlacrittyFactory> {
        &self.adapter
    }

    pub fn focus_handle(&self) -> &FocusHandle {
        &self.focus_handle
    }

    fn tick(&mut self, cx: &mut Context<Self>) {
        let before = self.adapter.geometry();
        self.adapter.dispatch_events();

        if before != self.adapter.geometry() || self.pending_title.borrow().is_some() {
            cx.notify();
        }
    }

    fn on_key_down(&mut self, event: &KeyDownEvent, _window: &mut Window, cx: &mut Context<Self>) {
        let mode = self
            .adapter
            .with_engine(AlacrittyEngine::mode)
            .unwrap_or_else(TermMode::empty);

        if let Some(input) = keystroke_to_input(&event.keystroke, mode) {
            self.adapter.key_input(&input);
            cx.stop_propagation();
        }
    }

    fn on_mouse_down(
        &mut self,
        _event: &MouseDownEvent,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        window.focus(&self.focus_handle);
        cx.notify();
    }
}

impl Focusable for TerminalView {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl Render for TerminalView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if let Some(title) = self.pending_title.borrow_mut().take() {
            window.set_window_title(&title);
        }

        let glyph_width = self.cell.width;
        let (lines, advance) = self
            .adapter
            .with_engine(|engine| (engine.visible_lines(), engine.cell_advance(glyph_width)))
            .unwrap_or_else(|| (Vec::new(), glyph_width));
        let line_height = px(self.cell.height);
        let advance = px(advance);

        div()
            .size_full()
            .p(px(PADDING))
            .bg(rgb(0x1e1e1e))
            .text_color(rgb(0xd4d4d4))
            .font_family(self.font_family.clone())
            .text_size(self.font_size)
            .line_height(line_height)
            .whitespace_nowrap()
            .overflow_hidden()
            .track_focus(&self.focus_handle)
            .on_key_down(cx.listener(Self::on_key_down))
            .on_mouse_down(MouseButton::Left, cx.listener(Self::on_mouse_down))
            .children(lines.into_iter().map(move |line| {
                // One box per cell so letter spacing shows up in the drawn width.
                div().flex().h(line_height).children(line.chars().map(move |ch| {
                    div()
                        .flex_none()
                        .w(advance)
                        .child(SharedString::from(ch.to_string()))
                }))
            }))
    }
}

/// Runs the resize debounce on GPUI: the delay on the background timer, the
/// callback on the UI thread. Dropping the handle drops the task.
struct GpuiScheduler {
    foreground: ForegroundExecutor,
    background: BackgroundExecutor,
}

impl Scheduler for GpuiScheduler {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let timer = self.background.timer(delay);
        let task = self.foreground.spawn(async move {
            timer.await;
            callback();
        });
        TimerHandle::new(task)
    }
}

/// Whether the window may close now. While the unload guard asks for
/// confirmation, prompt and close only on an explicit yes.
fn confirm_close(request: &UnloadRequest, window: &mut Window, cx: &mut App) -> bool {
    if !request.confirmation_required() {
        return true;
    }

    let answer = window.prompt(
        PromptLevel::Warning,
        "Close the terminal?",
        Some("The session in this terminal will be disconnected."),
        &["Close", "Cancel"],
        cx,
    );
    window
        .spawn(cx, async move |cx| {
            if answer.await == Ok(0) {
                let _ = cx.update(|window, _cx| window.remove_window());
            }
        })
        .detach();
    false
}

/// Content size of the window, in logical pixels.
fn viewport(window: &Window) -> PixelSize {
    let size = window.viewport_size();
    PixelSize::new(size.width.into(), size.height.into())
}

/// Measure one cell of `font_family` at `font_size`.
///
/// Uses '│' (U+2502), which spans the full cell height in terminal fonts.
fn measure_cell(
    window: &mut Window,
    font_family: &SharedString,
    font_size: Pixels,
) -> PixelSize {
    let font = Font {
        family: font_family.clone(),
        features: FontFeatures::default(),
        fallbacks: None,
        weight: FontWeight::NORMAL,
        style: FontStyle::Normal,
    };
    let text_run = TextRun {
        len: "│".len(),
        font,
        color: gpui::black(),
        background_color: None,
        underline: None,
        strikethrough: None,
    };

    let shaped = window
        .text_system()
        .shape_line("│".into(), font_size, &[text_run], None);

    let width: f32 = shaped.width.into();
    let height: f32 = (shaped.ascent + shaped.descent).ceil().into();
    PixelSize::new(width, height)
}
