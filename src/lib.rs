//! # gpui-terminal-host
//!
//! An embeddable terminal component and the host plumbing around it.
//!
//! A host (a GPUI window, a test, anything single-threaded) renders a
//! [`TerminalAdapter`] with declarative [`TerminalProps`]. The adapter owns one
//! terminal engine per mount and keeps it wired to the host:
//!
//! - **Session management** ([`session`]): exactly one engine per mount, created
//!   from a [`SessionConfig`], disposed exactly once
//! - **Geometry** ([`geometry`]): with no fixed row count the grid follows the
//!   viewport, refitted at most once per 100ms quiet period
//! - **Unload guard** ([`unload`]): while the terminal has focus, closing the host
//!   asks for confirmation
//! - **Control handle** ([`handle`]): push transport output in, announce a closed
//!   connection; inert before mount and after unmount
//!
//! The engine is behind the [`Engine`] trait. [`terminal::AlacrittyEngine`] runs
//! it on [alacritty_terminal](https://docs.rs/alacritty_terminal);
//! [`transport::StreamBridge`] and [`pty::spawn_shell`] connect it to a byte
//! stream or a local shell.
//!
//! ## Quick Start
//!
//! ```
//! use gpui_terminal_host::geometry::{CellMetricsFit, PixelSize};
//! use gpui_terminal_host::host::{Scheduler, Surface, TimerHandle};
//! use gpui_terminal_host::terminal::AlacrittyFactory;
//! use gpui_terminal_host::{HandleRef, SessionConfig, TerminalAdapter, TerminalProps};
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! // Only reported viewport resizes schedule work, and this host reports none.
//! struct NoTimers;
//!
//! impl Scheduler for NoTimers {
//!     fn schedule(&self, _delay: Duration, _callback: Box<dyn FnOnce()>) -> TimerHandle {
//!         TimerHandle::new(())
//!     }
//! }
//!
//! let surface = Surface::new();
//! surface.set_bounds(Some(PixelSize::new(800.0, 480.0)));
//!
//! let config = SessionConfig::from_toml_str("rows = 0").unwrap();
//! let inner_ref = HandleRef::new();
//! let props = TerminalProps::new(config)
//!     .with_inner_ref(inner_ref.clone())
//!     .with_resize_callback(|columns, rows| println!("resize pty to {columns}x{rows}"));
//!
//! let fit = Rc::new(CellMetricsFit::new(surface.clone(), PixelSize::new(8.0, 16.0)));
//! let mut terminal =
//!     TerminalAdapter::new(props, surface, Rc::new(NoTimers), AlacrittyFactory, fit);
//! terminal.mount().unwrap();
//! assert_eq!(terminal.geometry().map(|g| (g.columns, g.rows)), Some((100, 30)));
//!
//! let handle = inner_ref.current().unwrap();
//! handle.on_data_received("$ ");
//! handle.on_connection_closed("");
//! ```
//!
//! ## GPUI
//!
//! With the `gpui` feature, [`view::TerminalView`] hosts the component in a GPUI
//! window, and the `gpui-terminal-host` binary runs the user's shell in it.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod event;
pub mod geometry;
pub mod handle;
pub mod host;
pub mod pty;
pub mod session;
pub mod terminal;
pub mod transport;
pub mod unload;

#[cfg(feature = "gpui")]
pub mod input;
#[cfg(feature = "gpui")]
pub mod view;

#[cfg(test)]
mod testing;

pub use adapter::{TerminalAdapter, TerminalProps};
pub use config::SessionConfig;
pub use engine::{Engine, EngineFactory};
pub use handle::{ControlHandle, HandleRef};
