//! Demo host: the user's shell in a GPUI window.
//!
//! The shell runs in a PTY; its output is bridged into the terminal through the
//! control handle, typed input flows back through `on_data`, and every fit
//! resizes the PTY. Set `RUST_LOG=gpui_terminal_host=debug` to follow the
//! session lifecycle.
//!
//! A TOML file passed as the first argument overrides the session configuration.

use anyhow::{Context as _, Result};
use gpui::{AppContext, AsyncApp, Entity, WindowOptions};
use gpui_terminal_host::adapter::TerminalProps;
use gpui_terminal_host::pty::spawn_shell;
use gpui_terminal_host::transport::StreamBridge;
use gpui_terminal_host::view::TerminalView;
use gpui_terminal_host::SessionConfig;
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<SessionConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {path}"))?;
            SessionConfig::from_toml_str(&source)
        }
        // Fit the terminal to the window.
        None => Ok(SessionConfig {
            rows: None,
            ..Default::default()
        }),
    }
}

/// Feed shell output into the terminal until the shell exits.
async fn forward_output(
    mut bridge: StreamBridge,
    terminal: Entity<TerminalView>,
    cx: &mut AsyncApp,
) {
    while let Some(event) = bridge.next().await {
        let delivered = terminal.update(cx, |terminal, cx| {
            event.deliver(&terminal.handle());
            cx.notify();
        });
        if delivered.is_err() {
            break;
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config()?;
    let engine_options = config.engine_options();
    let shell = spawn_shell(engine_options.columns, engine_options.rows)?;

    let app = gpui::Application::new();
    app.run(move |cx| {
        cx.spawn(async move |cx| {
            let bridge = shell.bridge;
            let props = TerminalProps::new(config)
                .with_data_callback({
                    let sink = bridge.input_sink();
                    move |data| sink(data)
                })
                .with_resize_callback({
                    let resize = shell.resizer.callback();
                    move |columns, rows| resize(columns, rows)
                });
            // Keep the shell alive as long as the app.
            let process = shell.process;

            let mut terminal = None;
            cx.open_window(
                WindowOptions {
                    titlebar: Some(gpui::TitlebarOptions {
                        title: Some("gpui-terminal-host".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                |window, cx| {
                    let view = cx.new(|cx| TerminalView::new(props, window, cx));
                    view.read(cx).focus_handle().focus(window);
                    terminal = Some(view.clone());
                    view
                },
            )?;

            let terminal = terminal.context("terminal window was not created")?;
            terminal.update(cx, |terminal, _cx| terminal.mount())??;

            forward_output(bridge, terminal, cx).await;
            tracing::info!(pid = process.process_id(), "shell exited");
            drop(process);
            Ok::<_, anyhow::Error>(())
        })
        .detach();
    });

    Ok(())
}
