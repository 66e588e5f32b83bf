//! Engine events.
//!
//! An engine reports what happens inside it through a [`flume`] channel of
//! [`TerminalEvent`]s. The session drains the channel and forwards each event to
//! the callback the host wired for it.
//!
//! For the alacritty-backed engine, [`EngineEventProxy`] implements alacritty's
//! [`EventListener`] and translates the events the adapter cares about:
//!
//! | Alacritty Event | TerminalEvent | Description |
//! |-----------------|---------------|-------------|
//! | `Event::PtyWrite(_)` | `Input(String)` | Reply generated by the terminal (e.g. DSR) |
//! | `Event::Title(_)` | `Title(String)` | Title escape sequence (OSC 0/2) |
//! | `Event::ResetTitle` | `Title("")` | Reset to empty title |
//!
//! Everything else (bell, clipboard, cursor blinking, child exit) is dropped:
//! those concerns belong to the host or the transport.
//!
//! [`EventListener`]: alacritty_terminal::event::EventListener

use alacritty_terminal::event::{Event, EventListener};

/// Sending half of an engine's event channel.
pub type EventSender = flume::Sender<TerminalEvent>;

/// Receiving half of an engine's event channel.
pub type EventReceiver = flume::Receiver<TerminalEvent>;

/// Something the engine wants the host to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// A unit of input produced inside the terminal: typed keys, or a reply the
    /// terminal generates for the remote side. Forwarded verbatim to `on_data`.
    Input(String),

    /// The terminal title changed.
    Title(String),
}

/// Bridges alacritty's [`EventListener`] to the engine event channel.
pub struct EngineEventProxy {
    tx: EventSender,
}

impl EngineEventProxy {
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    fn send(&self, event: TerminalEvent) {
        // The receiver is gone once the session has been dropped.
        let _ = self.tx.send(event);
    }
}

impl EventListener for EngineEventProxy {
    fn send_event(&self, event: Event) {
        match event {
            Event::PtyWrite(text) => self.send(TerminalEvent::Input(text)),
            Event::Title(title) => self.send(TerminalEvent::Title(title)),
            Event::ResetTitle => self.send(TerminalEvent::Title(String::new())),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_write_becomes_input() {
        let (tx, rx) = flume::unbounded();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::PtyWrite("\x1b[0n".to_string()));

        assert_eq!(rx.try_recv().unwrap(), TerminalEvent::Input("\x1b[0n".into()));
    }

    #[test]
    fn test_title_event() {
        let (tx, rx) = flume::unbounded();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::Title("Test Title".to_string()));

        match rx.try_recv().unwrap() {
            TerminalEvent::Title(title) => assert_eq!(title, "Test Title"),
            other => panic!("Expected Title event, got {other:?}"),
        }
    }

    #[test]
    fn test_reset_title_event() {
        let (tx, rx) = flume::unbounded();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::ResetTitle);

        assert_eq!(rx.try_recv().unwrap(), TerminalEvent::Title(String::new()));
    }

    #[test]
    fn test_ignored_events() {
        let (tx, rx) = flume::unbounded();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::Bell);
        proxy.send_event(Event::MouseCursorDirty);
        proxy.send_event(Event::CursorBlinkingChange);
        proxy.send_event(Event::Wakeup);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_channel() {
        let (tx, rx) = flume::unbounded();
        let proxy = EngineEventProxy::new(tx);
        drop(rx);

        proxy.send_event(Event::Title("ignored".into()));
    }
}
