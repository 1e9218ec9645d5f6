//! Messages for the host UI.
//!
//! The crate never touches UI state itself. Everything user visible is sent
//! as a [`UiEvent`] over an unbounded channel, and the host drains the
//! receiver on its own UI thread. Sending never blocks, so events can be
//! emitted from any tokio task.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// System tray notification.
    Notify { message: String },
    /// Modal dialog, used when the player is not in game.
    Dialog {
        title: String,
        message: String,
        kind: MessageKind,
    },
    /// Game chat line, used while logged in to the game.
    ChatMessage { message: String, kind: MessageKind },
    CopyToClipboard { text: String },
    /// Login state changed; the host swaps its login/logout controls.
    SessionChanged { authenticated: bool },
}

#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiEvent>,
}

pub fn ui_channel() -> (UiHandle, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, rx)
}

impl UiHandle {
    /// Emit an event. A closed UI channel is logged and otherwise ignored.
    pub fn emit(&self, event: UiEvent) -> bool {
        log::debug!("UI event: {:?}", event);
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to emit UI event (non-critical): {:?}", e.0);
                false
            }
        }
    }

    pub fn notify(&self, message: &str) -> bool {
        self.emit(UiEvent::Notify {
            message: message.to_string(),
        })
    }

    pub fn dialog(&self, title: &str, message: &str, kind: MessageKind) -> bool {
        self.emit(UiEvent::Dialog {
            title: title.to_string(),
            message: message.to_string(),
            kind,
        })
    }

    pub fn chat(&self, message: &str, kind: MessageKind) -> bool {
        self.emit(UiEvent::ChatMessage {
            message: message.to_string(),
            kind,
        })
    }

    pub fn copy_to_clipboard(&self, text: &str) -> bool {
        self.emit(UiEvent::CopyToClipboard {
            text: text.to_string(),
        })
    }

    pub fn session_changed(&self, authenticated: bool) -> bool {
        self.emit(UiEvent::SessionChanged { authenticated })
    }
}
