//! Application events and key bindings.

use std::path::PathBuf;

use beagle_dispatch::TaskError;
use beagle_scan::ScanSummary;
use crossbeam_channel::Sender;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use strum::{Display, EnumDiscriminants, EnumIter};

/// Event delivered to subscribers on the main queue.
#[derive(Debug, Clone, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash, Display))]
pub enum Event {
    /// A key was pressed.
    Key(KeyEvent),
    /// The terminal was resized.
    Resize(u16, u16),
    /// Periodic refresh while an activity is visible.
    Tick,
    /// A folder scan started.
    ScanStarted,
    /// A folder scan merged its last folder.
    ScanComplete(ScanSummary),
    /// A dispatched task failed.
    ExceptionOccurred { queue: String, error: TaskError },
    /// A folder menu entry was chosen.
    Button { action: MenuAction, path: PathBuf },
}

/// Entries of the folder menu, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum MenuAction {
    #[strum(to_string = "open in explorer")]
    OpenInExplorer,
    #[strum(to_string = "delete")]
    Delete,
}

impl Event {
    /// Kind used to route this event to subscribers.
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}

/// Terminal value of the event loop.
///
/// A signal carrying an error ends the program with a failure.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    pub error: Option<TaskError>,
}

impl StopSignal {
    /// Normal shutdown.
    pub fn normal() -> Self {
        Self { error: None }
    }

    /// Shutdown caused by an unrecoverable failure.
    pub fn fatal(error: TaskError) -> Self {
        Self { error: Some(error) }
    }

    /// Whether this signal carries an error.
    pub fn is_fatal(&self) -> bool {
        self.error.is_some()
    }
}

/// Item on the application's event queue.
#[derive(Debug, Clone)]
pub(crate) enum Message {
    Event(Event),
    Stop(StopSignal),
}

/// Producer handle for the application's event queue.
///
/// Cheap to clone and usable from any thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Message>,
}

impl EventSender {
    pub(crate) fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Queue an event. Returns `false` once the application is gone.
    pub fn post(&self, event: Event) -> bool {
        self.tx.send(Message::Event(event)).is_ok()
    }

    /// Queue the stop sentinel. Events queued after it are never delivered.
    pub fn stop(&self, signal: StopSignal) -> bool {
        self.tx.send(Message::Stop(signal)).is_ok()
    }
}

/// Key action that can be performed in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    /// Open or close the folder menu.
    ToggleMenu,
    /// Choose the highlighted menu entry, or open the menu.
    Select,
    /// Show one level less of the folder tree.
    DepthDecrease,
    /// Show one level more of the folder tree.
    DepthIncrease,
    ShowHelp,
    /// Leave the current screen.
    Back,
    Quit,
    /// Raise a deliberate failure to exercise exception recovery.
    TestFault,
    None,
}

impl KeyAction {
    /// Convert a key event to an action.
    pub fn from_key_event(event: KeyEvent) -> Self {
        match (event.code, event.modifiers) {
            (KeyCode::Up, _) => KeyAction::MoveUp,
            (KeyCode::Down, _) => KeyAction::MoveDown,
            (KeyCode::Left, _) => KeyAction::MoveLeft,
            (KeyCode::Right, _) => KeyAction::MoveRight,
            (KeyCode::Char(' '), _) => KeyAction::ToggleMenu,
            (KeyCode::Enter, _) => KeyAction::Select,
            (KeyCode::Char('['), _) => KeyAction::DepthDecrease,
            (KeyCode::Char(']'), _) => KeyAction::DepthIncrease,
            (KeyCode::Char('h'), KeyModifiers::NONE) => KeyAction::ShowHelp,
            (KeyCode::Esc, _) => KeyAction::Back,
            (KeyCode::Char('q'), KeyModifiers::NONE) => KeyAction::Quit,
            (KeyCode::Char('e'), KeyModifiers::NONE) => KeyAction::TestFault,
            _ => KeyAction::None,
        }
    }
}

/// Whether a key is the reserved interrupt (Ctrl-C).
pub fn is_interrupt(event: &KeyEvent) -> bool {
    event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL)
}

/// Short human-readable rendering of a key, e.g. `Ctrl-x` or `Up`.
pub fn describe_key(event: &KeyEvent) -> String {
    let key = match event.code {
        KeyCode::Char(c) => c.to_string(),
        other => format!("{other:?}"),
    };
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        format!("Ctrl-{key}")
    } else if event.modifiers.contains(KeyModifiers::ALT) {
        format!("Alt-{key}")
    } else {
        key
    }
}

/// Key binding for display in help.
pub struct KeyBinding {
    pub keys: &'static str,
    pub description: &'static str,
}

/// Key bindings of the folder scan screen.
pub fn get_key_bindings() -> Vec<KeyBinding> {
    vec![
        KeyBinding { keys: "Up/Down", description: "Navigate around" },
        KeyBinding { keys: "Space/Enter", description: "Open the folder menu" },
        KeyBinding { keys: "Left/Right", description: "Choose a menu entry" },
        KeyBinding { keys: "'['", description: "Collapse tree up one level" },
        KeyBinding { keys: "']'", description: "Expand tree one level lower" },
        KeyBinding { keys: "'h'", description: "Show this help" },
        KeyBinding { keys: "'e'", description: "Raise a test exception" },
        KeyBinding { keys: "Esc", description: "Return to the previous screen" },
        KeyBinding { keys: "'q'", description: "Close the current screen" },
        KeyBinding { keys: "Ctrl-C", description: "Exit the program" },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::Tick.kind(), EventKind::Tick);
        assert_eq!(Event::Key(key(KeyCode::Up)).kind(), EventKind::Key);
        assert_eq!(EventKind::ScanComplete.to_string(), "ScanComplete");
    }

    #[test]
    fn test_menu_action_labels() {
        use strum::IntoEnumIterator;

        let labels: Vec<_> = MenuAction::iter().map(|a| a.to_string()).collect();
        assert_eq!(labels, vec!["open in explorer", "delete"]);

        let event = Event::Button {
            action: MenuAction::Delete,
            path: PathBuf::from("/tmp"),
        };
        assert_eq!(event.kind(), EventKind::Button);
    }

    #[test]
    fn test_key_actions() {
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Up)), KeyAction::MoveUp);
        assert_eq!(
            KeyAction::from_key_event(key(KeyCode::Char('['))),
            KeyAction::DepthDecrease
        );
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Esc)), KeyAction::Back);
        assert_eq!(
            KeyAction::from_key_event(key(KeyCode::Char(' '))),
            KeyAction::ToggleMenu
        );
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Enter)), KeyAction::Select);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Right)), KeyAction::MoveRight);
        assert_eq!(
            KeyAction::from_key_event(key(KeyCode::Char('z'))),
            KeyAction::None
        );
    }

    #[test]
    fn test_interrupt_and_description() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(is_interrupt(&ctrl_c));
        assert!(!is_interrupt(&key(KeyCode::Char('c'))));
        assert_eq!(describe_key(&ctrl_c), "Ctrl-c");
        assert_eq!(describe_key(&key(KeyCode::Char('x'))), "x");
    }

    #[test]
    fn test_event_sender_after_drop() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sender = EventSender::new(tx);
        assert!(sender.post(Event::Tick));
        drop(rx);
        assert!(!sender.post(Event::Tick));
        assert!(!sender.stop(StopSignal::normal()));
    }
}
