//! Terminal input reader.

use std::time::Duration;

use beagle_dispatch::TaskFuture;
use crossterm::event::{self as term, Event as TermEvent, KeyEventKind};
use tracing::debug;

use crate::AppResult;
use crate::application::Application;
use crate::event::{Event, EventSender, Message, StopSignal, is_interrupt};

/// How long one poll waits before re-checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read terminal input on its own thread until the application stops.
///
/// Key presses become [`Event::Key`]; Ctrl-C posts the stop sentinel instead.
pub fn spawn_input_reader(app: &Application) -> TaskFuture<()> {
    let events = app.events();
    let shutdown = app.shutdown_signal();
    app.dispatch()
        .future(move || read_input(&events, &shutdown))
}

fn read_input(events: &EventSender, shutdown: &TaskFuture<StopSignal>) -> AppResult<()> {
    while !shutdown.is_done() {
        if !term::poll(POLL_INTERVAL)? {
            continue;
        }
        let delivered = match translate(term::read()?) {
            Some(Message::Event(event)) => events.post(event),
            Some(Message::Stop(signal)) => events.stop(signal),
            None => true,
        };
        if !delivered {
            break;
        }
    }
    debug!("input reader stopped");
    Ok(())
}

/// Map a terminal event to an application message.
pub(crate) fn translate(event: TermEvent) -> Option<Message> {
    match event {
        TermEvent::Key(key) if key.kind == KeyEventKind::Press => {
            if is_interrupt(&key) {
                Some(Message::Stop(StopSignal::normal()))
            } else {
                Some(Message::Event(Event::Key(key)))
            }
        }
        TermEvent::Resize(width, height) => Some(Message::Event(Event::Resize(width, height))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventState, KeyModifiers};

    #[test]
    fn test_translate_keys() {
        let up = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert!(matches!(
            translate(TermEvent::Key(up)),
            Some(Message::Event(Event::Key(k))) if k.code == KeyCode::Up
        ));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(
            translate(TermEvent::Key(ctrl_c)),
            Some(Message::Stop(signal)) if !signal.is_fatal()
        ));

        let release = KeyEvent {
            code: KeyCode::Up,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert!(translate(TermEvent::Key(release)).is_none());
    }

    #[test]
    fn test_translate_resize() {
        assert!(matches!(
            translate(TermEvent::Resize(80, 24)),
            Some(Message::Event(Event::Resize(80, 24)))
        ));
        assert!(translate(TermEvent::FocusGained).is_none());
    }
}
