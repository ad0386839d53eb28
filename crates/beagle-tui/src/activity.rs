//! Screens with a start/stop lifecycle and event subscriptions.

use std::fmt;
use std::sync::Arc;

use beagle_dispatch::{CentralDispatch, TaskFuture};
use parking_lot::Mutex;

use crate::AppResult;
use crate::application::{Application, SegueMode};
use crate::event::{Event, EventKind, EventSender};
use crate::ui::DisplayState;

/// A navigable screen.
///
/// Every method is called on the application's main queue, one at a time, so
/// implementations mutate their state without further locking.
pub trait Activity: Send {
    /// Name used in logs and by [`Application::active_activity`].
    fn name(&self) -> &str;

    /// Called when the activity becomes the top of the stack, including when
    /// it is resumed after the activity above it is popped. Subscriptions are
    /// made here; they are dropped when the activity stops.
    fn on_start(&mut self, ctx: &ActivityContext) -> AppResult<()>;

    /// Called when the activity is covered or removed.
    fn on_stop(&mut self, _ctx: &ActivityContext) {}

    /// Handle an event of a kind this activity subscribed to.
    fn on_event(&mut self, event: &Event, ctx: &ActivityContext) -> AppResult<()>;

    /// Regions to draw, top to bottom.
    fn views(&self) -> &DisplayState;
}

/// Shared handle to a stacked activity.
pub(crate) type ActivityHandle = Arc<Mutex<Box<dyn Activity>>>;

/// Identity of a subscriber. Stable across stop and restart of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityId(pub u64);

impl ActivityId {
    /// Owner of the application's own subscriptions.
    pub const APPLICATION: ActivityId = ActivityId(0);
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "activity-{}", self.0)
    }
}

/// What an activity may do with the application while it runs.
#[derive(Clone)]
pub struct ActivityContext {
    app: Application,
    id: ActivityId,
    handle: ActivityHandle,
}

impl ActivityContext {
    pub(crate) fn new(app: Application, id: ActivityId, handle: ActivityHandle) -> Self {
        Self { app, id, handle }
    }

    pub fn id(&self) -> ActivityId {
        self.id
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    /// Route events of `kind` to this activity's [`Activity::on_event`].
    pub fn subscribe(&self, kind: EventKind) {
        let id = self.id;
        let handle = Arc::clone(&self.handle);
        self.app.subscribe(kind, id, move |event, app| {
            let ctx = ActivityContext::new(app.clone(), id, Arc::clone(&handle));
            let mut activity = handle.lock();
            activity.on_event(event, &ctx)
        });
    }

    /// Navigate to `activity`. Runs after the current callback returns.
    pub fn segue_to(&self, activity: Box<dyn Activity>, mode: SegueMode) -> TaskFuture<()> {
        self.app.segue_to(activity, mode)
    }

    /// Close the top activity. Runs after the current callback returns.
    pub fn pop_activity(&self) -> TaskFuture<()> {
        self.app.pop_activity()
    }

    pub fn events(&self) -> EventSender {
        self.app.events()
    }

    pub fn dispatch(&self) -> &CentralDispatch {
        self.app.dispatch()
    }
}

impl fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityContext").field("id", &self.id).finish()
    }
}
