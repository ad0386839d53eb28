//! Event bus, main queue and activity stack.
//!
//! Producers on any thread post events to a channel. A single event loop
//! thread pops them and schedules each subscriber callback onto the serial
//! main queue, which is the only place activity state changes. Navigation
//! runs on the same queue, so it is ordered with respect to event handling.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use beagle_dispatch::{CentralDispatch, Completer, DispatchQueue, TaskError, TaskFuture};
use color_eyre::eyre::{bail, eyre};
use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use parking_lot::Mutex;
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::AppResult;
use crate::activities::ShowExceptionActivity;
use crate::activity::{Activity, ActivityContext, ActivityHandle, ActivityId};
use crate::event::{Event, EventKind, EventSender, Message, StopSignal};
use crate::theme::Theme;
use crate::ui::Screen;

/// Lifecycle of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AppStatus {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

/// How [`Application::segue_to`] treats the current top activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegueMode {
    /// Keep it on the stack beneath the new activity.
    Push,
    /// Discard it.
    Replace,
}

type Callback = Arc<dyn Fn(&Event, &Application) -> AppResult<()> + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    owner: ActivityId,
    callback: Callback,
}

#[derive(Clone)]
struct StackEntry {
    id: ActivityId,
    name: String,
    handle: ActivityHandle,
}

struct Inner {
    dispatch: CentralDispatch,
    main_queue: DispatchQueue,
    sender: EventSender,
    receiver: Mutex<Option<Receiver<Message>>>,
    completer: Mutex<Option<Completer<StopSignal>>>,
    shutdown: TaskFuture<StopSignal>,
    status: Mutex<AppStatus>,
    stack: Mutex<Vec<StackEntry>>,
    subscribers: Mutex<IndexMap<EventKind, Vec<Subscriber>>>,
    last_exception: Mutex<Option<TaskError>>,
    screen: Mutex<Box<dyn Screen + Send>>,
    theme: Theme,
    next_id: AtomicU64,
}

/// The running program: event loop, main queue and activity stack.
///
/// Cloning shares the same application.
#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

impl Application {
    /// Create an application drawing on `screen`.
    ///
    /// Installs an exception policy on `dispatch` that turns every task
    /// failure into an [`Event::ExceptionOccurred`].
    pub fn new<S>(dispatch: &CentralDispatch, screen: S) -> AppResult<Self>
    where
        S: Screen + Send + 'static,
    {
        let main_queue = dispatch
            .create_serial_queue("main")
            .map_err(|e| eyre!("failed to create main queue: {e}"))?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let sender = EventSender::new(tx);
        let (completer, shutdown) = TaskFuture::pending();

        let policy_sender = sender.clone();
        dispatch.set_exception_handler(move |queue, err| {
            error!(queue, "task failed: {}", err.details());
            policy_sender.post(Event::ExceptionOccurred {
                queue: queue.to_string(),
                error: err.clone(),
            });
        });

        Ok(Self {
            inner: Arc::new(Inner {
                dispatch: dispatch.clone(),
                main_queue,
                sender,
                receiver: Mutex::new(Some(rx)),
                completer: Mutex::new(Some(completer)),
                shutdown,
                status: Mutex::new(AppStatus::NotStarted),
                stack: Mutex::new(Vec::new()),
                subscribers: Mutex::new(IndexMap::new()),
                last_exception: Mutex::new(None),
                screen: Mutex::new(Box::new(screen)),
                theme: Theme::default(),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Start the event loop and show `initial`.
    ///
    /// Returns the shutdown future, which resolves with the stop signal once
    /// the event loop has exited.
    pub fn start(&self, initial: Box<dyn Activity>) -> AppResult<TaskFuture<StopSignal>> {
        let receiver = self.inner.receiver.lock().take();
        let completer = self.inner.completer.lock().take();
        let (Some(receiver), Some(completer)) = (receiver, completer) else {
            bail!("application was already started");
        };

        self.set_status(AppStatus::Running);
        self.subscribe(
            EventKind::ExceptionOccurred,
            ActivityId::APPLICATION,
            |event, app| match event {
                Event::ExceptionOccurred { queue, error } => app.handle_exception(queue, error),
                _ => Ok(()),
            },
        );
        // Resizes only need the redraw that follows every callback.
        self.subscribe(EventKind::Resize, ActivityId::APPLICATION, |_, _| Ok(()));

        let app = self.clone();
        let event_loop = self.inner.dispatch.future(move || {
            let signal = app.run_event_loop(receiver);
            completer.fulfill(signal);
            Ok(())
        });
        if event_loop.is_failed() {
            bail!("failed to start the event loop");
        }

        info!(activity = initial.name(), "application started");
        self.segue_to(initial, SegueMode::Push);
        Ok(self.shutdown_signal())
    }

    /// Current lifecycle state.
    pub fn status(&self) -> AppStatus {
        *self.inner.status.lock()
    }

    fn set_status(&self, status: AppStatus) {
        debug!(%status, "application status");
        *self.inner.status.lock() = status;
    }

    /// Name of the top activity.
    pub fn active_activity(&self) -> Option<String> {
        self.inner.stack.lock().last().map(|entry| entry.name.clone())
    }

    /// Number of activities on the stack.
    pub fn stack_depth(&self) -> usize {
        self.inner.stack.lock().len()
    }

    /// The failure currently shown on the exception screen.
    pub fn last_exception(&self) -> Option<TaskError> {
        self.inner.last_exception.lock().clone()
    }

    /// Allow the next failure to be shown instead of ending the program.
    pub fn clear_last_exception(&self) {
        self.inner.last_exception.lock().take();
    }

    /// Future resolving with the stop signal when the event loop exits.
    pub fn shutdown_signal(&self) -> TaskFuture<StopSignal> {
        self.inner.shutdown.clone()
    }

    pub fn events(&self) -> EventSender {
        self.inner.sender.clone()
    }

    /// Queue an event for dispatch.
    pub fn post(&self, event: Event) -> bool {
        self.inner.sender.post(event)
    }

    /// Queue the stop sentinel.
    pub fn post_stop(&self, signal: StopSignal) -> bool {
        self.inner.sender.stop(signal)
    }

    pub fn dispatch(&self) -> &CentralDispatch {
        &self.inner.dispatch
    }

    /// The serial queue every callback and navigation runs on.
    pub fn main_queue(&self) -> &DispatchQueue {
        &self.inner.main_queue
    }

    /// Register `callback` for events of `kind`.
    ///
    /// An owner has at most one callback per kind; subscribing again replaces it.
    pub fn subscribe<F>(&self, kind: EventKind, owner: ActivityId, callback: F)
    where
        F: Fn(&Event, &Application) -> AppResult<()> + Send + Sync + 'static,
    {
        let mut subscribers = self.inner.subscribers.lock();
        let entries = subscribers.entry(kind).or_default();
        entries.retain(|s| s.owner != owner);
        entries.push(Subscriber {
            owner,
            callback: Arc::new(callback),
        });
        debug!(%kind, %owner, "subscribed");
    }

    /// Drop every subscription of `owner`. Unknown owners are ignored.
    pub fn unsubscribe_all(&self, owner: ActivityId) {
        for entries in self.inner.subscribers.lock().values_mut() {
            entries.retain(|s| s.owner != owner);
        }
    }

    /// Event kinds `owner` is subscribed to.
    pub fn subscriptions_of(&self, owner: ActivityId) -> Vec<EventKind> {
        self.inner
            .subscribers
            .lock()
            .iter()
            .filter(|(_, entries)| entries.iter().any(|s| s.owner == owner))
            .map(|(kind, _)| *kind)
            .collect()
    }

    fn is_subscribed(&self, kind: EventKind, owner: ActivityId) -> bool {
        self.inner
            .subscribers
            .lock()
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|s| s.owner == owner))
    }

    /// Navigate to `activity` on the main queue.
    pub fn segue_to(&self, activity: Box<dyn Activity>, mode: SegueMode) -> TaskFuture<()> {
        let app = self.clone();
        self.inner
            .main_queue
            .submit_async(move || app.perform_segue(activity, mode))
    }

    /// Close the top activity on the main queue.
    ///
    /// Closing the last activity posts the stop sentinel.
    pub fn pop_activity(&self) -> TaskFuture<()> {
        let app = self.clone();
        self.inner.main_queue.submit_async(move || app.perform_pop())
    }

    /// Redraw the top activity. Must run on the main queue.
    pub(crate) fn refresh_screen(&self) -> AppResult<()> {
        let top = self.inner.stack.lock().last().cloned();
        let Some(top) = top else {
            return Ok(());
        };
        let activity = top.handle.lock();
        self.inner
            .screen
            .lock()
            .render_views(activity.views(), &self.inner.theme)
    }

    fn context(&self, entry: &StackEntry) -> ActivityContext {
        ActivityContext::new(self.clone(), entry.id, Arc::clone(&entry.handle))
    }

    fn start_entry(&self, entry: &StackEntry) -> AppResult<()> {
        debug!(activity = %entry.name, id = %entry.id, "starting activity");
        let ctx = self.context(entry);
        entry.handle.lock().on_start(&ctx)
    }

    fn stop_entry(&self, entry: &StackEntry) {
        debug!(activity = %entry.name, id = %entry.id, "stopping activity");
        self.unsubscribe_all(entry.id);
        let ctx = self.context(entry);
        entry.handle.lock().on_stop(&ctx);
    }

    fn perform_segue(&self, activity: Box<dyn Activity>, mode: SegueMode) -> AppResult<()> {
        let outgoing = self.inner.stack.lock().last().cloned();
        if let Some(outgoing) = outgoing {
            self.stop_entry(&outgoing);
            if mode == SegueMode::Replace {
                self.inner.stack.lock().pop();
            }
        }

        let entry = StackEntry {
            id: ActivityId(self.inner.next_id.fetch_add(1, Ordering::Relaxed)),
            name: activity.name().to_string(),
            handle: Arc::new(Mutex::new(activity)),
        };
        info!(activity = %entry.name, ?mode, "segue");
        self.inner.stack.lock().push(entry.clone());

        self.start_entry(&entry)?;
        self.refresh_screen()
    }

    fn perform_pop(&self) -> AppResult<()> {
        let top = self.inner.stack.lock().last().cloned();
        let Some(top) = top else {
            return Ok(());
        };
        self.stop_entry(&top);
        self.inner.stack.lock().pop();
        info!(activity = %top.name, "activity closed");

        let next = self.inner.stack.lock().last().cloned();
        match next {
            Some(next) => {
                self.start_entry(&next)?;
                self.refresh_screen()
            }
            None => {
                self.post_stop(StopSignal::normal());
                Ok(())
            }
        }
    }

    /// Show the first failure on the exception screen; a failure while one
    /// is already shown ends the program with that failure.
    fn handle_exception(&self, queue: &str, error: &TaskError) -> AppResult<()> {
        {
            let mut last = self.inner.last_exception.lock();
            if last.is_some() {
                error!(queue, "failure while showing an exception, shutting down");
                self.post_stop(StopSignal::fatal(error.clone()));
                return Ok(());
            }
            *last = Some(error.clone());
        }

        self.segue_to(
            Box::new(ShowExceptionActivity::new(queue, error)),
            SegueMode::Push,
        );
        Ok(())
    }

    fn run_event_loop(&self, receiver: Receiver<Message>) -> StopSignal {
        let signal = loop {
            match receiver.recv() {
                Ok(Message::Event(event)) => self.dispatch_event(event),
                Ok(Message::Stop(signal)) => break signal,
                Err(_) => break StopSignal::fatal(TaskError::msg("event channel closed")),
            }
        };

        self.set_status(AppStatus::ShuttingDown);
        let app = self.clone();
        if let Err(err) = self.inner.main_queue.await_result(move || {
            let top = app.inner.stack.lock().last().cloned();
            if let Some(top) = top {
                app.stop_entry(&top);
            }
            Ok(())
        }) {
            warn!("failed to stop the active screen: {err}");
        }
        self.set_status(AppStatus::Stopped);

        info!(fatal = signal.is_fatal(), "application stopped");
        signal
    }

    /// Schedule every subscriber of the event's kind onto the main queue.
    fn dispatch_event(&self, event: Event) {
        let kind = event.kind();
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        if subscribers.is_empty() {
            debug!(%kind, "event has no subscribers");
            return;
        }

        for subscriber in subscribers {
            let app = self.clone();
            let event = event.clone();
            self.inner.main_queue.submit_async(move || {
                // The owner may have stopped after this event was dispatched.
                if !app.is_subscribed(kind, subscriber.owner) {
                    return Ok(());
                }
                (subscriber.callback)(&event, &app)?;
                if app.status() == AppStatus::Running {
                    app.refresh_screen()?;
                }
                Ok(())
            });
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("status", &self.status())
            .field("active", &self.active_activity())
            .field("stack_depth", &self.stack_depth())
            .finish()
    }
}
