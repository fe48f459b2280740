//! Lifecycle state for one logical request.
//!
//! # Design
//! A `RequestController` owns a `RequestState` (`Initial`, `Loading`,
//! `Ready`, `Error`) and two listener lists. `execute` is single-flight: while
//! a call is loading, further `execute` calls return `None` without invoking
//! the operation. Nothing is queued and nothing is rejected.
//!
//! The controller is built for a single-threaded cooperative executor
//! (`Rc` + `RefCell`, no locks). State is never borrowed across an `.await`,
//! and listeners run after the state update has been written, so an observer
//! always sees the state that matches the event it received.
//!
//! A failed call keeps the last successful `data` (last-known-good).

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    /// Never executed.
    #[default]
    Initial,
    Loading,
    Ready,
    Error,
}

/// Snapshot of a controller's state.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T, E> {
    pub status: RequestStatus,
    /// Most recent success payload; kept through later failures.
    pub data: Option<T>,
    /// Most recent failure; cleared when a call starts or succeeds.
    pub error: Option<E>,
}

impl<T, E> Default for RequestState<T, E> {
    fn default() -> Self {
        Self {
            status: RequestStatus::Initial,
            data: None,
            error: None,
        }
    }
}

type Operation<A, T, E> = Box<dyn Fn(A) -> LocalBoxFuture<'static, Result<T, E>>>;
type SuccessListener<T> = Rc<dyn Fn(&T)>;
type ErrorListener<E> = Rc<dyn Fn(&E)>;

struct Listeners<T, E> {
    next_id: u64,
    success: Vec<(u64, SuccessListener<T>)>,
    error: Vec<(u64, ErrorListener<E>)>,
}

struct Shared<T, E> {
    state: RefCell<RequestState<T, E>>,
    listeners: RefCell<Listeners<T, E>>,
}

impl<T, E> Shared<T, E> {
    fn new() -> Self {
        Self {
            state: RefCell::new(RequestState::default()),
            listeners: RefCell::new(Listeners {
                next_id: 0,
                success: Vec::new(),
                error: Vec::new(),
            }),
        }
    }

    fn next_id(&self) -> u64 {
        let mut listeners = self.listeners.borrow_mut();
        listeners.next_id += 1;
        listeners.next_id
    }

    // Listeners are snapshotted before dispatch: one added mid-dispatch waits
    // for the next event, one removed mid-dispatch is skipped.
    fn notify_success(&self, data: &T) {
        let snapshot = self.listeners.borrow().success.clone();
        for (id, listener) in snapshot {
            let live = self.listeners.borrow().success.iter().any(|(i, _)| *i == id);
            if live {
                listener(data);
            }
        }
    }

    fn notify_error(&self, error: &E) {
        let snapshot = self.listeners.borrow().error.clone();
        for (id, listener) in snapshot {
            let live = self.listeners.borrow().error.iter().any(|(i, _)| *i == id);
            if live {
                listener(error);
            }
        }
    }
}

/// Tracks one logical operation: its status, last data, last error, and the
/// listeners interested in its outcome.
pub struct RequestController<A, T, E> {
    shared: Rc<Shared<T, E>>,
    operation: Operation<A, T, E>,
}

impl<A, T, E> RequestController<A, T, E>
where
    A: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self {
            shared: Rc::new(Shared::new()),
            operation: Box::new(move |args: A| operation(args).boxed_local()),
        }
    }

    /// Run the operation unless one is already in flight.
    ///
    /// Returns `None` when a call is loading; the in-flight call is not
    /// affected. Otherwise returns the call's outcome after state has been
    /// updated and listeners have run.
    pub async fn execute(&self, args: A) -> Option<Result<T, E>> {
        let Some(in_flight) = InFlight::begin(&self.shared) else {
            debug!("request already in progress, execute ignored");
            return None;
        };
        let outcome = (self.operation)(args).await;
        in_flight.settle(&outcome);
        Some(outcome)
    }

    pub fn state(&self) -> RequestState<T, E> {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> RequestStatus {
        self.shared.state.borrow().status
    }

    pub fn is_loading(&self) -> bool {
        self.status() == RequestStatus::Loading
    }

    pub fn data(&self) -> Option<T> {
        self.shared.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<E> {
        self.shared.state.borrow().error.clone()
    }

    /// Read-only handle that does not keep the controller alive; safe to move
    /// into its own listeners.
    pub fn watch(&self) -> StateHandle<T, E> {
        StateHandle {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Call `listener` with the data of every later successful call, in
    /// subscription order.
    pub fn on_success<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = self.shared.next_id();
        let listener: SuccessListener<T> = Rc::new(listener);
        self.shared.listeners.borrow_mut().success.push((id, listener));

        let shared = Rc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.listeners.borrow_mut().success.retain(|(i, _)| *i != id);
            }
        })
    }

    /// Call `listener` with the error of every later failed call, in
    /// subscription order.
    pub fn on_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + 'static,
    {
        let id = self.shared.next_id();
        let listener: ErrorListener<E> = Rc::new(listener);
        self.shared.listeners.borrow_mut().error.push((id, listener));

        let shared = Rc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.listeners.borrow_mut().error.retain(|(i, _)| *i != id);
            }
        })
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        let listeners = self.shared.listeners.borrow();
        listeners.success.len() + listeners.error.len()
    }
}

impl<A, T: fmt::Debug, E: fmt::Debug> fmt::Debug for RequestController<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestController")
            .field("state", &*self.shared.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Marks the controller `Loading` for the lifetime of one call. If the call's
/// future is dropped before it settles, the previous status and error come
/// back so the guard cannot stay stuck in `Loading`.
struct InFlight<'a, T, E> {
    shared: &'a Shared<T, E>,
    previous: Option<(RequestStatus, Option<E>)>,
}

impl<'a, T: Clone, E: Clone> InFlight<'a, T, E> {
    fn begin(shared: &'a Shared<T, E>) -> Option<Self> {
        let mut state = shared.state.borrow_mut();
        if state.status == RequestStatus::Loading {
            return None;
        }
        let previous = (state.status, state.error.take());
        state.status = RequestStatus::Loading;
        Some(Self {
            shared,
            previous: Some(previous),
        })
    }

    fn settle(mut self, outcome: &Result<T, E>) {
        self.previous = None;
        {
            let mut state = self.shared.state.borrow_mut();
            match outcome {
                Ok(data) => {
                    state.status = RequestStatus::Ready;
                    state.data = Some(data.clone());
                    state.error = None;
                }
                Err(error) => {
                    state.status = RequestStatus::Error;
                    state.error = Some(error.clone());
                }
            }
        }
        match outcome {
            Ok(data) => self.shared.notify_success(data),
            Err(error) => self.shared.notify_error(error),
        }
    }
}

impl<T, E> Drop for InFlight<'_, T, E> {
    fn drop(&mut self) {
        if let Some((status, error)) = self.previous.take() {
            let mut state = self.shared.state.borrow_mut();
            state.status = status;
            state.error = error;
        }
    }
}

/// Weak view of a controller's state.
pub struct StateHandle<T, E> {
    shared: Weak<Shared<T, E>>,
}

impl<T: Clone, E: Clone> StateHandle<T, E> {
    /// `None` once the controller has been dropped.
    pub fn state(&self) -> Option<RequestState<T, E>> {
        self.shared.upgrade().map(|shared| {
            let snapshot = shared.state.borrow().clone();
            snapshot
        })
    }

    pub fn status(&self) -> Option<RequestStatus> {
        self.shared.upgrade().map(|shared| {
            let status = shared.state.borrow().status;
            status
        })
    }
}

impl<T, E> Clone for StateHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

/// Registration of one listener. Dropping it leaves the listener registered;
/// call `unsubscribe` or hand it to a `Scope`.
#[must_use = "dropping a Subscription does not remove the listener"]
pub struct Subscription {
    remove: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: RefCell::new(Some(Box::new(remove))),
        }
    }

    /// Remove the listener. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let remove = self.remove.borrow_mut().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    pub fn is_active(&self) -> bool {
        self.remove.borrow().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Owns the subscriptions of one consumer (a view, a session) and removes
/// them all when disposed or dropped.
#[derive(Debug, Default)]
pub struct Scope {
    subscriptions: RefCell<Vec<Subscription>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.borrow_mut().push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }

    pub fn dispose(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}
