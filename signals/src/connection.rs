use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    signal::{Signal, SignalId},
    traits::ScopedSignal,
};

static NEXT_SCOPE_ID: AtomicUsize = AtomicUsize::new(0);

/// A unique identifier for a [`ScopedConnection`]. Never reused within a process.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "scope#{}", self.0) }
}

/// Lifetime anchor for slot registrations.
///
/// Connect a slot with [`Signal::connect_scoped`] and the entry lives only as long as this scope:
/// dropping the scope removes every entry it manages, on every signal. Dropping a signal first is
/// fine too; the signal tells the scope to forget it.
///
/// Embed one in a subscriber struct so that dropping the subscriber detaches its subscriptions.
pub struct ScopedConnection(Rc<Inner>);

pub(crate) struct Inner {
    id: ScopeId,
    // One back-reference per managed entry, so the same signal may appear more than once
    signals: RefCell<Vec<Tracked>>,
}

struct Tracked {
    id: SignalId,
    signal: Weak<dyn ScopedSignal>,
}

/// The back-reference a signal entry keeps to the scope managing it.
#[derive(Clone)]
pub(crate) struct ScopeRef {
    id: ScopeId,
    inner: Weak<Inner>,
}

impl ScopeRef {
    pub(crate) fn id(&self) -> ScopeId { self.id }

    /// Tell the scope one entry on `signal` is gone
    pub(crate) fn disconnected(&self, signal: SignalId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.disconnected(signal);
        }
    }
}

impl Inner {
    fn pop_front(&self) -> Option<Tracked> {
        let mut signals = self.signals.borrow_mut();
        if signals.is_empty() { None } else { Some(signals.remove(0)) }
    }

    fn disconnected(&self, signal: SignalId) {
        let mut signals = self.signals.borrow_mut();
        if let Some(index) = signals.iter().position(|tracked| tracked.id == signal) {
            signals.remove(index);
            tracing::debug!(scope = %self.id, %signal, "scope forgot signal");
        }
    }
}

impl Default for ScopedConnection {
    fn default() -> Self { Self::new() }
}

impl ScopedConnection {
    pub fn new() -> Self {
        let id = ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed));
        Self(Rc::new(Inner { id, signals: RefCell::new(Vec::new()) }))
    }

    pub fn id(&self) -> ScopeId { self.0.id }

    /// Number of back-references held, one per managed entry
    pub fn len(&self) -> usize { self.0.signals.borrow().len() }

    pub fn is_empty(&self) -> bool { self.0.signals.borrow().is_empty() }

    /// Whether this scope manages at least one entry on `signal`
    pub fn is_tracking<A, R>(&self, signal: &Signal<A, R>) -> bool {
        let id = signal.id();
        self.0.signals.borrow().iter().any(|tracked| tracked.id == id)
    }

    /// Detach from every tracked signal without disconnecting anything.
    ///
    /// The slots this scope managed stay connected and are no longer managed by any scope.
    pub fn release(&self) {
        let tracked = std::mem::take(&mut *self.0.signals.borrow_mut());
        tracing::debug!(scope = %self.0.id, signals = tracked.len(), "release");
        for tracked in tracked {
            if let Some(signal) = tracked.signal.upgrade() {
                signal.release_scope(self.0.id);
            }
        }
    }

    pub(crate) fn reference(&self) -> ScopeRef { ScopeRef { id: self.0.id, inner: Rc::downgrade(&self.0) } }

    /// Record a managed entry on `signal`. Called by the signal once the entry is in place.
    pub(crate) fn connected(&self, signal: &Rc<dyn ScopedSignal>) {
        let id = signal.signal_id();
        self.0.signals.borrow_mut().push(Tracked { id, signal: Rc::downgrade(signal) });
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        tracing::debug!(scope = %self.0.id, signals = self.len(), "scope dropped");
        // Pop one back-reference at a time with no borrow held: disconnecting may drop slots that own
        // other signals tracked here, and those forget themselves through `disconnected` as they go
        while let Some(tracked) = self.0.pop_front() {
            match tracked.signal.upgrade() {
                Some(signal) => signal.disconnect_scope(self.0.id),
                None => tracing::warn!(scope = %self.0.id, signal = %tracked.id, "dangling back-reference to a dropped signal"),
            }
        }
    }
}

impl std::fmt::Debug for ScopedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedConnection").field("id", &self.0.id).field("signals", &self.len()).finish()
    }
}
