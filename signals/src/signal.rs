use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    connection::{ScopeId, ScopeRef, ScopedConnection},
    delegate::{Delegate, DelegateKind},
    error::DelegateError,
    traits::ScopedSignal,
};

static NEXT_SIGNAL_ID: AtomicUsize = AtomicUsize::new(0);

/// A unique identifier for a [`Signal`]. Never reused within a process, so a stale id is a lookup
/// miss rather than a reference to some other signal.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SignalId(usize);

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "signal#{}", self.0) }
}

/// An ordered broadcast point. Slots are invoked synchronously, in registration order.
///
/// Cloning a signal yields a new, empty signal: connections are never copied, because the scopes
/// managing them would not know about the copy.
pub struct Signal<A, R = ()>(Rc<Inner<A, R>>);

struct Inner<A, R> {
    id: SignalId,
    entries: RefCell<Vec<Entry<A, R>>>,
}

/// One slot plus the scope managing it, if any
struct Entry<A, R> {
    slot: Delegate<A, R>,
    scope: Option<ScopeRef>,
    // Shared with in-flight emissions so a removal is seen by an emission already under way
    live: Rc<Cell<bool>>,
}

impl<A, R> Entry<A, R> {
    fn new(slot: Delegate<A, R>, scope: Option<ScopeRef>) -> Self { Self { slot, scope, live: Rc::new(Cell::new(true)) } }

    fn is_managed_by(&self, scope: ScopeId) -> bool { self.scope.as_ref().is_some_and(|s| s.id() == scope) }

    /// Mark the entry dead and tell its scope, if any
    fn retire(&self, signal: SignalId) {
        self.live.set(false);
        if let Some(scope) = &self.scope {
            scope.disconnected(signal);
        }
    }
}

impl<A, R> Default for Signal<A, R> {
    fn default() -> Self { Self::new() }
}

impl<A, R> Signal<A, R> {
    pub fn new() -> Self {
        let id = SignalId(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed));
        Self(Rc::new(Inner { id, entries: RefCell::new(Vec::new()) }))
    }

    pub fn id(&self) -> SignalId { self.0.id }

    pub fn len(&self) -> usize { self.0.entries.borrow().len() }

    pub fn is_empty(&self) -> bool { self.0.entries.borrow().is_empty() }

    /// Whether `slot` is registered at least once
    pub fn contains(&self, slot: &Delegate<A, R>) -> bool { self.0.entries.borrow().iter().any(|entry| &entry.slot == slot) }

    /// Register an unmanaged slot. The same slot may be registered more than once.
    pub fn connect(&self, slot: Delegate<A, R>) {
        tracing::debug!(signal = %self.0.id, kind = %slot.kind(), "connect");
        self.0.entries.borrow_mut().push(Entry::new(slot, None));
    }

    /// Remove the first entry whose slot equals `slot`. Returns false if there was none.
    pub fn disconnect(&self, slot: &Delegate<A, R>) -> bool { self.0.disconnect(slot) }

    /// Remove every entry, notifying the scopes of managed ones.
    pub fn disconnect_all(&self) { self.0.disconnect_all() }

    /// Remove entries whose bound object has been dropped. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let removed = self.0.take_where(|entry| entry.slot.is_expired());
        for entry in &removed {
            entry.retire(self.0.id);
        }
        if !removed.is_empty() {
            tracing::debug!(signal = %self.0.id, removed = removed.len(), "pruned expired slots");
        }
        removed.len()
    }
}

impl<A: 'static, R: 'static> Signal<A, R> {
    /// Register a slot whose lifetime is tied to `scope`.
    ///
    /// Dropping `scope` removes the entry; dropping this signal makes `scope` forget it.
    pub fn connect_scoped(&self, slot: Delegate<A, R>, scope: &ScopedConnection) {
        tracing::debug!(signal = %self.0.id, kind = %slot.kind(), scope = %scope.id(), "connect");
        self.0.entries.borrow_mut().push(Entry::new(slot, Some(scope.reference())));
        let handle: Rc<dyn ScopedSignal> = self.0.clone();
        scope.connected(&handle);
    }
}

impl<A: Clone, R> Signal<A, R> {
    /// Invoke every slot in registration order, discarding their return values.
    ///
    /// Slots connected during the emission are first invoked by the next one. Slots disconnected
    /// during the emission are skipped if they have not been reached yet. The first
    /// [`DelegateError`] aborts the remaining deliveries, as does a panicking slot.
    pub fn emit(&self, args: A) -> Result<(), DelegateError> { self.0.emit(args) }
}

impl<A: Clone + 'static, R: 'static> Signal<A, R> {
    /// A delegate that emits this signal, for forwarding one signal into another.
    ///
    /// It does not keep the signal alive and expires once the signal is dropped.
    pub fn as_delegate(&self) -> Delegate<A, ()> {
        let weak = Rc::downgrade(&self.0);
        let object: Weak<dyn Any> = weak.clone();
        let thunk = move |args: A| -> Result<(), DelegateError> {
            let inner = weak.upgrade().ok_or(DelegateError::Expired { kind: DelegateKind::Signal })?;
            inner.emit(args)
        };
        Delegate::from_parts(DelegateKind::Signal, Some(object), 0, Rc::new(thunk))
    }
}

impl<A, R> Inner<A, R> {
    /// Detach every entry matching `predicate`, preserving the order of the rest
    fn take_where(&self, predicate: impl Fn(&Entry<A, R>) -> bool) -> Vec<Entry<A, R>> {
        let mut entries = self.entries.borrow_mut();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *entries).into_iter().partition(|entry| predicate(entry));
        *entries = kept;
        removed
    }

    fn disconnect(&self, slot: &Delegate<A, R>) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            match entries.iter().position(|entry| &entry.slot == slot) {
                Some(index) => entries.remove(index),
                None => return false,
            }
        };
        tracing::debug!(signal = %self.id, kind = %slot.kind(), "disconnect");
        removed.retire(self.id);
        true
    }

    fn disconnect_all(&self) {
        // Removed entries are dropped only after the borrow ends; slot captures may call back in
        let removed = std::mem::take(&mut *self.entries.borrow_mut());
        if !removed.is_empty() {
            tracing::debug!(signal = %self.id, entries = removed.len(), "disconnect all");
        }
        for entry in &removed {
            entry.retire(self.id);
        }
    }
}

impl<A: Clone, R> Inner<A, R> {
    fn emit(&self, args: A) -> Result<(), DelegateError> {
        let snapshot: Vec<(Rc<Cell<bool>>, Delegate<A, R>)> =
            self.entries.borrow().iter().map(|entry| (entry.live.clone(), entry.slot.clone())).collect();
        tracing::trace!(signal = %self.id, slots = snapshot.len(), "emit");

        // clone the payload for each slot except the last one
        if let Some(((last_live, last), rest)) = snapshot.split_last() {
            for (live, slot) in rest {
                if live.get() {
                    slot.invoke(args.clone())?;
                }
            }
            if last_live.get() {
                last.invoke(args)?;
            }
        }
        Ok(())
    }
}

impl<A: 'static, R: 'static> ScopedSignal for Inner<A, R> {
    fn signal_id(&self) -> SignalId { self.id }

    fn disconnect_scope(&self, scope: ScopeId) {
        let removed = self.take_where(|entry| entry.is_managed_by(scope));
        if !removed.is_empty() {
            tracing::debug!(signal = %self.id, %scope, entries = removed.len(), "disconnect scope");
        }
        for entry in &removed {
            entry.live.set(false);
        }
    }

    fn release_scope(&self, scope: ScopeId) {
        let mut released = 0;
        for entry in self.entries.borrow_mut().iter_mut() {
            if entry.is_managed_by(scope) {
                entry.scope = None;
                released += 1;
            }
        }
        tracing::debug!(signal = %self.id, %scope, entries = released, "release scope");
    }
}

impl<A, R> Clone for Signal<A, R> {
    /// Produces an empty signal: entries are never copied.
    fn clone(&self) -> Self { Self::new() }
}

impl<A, R> Drop for Signal<A, R> {
    fn drop(&mut self) { self.0.disconnect_all() }
}

impl<A, R> std::fmt::Debug for Signal<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("id", &self.0.id).field("entries", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Log {
        seen: Vec<u32>,
    }

    impl Log {
        fn push(&mut self, value: u32) { self.seen.push(value); }
    }

    fn log() -> Rc<RefCell<Log>> { Rc::new(RefCell::new(Log { seen: Vec::new() })) }

    #[test]
    fn test_clone_is_empty() {
        let signal = Signal::<u32>::new();
        let target = log();
        signal.connect(Delegate::bind_mut(&target, Log::push));
        signal.connect(Delegate::bind_mut(&target, Log::push));

        let copy = signal.clone();
        assert!(copy.is_empty());
        assert_ne!(copy.id(), signal.id());
        assert_eq!(signal.len(), 2);

        copy.emit(1).unwrap();
        assert!(target.borrow().seen.is_empty());
        signal.emit(2).unwrap();
        assert_eq!(target.borrow().seen, [2, 2]);
    }

    #[test]
    fn test_prune_expired() {
        let signal = Signal::<u32>::new();
        let kept = log();
        let dropped = log();
        signal.connect(Delegate::bind_mut(&dropped, Log::push));
        signal.connect(Delegate::bind_mut(&kept, Log::push));

        drop(dropped);
        assert_eq!(signal.emit(1), Err(DelegateError::Expired { kind: DelegateKind::Method }));
        // aborted before reaching the live slot
        assert!(kept.borrow().seen.is_empty());

        assert_eq!(signal.prune_expired(), 1);
        assert_eq!(signal.prune_expired(), 0);
        signal.emit(2).unwrap();
        assert_eq!(kept.borrow().seen, [2]);
    }

    #[test]
    fn test_prune_notifies_scope() {
        let signal = Signal::<u32>::new();
        let scope = ScopedConnection::new();
        let target = log();
        signal.connect_scoped(Delegate::bind_mut(&target, Log::push), &scope);
        assert_eq!(scope.len(), 1);

        drop(target);
        assert_eq!(signal.prune_expired(), 1);
        assert!(scope.is_empty());
    }

    #[test]
    fn test_forward_into_another_signal() {
        let upstream = Signal::<u32>::new();
        let downstream = Signal::<u32>::new();
        let target = log();
        downstream.connect(Delegate::bind_mut(&target, Log::push));

        let forward = downstream.as_delegate();
        assert_eq!(forward.kind(), DelegateKind::Signal);
        assert_eq!(forward, downstream.as_delegate());
        upstream.connect(forward.clone());

        upstream.emit(5).unwrap();
        assert_eq!(target.borrow().seen, [5]);

        drop(downstream);
        assert!(forward.is_expired());
        assert_eq!(upstream.emit(6), Err(DelegateError::Expired { kind: DelegateKind::Signal }));
        assert_eq!(target.borrow().seen, [5]);
    }

    #[test]
    fn test_return_values_are_discarded() {
        fn square(x: u32) -> u32 { x * x }

        let signal = Signal::<u32, u32>::new();
        signal.connect(Delegate::bind_fn(square));
        assert_eq!(signal.emit(4), Ok(()));
    }
}
