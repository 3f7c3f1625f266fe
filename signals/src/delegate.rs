use std::any::Any;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::error::DelegateError;

/// The shape of callable a [`Delegate`] was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateKind {
    /// `fn(&mut T, A) -> R` bound to an `Rc<RefCell<T>>`
    Method,
    /// `fn(&T, A) -> R` bound to an `Rc<T>`
    ConstMethod,
    /// `fn(A) -> R`
    Function,
    /// A shared closure, identified by its allocation
    Closure,
    /// Emission of another signal
    Signal,
}

impl std::fmt::Display for DelegateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DelegateKind::Method => "method",
            DelegateKind::ConstMethod => "const method",
            DelegateKind::Function => "function",
            DelegateKind::Closure => "closure",
            DelegateKind::Signal => "signal",
        };
        f.write_str(name)
    }
}

pub(crate) type Thunk<A, R> = Rc<dyn Fn(A) -> Result<R, DelegateError>>;

/// A cheap-to-clone, comparable handle to one callable target taking `A` and returning `R`.
///
/// Multiple arguments are passed as a tuple, no arguments as `()`.
///
/// Every kind of target is stored the same way: an optional weak handle to the bound object,
/// a selector (the address of the method, function or closure allocation) and a thunk chosen at
/// bind time. Invocation always goes through the thunk and equality always compares
/// `(kind, object, selector)`, so two delegates bound to different objects are never equal even
/// when they name the same method.
///
/// A delegate never keeps its object alive. Invoking a delegate whose object has been dropped
/// returns [`DelegateError::Expired`].
///
/// Note that function identity is address identity, which Rust does not make unique in either
/// direction. The compiler is free to merge two functions with identical bodies, in which case
/// delegates to them compare equal. The same function may also have different addresses in
/// different codegen units or crates, so `disconnect(&Delegate::bind_fn(f))` written in another
/// crate than the matching `connect` can miss. Keep a clone of the connected delegate and
/// disconnect with that when this matters.
pub struct Delegate<A, R = ()> {
    kind: DelegateKind,
    object: Option<Weak<dyn Any>>,
    selector: usize,
    thunk: Thunk<A, R>,
}

impl<A: 'static, R: 'static> Delegate<A, R> {
    /// Bind a mutating method to a specific object.
    pub fn bind_mut<T: 'static>(object: &Rc<RefCell<T>>, method: fn(&mut T, A) -> R) -> Self {
        let weak = Rc::downgrade(object);
        let target: Weak<dyn Any> = weak.clone();
        let thunk = move |args: A| -> Result<R, DelegateError> {
            let strong = weak.upgrade().ok_or(DelegateError::Expired { kind: DelegateKind::Method })?;
            let mut guard = strong.try_borrow_mut().map_err(|_| DelegateError::Borrowed)?;
            let result = method(&mut guard, args);
            Ok(result)
        };
        Self::from_parts(DelegateKind::Method, Some(target), method as usize, Rc::new(thunk))
    }

    /// Bind a non-mutating method to a specific object.
    pub fn bind_const<T: 'static>(object: &Rc<T>, method: fn(&T, A) -> R) -> Self {
        let weak = Rc::downgrade(object);
        let target: Weak<dyn Any> = weak.clone();
        let thunk = move |args: A| -> Result<R, DelegateError> {
            let strong = weak.upgrade().ok_or(DelegateError::Expired { kind: DelegateKind::ConstMethod })?;
            Ok(method(&strong, args))
        };
        Self::from_parts(DelegateKind::ConstMethod, Some(target), method as usize, Rc::new(thunk))
    }

    /// Bind a free function.
    pub fn bind_fn(function: fn(A) -> R) -> Self {
        let thunk = move |args: A| -> Result<R, DelegateError> { Ok(function(args)) };
        Self::from_parts(DelegateKind::Function, None, function as usize, Rc::new(thunk))
    }

    /// Wrap a shared closure. Delegates made from clones of the same `Rc` compare equal.
    pub fn from_closure(closure: Rc<dyn Fn(A) -> R>) -> Self {
        let selector = Rc::as_ptr(&closure) as *const () as usize;
        let thunk = move |args: A| -> Result<R, DelegateError> { Ok(closure(args)) };
        Self::from_parts(DelegateKind::Closure, None, selector, Rc::new(thunk))
    }

    /// Wrap a closure in a fresh allocation. Keep a clone of the result to be able to disconnect it.
    pub fn closure<F>(f: F) -> Self
    where F: Fn(A) -> R + 'static {
        Self::from_closure(Rc::new(f))
    }
}

impl<A: 'static> Delegate<A, ()> {
    /// Forward every invocation into a channel. Send errors are ignored.
    pub fn from_sender(sender: std::sync::mpsc::Sender<A>) -> Self {
        Self::closure(move |value| {
            let _ = sender.send(value);
        })
    }

    /// Forward every invocation into a tokio channel. Send errors are ignored.
    #[cfg(feature = "tokio")]
    pub fn from_tokio_sender(sender: tokio::sync::mpsc::UnboundedSender<A>) -> Self {
        Self::closure(move |value| {
            let _ = sender.send(value);
        })
    }
}

impl<A, R> Delegate<A, R> {
    pub(crate) fn from_parts(kind: DelegateKind, object: Option<Weak<dyn Any>>, selector: usize, thunk: Thunk<A, R>) -> Self {
        Self { kind, object, selector, thunk }
    }

    /// Call the target synchronously.
    pub fn invoke(&self, args: A) -> Result<R, DelegateError> { (self.thunk)(args) }

    pub fn kind(&self) -> DelegateKind { self.kind }

    /// True once the bound object has been dropped. Functions and closures never expire.
    pub fn is_expired(&self) -> bool { self.object.as_ref().is_some_and(|object| object.strong_count() == 0) }

    // The weak handle pins the allocation, so the address stays unique while this delegate exists
    fn object_addr(&self) -> Option<usize> { self.object.as_ref().map(|object| object.as_ptr() as *const () as usize) }
}

impl<A, R> Clone for Delegate<A, R> {
    fn clone(&self) -> Self { Self { kind: self.kind, object: self.object.clone(), selector: self.selector, thunk: self.thunk.clone() } }
}

impl<A, R> PartialEq for Delegate<A, R> {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.object_addr() == other.object_addr() && self.selector == other.selector
    }
}

impl<A, R> Eq for Delegate<A, R> {}

impl<A, R> Hash for Delegate<A, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.object_addr().hash(state);
        self.selector.hash(state);
    }
}

impl<A, R> std::fmt::Debug for Delegate<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegate")
            .field("kind", &self.kind)
            .field("object", &self.object_addr().map(|addr| format!("{addr:#x}")))
            .field("selector", &format_args!("{:#x}", self.selector))
            .finish()
    }
}

impl<A: 'static, R: 'static> From<fn(A) -> R> for Delegate<A, R> {
    fn from(function: fn(A) -> R) -> Self { Self::bind_fn(function) }
}
