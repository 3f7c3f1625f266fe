/*!
Single-threaded signals and slots with scoped, self-detaching connections.

# Design requirements:
- A slot is a [`Delegate`]: one value type for bound methods, bound const methods, free functions
  and shared closures, comparable by target identity so it can be disconnected later
- A [`Signal`] invokes its slots synchronously, in registration order
- A [`ScopedConnection`] ties slot registrations to its own lifetime; dropping either the scope or
  the signal detaches the other side, and neither side owns the other
- Nothing keeps a subscriber alive. A slot whose object is gone reports
  [`DelegateError::Expired`] instead of touching freed memory
- Not thread safe, by construction: everything here is `!Send`

# Basic usage

```rust
use scoped_signals::*;
use std::{cell::RefCell, rc::Rc};

struct Score {
    points: u32,
}

impl Score {
    fn add(&mut self, points: u32) { self.points += points; }
}

let scored: Signal<u32> = Signal::new();
let score = Rc::new(RefCell::new(Score { points: 0 }));

let slot = Delegate::bind_mut(&score, Score::add);
scored.connect(slot.clone());
scored.emit(3).unwrap();
assert_eq!(score.borrow().points, 3);

scored.disconnect(&slot);
scored.emit(3).unwrap();
assert_eq!(score.borrow().points, 3);
```

# Scoped usage

```rust
use scoped_signals::*;
use std::{cell::RefCell, rc::Rc};

struct Hud {
    frames: usize,
}

impl Hud {
    fn on_frame(&mut self, _: ()) { self.frames += 1; }
}

let frame: Signal<()> = Signal::new();
let hud = Rc::new(RefCell::new(Hud { frames: 0 }));
let scope = ScopedConnection::new();

frame.connect_scoped(Delegate::bind_mut(&hud, Hud::on_frame), &scope);
frame.emit(()).unwrap();
assert_eq!(hud.borrow().frames, 1);

// the subscription goes away with the scope
drop(scope);
assert!(frame.is_empty());
frame.emit(()).unwrap();
assert_eq!(hud.borrow().frames, 1);
```
*/

mod connection;
mod delegate;
mod error;
mod signal;
mod traits;

pub use connection::{ScopeId, ScopedConnection};
pub use delegate::{Delegate, DelegateKind};
pub use error::DelegateError;
pub use signal::{Signal, SignalId};
