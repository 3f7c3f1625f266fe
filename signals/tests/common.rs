use std::{cell::RefCell, rc::Rc};
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .init();
}

/// Returns a recording callback and a function that drains what it recorded so far
#[allow(unused)]
pub fn watcher<T: 'static>() -> (Rc<dyn Fn(T)>, impl Fn() -> Vec<T>) {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let watcher: Rc<dyn Fn(T)> = {
        let changes = changes.clone();
        Rc::new(move |value: T| changes.borrow_mut().push(value))
    };

    let check = move || changes.borrow_mut().drain(..).collect::<Vec<T>>();

    (watcher, check)
}
