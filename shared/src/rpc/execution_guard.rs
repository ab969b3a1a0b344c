use std::{cell::Cell, rc::Rc};

/// Holds an object's `executing_from_network` flag raised for its lifetime.
/// Dropping restores the value it replaced, so nested guards unwind
/// correctly and a failing or panicking body never leaves the flag set.
pub struct ExecutionGuard {
    flag: Rc<Cell<bool>>,
    previous: bool,
}

impl ExecutionGuard {
    pub fn enter(flag: &Rc<Cell<bool>>) -> Self {
        let previous = flag.replace(true);
        Self {
            flag: flag.clone(),
            previous,
        }
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}
