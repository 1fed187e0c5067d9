use log::*;

pub type Deferred<'a> = Box<dyn FnOnce() + 'a>;

/// A list of deferred calls. They run last-in first-out when the list is dropped, or earlier with
/// [`Defer::run`].
#[derive(Default)]
pub struct Defer<'a>(Vec<Deferred<'a>>);

impl<'a> Defer<'a> {
    pub fn new() -> Self {
        Defer(Vec::new())
    }

    pub fn defer(&mut self, call: impl FnOnce() + 'a) {
        self.0.push(Box::new(call));
    }

    /// Drop `value` when the deferred calls run
    pub fn defer_drop<T: 'a>(&mut self, value: T) {
        self.defer(move || drop(value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run all the deferred calls now, newest first. The list can be reused afterwards.
    pub fn run(&mut self) {
        if !self.0.is_empty() {
            trace!("Running {} deferred call(s)", self.0.len());
        }
        while let Some(call) = self.0.pop() {
            call();
        }
    }
}

impl Drop for Defer<'_> {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Defer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Defer(calls: {})", self.0.len()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn runs_in_reverse() {
        let order = RefCell::new(Vec::new());
        {
            let mut defers = Defer::new();
            for i in 0..3 {
                let order = &order;
                defers.defer(move || order.borrow_mut().push(i));
            }
            assert_eq!(defers.len(), 3);
            assert!(order.borrow().is_empty());
        }
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn run_empties() {
        let count = RefCell::new(0);
        let mut defers = Defer::new();
        defers.defer(|| *count.borrow_mut() += 1);
        defers.run();
        assert!(defers.is_empty());
        drop(defers);
        assert_eq!(*count.borrow(), 1);
    }
}
