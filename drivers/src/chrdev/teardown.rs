use alloc::boxed::Box;
use alloc::vec::Vec;

type Release<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Stack of release actions.
///
/// Every successful acquisition pushes the action that undoes it. The
/// actions run in reverse push order, either explicitly through
/// [`run`](Self::run) or when the stack is dropped, so an early `?` return
/// during setup unwinds exactly what was acquired.
#[derive(Default)]
pub struct Teardown<'a> {
    steps: Vec<(&'static str, Release<'a>)>,
}

impl<'a> Teardown<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Register the release action for the step just completed.
    pub fn push(&mut self, what: &'static str, release: impl FnOnce() + Send + 'a) {
        self.steps.push((what, Box::new(release)));
    }

    /// Run every pending action, newest first. Running twice is a no-op.
    pub fn run(&mut self) {
        while let Some((what, release)) = self.steps.pop() {
            log::debug!("teardown: {}", what);
            release();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn runs_in_reverse_order_once() {
        let log = Mutex::new(Vec::new());
        {
            let mut td = Teardown::new();
            td.push("a", || log.lock().unwrap().push("a"));
            td.push("b", || log.lock().unwrap().push("b"));
            td.push("c", || log.lock().unwrap().push("c"));
            td.run();
            td.run();
        }
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn drop_unwinds_partial_setup() {
        fn setup(log: &Mutex<Vec<&'static str>>) -> Result<(), ()> {
            let mut td = Teardown::new();
            td.push("id", || log.lock().unwrap().push("free id"));
            td.push("node", || log.lock().unwrap().push("remove node"));
            assert!(!td.is_empty());
            Err(())
        }

        let log = Mutex::new(Vec::new());
        assert!(setup(&log).is_err());
        assert_eq!(*log.lock().unwrap(), vec!["remove node", "free id"]);
    }
}
