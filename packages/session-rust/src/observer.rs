//! Session observer trait and composite implementation.
//!
//! A [`GridSession`](crate::session::GridSession) notifies its observer after
//! every local change so a UI layer can re-render. [`CompositeSessionObserver`]
//! fans the notifications out to several observers.

use std::sync::Arc;

use listgrid_core::Row;

use crate::session::GridState;

/// Observer for grid session changes. Used as `Arc<dyn SessionObserver>`.
pub trait SessionObserver: Send + Sync {
    /// Called after the canonical row set changed (edit, insert, refetch).
    fn on_rows_changed(&self, rows: &[Row]);

    /// Called after sort, filters, search or the active view changed.
    fn on_state_changed(&self, state: &GridState);

    /// Called when a backend mutation failed. Local state is not rolled back.
    fn on_mutation_failed(&self, operation: &str, error: &str);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeSessionObserver {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl CompositeSessionObserver {
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn SessionObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl SessionObserver for CompositeSessionObserver {
    fn on_rows_changed(&self, rows: &[Row]) {
        for observer in &self.observers {
            observer.on_rows_changed(rows);
        }
    }

    fn on_state_changed(&self, state: &GridState) {
        for observer in &self.observers {
            observer.on_state_changed(state);
        }
    }

    fn on_mutation_failed(&self, operation: &str, error: &str) {
        for observer in &self.observers {
            observer.on_mutation_failed(operation, error);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// Test observer that counts notifications and keeps the last state.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub rows_changed: AtomicUsize,
        pub state_changed: AtomicUsize,
        pub failures: Mutex<Vec<String>>,
        pub last_state: Mutex<Option<GridState>>,
    }

    impl SessionObserver for RecordingObserver {
        fn on_rows_changed(&self, _: &[Row]) {
            self.rows_changed.fetch_add(1, Ordering::Relaxed);
        }
        fn on_state_changed(&self, state: &GridState) {
            self.state_changed.fetch_add(1, Ordering::Relaxed);
            *self.last_state.lock() = Some(state.clone());
        }
        fn on_mutation_failed(&self, operation: &str, _: &str) {
            self.failures.lock().push(operation.to_string());
        }
    }

    #[test]
    fn empty_composite_does_not_panic() {
        let composite = CompositeSessionObserver::default();
        assert!(composite.is_empty());
        composite.on_rows_changed(&[]);
        composite.on_state_changed(&GridState::default());
        composite.on_mutation_failed("edit_cell", "boom");
    }

    #[test]
    fn composite_fans_out_to_all() {
        let a = Arc::new(RecordingObserver::default());
        let b = Arc::new(RecordingObserver::default());
        let mut composite =
            CompositeSessionObserver::new(vec![a.clone() as Arc<dyn SessionObserver>]);
        composite.add(b.clone());

        composite.on_rows_changed(&[]);
        composite.on_state_changed(&GridState::default());
        composite.on_mutation_failed("add_row", "boom");

        for observer in [&a, &b] {
            assert_eq!(observer.rows_changed.load(Ordering::Relaxed), 1);
            assert_eq!(observer.state_changed.load(Ordering::Relaxed), 1);
            assert_eq!(*observer.failures.lock(), ["add_row"]);
        }
    }
}
