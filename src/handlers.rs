//! The contract the orchestrator (C7) uses to talk to any front-end (C8).
//!
//! Plain trait objects, not a language-specific delegate mechanism
//! (spec.md §9). All three are invoked on the worker task; a GUI
//! collaborator is responsible for marshaling back to its own UI thread.

use crate::schema::{Table, View};

/// `(done, success, percent, message)`, called many times during a run.
/// The final invocation has `done == true` exactly once.
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, done: bool, success: bool, percent: u8, message: &str);
}

/// Receives the full list of introspected tables; returns either a
/// (possibly filtered) replacement list or `None` meaning "keep the
/// original list". Invoked once, after introspection, before DDL
/// emission.
pub trait TableSelectionHandler: Send + Sync {
    fn select_tables(&self, tables: &[Table]) -> Option<Vec<Table>>;
}

/// Receives a view whose DDL failed to execute; returns either a
/// replacement DDL string (retry) or `None` (discard the view). If no
/// handler is installed, a view failure is fatal.
pub trait ViewFailureHandler: Send + Sync {
    fn on_view_failed(&self, view: &View, error_message: &str) -> Option<String>;
}

/// A `ProgressHandler` that only logs; used when the caller doesn't
/// care about per-step UI updates (e.g. the CLI's quiet mode).
pub struct LoggingProgressHandler;

impl ProgressHandler for LoggingProgressHandler {
    fn on_progress(&self, done: bool, success: bool, percent: u8, message: &str) {
        if done {
            if success {
                log::info!("conversion finished: {message}");
            } else {
                log::error!("conversion failed: {message}");
            }
        } else {
            log::debug!("conversion progress {percent}%: {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Mutex;

    struct RecordingHandler {
        last_percent: AtomicU8,
        messages: Mutex<Vec<String>>,
    }

    impl ProgressHandler for RecordingHandler {
        fn on_progress(&self, _done: bool, _success: bool, percent: u8, message: &str) {
            self.last_percent.store(percent, Ordering::SeqCst);
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn progress_handler_records_calls() {
        let handler = RecordingHandler {
            last_percent: AtomicU8::new(0),
            messages: Mutex::new(Vec::new()),
        };
        handler.on_progress(false, true, 42, "halfway");
        assert_eq!(handler.last_percent.load(Ordering::SeqCst), 42);
        assert_eq!(handler.messages.lock().unwrap().as_slice(), ["halfway"]);
    }

    struct KeepOriginal;
    impl TableSelectionHandler for KeepOriginal {
        fn select_tables(&self, _tables: &[Table]) -> Option<Vec<Table>> {
            None
        }
    }

    #[test]
    fn table_selection_handler_can_keep_original() {
        let handler = KeepOriginal;
        assert!(handler.select_tables(&[]).is_none());
    }

    struct DiscardView;
    impl ViewFailureHandler for DiscardView {
        fn on_view_failed(&self, _view: &View, _error_message: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn view_failure_handler_can_discard() {
        let handler = DiscardView;
        let view = View {
            name: "v".into(),
            sql: "select 1".into(),
        };
        assert!(handler.on_view_failed(&view, "boom").is_none());
    }
}
