//! Accumulated state of one export view.

use super::event::{Change, ExportEvent};

/// Progress stream connection status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    /// Closed by a terminal event, `reset` or unmount.
    Closed,
    /// Closed by a transport failure before the export finished.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSession {
    pub logs: Vec<String>,
    pub changes: Vec<Change>,
    pub finished: bool,
    pub produced_filename: Option<String>,
    /// Malformed or unknown payloads discarded so far
    pub dropped_events: u64,
    pub connection: ConnectionState,
}

impl ExportSession {
    /// Applies one event. Returns true once the export has finished.
    ///
    /// Nothing is recorded after the terminal event.
    pub fn apply(&mut self, event: ExportEvent) -> bool {
        if self.finished {
            return true;
        }

        match event {
            ExportEvent::Log { step } => self.logs.push(step),
            ExportEvent::Changes { changes } => self.changes = changes,
            ExportEvent::End { file } => {
                self.finished = true;
                self.produced_filename = file.filter(|f| !f.trim().is_empty());
                self.connection = ConnectionState::Closed;
            }
        }
        self.finished
    }

    pub fn record_dropped(&mut self) {
        if !self.finished {
            self.dropped_events += 1;
        }
    }

    /// Download unlocks once finished with a produced file.
    pub fn download_target(&self) -> Option<&str> {
        self.produced_filename
            .as_deref()
            .filter(|_| self.finished)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(
            self.connection,
            ConnectionState::Connecting | ConnectionState::Open
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(step: &str) -> ExportEvent {
        ExportEvent::Log {
            step: step.to_string(),
        }
    }

    fn change(column: &str) -> Change {
        Change {
            column: column.to_string(),
            original_value: "a".to_string(),
            corrected_value: "b".to_string(),
        }
    }

    #[test]
    fn test_logs_append_in_order() {
        let mut session = ExportSession::default();
        assert!(!session.apply(log("one")));
        assert!(!session.apply(log("two")));
        assert_eq!(session.logs, vec!["one", "two"]);
    }

    #[test]
    fn test_changes_replace_wholesale() {
        let mut session = ExportSession::default();
        session.apply(ExportEvent::Changes {
            changes: vec![change("NIF"), change("Email")],
        });
        session.apply(ExportEvent::Changes {
            changes: vec![change("CP")],
        });
        assert_eq!(session.changes, vec![change("CP")]);
    }

    #[test]
    fn test_nothing_applies_after_end() {
        let mut session = ExportSession::default();
        session.apply(log("one"));
        assert!(session.apply(ExportEvent::End {
            file: Some("out.csv".to_string())
        }));
        assert!(session.apply(log("late")));
        session.apply(ExportEvent::End {
            file: Some("other.csv".to_string()),
        });
        session.record_dropped();

        assert_eq!(session.logs, vec!["one"]);
        assert_eq!(session.download_target(), Some("out.csv"));
        assert_eq!(session.dropped_events, 0);
        assert_eq!(session.connection, ConnectionState::Closed);
    }

    #[test]
    fn test_end_without_file_keeps_download_locked() {
        let mut session = ExportSession::default();
        session.apply(ExportEvent::End { file: None });
        assert!(session.finished);
        assert_eq!(session.download_target(), None);
    }
}
