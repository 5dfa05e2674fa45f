use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use super::driver::{Database, Row};
use crate::driver::ManagedDriver;
use crate::error::Result;
use crate::event::EventEmitter;

/// Database driver that reports every query on the test's event bus
pub struct EventFiringDatabaseDriver {
    inner: Arc<dyn Database>,
    emitter: EventEmitter,
}

impl EventFiringDatabaseDriver {
    pub fn new(inner: Arc<dyn Database>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }

    pub fn inner(&self) -> &Arc<dyn Database> {
        &self.inner
    }

    fn before(&self, sql: &str, params: &[Value]) {
        self.emitter.action(format!("Performing query: {}", sql));
        if !params.is_empty() {
            let rendered: Vec<String> = params.iter().map(Value::to_string).collect();
            self.emitter.verbose(format!("Query parameters: [{}]", rendered.join(", ")));
        }
    }
}

#[async_trait]
impl ManagedDriver for EventFiringDatabaseDriver {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[async_trait]
impl Database for EventFiringDatabaseDriver {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.before(sql, params);

        match self.inner.query(sql, params).await {
            Ok(rows) => {
                self.emitter.completed(format!("Query returned {} rows", rows.len()));
                Ok(rows)
            }
            Err(e) => {
                self.emitter.error(&format!("Query failed: {}", sql), &e);
                Err(e)
            }
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.before(sql, params);

        match self.inner.execute(sql, params).await {
            Ok(affected) => {
                self.emitter.completed(format!("Statement affected {} rows", affected));
                Ok(affected)
            }
            Err(e) => {
                self.emitter.error(&format!("Statement failed: {}", sql), &e);
                Err(e)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatabaseError, MaqsError};
    use crate::event::{DriverEventKind, EventBus, EventFilter};

    /// Database stub answering every call with a fixed outcome
    struct ScriptedDatabase {
        fail_with: Option<&'static str>,
    }

    impl ScriptedDatabase {
        fn outcome<T>(&self, value: T) -> Result<T> {
            match self.fail_with {
                Some(message) => Err(DatabaseError::Query(message.to_string()).into()),
                None => Ok(value),
            }
        }
    }

    #[async_trait]
    impl ManagedDriver for ScriptedDatabase {
        fn kind(&self) -> &'static str {
            "database"
        }

        fn is_open(&self) -> bool {
            true
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Database for ScriptedDatabase {
        fn provider(&self) -> &str {
            "scripted"
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            let mut row = Row::new();
            row.insert("id".to_string(), Value::from(1));
            self.outcome(vec![row])
        }

        async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
            self.outcome(3)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn decorated(fail_with: Option<&'static str>) -> (EventFiringDatabaseDriver, crate::event::EventSubscription) {
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe(EventFilter::new());
        let driver = EventFiringDatabaseDriver::new(
            Arc::new(ScriptedDatabase { fail_with }),
            EventEmitter::new("database", bus),
        );
        (driver, events)
    }

    #[tokio::test]
    async fn test_failed_statement_raises_one_error_and_keeps_error() {
        let (driver, mut events) = decorated(Some("no such table: users"));

        let err = driver.execute("DELETE FROM users", &[]).await.unwrap_err();
        assert!(matches!(err, MaqsError::Database(DatabaseError::Query(ref m)) if m == "no such table: users"));

        let action = events.try_recv().unwrap();
        assert_eq!(action.kind, DriverEventKind::Action);
        assert_eq!(action.message, "Performing query: DELETE FROM users");
        let error = events.try_recv().unwrap();
        assert_eq!(error.kind, DriverEventKind::Error);
        assert!(error.stack_trace.is_some());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_query_reports_row_count_and_parameters() {
        let (driver, mut events) = decorated(None);

        let rows = driver
            .query("SELECT id FROM users WHERE name = ?", &[Value::from("ann")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(driver.provider(), "scripted");

        let seen: Vec<_> = std::iter::from_fn(|| events.try_recv())
            .map(|e| (e.kind, e.message))
            .collect();
        assert_eq!(
            seen,
            vec![
                (DriverEventKind::Action, "Performing query: SELECT id FROM users WHERE name = ?".to_string()),
                (DriverEventKind::Verbose, "Query parameters: [\"ann\"]".to_string()),
                (DriverEventKind::Completed, "Query returned 1 rows".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_reports_affected_rows() {
        let (driver, mut events) = decorated(None);
        assert_eq!(driver.execute("UPDATE users SET active = 1", &[]).await.unwrap(), 3);

        let completed = std::iter::from_fn(|| events.try_recv())
            .find(|e| e.kind == DriverEventKind::Completed)
            .unwrap();
        assert_eq!(completed.message, "Statement affected 3 rows");
    }
}
