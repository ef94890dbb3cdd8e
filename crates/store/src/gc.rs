//! Background garbage collection of expired and fully invalidated token rows.
//!
//! A single task per token store wakes on a fixed interval, counts the rows
//! matching the deletion predicate and deletes them permanently. A failing
//! count ends the task; a failing delete is reported and retried on the next
//! tick.

use crate::backend::{Backend, Statement};
use oauthdb_types::Result;
use std::{
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

/// Default interval between sweeps.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(600);

const PREDICATE: &str = "(expired_at != 0 AND expired_at <= ?) \
                         OR (code = '' AND access = '' AND refresh = '')";

/// Destination for garbage collector error lines, stderr by default.
#[derive(Clone)]
pub struct DiagnosticSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DiagnosticSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Redirects all further output, including from a running collector.
    pub fn replace(&self, out: impl Write + Send + 'static) {
        *self.out.lock().unwrap_or_else(PoisonError::into_inner) = Box::new(out);
    }

    pub(crate) fn error(&self, err: &dyn fmt::Display) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // Write failures are ignored.
        let _ = writeln!(out, "[ERROR]:{err}");
        let _ = out.flush();
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink").finish_non_exhaustive()
    }
}

/// Issues the count and delete statements for one token table.
pub(crate) struct Collector {
    backend: Arc<dyn Backend>,
    table: String,
}

impl Collector {
    pub(crate) fn new(backend: Arc<dyn Backend>, table: String) -> Self {
        Self { backend, table }
    }

    async fn count(&self, now: i64) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {PREDICATE}", self.table);
        self.backend.count(Statement::new(sql).bind(now)).await
    }

    /// Hard delete, regardless of the `deleted_at` audit column.
    async fn delete(&self, now: i64) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE {PREDICATE}", self.table);
        self.backend.execute(Statement::new(sql).bind(now)).await
    }

    /// Runs one pass at unix time `now` and returns the number of deleted rows.
    pub(crate) async fn sweep(&self, now: i64) -> Result<u64> {
        if self.count(now).await? == 0 {
            return Ok(0);
        }
        self.delete(now).await
    }

    /// Spawns the collection loop. The first sweep runs one `period` from now.
    ///
    /// `done` is cancelled when the task exits, whether through `cancel` or a
    /// failed count.
    pub(crate) fn spawn(
        self,
        period: Duration,
        sink: DiagnosticSink,
        cancel: CancellationToken,
        done: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let _done = done.drop_guard();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                // Outside the select so a close never interrupts a running sweep.
                let now = crate::unix_now();
                let pending = match self.count(now).await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::error!(table = %self.table, error = %e, "gc count failed, stopping collector");
                        sink.error(&e);
                        return;
                    }
                };
                if pending == 0 {
                    continue;
                }
                match self.delete(now).await {
                    Ok(deleted) => {
                        tracing::info!(table = %self.table, deleted, "gc sweep complete");
                    }
                    Err(e) => {
                        tracing::error!(table = %self.table, error = %e, "gc delete failed");
                        sink.error(&e);
                    }
                }
            }
            tracing::debug!(table = %self.table, "gc stopped");
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::Dialect;
    use crate::row::{ClientRow, TokenRow};
    use async_trait::async_trait;
    use oauthdb_types::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shared in-memory writer for asserting on sink output.
    #[derive(Clone, Default)]
    pub(crate) struct Captured(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub(crate) fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Backend whose count always reports pending rows and whose writes fail.
    #[derive(Default)]
    struct LockedBackend {
        counts: AtomicUsize,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl Backend for LockedBackend {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn execute(&self, _stmt: Statement) -> Result<u64> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Err(Error::Storage("locked".into()))
        }

        async fn count(&self, _stmt: Statement) -> Result<i64> {
            self.counts.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }

        async fn fetch_token(&self, _stmt: Statement) -> Result<Option<TokenRow>> {
            Ok(None)
        }

        async fn fetch_client(&self, _stmt: Statement) -> Result<Option<ClientRow>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_collecting() {
        let backend = Arc::new(LockedBackend::default());
        let captured = Captured::default();
        let cancel = CancellationToken::new();
        let handle = Collector::new(backend.clone(), "oauth2_token".into()).spawn(
            Duration::from_millis(100),
            DiagnosticSink::new(captured.clone()),
            cancel.clone(),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(!handle.is_finished());
        let counts = backend.counts.load(Ordering::SeqCst);
        let deletes = backend.deletes.load(Ordering::SeqCst);
        assert!(counts >= 3, "counts={counts}");
        assert_eq!(counts, deletes);
        let out = captured.text();
        assert_eq!(out.lines().count(), deletes, "{out}");
        assert!(out.lines().all(|l| l == "[ERROR]:storage error: locked"), "{out}");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_sink_format() {
        let captured = Captured::default();
        let sink = DiagnosticSink::new(captured.clone());
        sink.error(&"no such table: oauth2_token");
        assert_eq!(captured.text(), "[ERROR]:no such table: oauth2_token\n");
    }

    #[test]
    fn test_sink_replace() {
        let first = Captured::default();
        let second = Captured::default();
        let sink = DiagnosticSink::new(first.clone());
        let shared = sink.clone();
        shared.replace(second.clone());
        sink.error(&"boom");
        assert!(first.text().is_empty());
        assert_eq!(second.text(), "[ERROR]:boom\n");
    }
}
