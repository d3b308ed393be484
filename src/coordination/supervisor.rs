//! Crash isolation for pipeline tasks
//!
//! Each task runs inside its own tokio task, watched by a thin outer task
//! that owns the task's barrier registration. When the inner task returns an
//! error or panics, the outer task poisons the registration, writes a crash
//! report and sends the failure to the orchestrator, which ends the run.

use crate::coordination::Registration;
use crate::storage::DiagnosticStore;
use crate::ScoutError;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::sync::{Mutex, Once, OnceLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Receives the first and any later fatal task failures
pub type FatalReceiver = mpsc::UnboundedReceiver<ScoutError>;

static PANIC_HOOK: Once = Once::new();

/// Backtrace of the most recent panic, captured where it happened
fn last_panic() -> &'static Mutex<Option<String>> {
    static LAST_PANIC: OnceLock<Mutex<Option<String>>> = OnceLock::new();
    LAST_PANIC.get_or_init(|| Mutex::new(None))
}

/// Chains a hook that records the backtrace at the panic site
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = format!("{}\n{}", info, Backtrace::force_capture());
            if let Ok(mut slot) = last_panic().lock() {
                *slot = Some(trace);
            }
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    last_panic().lock().ok().and_then(|mut slot| slot.take())
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Spawns supervised pipeline tasks
#[derive(Clone)]
pub struct Supervisor {
    diagnostics: DiagnosticStore,
    fatal: mpsc::UnboundedSender<ScoutError>,
}

impl Supervisor {
    /// Creates a supervisor and the channel its failures arrive on
    pub fn new(diagnostics: DiagnosticStore) -> (Self, FatalReceiver) {
        install_panic_hook();
        let (fatal, fatal_rx) = mpsc::unbounded_channel();
        (Self { diagnostics, fatal }, fatal_rx)
    }

    /// Runs `work` as an isolated task holding `registration`
    ///
    /// The registration is released when `work` succeeds and poisoned when it
    /// fails, so a crashed task can never make the crawl look finished.
    pub fn spawn<F>(
        &self,
        registration: Registration,
        label: impl Into<String>,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), ScoutError>> + Send + 'static,
    {
        let supervisor = self.clone();
        let label = label.into();

        tokio::spawn(async move {
            let (message, backtrace) = match tokio::spawn(work).await {
                Ok(Ok(())) => {
                    drop(registration);
                    return;
                }
                Ok(Err(e)) => (e.to_string(), Backtrace::force_capture().to_string()),
                Err(join_error) if join_error.is_panic() => {
                    let message = panic_message(join_error.into_panic());
                    let backtrace = take_panic_backtrace()
                        .unwrap_or_else(|| Backtrace::force_capture().to_string());
                    (message, backtrace)
                }
                Err(join_error) => (join_error.to_string(), String::new()),
            };

            registration.poison();
            supervisor.report(label, message, backtrace).await;
        })
    }

    async fn report(&self, label: String, message: String, backtrace: String) {
        error!(task = %label, "Task failed: {}", message);

        match self
            .diagnostics
            .record_crash(&label, &message, &backtrace)
            .await
        {
            Ok(path) => error!("Crash report written to {}", path.display()),
            Err(e) => error!("Failed to write crash report: {}", e),
        }

        if self
            .fatal
            .send(ScoutError::TaskFailed { label, message })
            .is_err()
        {
            debug!("Orchestrator already stopped; dropping failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::Barrier;
    use std::time::Duration;

    fn supervisor(dir: &std::path::Path) -> (Supervisor, FatalReceiver) {
        Supervisor::new(DiagnosticStore::new(dir))
    }

    #[tokio::test]
    async fn test_success_releases_registration() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, mut fatal_rx) = supervisor(dir.path());
        let barrier = Barrier::new();
        let registration = barrier.register();
        barrier.open_gate();
        assert!(!barrier.is_done());

        supervisor
            .spawn(registration, "ok", async { Ok(()) })
            .await
            .unwrap();

        assert!(barrier.is_done());
        assert_eq!(barrier.pending(), 0);
        assert!(fatal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, mut fatal_rx) = supervisor(dir.path());
        let barrier = Barrier::new();
        let registration = barrier.register();
        barrier.open_gate();

        supervisor
            .spawn(registration, "failing", async {
                Err(ScoutError::StoragePoisoned)
            })
            .await
            .unwrap();

        assert!(barrier.is_poisoned());
        assert!(!barrier.is_done());
        match fatal_rx.recv().await {
            Some(ScoutError::TaskFailed { label, .. }) => assert_eq!(label, "failing"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_writes_crash_report() {
        let dir = tempfile::tempdir().unwrap();
        let (supervisor, mut fatal_rx) = supervisor(dir.path());
        let barrier = Barrier::new();
        let registration = barrier.register();
        barrier.open_gate();

        supervisor.spawn(registration, "panicking", async {
            let reports: Vec<u8> = Vec::new();
            if reports.is_empty() {
                panic!("exploded");
            }
            Ok(())
        });

        let failure = tokio::time::timeout(Duration::from_secs(5), fatal_rx.recv())
            .await
            .unwrap();
        match failure {
            Some(ScoutError::TaskFailed { message, .. }) => assert_eq!(message, "exploded"),
            other => panic!("unexpected: {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(barrier.is_poisoned());
        assert!(!barrier.is_done());
        assert_eq!(barrier.pending(), 0);
        let reports: Vec<_> = std::fs::read_dir(dir.path().join("panic"))
            .unwrap()
            .collect();
        assert_eq!(reports.len(), 1);
    }
}
