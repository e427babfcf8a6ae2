//! Shared start/stop bookkeeping the five ingester stubs build on, so each
//! adapter file only has to describe its own config shape and synthetic
//! event, not reimplement "don't double-spawn" / "exit the loop on stop".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::adapter::HealthStatus;

pub struct Lifecycle {
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    health: StdMutex<HealthStatus>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            running: AtomicBool::new(false),
            task: Mutex::new(None),
            health: StdMutex::new(HealthStatus::Stopped),
        }
    }
}

impl Lifecycle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn health(&self) -> HealthStatus {
        self.health.lock().unwrap().clone()
    }

    pub fn set_health(&self, status: HealthStatus) {
        *self.health.lock().unwrap() = status;
    }

    /// Install the poll loop's task handle, marking the adapter running. A
    /// second `start()` call on an already-running adapter is a no-op: the
    /// caller should check `is_running()` before spawning.
    pub async fn install(&self, handle: JoinHandle<()>) {
        self.running.store(true, Ordering::Release);
        self.set_health(HealthStatus::Healthy);
        *self.task.lock().await = Some(handle);
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.set_health(HealthStatus::Stopped);
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_stopped_and_unhealthy_state_is_reported() {
        let lc = Lifecycle::default();
        assert!(!lc.is_running());
        assert_eq!(lc.health(), HealthStatus::Stopped);
    }

    #[tokio::test]
    async fn install_marks_running_and_healthy() {
        let lc = Lifecycle::default();
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        lc.install(handle).await;
        assert!(lc.is_running());
        assert_eq!(lc.health(), HealthStatus::Healthy);
        lc.stop().await;
        assert!(!lc.is_running());
        assert_eq!(lc.health(), HealthStatus::Stopped);
    }
}
