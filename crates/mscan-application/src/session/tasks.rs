use mscan_core::analysis::AnalysisId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Abort handles of in-flight workflow runs, keyed by analysis id.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<AnalysisId, AbortHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: AnalysisId, handle: AbortHandle) {
        let mut runs = self.runs.lock().await;
        runs.insert(id, handle);
    }

    /// Forgets a run that finished on its own.
    pub async fn remove(&self, id: &AnalysisId) {
        let mut runs = self.runs.lock().await;
        runs.remove(id);
    }

    /// Aborts a run. Returns false when no run was registered for `id`.
    pub async fn abort(&self, id: &AnalysisId) -> bool {
        let mut runs = self.runs.lock().await;
        match runs.remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every registered run and returns their ids.
    pub async fn abort_all(&self) -> Vec<AnalysisId> {
        let mut runs = self.runs.lock().await;
        runs.drain()
            .map(|(id, handle)| {
                handle.abort();
                id
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_abort_stops_task() {
        let registry = RunRegistry::new();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let id = AnalysisId::from("a");
        registry.register(id.clone(), task.abort_handle()).await;

        assert!(registry.abort(&id).await);
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!registry.abort(&id).await);
    }

    #[tokio::test]
    async fn test_abort_all_drains() {
        let registry = RunRegistry::new();
        for name in ["a", "b"] {
            let task = tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            });
            registry
                .register(AnalysisId::from(name), task.abort_handle())
                .await;
        }

        let aborted = registry.abort_all().await;
        assert_eq!(aborted.len(), 2);
        assert_eq!(registry.len().await, 0);
    }
}
