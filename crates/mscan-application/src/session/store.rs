use async_trait::async_trait;
use chrono::Utc;
use mscan_core::analysis::{
    AnalysisId, AnalysisReport, AnalysisSession, AnalysisStatus, AnalysisStore, SessionState,
};
use mscan_core::document::DocumentRef;
use mscan_core::error::{Result, ScanError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory session store.
///
/// Sessions live for the lifetime of the process. Every mutation happens
/// under the write lock and readers get cloned snapshots, so a reader sees
/// either the state before `complete`/`fail` or the whole terminal state.
#[derive(Clone, Default)]
pub struct InMemoryAnalysisStore {
    sessions: Arc<RwLock<HashMap<AnalysisId, AnalysisSession>>>,
}

impl InMemoryAnalysisStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `f` to the session after checking the lifecycle allows `next`.
    async fn transition<F>(&self, id: &AnalysisId, next: AnalysisStatus, f: F) -> Result<()>
    where
        F: FnOnce(&mut AnalysisSession),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ScanError::not_found("Analysis", id.as_str()))?;

        let current = session.status();
        if !current.can_transition_to(next) {
            tracing::warn!(
                analysis_id = %id,
                from = %current,
                to = %next,
                "Rejected out-of-order status transition"
            );
            return Err(ScanError::InvalidTransition {
                id: id.to_string(),
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        f(session);
        session.updated_at = Utc::now();
        tracing::debug!(analysis_id = %id, from = %current, to = %next, "Status changed");
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn create(&self, company_name: &str, document: DocumentRef) -> Result<AnalysisId> {
        let mut sessions = self.sessions.write().await;
        let mut id = AnalysisId::generate();
        while sessions.contains_key(&id) {
            id = AnalysisId::generate();
        }
        sessions.insert(
            id.clone(),
            AnalysisSession::new(id.clone(), company_name, document),
        );
        Ok(id)
    }

    async fn insert(&self, session: AnalysisSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(ScanError::internal(format!(
                "Analysis '{}' already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &AnalysisId) -> Result<AnalysisSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| ScanError::not_found("Analysis", id.as_str()))
    }

    async fn set_status(&self, id: &AnalysisId, status: AnalysisStatus) -> Result<()> {
        let state = match status {
            AnalysisStatus::Uploading => SessionState::Uploading,
            AnalysisStatus::Processing => SessionState::Processing,
            AnalysisStatus::Failed => SessionState::Failed,
            AnalysisStatus::Completed => {
                return Err(ScanError::internal(
                    "A session can only be completed together with its report",
                ));
            }
        };
        self.transition(id, status, |session| session.state = state)
            .await
    }

    async fn complete(
        &self,
        id: &AnalysisId,
        result: AnalysisReport,
        errors: Vec<String>,
    ) -> Result<()> {
        self.transition(id, AnalysisStatus::Completed, |session| {
            session.state = SessionState::Completed { result };
            session.errors.extend(errors);
        })
        .await
    }

    async fn fail(&self, id: &AnalysisId, errors: Vec<String>) -> Result<()> {
        self.transition(id, AnalysisStatus::Failed, |session| {
            session.state = SessionState::Failed;
            session.errors.extend(errors);
        })
        .await
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn doc() -> DocumentRef {
        DocumentRef::new("/tmp/acme.pdf", "acme.pdf")
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            report: "# Market Scan Report: Acme Corp".to_string(),
            node_outputs: BTreeMap::new(),
            processing_status: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_uploading() {
        let store = InMemoryAnalysisStore::new();
        let id = store.create("Acme Corp", doc()).await.unwrap();

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.status(), AnalysisStatus::Uploading);
        assert_eq!(session.company_name, "Acme Corp");
        assert!(session.result().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = InMemoryAnalysisStore::new();
        let a = store.create("A", doc()).await.unwrap();
        let b = store.create("B", doc()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = InMemoryAnalysisStore::new();
        let session = AnalysisSession::new(AnalysisId::from("dup"), "A", doc());
        store.insert(session.clone()).await.unwrap();
        assert!(store.insert(session).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = InMemoryAnalysisStore::new();
        let err = store.get(&AnalysisId::from("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_complete_attaches_result_and_errors() {
        let store = InMemoryAnalysisStore::new();
        let id = store.create("Acme Corp", doc()).await.unwrap();
        store
            .set_status(&id, AnalysisStatus::Processing)
            .await
            .unwrap();
        store
            .complete(&id, report(), vec!["News analysis error: quota".to_string()])
            .await
            .unwrap();

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.status(), AnalysisStatus::Completed);
        assert!(session.result().is_some());
        assert_eq!(session.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = InMemoryAnalysisStore::new();
        let id = store.create("Acme Corp", doc()).await.unwrap();
        store.fail(&id, vec!["boom".to_string()]).await.unwrap();

        let err = store
            .set_status(&id, AnalysisStatus::Processing)
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());
        assert!(store.complete(&id, report(), vec![]).await.is_err());
        assert!(store.fail(&id, vec!["again".to_string()]).await.is_err());

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.status(), AnalysisStatus::Failed);
        assert_eq!(session.errors, vec!["boom".to_string()]);
        assert!(session.result().is_none());
    }

    #[tokio::test]
    async fn test_backward_transition_rejected() {
        let store = InMemoryAnalysisStore::new();
        let id = store.create("Acme Corp", doc()).await.unwrap();
        store
            .set_status(&id, AnalysisStatus::Processing)
            .await
            .unwrap();
        assert!(
            store
                .set_status(&id, AnalysisStatus::Uploading)
                .await
                .unwrap_err()
                .is_invalid_transition()
        );
    }

    #[tokio::test]
    async fn test_completed_requires_report() {
        let store = InMemoryAnalysisStore::new();
        let id = store.create("Acme Corp", doc()).await.unwrap();
        assert!(
            store
                .set_status(&id, AnalysisStatus::Completed)
                .await
                .is_err()
        );
        assert_eq!(
            store.get(&id).await.unwrap().status(),
            AnalysisStatus::Uploading
        );
    }

    #[tokio::test]
    async fn test_concurrent_readers_never_see_completed_without_result() {
        let store = InMemoryAnalysisStore::new();
        let id = store.create("Acme Corp", doc()).await.unwrap();
        store
            .set_status(&id, AnalysisStatus::Processing)
            .await
            .unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let session = store.get(&id).await.unwrap();
                        assert_eq!(
                            session.status() == AnalysisStatus::Completed,
                            session.result().is_some()
                        );
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        store.complete(&id, report(), vec![]).await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
