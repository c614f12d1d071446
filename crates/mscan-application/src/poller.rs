//! Client-side result poller.
//!
//! Drives `Idle -> Loading -> {Completed | Error}` for one analysis at a
//! time. Each poll loop owns a [`CancellationToken`]; starting a new poll
//! cancels the previous loop, and updates are only published while the
//! loop's token is live and its id is the current one.

use std::sync::Arc;
use std::time::Duration;

use mscan_core::analysis::{AnalysisId, AnalysisResultView, ResultFetcher};
use mscan_core::config::PollerConfig;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const TIMED_OUT_MESSAGE: &str = "Timed out waiting for analysis";
pub const NOT_FOUND_MESSAGE: &str = "Analysis ID not found";

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Loading,
    Completed {
        company_name: String,
        report: String,
        errors: Vec<String>,
    },
    Error {
        messages: Vec<String>,
    },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }
}

/// Poll state tagged with the analysis it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    pub analysis_id: Option<AnalysisId>,
    pub state: PollState,
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub max_wait: Duration,
    pub max_transient_failures: u32,
}

impl From<&PollerConfig> for PollerSettings {
    fn from(config: &PollerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
            max_transient_failures: config.max_transient_failures.max(1),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

struct ActivePoll {
    token: CancellationToken,
}

pub struct ResultPoller {
    fetcher: Arc<dyn ResultFetcher>,
    settings: PollerSettings,
    state: watch::Sender<PollSnapshot>,
    active: Mutex<Option<ActivePoll>>,
}

impl ResultPoller {
    pub fn new(fetcher: Arc<dyn ResultFetcher>, settings: PollerSettings) -> Self {
        let (state, _) = watch::channel(PollSnapshot {
            analysis_id: None,
            state: PollState::Idle,
        });
        Self {
            fetcher,
            settings,
            state,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.state.borrow().clone()
    }

    /// Starts polling `id`, tearing down any previous loop first.
    pub async fn start(&self, id: AnalysisId) -> JoinHandle<()> {
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if let Some(previous) = active.take() {
                previous.token.cancel();
            }
            *active = Some(ActivePoll {
                token: token.clone(),
            });
        }

        self.state.send_replace(PollSnapshot {
            analysis_id: Some(id.clone()),
            state: PollState::Loading,
        });
        tracing::debug!(analysis_id = %id, "Polling started");

        let poll = PollLoop {
            fetcher: self.fetcher.clone(),
            settings: self.settings.clone(),
            state: self.state.clone(),
            id,
            token,
        };
        tokio::spawn(poll.run())
    }

    /// Stops the current loop and returns to `Idle` ("new session").
    pub async fn reset(&self) {
        self.stop().await;
        self.state.send_replace(PollSnapshot {
            analysis_id: None,
            state: PollState::Idle,
        });
    }

    /// Stops the current loop, leaving the visible state as it is.
    pub async fn stop(&self) {
        if let Some(previous) = self.active.lock().await.take() {
            previous.token.cancel();
        }
    }
}

impl Drop for ResultPoller {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.try_lock()
            && let Some(previous) = active.take()
        {
            previous.token.cancel();
        }
    }
}

struct PollLoop {
    fetcher: Arc<dyn ResultFetcher>,
    settings: PollerSettings,
    state: watch::Sender<PollSnapshot>,
    id: AnalysisId,
    token: CancellationToken,
}

impl PollLoop {
    async fn run(self) {
        let started = Instant::now();
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
            if self.token.is_cancelled() {
                return;
            }

            match self.fetcher.fetch(&self.id).await {
                Ok(AnalysisResultView::NotComplete) => failures = 0,
                Ok(AnalysisResultView::Completed {
                    company_name,
                    report,
                    errors,
                }) => {
                    self.publish(PollState::Completed {
                        company_name,
                        report,
                        errors,
                    });
                    return;
                }
                Ok(AnalysisResultView::Failed { errors, .. }) => {
                    let messages = if errors.is_empty() {
                        vec!["Analysis failed".to_string()]
                    } else {
                        errors
                    };
                    self.publish(PollState::Error { messages });
                    return;
                }
                Err(e) if e.is_not_found() => {
                    self.publish(PollState::Error {
                        messages: vec![NOT_FOUND_MESSAGE.to_string()],
                    });
                    return;
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        analysis_id = %self.id,
                        failures,
                        error = %e,
                        "Poll failed"
                    );
                    if failures >= self.settings.max_transient_failures {
                        self.publish(PollState::Error {
                            messages: vec![format!("Lost contact with the server: {e}")],
                        });
                        return;
                    }
                }
            }

            if started.elapsed() >= self.settings.max_wait {
                self.publish(PollState::Error {
                    messages: vec![TIMED_OUT_MESSAGE.to_string()],
                });
                return;
            }
        }
    }

    /// Publishes only while this loop is live and still owns the snapshot.
    fn publish(&self, state: PollState) {
        let published = self.state.send_if_modified(|snapshot| {
            if self.token.is_cancelled() || snapshot.analysis_id.as_ref() != Some(&self.id) {
                return false;
            }
            snapshot.state = state;
            true
        });
        if !published {
            tracing::debug!(analysis_id = %self.id, "Dropped stale poll update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mscan_core::error::{Result, ScanError};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    /// Replays scripted responses per analysis id; the last one repeats.
    #[derive(Default)]
    struct ScriptedFetcher {
        scripts: StdMutex<HashMap<AnalysisId, VecDeque<Result<AnalysisResultView>>>>,
        calls: StdMutex<Vec<AnalysisId>>,
    }

    impl ScriptedFetcher {
        fn script(&self, id: &str, responses: Vec<Result<AnalysisResultView>>) {
            self.scripts
                .lock()
                .unwrap()
                .insert(AnalysisId::from(id), responses.into());
        }

        fn calls_for(&self, id: &str) -> usize {
            let id = AnalysisId::from(id);
            self.calls.lock().unwrap().iter().filter(|c| **c == id).count()
        }
    }

    #[async_trait]
    impl ResultFetcher for ScriptedFetcher {
        async fn fetch(&self, id: &AnalysisId) -> Result<AnalysisResultView> {
            self.calls.lock().unwrap().push(id.clone());
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts
                .get_mut(id)
                .ok_or_else(|| ScanError::not_found("Analysis", id.as_str()))?;
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        }
    }

    fn completed(report: &str) -> Result<AnalysisResultView> {
        Ok(AnalysisResultView::Completed {
            company_name: "Acme Corp".to_string(),
            report: report.to_string(),
            errors: vec![],
        })
    }

    fn transport_error() -> Result<AnalysisResultView> {
        Err(ScanError::io("connection refused"))
    }

    fn settings() -> PollerSettings {
        PollerSettings {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
            max_transient_failures: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_completed() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(
            "a",
            vec![
                Ok(AnalysisResultView::NotComplete),
                Ok(AnalysisResultView::NotComplete),
                completed("# Report"),
            ],
        );
        let poller = ResultPoller::new(fetcher.clone(), settings());

        let handle = poller.start(AnalysisId::from("a")).await;
        assert_eq!(poller.snapshot().state, PollState::Loading);
        handle.await.unwrap();

        assert_eq!(fetcher.calls_for("a"), 3);
        assert!(matches!(
            poller.snapshot().state,
            PollState::Completed { ref report, .. } if report == "# Report"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_result_surfaces_errors() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(
            "a",
            vec![Ok(AnalysisResultView::Failed {
                company_name: "Acme Corp".to_string(),
                errors: vec!["Insufficient data to generate comprehensive report".to_string()],
            })],
        );
        let poller = ResultPoller::new(fetcher, settings());

        poller.start(AnalysisId::from("a")).await.await.unwrap();
        assert_eq!(
            poller.snapshot().state,
            PollState::Error {
                messages: vec!["Insufficient data to generate comprehensive report".to_string()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_terminal() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let poller = ResultPoller::new(fetcher.clone(), settings());

        poller.start(AnalysisId::from("ghost")).await.await.unwrap();
        assert_eq!(fetcher.calls_for("ghost"), 1);
        assert_eq!(
            poller.snapshot().state,
            PollState::Error {
                messages: vec![NOT_FOUND_MESSAGE.to_string()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_transient_failure_keeps_polling() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script("a", vec![transport_error(), completed("ok")]);
        let poller = ResultPoller::new(fetcher, settings());

        poller.start(AnalysisId::from("a")).await.await.unwrap();
        assert!(matches!(poller.snapshot().state, PollState::Completed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_transport_failure_gives_up() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script("a", vec![transport_error()]);
        let poller = ResultPoller::new(fetcher.clone(), settings());

        poller.start(AnalysisId::from("a")).await.await.unwrap();
        assert_eq!(fetcher.calls_for("a"), 3);
        assert!(matches!(poller.snapshot().state, PollState::Error { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_bounds_polling() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script("a", vec![Ok(AnalysisResultView::NotComplete)]);
        let poller = ResultPoller::new(fetcher.clone(), settings());

        poller.start(AnalysisId::from("a")).await.await.unwrap();
        assert_eq!(fetcher.calls_for("a"), 12);
        assert_eq!(
            poller.snapshot().state,
            PollState::Error {
                messages: vec![TIMED_OUT_MESSAGE.to_string()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_analysis_stops_old_loop() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(
            "old",
            vec![
                Ok(AnalysisResultView::NotComplete),
                completed("old report"),
            ],
        );
        fetcher.script(
            "new",
            vec![
                Ok(AnalysisResultView::NotComplete),
                Ok(AnalysisResultView::NotComplete),
                completed("new report"),
            ],
        );
        let poller = ResultPoller::new(fetcher.clone(), settings());

        let old = poller.start(AnalysisId::from("old")).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        let new = poller.start(AnalysisId::from("new")).await;

        old.await.unwrap();
        new.await.unwrap();

        assert_eq!(fetcher.calls_for("old"), 1);
        let snapshot = poller.snapshot();
        assert_eq!(snapshot.analysis_id, Some(AnalysisId::from("new")));
        assert!(matches!(
            snapshot.state,
            PollState::Completed { ref report, .. } if report == "new report"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_idle() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script("a", vec![Ok(AnalysisResultView::NotComplete)]);
        let poller = ResultPoller::new(fetcher.clone(), settings());

        let handle = poller.start(AnalysisId::from("a")).await;
        poller.reset().await;
        handle.await.unwrap();

        assert_eq!(fetcher.calls_for("a"), 0);
        assert_eq!(
            poller.snapshot(),
            PollSnapshot {
                analysis_id: None,
                state: PollState::Idle
            }
        );
    }

    #[test]
    fn test_settings_from_config() {
        let settings = PollerSettings::from(&PollerConfig::default());
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.max_wait, Duration::from_secs(1800));
        assert_eq!(settings.max_transient_failures, 5);
    }
}
