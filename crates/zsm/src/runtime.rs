use crate::app::{AppEvent, Effect};
use crate::kill::any_alive;
use crate::repo::SessionRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs effects on the tokio runtime and posts their results back to the
/// event loop.
#[derive(Clone)]
pub struct EffectRunner {
    repo: Arc<dyn SessionRepository>,
    tx: mpsc::Sender<AppEvent>,
    poll_interval: Duration,
}

impl EffectRunner {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        tx: mpsc::Sender<AppEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            repo,
            tx,
            poll_interval,
        }
    }

    pub fn run_all(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    pub fn run(&self, effect: Effect) -> JoinHandle<()> {
        debug!(?effect, "dispatching effect");
        let repo = Arc::clone(&self.repo);
        let tx = self.tx.clone();
        let poll_interval = self.poll_interval;
        tokio::spawn(async move {
            let event = perform(effect, repo.as_ref(), poll_interval).await;
            // The loop is gone once the user quits; late results are dropped.
            let _ = tx.send(event).await;
        })
    }
}

pub async fn perform(
    effect: Effect,
    repo: &dyn SessionRepository,
    poll_interval: Duration,
) -> AppEvent {
    match effect {
        Effect::ListSessions => AppEvent::SessionsListed(repo.list_sessions().await),
        Effect::FetchProcessStats(sessions) => {
            let table = repo.process_table().await;
            AppEvent::ProcessStats(table.stats_for(&sessions))
        }
        Effect::FetchPreview { name, lines } => {
            let content = repo.fetch_preview(&name, lines).await;
            AppEvent::PreviewReady { name, content }
        }
        Effect::Kill(name) => {
            let result = repo.kill_session(&name).await;
            AppEvent::KillCompleted { name, result }
        }
        Effect::WaitForGone { names, attempt } => {
            tokio::time::sleep(poll_interval).await;
            match repo.list_sessions().await {
                Ok(sessions) if any_alive(&names, &sessions) => {
                    debug!(attempt, "killed sessions still listed");
                    AppEvent::PollTick
                }
                Ok(_) => AppEvent::AllConfirmedGone,
                Err(err) => {
                    warn!(error = %err, "poll listing failed; assuming sessions are gone");
                    AppEvent::AllConfirmedGone
                }
            }
        }
        Effect::ClearStatusAfter { delay, generation } => {
            tokio::time::sleep(delay).await;
            AppEvent::StatusExpired { generation }
        }
        Effect::CopyToClipboard(text) => {
            let result = repo.copy_to_clipboard(&text).await;
            AppEvent::ClipboardCopied { text, result }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use zsm_core::process::ProcessRow;
    use zsm_core::{ProcessTable, Session};

    #[derive(Default)]
    struct FakeRepository {
        sessions: Mutex<Vec<Session>>,
        failing_kills: HashSet<String>,
        list_fails: bool,
    }

    impl FakeRepository {
        fn with_sessions(names: &[&str]) -> Self {
            let sessions = names
                .iter()
                .enumerate()
                .map(|(idx, name)| Session {
                    pid: (10 + idx).to_string(),
                    ..Session::new(*name)
                })
                .collect();
            Self {
                sessions: Mutex::new(sessions),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl SessionRepository for FakeRepository {
        async fn list_sessions(&self) -> Result<Vec<Session>, RepoError> {
            if self.list_fails {
                return Err(RepoError::Failed {
                    command: "zmx list".to_string(),
                    detail: "exit status: 1".to_string(),
                });
            }
            Ok(self.sessions.lock().unwrap().clone())
        }

        async fn fetch_preview(&self, name: &str, lines: usize) -> String {
            format!("{name}:{lines}")
        }

        async fn kill_session(&self, name: &str) -> Result<(), RepoError> {
            if self.failing_kills.contains(name) {
                return Err(RepoError::Failed {
                    command: format!("zmx kill {name}"),
                    detail: "permission denied".to_string(),
                });
            }
            self.sessions.lock().unwrap().retain(|s| s.name != name);
            Ok(())
        }

        async fn process_table(&self) -> ProcessTable {
            ProcessTable::from_rows([
                ProcessRow {
                    pid: 10,
                    ppid: 1,
                    rss_kib: 4,
                    elapsed_secs: 30,
                },
                ProcessRow {
                    pid: 11,
                    ppid: 10,
                    rss_kib: 2,
                    elapsed_secs: 20,
                },
            ])
        }

        async fn copy_to_clipboard(&self, _text: &str) -> Result<(), RepoError> {
            Err(RepoError::Clipboard("no clipboard".to_string()))
        }
    }

    const POLL: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn preview_result_carries_requested_name() {
        let repo = FakeRepository::with_sessions(&["api"]);
        let event = perform(
            Effect::FetchPreview {
                name: "api".to_string(),
                lines: 7,
            },
            &repo,
            POLL,
        )
        .await;
        match event {
            AppEvent::PreviewReady { name, content } => {
                assert_eq!(name, "api");
                assert_eq!(content, "api:7");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn process_stats_follow_the_process_tree() {
        let repo = FakeRepository::with_sessions(&["api"]);
        let sessions = repo.list_sessions().await.unwrap();
        match perform(Effect::FetchProcessStats(sessions), &repo, POLL).await {
            AppEvent::ProcessStats(stats) => {
                assert_eq!(stats["api"].memory, 6 * 1024);
                assert_eq!(stats["api"].uptime, 30);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn kill_failure_is_reported_not_raised() {
        let repo = FakeRepository {
            failing_kills: HashSet::from(["db".to_string()]),
            ..FakeRepository::with_sessions(&["api", "db"])
        };
        match perform(Effect::Kill("db".to_string()), &repo, POLL).await {
            AppEvent::KillCompleted { name, result } => {
                assert_eq!(name, "db");
                assert!(result.is_err());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn poll_reports_alive_then_gone() {
        let repo = FakeRepository::with_sessions(&["api", "db"]);
        let wait = || Effect::WaitForGone {
            names: vec!["api".to_string()],
            attempt: 0,
        };
        assert!(matches!(perform(wait(), &repo, POLL).await, AppEvent::PollTick));

        repo.kill_session("api").await.unwrap();
        assert!(matches!(
            perform(wait(), &repo, POLL).await,
            AppEvent::AllConfirmedGone
        ));
    }

    #[tokio::test]
    async fn failed_poll_listing_ends_polling() {
        let repo = FakeRepository {
            list_fails: true,
            ..FakeRepository::with_sessions(&["api"])
        };
        let effect = Effect::WaitForGone {
            names: vec!["api".to_string()],
            attempt: 3,
        };
        assert!(matches!(
            perform(effect, &repo, POLL).await,
            AppEvent::AllConfirmedGone
        ));
    }

    #[tokio::test]
    async fn runner_posts_results_to_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let repo: Arc<dyn SessionRepository> = Arc::new(FakeRepository::with_sessions(&["api"]));
        let runner = EffectRunner::new(repo, tx, POLL);

        runner
            .run(Effect::ClearStatusAfter {
                delay: Duration::from_millis(1),
                generation: 9,
            })
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(AppEvent::StatusExpired { generation: 9 })
        ));

        runner
            .run(Effect::CopyToClipboard("zmx attach api".to_string()))
            .await
            .unwrap();
        match rx.recv().await {
            Some(AppEvent::ClipboardCopied { text, result }) => {
                assert_eq!(text, "zmx attach api");
                assert!(result.is_err());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
