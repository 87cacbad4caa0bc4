use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::game::{DriverTiming, EngineError, GameEngine, Scheduler, SessionDriver};
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::game_result::{GameResult, NewGameResult};
use crate::models::timer::SessionEvent;
use crate::models::{GameConfig, QuestionBank, RewardChoice, Screen, SessionCommand, SessionView};
use crate::services::game_results_service::{GameResultError, GameResultService};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Too many active sessions (limit {0})")]
    Capacity(usize),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Result(#[from] GameResultError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_active: usize,
    pub idle_timeout: Duration,
    /// Idle time after which a finished session is dropped.
    pub finished_grace: Duration,
    pub sweep_interval: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_active: 1000,
            idle_timeout: Duration::from_secs(1800),
            finished_grace: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// In-memory registry of hosted play-throughs.
pub struct SessionService {
    sessions: RwLock<HashMap<String, Arc<SessionDriver>>>,
    bank: Arc<QuestionBank>,
    rules: GameConfig,
    timing: DriverTiming,
    limits: SessionLimits,
    player_name: String,
    scheduler: Arc<dyn Scheduler>,
}

impl SessionService {
    pub fn new(
        bank: Arc<QuestionBank>,
        rules: GameConfig,
        timing: DriverTiming,
        limits: SessionLimits,
        player_name: String,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            bank,
            rules,
            timing,
            limits,
            player_name,
            scheduler,
        }
    }

    pub async fn create_session(&self) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.write().await;
        let max_active = self.limits.max_active;
        if sessions.len() >= max_active {
            SESSIONS_TOTAL.with_label_values(&["rejected"]).inc();
            tracing::warn!(limit = max_active, "Session limit reached");
            return Err(SessionError::Capacity(max_active));
        }

        let session_id = Uuid::new_v4().to_string();
        let engine = GameEngine::new(self.rules, self.bank.clone());
        let driver = Arc::new(SessionDriver::new(
            session_id.clone(),
            engine,
            self.scheduler.clone(),
            self.timing,
        ));

        let view = driver.start();
        sessions.insert(session_id.clone(), driver);

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!(session_id = %session_id, "Session created");

        Ok(view)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Arc<SessionDriver>, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(SessionError::NotFound)
    }

    pub async fn view(&self, session_id: &str) -> Result<SessionView, SessionError> {
        Ok(self.get_session(session_id).await?.view())
    }

    pub async fn apply(
        &self,
        session_id: &str,
        command: &SessionCommand,
    ) -> Result<SessionView, SessionError> {
        let driver = self.get_session(session_id).await?;
        tracing::debug!(session_id, command = command.name(), "Applying session command");
        Ok(driver.apply(command))
    }

    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        Ok(self.get_session(session_id).await?.subscribe())
    }

    /// Turns a finished session into a stored result and retires the session.
    ///
    /// The session is taken out of the registry while the result is written,
    /// so concurrent submissions for the same session cannot both succeed. On
    /// failure it is put back and the player can try again.
    pub async fn submit_reward(
        &self,
        session_id: &str,
        choice: RewardChoice,
        results: &GameResultService,
    ) -> Result<GameResult, SessionError> {
        let driver = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or(SessionError::NotFound)?;

        let outcome = match driver.build_summary(choice) {
            Ok(summary) => {
                let new = NewGameResult::from_summary(&self.player_name, &summary);
                results.create(new).await.map_err(SessionError::from)
            }
            Err(err) => Err(SessionError::from(err)),
        };

        match outcome {
            Ok(result) => {
                driver.shutdown();
                SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
                SESSIONS_ACTIVE.dec();
                tracing::info!(session_id, result_id = %result.id, "Session completed");
                Ok(result)
            }
            Err(err) => {
                self.sessions
                    .write()
                    .await
                    .insert(session_id.to_string(), driver);
                Err(err)
            }
        }
    }

    pub async fn remove_session(&self, session_id: &str) -> Result<(), SessionError> {
        let driver = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or(SessionError::NotFound)?;

        driver.shutdown();
        SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!(session_id, "Session removed");
        Ok(())
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions left idle past the timeout, and finished ones left
    /// idle past the grace period. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, driver)| {
                let idle = driver.idle_for();
                idle >= self.limits.idle_timeout
                    || (driver.screen() == Screen::Finished && idle >= self.limits.finished_grace)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &expired {
            if let Some(driver) = sessions.remove(session_id) {
                driver.shutdown();
                SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
                SESSIONS_ACTIVE.dec();
                tracing::info!(session_id = %session_id, "Idle session expired");
            }
        }
        expired.len()
    }

    /// Runs `evict_idle` every sweep interval until the service is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self.limits.sweep_interval;
        let service: Weak<Self> = Arc::downgrade(self);
        tracing::info!("Starting idle session sweeper (interval={}s)", period.as_secs());

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                let evicted = service.evict_idle().await;
                if evicted > 0 {
                    tracing::info!(evicted, "Idle session sweep completed");
                }
            }
        })
    }
}
