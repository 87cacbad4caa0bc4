use std::sync::Arc;

use anyhow::Context;
use mongodb::{bson::doc, Client as MongoClient};

use crate::config::{Config, StorageBackend};
use crate::game::{Scheduler, TokioScheduler};
use crate::models::QuestionBank;
use credentials::{ConnectorCredentials, CredentialCache, CredentialSource, StaticCredentials};
use email_service::{EmailService, LogNotifier, Notifier};
use game_results_service::GameResultService;
use results_store::{MemoryResultsStore, MongoResultsStore, ResultsStore};
use session_service::SessionService;

pub struct AppState {
    pub config: Config,
    pub results: GameResultService,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let bank = match &config.game.question_bank_path {
            Some(path) => QuestionBank::from_json_file(path)?,
            None => QuestionBank::default(),
        };
        tracing::info!(questions = bank.len(), "Question bank loaded");

        let store = build_results_store(&config).await?;
        let notifier = build_notifier(&config)?;
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());

        Ok(Self::with_components(config, bank, store, notifier, scheduler))
    }

    /// Wires the state from already built collaborators and starts the idle
    /// session sweeper, so it must run inside a tokio runtime.
    pub fn with_components(
        config: Config,
        bank: QuestionBank,
        store: Arc<dyn ResultsStore>,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let results = GameResultService::new(store, notifier);
        let sessions = Arc::new(SessionService::new(
            Arc::new(bank),
            config.game.rules,
            config.session.timing(),
            config.session.limits(),
            config.game.player_name.clone(),
            scheduler,
        ));
        sessions.spawn_sweeper();

        Self {
            config,
            results,
            sessions,
        }
    }
}

async fn build_results_store(config: &Config) -> anyhow::Result<Arc<dyn ResultsStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory results store");
            Ok(Arc::new(MemoryResultsStore::new()))
        }
        StorageBackend::Mongo => {
            tracing::info!("Connecting to MongoDB...");
            let client = MongoClient::with_uri_str(&config.storage.mongo_uri)
                .await
                .context("Failed to create MongoDB client")?;
            let mongo = client.database(&config.storage.mongo_database);

            tokio::time::timeout(
                std::time::Duration::from_secs(5),
                mongo.run_command(doc! { "ping": 1 }),
            )
            .await
            .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))?
            .context("MongoDB ping failed")?;

            tracing::info!(
                database = %config.storage.mongo_database,
                "MongoDB connection established successfully"
            );
            Ok(Arc::new(MongoResultsStore::new(mongo)))
        }
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    if !config.email.enabled || EmailService::sending_disabled() {
        tracing::info!("Email delivery disabled, results are only logged");
        return Ok(Arc::new(LogNotifier));
    }

    let source: Box<dyn CredentialSource> = match &config.credentials.connector_url {
        Some(url) => {
            tracing::info!("SMTP credentials will be fetched from connector");
            Box::new(ConnectorCredentials::new(
                url.clone(),
                config.credentials.connector_token.clone(),
                std::time::Duration::from_secs(config.credentials.ttl_secs),
            )?)
        }
        None => Box::new(StaticCredentials::new(config.email.settings.clone())),
    };

    if config.email.recipients.is_empty() {
        tracing::warn!("No notification recipients configured, only players will be copied");
    }

    Ok(Arc::new(EmailService::new(
        Arc::new(CredentialCache::new(source)),
        config.email.recipients.clone(),
    )))
}

pub mod credentials;
pub mod email_service;
pub mod game_results_service;
pub mod results_store;
pub mod session_service;
