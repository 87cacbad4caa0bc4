use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::email::{ConnectorCredentialsResponse, EmailSettings};

/// SMTP settings together with how long they may be reused.
#[derive(Debug, Clone)]
pub struct FetchedCredentials {
    pub settings: EmailSettings,
    /// `None` never expires.
    pub ttl: Option<Duration>,
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchedCredentials>;
}

/// Settings taken from configuration.
pub struct StaticCredentials {
    settings: EmailSettings,
}

impl StaticCredentials {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn fetch(&self) -> Result<FetchedCredentials> {
        Ok(FetchedCredentials {
            settings: self.settings.clone(),
            ttl: None,
        })
    }
}

/// Settings served by an HTTP connector, e.g. an OAuth-backed mail relay.
pub struct ConnectorCredentials {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    default_ttl: Duration,
}

impl ConnectorCredentials {
    pub fn new(url: String, token: Option<String>, default_ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build connector HTTP client")?;

        Ok(Self {
            client,
            url,
            token,
            default_ttl,
        })
    }
}

#[async_trait]
impl CredentialSource for ConnectorCredentials {
    async fn fetch(&self) -> Result<FetchedCredentials> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach credential connector")?
            .error_for_status()
            .context("Credential connector returned an error status")?;

        let body: ConnectorCredentialsResponse = response
            .json()
            .await
            .context("Invalid credential connector response")?;

        let ttl = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);

        tracing::info!(ttl_secs = ttl.as_secs(), "Fetched SMTP credentials from connector");

        Ok(FetchedCredentials {
            settings: body.settings,
            ttl: Some(ttl),
        })
    }
}

struct CachedCredentials {
    settings: EmailSettings,
    expires_at: Option<Instant>,
}

impl CachedCredentials {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Lazily fetched SMTP settings, re-fetched once expired or invalidated.
pub struct CredentialCache {
    source: Box<dyn CredentialSource>,
    cached: Mutex<Option<CachedCredentials>>,
}

impl CredentialCache {
    pub fn new(source: Box<dyn CredentialSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<EmailSettings> {
        // Held across the fetch so concurrent senders share one request.
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref().filter(|entry| entry.is_fresh()) {
            return Ok(entry.settings.clone());
        }

        let fetched = self.source.fetch().await?;
        let settings = fetched.settings.clone();
        *cached = Some(CachedCredentials {
            settings: fetched.settings,
            expires_at: fetched.ttl.map(|ttl| Instant::now() + ttl),
        });

        Ok(settings)
    }

    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::HeaderMap, routing::get, Json, Router};

    fn settings(login: &str) -> EmailSettings {
        EmailSettings {
            server: "smtp.example.com".to_string(),
            port: 587,
            login: login.to_string(),
            password: "secret".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Birthday Challenge".to_string(),
            use_tls: false,
        }
    }

    struct CountingSource {
        fetches: Arc<AtomicUsize>,
        ttl: Option<Duration>,
    }

    #[async_trait]
    impl CredentialSource for CountingSource {
        async fn fetch(&self) -> Result<FetchedCredentials> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(FetchedCredentials {
                settings: settings(&format!("user-{}", n)),
                ttl: self.ttl,
            })
        }
    }

    fn counting_cache(ttl: Option<Duration>) -> (CredentialCache, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            fetches: fetches.clone(),
            ttl,
        };
        (CredentialCache::new(Box::new(source)), fetches)
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_once_while_fresh() {
        let (cache, fetches) = counting_cache(Some(Duration::from_secs(60)));

        assert_eq!(cache.get().await.unwrap().login, "user-1");
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get().await.unwrap().login, "user-1");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_expiry() {
        let (cache, fetches) = counting_cache(Some(Duration::from_secs(60)));

        cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get().await.unwrap().login, "user-2");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_invalidation() {
        let (cache, fetches) = counting_cache(None);

        cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(86_400)).await;
        cache.get().await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        assert_eq!(cache.get().await.unwrap().login, "user-2");
    }

    #[tokio::test]
    async fn static_source_never_expires() {
        let fetched = StaticCredentials::new(settings("static"))
            .fetch()
            .await
            .unwrap();
        assert!(fetched.ttl.is_none());
        assert_eq!(fetched.settings.login, "static");
    }

    #[tokio::test]
    async fn connector_sends_bearer_token_and_reads_ttl() {
        let app = Router::new().route(
            "/credentials",
            get(|headers: HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    == Some("Bearer connector-token");
                let login = if authorized { "oauth-user" } else { "anonymous" };
                Json(serde_json::json!({
                    "settings": {
                        "server": "smtp.example.com",
                        "port": 465,
                        "login": login,
                        "password": "access-token",
                        "from_email": "noreply@example.com",
                        "from_name": "Birthday Challenge",
                        "use_tls": true
                    },
                    "expires_in": 120
                }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let source = ConnectorCredentials::new(
            format!("http://{}/credentials", addr),
            Some("connector-token".to_string()),
            Duration::from_secs(3600),
        )
        .unwrap();

        let fetched = source.fetch().await.unwrap();
        assert_eq!(fetched.settings.login, "oauth-user");
        assert!(fetched.settings.use_tls);
        assert_eq!(fetched.ttl, Some(Duration::from_secs(120)));
    }
}
