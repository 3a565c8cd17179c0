//! The server's log as a [`VersionStream`].

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpResponse};
use crate::retry::with_retry;
use crate::stream::VersionStream;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::SystemTime;
use tracing::debug;
use verstream_protocol::messages::stream_path;
use verstream_protocol::{ErrorBody, Version, VersionedEntity};

/// Session credentials of a logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User whose stream is accessed.
    pub user_id: String,
    /// Session token sent as bearer.
    pub session_token: String,
    /// Local estimate of the session expiry.
    pub expires_at: Option<SystemTime>,
}

impl Credentials {
    /// Creates credentials without a known expiry.
    pub fn new(user_id: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_token: session_token.into(),
            expires_at: None,
        }
    }

    /// Sets the expiry.
    pub fn with_expiry(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the credentials are known to have expired at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Direct access to a user's log on the server.
pub struct RemoteStream<C> {
    client: C,
    config: ClientConfig,
    credentials: RwLock<Credentials>,
}

impl<C: HttpClient> RemoteStream<C> {
    /// Creates a remote stream.
    pub fn new(client: C, config: ClientConfig, credentials: Credentials) -> Self {
        Self {
            client,
            config,
            credentials: RwLock::new(credentials),
        }
    }

    /// Replaces the credentials, e.g. after logging in again.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write() = credentials;
    }

    /// Returns the current credentials.
    pub fn credentials(&self) -> Credentials {
        self.credentials.read().clone()
    }

    fn current(&self) -> SyncResult<(String, String)> {
        let credentials = self.credentials.read();
        if credentials.is_expired(SystemTime::now()) {
            return Err(SyncError::Auth("session expired".into()));
        }
        let url = format!(
            "{}{}",
            self.config.base_url,
            stream_path(&credentials.user_id)
        );
        Ok((url, credentials.session_token.clone()))
    }
}

#[async_trait]
impl<C: HttpClient> VersionStream for RemoteStream<C> {
    async fn init(&self) -> SyncResult<()> {
        self.current().map(|_| ())
    }

    async fn load_from(
        &self,
        start: Version,
        on_entity: &mut (dyn FnMut(VersionedEntity) + Send),
    ) -> SyncResult<()> {
        let (url, token) = self.current()?;
        let url = format!("{url}?start={}", start.get());
        let (client, url, token) = (&self.client, url.as_str(), token.as_str());
        let response = with_retry(&self.config.retry, "load", || async move {
            check_status(client.get(url, token).await?)
        })
        .await?;

        let entities: Vec<VersionedEntity> = serde_json::from_slice(&response.body)?;
        debug!(%start, count = entities.len(), "remote entities loaded");
        for entity in entities {
            on_entity(entity);
        }
        Ok(())
    }

    /// Sends the whole batch as one request, so the server accepts all of it
    /// or none.
    async fn append(&self, entities: Vec<VersionedEntity>) -> SyncResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let (url, token) = self.current()?;
        let body = serde_json::to_vec(&entities)?;
        let (client, url, token, body) = (&self.client, url.as_str(), token.as_str(), &body);
        with_retry(&self.config.retry, "append", || async move {
            check_status(client.post_json(url, token, body.clone()).await?)
        })
        .await?;
        debug!(count = entities.len(), first = %entities[0].version, "remote batch appended");
        Ok(())
    }
}

/// Maps a response status to the client error policy.
fn check_status(response: HttpResponse) -> SyncResult<HttpResponse> {
    let message = || {
        serde_json::from_slice::<ErrorBody>(&response.body)
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("HTTP {}", response.status))
    };
    match response.status {
        200..=299 => Ok(response),
        401 | 403 => Err(SyncError::Auth(message())),
        409 => {
            // the server's text already names the conflict
            let text = message();
            let detail = text.strip_prefix("conflict: ").unwrap_or(&text);
            Err(SyncError::Conflict(detail.to_string()))
        }
        400 => Err(SyncError::Protocol(message())),
        500..=599 => Err(SyncError::transport_retryable(message())),
        _ => Err(SyncError::transport_fatal(message())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::stream::load_all;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays canned responses and records requests.
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<SyncResult<HttpResponse>>>,
        requests: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl ScriptedClient {
        fn with(responses: Vec<SyncResult<HttpResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }

        fn next(&self) -> SyncResult<HttpResponse> {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(204, Vec::new())))
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn get(&self, url: &str, bearer: &str) -> SyncResult<HttpResponse> {
            self.requests.lock().push((url.into(), bearer.into(), None));
            self.next()
        }

        async fn post_json(&self, url: &str, bearer: &str, body: Vec<u8>) -> SyncResult<HttpResponse> {
            let body = String::from_utf8(body).unwrap();
            self.requests.lock().push((url.into(), bearer.into(), Some(body)));
            self.next()
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("http://server").with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        )
    }

    fn stream(responses: Vec<SyncResult<HttpResponse>>) -> RemoteStream<ScriptedClient> {
        RemoteStream::new(
            ScriptedClient::with(responses),
            config(),
            Credentials::new("u1", "tok"),
        )
    }

    #[tokio::test]
    async fn load_builds_url_and_parses_entities() {
        let body = r#"[{"version":3,"entity":1,"type":"tombstone"}]"#;
        let remote = stream(vec![Ok(HttpResponse::new(200, body))]);

        let entities = load_all(&remote, Version(3)).await.unwrap();
        assert_eq!(entities, vec![VersionedEntity::tombstone(3, 1)]);

        let requests = remote.client.requests.lock();
        assert_eq!(requests[0].0, "http://server/users/u1/stream?start=3");
        assert_eq!(requests[0].1, "tok");
    }

    #[tokio::test]
    async fn status_mapping() {
        let error = |status: u16| HttpResponse::new(status, r#"{"error":"nope"}"#);

        let remote = stream(vec![Ok(error(401))]);
        assert!(matches!(load_all(&remote, Version(0)).await, Err(SyncError::Auth(_))));

        let remote = stream(vec![Ok(error(409))]);
        let err = remote.append(vec![VersionedEntity::tombstone(0, 0)]).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("nope"));

        let remote = stream(vec![Ok(error(400))]);
        assert!(matches!(
            remote.append(vec![VersionedEntity::tombstone(0, 0)]).await,
            Err(SyncError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let remote = stream(vec![
            Ok(HttpResponse::new(503, "")),
            Err(SyncError::transport_retryable("reset")),
            Ok(HttpResponse::new(204, "")),
        ]);
        remote.append(vec![VersionedEntity::tombstone(0, 0)]).await.unwrap();
        assert_eq!(remote.client.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let remote = stream((0..5).map(|_| Ok(HttpResponse::new(500, ""))).collect());
        let err = remote.append(vec![VersionedEntity::tombstone(0, 0)]).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(remote.client.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn batch_is_sent_as_one_request() {
        let remote = RemoteStream::new(
            ScriptedClient::default(),
            config().with_push_batch_size(2),
            Credentials::new("u1", "tok"),
        );
        let entities: Vec<_> = (0..5).map(|v| VersionedEntity::tombstone(v, 0)).collect();
        remote.append(entities.clone()).await.unwrap();
        remote.append(Vec::new()).await.unwrap();

        let requests = remote.client.requests.lock();
        assert_eq!(requests.len(), 1);
        let sent: Vec<VersionedEntity> =
            serde_json::from_str(requests[0].2.as_deref().unwrap()).unwrap();
        assert_eq!(sent, entities);
    }

    #[tokio::test]
    async fn server_conflict_message_is_not_prefixed_twice() {
        let body = r#"{"error":"conflict: version v5 already exists"}"#;
        let remote = stream(vec![Ok(HttpResponse::new(409, body))]);
        let err = remote.append(vec![VersionedEntity::tombstone(5, 0)]).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "conflict: version v5 already exists");
    }

    #[tokio::test]
    async fn expired_credentials_fail_before_network() {
        let remote = stream(vec![]);
        remote.set_credentials(
            Credentials::new("u1", "tok").with_expiry(SystemTime::now() - Duration::from_secs(1)),
        );
        assert!(matches!(remote.init().await, Err(SyncError::Auth(_))));
        assert!(matches!(
            remote.append(vec![VersionedEntity::tombstone(0, 0)]).await,
            Err(SyncError::Auth(_))
        ));
        assert!(remote.client.requests.lock().is_empty());
    }
}
