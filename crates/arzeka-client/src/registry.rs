//! Process-wide shared client
//!
//! `SharedClientRegistry` holds zero or one authenticated `ArzekaClient`.
//! The slot is guarded by a `tokio::sync::Mutex` held across create-or-reuse
//! and across close, so concurrent `authenticate_shared()` calls never
//! produce two live clients and never expose one that is half set up: a new
//! client is installed only after it authenticated successfully.
//!
//! The free functions at the bottom operate on `SharedClientRegistry::global()`
//! for callers that want a functional API.

use std::sync::Arc;

use arzeka_auth::Token;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::ArzekaClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::payment::{PaymentInitiation, PaymentRequest};

static GLOBAL: SharedClientRegistry = SharedClientRegistry::new();

/// Single-slot holder for the shared client.
#[derive(Debug, Default)]
pub struct SharedClientRegistry {
    slot: Mutex<Option<Arc<ArzekaClient>>>,
}

impl SharedClientRegistry {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::const_new(None),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static SharedClientRegistry {
        &GLOBAL
    }

    /// Authenticate the shared client, creating it on first use.
    ///
    /// With the same `config`, the live client is re-authenticated in place.
    /// With a different `config`, a new client is built and authenticated,
    /// then replaces and closes the old one. If authentication fails the
    /// registry is left as it was.
    pub async fn authenticate_shared(
        &self,
        config: ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<Token> {
        let mut slot = self.slot.lock().await;

        if let Some(existing) = slot
            .as_ref()
            .filter(|c| *c.config() == config && !c.is_closed())
        {
            debug!("re-authenticating shared client in place");
            return existing.authenticate(username, password).await;
        }

        let client = Arc::new(ArzekaClient::new(config)?);
        let token = client.authenticate(username, password).await?;

        if let Some(previous) = slot.replace(client) {
            debug!("configuration changed, closing previous shared client");
            previous.close().await;
        } else {
            debug!("created shared client");
        }
        Ok(token)
    }

    /// Current shared client, if any and not closed.
    ///
    /// A client closed directly through `ArzekaClient::close()` is dropped
    /// from the slot here.
    pub async fn get_shared(&self) -> Option<Arc<ArzekaClient>> {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|c| c.is_closed()) {
            debug!("dropping closed shared client");
            *slot = None;
        }
        slot.clone()
    }

    /// Close the shared client and empty the slot. No-op when empty.
    pub async fn close_shared(&self) {
        let previous = self.slot.lock().await.take();
        if let Some(client) = previous {
            client.close().await;
            info!("shared client closed");
        }
    }

    /// `initiate_payment` on the shared client, renewing its token first.
    pub async fn initiate_payment(&self, request: PaymentRequest) -> Result<PaymentInitiation> {
        self.resolve().await?.initiate_payment(request).await
    }

    /// `check_payment` on the shared client, renewing its token first.
    pub async fn check_payment(
        &self,
        mapped_order_id: &str,
        transaction_id: Option<&str>,
    ) -> Result<Value> {
        self.resolve()
            .await?
            .check_payment(mapped_order_id, transaction_id)
            .await
    }

    async fn resolve(&self) -> Result<Arc<ArzekaClient>> {
        let client = self
            .get_shared()
            .await
            .ok_or(Error::Auth(arzeka_auth::Error::CredentialsMissing))?;
        client.session().ensure_valid().await?;
        Ok(client)
    }
}

/// Authenticate the process-wide shared client.
pub async fn authenticate(config: ClientConfig, username: &str, password: &str) -> Result<Token> {
    SharedClientRegistry::global()
        .authenticate_shared(config, username, password)
        .await
}

/// Initiate a payment with the process-wide shared client.
pub async fn initiate_payment(request: PaymentRequest) -> Result<PaymentInitiation> {
    SharedClientRegistry::global().initiate_payment(request).await
}

/// Check a payment with the process-wide shared client.
pub async fn check_payment(mapped_order_id: &str, transaction_id: Option<&str>) -> Result<Value> {
    SharedClientRegistry::global()
        .check_payment(mapped_order_id, transaction_id)
        .await
}

/// The process-wide shared client, if one is live.
pub async fn get_shared_client() -> Option<Arc<ArzekaClient>> {
    SharedClientRegistry::global().get_shared().await
}

/// Close the process-wide shared client.
pub async fn close_shared_client() {
    SharedClientRegistry::global().close_shared().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(expected_token_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/getToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_shared",
                "expires_in": 3600,
            })))
            .expect(expected_token_calls)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/app/getThirdPartyMapInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "PENDING"
            })))
            .mount(&server)
            .await;
        server
    }

    fn config(server: &MockServer) -> ClientConfig {
        ClientConfig {
            max_retries: 0,
            ..ClientConfig::with_base_url(&server.uri())
        }
    }

    #[tokio::test]
    async fn empty_registry_has_no_client() {
        let registry = SharedClientRegistry::new();
        assert!(registry.get_shared().await.is_none());
        // Closing an empty registry is a no-op
        registry.close_shared().await;
        assert!(registry.get_shared().await.is_none());
    }

    #[tokio::test]
    async fn repeated_authentication_reuses_one_client() {
        let server = gateway(2).await;
        let registry = SharedClientRegistry::new();

        registry
            .authenticate_shared(config(&server), "merchant", "pa55")
            .await
            .unwrap();
        let first = registry.get_shared().await.unwrap();

        registry
            .authenticate_shared(config(&server), "merchant", "pa55")
            .await
            .unwrap();
        let second = registry.get_shared().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_closed());
    }

    #[tokio::test]
    async fn close_then_get_returns_none() {
        let server = gateway(1).await;
        let registry = SharedClientRegistry::new();
        registry
            .authenticate_shared(config(&server), "merchant", "pa55")
            .await
            .unwrap();
        let client = registry.get_shared().await.unwrap();

        registry.close_shared().await;
        assert!(registry.get_shared().await.is_none());
        assert!(client.is_closed());

        registry.close_shared().await;
    }

    #[tokio::test]
    async fn client_closed_directly_is_no_longer_shared() {
        let server = gateway(2).await;
        let registry = SharedClientRegistry::new();
        registry
            .authenticate_shared(config(&server), "merchant", "pa55")
            .await
            .unwrap();

        let client = registry.get_shared().await.unwrap();
        client.close().await;
        assert!(registry.get_shared().await.is_none());

        let err = registry.check_payment("O1", None).await.unwrap_err();
        assert!(err.needs_authentication());

        // Authenticating again installs a fresh client
        registry
            .authenticate_shared(config(&server), "merchant", "pa55")
            .await
            .unwrap();
        let fresh = registry.get_shared().await.unwrap();
        assert!(!Arc::ptr_eq(&client, &fresh));
        assert!(!fresh.is_closed());
    }

    #[tokio::test]
    async fn changed_config_replaces_client() {
        let first_server = gateway(1).await;
        let second_server = gateway(1).await;
        let registry = SharedClientRegistry::new();

        registry
            .authenticate_shared(config(&first_server), "merchant", "pa55")
            .await
            .unwrap();
        let first = registry.get_shared().await.unwrap();

        registry
            .authenticate_shared(config(&second_server), "merchant", "pa55")
            .await
            .unwrap();
        let second = registry.get_shared().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.is_closed());
        assert_eq!(second.config().base_url, config(&second_server).base_url);
    }

    #[tokio::test]
    async fn failed_first_authentication_leaves_registry_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/getToken"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let registry = SharedClientRegistry::new();
        let err = registry
            .authenticate_shared(config(&server), "merchant", "wrong")
            .await
            .unwrap_err();
        assert!(err.needs_authentication());
        assert!(registry.get_shared().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_authentication_yields_single_client() {
        let server = gateway(4).await;
        let registry = Arc::new(SharedClientRegistry::new());

        let mut handles = vec![];
        for _ in 0..4 {
            let registry = registry.clone();
            let config = config(&server);
            handles.push(tokio::spawn(async move {
                registry
                    .authenticate_shared(config, "merchant", "pa55")
                    .await
                    .unwrap();
                registry.get_shared().await.unwrap()
            }));
        }

        let mut clients = vec![];
        for h in handles {
            clients.push(h.await.unwrap());
        }
        assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn convenience_call_renews_expired_shared_token() {
        let server = gateway(2).await;
        let registry = SharedClientRegistry::new();
        registry
            .authenticate_shared(config(&server), "merchant", "pa55")
            .await
            .unwrap();

        let client = registry.get_shared().await.unwrap();
        client
            .session()
            .set_token(Token::new(
                "at_stale",
                "Bearer",
                SystemTime::now() - Duration::from_secs(7200),
                Duration::from_secs(3600),
            ))
            .await;

        let status = registry.check_payment("O1", None).await.unwrap();
        assert_eq!(status["status"], "PENDING");
        assert_eq!(client.session().token().await.unwrap().value(), "at_shared");
    }

    #[tokio::test]
    async fn convenience_call_without_shared_client_needs_authentication() {
        let registry = SharedClientRegistry::new();
        let err = registry.check_payment("O1", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(arzeka_auth::Error::CredentialsMissing)
        ));
    }

    #[test]
    fn global_registry_is_a_single_instance() {
        assert!(std::ptr::eq(
            SharedClientRegistry::global(),
            SharedClientRegistry::global()
        ));
    }
}
