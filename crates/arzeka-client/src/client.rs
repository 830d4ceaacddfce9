//! Arzeka payment client
//!
//! One `ArzekaClient` owns one `AuthSession` and one `Transport`. Protected
//! calls (`initiate_payment`, `check_payment`) run `ensure_valid()` before the
//! request, so a token that expired since `authenticate()` is renewed
//! transparently with the stored credentials.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arzeka_auth::{
    AuthSession, Authenticator, HttpAuthenticator, INITIATE_PAYMENT_ENDPOINT,
    PAYMENT_VERIFICATION_ENDPOINT, SignaturePayload, Token,
};
use serde_json::Value;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::payment::{PaymentInitiation, PaymentRequest};
use crate::transport::Transport;

/// Client for the Arzeka payment gateway.
#[derive(Debug)]
pub struct ArzekaClient {
    config: ClientConfig,
    transport: Transport,
    session: AuthSession,
    closed: AtomicBool,
}

impl ArzekaClient {
    /// Build a client whose tokens come from the gateway's token endpoint.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(&config)?;
        let authenticator = Arc::new(HttpAuthenticator::new(
            transport.http_client().clone(),
            &config.base_url,
        ));
        Ok(Self::from_parts(config, transport, authenticator))
    }

    /// Build a client with a custom token source.
    pub fn with_authenticator(
        config: ClientConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(&config)?;
        Ok(Self::from_parts(config, transport, authenticator))
    }

    fn from_parts(
        config: ClientConfig,
        transport: Transport,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let session = AuthSession::with_margin(authenticator, config.expiry_margin());
        info!(base_url = %config.base_url, "Arzeka payment client initialized");
        Self {
            config,
            transport,
            session,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Token state, expiry queries and manual renewal.
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Authenticate and store the credentials for automatic renewal.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Token> {
        self.ensure_open()?;
        Ok(self.session.authenticate(username, password).await?)
    }

    /// Open a payment and return the gateway response.
    pub async fn initiate_payment(&self, request: PaymentRequest) -> Result<PaymentInitiation> {
        self.ensure_open()?;
        let amount = request.amount;
        let (mapped_order_id, body) = request.into_signed_body()?;

        let token = self.session.valid_token().await?;
        info!(order_id = %mapped_order_id, amount, "initiating payment");
        let response = self
            .transport
            .post_json(INITIATE_PAYMENT_ENDPOINT, &token, &body)
            .await?;

        info!(order_id = %mapped_order_id, "payment initiated successfully");
        Ok(PaymentInitiation {
            mapped_order_id,
            response,
        })
    }

    /// Fetch the status of a payment.
    pub async fn check_payment(
        &self,
        mapped_order_id: &str,
        transaction_id: Option<&str>,
    ) -> Result<Value> {
        self.ensure_open()?;
        if mapped_order_id.trim().is_empty() {
            return Err(Error::Validation(
                "mapped_order_id must be a non-empty string".into(),
            ));
        }

        let mut body = serde_json::json!({ "mappedOrderId": mapped_order_id });
        if let Some(transaction_id) = transaction_id.filter(|id| !id.is_empty()) {
            body["transactionId"] = Value::from(transaction_id);
        }

        let token = self.session.valid_token().await?;
        info!(order_id = mapped_order_id, "checking payment status");
        let response = self
            .transport
            .post_json(PAYMENT_VERIFICATION_ENDPOINT, &token, &body)
            .await?;

        info!(order_id = mapped_order_id, "payment status retrieved");
        Ok(response)
    }

    /// Verify a signature received on a status callback.
    pub fn verify_signature(
        signature: &str,
        secret: &str,
        payload: &SignaturePayload,
    ) -> Result<bool> {
        Ok(arzeka_auth::validate(signature, secret, payload)?)
    }

    /// Drop the session and refuse further calls. Idempotent.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.session.clear().await;
            info!("client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::AdditionalInfo;
    use arzeka_auth::{SignatureField, build_payload};
    use std::time::{Duration, SystemTime};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ClientConfig {
        ClientConfig {
            max_retries: 0,
            ..ClientConfig::with_base_url(&server.uri())
        }
    }

    async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/getToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_live",
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn payment_request() -> PaymentRequest {
        PaymentRequest {
            amount: 5000,
            merchant_id: "M1".into(),
            link_for_update_status: "https://shop.example/webhook".into(),
            link_back_to_calling_website: "https://shop.example/done".into(),
            additional_info: AdditionalInfo::new("Awa", "Ouedraogo", "22670123456"),
            hash_secret: "k1".into(),
            mapped_order_id: Some("O1".into()),
        }
    }

    fn expired_token() -> Token {
        Token::new(
            "at_stale",
            "Bearer",
            SystemTime::now() - Duration::from_secs(7200),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn initiate_payment_posts_signed_body() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/app/initializePayment"))
            .and(header("authorization", "Bearer at_live"))
            .and(body_partial_json(serde_json::json!({
                "amount": 5000,
                "merchant_id": "M1",
                "mappedOrderId": "O1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://pay.example/checkout/O1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArzekaClient::new(config(&server)).unwrap();
        client.authenticate("merchant", "pa55").await.unwrap();

        let result = client.initiate_payment(payment_request()).await.unwrap();
        assert_eq!(result.mapped_order_id, "O1");
        assert_eq!(result.response["url"], "https://pay.example/checkout/O1");
    }

    #[tokio::test]
    async fn expired_token_is_renewed_before_payment_check() {
        let server = MockServer::start().await;
        // Initial authentication plus one automatic renewal
        mount_token_endpoint(&server, 2).await;
        Mock::given(method("POST"))
            .and(path("/app/getThirdPartyMapInfo"))
            .and(body_partial_json(serde_json::json!({
                "mappedOrderId": "O1",
                "transactionId": "T9",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "SUCCESS"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArzekaClient::new(config(&server)).unwrap();
        client.authenticate("merchant", "pa55").await.unwrap();
        client.session().set_token(expired_token()).await;

        let status = client.check_payment("O1", Some("T9")).await.unwrap();
        assert_eq!(status["status"], "SUCCESS");
        assert!(client.session().expiry_info().await.is_valid);
    }

    #[tokio::test]
    async fn protected_call_without_authentication_fails() {
        let server = MockServer::start().await;
        let client = ArzekaClient::new(config(&server)).unwrap();

        let err = client.check_payment("O1", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(arzeka_auth::Error::CredentialsMissing)
        ));
    }

    #[tokio::test]
    async fn injected_expired_token_cannot_renew() {
        let server = MockServer::start().await;
        let client = ArzekaClient::new(config(&server)).unwrap();
        client.session().set_token(expired_token()).await;

        let err = client.check_payment("O1", None).await.unwrap_err();
        assert!(err.needs_authentication());
        // The stale token stays in place after the failed renewal
        let token = client.session().token().await.unwrap();
        assert_eq!(token.value(), "at_stale");
    }

    #[tokio::test]
    async fn invalid_payment_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        let client = ArzekaClient::new(config(&server)).unwrap();
        client.authenticate("merchant", "pa55").await.unwrap();

        let mut request = payment_request();
        request.amount = 50;
        let err = client.initiate_payment(request).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = client.check_payment("", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn payment_api_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/app/initializePayment"))
            .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"message":"duplicate order"}"#))
            .mount(&server)
            .await;

        let client = ArzekaClient::new(config(&server)).unwrap();
        client.authenticate("merchant", "pa55").await.unwrap();

        let err = client.initiate_payment(payment_request()).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert!(!err.needs_authentication());
    }

    #[tokio::test]
    async fn closed_client_refuses_calls() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        let client = ArzekaClient::new(config(&server)).unwrap();
        client.authenticate("merchant", "pa55").await.unwrap();
        client.close().await;
        client.close().await;

        assert!(client.is_closed());
        assert!(client.session().token().await.is_none());
        assert!(matches!(
            client.check_payment("O1", None).await,
            Err(Error::Closed)
        ));
        assert!(matches!(
            client.authenticate("merchant", "pa55").await,
            Err(Error::Closed)
        ));
    }

    #[test]
    fn verify_signature_accepts_gateway_signature() {
        let payload = build_payload("1000", "M1", "O1", None, None, None);
        let signature = arzeka_auth::generate("k1", &payload).unwrap();
        assert!(ArzekaClient::verify_signature(&signature, "k1", &payload).unwrap());

        let tampered = payload.with(SignatureField::Amount, "2000");
        assert!(!ArzekaClient::verify_signature(&signature, "k1", &tampered).unwrap());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ClientConfig {
            base_url: "gw.example".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            ArzekaClient::new(config),
            Err(Error::Config(common::Error::Config(_)))
        ));
    }
}
