//! Arzeka gateway constants
//!
//! Endpoint paths are relative to the configured base URL. The default base
//! URL points at the public test environment.

use std::time::Duration;

/// Test environment root of the Avepay payment gateway
pub const BASE_URL: &str = "https://pwg-test.fasoarzeka.com/AvepayPaymentGatewayUI/avepay-payment/";

/// Token endpoint (username/password grant)
pub const AUTH_ENDPOINT: &str = "auth/getToken";

/// Payment initiation endpoint
pub const INITIATE_PAYMENT_ENDPOINT: &str = "app/initializePayment";

/// Payment status endpoint
pub const PAYMENT_VERIFICATION_ENDPOINT: &str = "app/getThirdPartyMapInfo";

/// Grant type sent with every token request
pub const GRANT_TYPE: &str = "access_token";

/// User agent sent on every request
pub const USER_AGENT: &str = "arzeka-payment-client/1.0";

/// Accept-Language sent on every request
pub const ACCEPT_LANGUAGE: &str = "fr-FR,en-GB;q=0.8,en;q=0.6";

/// Token type assumed when the endpoint omits `token_type`
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Lifetime assumed when the endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// A token expiring within this margin is treated as due for renewal
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Join an endpoint path onto a base URL, keeping exactly one `/` between them.
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
