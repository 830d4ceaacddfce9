//! Faso Arzeka mobile-money payment client
//!
//! Wraps the gateway's payment endpoints around an `AuthSession` from
//! `arzeka-auth`. Every protected call runs `ensure_valid()` first, so a
//! client authenticated once keeps working after its token expires.
//!
//! Two ways in:
//! - `ArzekaClient`: an owned client, one session per instance
//! - `SharedClientRegistry` (and the free functions below it): a single
//!   process-wide client for callers that do not want to carry one around
//!
//! The crate never installs a tracing subscriber; the host application does.

pub mod client;
pub mod config;
pub mod error;
pub mod msisdn;
pub mod payment;
pub mod registry;
pub mod transport;

pub use client::ArzekaClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use msisdn::{format_msisdn, validate_phone_number};
pub use payment::{AdditionalInfo, PaymentInitiation, PaymentRequest, get_reference};
pub use registry::{
    SharedClientRegistry, authenticate, check_payment, close_shared_client, get_shared_client,
    initiate_payment,
};
