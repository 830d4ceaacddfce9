//! Payment initiation requests
//!
//! A `PaymentRequest` is validated, completed (order reference, encoded
//! URLs, normalised mobile number) and signed before it is sent to
//! `app/initializePayment`. The signed fields are, in order: amount,
//! merchant id, order id, the base64 return URL, the base64 status URL and
//! the additional info as a `{'key': 'value', ...}` literal. The literal
//! matches the rendering existing gateway integrations hash, so the same
//! order yields the same `hashString`.

use arzeka_auth::signature::{self, build_payload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::msisdn::format_msisdn;

/// Amounts must be strictly greater than this (FCFA)
pub const MINIMUM_AMOUNT: u64 = 100;

/// Payer details forwarded as `additionalInfo`.
///
/// When `generate_receipt` is set, `payment_description`,
/// `accounting_office` and `accountant_name` must be filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdditionalInfo {
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    #[serde(rename = "generateReceipt")]
    pub generate_receipt: bool,
    #[serde(rename = "paymentDescription")]
    pub payment_description: String,
    #[serde(rename = "accountingOffice")]
    pub accounting_office: String,
    #[serde(rename = "accountantName")]
    pub accountant_name: String,
    pub address: String,
}

impl AdditionalInfo {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            mobile: mobile.into(),
            ..Self::default()
        }
    }

    /// Ask the gateway to issue a receipt.
    pub fn with_receipt(
        mut self,
        payment_description: impl Into<String>,
        accounting_office: impl Into<String>,
        accountant_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        self.generate_receipt = true;
        self.payment_description = payment_description.into();
        self.accounting_office = accounting_office.into();
        self.accountant_name = accountant_name.into();
        self.address = address.into();
        self
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("mobile", &self.mobile),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::Validation(format!(
                "additional_info must contain first_name, last_name, and mobile (missing {name})"
            )));
        }

        if self.generate_receipt {
            let receipt = [
                ("paymentDescription", &self.payment_description),
                ("accountingOffice", &self.accounting_office),
                ("accountantName", &self.accountant_name),
            ];
            let missing: Vec<&str> = receipt
                .iter()
                .filter(|(_, v)| v.trim().is_empty())
                .map(|(name, _)| *name)
                .collect();
            if !missing.is_empty() {
                return Err(Error::Validation(format!(
                    "when generateReceipt is true, additional_info must contain: {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Signed rendering: `{'first_name': 'Awa', ..., 'generateReceipt': False, ...}`.
    fn signing_literal(&self) -> String {
        let text = |key: &str, value: &str| format!("{}: {}", quote(key), quote(value));
        let entries = [
            text("first_name", &self.first_name),
            text("last_name", &self.last_name),
            text("mobile", &self.mobile),
            format!(
                "'generateReceipt': {}",
                if self.generate_receipt { "True" } else { "False" }
            ),
            text("paymentDescription", &self.payment_description),
            text("accountingOffice", &self.accounting_office),
            text("accountantName", &self.accountant_name),
            text("address", &self.address),
        ];
        format!("{{{}}}", entries.join(", "))
    }
}

/// Quote a string literal: single quotes unless the value holds a single
/// quote and no double quote.
fn quote(value: &str) -> String {
    let delim = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(delim);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

/// Everything needed to open a payment.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Amount in FCFA
    pub amount: u64,
    pub merchant_id: String,
    /// Webhook the gateway calls with status updates
    pub link_for_update_status: String,
    /// Where the payer is sent back after paying
    pub link_back_to_calling_website: String,
    pub additional_info: AdditionalInfo,
    /// Secret shared with the gateway for `hashString`
    pub hash_secret: Secret<String>,
    /// Generated with `get_reference()` when absent
    pub mapped_order_id: Option<String>,
}

/// Result of a successful initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInitiation {
    pub mapped_order_id: String,
    /// Gateway response, usually carrying the payer redirect URL
    pub response: Value,
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.amount <= MINIMUM_AMOUNT {
            return Err(Error::Validation(format!(
                "amount must be a positive number greater than {MINIMUM_AMOUNT}"
            )));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(Error::Validation(
                "merchant_id must be a non-empty string".into(),
            ));
        }
        if self.hash_secret.is_blank() {
            return Err(Error::Validation("hash_secret must not be empty".into()));
        }
        self.additional_info.validate()
    }

    /// Validate, fill defaults, sign, and return the order id with the body.
    pub(crate) fn into_signed_body(self) -> Result<(String, Value)> {
        self.validate()?;

        let mapped_order_id = self
            .mapped_order_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(get_reference);

        let mut additional_info = self.additional_info;
        additional_info.mobile = format_msisdn(&additional_info.mobile);
        let additional_info_literal = additional_info.signing_literal();

        let link_for_update_status = STANDARD.encode(self.link_for_update_status.as_bytes());
        let link_back_to_calling_website =
            STANDARD.encode(self.link_back_to_calling_website.as_bytes());
        let amount = self.amount.to_string();

        let payload = build_payload(
            &amount,
            &self.merchant_id,
            &mapped_order_id,
            Some(&link_back_to_calling_website),
            Some(&link_for_update_status),
            Some(&additional_info_literal),
        );
        let hash_string = signature::generate(self.hash_secret.expose(), &payload)?;

        let body = serde_json::json!({
            "amount": self.amount,
            "merchant_id": self.merchant_id,
            "mappedOrderId": mapped_order_id,
            "additionalInfo": additional_info,
            "linkForUpdateStatus": link_for_update_status,
            "linkBackToCallingWebsite": link_back_to_calling_website,
            "hashString": hash_string,
        });
        Ok((mapped_order_id, body))
    }
}

/// Unique order reference: `eT{YYMMDD}.{HHMMSS}.{microseconds}`.
pub fn get_reference() -> String {
    format!("eT{}", chrono::Local::now().format("%y%m%d.%H%M%S.%6f"))
}
