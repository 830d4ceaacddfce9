//! Payment request signatures
//!
//! The canonical message is every field of the order, in order, joined with
//! `|`, with the secret as the final segment:
//!
//! `amount|merchantId|mappedOrderId|linkBackToCallingWebsite|linkForUpdateStatus|additionalInfo|secret`
//!
//! A missing field contributes an empty segment so later fields never shift.
//! The signature is `BASE64(SHA256(message))` with standard padding, 44
//! characters long.
//!
//! Field names are accepted in both the wire convention (`merchantId`) and
//! the readable convention (`merchant_id`). Supplying both aliases of one
//! field is rejected.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

const DELIMITER: &str = "|";

/// One signed payment field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignatureField {
    Amount,
    MerchantId,
    MappedOrderId,
    LinkBackToCallingWebsite,
    LinkForUpdateStatus,
    AdditionalInfo,
}

impl SignatureField {
    /// Order used by the gateway.
    pub const DEFAULT_ORDER: [SignatureField; 6] = [
        SignatureField::Amount,
        SignatureField::MerchantId,
        SignatureField::MappedOrderId,
        SignatureField::LinkBackToCallingWebsite,
        SignatureField::LinkForUpdateStatus,
        SignatureField::AdditionalInfo,
    ];

    /// Name as sent in request bodies.
    pub fn wire_name(self) -> &'static str {
        match self {
            SignatureField::Amount => "amount",
            SignatureField::MerchantId => "merchantId",
            SignatureField::MappedOrderId => "mappedOrderId",
            SignatureField::LinkBackToCallingWebsite => "linkBackToCallingWebsite",
            SignatureField::LinkForUpdateStatus => "linkForUpdateStatus",
            SignatureField::AdditionalInfo => "additionalInfo",
        }
    }

    /// Snake-case alias.
    pub fn readable_name(self) -> &'static str {
        match self {
            SignatureField::Amount => "amount",
            SignatureField::MerchantId => "merchant_id",
            SignatureField::MappedOrderId => "mapped_order_id",
            SignatureField::LinkBackToCallingWebsite => "link_back_to_calling_website",
            SignatureField::LinkForUpdateStatus => "link_for_update_status",
            SignatureField::AdditionalInfo => "additional_info",
        }
    }

    /// Resolve either alias to its field.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::DEFAULT_ORDER
            .into_iter()
            .find(|field| field.wire_name() == name || field.readable_name() == name)
    }
}

/// Field values to sign. Absent fields sign as empty segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignaturePayload {
    values: BTreeMap<SignatureField, String>,
}

impl SignaturePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field`, replacing any previous value.
    pub fn with(mut self, field: SignatureField, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn get(&self, field: SignatureField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Build a payload from `(name, value)` pairs using either naming
    /// convention.
    ///
    /// Unknown names and a field supplied under two names are validation
    /// errors.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = BTreeMap::new();
        for (name, value) in fields {
            let name = name.as_ref();
            let field = SignatureField::from_name(name)
                .ok_or_else(|| Error::Validation(format!("unknown signature field: {name}")))?;
            if values.insert(field, value.into()).is_some() {
                return Err(Error::Validation(format!(
                    "signature field supplied more than once: {} / {}",
                    field.readable_name(),
                    field.wire_name()
                )));
            }
        }
        Ok(Self { values })
    }

    /// Values may not contain the delimiter, otherwise two payloads could
    /// share a canonical message.
    fn check_values(&self, order: &[SignatureField]) -> Result<()> {
        for field in order {
            if self.get(*field).is_some_and(|v| v.contains(DELIMITER)) {
                return Err(Error::Validation(format!(
                    "signature field {} must not contain '{DELIMITER}'",
                    field.wire_name()
                )));
            }
        }
        Ok(())
    }

    /// `|`-joined field values in `order`, followed by the secret.
    fn canonical_message(&self, secret: &str, order: &[SignatureField]) -> String {
        let mut segments: Vec<&str> = order
            .iter()
            .map(|field| self.get(*field).unwrap_or_default())
            .collect();
        segments.push(secret);
        segments.join(DELIMITER)
    }
}

/// Assemble a payload from readable argument names.
pub fn build_payload(
    amount: &str,
    merchant_id: &str,
    order_id: &str,
    callback_url: Option<&str>,
    status_url: Option<&str>,
    additional_info: Option<&str>,
) -> SignaturePayload {
    let optional = [
        (SignatureField::LinkBackToCallingWebsite, callback_url),
        (SignatureField::LinkForUpdateStatus, status_url),
        (SignatureField::AdditionalInfo, additional_info),
    ];

    optional.into_iter().fold(
        SignaturePayload::new()
            .with(SignatureField::Amount, amount)
            .with(SignatureField::MerchantId, merchant_id)
            .with(SignatureField::MappedOrderId, order_id),
        |payload, (field, value)| match value {
            Some(value) => payload.with(field, value),
            None => payload,
        },
    )
}

/// Sign `payload` in the default field order.
pub fn generate(secret: &str, payload: &SignaturePayload) -> Result<String> {
    generate_with_order(secret, payload, &SignatureField::DEFAULT_ORDER)
}

/// Sign `payload` with an explicit field order.
pub fn generate_with_order(
    secret: &str,
    payload: &SignaturePayload,
    order: &[SignatureField],
) -> Result<String> {
    if secret.trim().is_empty() {
        return Err(Error::Validation("signing secret must not be empty".into()));
    }
    check_order(order)?;
    payload.check_values(order)?;

    let message = payload.canonical_message(secret, order);
    Ok(STANDARD.encode(Sha256::digest(message.as_bytes())))
}

/// Check `signature` against `payload` in the default field order.
pub fn validate(signature: &str, secret: &str, payload: &SignaturePayload) -> Result<bool> {
    validate_with_order(signature, secret, payload, &SignatureField::DEFAULT_ORDER)
}

/// Check `signature` against `payload` with an explicit field order.
///
/// The comparison runs in constant time over the signature bytes.
pub fn validate_with_order(
    signature: &str,
    secret: &str,
    payload: &SignaturePayload,
    order: &[SignatureField],
) -> Result<bool> {
    let expected = generate_with_order(secret, payload, order)?;
    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

fn check_order(order: &[SignatureField]) -> Result<()> {
    if order.is_empty() {
        return Err(Error::Validation("signature field order is empty".into()));
    }
    for (i, field) in order.iter().enumerate() {
        if order[..i].contains(field) {
            return Err(Error::Validation(format!(
                "signature field listed twice in order: {}",
                field.wire_name()
            )));
        }
    }
    Ok(())
}
