//! Phone number (MSISDN) formatting for Burkina Faso mobile money

/// Burkina Faso country code
pub const DEFAULT_COUNTRY_CODE: &str = "226";

/// Subscriber digits following the country code
const SUBSCRIBER_DIGITS: usize = 8;

/// Strip `+`, spaces, dashes and parentheses.
///
/// `"+226 70 12 34 56"` becomes `"22670123456"`.
pub fn format_msisdn(phone_number: &str) -> String {
    phone_number
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect()
}

/// True when the formatted number is `country_code` followed by eight digits.
pub fn validate_phone_number(msisdn: &str, country_code: &str) -> bool {
    let cleaned = format_msisdn(msisdn);
    cleaned.starts_with(country_code)
        && cleaned.len() == country_code.len() + SUBSCRIBER_DIGITS
        && cleaned.chars().all(|c| c.is_ascii_digit())
}
