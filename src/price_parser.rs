use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

// Currency markers seen on store pages plus any Unicode whitespace
// (covers NBSP and narrow NBSP used as thousands separators).
static NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(руб\.?|р\.?|₽|\$|€|£|¥|₹|\s)").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("price text is empty")]
    Empty,

    #[error("not a number: {text:?}")]
    Invalid { text: String },

    #[error("negative price: {value}")]
    Negative { value: Decimal },
}

/// Strips currency symbols and whitespace from `text` and parses the rest
/// as a non-negative decimal.
///
/// A lone `,` is taken as the decimal separator (`89,99`); when both `,` and
/// `.` appear, commas are thousands separators (`1,299.99`).
pub fn parse_price(text: &str) -> Result<Decimal, PriceParseError> {
    let stripped = NOISE.replace_all(text, "");
    if stripped.is_empty() {
        return Err(PriceParseError::Empty);
    }

    let normalized = if stripped.contains('.') {
        stripped.replace(',', "")
    } else {
        stripped.replace(',', ".")
    };

    let value = Decimal::from_str(&normalized).map_err(|_| PriceParseError::Invalid {
        text: text.trim().to_string(),
    })?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(PriceParseError::Negative { value });
    }

    Ok(value)
}
