//! Validation module for free-text answers
//!
//! Free text is only ever accepted as the answer to the current step of a
//! flow. Each validator returns the normalized value or a short error key
//! that the formatter turns into a re-prompt:
//!
//! - Passenger phone numbers
//! - Trip prices
//! - Passenger names

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"^\+?[0-9]{9,15}$").expect("Invalid phone regex pattern");
    static ref PRICE_PATTERN: Regex = Regex::new(r"^[0-9]+$").expect("Invalid price regex pattern");
}

/// Lowest accepted price per seat
pub const MIN_PRICE: i64 = 1_000;
/// Highest accepted price per seat
pub const MAX_PRICE: i64 = 1_000_000;
/// Longest accepted passenger name, in characters
pub const MAX_NAME_CHARS: usize = 64;

/// Validates a phone number
///
/// Spaces, dashes and parentheses are stripped before matching; what remains
/// must be 9 to 15 digits with an optional leading `+`.
///
/// # Examples
/// ```
/// use taxi_bot::validation::validate_phone;
///
/// assert_eq!(validate_phone("+998 90 123-45-67"), Ok("+998901234567".to_string()));
/// assert_eq!(validate_phone("12345"), Err("phone-invalid"));
/// ```
pub fn validate_phone(input: &str) -> Result<String, &'static str> {
    let normalized: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();

    if PHONE_PATTERN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err("phone-invalid")
    }
}

/// Validates a price per seat
///
/// # Returns
/// * `Ok(i64)` - The price if it is an integer in `[MIN_PRICE, MAX_PRICE]`
/// * `Err(&str)` - `"price-not-a-number"` or `"price-out-of-range"`
///
/// # Examples
/// ```
/// use taxi_bot::validation::validate_price;
///
/// assert_eq!(validate_price("30000"), Ok(30000));
/// assert_eq!(validate_price("30 000"), Ok(30000));
/// assert_eq!(validate_price("500"), Err("price-out-of-range"));
/// ```
pub fn validate_price(input: &str) -> Result<i64, &'static str> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    if !PRICE_PATTERN.is_match(&digits) {
        return Err("price-not-a-number");
    }

    // Digit strings too long for i64 are out of range by definition.
    let price = digits.parse::<i64>().map_err(|_| "price-out-of-range")?;
    if !(MIN_PRICE..=MAX_PRICE).contains(&price) {
        return Err("price-out-of-range");
    }

    Ok(price)
}

/// Validates a passenger name
///
/// # Examples
/// ```
/// use taxi_bot::validation::validate_passenger_name;
///
/// assert_eq!(validate_passenger_name("  Aziz  "), Ok("Aziz"));
/// assert_eq!(validate_passenger_name(""), Err("name-empty"));
/// ```
pub fn validate_passenger_name(input: &str) -> Result<&str, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("name-empty");
    }

    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err("name-too-long");
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_accepts_international_and_local_forms() {
        assert_eq!(validate_phone("+998901234567"), Ok("+998901234567".to_string()));
        assert_eq!(validate_phone("998901234567"), Ok("998901234567".to_string()));
        assert_eq!(validate_phone("901234567"), Ok("901234567".to_string()));
    }

    #[test]
    fn test_phone_rejects_short_and_non_numeric() {
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("abc12345678").is_err());
        assert!(validate_phone("++998901234567").is_err());
        assert!(validate_phone("9989012345678901").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_price_bounds() {
        assert_eq!(validate_price("1000"), Ok(1000));
        assert_eq!(validate_price("1000000"), Ok(1_000_000));
        assert_eq!(validate_price("999"), Err("price-out-of-range"));
        assert_eq!(validate_price("1000001"), Err("price-out-of-range"));
        assert_eq!(validate_price("99999999999999999999999"), Err("price-out-of-range"));
    }

    #[test]
    fn test_price_rejects_non_numeric() {
        assert_eq!(validate_price("thirty"), Err("price-not-a-number"));
        assert_eq!(validate_price("-5000"), Err("price-not-a-number"));
        assert_eq!(validate_price("30.5"), Err("price-not-a-number"));
        assert_eq!(validate_price(""), Err("price-not-a-number"));
    }

    #[test]
    fn test_only_ascii_digits_count() {
        assert_eq!(validate_phone("٩٩٨٩٠١٢٣٤٥٦٧"), Err("phone-invalid"));
        assert_eq!(validate_phone("+９９８９０１２３４５６７"), Err("phone-invalid"));
        assert_eq!(validate_price("３００００"), Err("price-not-a-number"));
    }

    #[test]
    fn test_name_length_limit() {
        assert!(validate_passenger_name(&"a".repeat(MAX_NAME_CHARS)).is_ok());
        assert_eq!(
            validate_passenger_name(&"a".repeat(MAX_NAME_CHARS + 1)),
            Err("name-too-long")
        );
        assert_eq!(validate_passenger_name("   "), Err("name-empty"));
    }
}
