//! Input shape checks for registration and money entry
//!
//! Pure functions, no store access. Each returns `Error::Validation` with a
//! reason the presentation layer can show as-is.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::config::PasswordPolicy;
use crate::domain::money;
use crate::domain::result::{Error, Result};

const USERNAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9_-]{3,18}[a-zA-Z0-9]$";
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

const FULL_NAME_MIN_LETTERS: usize = 4;
const FULL_NAME_MAX_LETTERS: usize = 255;

type CompiledPattern = OnceLock<std::result::Result<Regex, regex::Error>>;

static USERNAME_REGEX: CompiledPattern = OnceLock::new();
static EMAIL_REGEX: CompiledPattern = OnceLock::new();

/// Compile `pattern` on first use and hand out the cached regex afterwards
fn compiled(cell: &'static CompiledPattern, pattern: &str) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| Error::Config(format!("invalid pattern {}: {}", pattern, e)))
}

/// Letters and spaces only, 4 to 255 letters once spaces are removed
pub fn validate_full_name(full_name: &str) -> Result<String> {
    let trimmed = full_name.trim();
    let mut letters = 0usize;
    for c in trimmed.chars() {
        if c == ' ' {
            continue;
        }
        if !c.is_alphabetic() {
            return Err(Error::validation(
                "full name may contain only letters and spaces",
            ));
        }
        letters += 1;
    }
    if !(FULL_NAME_MIN_LETTERS..=FULL_NAME_MAX_LETTERS).contains(&letters) {
        return Err(Error::validation(format!(
            "full name must have between {} and {} letters",
            FULL_NAME_MIN_LETTERS, FULL_NAME_MAX_LETTERS
        )));
    }
    Ok(trimmed.to_string())
}

/// 5-20 characters: letters, digits, `_` and `-`, starting and ending with a
/// letter or digit
pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if !compiled(&USERNAME_REGEX, USERNAME_PATTERN)?.is_match(username) {
        return Err(Error::validation(
            "username must be 5-20 characters of letters, digits, '_' or '-', \
             starting and ending with a letter or digit",
        ));
    }
    Ok(username.to_string())
}

/// Basic `local@domain.tld` shape check; stored lowercase
pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if !compiled(&EMAIL_REGEX, EMAIL_PATTERN)?.is_match(email) {
        return Err(Error::validation("email address is not valid"));
    }
    Ok(email.to_lowercase())
}

/// Check a password against the configured policy.
///
/// The password is never trimmed or echoed back in the error.
pub fn validate_password(password: &str, policy: &PasswordPolicy) -> Result<()> {
    let length = password.chars().count();
    if length < policy.min_length {
        return Err(Error::validation(format!(
            "password must be at least {} characters",
            policy.min_length
        )));
    }

    if let Some(c) = password
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !policy.special_characters.contains(*c))
    {
        let shown = if c.is_whitespace() { "whitespace".to_string() } else { format!("'{}'", c) };
        return Err(Error::validation(format!(
            "password may only contain letters, digits and {} (found {})",
            policy.special_characters, shown
        )));
    }

    let mut missing = Vec::new();
    if policy.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        missing.push("a lowercase letter");
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        missing.push("an uppercase letter");
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit");
    }
    if policy.require_special
        && !password
            .chars()
            .any(|c| policy.special_characters.contains(c))
    {
        missing.push("a special character");
    }
    if !missing.is_empty() {
        return Err(Error::validation(format!(
            "password must contain {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Parse a user-entered amount: positive, at most two decimal places.
///
/// Accepts `1,000.50` style thousands separators.
pub fn parse_amount(input: &str) -> Result<Decimal> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(Error::validation("amount is required"));
    }
    let value = Decimal::from_str(&cleaned)
        .map_err(|_| Error::validation(format!("'{}' is not a valid amount", input.trim())))?;
    money::check_amount(value)
}
