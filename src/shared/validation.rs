//! Validation utilities module
//!
//! This module provides input checks shared by the store, the orchestrator
//! and the gateway adapter.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::shared::error::AppError;

fn account_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-]{1,21}$").expect("valid regex"))
}

fn branch_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{6}$").expect("valid regex"))
}

/// Validation utilities for the application
pub struct ValidationUtils;

impl ValidationUtils {
    /// Gateway account references are 2 to 22 characters, alphanumeric or dash
    pub fn validate_account_reference(reference: &str) -> crate::Result<()> {
        if !account_reference_pattern().is_match(reference) {
            return Err(AppError::Validation(format!(
                "Account reference '{}' must be 2-22 alphanumeric characters",
                reference
            )));
        }
        Ok(())
    }

    /// Bank branch codes are six digits
    pub fn validate_branch_code(code: &str) -> crate::Result<()> {
        if !branch_code_pattern().is_match(code) {
            return Err(AppError::Validation("Branch code must be 6 digits".to_string()));
        }
        Ok(())
    }

    /// Amounts must be positive and carry at most cent precision
    pub fn validate_amount(amount: Decimal) -> crate::Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be greater than zero".to_string()));
        }
        if amount.normalize().scale() > 2 {
            return Err(AppError::Validation("Amount cannot have more than 2 decimal places".to_string()));
        }
        Ok(())
    }

    /// Normalise a South African mobile number to ten digits.
    ///
    /// `+27 82 555 1234` and `27825551234` both become `0825551234`.
    pub fn normalize_mobile_number(phone: &str) -> String {
        let mut digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.starts_with("27") && digits.len() == 11 {
            digits = format!("0{}", &digits[2..]);
        }
        digits.truncate(10);
        format!("{:0>10}", digits)
    }

    /// Last four digits of an account or card number, if it has at least one digit.
    ///
    /// Masked inputs such as `****1234` or `321*****7` only contribute the digits
    /// after the last mask character, so `321*****7` yields `7`.
    pub fn last_four(number: &str) -> Option<String> {
        let visible = match number.rfind(|c: char| matches!(c, '*' | 'x' | 'X' | '#' | '•')) {
            Some(idx) => &number[idx..],
            None => number,
        };
        let digits: Vec<char> = visible.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        let start = digits.len().saturating_sub(4);
        Some(digits[start..].iter().collect())
    }
}
