//! Input validation for identifiers crossing the engine boundary.

use crate::error::{BillingError, Result};

const MAX_PLAN_CODE_LEN: usize = 64;
const MAX_PAYMENT_REF_LEN: usize = 256;

/// Validate a plan code: non-empty, at most 64 chars, lowercase
/// alphanumeric with `-` or `_`.
pub fn validate_plan_code(code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(BillingError::invalid_argument("plan code must not be empty"));
    }
    if code.len() > MAX_PLAN_CODE_LEN {
        return Err(BillingError::invalid_argument(format!(
            "plan code exceeds {MAX_PLAN_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(BillingError::invalid_argument(format!(
            "plan code contains invalid characters: {code}"
        )));
    }
    Ok(())
}

/// Validate an external payment reference: non-empty, at most 256 chars,
/// ASCII alphanumeric with `-`, `_`, `.` or `:`.
pub fn validate_payment_ref(payment_ref: &str) -> Result<()> {
    if payment_ref.is_empty() {
        return Err(BillingError::invalid_argument(
            "payment reference must not be empty",
        ));
    }
    if payment_ref.len() > MAX_PAYMENT_REF_LEN {
        return Err(BillingError::invalid_argument(format!(
            "payment reference exceeds {MAX_PAYMENT_REF_LEN} characters"
        )));
    }
    if !payment_ref
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return Err(BillingError::invalid_argument(
            "payment reference contains invalid characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_plan_codes() {
        for code in ["starter", "professional", "tier_2", "promo-2024"] {
            assert!(validate_plan_code(code).is_ok(), "{code}");
        }
    }

    #[test]
    fn rejects_bad_plan_codes() {
        assert!(validate_plan_code("").is_err());
        assert!(validate_plan_code("Starter").is_err());
        assert!(validate_plan_code("pro plan").is_err());
        assert!(validate_plan_code(&"x".repeat(65)).is_err());
    }

    #[test]
    fn accepts_typical_payment_refs() {
        for r in ["pay_1NirD82eZvKYlo2C", "ch:2024.06.01:42", "txn-9"] {
            assert!(validate_payment_ref(r).is_ok(), "{r}");
        }
    }

    #[test]
    fn rejects_bad_payment_refs() {
        assert!(validate_payment_ref("").is_err());
        assert!(validate_payment_ref("pay ref").is_err());
        assert!(validate_payment_ref(&"x".repeat(257)).is_err());
    }
}
