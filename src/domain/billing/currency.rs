//! Currency amount encoding.
//!
//! The processor takes amounts as integers in the currency's smallest unit.
//! For most currencies that is hundredths; zero-decimal currencies (JPY and
//! friends) are already whole units and must not be scaled.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::foundation::ValidationError;

static ZERO_DECIMAL_CURRENCIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND",
        "VUV", "XAF", "XOF", "XPF",
    ]
    .into_iter()
    .collect()
});

/// Returns true if `currency` has no minor unit at the processor.
pub fn is_zero_decimal(currency: &str) -> bool {
    ZERO_DECIMAL_CURRENCIES.contains(currency.to_ascii_uppercase().as_str())
}

/// Encodes and decodes amounts for one configured currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyCodec {
    code: String,
}

impl CurrencyCodec {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into().to_ascii_lowercase(),
        }
    }

    /// Lowercase ISO code as sent on the wire.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_zero_decimal(&self) -> bool {
        is_zero_decimal(&self.code)
    }

    fn minor_digits(&self) -> u32 {
        if self.is_zero_decimal() {
            0
        } else {
            2
        }
    }

    /// Converts a monetary amount into processor minor units.
    ///
    /// Fractions below the minor unit round half away from zero.
    pub fn encode(&self, amount: Decimal) -> Result<i64, ValidationError> {
        let scaled = if self.is_zero_decimal() {
            amount
        } else {
            amount * Decimal::ONE_HUNDRED
        };
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| {
                ValidationError::invalid_format("amount", format!("{} is out of range", amount))
            })
    }

    /// Converts processor minor units back into a monetary amount.
    pub fn decode(&self, minor_units: i64) -> Decimal {
        Decimal::new(minor_units, self.minor_digits())
    }

    /// Renders an amount with the currency's number of decimal places.
    pub fn format(&self, amount: Decimal) -> String {
        let digits = self.minor_digits();
        let mut rounded = amount.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(digits);
        rounded.to_string()
    }
}
