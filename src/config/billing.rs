//! Billing policy configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Ledger policy settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BillingConfig {
    /// ISO currency code all amounts are charged in
    #[serde(default = "default_currency_code")]
    pub currency_code: String,

    /// Site host, embedded in bootstrapped plan ids
    #[serde(default = "default_site_host")]
    pub site_host: String,

    /// Site name, used as the card statement descriptor
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Days of access a new subscription gets before its first charge lands
    #[serde(default = "default_grace_init_days")]
    pub grace_init_days: u32,

    /// Days of access granted when resuming a lapsed subscription
    #[serde(default = "default_resume_confirmation_days")]
    pub resume_confirmation_days: u32,
}

impl BillingConfig {
    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let code = &self.currency_code;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(code.clone()));
        }
        if self.site_host.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__SITE_HOST"));
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency_code: default_currency_code(),
            site_host: default_site_host(),
            site_name: default_site_name(),
            grace_init_days: default_grace_init_days(),
            resume_confirmation_days: default_resume_confirmation_days(),
        }
    }
}

fn default_currency_code() -> String {
    "usd".to_string()
}

fn default_site_host() -> String {
    "localhost".to_string()
}

fn default_site_name() -> String {
    "Membership Site".to_string()
}

fn default_grace_init_days() -> u32 {
    1
}

fn default_resume_confirmation_days() -> u32 {
    1
}
