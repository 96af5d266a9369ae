//! Catalog products as seen by the billing engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ProductId;

/// Recurring billing interval unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Week,
    Month,
    Year,
}

impl BillingInterval {
    /// Processor wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    /// Length of `count` intervals in days, months counted as 30.
    pub fn days(&self, count: u32) -> i64 {
        let unit = match self {
            BillingInterval::Week => 7,
            BillingInterval::Month => 30,
            BillingInterval::Year => 365,
        };
        unit * i64::from(count)
    }
}

/// How a product is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingPeriod {
    /// One payment, access never expires.
    Lifetime,
    /// Charged every `count` intervals.
    Recurring { interval: BillingInterval, count: u32 },
}

/// Upgrade group membership. Higher rank is the better tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub id: String,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub period: BillingPeriod,
    pub group: Option<ProductGroup>,
}

impl Product {
    pub fn is_lifetime(&self) -> bool {
        matches!(self.period, BillingPeriod::Lifetime)
    }

    /// True when both products sit in the same upgrade group.
    pub fn shares_group_with(&self, other: &Product) -> bool {
        match (&self.group, &other.group) {
            (Some(a), Some(b)) => a.id == b.id,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(group: Option<(&str, u32)>) -> Product {
        Product {
            id: ProductId::new("p").unwrap(),
            name: "Gold".to_string(),
            price: dec!(10),
            period: BillingPeriod::Lifetime,
            group: group.map(|(id, rank)| ProductGroup {
                id: id.to_string(),
                rank,
            }),
        }
    }

    #[test]
    fn interval_days_scale_with_count() {
        assert_eq!(BillingInterval::Month.days(3), 90);
        assert_eq!(BillingInterval::Week.days(2), 14);
        assert_eq!(BillingInterval::Year.days(1), 365);
    }

    #[test]
    fn products_share_group_only_when_ids_match() {
        assert!(product(Some(("g", 1))).shares_group_with(&product(Some(("g", 2)))));
        assert!(!product(Some(("g", 1))).shares_group_with(&product(Some(("h", 2)))));
        assert!(!product(None).shares_group_with(&product(None)));
    }

    #[test]
    fn recurring_period_serializes_tagged() {
        let period = BillingPeriod::Recurring {
            interval: BillingInterval::Month,
            count: 1,
        };
        let json = serde_json::to_value(period).unwrap();
        assert_eq!(json["type"], "recurring");
        assert_eq!(json["interval"], "month");
    }
}
