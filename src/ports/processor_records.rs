//! Typed processor records.
//!
//! The processor's JSON shapes drift across API versions. Fields that moved
//! are modelled as optional and resolved through ordered extractor lists where
//! the first extractor that finds something wins. Unknown fields are kept in
//! `extra` so the raw response can be stored on the ledger unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::billing::{BillingInterval, CardSummary};

use super::GatewayError;

/// A card object, in any of the shapes the processor has used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub exp_month: Option<u32>,
    #[serde(default)]
    pub exp_year: Option<i32>,
}

impl CardDetails {
    /// Summary for the ledger, if the card reports all three fields.
    pub fn summary(&self) -> Option<CardSummary> {
        Some(CardSummary {
            last4: self.last4.clone()?,
            exp_month: self.exp_month?,
            exp_year: self.exp_year?,
        })
    }
}

/// A paged list wrapper (`{ "data": [...] }`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardList {
    #[serde(default)]
    pub data: Vec<CardDetails>,
}

impl CardList {
    fn find(&self, id: &str) -> Option<&CardDetails> {
        self.data.iter().find(|c| c.id.as_deref() == Some(id))
    }
}

/// A single payment capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    /// Minor units.
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<CardDetails>,
    #[serde(default)]
    pub card: Option<CardDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

type ChargeCardExtractor = fn(&Charge) -> Option<&CardDetails>;

fn charge_source_card(charge: &Charge) -> Option<&CardDetails> {
    charge
        .source
        .as_ref()
        .filter(|s| s.object.as_deref() == Some("card"))
}

fn charge_legacy_card(charge: &Charge) -> Option<&CardDetails> {
    charge.card.as_ref()
}

/// Newer API versions report `source`, older ones `card`.
const CHARGE_CARD_EXTRACTORS: &[ChargeCardExtractor] = &[charge_source_card, charge_legacy_card];

impl Charge {
    /// Card used for this charge, whichever shape it arrived in.
    pub fn card_summary(&self) -> Option<CardSummary> {
        CHARGE_CARD_EXTRACTORS
            .iter()
            .find_map(|extract| extract(self))
            .and_then(CardDetails::summary)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A stored-payment-method record at the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub default_source: Option<String>,
    #[serde(default)]
    pub sources: Option<CardList>,
    #[serde(default)]
    pub default_card: Option<String>,
    #[serde(default)]
    pub cards: Option<CardList>,
    #[serde(default)]
    pub active_card: Option<CardDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

type CustomerCardExtractor = fn(&Customer) -> Option<&CardDetails>;

fn customer_default_source(customer: &Customer) -> Option<&CardDetails> {
    let id = customer.default_source.as_deref()?;
    customer.sources.as_ref()?.find(id)
}

fn customer_default_card(customer: &Customer) -> Option<&CardDetails> {
    let id = customer.default_card.as_deref()?;
    customer.cards.as_ref()?.find(id)
}

fn customer_active_card(customer: &Customer) -> Option<&CardDetails> {
    customer.active_card.as_ref()
}

/// `default_source` (2015-02-15+), `default_card` (2013-07-05+), `active_card` (older).
const CUSTOMER_CARD_EXTRACTORS: &[CustomerCardExtractor] = &[
    customer_default_source,
    customer_default_card,
    customer_active_card,
];

impl Customer {
    /// Default card on file, whichever shape it arrived in.
    pub fn default_card(&self) -> Option<CardSummary> {
        CUSTOMER_CARD_EXTRACTORS
            .iter()
            .find_map(|extract| extract(self))
            .and_then(CardDetails::summary)
    }

    /// Decodes a previously stored raw customer response.
    pub fn from_stored(value: &Value) -> Option<Self> {
        serde_json::from_value::<Customer>(value.clone())
            .ok()
            .filter(|c| !c.id.is_empty())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A processor-side subscription object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSubscription {
    #[serde(default)]
    pub id: Option<String>,
    pub customer: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
}

/// A recurring billing template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub interval: Option<BillingInterval>,
    #[serde(default)]
    pub interval_count: Option<u32>,
    #[serde(default)]
    pub trial_period_days: Option<u32>,
}

/// Event types the reconciler distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ChargeSucceeded,
    ChargeFailed,
    ChargeRefunded,
    ChargeDisputed,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    TrialWillEnd,
    Unknown(String),
}

impl From<String> for EventKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "charge.succeeded" => EventKind::ChargeSucceeded,
            "charge.failed" => EventKind::ChargeFailed,
            "charge.refunded" => EventKind::ChargeRefunded,
            "charge.disputed" | "charge.dispute.created" => EventKind::ChargeDisputed,
            "customer.subscription.created" => EventKind::SubscriptionCreated,
            "customer.subscription.updated" => EventKind::SubscriptionUpdated,
            "customer.subscription.deleted" => EventKind::SubscriptionDeleted,
            "customer.subscription.trial_will_end" => EventKind::TrialWillEnd,
            _ => EventKind::Unknown(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// A canonical event fetched from the processor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self.event_type.clone())
    }

    /// Decodes the event's object as a typed record.
    pub fn object<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            GatewayError::Protocol(format!(
                "event {} carries an unexpected {} object: {}",
                self.id, self.event_type, e
            ))
        })
    }
}

/// The part of an inbound webhook body that is trusted: the event id.
///
/// Everything else in the body is re-fetched from the processor over the
/// authenticated channel before anything is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookNotification {
    #[serde(default)]
    pub id: Option<String>,
}

impl WebhookNotification {
    /// Parses a webhook body, returning the event id it names.
    ///
    /// Returns `None` for undecodable bodies and for bodies without a
    /// non-empty `id`.
    pub fn event_id(payload: &[u8]) -> Option<String> {
        serde_json::from_slice::<WebhookNotification>(payload)
            .ok()?
            .id
            .filter(|id| !id.trim().is_empty())
    }
}
