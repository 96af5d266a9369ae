//! Upgrade / downgrade classification.
//!
//! Classification reads the member's currently-attached prior subscription.
//! Callers must classify before cancelling that subscription, otherwise the
//! prior is no longer found and every change reads as `New`.

use serde::{Deserialize, Serialize};

use super::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    Upgrade,
    Downgrade,
}

impl ChangeKind {
    /// Compares the purchased product against the prior one in the same group.
    pub fn classify(purchased: &Product, prior: Option<&Product>) -> Self {
        let Some(prior) = prior else {
            return ChangeKind::New;
        };
        if !purchased.shares_group_with(prior) {
            return ChangeKind::New;
        }
        match (&purchased.group, &prior.group) {
            (Some(new), Some(old)) if new.rank > old.rank => ChangeKind::Upgrade,
            (Some(new), Some(old)) if new.rank < old.rank => ChangeKind::Downgrade,
            _ => ChangeKind::New,
        }
    }
}
