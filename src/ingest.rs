//! Normalization boundary for raw collaborator payloads.
//!
//! Draft forms deliver amounts as numbers or strings and payment status in
//! two historical shapes (a single scalar applied to every quarter, or a
//! quarter-keyed map). Everything is normalized here, once, into
//! [`ActivityValue`]; the engine never sees the union types.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::codes;
use crate::schema::{ActivityValue, PaymentStatus, Quarterly, ValueMap};
use crate::utils::amount_or_zero;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RawActivityValue {
    #[serde(default)]
    #[schemars(description = "Reported amount per quarter; number, numeric string, or null")]
    pub amounts: Quarterly<Option<Value>>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    #[schemars(description = "Scalar (legacy) or quarter-keyed payment status")]
    pub payment_status: Option<RawPaymentStatus>,

    #[serde(default)]
    pub amount_paid: Option<RawQuarterlyAmount>,

    #[serde(default)]
    pub net_amount: Quarterly<Option<Value>>,

    #[serde(default)]
    pub vat_amount: Quarterly<Option<Value>>,

    #[serde(default)]
    pub vat_cleared: Quarterly<Option<Value>>,

    #[serde(default)]
    pub payable_cleared: Quarterly<Option<Value>>,

    #[serde(default)]
    pub other_receivable_cleared: Quarterly<Option<Value>>,

    #[serde(default)]
    pub prior_year_adjustment: Quarterly<Option<Value>>,
}

/// The two historical payment-status shapes.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawPaymentStatus {
    Scalar(PaymentStatus),
    ByQuarter(Quarterly<PaymentStatus>),
}

/// Amount-paid arrived as a scalar before it became quarter-keyed. The
/// quarter-keyed variant is tried first: a bare `Value` matches anything.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawQuarterlyAmount {
    ByQuarter(Quarterly<Option<Value>>),
    Scalar(Value),
}

impl RawActivityValue {
    pub fn normalize(&self) -> ActivityValue {
        ActivityValue {
            amounts: self.amounts.map(|v| v.as_ref().map(amount_or_zero)),
            comment: self.comment.clone(),
            payment_status: match &self.payment_status {
                None => Quarterly::default(),
                Some(RawPaymentStatus::Scalar(status)) => Quarterly::from_fn(|_| *status),
                Some(RawPaymentStatus::ByQuarter(map)) => map.clone(),
            },
            amount_paid: match &self.amount_paid {
                None => Quarterly::default(),
                Some(RawQuarterlyAmount::Scalar(v)) => {
                    Quarterly::from_fn(|_| amount_or_zero(v))
                }
                Some(RawQuarterlyAmount::ByQuarter(map)) => numeric(map),
            },
            net_amount: numeric(&self.net_amount),
            vat_amount: numeric(&self.vat_amount),
            vat_cleared: numeric(&self.vat_cleared),
            payable_cleared: numeric(&self.payable_cleared),
            other_receivable_cleared: numeric(&self.other_receivable_cleared),
            prior_year_adjustment: numeric(&self.prior_year_adjustment),
        }
    }
}

fn numeric(raw: &Quarterly<Option<Value>>) -> Quarterly<f64> {
    raw.map(|v| v.as_ref().map(amount_or_zero).unwrap_or(0.0))
}

/// Normalizes a whole raw payload into the canonical value map. Codes are
/// alias-resolved; when a legacy and a current code collapse onto the same
/// canonical code the later entry wins, matching how renames were rolled
/// out (the renamed line superseded the legacy one).
pub fn normalize_values(raw: &BTreeMap<String, RawActivityValue>) -> ValueMap {
    raw.iter()
        .map(|(code, value)| (codes::resolve(code), value.normalize()))
        .collect()
}
