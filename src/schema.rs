use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the four reporting quarters of a fiscal year.
///
/// Quarter-keyed data is held in a fixed [`Quarterly`] record indexed by
/// this enum rather than a string-keyed map, so an absent quarter slot is
/// unrepresentable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn index(self) -> usize {
        match self {
            Quarter::Q1 => 0,
            Quarter::Q2 => 1,
            Quarter::Q3 => 2,
            Quarter::Q4 => 3,
        }
    }

    pub fn prev(self) -> Option<Quarter> {
        match self {
            Quarter::Q1 => None,
            Quarter::Q2 => Some(Quarter::Q1),
            Quarter::Q3 => Some(Quarter::Q2),
            Quarter::Q4 => Some(Quarter::Q3),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

/// A fixed record of one value per quarter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(bound = "T: schemars::JsonSchema + Default")]
pub struct Quarterly<T> {
    #[serde(default)]
    pub q1: T,
    #[serde(default)]
    pub q2: T,
    #[serde(default)]
    pub q3: T,
    #[serde(default)]
    pub q4: T,
}

impl<T> Quarterly<T> {
    pub fn from_fn(mut f: impl FnMut(Quarter) -> T) -> Self {
        Self {
            q1: f(Quarter::Q1),
            q2: f(Quarter::Q2),
            q3: f(Quarter::Q3),
            q4: f(Quarter::Q4),
        }
    }

    pub fn get(&self, quarter: Quarter) -> &T {
        match quarter {
            Quarter::Q1 => &self.q1,
            Quarter::Q2 => &self.q2,
            Quarter::Q3 => &self.q3,
            Quarter::Q4 => &self.q4,
        }
    }

    pub fn get_mut(&mut self, quarter: Quarter) -> &mut T {
        match quarter {
            Quarter::Q1 => &mut self.q1,
            Quarter::Q2 => &mut self.q2,
            Quarter::Q3 => &mut self.q3,
            Quarter::Q4 => &mut self.q4,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Quarterly<U> {
        Quarterly {
            q1: f(&self.q1),
            q2: f(&self.q2),
            q3: f(&self.q3),
            q4: f(&self.q4),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quarter, &T)> {
        Quarter::ALL.iter().map(move |q| (*q, self.get(*q)))
    }
}

impl Quarterly<f64> {
    /// Sum across the quarter axis (the flow-account total).
    pub fn total(&self) -> f64 {
        self.q1 + self.q2 + self.q3 + self.q4
    }
}

impl Quarterly<Option<f64>> {
    /// The latest quarter carrying a reported value, checked Q4 back to Q1.
    /// A reported `0` counts; an empty slot does not.
    pub fn latest_reported(&self) -> Option<Quarter> {
        Quarter::ALL
            .iter()
            .rev()
            .copied()
            .find(|q| self.get(*q).is_some())
    }

    pub fn reported_or_zero(&self, quarter: Quarter) -> f64 {
        self.get(quarter).unwrap_or_default()
    }
}

/// Report sections. A through G form the statement; X holds miscellaneous
/// cash adjustments that feed Other Receivables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Section {
    #[schemars(description = "Receipts (flow)")]
    A,
    #[schemars(description = "Expenditures (flow)")]
    B,
    #[schemars(description = "Surplus/Deficit = A - B (derived, flow)")]
    C,
    #[schemars(description = "Financial Assets (stock)")]
    D,
    #[schemars(description = "Financial Liabilities (stock)")]
    E,
    #[schemars(description = "Net Financial Assets = D - E (derived, stock)")]
    F,
    #[schemars(description = "Closing Balance: accumulated surplus + adjustments + period result (derived)")]
    G,
    #[schemars(description = "Miscellaneous cash adjustments routed to Other Receivables (flow)")]
    X,
}

/// Whether a section's cumulative value is a sum over the period or a
/// point-in-time balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AccountNature {
    /// Cumulative = q1 + q2 + q3 + q4.
    Flow,
    /// Cumulative = value of the latest reported quarter. Summing a stock
    /// balance across quarters would double count carried-forward amounts.
    Stock,
}

impl Section {
    pub fn nature(self) -> AccountNature {
        match self {
            Section::D | Section::E | Section::F => AccountNature::Stock,
            _ => AccountNature::Flow,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    #[schemars(description = "A user-editable line item (receipt, expenditure, adjustment)")]
    Regular,

    #[schemars(description = "A VAT refund claim balance derived per VAT category (Section D)")]
    VatReceivable,

    #[schemars(
        description = "A balance derived by the engine (cash at bank, payables, other receivables)"
    )]
    ComputedAsset,

    #[schemars(description = "A Section-X cash adjustment recoverable as an other receivable")]
    MiscellaneousAdjustment,

    #[schemars(
        description = "A display anchor for a category total; excluded from aggregation input"
    )]
    TotalRow,
}

/// The four VAT-recoverable expenditure categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum VatCategory {
    Communication,
    Maintenance,
    Fuel,
    OfficeSupplies,
}

impl VatCategory {
    pub const ALL: [VatCategory; 4] = [
        VatCategory::Communication,
        VatCategory::Maintenance,
        VatCategory::Fuel,
        VatCategory::OfficeSupplies,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VatCategory::Communication => "communication",
            VatCategory::Maintenance => "maintenance",
            VatCategory::Fuel => "fuel",
            VatCategory::OfficeSupplies => "office-supplies",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Partial,
    #[default]
    Unpaid,
}

/// A leaf line item of the activity catalog. The catalog is delivered by a
/// collaborator as static, pre-validated data and consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    #[schemars(
        description = "Unique, stable identifier encoding project/facility/section/subsection/sequence, e.g. 'HIV-HC-B-02-07'"
    )]
    pub code: String,

    pub name: String,

    pub section: Section,

    #[serde(default)]
    pub subsection_code: Option<String>,

    pub display_order: u32,

    pub activity_type: ActivityType,

    #[schemars(description = "Whether the reporter may enter amounts directly on this line")]
    pub is_editable: bool,

    #[schemars(description = "Whether the engine derives this line's value each recomputation")]
    pub is_computed: bool,

    #[serde(default)]
    #[schemars(
        description = "VAT category when this expense is VAT-applicable. Assigned by the catalog; the name-pattern matcher survives only as a migration backfill."
    )]
    pub vat_category: Option<VatCategory>,
}

/// Per-activity reported state for one report instance.
///
/// Every field defaults: a partially seeded draft is the normal case, not
/// an anomaly. `amounts` slots distinguish a reported `0` (`Some(0.0)`)
/// from "not yet reported" (`None`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActivityValue {
    #[serde(default)]
    pub amounts: Quarterly<Option<f64>>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub payment_status: Quarterly<PaymentStatus>,

    #[serde(default)]
    pub amount_paid: Quarterly<f64>,

    #[serde(default)]
    #[schemars(description = "Net-of-VAT invoice amount; VAT-applicable expenses only")]
    pub net_amount: Quarterly<f64>,

    #[serde(default)]
    #[schemars(description = "VAT portion of the invoice; VAT-applicable expenses only")]
    pub vat_amount: Quarterly<f64>,

    #[serde(default)]
    #[schemars(description = "VAT refunds received this quarter against this line's category")]
    pub vat_cleared: Quarterly<f64>,

    #[serde(default)]
    #[schemars(description = "Payable amounts settled this quarter; liability lines only")]
    pub payable_cleared: Quarterly<f64>,

    #[serde(default)]
    #[schemars(description = "Other-receivable amounts collected this quarter; asset lines only")]
    pub other_receivable_cleared: Quarterly<f64>,

    #[serde(default)]
    #[schemars(description = "Prior-year correction posted against this line's balance")]
    pub prior_year_adjustment: Quarterly<f64>,
}

impl ActivityValue {
    /// Convenience constructor for a line reported in a single quarter.
    pub fn reported(quarter: Quarter, amount: f64) -> Self {
        let mut value = Self::default();
        *value.amounts.get_mut(quarter) = Some(amount);
        value
    }
}

/// The authoritative draft state, keyed by canonical activity code.
pub type ValueMap = BTreeMap<String, ActivityValue>;

/// Closing balances of the prior quarter's finalized execution, fetched
/// once per report session and read-only thereafter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PreviousQuarterBalances {
    #[schemars(
        description = "False for the facility's first reporting quarter; every rollover then opens at zero"
    )]
    pub exists: bool,

    #[serde(default)]
    pub quarter: String,

    #[serde(default)]
    pub closing_balances: ClosingBalances,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClosingBalances {
    #[serde(rename = "D", default)]
    pub d: BTreeMap<String, f64>,

    #[serde(rename = "E", default)]
    pub e: BTreeMap<String, f64>,

    #[serde(rename = "VAT", default)]
    #[schemars(
        description = "Closing VAT receivable per category. Older snapshots omit this map; VAT openings are then reconstructed from Section-D entries."
    )]
    pub vat: Option<BTreeMap<VatCategory, f64>>,
}

impl PreviousQuarterBalances {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Per-category quarterly totals plus the cumulative balance under the
/// category's flow/stock rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryTotal {
    #[serde(flatten)]
    pub quarters: Quarterly<f64>,
    pub cumulative_balance: f64,
}

/// Everything the engine derives from one recomputation pass. Ephemeral:
/// never persisted, recomputed on every mutation of the value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComputedValues {
    pub receipts: CategoryTotal,
    pub expenditures: CategoryTotal,
    pub surplus: CategoryTotal,
    pub financial_assets: CategoryTotal,
    pub financial_liabilities: CategoryTotal,
    pub net_financial_assets: CategoryTotal,
    pub closing_balance: CategoryTotal,

    pub cash_at_bank: Quarterly<f64>,
    pub payables: BTreeMap<String, Quarterly<f64>>,
    pub vat_receivables: BTreeMap<VatCategory, Quarterly<f64>>,
    pub other_receivables: Quarterly<f64>,
    pub prior_year_adjustments: Quarterly<f64>,
}
