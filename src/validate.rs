//! Report validation: blocking checks that gate submission and the
//! informational accounting-identity check that never does.

use schemars::JsonSchema;
use serde::Serialize;

use crate::activity_tree::{ActivityTree, Mappings};
use crate::error::Result;
use crate::ledger::build_ledger;
use crate::schema::{ComputedValues, Quarter, Section, ValueMap};

/// Absolute tolerance for the Net Financial Assets vs Closing Balance
/// comparison. Transient drift below this is floating-point noise from
/// mid-edit states, not a bookkeeping problem.
pub const IDENTITY_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Submission is refused until resolved.
    Blocking,
    /// Surfaced as a warning; submission still permitted.
    Informational,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Finding {
    /// The activity code or derived field the finding points at.
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ValidationResult {
    /// True when no blocking finding is present. Informational findings
    /// never flip this.
    pub is_valid: bool,
    pub errors: Vec<Finding>,
}

impl ValidationResult {
    fn from_findings(errors: Vec<Finding>) -> Self {
        let is_valid = errors.iter().all(|f| f.severity != Severity::Blocking);
        Self { is_valid, errors }
    }

    pub fn blocking(&self) -> impl Iterator<Item = &Finding> {
        self.errors
            .iter()
            .filter(|f| f.severity == Severity::Blocking)
    }
}

/// Runs every check over the current draft.
///
/// `budget` is the planned expenditure ceiling per quarter; `None` skips
/// the budget-cap check entirely.
pub fn validate(
    tree: &ActivityTree,
    mappings: &Mappings,
    values: &ValueMap,
    computed: &ComputedValues,
    budget: Option<f64>,
) -> ValidationResult {
    let mut findings = Vec::new();

    check_non_negative(tree, values, &mut findings);
    check_payment_caps(tree, mappings, values, &mut findings);
    if let Some(budget) = budget {
        check_budget_cap(computed, budget, &mut findings);
    }
    check_over_clearance(mappings, computed, &mut findings);
    check_accounting_identity(computed, &mut findings);

    let result = ValidationResult::from_findings(findings);
    if !result.is_valid {
        log::debug!(
            "validation failed with {} blocking finding(s)",
            result.blocking().count()
        );
    }
    result
}

fn check_non_negative(tree: &ActivityTree, values: &ValueMap, findings: &mut Vec<Finding>) {
    for activity in tree.all_leaves() {
        if !activity.is_editable {
            continue;
        }
        let Some(value) = values.get(&activity.code) else {
            continue;
        };
        for (quarter, slot) in value.amounts.iter() {
            if let Some(amount) = slot {
                if *amount < 0.0 {
                    findings.push(Finding {
                        field: activity.code.clone(),
                        message: format!(
                            "{}: reported amount {} for {} is negative",
                            activity.name,
                            amount,
                            quarter.label()
                        ),
                        severity: Severity::Blocking,
                    });
                }
            }
        }
    }
}

/// Over-payment is reported, never clamped: a paid amount above the gross
/// invoice is a data-entry error the reporter has to resolve.
fn check_payment_caps(
    tree: &ActivityTree,
    mappings: &Mappings,
    values: &ValueMap,
    findings: &mut Vec<Finding>,
) {
    for quarter in Quarter::ALL {
        for line in build_ledger(tree, mappings, values, quarter) {
            if line.amount_paid > line.gross {
                findings.push(Finding {
                    field: line.code.clone(),
                    message: format!(
                        "{}: amount paid {} exceeds the invoice amount {} in {}",
                        line.name,
                        line.amount_paid,
                        line.gross,
                        quarter.label()
                    ),
                    severity: Severity::Blocking,
                });
            }
        }
    }
}

fn check_budget_cap(computed: &ComputedValues, budget: f64, findings: &mut Vec<Finding>) {
    for (quarter, spent) in computed.expenditures.quarters.iter() {
        if *spent > budget {
            findings.push(Finding {
                field: format!("{:?}", Section::B),
                message: format!(
                    "total expenditure {} for {} exceeds the planned budget {}",
                    spent,
                    quarter.label(),
                    budget
                ),
                severity: Severity::Blocking,
            });
        }
    }
}

/// The Other Receivables balance is deliberately unclamped; a negative
/// value means more was collected than was ever routed there. Warned, not
/// blocked: the reporter resolves it by recording the missing adjustment.
fn check_over_clearance(
    mappings: &Mappings,
    computed: &ComputedValues,
    findings: &mut Vec<Finding>,
) {
    for (quarter, balance) in computed.other_receivables.iter() {
        if *balance < 0.0 {
            findings.push(Finding {
                field: mappings.other_receivables_code.clone(),
                message: format!(
                    "other receivables balance {} for {} is negative; more was cleared than recorded",
                    balance,
                    quarter.label()
                ),
                severity: Severity::Informational,
            });
        }
    }
}

fn check_accounting_identity(computed: &ComputedValues, findings: &mut Vec<Finding>) {
    let difference = computed.net_financial_assets.cumulative_balance
        - computed.closing_balance.cumulative_balance;
    if difference.abs() > IDENTITY_TOLERANCE {
        findings.push(Finding {
            field: "net_financial_assets".to_string(),
            message: format!(
                "net financial assets differ from the closing balance by {:.2}",
                difference
            ),
            severity: Severity::Informational,
        });
    }
}

/// External corroboration of the local balance derivation.
///
/// Implementations may call out to a verification service. Failure is not
/// fatal: [`verify_or_assume_balanced`] degrades to "balanced" and the
/// blocking checks above remain the only gate.
pub trait BalanceVerifier {
    /// Returns the identity difference the verifier observed.
    fn verify(&self, computed: &ComputedValues) -> Result<f64>;
}

/// Recomputes the identity difference from the derived totals alone. The
/// default verifier when no external service is configured.
#[derive(Debug, Default)]
pub struct LocalVerifier;

impl BalanceVerifier for LocalVerifier {
    fn verify(&self, computed: &ComputedValues) -> Result<f64> {
        Ok(computed.net_financial_assets.cumulative_balance
            - computed.closing_balance.cumulative_balance)
    }
}

/// Runs the verifier, treating any failure as a balanced report.
pub fn verify_or_assume_balanced(verifier: &dyn BalanceVerifier, computed: &ComputedValues) -> f64 {
    match verifier.verify(computed) {
        Ok(difference) => difference,
        Err(err) => {
            log::warn!("balance verification unavailable, assuming balanced: {err}");
            0.0
        }
    }
}

/// Sequence tickets for in-flight verification calls. Rapid consecutive
/// edits each issue a new ticket; only the result carrying the latest
/// ticket is ever applied, stale ones are discarded without cancellation.
#[derive(Debug, Default)]
pub struct VerificationTickets {
    latest: u64,
}

impl VerificationTickets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn accept(&self, ticket: u64) -> bool {
        ticket == self.latest
    }
}
