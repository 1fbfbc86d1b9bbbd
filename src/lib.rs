//! # Execution Report Engine
//!
//! A library for computing quarterly financial-execution reports for
//! health-program facilities: double-entry balance derivation, quarter
//! rollover, hierarchical aggregation, and submission validation.
//!
//! ## Core Concepts
//!
//! - **Activity Tree**: the static catalog of line items, grouped into
//!   sections A (receipts) through G (closing balance) plus X
//!   (miscellaneous adjustments)
//! - **Flow vs Stock**: receipts and expenditures sum across quarters;
//!   balance-sheet sections carry the latest reported quarter forward
//! - **Expense Ledger**: every Section-B line normalized into
//!   {gross, net, vat, status, paid} for one quarter
//! - **Balance Calculator**: derives Cash at Bank, Payables, VAT
//!   Receivables, and Other Receivables by double entry, chained Q1..Q4
//! - **Accounting Identity**: Net Financial Assets (F) must equal the
//!   Closing Balance (G); drift is surfaced, never silently corrected
//!
//! ## Example
//!
//! ```rust,ignore
//! use execution_report_engine::*;
//!
//! let tree: ActivityTree = serde_json::from_str(&catalog_json)?;
//! let previous: PreviousQuarterBalances = serde_json::from_str(&snapshot_json)?;
//! let context = QuarterContext::new(Quarter::Q2);
//!
//! let mut draft = ReportDraft::new(tree, previous, context, ValueMap::new())?;
//! draft.set_amount("HIV-HC-A-01", Quarter::Q2, Some(250_000.0))?;
//! draft.set_payment("HIV-HC-B-01", Quarter::Q2, PaymentStatus::Paid, None)?;
//!
//! let result = draft.validate(Some(300_000.0));
//! if result.is_valid {
//!     submit(draft.values(), draft.computed());
//! }
//! ```

pub mod activity_tree;
pub mod aggregate;
pub mod balance;
pub mod codes;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod quarters;
pub mod rollover;
pub mod schema;
pub mod utils;
pub mod validate;

pub use activity_tree::{ActivityTree, Mappings, SectionNode, SubCategory};
pub use aggregate::{ReportedQuarters, TableProjection};
pub use balance::{
    clear_other_receivable, clear_payable, clear_vat, post_prior_year_adjustment,
    AdjustmentTarget, BalanceCalculator, BalanceSet, NegativePolicy,
};
pub use engine::{recompute, ReportDraft};
pub use error::{EngineError, Result};
pub use ingest::{normalize_values, RawActivityValue};
pub use ledger::{build_ledger, ExpenseLine};
pub use quarters::QuarterContext;
pub use rollover::RolloverResolver;
pub use schema::*;
pub use validate::{
    validate, BalanceVerifier, Finding, LocalVerifier, Severity, ValidationResult,
    VerificationTickets, IDENTITY_TOLERANCE,
};

use log::info;

/// One-shot derivation for callers that hold a plain value map and do not
/// need the editing session around it.
pub fn compute_report(
    tree: &ActivityTree,
    previous: &PreviousQuarterBalances,
    values: &ValueMap,
) -> Result<ComputedValues> {
    let mut tree = tree.clone();
    tree.backfill_vat_categories();
    let mappings = Mappings::from_tree(&tree)?;
    info!(
        "computing report: {} activities, prior snapshot {}",
        tree.total_activities(),
        if previous.exists { previous.quarter.as_str() } else { "absent" }
    );
    Ok(engine::recompute(&tree, &mappings, previous, values))
}
