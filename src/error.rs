use thiserror::Error;

use crate::schema::Quarter;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown activity code: {0}")]
    UnknownActivity(String),

    #[error("Activity {0} is not editable")]
    NotEditable(String),

    #[error("Quarter {0:?} is locked for the current reporting period")]
    QuarterLocked(Quarter),

    #[error("Invalid fiscal year end month: {0}. Must be between 1 and 12")]
    InvalidFiscalYearEndMonth(u32),

    #[error("Activity tree has no {0} line in its catalog")]
    MissingCatalogLine(&'static str),

    #[error("Invalid clearance of {amount} against {target}: {details}")]
    InvalidClearance {
        target: String,
        amount: f64,
        details: String,
    },

    #[error("Accounting identity violation: net financial assets ({net_financial_assets}) != closing balance ({closing_balance}), difference {difference}")]
    AccountingIdentityViolation {
        net_financial_assets: f64,
        closing_balance: f64,
        difference: f64,
    },

    #[error("Balance verification service failed: {0}")]
    VerificationUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
