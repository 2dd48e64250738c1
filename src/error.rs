use crate::product::ProductId;
use crate::role::{Capability, Role};
use chrono::NaiveDate;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A reason is required to confirm changes")]
    ReasonRequired,
    #[error("Field '{field}' expects a number, got '{value}'")]
    MalformedNumber { field: String, value: String },
    #[error("Unknown product field '{0}'")]
    UnknownField(String),
    #[error("Unknown role '{0}'")]
    UnknownRole(String),
    #[error("Unknown export format '{0}'")]
    UnknownFormat(String),
    #[error("Product id '{0}' appears more than once in the seed catalog")]
    DuplicateProductId(ProductId),
    #[error("The catalog's {0} exceeds the representable range")]
    Overflow(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Product '{0}' does not exist")]
    NotFound(ProductId),
    #[error("No revenue history point for {0}")]
    HistoryPointNotFound(NaiveDate),
    #[error("Category '{0}' is not part of the breakdown")]
    CategoryNotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Role '{role}' lacks the {capability:?} capability")]
    Unauthorized { role: Role, capability: Capability },
    #[error("Failed to seal audit entry: {0}")]
    Seal(String),
}
