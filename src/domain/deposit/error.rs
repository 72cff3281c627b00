use derive_more::{Display, From};

use crate::domain::props::Amount;

#[derive(Debug, PartialEq, Display, From)]
pub enum DepositError {
    #[display("{_0}")]
    Validation(ValidationError),
    FlowInProgress,
}

impl std::error::Error for DepositError {}

#[derive(Debug, PartialEq, Display)]
pub enum ValidationError {
    NonPositive,
    FractionalAmount,
    #[display("BelowMinimum({minimum})")]
    BelowMinimum { minimum: Amount },
}

impl std::error::Error for ValidationError {}
