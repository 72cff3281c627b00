use serde::Deserialize;

use crate::domain::{
    deposit::phase::{FailureReason, Transaction},
    props::{Amount, Balance, TransactionId},
};

#[derive(Debug, Clone, Deserialize)]
pub enum DepositCommand {
    // issued by the presentation layer
    BeginDeposit(BeginDepositPayload),
    CancelDeposit,
    ResetFlow,
    // issued by the controller on behalf of its collaborators
    RecordCreation(RecordCreationPayload),
    RecordCreationFailure(RecordCreationFailurePayload),
    ConfirmDeposit(ConfirmDepositPayload),
    ExpireDeposit(ExpireDepositPayload),
    FailConfirmation(FailConfirmationPayload),
    RecordBalance(RecordBalancePayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeginDepositPayload {
    pub amount: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordCreationPayload {
    pub transaction: Transaction,
    pub budget_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordCreationFailurePayload {
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmDepositPayload {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpireDepositPayload {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailConfirmationPayload {
    pub transaction_id: TransactionId,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordBalancePayload {
    pub transaction_id: TransactionId,
    pub balance: Balance,
}
