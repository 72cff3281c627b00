use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::domain::{
    deposit::phase::{FailureReason, Transaction},
    props::{Amount, Balance, TransactionId},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DepositEvent {
    DepositRequested(DepositRequestedPayload),
    TransactionCreated(TransactionCreatedPayload),
    CreationFailed(CreationFailedPayload),
    DepositConfirmed(DepositConfirmedPayload),
    DepositExpired(DepositExpiredPayload),
    ConfirmationFailed(ConfirmationFailedPayload),
    DepositCancelled(DepositCancelledPayload),
    BalanceRefreshed(BalanceRefreshedPayload),
    FlowReset,
}

impl DomainEvent for DepositEvent {
    fn event_type(&self) -> String {
        let event_type: &str = match self {
            DepositEvent::DepositRequested(_) => "DepositRequested",
            DepositEvent::TransactionCreated(_) => "TransactionCreated",
            DepositEvent::CreationFailed(_) => "CreationFailed",
            DepositEvent::DepositConfirmed(_) => "DepositConfirmed",
            DepositEvent::DepositExpired(_) => "DepositExpired",
            DepositEvent::ConfirmationFailed(_) => "ConfirmationFailed",
            DepositEvent::DepositCancelled(_) => "DepositCancelled",
            DepositEvent::BalanceRefreshed(_) => "BalanceRefreshed",
            DepositEvent::FlowReset => "FlowReset",
        };
        event_type.to_string()
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositRequestedPayload {
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionCreatedPayload {
    pub transaction: Transaction,
    pub budget_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreationFailedPayload {
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositConfirmedPayload {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositExpiredPayload {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationFailedPayload {
    pub transaction_id: TransactionId,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositCancelledPayload {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceRefreshedPayload {
    pub transaction_id: TransactionId,
    pub balance: Balance,
}
