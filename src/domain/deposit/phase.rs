use std::time::SystemTime;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::domain::{
    deposit::event::DepositEvent,
    props::{Amount, CorrelationCode, QrPayload, TransactionId},
};

/// A pending deposit as issued by the remote service. Never mutated once
/// accepted; a new `begin` produces a new one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub correlation_code: CorrelationCode,
    pub qr_payload: QrPayload,
    pub amount: Amount,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Display)]
pub enum FailureReason {
    InsufficientBalance,
    #[display("ServiceError({_0})")]
    ServiceError(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    Submitting {
        amount: Amount,
    },
    AwaitingConfirmation {
        transaction: Transaction,
        remaining_seconds: u32,
    },
    Confirmed {
        transaction: Transaction,
    },
    Expired {
        transaction: Transaction,
    },
    Failed {
        reason: FailureReason,
    },
    Cancelled {
        transaction: Transaction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedAction {
    StartNewDeposit,
    TopUp,
    ContactSupport,
}

/// What the presentation layer shows once a flow ends badly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: &'static str,
    pub action: SuggestedAction,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Confirmed { .. }
                | Phase::Expired { .. }
                | Phase::Failed { .. }
                | Phase::Cancelled { .. }
        )
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Phase::AwaitingConfirmation { transaction, .. }
            | Phase::Confirmed { transaction }
            | Phase::Expired { transaction }
            | Phase::Cancelled { transaction } => Some(transaction),
            Phase::Idle | Phase::Submitting { .. } | Phase::Failed { .. } => None,
        }
    }

    /// The transaction currently being watched, if `id` matches it.
    pub fn awaiting(&self, id: &TransactionId) -> Option<&Transaction> {
        match self {
            Phase::AwaitingConfirmation { transaction, .. } if transaction.id == *id => {
                Some(transaction)
            }
            _ => None,
        }
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        match self {
            Phase::AwaitingConfirmation {
                remaining_seconds, ..
            } => Some(*remaining_seconds),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Submitting { .. } => "submitting",
            Phase::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Phase::Confirmed { .. } => "confirmed",
            Phase::Expired { .. } => "expired",
            Phase::Failed { .. } => "failed",
            Phase::Cancelled { .. } => "cancelled",
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        match self {
            Phase::Expired { .. } => Some(Notice {
                message: "The payment window has closed. Start a new deposit to try again.",
                action: SuggestedAction::StartNewDeposit,
            }),
            Phase::Failed {
                reason: FailureReason::InsufficientBalance,
            } => Some(Notice {
                message: "Your balance is too low. Top up and try again.",
                action: SuggestedAction::TopUp,
            }),
            Phase::Failed {
                reason: FailureReason::ServiceError(_),
            } => Some(Notice {
                message: "We could not confirm your deposit. Contact support if money has left your account.",
                action: SuggestedAction::ContactSupport,
            }),
            _ => None,
        }
    }

    /// Shared by the aggregate and the presentation view so both derive the
    /// same phase from the same events.
    pub(crate) fn apply(&mut self, event: &DepositEvent) {
        let next = match event {
            DepositEvent::DepositRequested(p) => Phase::Submitting { amount: p.amount },
            DepositEvent::TransactionCreated(p) => Phase::AwaitingConfirmation {
                transaction: p.transaction.clone(),
                remaining_seconds: p.budget_seconds,
            },
            DepositEvent::CreationFailed(p) => Phase::Failed {
                reason: p.reason.clone(),
            },
            DepositEvent::DepositConfirmed(_) => match self.transaction() {
                Some(transaction) => Phase::Confirmed {
                    transaction: transaction.clone(),
                },
                None => return,
            },
            DepositEvent::DepositExpired(_) => match self.transaction() {
                Some(transaction) => Phase::Expired {
                    transaction: transaction.clone(),
                },
                None => return,
            },
            DepositEvent::ConfirmationFailed(p) => Phase::Failed {
                reason: p.reason.clone(),
            },
            DepositEvent::DepositCancelled(_) => match self.transaction() {
                Some(transaction) => Phase::Cancelled {
                    transaction: transaction.clone(),
                },
                None => return,
            },
            DepositEvent::BalanceRefreshed(_) => return,
            DepositEvent::FlowReset => Phase::Idle,
        };
        *self = next;
    }

    /// Live countdown update; only meaningful while awaiting.
    pub(crate) fn tick(&mut self, remaining: u32) {
        if let Phase::AwaitingConfirmation {
            remaining_seconds, ..
        } = self
        {
            *remaining_seconds = remaining.min(*remaining_seconds);
        }
    }
}
