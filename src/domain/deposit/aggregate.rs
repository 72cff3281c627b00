use async_trait::async_trait;
use cqrs_es::Aggregate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    deposit::{
        command::{
            BeginDepositPayload, ConfirmDepositPayload, DepositCommand, ExpireDepositPayload,
            FailConfirmationPayload, RecordBalancePayload, RecordCreationFailurePayload,
            RecordCreationPayload,
        },
        error::{DepositError, ValidationError},
        event::{
            BalanceRefreshedPayload, ConfirmationFailedPayload, CreationFailedPayload,
            DepositCancelledPayload, DepositConfirmedPayload, DepositEvent, DepositExpiredPayload,
            DepositRequestedPayload, TransactionCreatedPayload,
        },
        phase::Phase,
    },
    props::Amount,
};

// Aggregate
#[derive(Serialize, Default, Deserialize)]
pub struct Deposit {
    phase: Phase,
}

pub struct DepositServices {
    pub minimum_amount: Amount,
}

type DepositResult = Result<Vec<<Deposit as Aggregate>::Event>, <Deposit as Aggregate>::Error>;

#[async_trait]
impl Aggregate for Deposit {
    type Command = DepositCommand;
    type Event = DepositEvent;
    type Error = DepositError;
    type Services = DepositServices;

    fn aggregate_type() -> String {
        "Deposit".to_string()
    }

    async fn handle(&self, command: Self::Command, services: &Self::Services) -> DepositResult {
        match command {
            DepositCommand::BeginDeposit(p) => self.begin(p, services),
            DepositCommand::CancelDeposit => self.cancel(),
            DepositCommand::ResetFlow => self.reset(),
            DepositCommand::RecordCreation(p) => self.record_creation(p),
            DepositCommand::RecordCreationFailure(p) => self.record_creation_failure(p),
            DepositCommand::ConfirmDeposit(p) => self.confirm(p),
            DepositCommand::ExpireDeposit(p) => self.expire(p),
            DepositCommand::FailConfirmation(p) => self.fail_confirmation(p),
            DepositCommand::RecordBalance(p) => self.record_balance(p),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        self.phase.apply(&event);
    }
}

impl Deposit {
    fn begin(&self, p: BeginDepositPayload, services: &DepositServices) -> DepositResult {
        debug!("Beginning deposit of {} from {}", p.amount, self.phase.label());

        require_settled(self)?;
        require_legal_amount(&p.amount, &services.minimum_amount)?;

        let mut events = Vec::with_capacity(2);
        if self.phase.is_terminal() {
            events.push(DepositEvent::FlowReset);
        }
        events.push(DepositEvent::DepositRequested(DepositRequestedPayload {
            amount: p.amount,
        }));

        Ok(events)
    }

    fn cancel(&self) -> DepositResult {
        match &self.phase {
            Phase::AwaitingConfirmation { transaction, .. } => {
                debug!("Cancelling deposit {}", transaction.id);
                Ok(vec![DepositEvent::DepositCancelled(DepositCancelledPayload {
                    transaction_id: transaction.id.clone(),
                })])
            }
            other => {
                debug!("Ignoring cancel while {}", other.label());
                Ok(vec![])
            }
        }
    }

    fn reset(&self) -> DepositResult {
        match &self.phase {
            Phase::Idle => Ok(vec![]),
            phase if phase.is_terminal() => Ok(vec![DepositEvent::FlowReset]),
            _ => Err(DepositError::FlowInProgress),
        }
    }

    fn record_creation(&self, p: RecordCreationPayload) -> DepositResult {
        if !matches!(self.phase, Phase::Submitting { .. }) {
            debug!("Discarding creation of {} while {}", p.transaction.id, self.phase.label());
            return Ok(vec![]);
        }

        Ok(vec![DepositEvent::TransactionCreated(
            TransactionCreatedPayload {
                transaction: p.transaction,
                budget_seconds: p.budget_seconds,
            },
        )])
    }

    fn record_creation_failure(&self, p: RecordCreationFailurePayload) -> DepositResult {
        if !matches!(self.phase, Phase::Submitting { .. }) {
            debug!("Discarding creation failure while {}", self.phase.label());
            return Ok(vec![]);
        }

        Ok(vec![DepositEvent::CreationFailed(CreationFailedPayload {
            reason: p.reason,
        })])
    }

    fn confirm(&self, p: ConfirmDepositPayload) -> DepositResult {
        if self.phase.awaiting(&p.transaction_id).is_none() {
            debug!("Discarding confirmation of {} while {}", p.transaction_id, self.phase.label());
            return Ok(vec![]);
        }

        Ok(vec![DepositEvent::DepositConfirmed(DepositConfirmedPayload {
            transaction_id: p.transaction_id,
        })])
    }

    // A timeout racing a confirmation that was already processed lands here
    // with the phase no longer awaiting, and is dropped.
    fn expire(&self, p: ExpireDepositPayload) -> DepositResult {
        if self.phase.awaiting(&p.transaction_id).is_none() {
            debug!("Discarding expiry of {} while {}", p.transaction_id, self.phase.label());
            return Ok(vec![]);
        }

        Ok(vec![DepositEvent::DepositExpired(DepositExpiredPayload {
            transaction_id: p.transaction_id,
        })])
    }

    fn fail_confirmation(&self, p: FailConfirmationPayload) -> DepositResult {
        if self.phase.awaiting(&p.transaction_id).is_none() {
            debug!("Discarding poll failure of {} while {}", p.transaction_id, self.phase.label());
            return Ok(vec![]);
        }

        Ok(vec![DepositEvent::ConfirmationFailed(
            ConfirmationFailedPayload {
                transaction_id: p.transaction_id,
                reason: p.reason,
            },
        )])
    }

    fn record_balance(&self, p: RecordBalancePayload) -> DepositResult {
        match &self.phase {
            Phase::Confirmed { transaction } if transaction.id == p.transaction_id => {
                Ok(vec![DepositEvent::BalanceRefreshed(BalanceRefreshedPayload {
                    transaction_id: p.transaction_id,
                    balance: p.balance,
                })])
            }
            other => {
                debug!("Discarding balance for {} while {}", p.transaction_id, other.label());
                Ok(vec![])
            }
        }
    }
}

fn require_settled(deposit: &Deposit) -> Result<(), <Deposit as Aggregate>::Error> {
    match deposit.phase {
        Phase::Submitting { .. } | Phase::AwaitingConfirmation { .. } => {
            Err(DepositError::FlowInProgress)
        }
        _ => Ok(()),
    }
}

pub fn require_legal_amount(amount: &Amount, minimum: &Amount) -> Result<(), ValidationError> {
    if amount.0 <= Decimal::ZERO {
        return Err(ValidationError::NonPositive);
    }

    if !amount.fract().is_zero() {
        return Err(ValidationError::FractionalAmount);
    }

    if amount < minimum {
        return Err(ValidationError::BelowMinimum { minimum: *minimum });
    }

    Ok(())
}

pub fn deposit_aggregate_id(id: &str) -> String {
    format!("Deposit-{}", id)
}
