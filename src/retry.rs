use async_trait::async_trait;
use derive_more::Display;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::props::{Amount, Balance};

/// A purchase paid from the in-app balance, e.g. booking a chat session.
#[async_trait]
pub trait PaidAction: Send + Sync {
    type Output: Send;

    async fn execute(&self) -> Result<Self::Output, PurchaseError>;
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum PurchaseError {
    #[display("InsufficientBalance(price={price}, balance={balance})")]
    InsufficientBalance { price: Amount, balance: Balance },
    #[display("Failed({_0})")]
    Failed(String),
}

impl std::error::Error for PurchaseError {}

#[derive(Debug, PartialEq)]
pub enum PurchaseOutcome<T> {
    Completed(T),
    /// The caller should open a deposit for at least `suggested`.
    TopUpRequired { suggested: Amount },
}

#[derive(Debug, PartialEq, Display)]
pub enum RetryError {
    NotArmed,
    AlreadyRetried,
    #[display("StillInsufficient({shortfall})")]
    StillInsufficient { shortfall: Amount },
    #[display("ActionFailed({_0})")]
    ActionFailed(String),
}

impl std::error::Error for RetryError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryState {
    Idle,
    Armed,
    Retried,
}

// Re-runs a purchase that bounced on insufficient funds, once, after the
// deposit that was opened for it is confirmed. The controller never sees
// this; the caller wires its confirmations in.
pub struct PurchaseRetry<P: PaidAction> {
    action: P,
    minimum_top_up: Amount,
    state: RetryState,
}

impl<P: PaidAction> PurchaseRetry<P> {
    pub fn new(action: P, minimum_top_up: Amount) -> Self {
        PurchaseRetry {
            action,
            minimum_top_up,
            state: RetryState::Idle,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state == RetryState::Armed
    }

    pub async fn attempt(&mut self) -> Result<PurchaseOutcome<P::Output>, PurchaseError> {
        match self.action.execute().await {
            Ok(output) => {
                self.state = RetryState::Idle;
                Ok(PurchaseOutcome::Completed(output))
            }
            Err(PurchaseError::InsufficientBalance { price, balance }) => {
                let suggested = suggested_top_up(price, balance, self.minimum_top_up);
                debug!("Purchase of {} needs a top-up of {}", price, suggested);
                self.state = RetryState::Armed;
                Ok(PurchaseOutcome::TopUpRequired { suggested })
            }
            Err(e) => Err(e),
        }
    }

    /// Re-runs the purchase exactly once per armed attempt.
    pub async fn on_deposit_confirmed(
        &mut self,
        new_balance: Option<Balance>,
    ) -> Result<P::Output, RetryError> {
        match self.state {
            RetryState::Idle => return Err(RetryError::NotArmed),
            RetryState::Retried => return Err(RetryError::AlreadyRetried),
            RetryState::Armed => {}
        }
        self.state = RetryState::Retried;

        debug!("Retrying purchase after deposit, balance {:?}", new_balance);
        match self.action.execute().await {
            Ok(output) => Ok(output),
            Err(PurchaseError::InsufficientBalance { price, balance }) => {
                warn!("Purchase still short after deposit: {} vs {}", price, balance);
                Err(RetryError::StillInsufficient {
                    shortfall: shortfall(price, balance),
                })
            }
            Err(PurchaseError::Failed(reason)) => Err(RetryError::ActionFailed(reason)),
        }
    }
}

fn shortfall(price: Amount, balance: Balance) -> Amount {
    Amount((price.0 - balance.0).max(Decimal::ZERO).ceil())
}

/// Deposit amount that covers the shortfall and meets the deposit minimum.
pub fn suggested_top_up(price: Amount, balance: Balance, minimum: Amount) -> Amount {
    shortfall(price, balance).max(minimum)
}
