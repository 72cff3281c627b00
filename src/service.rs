use async_trait::async_trait;
use derive_more::Display;

use crate::domain::{
    deposit::phase::FailureReason,
    props::{Amount, Balance, CorrelationCode, QrPayload, TransactionId},
};

/// Remote side of a deposit. Session and auth context belong to the
/// implementation, never to the controller.
#[async_trait]
pub trait TransactionService: Send + Sync {
    async fn create_transaction(&self, amount: Amount) -> Result<CreatedTransaction, ServiceError>;

    async fn transaction_status(
        &self,
        code: &CorrelationCode,
    ) -> Result<TransactionStatus, ServiceError>;

    async fn balance(&self) -> Result<Balance, ServiceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTransaction {
    pub transaction_id: TransactionId,
    pub correlation_code: CorrelationCode,
    pub qr_payload: QrPayload,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStatus {
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ServiceError {
    InsufficientBalance,
    #[display("Unavailable({_0})")]
    Unavailable(String),
    #[display("MalformedResponse({_0})")]
    MalformedResponse(String),
}

impl std::error::Error for ServiceError {}

impl From<ServiceError> for FailureReason {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InsufficientBalance => FailureReason::InsufficientBalance,
            other => FailureReason::ServiceError(other.to_string()),
        }
    }
}
