use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::debug;

use crate::{
    domain::props::{Amount, Balance, CorrelationCode, QrPayload, TransactionId},
    service::{CreatedTransaction, ServiceError, TransactionService, TransactionStatus},
};

#[derive(Debug, Clone, PartialEq)]
pub enum CreateReply {
    Ok,
    Fail(ServiceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReply {
    pub delay: Duration,
    pub result: Result<bool, ServiceError>,
}

/// In-memory `TransactionService` answering from queued replies.
///
/// Unscripted calls succeed: creation issues `TX-<n>`, status reports
/// pending, balance repeats the last scripted value (zero at first).
/// Every call is counted so callers can assert on network traffic.
#[derive(Default)]
pub struct ScriptedService {
    state: Mutex<Script>,
}

#[derive(Default)]
struct Script {
    creates: VecDeque<CreateReply>,
    statuses: VecDeque<StatusReply>,
    balances: VecDeque<Decimal>,
    last_balance: Decimal,
    issued: u32,
    calls: Calls,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub create: u32,
    pub status: u32,
    pub balance: u32,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, reply: CreateReply) {
        self.with_script(|s| s.creates.push_back(reply));
    }

    pub fn push_status(&self, result: Result<bool, ServiceError>, delay: Duration) {
        self.with_script(|s| s.statuses.push_back(StatusReply { delay, result }));
    }

    pub fn push_balance(&self, balance: Decimal) {
        self.with_script(|s| s.balances.push_back(balance));
    }

    pub fn calls(&self) -> Calls {
        self.with_script(|s| s.calls)
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut script)
    }
}

#[async_trait]
impl TransactionService for ScriptedService {
    async fn create_transaction(&self, amount: Amount) -> Result<CreatedTransaction, ServiceError> {
        let reply = self.with_script(|s| {
            s.calls.create += 1;
            match s.creates.pop_front().unwrap_or(CreateReply::Ok) {
                CreateReply::Ok => {
                    s.issued += 1;
                    Ok(s.issued)
                }
                CreateReply::Fail(e) => Err(e),
            }
        });

        let n = reply?;
        debug!("Issuing scripted transaction {} for {}", n, amount);

        Ok(CreatedTransaction {
            transaction_id: TransactionId(format!("TX-{}", n)),
            correlation_code: CorrelationCode(format!("DEP{:06}", n)),
            qr_payload: QrPayload(format!("qr:DEP{:06}", n)),
            amount,
        })
    }

    async fn transaction_status(
        &self,
        code: &CorrelationCode,
    ) -> Result<TransactionStatus, ServiceError> {
        let reply = self.with_script(|s| {
            s.calls.status += 1;
            s.statuses.pop_front()
        });
        let StatusReply { delay, result } = reply.unwrap_or(StatusReply {
            delay: Duration::ZERO,
            result: Ok(false),
        });

        debug!("Status of {} answers in {:?}", code, delay);
        if !delay.is_zero() {
            sleep(delay).await;
        }

        result.map(|completed| TransactionStatus { completed })
    }

    async fn balance(&self) -> Result<Balance, ServiceError> {
        let balance = self.with_script(|s| {
            s.calls.balance += 1;
            if let Some(next) = s.balances.pop_front() {
                s.last_balance = next;
            }
            s.last_balance
        });

        Ok(Balance(balance))
    }
}
