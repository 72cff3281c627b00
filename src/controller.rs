use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use cqrs_es::{AggregateError, CqrsFramework, Query, mem_store::MemStore};
use derive_more::Display;
use futures::FutureExt;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    config::FlowConfig,
    domain::{
        deposit::{
            aggregate::{Deposit, DepositServices, deposit_aggregate_id},
            command::{
                BeginDepositPayload, ConfirmDepositPayload, DepositCommand, ExpireDepositPayload,
                FailConfirmationPayload, RecordBalancePayload, RecordCreationFailurePayload,
                RecordCreationPayload,
            },
            error::DepositError,
            phase::{FailureReason, Phase, Transaction},
        },
        props::{Amount, Balance, TransactionId},
    },
    flow::{
        countdown::{Countdown, CountdownEvent},
        poller::{PollOutcome, StatusCheck, StatusPoller},
    },
    query::confirmation::{ConfirmationProjection, ConfirmationView},
    service::{CreatedTransaction, ServiceError, TransactionService},
};

static NEXT_CONTROLLER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, PartialEq, Display)]
pub enum ControllerError {
    #[display("{_0}")]
    Rejected(DepositError),
    #[display("Store({_0})")]
    Store(String),
    Closed,
}

impl std::error::Error for ControllerError {}

impl From<AggregateError<DepositError>> for ControllerError {
    fn from(e: AggregateError<DepositError>) -> Self {
        match e {
            AggregateError::UserError(e) => ControllerError::Rejected(e),
            other => ControllerError::Store(other.to_string()),
        }
    }
}

/// Broadcast once per confirmed deposit, after the balance refresh settles.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub transaction: Transaction,
    pub new_balance: Option<Balance>,
}

type Reply = oneshot::Sender<Result<(), ControllerError>>;

enum Request {
    Begin(Amount, Reply),
    Cancel(Reply),
    Reset(Reply),
}

enum Feedback {
    Created(Result<CreatedTransaction, ServiceError>),
    BalanceFetched {
        transaction: Transaction,
        result: Result<Balance, ServiceError>,
    },
}

// Handle to one deposit flow. Every command, network answer, countdown tick
// and poll outcome is funnelled into a single task, so phase changes happen
// one at a time and in arrival order.
pub struct ConfirmationController {
    requests: mpsc::Sender<Request>,
    view: watch::Receiver<ConfirmationView>,
    confirmations: broadcast::Sender<Confirmation>,
    actor: JoinHandle<()>,
}

impl ConfirmationController {
    pub fn spawn(service: Arc<dyn TransactionService>, config: FlowConfig) -> Self {
        Self::spawn_with_queries(service, config, vec![])
    }

    /// Like `spawn`, with extra read-side queries receiving every event.
    pub fn spawn_with_queries(
        service: Arc<dyn TransactionService>,
        config: FlowConfig,
        queries: Vec<Box<dyn Query<Deposit>>>,
    ) -> Self {
        let (view_tx, view) = watch::channel(ConfirmationView::default());
        let view_tx = Arc::new(view_tx);

        let mut all_queries: Vec<Box<dyn Query<Deposit>>> =
            vec![Box::new(ConfirmationProjection::new(view_tx.clone()))];
        all_queries.extend(queries);

        let cqrs = CqrsFramework::new(
            MemStore::<Deposit>::default(),
            all_queries,
            DepositServices {
                minimum_amount: config.minimum_amount,
            },
        );

        let (requests, inbox) = mpsc::channel(16);
        let (feedback_tx, feedback) = mpsc::unbounded_channel();
        let (confirmations, _) = broadcast::channel(8);

        let id = NEXT_CONTROLLER.fetch_add(1, Ordering::Relaxed);
        let actor = Actor {
            aggregate_id: deposit_aggregate_id(&id.to_string()),
            cqrs,
            service,
            config,
            view: view_tx,
            confirmations: confirmations.clone(),
            feedback_tx,
            countdown: None,
            poller: None,
            watching: None,
        };
        let actor = tokio::spawn(actor.run(inbox, feedback));

        ConfirmationController {
            requests,
            view,
            confirmations,
            actor,
        }
    }

    pub async fn begin(&self, amount: Amount) -> Result<(), ControllerError> {
        self.request(|reply| Request::Begin(amount, reply)).await
    }

    pub async fn cancel(&self) -> Result<(), ControllerError> {
        self.request(Request::Cancel).await
    }

    pub async fn reset(&self) -> Result<(), ControllerError> {
        self.request(Request::Reset).await
    }

    pub fn phase(&self) -> Phase {
        self.view.borrow().phase.clone()
    }

    pub fn view(&self) -> ConfirmationView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConfirmationView> {
        self.view.clone()
    }

    pub fn confirmations(&self) -> broadcast::Receiver<Confirmation> {
        self.confirmations.subscribe()
    }

    async fn request(&self, make: impl FnOnce(Reply) -> Request) -> Result<(), ControllerError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| ControllerError::Closed)?;
        answer.await.map_err(|_| ControllerError::Closed)?
    }
}

impl Drop for ConfirmationController {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

struct Actor {
    aggregate_id: String,
    cqrs: CqrsFramework<Deposit, MemStore<Deposit>>,
    service: Arc<dyn TransactionService>,
    config: FlowConfig,
    view: Arc<watch::Sender<ConfirmationView>>,
    confirmations: broadcast::Sender<Confirmation>,
    feedback_tx: mpsc::UnboundedSender<Feedback>,
    countdown: Option<Countdown>,
    poller: Option<StatusPoller>,
    watching: Option<TransactionId>,
}

impl Actor {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Request>,
        mut feedback: mpsc::UnboundedReceiver<Feedback>,
    ) {
        debug!("Controller {} started", self.aggregate_id);

        loop {
            tokio::select! {
                biased;
                request = inbox.recv() => match request {
                    Some(request) => self.on_request(request).await,
                    None => break,
                },
                Some(answer) = feedback.recv() => self.on_feedback(answer).await,
                // a completed check due at the same instant as the timeout wins
                Some(outcome) = next_poll_outcome(&mut self.poller) => self.on_poll(outcome).await,
                Some(event) = next_countdown_event(&mut self.countdown) => {
                    self.on_countdown(event).await
                }
            }
        }

        self.stop_watching();
        debug!("Controller {} stopped", self.aggregate_id);
    }

    async fn on_request(&mut self, request: Request) {
        match request {
            Request::Begin(amount, reply) => {
                let result = self.begin(amount).await;
                let _ = reply.send(result);
            }
            Request::Cancel(reply) => {
                // both collaborators go quiet before the phase moves
                self.stop_watching();
                let result = self.execute(DepositCommand::CancelDeposit).await;
                let _ = reply.send(result);
            }
            Request::Reset(reply) => {
                let result = self.execute(DepositCommand::ResetFlow).await;
                if result.is_ok() {
                    self.stop_watching();
                }
                let _ = reply.send(result);
            }
        }
    }

    async fn begin(&mut self, amount: Amount) -> Result<(), ControllerError> {
        self.execute(DepositCommand::BeginDeposit(BeginDepositPayload { amount }))
            .await?;

        info!("Submitting deposit of {}", amount);
        let service = self.service.clone();
        let feedback = self.feedback_tx.clone();
        let deadline = self.config.creation_timeout;
        tokio::spawn(async move {
            let result = timeout(deadline, service.create_transaction(amount))
                .await
                .unwrap_or_else(|_| {
                    Err(ServiceError::Unavailable(format!(
                        "no transaction created within {:?}",
                        deadline
                    )))
                });
            let _ = feedback.send(Feedback::Created(result));
        });

        Ok(())
    }

    async fn on_feedback(&mut self, answer: Feedback) {
        match answer {
            Feedback::Created(Ok(created)) => {
                let transaction = Transaction {
                    id: created.transaction_id,
                    correlation_code: created.correlation_code,
                    qr_payload: created.qr_payload,
                    amount: created.amount,
                    created_at: SystemTime::now(),
                };
                let command = DepositCommand::RecordCreation(RecordCreationPayload {
                    transaction: transaction.clone(),
                    budget_seconds: self.config.confirmation_budget.get(),
                });

                if self.execute_logged(command).await && self.is_awaiting(&transaction.id) {
                    info!(
                        "Awaiting confirmation of {} ({})",
                        transaction.id, transaction.correlation_code
                    );
                    self.start_watching(&transaction);
                }
            }
            Feedback::Created(Err(e)) => {
                warn!("Deposit creation failed: {}", e);
                let command = DepositCommand::RecordCreationFailure(RecordCreationFailurePayload {
                    reason: FailureReason::from(e),
                });
                self.execute_logged(command).await;
            }
            Feedback::BalanceFetched {
                transaction,
                result,
            } => {
                let new_balance = match result {
                    Ok(balance) => {
                        let command = DepositCommand::RecordBalance(RecordBalancePayload {
                            transaction_id: transaction.id.clone(),
                            balance,
                        });
                        self.execute_logged(command).await;
                        Some(balance)
                    }
                    Err(e) => {
                        warn!("Balance refresh after {} failed: {}", transaction.id, e);
                        None
                    }
                };

                let _ = self.confirmations.send(Confirmation {
                    transaction,
                    new_balance,
                });
            }
        }
    }

    async fn on_countdown(&mut self, event: CountdownEvent) {
        let Some(transaction_id) = self.watching.clone() else {
            return;
        };

        match event {
            CountdownEvent::Tick(remaining) => {
                self.view.send_modify(|view| view.phase.tick(remaining));
            }
            CountdownEvent::Timeout => {
                self.stop_watching();
                info!("Deposit {} expired", transaction_id);
                self.execute_logged(DepositCommand::ExpireDeposit(ExpireDepositPayload {
                    transaction_id,
                }))
                .await;
            }
        }
    }

    async fn on_poll(&mut self, outcome: PollOutcome) {
        let Some(transaction_id) = self.watching.clone() else {
            return;
        };

        match outcome {
            PollOutcome::Pending { attempt } => {
                debug!("{} still pending after check {}", transaction_id, attempt);
            }
            PollOutcome::Retrying { attempt, error } => {
                warn!("Check {} for {} failed, retrying: {}", attempt, transaction_id, error);
            }
            PollOutcome::Completed { attempt } => {
                // the countdown is stopped before the confirmation is recorded,
                // so a timeout due at the same instant is never seen
                self.stop_watching();
                info!("Deposit {} confirmed on check {}", transaction_id, attempt);
                let command = DepositCommand::ConfirmDeposit(ConfirmDepositPayload {
                    transaction_id: transaction_id.clone(),
                });
                if self.execute_logged(command).await {
                    self.refresh_balance(&transaction_id);
                }
            }
            PollOutcome::Failed { attempt, error } => {
                self.stop_watching();
                warn!("Check {} for {} failed: {}", attempt, transaction_id, error);
                let command = DepositCommand::FailConfirmation(FailConfirmationPayload {
                    transaction_id,
                    reason: FailureReason::ServiceError(error.to_string()),
                });
                self.execute_logged(command).await;
            }
        }
    }

    fn start_watching(&mut self, transaction: &Transaction) {
        let service = self.service.clone();
        let code = transaction.correlation_code.clone();
        let check: StatusCheck = Box::new(move || {
            let service = service.clone();
            let code = code.clone();
            async move {
                service
                    .transaction_status(&code)
                    .await
                    .map(|status| status.completed)
            }
            .boxed()
        });

        self.countdown = Some(Countdown::start(self.config.confirmation_budget));
        self.poller = Some(
            StatusPoller::start(check, self.config.poll_interval)
                .with_error_budget(self.config.poll_error_budget),
        );
        self.watching = Some(transaction.id.clone());
    }

    fn stop_watching(&mut self) {
        if let Some(mut countdown) = self.countdown.take() {
            countdown.cancel();
        }
        if let Some(mut poller) = self.poller.take() {
            poller.cancel();
        }
        self.watching = None;
    }

    fn refresh_balance(&self, transaction_id: &TransactionId) {
        let transaction = match &self.view.borrow().phase {
            Phase::Confirmed { transaction } if transaction.id == *transaction_id => {
                transaction.clone()
            }
            _ => return,
        };

        // outlives a reset or a new deposit started before it answers
        let service = self.service.clone();
        let feedback = self.feedback_tx.clone();
        tokio::spawn(async move {
            let result = service.balance().await;
            let _ = feedback.send(Feedback::BalanceFetched {
                transaction,
                result,
            });
        });
    }

    fn is_awaiting(&self, transaction_id: &TransactionId) -> bool {
        self.view.borrow().phase.awaiting(transaction_id).is_some()
    }

    async fn execute(&mut self, command: DepositCommand) -> Result<(), ControllerError> {
        self.cqrs
            .execute(&self.aggregate_id, command)
            .await
            .map_err(ControllerError::from)
    }

    async fn execute_logged(&mut self, command: DepositCommand) -> bool {
        match self.execute(command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Controller {} rejected a step: {}", self.aggregate_id, e);
                false
            }
        }
    }
}

async fn next_countdown_event(countdown: &mut Option<Countdown>) -> Option<CountdownEvent> {
    match countdown {
        Some(countdown) => countdown.next_event().await,
        None => None,
    }
}

async fn next_poll_outcome(poller: &mut Option<StatusPoller>) -> Option<PollOutcome> {
    match poller {
        Some(poller) => poller.next_outcome().await,
        None => None,
    }
}
