use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::service::ServiceError;

/// One status query. Resolves to `true` once the remote side reports completion.
pub type StatusCheck = Box<dyn FnMut() -> BoxFuture<'static, Result<bool, ServiceError>> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending { attempt: u32 },
    Retrying { attempt: u32, error: ServiceError },
    Completed { attempt: u32 },
    Failed { attempt: u32, error: ServiceError },
}

/// Fixed-cadence status poller with at most one check in flight.
///
/// The first check is issued immediately, the rest on every `interval`. The
/// in-flight check is owned by the poller, so `next_outcome` can be raced in
/// `select!` without losing a response, and dropping or cancelling the
/// poller discards whatever answer was still on its way.
pub struct StatusPoller {
    check: StatusCheck,
    cadence: Interval,
    in_flight: Option<BoxFuture<'static, Result<bool, ServiceError>>>,
    attempts: u32,
    consecutive_errors: u32,
    error_budget: u32,
    stopped: bool,
}

impl StatusPoller {
    pub fn start(check: StatusCheck, every: Duration) -> Self {
        let mut cadence = interval(every);
        // a slow check pushes the schedule back instead of bursting afterwards
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        StatusPoller {
            check,
            cadence,
            in_flight: None,
            attempts: 0,
            consecutive_errors: 0,
            error_budget: 0,
            stopped: false,
        }
    }

    /// Consecutive failed checks tolerated before an error is final.
    pub fn with_error_budget(mut self, budget: u32) -> Self {
        self.error_budget = budget;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn cancel(&mut self) {
        self.stopped = true;
        self.in_flight = None;
    }

    pub async fn next_outcome(&mut self) -> Option<PollOutcome> {
        if self.stopped {
            return None;
        }

        if self.in_flight.is_none() {
            self.cadence.tick().await;
            self.attempts += 1;
            self.in_flight = Some((self.check)());
        }

        let result = match self.in_flight.as_mut() {
            Some(check) => check.await,
            None => return None,
        };
        self.in_flight = None;
        let attempt = self.attempts;

        let outcome = match result {
            Ok(true) => {
                self.stopped = true;
                PollOutcome::Completed { attempt }
            }
            Ok(false) => {
                self.consecutive_errors = 0;
                PollOutcome::Pending { attempt }
            }
            Err(error) if self.consecutive_errors < self.error_budget => {
                self.consecutive_errors += 1;
                PollOutcome::Retrying { attempt, error }
            }
            Err(error) => {
                self.stopped = true;
                PollOutcome::Failed { attempt, error }
            }
        };

        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use futures::FutureExt;
    use tokio::time::{Instant, sleep};

    use crate::{
        flow::poller::{PollOutcome, StatusCheck, StatusPoller},
        service::ServiceError,
    };

    struct Script {
        responses: Mutex<VecDeque<(Duration, Result<bool, ServiceError>)>>,
        calls: AtomicU32,
        outstanding: AtomicU32,
        max_outstanding: AtomicU32,
    }

    fn scripted(responses: Vec<(u64, Result<bool, ServiceError>)>) -> (Arc<Script>, StatusCheck) {
        let script = Arc::new(Script {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(delay, r)| (Duration::from_secs(delay), r))
                    .collect(),
            ),
            calls: AtomicU32::new(0),
            outstanding: AtomicU32::new(0),
            max_outstanding: AtomicU32::new(0),
        });

        let shared = script.clone();
        let check: StatusCheck = Box::new(move || {
            let script = shared.clone();
            async move {
                script.calls.fetch_add(1, Ordering::SeqCst);
                let now = script.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                script.max_outstanding.fetch_max(now, Ordering::SeqCst);

                let (delay, result) = script
                    .responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((Duration::ZERO, Ok(false)));
                sleep(delay).await;

                script.outstanding.fetch_sub(1, Ordering::SeqCst);
                result
            }
            .boxed()
        });

        (script, check)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_completed() {
        let (script, check) = scripted(vec![(0, Ok(false)), (0, Ok(false)), (0, Ok(true))]);
        let started = Instant::now();
        let mut poller = StatusPoller::start(check, Duration::from_secs(5));

        assert_eq!(poller.next_outcome().await, Some(PollOutcome::Pending { attempt: 1 }));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(poller.next_outcome().await, Some(PollOutcome::Pending { attempt: 2 }));
        assert_eq!(poller.next_outcome().await, Some(PollOutcome::Completed { attempt: 3 }));
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        assert_eq!(poller.next_outcome().await, None);
        assert_eq!(script.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_error_is_terminal_by_default() {
        let (script, check) = scripted(vec![
            (0, Ok(false)),
            (0, Err(ServiceError::Unavailable("503".to_owned()))),
        ]);
        let mut poller = StatusPoller::start(check, Duration::from_secs(3));

        assert_eq!(poller.next_outcome().await, Some(PollOutcome::Pending { attempt: 1 }));
        assert_eq!(
            poller.next_outcome().await,
            Some(PollOutcome::Failed {
                attempt: 2,
                error: ServiceError::Unavailable("503".to_owned())
            })
        );
        assert_eq!(poller.next_outcome().await, None);
        assert_eq!(script.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn error_budget_is_bounded() {
        let error = || Err(ServiceError::Unavailable("503".to_owned()));
        let (_, check) = scripted(vec![(0, error()), (0, Ok(false)), (0, error()), (0, error())]);
        let mut poller = StatusPoller::start(check, Duration::from_secs(3)).with_error_budget(1);

        assert!(matches!(
            poller.next_outcome().await,
            Some(PollOutcome::Retrying { attempt: 1, .. })
        ));
        assert_eq!(poller.next_outcome().await, Some(PollOutcome::Pending { attempt: 2 }));
        assert!(matches!(
            poller.next_outcome().await,
            Some(PollOutcome::Retrying { attempt: 3, .. })
        ));
        assert!(matches!(
            poller.next_outcome().await,
            Some(PollOutcome::Failed { attempt: 4, .. })
        ));
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_check_never_overlaps() {
        // each answer takes longer than the cadence
        let (script, check) = scripted(vec![(12, Ok(false)), (12, Ok(false)), (12, Ok(true))]);
        let started = Instant::now();
        let mut poller = StatusPoller::start(check, Duration::from_secs(5));

        while let Some(outcome) = poller.next_outcome().await {
            if let PollOutcome::Completed { .. } = outcome {
                break;
            }
        }

        assert_eq!(script.max_outstanding.load(Ordering::SeqCst), 1);
        assert_eq!(script.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(36));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_in_flight_answer() {
        let (script, check) = scripted(vec![(30, Ok(true))]);
        let mut poller = StatusPoller::start(check, Duration::from_secs(5));

        tokio::select! {
            _ = poller.next_outcome() => panic!("answer arrived before the deadline"),
            _ = sleep(Duration::from_secs(10)) => {}
        }
        assert!(poller.is_in_flight());

        poller.cancel();
        sleep(Duration::from_secs(60)).await;

        assert!(!poller.is_in_flight());
        assert_eq!(poller.next_outcome().await, None);
        assert_eq!(script.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_survives_a_lost_select_race() {
        let (_, check) = scripted(vec![(8, Ok(true))]);
        let mut poller = StatusPoller::start(check, Duration::from_secs(5));

        tokio::select! {
            _ = poller.next_outcome() => panic!("answer arrived before the deadline"),
            _ = sleep(Duration::from_secs(2)) => {}
        }

        assert_eq!(poller.next_outcome().await, Some(PollOutcome::Completed { attempt: 1 }));
        assert_eq!(poller.attempts(), 1);
    }
}
