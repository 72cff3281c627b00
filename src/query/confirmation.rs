use std::sync::Arc;

use async_trait::async_trait;
use cqrs_es::{EventEnvelope, Query, View};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::{
    deposit::{
        aggregate::Deposit,
        event::DepositEvent,
        phase::{Notice, Phase},
    },
    props::Balance,
};

/// What the presentation layer renders: phase, live countdown, and the
/// balance fetched after a confirmation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationView {
    pub phase: Phase,
    pub balance: Option<Balance>,
}

impl ConfirmationView {
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.phase.remaining_seconds()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.phase.notice()
    }
}

impl View<Deposit> for ConfirmationView {
    fn update(&mut self, event: &EventEnvelope<Deposit>) {
        match &event.payload {
            DepositEvent::BalanceRefreshed(p) => {
                self.balance = Some(p.balance);
            }
            DepositEvent::FlowReset => {
                self.balance = None;
                self.phase.apply(&event.payload);
            }
            other => self.phase.apply(other),
        }
    }
}

/// Pushes every committed event into a watch channel the handle reads from.
pub(crate) struct ConfirmationProjection {
    view: Arc<watch::Sender<ConfirmationView>>,
}

impl ConfirmationProjection {
    pub(crate) fn new(view: Arc<watch::Sender<ConfirmationView>>) -> Self {
        ConfirmationProjection { view }
    }
}

#[async_trait]
impl Query<Deposit> for ConfirmationProjection {
    async fn dispatch(&self, _aggregate_id: &str, events: &[EventEnvelope<Deposit>]) {
        self.view.send_modify(|view| {
            for event in events {
                view.update(event);
            }
        });
    }
}
