use std::{
    io,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use cqrs_es::{DomainEvent, EventEnvelope, Query, View};
use csv::{Writer, WriterBuilder};
use deposit_confirmation::{domain::deposit::aggregate::Deposit, query::confirmation::ConfirmationView};
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Serialize)]
struct TransitionRow {
    elapsed: u64,
    event: String,
    phase: &'static str,
    transaction: Option<String>,
    balance: Option<String>,
}

/// Writes one CSV row per committed event, stamped with virtual seconds
/// since the replay started.
pub struct TransitionLog {
    started: Instant,
    state: Mutex<(Writer<io::Stdout>, ConfirmationView)>,
}

impl TransitionLog {
    pub fn stdout(started: Instant) -> Self {
        TransitionLog {
            started,
            state: Mutex::new((
                WriterBuilder::new().from_writer(io::stdout()),
                ConfirmationView::default(),
            )),
        }
    }
}

#[async_trait]
impl Query<Deposit> for TransitionLog {
    async fn dispatch(&self, _aggregate_id: &str, events: &[EventEnvelope<Deposit>]) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (writer, view) = &mut *state;

        for envelope in events {
            view.update(envelope);
            let row = TransitionRow {
                elapsed: self.started.elapsed().as_secs(),
                event: envelope.payload.event_type(),
                phase: view.phase.label(),
                transaction: view.phase.transaction().map(|t| t.id.to_string()),
                balance: view.balance.map(|b| b.to_string()),
            };
            let _ = writer
                .serialize(row)
                .inspect_err(|e| debug!("Error writing transition: {}", e));
        }

        let _ = writer.flush();
    }
}
