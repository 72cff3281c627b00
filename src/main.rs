#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

use std::{io, sync::Arc};

use color_eyre::eyre::Result;
use deposit_confirmation::{
    config::FlowConfig,
    controller::{Confirmation, ConfirmationController},
    domain::deposit::phase::Phase,
    scenario::{self, Action, CsvScenarioRecord},
    sim::ScriptedService,
};
use tokio::{
    runtime,
    sync::broadcast,
    time::{Instant, sleep},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{cli::CliArgs, transitions::TransitionLog};

pub(crate) mod cli;
mod transitions;

fn main() -> Result<()> {
    let cli_args = CliArgs::load()?;
    init_tracing();

    // The scenario runs against a scripted service on a paused clock. Time
    // jumps straight to the next pending timer, so a five minute payment
    // window replays instantly and deterministically.
    let runtime = runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?;

    runtime.block_on(replay(cli_args))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn replay(cli_args: CliArgs) -> Result<()> {
    let rows = scenario::read_input::<CsvScenarioRecord>(&cli_args.input_file_path)?;

    let service = Arc::new(ScriptedService::new());
    let controller = ConfirmationController::spawn_with_queries(
        service.clone(),
        FlowConfig::from_env(cli_args.surface),
        vec![Box::new(TransitionLog::stdout(Instant::now()))],
    );
    let mut confirmations = controller.confirmations();

    for row_result in rows {
        match row_result.and_then(Action::try_from) {
            Ok(action) => {
                let _ = play(&controller, &service, &mut confirmations, action)
                    .await
                    .inspect_err(|e| debug!("Error playing step: {}", e));
            }
            Err(e) => debug!("Error parsing row: {}", e),
        }
    }

    Ok(())
}

async fn play(
    controller: &ConfirmationController,
    service: &ScriptedService,
    confirmations: &mut broadcast::Receiver<Confirmation>,
    action: Action,
) -> Result<()> {
    match action {
        Action::ScriptCreate(reply) => service.push_create(reply),
        Action::ScriptStatus(reply) => service.push_status(reply.result, reply.delay),
        Action::ScriptBalance(balance) => service.push_balance(balance),
        Action::Begin(amount) => controller.begin(amount).await?,
        Action::Cancel => controller.cancel().await?,
        Action::Reset => controller.reset().await?,
        Action::Wait(duration) => sleep(duration).await,
        Action::Settle => settle(controller, confirmations).await?,
    }

    Ok(())
}

// Waits for a terminal phase, and for a confirmed deposit also for its
// balance refresh, so the last rows are printed before the replay ends.
async fn settle(
    controller: &ConfirmationController,
    confirmations: &mut broadcast::Receiver<Confirmation>,
) -> Result<()> {
    let mut view = controller.subscribe();
    if view.borrow().phase == Phase::Idle {
        return Ok(());
    }

    let settled = view.wait_for(|v| v.phase.is_terminal()).await?.phase.clone();
    if let Phase::Confirmed { transaction } = settled {
        while confirmations.recv().await?.transaction.id != transaction.id {}
    }

    Ok(())
}
