use std::{env, num::NonZeroU32, str::FromStr, time::Duration};

use derive_more::Display;
use rust_decimal::Decimal;

use crate::domain::props::Amount;

#[allow(clippy::unwrap_used)]
pub const CONFIRMATION_BUDGET_SECONDS: NonZeroU32 = NonZeroU32::new(300).unwrap();
pub const FULL_PAGE_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const MODAL_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const MINIMUM_DEPOSIT: u32 = 10_000;
pub const CREATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the deposit flow is rendered. Both surfaces drive the same
/// controller and only differ in cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Surface {
    FullPage,
    Modal,
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-page" => Ok(Surface::FullPage),
            "modal" => Ok(Surface::Modal),
            other => Err(format!("Unknown surface: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub confirmation_budget: NonZeroU32,
    pub poll_interval: Duration,
    pub minimum_amount: Amount,
    /// Consecutive failed status checks retried before the flow fails.
    pub poll_error_budget: u32,
    /// How long `begin` waits for the service to issue a transaction.
    pub creation_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self::for_surface(Surface::FullPage)
    }
}

impl FlowConfig {
    pub fn for_surface(surface: Surface) -> Self {
        let poll_interval = match surface {
            Surface::FullPage => FULL_PAGE_POLL_INTERVAL,
            Surface::Modal => MODAL_POLL_INTERVAL,
        };

        Self {
            confirmation_budget: CONFIRMATION_BUDGET_SECONDS,
            poll_interval,
            minimum_amount: Amount(Decimal::from(MINIMUM_DEPOSIT)),
            poll_error_budget: 0,
            creation_timeout: CREATION_TIMEOUT,
        }
    }

    /// Surface preset with `DEPOSIT_*` environment overrides applied.
    /// Unparsable values keep the preset.
    pub fn from_env(surface: Surface) -> Self {
        let mut cfg = Self::for_surface(surface);
        cfg.confirmation_budget = env_parse::<NonZeroU32>("DEPOSIT_CONFIRMATION_BUDGET_SECONDS")
            .unwrap_or(cfg.confirmation_budget);
        cfg.poll_interval = env_parse::<u64>("DEPOSIT_POLL_INTERVAL_SECONDS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(cfg.poll_interval);
        cfg.minimum_amount = env_parse::<Decimal>("DEPOSIT_MINIMUM_AMOUNT")
            .map(Amount)
            .unwrap_or(cfg.minimum_amount);
        cfg.poll_error_budget =
            env_parse::<u32>("DEPOSIT_POLL_ERROR_BUDGET").unwrap_or(cfg.poll_error_budget);
        cfg.creation_timeout = env_parse::<u64>("DEPOSIT_CREATION_TIMEOUT_SECONDS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(cfg.creation_timeout);
        cfg
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
