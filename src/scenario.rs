use std::{str::FromStr, time::Duration};

use color_eyre::eyre::{OptionExt, Report, Result, eyre};
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::props::Amount,
    service::ServiceError,
    sim::{CreateReply, StatusReply},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct CsvScenarioRecord {
    pub step: Step,
    pub arg: Option<String>,
    /// Seconds before a scripted status answer resolves.
    pub delay: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Create,
    Status,
    Balance,
    Begin,
    Cancel,
    Reset,
    Wait,
    Settle,
}

/// One scenario row, either a scripted service answer or a user action.
#[derive(Debug, PartialEq)]
pub enum Action {
    ScriptCreate(CreateReply),
    ScriptStatus(StatusReply),
    ScriptBalance(Decimal),
    Begin(Amount),
    Cancel,
    Reset,
    Wait(Duration),
    Settle,
}

impl TryFrom<CsvScenarioRecord> for Action {
    type Error = Report;

    fn try_from(r: CsvScenarioRecord) -> Result<Self> {
        let action = match r.step {
            Step::Create => Action::ScriptCreate(match require_arg(&r)? {
                "ok" => CreateReply::Ok,
                "insufficient" => CreateReply::Fail(ServiceError::InsufficientBalance),
                "error" => CreateReply::Fail(scripted_failure()),
                other => return Err(eyre!("Unknown create reply: {}", other)),
            }),
            Step::Status => {
                let result = match require_arg(&r)? {
                    "pending" => Ok(false),
                    "completed" => Ok(true),
                    "error" => Err(scripted_failure()),
                    other => return Err(eyre!("Unknown status reply: {}", other)),
                };
                Action::ScriptStatus(StatusReply {
                    delay: Duration::from_secs(r.delay.unwrap_or(0)),
                    result,
                })
            }
            Step::Balance => Action::ScriptBalance(parse_decimal(require_arg(&r)?)?),
            Step::Begin => Action::Begin(Amount(parse_decimal(require_arg(&r)?)?)),
            Step::Cancel => Action::Cancel,
            Step::Reset => Action::Reset,
            Step::Wait => Action::Wait(Duration::from_secs(
                require_arg(&r)?
                    .parse::<u64>()
                    .map_err(|e| eyre!("Bad wait duration: {}", e))?,
            )),
            Step::Settle => Action::Settle,
        };

        Ok(action)
    }
}

fn require_arg(r: &CsvScenarioRecord) -> Result<&str> {
    r.arg
        .as_deref()
        .ok_or_eyre(format!("No argument found for step {:?}", r.step))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| eyre!("Not a number: {} ({})", s, e))
}

fn scripted_failure() -> ServiceError {
    ServiceError::Unavailable("scripted failure".to_owned())
}

pub fn read_input<D: serde::de::DeserializeOwned>(
    file_path: &str,
) -> Result<impl Iterator<Item = Result<D>>> {
    let reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(file_path)
        .map_err(|e| eyre!("Could not read input file: {}", e))?;

    Ok(reader
        .into_deserialize()
        .map(|r| r.map_err(|ee| eyre!("Error parsing row: {}", ee))))
}
