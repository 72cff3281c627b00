use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

const BIN_NAME: &str = "deposit-confirmation";

fn replay(scenario: &str) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;
    cmd.env_remove("RUST_LOG").arg(scenario);
    Ok(cmd)
}

#[test]
fn confirmed_after_fourth_check() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/confirmed.csv")?
        .assert()
        .success()
        .stdout(
            r#"elapsed,event,phase,transaction,balance
0,DepositRequested,submitting,,
0,TransactionCreated,awaiting_confirmation,TX-1,
15,DepositConfirmed,confirmed,TX-1,
15,BalanceRefreshed,confirmed,TX-1,150000
"#,
        )
        .stderr("");

    Ok(())
}

#[test]
fn modal_polls_faster() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/confirmed.csv")?
        .arg("modal")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "9,DepositConfirmed,confirmed,TX-1,\n",
        ))
        .stderr("");

    Ok(())
}

#[test]
fn expires_after_five_minutes() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/expired.csv")?
        .assert()
        .success()
        .stdout(
            r#"elapsed,event,phase,transaction,balance
0,DepositRequested,submitting,,
0,TransactionCreated,awaiting_confirmation,TX-1,
300,DepositExpired,expired,TX-1,
"#,
        )
        .stderr("");

    Ok(())
}

#[test]
fn below_minimum_never_starts() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/below_minimum.csv")?
        .assert()
        .success()
        .stdout("")
        .stderr("");

    Ok(())
}

#[test]
fn insufficient_balance_fails_creation() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/insufficient.csv")?
        .assert()
        .success()
        .stdout(
            r#"elapsed,event,phase,transaction,balance
0,DepositRequested,submitting,,
0,CreationFailed,failed,,
"#,
        )
        .stderr("");

    Ok(())
}

#[test]
fn late_answer_after_cancel_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/cancelled_late_answer.csv")?
        .assert()
        .success()
        .stdout(
            r#"elapsed,event,phase,transaction,balance
0,DepositRequested,submitting,,
0,TransactionCreated,awaiting_confirmation,TX-1,
100,DepositCancelled,cancelled,TX-1,
"#,
        )
        .stderr("");

    Ok(())
}

#[test]
fn new_deposit_after_expiry() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/retry_after_expiry.csv")?
        .assert()
        .success()
        .stdout(
            r#"elapsed,event,phase,transaction,balance
0,DepositRequested,submitting,,
0,TransactionCreated,awaiting_confirmation,TX-1,
300,DepositExpired,expired,TX-1,
300,FlowReset,idle,,
300,DepositRequested,submitting,,
300,TransactionCreated,awaiting_confirmation,TX-2,
300,ConfirmationFailed,failed,,
300,FlowReset,idle,,
"#,
        )
        .stderr("");

    Ok(())
}

#[test]
fn cli_non_existing_input_file() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/non_existing.csv")?
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not read input file"))
        .stdout("");

    Ok(())
}

#[test]
fn cli_no_input_file_passed() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.env_remove("RUST_LOG")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not passed"))
        .stdout("");

    Ok(())
}

#[test]
fn cli_unknown_surface() -> Result<(), Box<dyn std::error::Error>> {
    replay("sample/confirmed.csv")?
        .arg("sidebar")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown surface"))
        .stdout("");

    Ok(())
}
