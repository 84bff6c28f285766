//! Example: issuing and checking a verification code end to end
//!
//! Builds the engine from configuration (defaults, an optional TOML file
//! passed as the first argument, then `OTP__*` variables), sends a login
//! code through the provider pool and verifies it.
//!
//! The default configuration is fully in-process, so this runs without
//! Redis, MySQL or vendor credentials.
//!
//! Run with: cargo run --example otp_flow_demo -p otp_infra [-- config.toml]

use std::path::PathBuf;

use anyhow::Context;
use otp_core::errors::{CodeError, DomainError};
use otp_infra::{init_tracing, load_config, Infrastructure};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(path.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging).context("initializing tracing")?;

    let infra = Infrastructure::from_config(&config)
        .await
        .context("wiring the verification engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = infra.retry_worker().spawn(shutdown_rx);

    let phone = "13800000000";
    infra.service.send("login", phone).await?;
    println!("Code sent to {}", otp_shared::phone::mask_phone_number(phone));

    match infra.service.send("login", phone).await {
        Err(DomainError::Code(CodeError::SendTooMany)) => {
            println!("Second request refused: still inside the cooldown window");
        }
        other => println!("Unexpected second send result: {:?}", other),
    }

    match infra.service.verify("login", phone, "0000").await {
        Err(DomainError::Code(CodeError::VerifyFailed)) => println!("Wrong code rejected"),
        other => println!("Unexpected verify result: {:?}", other),
    }

    // A real caller reads the code from the SMS; the demo only shows the
    // outcome of a guess against a fresh record.
    let business = "signup";
    infra.service.send(business, phone).await?;
    for guess in ["1111", "2222", "3333", "4444"] {
        match infra.service.verify(business, phone, guess).await {
            Ok(()) => println!("Guess {} accepted", guess),
            Err(e) => println!("Guess {} refused: {}", guess, e),
        }
    }

    shutdown_tx.send(true).ok();
    let report = worker.await.context("retry worker panicked")?;
    println!(
        "Retry worker: {} delivered, {} rescheduled, {} abandoned",
        report.succeeded, report.rescheduled, report.abandoned
    );

    infra.shutdown().await;
    Ok(())
}
