//! vmx-ctl entry point.
//!
//! Runs driver requests given as JSON, either as command-line arguments or
//! as newline-delimited objects on stdin, and writes one JSON response per
//! request to stdout. Logs go to stderr.
//!
//! ```text
//! vmx-ctl '{"op":"start","args":{"vmx":"/vms/web/web/web.vmx"}}'
//! cat requests.jsonl | vmx-ctl
//! ```

mod config;
mod input;
mod types;

use config::{CtlConfig, MAX_REQUEST_BYTES};
use input::InputLine;
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use types::Response;
use vmx_driver::{DriverError, DriverRegistry, HypervisorDriver, OpContext, Request};

const USAGE: &str = "usage: vmx-ctl [REQUEST_JSON ...]\n\nWith no arguments (or '-'), requests are read from stdin, one JSON object per line.";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing - logs go to stderr (stdout carries responses)
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("vmx_ctl=info".parse()?)
                .add_directive("vmx_driver=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let config = CtlConfig::from_env();
    tracing::debug!(?config, "Configuration loaded");
    config.validate_warn();

    let driver = DriverRegistry::builtin().select(&config.driver)?;

    // Ctrl-C cancels the request in flight between tool invocations
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Received interrupt, cancelling");
                shutdown.cancel();
            }
        });
    }

    let mut failures = 0usize;
    if args.is_empty() || args == ["-"] {
        let mut stdin = BufReader::new(tokio::io::stdin());
        while let Some(line) = input::next_line(&mut stdin, MAX_REQUEST_BYTES).await? {
            if shutdown.is_cancelled() {
                break;
            }
            let ok = match line {
                InputLine::Request(text) if text.trim().is_empty() => continue,
                InputLine::Request(text) => {
                    handle(driver.as_ref(), &config, &shutdown, &text).await?
                }
                InputLine::Oversized => emit(&too_large(None))?,
            };
            if !ok {
                failures += 1;
            }
        }
    } else {
        for arg in &args {
            if shutdown.is_cancelled() {
                break;
            }
            if !handle(driver.as_ref(), &config, &shutdown, arg).await? {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        tracing::warn!(failures, "Some requests failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Run one request and print its response. Returns whether it succeeded.
async fn handle(
    driver: &dyn HypervisorDriver,
    config: &CtlConfig,
    shutdown: &CancellationToken,
    text: &str,
) -> anyhow::Result<bool> {
    let response = run(driver, config, shutdown, text).await;
    emit(&response)
}

/// Print a response line. Returns whether it reports success.
fn emit(response: &Response) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string(response)?);
    Ok(response.ok)
}

fn too_large(len: Option<usize>) -> Response {
    let size = len.map_or_else(|| "over the limit".to_string(), |len| format!("{len} bytes"));
    let error = DriverError::InvalidRequest(format!(
        "request is {size}, limit is {MAX_REQUEST_BYTES} bytes"
    ));
    tracing::error!(error = %error, "Rejected request");
    Response::failure(None, &error)
}

async fn run(
    driver: &dyn HypervisorDriver,
    config: &CtlConfig,
    shutdown: &CancellationToken,
    text: &str,
) -> Response {
    if text.len() > MAX_REQUEST_BYTES {
        return too_large(Some(text.len()));
    }

    let request = match Request::from_json(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Rejected request");
            return Response::failure(None, &e);
        }
    };

    let mut ctx = OpContext::with_token(shutdown.child_token());
    if let Some(timeout) = config.op_timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let op = request.op();
    let started = std::time::Instant::now();
    match request.dispatch(driver, &ctx).await {
        Ok(result) => {
            tracing::info!(op, elapsed_ms = started.elapsed().as_millis() as u64, "Request completed");
            Response::success(op, result)
        }
        Err(e) => {
            tracing::error!(op, kind = e.kind(), error = %e, "Request failed");
            Response::failure(Some(op), &e)
        }
    }
}
