//! Run and daemon commands.

use std::sync::Arc;
use std::time::Duration;

use console::style;

use crate::cli::icons;
use crate::config::Config;
use crate::llm::{LlmResponder, ResponseGenerator};
use crate::pipeline::{CancelSignal, CycleReport, PipelineRunner};
use crate::platform::{Platform, XApiClient};
use crate::rate_limit::RateLimiter;
use crate::repository::DbContext;

fn build_runner(config: &Config) -> anyhow::Result<PipelineRunner> {
    let ctx = DbContext::from_url(&config.resolved_database_url())?;
    let platform: Arc<dyn Platform> = Arc::new(XApiClient::new(&config.platform)?);
    let generator: Arc<dyn ResponseGenerator> = Arc::new(LlmResponder::new(config.llm.clone())?);
    let limiter = RateLimiter::new(config.rate_limits.clone());

    Ok(PipelineRunner::new(
        ctx.replies(),
        platform,
        limiter,
        generator,
        config.pipeline.clone(),
    ))
}

/// Cancel on Ctrl-C. In-flight platform calls finish first.
fn cancel_on_ctrl_c() -> CancelSignal {
    let cancel = CancelSignal::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!(
                "\n{} Interrupted, finishing current reply...",
                icons::warn()
            );
            signal.cancel();
        }
    });
    cancel
}

fn print_report(report: &CycleReport) {
    let icon = if report.rate_limited || report.cancelled {
        icons::warn()
    } else {
        icons::success()
    };
    println!(
        "{} {} parents, {} replies fetched, {} answered",
        icon,
        report.parents,
        report.fetched,
        style(report.responded).green()
    );

    let failures = report.generation_failures + report.post_failures;
    if failures > 0 {
        println!(
            "  {} {} failed ({} generation, {} posting)",
            icons::error(),
            failures,
            report.generation_failures,
            report.post_failures
        );
    }
    if report.abandoned > 0 {
        println!("  {} {} abandoned", icons::warn(), report.abandoned);
    }
    if report.store_errors > 0 {
        println!(
            "  {} {} parents skipped over database errors",
            icons::error(),
            report.store_errors
        );
    }
    if report.rate_limited {
        println!("  {} Platform quota exhausted, stopped early", icons::warn());
    }
    if report.cancelled {
        println!("  {} Cancelled", icons::warn());
    }
}

/// Run one cycle.
pub async fn cmd_run(config: &Config) -> anyhow::Result<()> {
    let runner = build_runner(config)?;
    let cancel = cancel_on_ctrl_c();

    println!("{} Running reply cycle...", icons::info());
    let report = runner.run_cycle(&cancel).await?;
    print_report(&report);
    Ok(())
}

/// Run cycles back to back, sleeping `interval` seconds in between.
pub async fn cmd_daemon(config: &Config, interval: u64) -> anyhow::Result<()> {
    let runner = build_runner(config)?;
    let cancel = cancel_on_ctrl_c();

    println!(
        "{} Reply daemon started (every {}s, Ctrl-C to stop)",
        icons::info(),
        interval
    );

    loop {
        match runner.run_cycle(&cancel).await {
            Ok(report) => print_report(&report),
            Err(e) => {
                tracing::error!("Reply cycle failed: {}", e);
                println!("{} Cycle failed: {}", icons::error(), e);
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        println!(
            "{} Sleeping for {}s before next cycle...",
            icons::dim_arrow(),
            interval
        );
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = cancel.cancelled() => break,
        }
    }

    println!("{} Reply daemon stopped", icons::success());
    Ok(())
}
