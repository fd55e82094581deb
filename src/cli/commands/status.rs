//! Status and limits commands.

use console::style;

use crate::cli::icons;
use crate::config::Config;
use crate::rate_limit::EndpointClass;
use crate::repository::util::redact_url_password;
use crate::repository::DbContext;

/// Show reply counts for the whole table or one parent.
pub async fn cmd_status(config: &Config, parent: Option<&str>) -> anyhow::Result<()> {
    let url = config.resolved_database_url();
    let ctx = DbContext::from_url(&url)?;
    let stats = ctx.replies().stats(parent).await?;

    println!("\n{}", style("Reply Engine Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<16} {}", "Database:", redact_url_password(&url));
    println!("{:<16} {}", "Backend:", ctx.pool().backend_name());
    if let Some(parent) = parent {
        println!("{:<16} {}", "Parent:", parent);
    }
    if let Some(path) = &config.source_path {
        println!("{:<16} {}", "Config:", path.display());
    }
    println!();
    println!("{:<16} {}", "Replies:", stats.total);
    println!("{:<16} {}", "Pending:", style(stats.unprocessed).yellow());
    println!("{:<16} {}", "Answered:", style(stats.responded).green());
    println!("{:<16} {}", "Abandoned:", style(stats.abandoned).red());

    Ok(())
}

/// Print the configured rate-limit windows.
pub fn cmd_limits(config: &Config) -> anyhow::Result<()> {
    let limits = &config.rate_limits;

    println!("\n{}", style("Rate Limits").bold());
    println!("{}", "-".repeat(60));
    println!(
        "{:<8} {:>8} {:>8} {:>8} {:>12} {:>10}",
        "Class", "Window", "Hard", "Buffer", "Interval", "Jitter"
    );
    for class in EndpointClass::ALL {
        let window = limits.window(class);
        println!(
            "{:<8} {:>7}s {:>8} {:>8} {:>11.2}s {:>9}ms",
            class.as_str(),
            window.window_secs,
            window.hard_quota,
            window.buffer_quota(),
            window.min_interval().as_secs_f64(),
            window.max_jitter_ms
        );
    }

    let backoff = &limits.backoff;
    println!();
    println!(
        "{} Backoff after {} consecutive failures: {}s doubling, capped at {}s",
        icons::info(),
        backoff.failure_threshold,
        backoff.base_secs,
        backoff.cap_secs
    );
    Ok(())
}
