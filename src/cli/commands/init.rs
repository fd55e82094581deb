//! Initialize command.

use crate::cli::icons;
use crate::config::Config;
use crate::repository::util::redact_url_password;
use crate::repository::DbContext;

/// Create the database schema.
pub async fn cmd_init(config: &Config) -> anyhow::Result<()> {
    let url = config.resolved_database_url();
    let ctx = DbContext::from_url(&url)?;
    ctx.init_schema().await?;

    println!(
        "{} Initialized {} database at {}",
        icons::success(),
        ctx.pool().backend_name(),
        redact_url_password(&url)
    );

    if config.platform.author_handle.is_empty() {
        println!(
            "{} No platform.author_handle configured; pass --handle to `track`",
            icons::warn()
        );
    }
    Ok(())
}
