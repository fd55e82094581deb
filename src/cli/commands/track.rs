//! Track command: register a parent post.

use chrono::{DateTime, Utc};

use crate::cli::icons;
use crate::config::Config;
use crate::models::{parse_status_id, ParentMessage};
use crate::repository::DbContext;

pub async fn cmd_track(
    config: &Config,
    post: &str,
    posted_at: Option<DateTime<Utc>>,
    handle: Option<String>,
) -> anyhow::Result<()> {
    let id = parse_status_id(post)
        .ok_or_else(|| anyhow::anyhow!("Not a post id or status URL: {}", post))?;

    let handle = handle
        .map(|h| h.trim_start_matches('@').to_string())
        .unwrap_or_else(|| config.platform.author_handle.clone());
    if handle.is_empty() {
        anyhow::bail!("No author handle: pass --handle or set platform.author_handle");
    }

    let parent = ParentMessage::new(id, handle, posted_at.unwrap_or_else(Utc::now));
    let ctx = DbContext::from_url(&config.resolved_database_url())?;
    let store = ctx.replies();

    if store.track_parent(&parent).await? {
        println!(
            "{} Tracking post {} by @{}",
            icons::success(),
            parent.id,
            parent.author_handle
        );
    } else {
        println!("{} Post {} is already tracked", icons::warn(), parent.id);
    }
    Ok(())
}
