//! Show sync status.

use anyhow::Result;
use snapsync_client::Provider;
use snapsync_types::now_millis;
use std::path::Path;

use crate::config::{settings_path, AppConfig};

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let config = AppConfig::load(data_dir).await?;
    let settings = &config.settings;

    println!("=== snapsync status ===");
    println!();

    if !settings.is_configured() {
        println!("Sync: NOT CONFIGURED");
        println!();
        println!("Run 'snapsync init --endpoint <url> --username <user>' to configure.");
        return Ok(());
    }

    let (endpoint, account) = match settings.provider {
        Provider::WebDav => (&settings.webdav.endpoint, &settings.webdav.username),
        Provider::Upstash => (&settings.upstash.endpoint, &settings.upstash.username),
    };
    println!("Remote:");
    println!("  Provider: {}", settings.provider.as_str());
    println!("  Endpoint: {}", endpoint);
    println!("  Account:  {}", account);
    println!("  Folder:   {}", settings.folder);
    println!("  Key:      {}", settings.remote_key);
    match settings.relay() {
        Some(relay) => println!("  Relay:    {}", relay),
        None => println!("  Relay:    direct"),
    }
    println!("  Settings: {}", settings_path(data_dir).display());

    println!();
    println!("Last sync:");
    if settings.last_sync_time > 0 {
        println!("  When:     {}", format_timestamp(settings.last_sync_time));
        println!("  Provider: {}", settings.last_provider);
    } else {
        println!("  Never");
    }

    println!();
    println!("Local state:");
    if let Some(chat) = &config.state.chat {
        let live = chat.sessions.iter().filter(|s| !s.is_deleted).count();
        println!("  Chat sessions: {}", live);
    }
    if let Some(prompt) = &config.state.prompt {
        println!("  Prompts:       {}", prompt.prompts.len());
    }
    if let Some(mask) = &config.state.mask {
        println!("  Masks:         {}", mask.masks.len());
    }
    if !settings.excluded_domains.is_empty() {
        let excluded: Vec<&str> = settings
            .excluded_domains
            .iter()
            .map(|d| d.as_str())
            .collect();
        println!("  Not uploaded:  {}", excluded.join(", "));
    }

    Ok(())
}

/// Format an epoch-millis timestamp relative to now.
fn format_timestamp(ts_millis: i64) -> String {
    let diff = (now_millis() - ts_millis).max(0) / 1000;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
