//! Write sync settings.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use snapsync_client::{Provider, SyncSettings};
use std::path::Path;

use crate::config::{load_settings, save_settings, settings_path};

/// Remote store kind, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// WebDAV server.
    Webdav,
    /// Upstash Redis REST.
    Upstash,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Webdav => Provider::WebDav,
            ProviderArg::Upstash => Provider::Upstash,
        }
    }
}

/// Arguments of `snapsync init`.
#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Remote store kind
    #[arg(long, value_enum, default_value = "webdav")]
    pub provider: ProviderArg,

    /// Server (WebDAV) or REST (Upstash) endpoint
    #[arg(long)]
    pub endpoint: String,

    /// WebDAV user, or Upstash key namespace (defaults to the folder)
    #[arg(long, short)]
    pub username: Option<String>,

    /// WebDAV password or Upstash token (will prompt if not provided)
    #[arg(long, short)]
    pub password: Option<String>,

    /// Relay base URL for routing requests
    #[arg(long)]
    pub proxy_url: Option<String>,

    /// Talk to the endpoint directly even if a relay is set
    #[arg(long)]
    pub no_proxy: bool,

    /// Remote folder
    #[arg(long)]
    pub folder: Option<String>,

    /// Overwrite existing credentials
    #[arg(long)]
    pub force: bool,
}

/// Run the init command.
pub async fn run(data_dir: &Path, args: &InitArgs) -> Result<()> {
    let mut settings = load_settings(data_dir).await?;
    if settings.is_configured() && !args.force {
        anyhow::bail!(
            "Sync already configured at {}. Use --force to overwrite.",
            settings_path(data_dir).display()
        );
    }

    let secret = match &args.password {
        Some(secret) => secret.clone(),
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };
    apply(&mut settings, args, secret)?;
    save_settings(data_dir, &settings).await?;

    println!("Sync configured:");
    println!("  Provider: {}", settings.provider.as_str());
    println!("  Folder:   {}", settings.folder);
    match settings.relay() {
        Some(relay) => println!("  Relay:    {}", relay),
        None => println!("  Relay:    direct"),
    }
    println!();
    println!("Run 'snapsync check' to verify the connection.");

    Ok(())
}

/// Fold the arguments into the settings.
fn apply(settings: &mut SyncSettings, args: &InitArgs, secret: String) -> Result<()> {
    if let Some(folder) = &args.folder {
        settings.folder = folder.clone();
    }
    if let Some(proxy_url) = &args.proxy_url {
        settings.proxy_url = proxy_url.clone();
    }
    settings.use_proxy = !args.no_proxy;
    settings.provider = args.provider.into();

    match settings.provider {
        Provider::WebDav => {
            let username = args
                .username
                .clone()
                .context("--username is required for WebDAV")?;
            settings.webdav.endpoint = args.endpoint.clone();
            settings.webdav.username = username;
            settings.webdav.password = secret;
        }
        Provider::Upstash => {
            settings.upstash.endpoint = args.endpoint.clone();
            settings.upstash.username = args
                .username
                .clone()
                .unwrap_or_else(|| settings.folder.clone());
            settings.upstash.api_key = secret;
        }
    }

    if !settings.is_configured() {
        anyhow::bail!("Endpoint, username and password must not be empty");
    }
    Ok(())
}
