use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use panel_core::{
    BulkFile, CardBrowser, FeedSelector, HttpPanelApi, PageBootstrap, PanelController,
};
use shared::domain::{AccountId, ChannelId, SourceKind};
use tracing::info;

mod config;
mod report;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `server_url` from panel.toml / PANEL__SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// youtube, reddit or twitter.
    #[arg(long)]
    kind: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print accounts, channels and enabled controls.
    Show,
    CreateAccount {
        name: String,
    },
    /// Delete the account the page has selected.
    DeleteAccount,
    Select {
        account: String,
    },
    AddChannel {
        channel: String,
        #[arg(long)]
        account: Option<String>,
    },
    DeleteChannel {
        channel: String,
        #[arg(long)]
        account: Option<String>,
    },
    /// Import a subscription export into the selected account.
    Upload {
        path: PathBuf,
        #[arg(long)]
        account: Option<String>,
    },
    Cards {
        /// Account id, or every account of the kind when omitted.
        #[arg(long)]
        account: Option<String>,
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
}

fn resolve_kind(tag: &str) -> Result<SourceKind> {
    SourceKind::from_tag(&tag.to_ascii_lowercase()).ok_or_else(|| anyhow!("unknown kind {tag:?}"))
}

async fn select_if_requested(panel: &PanelController, account: Option<String>) {
    if let Some(account) = account {
        let outcome = panel.select_account(AccountId::new(account)).await;
        println!("{}", report::outcome("select", outcome));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let settings = config::load_settings().context("failed to load panel settings")?;
    let server_url = cli.server_url.unwrap_or(settings.server_url);
    let kind = resolve_kind(cli.kind.as_deref().unwrap_or(&settings.kind))?;

    let bootstrap = PageBootstrap::fetch(&reqwest::Client::new(), &server_url, kind)
        .await
        .with_context(|| format!("failed to bootstrap from {server_url}"))?;
    let api = Arc::new(HttpPanelApi::new(&server_url, bootstrap.token.clone())?);

    if let Command::Cards { account, page } = &cli.command {
        let feed = match account {
            Some(account) => FeedSelector::Account(AccountId::new(account.as_str())),
            None => FeedSelector::All,
        };
        let mut browser = CardBrowser::new(api);
        browser.select_feed(feed, kind).await?;
        while browser.pager().page() < *page && browser.next_page().await? {}
        println!("{}", report::cards(browser.pager(), browser.cards()));
        return Ok(());
    }

    let panel = PanelController::new(kind, api, &bootstrap);
    panel.start().await;
    info!(%server_url, %kind, "panel ready");

    match cli.command {
        Command::Show | Command::Cards { .. } => {}
        Command::CreateAccount { name } => {
            panel.set_account_name(name).await;
            println!("{}", report::outcome("create-account", panel.submit_account().await));
        }
        Command::DeleteAccount => {
            let outcome = panel.delete_selected_account().await;
            println!("{}", report::outcome("delete-account", outcome));
        }
        Command::Select { account } => {
            let outcome = panel.select_account(AccountId::new(account)).await;
            println!("{}", report::outcome("select", outcome));
        }
        Command::AddChannel { channel, account } => {
            select_if_requested(&panel, account).await;
            panel.set_channel_id(channel).await;
            println!("{}", report::outcome("add-channel", panel.submit_channel().await));
        }
        Command::DeleteChannel { channel, account } => {
            select_if_requested(&panel, account).await;
            let outcome = panel.delete_channel(ChannelId::new(channel)).await;
            println!("{}", report::outcome("delete-channel", outcome));
        }
        Command::Upload { path, account } => {
            select_if_requested(&panel, account).await;
            let file = BulkFile::from_path(&path).await?;
            println!("{}", report::outcome("upload", panel.upload_bulk_file(file).await));
        }
    }

    println!("{}", report::panel(&panel.snapshot().await));
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
