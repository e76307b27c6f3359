//! Connected-account commands: list, delete and the connect link.

use std::io::{self, Write};

use anyhow::{Context as _, Result};
use clap::Args;
use organics_core::SyncSnapshot;
use serde_json::json;
use tracing::info;

use super::Context;
use crate::output::OutputFormatter;

/// Fetch once and print the connected accounts.
pub async fn list(ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
    let controller = ctx.mount_accounts(false)?;
    let outcome = controller.refresh().await;
    controller.shutdown();

    outcome?;
    fmt.accounts(&controller.snapshot());
    Ok(())
}

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Account id, as shown by `organics accounts`
    id: String,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
        let controller = ctx.mount_accounts(false)?;

        // Only ids from a fresh listing can be deleted
        if let Err(e) = controller.refresh().await {
            controller.shutdown();
            return Err(e.into());
        }
        if let Err(e) = ensure_listed(&controller.snapshot(), &self.id) {
            controller.shutdown();
            return Err(e);
        }

        if !self.yes && !confirm("Are you sure you want to delete this TikTok account?")? {
            controller.shutdown();
            fmt.info("Cancelled");
            return Ok(());
        }

        let outcome = controller.remove(&self.id).await;
        controller.shutdown();

        match outcome {
            Ok(()) => {
                info!(account_id = %self.id, "Account deleted from CLI");
                fmt.print_json(&json!({"deleted": self.id}));
                fmt.success(&format!("Deleted TikTok account {}", self.id));
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("Failed to delete TikTok account. Please try again.")),
        }
    }
}

fn ensure_listed(snapshot: &SyncSnapshot, id: &str) -> Result<()> {
    if snapshot.contains(id) {
        Ok(())
    } else {
        anyhow::bail!(
            "No connected TikTok account with id {}. Run `organics accounts` to see the list.",
            id
        )
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[derive(Debug, Args)]
pub struct ConnectUrlCommand {
    /// Open the link in the default browser
    #[arg(long)]
    open: bool,
}

impl ConnectUrlCommand {
    pub fn execute(&self, ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
        let url = &ctx.config.connect_url;
        fmt.print_json(&json!({"connect_url": url}));
        fmt.info("Authorize a TikTok account with:");
        fmt.info(url);

        if self.open {
            webbrowser::open(url).context("Failed to open browser")?;
            fmt.success("Opened in browser");
        }
        Ok(())
    }
}
