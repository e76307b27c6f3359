//! Live view: poll the backend and reprint whenever the list changes.

use anyhow::Result;
use clap::Args;
use organics_core::SyncSnapshot;
use tracing::info;

use super::Context;
use crate::output::OutputFormatter;

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Poll interval in seconds (overrides the configured value)
    #[arg(long)]
    interval: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &mut Context, fmt: &dyn OutputFormatter) -> Result<()> {
        if let Some(secs) = self.interval {
            ctx.config.poll_interval_secs = secs.max(1);
        }
        let controller = ctx.mount_accounts(true)?;
        let mut snapshots = controller.subscribe();
        let mut session = ctx.session.subscribe();

        info!(interval_secs = ctx.config.poll_interval_secs, "Watching connected accounts");
        fmt.info("Watching connected accounts. Press Ctrl-C to stop.");

        let mut last_printed: Option<SyncSnapshot> = None;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    fmt.info("Stopping");
                    break;
                }
                changed = session.changed() => {
                    if changed.is_err() || !session.borrow_and_update().is_authenticated() {
                        controller.shutdown();
                        anyhow::bail!("Session expired - please sign in again");
                    }
                }
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    if should_print(last_printed.as_ref(), &snapshot) {
                        fmt.accounts(&snapshot);
                        last_printed = Some(snapshot);
                    }
                }
            }
        }

        controller.shutdown();
        Ok(())
    }
}

/// Reprint after a fetch lands, skipping the transient loading states.
fn should_print(previous: Option<&SyncSnapshot>, next: &SyncSnapshot) -> bool {
    if next.is_loading() {
        return false;
    }
    match previous {
        None => true,
        Some(previous) => {
            previous.accounts != next.accounts
                || previous.last_error != next.last_error
                || previous.phase != next.phase
        }
    }
}
