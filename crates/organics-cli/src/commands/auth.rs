//! Session commands: login, logout and status.

use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use organics_core::SessionStatus;
use serde_json::json;
use tracing::warn;

use super::Context;
use crate::output::OutputFormatter;

const ENV_EMAIL: &str = "ORGANICS_EMAIL";
const ENV_PASSWORD: &str = "ORGANICS_PASSWORD";

#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Operator email (defaults to ORGANICS_EMAIL, then the last one used)
    #[arg(long, short)]
    email: Option<String>,
}

impl LoginCommand {
    pub async fn execute(&self, ctx: &mut Context, fmt: &dyn OutputFormatter) -> Result<()> {
        if ctx.session.is_authenticated() {
            fmt.success("Already signed in");
            return Ok(());
        }

        let email = match self
            .email
            .clone()
            .or_else(|| std::env::var(ENV_EMAIL).ok())
            .filter(|e| !e.trim().is_empty())
        {
            Some(email) => email,
            None => prompt_email(ctx.config.last_username.as_deref())?,
        };
        let password = match std::env::var(ENV_PASSWORD) {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Password: ")?,
        };

        fmt.info("Signing in...");
        match ctx.session.login(&email, &password).await {
            Ok(()) => {
                ctx.config.last_username = Some(email.trim().to_string());
                if let Err(e) = ctx.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                fmt.success(&format!("Signed in as {}", email.trim()));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Ask for the email on stdin, offering `default` when the input is blank.
fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("Email [{}]: ", default),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim();
    Ok(match (email.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => email.to_string(),
    })
}

pub fn logout(ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
    let was_signed_in = ctx.session.is_authenticated();
    ctx.session.logout();
    if was_signed_in {
        fmt.success("Signed out");
    } else {
        fmt.info("Not signed in");
    }
    Ok(())
}

pub fn status(ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
    let status = ctx.session.status();
    fmt.print_json(&json!({
        "status": status,
        "api_base_url": ctx.config.api_base_url,
        "credential_store": ctx.config.credential_store,
        "last_username": ctx.config.last_username,
    }));

    match status {
        SessionStatus::Authenticated => fmt.success("Signed in"),
        _ => fmt.info("Not signed in. Run `organics login` to sign in."),
    }
    if let Some(user) = &ctx.config.last_username {
        fmt.info(&format!("Last user: {}", user));
    }
    fmt.info(&format!("Backend: {}", ctx.config.api_base_url));
    Ok(())
}
