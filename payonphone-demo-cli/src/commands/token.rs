//! Token command - mint one connection token

use anyhow::{Context as _, Result};
use payonphone_lib::ConnectionTokenProvider;

use super::Context;
use crate::ui::{self, Tone};

pub async fn run(ctx: &Context) -> Result<()> {
    ui::section("Connection Token");

    let provider = ctx.http_provider()?;
    let spinner = ui::spinner("Requesting token...");
    let result = provider.fetch_connection_token().await;
    spinner.finish_and_clear();

    let token = result.context("Failed to mint connection token")?;
    ui::say(Tone::Done, "Token minted");
    ui::field("Backend", &ctx.backend_url);
    ui::field("Secret length", &token.len().to_string());

    Ok(())
}
