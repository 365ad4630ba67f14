//! Health command - probe the connection token backend

use anyhow::Result;

use super::Context;
use crate::ui::{self, Tone};

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &Context) -> Result<()> {
    ui::section("Backend Health");

    let provider = ctx.http_provider()?;
    let spinner = ui::spinner(&format!("Checking {}...", ctx.backend_url));

    match provider.check_health().await {
        Ok(health) => {
            spinner.finish_and_clear();
            if health.is_ok() {
                ui::say(Tone::Done, "Backend is healthy");
            } else {
                ui::say(Tone::Caution, &format!("Backend reported status '{}'", health.status));
            }
            ui::field("URL", &ctx.backend_url);
            ui::field("Server time", &health.timestamp.to_rfc3339());
        }
        Err(e) => {
            spinner.finish_and_clear();
            ui::say(Tone::Failed, &format!("Health check failed: {}", e));
            if ctx.verbose {
                ui::say(Tone::Note, &format!("Error code: {}", e.code() as i32));
            }
            anyhow::bail!("backend unavailable");
        }
    }

    Ok(())
}
