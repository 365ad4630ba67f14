//! Discover command - scan for readers

use anyhow::Result;
use payonphone_lib::DiscoveryOutcome;

use super::Context;
use crate::ui::{self, Tone};

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &Context, offline: bool) -> Result<()> {
    ui::section("Discover Readers");

    let session = ctx.session(offline)?;
    if ctx.verbose {
        ui::say(Tone::Note, &format!("Location: {}", ctx.location_id));
    }

    let Some(scan) = session.discover_readers() else {
        anyhow::bail!("a scan is already running");
    };
    let spinner = ui::spinner("Scanning...");
    let outcome = scan.wait().await;
    spinner.finish_and_clear();

    if let DiscoveryOutcome::Failed(e) = outcome {
        ui::say(Tone::Failed, &format!("Discovery failed: {}", e));
        return Ok(());
    }

    let readers = session.snapshot().discovered_readers;
    if readers.is_empty() {
        ui::say(Tone::Note, "No readers found");
        return Ok(());
    }

    ui::say(Tone::Done, &format!("Found {} reader(s)", readers.len()));
    for reader in &readers {
        ui::field(&reader.serial_number, reader.display_label());
        if ctx.verbose {
            ui::field("  type", reader.device_type.as_str());
            ui::field("  firmware", reader.software_version.as_deref().unwrap_or("unknown"));
        }
    }

    Ok(())
}
