//! Charge command - discover, connect, and take one payment

use anyhow::{Context as _, Result};
use payonphone_lib::{Amount, Currency, DiscoveryOutcome, Reader};

use super::Context;
use crate::ui::{self, Tone};

#[tracing::instrument(skip(ctx))]
pub async fn run(
    ctx: &Context,
    amount: &str,
    currency: Option<&str>,
    serial: Option<&str>,
    yes: bool,
    offline: bool,
) -> Result<()> {
    ui::section("Charge");

    let session = ctx.session(offline)?;
    let currency = match currency {
        Some(code) => Currency::new(code)?,
        None => session.config().default_currency.clone(),
    };
    let amount = Amount::parse_major(amount, &currency)?;

    // Discover
    let Some(scan) = session.discover_readers() else {
        anyhow::bail!("a scan is already running");
    };
    let spinner = ui::spinner("Scanning for readers...");
    let outcome = scan.wait().await;
    spinner.finish_and_clear();
    if let DiscoveryOutcome::Failed(e) = outcome {
        anyhow::bail!("discovery failed: {}", e);
    }

    let readers = session.snapshot().discovered_readers;
    let reader = pick_reader(&readers, serial)?;

    // Connect
    let spinner = ui::spinner(&format!("Connecting to {}...", reader));
    let result = session.connect_to_reader(reader).await;
    spinner.finish_and_clear();
    let connected = result.context("Failed to connect")?;
    ui::say(Tone::Done, &session.snapshot().status_text());
    tracing::debug!(serial = %connected.serial_number, "reader ready");

    ui::field("Amount", &format!("{} {}", amount.format_major(&currency), currency));
    if !yes && !ui::confirm("Charge this amount?", true)? {
        ui::say(Tone::Note, "Charge canceled");
        session.disconnect().await?;
        return Ok(());
    }

    // Charge
    let result = session.process_payment(amount, Some(currency)).await;
    match &result {
        Ok(intent) => {
            ui::say(Tone::Done, "Payment successful");
            ui::field("Intent", &intent.id);
            ui::field("Amount", &intent.display_amount());
            if let Some(card) = &intent.card {
                ui::field("Card", &format!("{} •••• {}", card.brand, card.last4));
            }
        }
        Err(e) => {
            ui::say(Tone::Failed, &format!("Payment failed: {}", e));
        }
    }

    if let Err(e) = session.disconnect().await {
        ui::say(Tone::Caution, &format!("Reader did not disconnect cleanly: {}", e));
    }

    result.map(|_| ()).map_err(Into::into)
}

fn pick_reader(readers: &[Reader], serial: Option<&str>) -> Result<Reader> {
    match serial {
        Some(serial) => readers
            .iter()
            .find(|r| r.serial_number == serial)
            .cloned()
            .with_context(|| format!("reader {} not found", serial)),
        None => readers.first().cloned().context("no readers found"),
    }
}
