//! CLI command implementations

pub mod charge;
pub mod discover;
pub mod health;
pub mod token;

use anyhow::{Context as _, Result};
use indicatif::ProgressBar;
use payonphone_lib::reader::ReaderInputOption;
use payonphone_lib::runtime::SimulatedTerminal;
use payonphone_lib::{
    BackendConfig, ConnectionTokenProvider, DeviceSession, HttpTokenProvider, ReaderEvent,
    SessionEvent, StaticTokenProvider, TerminalConfig,
};
use std::sync::{Arc, Mutex};

use crate::ui::{self, Tone};

/// Settings shared by every command.
pub struct Context {
    pub backend_url: String,
    pub location_id: String,
    pub verbose: bool,
}

impl Context {
    /// HTTP provider for the configured backend.
    pub fn http_provider(&self) -> Result<HttpTokenProvider> {
        let mut config = BackendConfig::new(&self.backend_url);
        if let Some(env) = BackendConfig::from_env() {
            config = config.with_timeout(env.timeout_secs);
        }
        HttpTokenProvider::new(config).context("Failed to create backend client")
    }

    /// Terminal settings for the chosen location, taking the currency from
    /// the environment when it is set.
    pub fn terminal_config(&self) -> TerminalConfig {
        let config = TerminalConfig::new(&self.location_id).simulated();
        match TerminalConfig::currency_from_env() {
            Some(currency) => config.with_default_currency(currency),
            None => config,
        }
    }

    /// Session over the simulated reader fleet.
    pub fn session(&self, offline: bool) -> Result<DeviceSession> {
        let provider: Arc<dyn ConnectionTokenProvider> = if offline {
            tracing::debug!("using local connection token");
            Arc::new(StaticTokenProvider::new("pst_offline_demo"))
        } else {
            Arc::new(self.http_provider()?)
        };

        let session =
            DeviceSession::new(SimulatedTerminal::new(), provider, self.terminal_config());
        session.on_event(reader_prompts());
        Ok(session)
    }
}

/// Render reader prompts and update progress as they arrive.
fn reader_prompts() -> payonphone_lib::session::SessionEventCallback {
    let update_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    Arc::new(move |event: &SessionEvent| {
        let SessionEvent::Reader(event) = event else {
            return;
        };
        let mut bar = update_bar.lock().unwrap_or_else(|e| e.into_inner());
        match event {
            ReaderEvent::SoftwareUpdateStarted(update) => {
                *bar = Some(ui::update_bar(&update.version));
            }
            ReaderEvent::SoftwareUpdateProgress(progress) => {
                if let Some(pb) = bar.as_ref() {
                    pb.set_position((progress * 100.0).round() as u64);
                }
            }
            ReaderEvent::SoftwareUpdateFinished { error } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                match error {
                    Some(error) => {
                        ui::say(Tone::Caution, &format!("Reader update failed: {}", error))
                    }
                    None => ui::say(Tone::Done, "Reader software updated"),
                }
            }
            ReaderEvent::InputRequested(options) => {
                ui::say(Tone::Reader, &input_prompt(options));
            }
            ReaderEvent::DisplayMessage(message) => {
                ui::say(Tone::Reader, &message.to_string());
            }
        }
    })
}

fn input_prompt(options: &[ReaderInputOption]) -> String {
    let verbs: Vec<&str> = options
        .iter()
        .map(|option| match option {
            ReaderInputOption::Swipe => "swipe",
            ReaderInputOption::Insert => "insert",
            ReaderInputOption::Tap => "tap",
        })
        .collect();
    match verbs.as_slice() {
        [] => "Present card".to_string(),
        [only] => format!("{} card", capitalize(only)),
        [init @ .., last] => format!("{} or {} card", capitalize(&init.join(", ")), last),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
