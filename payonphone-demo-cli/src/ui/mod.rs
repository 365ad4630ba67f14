//! Terminal output for the demo.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const RULE_WIDTH: usize = 48;

/// Kind of status line, which picks its marker and stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Done,
    Failed,
    Note,
    Caution,
    /// Something the cardholder has to do at the reader.
    Reader,
}

impl Tone {
    fn marker(self) -> ColoredString {
        match self {
            Tone::Done => "✓".green().bold(),
            Tone::Failed => "✗".red().bold(),
            Tone::Note => "·".blue().bold(),
            Tone::Caution => "!".yellow().bold(),
            Tone::Reader => "▸".magenta().bold(),
        }
    }
}

/// Print one status line. Failures go to stderr.
pub fn say(tone: Tone, message: &str) {
    let marker = tone.marker();
    match tone {
        Tone::Failed => eprintln!("{} {}", marker, message),
        Tone::Reader => println!("{} {}", marker, message.bold()),
        _ => println!("{} {}", marker, message),
    }
}

/// Start a titled block of output.
pub fn section(title: &str) {
    println!("\n{}", title.bold());
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}

/// Print an aligned label and value.
pub fn field(label: &str, value: &str) {
    println!("  {:<18} {}", format!("{}:", label).cyan(), value);
}

/// Spinner shown while waiting on the backend or the reader.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Percentage bar for reader software updates.
pub fn update_bar(version: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/blue}] {pos:>3}%")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("Updating reader to {}", version));
    pb
}

/// Ask a yes/no question on the terminal.
pub fn confirm(question: &str, default: bool) -> anyhow::Result<bool> {
    let answer = dialoguer::Confirm::new()
        .with_prompt(question)
        .default(default)
        .interact()?;
    Ok(answer)
}
