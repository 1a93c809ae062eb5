use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::env::var("UPLIFT_OUTPUT").as_deref() == Ok("plain") {
        return OutputStyle::Plain;
    }
    if std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// Plain output is the bare message; rich output carries an ASCII badge.
pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

pub fn print_section(style: OutputStyle, title: &str) {
    if style == OutputStyle::Plain {
        return;
    }
    println!();
    println!("{}", colorize(section_style(), &format!("== {title} ==")));
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub struct MigrationProgress {
    progress_bar: Option<ProgressBar>,
}

impl MigrationProgress {
    pub fn start(style: OutputStyle, total: u64) -> Self {
        let progress_bar = if style == OutputStyle::Rich && total > 0 {
            let progress_bar = ProgressBar::new(total);
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<10} [{bar:20.cyan/blue}] {pos:>2}/{len:2}",
            ) {
                progress_bar.set_style(template.progress_chars("=>-"));
            }
            progress_bar.set_message("migrating");
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        Self { progress_bar }
    }

    pub fn tick(&self) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.inc(1);
        }
    }

    pub fn finish(self) {
        if let Some(progress_bar) = self.progress_bar {
            progress_bar.finish_and_clear();
        }
    }
}
