//! Terminal-backed operator.
//!
//! Uses dialoguer for prompts. Informational lines go to the writer, stdout by
//! default.

use std::cell::RefCell;
use std::io::{self, Write};

use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};

use appdev_core::error::{Error, Result};
use appdev_core::operator::Operator;

pub struct TerminalOperator<W: Write = io::Stdout> {
    writer: RefCell<W>,
    theme: ColorfulTheme,
}

impl TerminalOperator<io::Stdout> {
    pub fn new() -> Self {
        Self {
            writer: RefCell::new(io::stdout()),
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalOperator<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TerminalOperator<W> {
    /// Operator writing to a custom writer (for testing).
    #[cfg(test)]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
            theme: ColorfulTheme::default(),
        }
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

fn prompt_error(err: dialoguer::Error) -> Error {
    Error::Prompt(format!("Unable to read input: {err}"))
}

impl<W: Write> Operator for TerminalOperator<W> {
    fn say(&self, message: &str) {
        let mut writer = self.writer.borrow_mut();
        let _ = writeln!(writer, "{message}");
        let _ = writer.flush();
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn prompt_text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(prompt_error)
    }

    fn prompt_choice(&self, prompt: &str, choices: &[&str], default: usize) -> Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(choices)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn prompt_secret(&self, prompt: &str) -> Result<String> {
        Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)
    }
}
