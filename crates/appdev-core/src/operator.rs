//! Operator interaction capability.
//!
//! Coordinators never read from the terminal directly. Frontends supply an
//! [`Operator`] backed by real prompts; tests supply scripted answers.

use crate::error::Result;

pub trait Operator {
    /// Show an informational line to the operator.
    fn say(&self, message: &str);

    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Ask for free text. An empty answer yields `default` when one is given.
    fn prompt_text(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask the operator to pick one of `choices`, returning its index.
    fn prompt_choice(&self, prompt: &str, choices: &[&str], default: usize) -> Result<usize>;

    /// Ask for a secret without echoing it.
    fn prompt_secret(&self, prompt: &str) -> Result<String>;
}
