//! Interactive credential entry
//!
//! Prompts for the API token and account ID, shows validation errors inline
//! and asks again until the pair is valid. Nothing is stored before that.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

use crate::credentials::{CredentialStore, Credentials, ValidationError, MIN_ACCOUNT_ID_LEN};

pub struct CredentialForm<R, W> {
    input: R,
    output: W,
}

impl CredentialForm<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> CredentialForm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Run the form and persist the result. `Ok(None)` when input ends early.
    pub fn run(&mut self, store: &dyn CredentialStore) -> Result<Option<Credentials>> {
        writeln!(self.output)?;
        writeln!(self.output, "🔐 ======================================")?;
        writeln!(self.output, "   LBWATCH - API CREDENTIALS")?;
        writeln!(self.output, "🔐 ======================================")?;
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Create an API token with Load Balancing: Read permission."
        )?;
        writeln!(self.output)?;

        let Some(credentials) = self.collect()? else {
            writeln!(self.output, "❌ Login cancelled.")?;
            return Ok(None);
        };

        store.set(&credentials).context("Failed to save credentials")?;
        writeln!(self.output)?;
        writeln!(self.output, "✅ Credentials saved.")?;
        Ok(Some(credentials))
    }

    /// Prompt until a valid pair is entered
    pub fn collect(&mut self) -> Result<Option<Credentials>> {
        loop {
            let Some(token) = self.prompt("API token")? else {
                return Ok(None);
            };
            let Some(account_id) =
                self.prompt(&format!("Account ID (at least {} characters)", MIN_ACCOUNT_ID_LEN))?
            else {
                return Ok(None);
            };

            match Credentials::new(&token, &account_id) {
                Ok(credentials) => return Ok(Some(credentials)),
                Err(e) => self.show_error(&e)?,
            }
        }
    }

    fn show_error(&mut self, error: &ValidationError) -> Result<()> {
        writeln!(self.output, "❌ {}. Please try again.", error)?;
        writeln!(self.output)?;
        Ok(())
    }

    /// One line of input; `None` on end of input
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "❓ {}: ", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
