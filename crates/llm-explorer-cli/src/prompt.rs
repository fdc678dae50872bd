//! Install prompt answered on the terminal.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use llm_explorer_core::install::{InstallPrompt, UserChoice};
use llm_explorer_core::PromptError;

#[derive(Default)]
pub struct TerminalPrompt {
    default_suppressed: bool,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_answer(line: &str) -> UserChoice {
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => UserChoice::Accepted,
            _ => UserChoice::Dismissed,
        }
    }
}

#[async_trait]
impl InstallPrompt for TerminalPrompt {
    fn prevent_default(&mut self) {
        self.default_suppressed = true;
    }

    async fn prompt(&mut self) -> Result<UserChoice, PromptError> {
        if !self.default_suppressed {
            return Err(PromptError("prompt was not deferred".to_string()));
        }

        let answer = tokio::task::spawn_blocking(|| -> io::Result<String> {
            eprint!("Install LLM Explorer for offline use? [y/N] ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| PromptError(e.to_string()))?
        .map_err(|e| PromptError(e.to_string()))?;

        Ok(Self::parse_answer(&answer))
    }
}
