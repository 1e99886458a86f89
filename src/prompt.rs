use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Interactive confirmation and user-visible messages.
pub trait Prompt {
    fn confirm(&mut self, message: &str) -> bool;
    fn alert(&mut self, message: &str);
}

/// Reads y/n answers from stdin.
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn confirm(&mut self, message: &str) -> bool {
        eprint!("{} [y/N] ", message);
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Answers every confirmation the same way; alerts go to the log.
pub struct AutoPrompt {
    pub answer: bool,
}

impl Prompt for AutoPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        tracing::info!(answer = self.answer, "confirm: {}", message);
        self.answer
    }

    fn alert(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Pre-recorded answers, recording everything it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<bool>,
    pub confirmations: Vec<String>,
    pub alerts: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        self.confirmations.push(message.to_string());
        self.answers.pop_front().unwrap_or(false)
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}
