use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use kbrag_core::{Error, Result};

use crate::agent::AnswerAgent;
use crate::chain::AnswerChain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Chain,
    Agent,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Chain => "chain",
            Mode::Agent => "agent",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chain" => Ok(Mode::Chain),
            "agent" => Ok(Mode::Agent),
            other => Err(Error::InvalidRequest(format!("mode must be 'chain' or 'agent', got '{other}'"))),
        }
    }
}

/// Something that turns a question into an answer text.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str, k: usize) -> Result<String>;
}

#[async_trait]
impl Answerer for AnswerChain {
    async fn answer(&self, question: &str, k: usize) -> Result<String> {
        AnswerChain::answer(self, question, k).await
    }
}

#[async_trait]
impl Answerer for AnswerAgent {
    /// The model picks its own `k` through the tool; the request's `k` only sizes the matches.
    async fn answer(&self, question: &str, _k: usize) -> Result<String> {
        Ok(self.run(question).await?.answer)
    }
}
