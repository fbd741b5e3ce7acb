//! Answer personas
//!
//! A persona selects the system prompt handed to the generation backend and
//! the wording of templated answers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persona requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Financial,
    Legal,
    #[default]
    General,
}

/// Persona listing entry
#[derive(Debug, Clone, Serialize)]
pub struct PersonaInfo {
    #[serde(rename = "type")]
    pub persona: Persona,
    pub name: &'static str,
    pub description: &'static str,
}

const FINANCIAL_PROMPT: &str = "You are a professional financial advisor with expertise in \
stock market analysis, portfolio management, economic indicators and risk assessment. \
Give clear, data-driven answers, state the risks involved, and recommend consulting a \
licensed professional before any specific investment decision.";

const LEGAL_PROMPT: &str = "You are a legal advisor with expertise in contract law, corporate \
regulation, intellectual property and compliance. Provide general legal information only, \
make clear that it is not legal advice, and recommend qualified legal counsel for specific \
situations.";

const GENERAL_PROMPT: &str = "You are a knowledgeable general assistant. Give helpful, accurate \
and well-reasoned answers in a conversational but professional tone.";

impl Persona {
    /// All personas in display order
    pub fn all() -> [Persona; 3] {
        [Persona::Financial, Persona::Legal, Persona::General]
    }

    /// Parse a persona name, falling back to `General` for anything unknown
    pub fn parse_or_default(name: &str) -> Persona {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(persona = name, "Unknown persona, using general");
            Persona::General
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Financial => "financial",
            Persona::Legal => "legal",
            Persona::General => "general",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Financial => "Financial Advisor",
            Persona::Legal => "Legal Advisor",
            Persona::General => "General Assistant",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Persona::Financial => "Expert in financial analysis, investment strategies, and market trends",
            Persona::Legal => "Expert in legal analysis, compliance, and regulatory guidance",
            Persona::General => "Versatile assistant for general knowledge and problem-solving",
        }
    }

    /// System prompt for the generation backend
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Financial => FINANCIAL_PROMPT,
            Persona::Legal => LEGAL_PROMPT,
            Persona::General => GENERAL_PROMPT,
        }
    }

    pub fn info(&self) -> PersonaInfo {
        PersonaInfo {
            persona: *self,
            name: self.display_name(),
            description: self.description(),
        }
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "financial" => Ok(Persona::Financial),
            "legal" => Ok(Persona::Legal),
            "general" => Ok(Persona::General),
            other => Err(format!("unknown persona: {}", other)),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
