//! Follow-up query suggestions
//!
//! Rule-based by default: topic groups are matched against the query and
//! their candidates are taken in group order, padded from a general list.
//! With smart suggestions enabled the generation backend is asked first and
//! the rules fill any gap.

use super::handlers::StageHandler;
use super::state::{PartialResult, Query, WorkflowState};
use crate::collaborators::{call_with_timeout, Services};
use crate::errors::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Maximum number of suggestions returned
pub const MAX_SUGGESTIONS: usize = 3;

struct TopicGroup {
    triggers: &'static [&'static str],
    candidates: [&'static str; 5],
}

const TOPIC_GROUPS: &[TopicGroup] = &[
    // Documents
    TopicGroup {
        triggers: &["document", "pdf", "file", "text", "content"],
        candidates: [
            "Can you search for more specific information in the documents?",
            "What are the key findings from the uploaded documents?",
            "Can you summarize the main points from the documents?",
            "Are there any important dates or figures mentioned in the documents?",
            "What conclusions can be drawn from the document analysis?",
        ],
    },
    // Math
    TopicGroup {
        triggers: &["calculate", "compute", "math", "statistics", "average", "sum", "percentage"],
        candidates: [
            "Can you perform additional calculations on this data?",
            "What statistical analysis can be done on these numbers?",
            "Can you create a visualization of these results?",
            "What are the trends in this data?",
            "Can you compare these results with historical data?",
        ],
    },
    // Database
    TopicGroup {
        triggers: &["database", "table", "sql", "query", "data", "records"],
        candidates: [
            "What other tables are available in the database?",
            "Can you show me the structure of the tables?",
            "What queries can I run on this data?",
            "Are there any relationships between the tables?",
            "Can you provide more detailed analysis of this data?",
        ],
    },
    // Financial
    TopicGroup {
        triggers: &["stock", "price", "market", "investment", "financial", "revenue", "profit"],
        candidates: [
            "What are the recent trends in this stock?",
            "How does this compare to competitors?",
            "What factors might affect this investment?",
            "Can you provide a risk analysis?",
            "What are the growth projections?",
        ],
    },
    // Legal
    TopicGroup {
        triggers: &["legal", "law", "contract", "regulation", "compliance", "liability"],
        candidates: [
            "What are the legal implications of this?",
            "Are there any compliance requirements?",
            "What are the potential risks involved?",
            "How does this relate to current regulations?",
            "What documentation would be needed?",
        ],
    },
];

const GENERAL_SUGGESTIONS: [&str; 5] = [
    "Can you provide more details about this?",
    "What are the implications of this information?",
    "How does this relate to other data we have?",
    "What are the next steps based on this analysis?",
    "Are there any recommendations you can make?",
];

const SUGGESTION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates relevant follow-up questions.";

/// Rule-based suggestions: deterministic, unique, 1..=3 items
///
/// Only the query drives the rules; the response is accepted so both paths
/// share one signature.
pub fn suggest(query: &str, _response: &str) -> Vec<String> {
    let lower = query.to_lowercase();

    let topical = TOPIC_GROUPS
        .iter()
        .filter(|group| group.triggers.iter().any(|t| lower.contains(t)))
        .flat_map(|group| group.candidates.iter());

    let mut suggestions = Vec::with_capacity(MAX_SUGGESTIONS);
    push_unique(&mut suggestions, topical.chain(GENERAL_SUGGESTIONS.iter()).copied());
    suggestions
}

fn push_unique<'a>(target: &mut Vec<String>, candidates: impl Iterator<Item = &'a str>) {
    for candidate in candidates {
        if target.len() >= MAX_SUGGESTIONS {
            break;
        }
        if !target.iter().any(|s| s == candidate) {
            target.push(candidate.to_string());
        }
    }
}

/// Parse one-per-line model output, dropping list markers
fn parse_generated(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')'))
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Suggest stage
pub struct SuggestionGenerator {
    services: Services,
    smart: bool,
    timeout: Duration,
}

impl SuggestionGenerator {
    pub fn new(services: Services, smart: bool, timeout: Duration) -> Self {
        Self {
            services,
            smart,
            timeout,
        }
    }

    async fn generated(&self, query: &str, response: &str) -> Result<Vec<String>> {
        let generator = self.services.generator()?;

        let prompt = format!(
            "Based on the following query and response, generate {} relevant follow-up questions \
            that would be helpful for the user.\n\nOriginal Query: {}\nResponse: {}\n\n\
            Return only the questions, one per line, without numbering or bullet points.",
            MAX_SUGGESTIONS, query, response
        );

        let text = call_with_timeout(
            "generation",
            self.timeout,
            generator.generate(SUGGESTION_SYSTEM_PROMPT, &prompt),
        )
        .await?;

        Ok(parse_generated(&text))
    }
}

#[async_trait]
impl StageHandler for SuggestionGenerator {
    async fn run(&self, query: &Query, state: &WorkflowState) -> Result<PartialResult> {
        let response = state.final_response().unwrap_or_default();
        let rules = suggest(&query.text, response);

        if !self.smart {
            return Ok(PartialResult::new().with_suggestions(rules));
        }

        let suggestions = match self.generated(&query.text, response).await {
            Ok(generated) => {
                let mut merged = Vec::with_capacity(MAX_SUGGESTIONS);
                push_unique(&mut merged, generated.iter().map(String::as_str));
                push_unique(&mut merged, rules.iter().map(String::as_str));
                merged
            }
            Err(e) => {
                tracing::debug!(error = %e, "Smart suggestions unavailable, using rules");
                rules
            }
        };

        Ok(PartialResult::new().with_suggestions(suggestions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Generator;
    use crate::persona::Persona;
    use std::sync::Arc;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_general_query_gets_general_list() {
        let suggestions = suggest("Hello, how are you?", "");
        assert_eq!(
            suggestions,
            vec![
                "Can you provide more details about this?",
                "What are the implications of this information?",
                "How does this relate to other data we have?",
            ]
        );
    }

    #[test]
    fn test_topic_groups_in_definition_order() {
        let suggestions = suggest("Show me stock data", "");
        // "data" hits the database group, which comes before financial
        assert_eq!(suggestions[0], "What other tables are available in the database?");
        assert_eq!(suggestions.len(), 3);
    }

    #[test]
    fn test_suggestions_are_unique_and_bounded() {
        for query in ["", "pdf law", "calculate the sum", "legal contract", "anything"] {
            let suggestions = suggest(query, "response");
            assert!(!suggestions.is_empty() && suggestions.len() <= MAX_SUGGESTIONS);
            let mut deduped = suggestions.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), suggestions.len());
        }
    }

    #[test]
    fn test_suggest_is_deterministic() {
        assert_eq!(suggest("legal risk", "a"), suggest("legal risk", "b"));
    }

    #[test]
    fn test_parse_generated_strips_markers() {
        let parsed = parse_generated("1. First?\n- Second?\n\n  Third?  ");
        assert_eq!(parsed, vec!["First?", "Second?", "Third?"]);
    }

    #[tokio::test]
    async fn test_smart_path_pads_from_rules() {
        let services = Services::new().with_generator(Arc::new(FixedGenerator("Only one?")));
        let generator = SuggestionGenerator::new(services, true, Duration::from_secs(1));
        let query = Query::new("Hello", Persona::General);
        let state = WorkflowState::new(&query);

        let partial = generator.run(&query, &state).await.unwrap();
        let suggestions = partial.suggestions.unwrap();

        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0], "Only one?");
        assert_eq!(suggestions[1], "Can you provide more details about this?");
    }

    #[tokio::test]
    async fn test_smart_path_falls_back_without_generator() {
        let generator = SuggestionGenerator::new(Services::new(), true, Duration::from_secs(1));
        let query = Query::new("Hello", Persona::General);
        let state = WorkflowState::new(&query);

        let partial = generator.run(&query, &state).await.unwrap();
        assert_eq!(partial.suggestions.unwrap(), suggest("Hello", ""));
    }
}
