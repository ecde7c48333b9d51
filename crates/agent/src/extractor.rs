use std::sync::Arc;

use maitre_core::VenueContact;
use serde_json::Value;
use tracing::{debug, warn};

use crate::heuristics;
use crate::llm::LlmClient;

/// Why the model path was abandoned for a given prompt. Always handled
/// locally by falling back to the heuristic extractor, never surfaced to
/// callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    ModelUnavailable(String),
    UnusableOutput,
}

pub struct VenueExtractor {
    llm: Arc<dyn LlmClient>,
}

impl VenueExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Extract venue contact details from a prompt. Infallible by contract:
    /// every failure mode degrades to the heuristic result.
    pub async fn extract(&self, prompt: &str) -> VenueContact {
        match self.model_extract(prompt).await {
            Ok(contact) if contact.is_complete() => contact,
            Ok(partial) => {
                debug!(
                    event_name = "agent.extract.partial_model_result",
                    "model supplied a partial result, filling gaps from heuristics"
                );
                partial.merge(heuristics::extract(prompt))
            }
            Err(reason) => {
                warn!(
                    event_name = "agent.extract.fallback",
                    reason = ?reason,
                    "model extraction unavailable, using heuristic extractor"
                );
                heuristics::extract(prompt)
            }
        }
    }

    async fn model_extract(&self, prompt: &str) -> Result<VenueContact, FallbackReason> {
        let instruction = extraction_prompt(prompt);
        let raw = self
            .llm
            .complete(&instruction)
            .await
            .map_err(|error| FallbackReason::ModelUnavailable(error.to_string()))?;

        let parsed = sanitize_model_json(&raw).ok_or(FallbackReason::UnusableOutput)?;
        Ok(coerce_contact(&parsed))
    }
}

fn extraction_prompt(prompt: &str) -> String {
    format!(
        "Return ONLY valid JSON. Extract:\n\
         - venue_name\n\
         - venue_phone\n\n\
         Format:\n\
         {{\n  \"venue_name\": string|null,\n  \"venue_phone\": string|null\n}}\n\n\
         If unknown, use null. Do not add any extra fields or text.\n\n\
         User text:\n{prompt}"
    )
}

/// Strip code-fence markers and parse the first `{ ... }` block as JSON.
pub fn sanitize_model_json(raw: &str) -> Option<Value> {
    let defenced = raw.replace("```json", "```").replace("```JSON", "```").replace("```", "");
    let cleaned = defenced.trim();

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str(&cleaned[start..=end]) {
                return Some(value);
            }
        }
    }
    serde_json::from_str(cleaned).ok()
}

/// Coerce a parsed model object into a contact: trimmed non-empty strings
/// survive, everything else becomes absent.
pub fn coerce_contact(value: &Value) -> VenueContact {
    VenueContact {
        venue_name: string_field(value, "venue_name"),
        venue_phone: string_field(value, "venue_phone"),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    let trimmed = value.get(key)?.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LlmClient for FixedModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct OfflineModel;

    #[async_trait]
    impl LlmClient for OfflineModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("model offline"))
        }
    }

    #[test]
    fn sanitizer_recovers_json_wrapped_in_code_fences() {
        let fenced = "```json\n{\"venue_name\": \"Nopa\", \"venue_phone\": null}\n```";
        let bare = "{\"venue_name\": \"Nopa\", \"venue_phone\": null}";
        assert_eq!(sanitize_model_json(fenced), sanitize_model_json(bare));
        assert!(sanitize_model_json(fenced).is_some());
    }

    #[test]
    fn sanitizer_ignores_prose_around_the_object() {
        let chatty = "Here you go:\n{\"venue_name\": \"Nopa\", \"venue_phone\": null}\nEnjoy!";
        let value = sanitize_model_json(chatty).expect("object should parse");
        assert_eq!(value["venue_name"], "Nopa");
    }

    #[test]
    fn sanitizer_rejects_non_json_output() {
        assert_eq!(sanitize_model_json("I could not find a venue."), None);
    }

    #[test]
    fn coercion_drops_empty_and_non_string_values() {
        let value = serde_json::json!({"venue_name": "  ", "venue_phone": 4155550199u64});
        let contact = coerce_contact(&value);
        assert_eq!(contact.venue_name, None);
        assert_eq!(contact.venue_phone, None);
    }

    #[tokio::test]
    async fn model_values_win_and_heuristics_fill_gaps() {
        let model = FixedModel("{\"venue_name\": \"State Bird Provisions\", \"venue_phone\": null}");
        let extractor = VenueExtractor::new(Arc::new(model));

        let contact = extractor.extract("book at Nopa, call 415-555-0199").await;
        assert_eq!(contact.venue_name.as_deref(), Some("State Bird Provisions"));
        assert_eq!(contact.venue_phone.as_deref(), Some("(415) 555-0199"));
    }

    #[tokio::test]
    async fn offline_model_degrades_to_heuristics() {
        let extractor = VenueExtractor::new(Arc::new(OfflineModel));

        let contact = extractor.extract("dinner at The Progress, call 415.555.0199").await;
        assert_eq!(contact.venue_name.as_deref(), Some("Progress"));
        assert_eq!(contact.venue_phone.as_deref(), Some("(415) 555-0199"));
    }

    #[tokio::test]
    async fn unusable_model_output_degrades_to_heuristics() {
        let extractor = VenueExtractor::new(Arc::new(FixedModel("no json here")));

        let contact = extractor.extract("meet at Zuni Cafe, around 8").await;
        assert_eq!(contact.venue_name.as_deref(), Some("Zuni Cafe"));
        assert_eq!(contact.venue_phone, None);
    }

    #[tokio::test]
    async fn extraction_is_deterministic_for_a_fixed_model() {
        let extractor = VenueExtractor::new(Arc::new(FixedModel(
            "{\"venue_name\": \"Lazy Bear\", \"venue_phone\": \"(415) 555-0123\"}",
        )));

        let first = extractor.extract("anything at all").await;
        let second = extractor.extract("anything at all").await;
        assert_eq!(first, second);
    }
}
