use serde::{Deserialize, Serialize};

/// One benchmark target as routed through the hosted API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Display name, e.g. "GPT-4o Mini"
    pub name: String,
    /// API identifier passed to the benchmark tool, e.g. "openai/gpt-4o-mini"
    pub id: String,
    /// Short key used for the per-model result directory
    pub key: String,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            key: key.into(),
        }
    }
}

pub fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("GPT-4o Mini", "openai/gpt-4o-mini", "gpt-4o-mini"),
        ModelSpec::new("Claude 3 Haiku", "anthropic/claude-3-haiku", "claude-3-haiku"),
        ModelSpec::new(
            "Llama 3.1 8B",
            "meta-llama/llama-3.1-8b-instruct",
            "llama-3.1-8b",
        ),
    ]
}

/// Finds a model by its short key.
pub fn find_by_key<'a>(models: &'a [ModelSpec], key: &str) -> Option<&'a ModelSpec> {
    models.iter().find(|m| m.key == key)
}
