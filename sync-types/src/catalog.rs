//! Keyed catalog domains: prompts and masks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The prompt domain: user prompt templates keyed by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptState {
    /// Prompts keyed by id.
    #[serde(default)]
    pub prompts: BTreeMap<String, Prompt>,
    /// Non-merge fields of the prompt store.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Identifier, equal to its key in [`PromptState::prompts`].
    pub id: String,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Template body.
    #[serde(default)]
    pub content: String,
    /// Creation time (epoch millis).
    #[serde(default)]
    pub created_at: i64,
    /// Other fields (`isUser`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prompt {
    /// Create a prompt.
    pub fn new(id: impl Into<String>, title: &str, content: &str) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: 0,
            extra: Map::new(),
        }
    }
}

impl PromptState {
    /// Build a prompt state from a list of prompts, keyed by their ids.
    pub fn from_prompts(prompts: impl IntoIterator<Item = Prompt>) -> Self {
        Self {
            prompts: prompts.into_iter().map(|p| (p.id.clone(), p)).collect(),
            extra: Map::new(),
        }
    }
}

/// The mask domain: persona presets keyed by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskState {
    /// Masks keyed by id.
    #[serde(default)]
    pub masks: BTreeMap<String, Mask>,
    /// Non-merge fields of the mask store.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A persona preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mask {
    /// Identifier, equal to its key in [`MaskState::masks`].
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Avatar identifier.
    #[serde(default)]
    pub avatar: String,
    /// Context messages, model config, language, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Mask {
    /// Create a mask.
    pub fn new(id: impl Into<String>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            avatar: String::new(),
            extra: Map::new(),
        }
    }
}

impl MaskState {
    /// Build a mask state from a list of masks, keyed by their ids.
    pub fn from_masks(masks: impl IntoIterator<Item = Mask>) -> Self {
        Self {
            masks: masks.into_iter().map(|m| (m.id.clone(), m)).collect(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_state_is_keyed_by_id() {
        let state = PromptState::from_prompts([
            Prompt::new("a", "Translate", "Translate to French"),
            Prompt::new("b", "Summarize", "Summarize this"),
        ]);
        assert_eq!(state.prompts.len(), 2);
        assert_eq!(state.prompts["b"].title, "Summarize");
    }

    #[test]
    fn mask_keeps_model_config_in_extra() {
        let json = r#"{"masks": {"m1": {"id": "m1", "name": "Coder", "modelConfig": {"temperature": 0.2}}}}"#;
        let state: MaskState = serde_json::from_str(json).unwrap();
        let mask = &state.masks["m1"];
        assert_eq!(mask.name, "Coder");
        assert_eq!(mask.extra["modelConfig"]["temperature"], 0.2);
    }
}
