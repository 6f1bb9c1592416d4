//! Catalogue of backend models the operator can pick from.

use serde::Serialize;

/// Upstream model vendor, sent as `model_provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// `OpenAI` hosted models.
    Openai,
    /// Google Gemini models.
    Google,
}

impl Provider {
    /// Wire value of the provider.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Google => "google",
        }
    }
}

/// A selectable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    /// Stable id used on the command line.
    pub id: &'static str,
    /// Display label for the header bar.
    pub label: &'static str,
    /// Vendor of the model.
    pub provider: Provider,
    /// Model name as the backend expects it.
    pub model_name: &'static str,
}

/// All models offered by the console. The first entry is the default.
pub const MODEL_OPTIONS: &[ModelOption] = &[
    ModelOption {
        id: "gpt-5",
        label: "GPT-5 · OpenAI",
        provider: Provider::Openai,
        model_name: "gpt-5",
    },
    ModelOption {
        id: "gemini-2.5-flash",
        label: "Gemini 2.5 Flash · Google",
        provider: Provider::Google,
        model_name: "gemini-2.5-flash",
    },
];

/// Look up a model by id, falling back to the default for unknown ids.
#[must_use]
pub fn find_model_option(id: &str) -> &'static ModelOption {
    MODEL_OPTIONS
        .iter()
        .find(|option| option.id == id)
        .unwrap_or(&MODEL_OPTIONS[0])
}

impl ModelOption {
    /// Look up a model by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::UnknownModel`] when no entry matches.
    pub fn by_id(id: &str) -> crate::Result<&'static Self> {
        MODEL_OPTIONS
            .iter()
            .find(|option| option.id == id)
            .ok_or_else(|| crate::CoreError::UnknownModel(id.to_string()))
    }

    /// The entry after this one, wrapping around.
    #[must_use]
    pub fn next(&self) -> &'static Self {
        let idx = MODEL_OPTIONS
            .iter()
            .position(|option| option.id == self.id)
            .unwrap_or(0);
        &MODEL_OPTIONS[(idx + 1) % MODEL_OPTIONS.len()]
    }
}
