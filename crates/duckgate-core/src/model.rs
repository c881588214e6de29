pub const DEFAULT_MODEL: &str = "llama-3.3-70b";

pub const KNOWN_MODELS: &[&str] = &[
    "o3-mini",
    "gpt-4o-mini",
    "llama-3.3-70b",
    "claude-3-haiku",
    "mixtral-8x7b",
];

/// The allow-list of model names plus the fallback used for anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    default_model: String,
    available: Vec<String>,
}

impl ModelCatalog {
    pub fn new(default_model: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            default_model: default_model.into(),
            available,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn contains(&self, model: &str) -> bool {
        self.available.iter().any(|m| m == model)
    }

    /// Pick the model a request runs on. Unknown or missing names fall back
    /// to the default without an error.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(model) if self.contains(model) => model,
            _ => &self.default_model,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(
            DEFAULT_MODEL,
            KNOWN_MODELS.iter().map(|m| m.to_string()).collect(),
        )
    }
}
