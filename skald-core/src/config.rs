use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SkaldError};

/// Directory (relative to the summarized root) holding `config.toml`.
pub const CONFIG_DIR: &str = ".skald";
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level Skald configuration, matching `.skald/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkaldConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub summary: SummarySection,
    #[serde(default)]
    pub output: OutputSection,
}

impl SkaldConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SkaldError::Config(ConfigError::NotFound(path.display().to_string()))
            } else {
                SkaldError::Config(ConfigError::Parse(format!("{}: {e}", path.display())))
            }
        })?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<root>/.skald/config.toml` if it exists, defaults otherwise.
    pub fn load_or_default(root: &Path) -> crate::error::Result<Self> {
        let path = root.join(CONFIG_DIR).join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(text: &str) -> crate::error::Result<Self> {
        toml::from_str(text).map_err(|e| SkaldError::Config(ConfigError::Parse(e.to_string())))
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        const PROVIDERS: [&str; 4] = ["anthropic", "openai", "custom", "ollama"];

        if !PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(invalid(format!(
                "unknown llm.provider '{}', expected one of {}",
                self.llm.provider,
                PROVIDERS.join(", ")
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(invalid("llm.model must not be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(format!(
                "llm.temperature {} outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        if self.llm.cost_budget < 0.0 {
            return Err(invalid("llm.cost_budget must not be negative".to_string()));
        }
        for pattern in &self.source.exclude_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| invalid(format!("bad exclude pattern '{pattern}': {e}")))?;
        }
        Ok(())
    }
}

fn invalid(msg: String) -> SkaldError {
    SkaldError::Config(ConfigError::Invalid(msg))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Glob patterns (relative to the root) never listed by the local source.
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub github: GitHubSourceConfig,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "**/.git/**".into(),
                "**/.git".into(),
                "**/node_modules/**".into(),
                "**/__pycache__/**".into(),
                "**/.venv/**".into(),
                "**/.skald/**".into(),
            ],
            github: GitHubSourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSourceConfig {
    /// Environment variable holding the API token.
    pub token_env: String,
    pub api_base: String,
}

impl Default for GitHubSourceConfig {
    fn default() -> Self {
        Self {
            token_env: "GITHUB_TOKEN".into(),
            api_base: "https://api.github.com".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// One of `anthropic`, `openai`, `custom`, `ollama`.
    pub provider: String,
    pub model: String,
    /// Environment variable holding the API key; empty means no key.
    pub api_key_env: String,
    /// Empty means the provider default.
    pub base_url: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// USD; 0 means unlimited.
    pub cost_budget: f64,
    pub cache: bool,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            model: "llama3.2:latest".into(),
            api_key_env: String::new(),
            base_url: String::new(),
            temperature: 0.2,
            timeout_secs: 120,
            cost_budget: 0.0,
            cache: true,
        }
    }
}

impl LlmSection {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }

    pub fn base_url(&self) -> Option<&str> {
        (!self.base_url.is_empty()).then_some(self.base_url.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct SummarySection {
    /// Visit README entries before the rest of a directory's listing.
    #[serde(default)]
    pub readme_first: bool,
    /// Hand a finished subdirectory's context to its later siblings.
    #[serde(default)]
    pub sibling_context: bool,
    /// Summarize methods and nested functions, not only top-level ones.
    #[serde(default)]
    pub include_nested: bool,
    /// Maximum directory depth below the root; 0 means unlimited.
    #[serde(default)]
    pub max_depth: u32,
    /// Describe how Python files use the repository modules they import.
    #[serde(default)]
    pub relations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub tree_file: String,
    pub documents_file: String,
    /// Written only when `summary.relations` is on.
    pub relations_file: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            tree_file: "summary_tree.json".into(),
            documents_file: "documents.json".into(),
            relations_file: "relations.json".into(),
        }
    }
}
