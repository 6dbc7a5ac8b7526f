//! Oracle client: turns code, aggregates and README text into summaries.
//!
//! Every entry point shares one failure contract: a failed call becomes a
//! [`SummaryResult`] whose summary starts with [`ERROR_MARKER`] and whose
//! metadata carries the detail. Nothing here returns an error to the caller.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::LlmSection;
use crate::context::compose_prompt;
use crate::error::{LlmError, SkaldError};
use crate::llm::cache::{CacheKey, ResponseCache};
use crate::llm::{CostTracker, LlmProvider};
use crate::types::{
    ERROR_MARKER, META_CACHED, META_CONTEXT, META_ERROR, META_MODEL, SummaryKind, SummaryResult,
};

/// Bumped whenever an instruction below changes, invalidating cached completions.
pub const TEMPLATE_VERSION: &str = "skald-summary-v1";

pub const FUNCTION_INSTRUCTION: &str = "Create a short natural language summary of the function.";
pub const FILE_INSTRUCTION: &str = "Create a short natural language summary of the file.";
pub const README_INSTRUCTION: &str =
    "Create a short natural language summary of this README. It will be the baseline context for the code around it.";
pub const DIRECTORY_INSTRUCTION: &str =
    "Create a short natural language summary of the directory.";
pub const CONTEXT_INSTRUCTION: &str = "Create a short natural language summary of the context.";
pub const IMPORT_INSTRUCTION: &str =
    "In one sentence, describe specifically what the file below uses the named module for: which components it imports and how it calls or extends them.";

/// Knobs for oracle calls.
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    pub temperature: f64,
    pub timeout: Duration,
    /// USD; 0 means unlimited.
    pub cost_budget: f64,
    pub cache: bool,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self::from(&LlmSection::default())
    }
}

impl From<&LlmSection> for SummarizerOptions {
    fn from(section: &LlmSection) -> Self {
        Self {
            temperature: section.temperature,
            timeout: Duration::from_secs(section.timeout_secs),
            cost_budget: section.cost_budget,
            cache: section.cache,
        }
    }
}

/// Wraps an [`LlmProvider`] with timeouts, cost tracking, caching and the
/// error-summary contract.
#[derive(Debug)]
pub struct Summarizer {
    provider: Box<dyn LlmProvider>,
    options: SummarizerOptions,
    tracker: Mutex<CostTracker>,
    cache: Option<Mutex<ResponseCache>>,
}

impl Summarizer {
    pub fn new(provider: Box<dyn LlmProvider>, options: SummarizerOptions) -> Self {
        let cache = options.cache.then(|| Mutex::new(ResponseCache::new()));
        Self {
            provider,
            options,
            tracker: Mutex::new(CostTracker::default()),
            cache,
        }
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Snapshot of the cost tracker.
    pub fn costs(&self) -> CostTracker {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn summarize_function(&self, context: &str, code: &str, name: &str) -> SummaryResult {
        self.summarize(SummaryKind::Function, FUNCTION_INSTRUCTION, context, code, name, code)
            .await
    }

    /// Summarize a file from its aggregated function summaries. The result's
    /// `code` holds the aggregate until the caller back-fills the file text.
    pub async fn summarize_file(
        &self,
        context: &str,
        aggregated: &str,
        name: &str,
    ) -> SummaryResult {
        self.summarize(
            SummaryKind::PythonFile,
            FILE_INSTRUCTION,
            context,
            aggregated,
            name,
            aggregated,
        )
        .await
    }

    pub async fn summarize_readme(&self, context: &str, text: &str, name: &str) -> SummaryResult {
        self.summarize(SummaryKind::ReadmeFile, README_INSTRUCTION, context, text, name, text)
            .await
    }

    pub async fn summarize_directory(
        &self,
        context: &str,
        aggregated: &str,
        name: &str,
    ) -> SummaryResult {
        self.summarize(
            SummaryKind::Directory,
            DIRECTORY_INSTRUCTION,
            context,
            aggregated,
            name,
            "",
        )
        .await
    }

    /// Describe how the file `code` uses the imported `module`.
    pub async fn describe_import(&self, context: &str, code: &str, module: &str) -> SummaryResult {
        self.summarize(SummaryKind::Import, IMPORT_INSTRUCTION, context, code, module, "")
            .await
    }

    /// Condense `summary` into a context value, folding in `previous`.
    /// On failure `previous` is returned unchanged.
    pub async fn make_context(&self, previous: &str, summary: &str) -> String {
        let prompt = compose_prompt(CONTEXT_INSTRUCTION, "context", previous, summary);
        match self.complete(&prompt).await {
            Ok((text, _)) => text,
            Err(e) => {
                warn!(error = %e, "Context generation failed; keeping previous context");
                previous.to_string()
            }
        }
    }

    async fn summarize(
        &self,
        kind: SummaryKind,
        instruction: &str,
        context: &str,
        target: &str,
        name: &str,
        code: &str,
    ) -> SummaryResult {
        let prompt = compose_prompt(instruction, name, context, target);
        match self.complete(&prompt).await {
            Ok((text, cached)) => {
                let mut result = SummaryResult::new(kind, name, text, code)
                    .with_metadata(META_CONTEXT, serde_json::json!(context))
                    .with_metadata(META_MODEL, serde_json::json!(self.provider.model_id()));
                if cached {
                    result = result.with_metadata(META_CACHED, serde_json::json!(true));
                }
                result
            }
            Err(e) => {
                warn!(%kind, name, error = %e, "Summarization failed");
                SummaryResult::new(kind, name, format!("{ERROR_MARKER}{e}"), code)
                    .with_metadata(META_CONTEXT, serde_json::json!(context))
                    .with_metadata(META_ERROR, serde_json::json!(e.to_string()))
            }
        }
    }

    /// One oracle round trip. Returns the trimmed completion and whether it
    /// was served from the cache.
    async fn complete(&self, prompt: &str) -> crate::error::Result<(String, bool)> {
        let key = CacheKey::new(self.provider.model_id(), TEMPLATE_VERSION, prompt);
        if let Some(cache) = &self.cache {
            let hit = cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key)
                .map(str::to_string);
            if let Some(text) = hit {
                self.lock_tracker().record_cache_hit();
                debug!(prompt_len = prompt.len(), "Completion served from cache");
                return Ok((text, true));
            }
        }

        let result = self.call_provider(prompt).await;
        match result {
            Ok(text) => {
                if let Some(cache) = &self.cache {
                    cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(key, text.clone());
                }
                Ok((text, false))
            }
            Err(e) => {
                self.lock_tracker().record_failure();
                Err(e)
            }
        }
    }

    async fn call_provider(&self, prompt: &str) -> crate::error::Result<String> {
        {
            let tracker = self.lock_tracker();
            if tracker.is_over_budget(self.options.cost_budget) {
                return Err(SkaldError::Llm(LlmError::BudgetExceeded(format!(
                    "${:.4} spent of ${:.4}",
                    tracker.estimated_cost_usd, self.options.cost_budget
                ))));
            }
        }

        let call = self.provider.call(prompt, self.options.temperature);
        let (text, usage) = tokio::time::timeout(self.options.timeout, call)
            .await
            .map_err(|_| SkaldError::Llm(LlmError::Timeout(self.options.timeout.as_secs())))??;

        self.lock_tracker().record_call(
            &usage,
            self.provider.cost_per_1k_input(),
            self.provider.cost_per_1k_output(),
        );

        let text = text.trim();
        if text.is_empty() {
            return Err(SkaldError::Llm(LlmError::Parse(
                "empty completion".to_string(),
            )));
        }
        Ok(text.to_string())
    }

    fn lock_tracker(&self) -> std::sync::MutexGuard<'_, CostTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::llm::TokenUsage;

    /// Replies `Summary for: <name>` using the prompt's `Name:` line.
    #[derive(Debug, Default)]
    struct NameEcho {
        calls: AtomicU64,
    }

    #[async_trait::async_trait]
    impl LlmProvider for NameEcho {
        fn name(&self) -> &str {
            "echo"
        }
        fn model_id(&self) -> &str {
            "echo-1"
        }
        async fn call(
            &self,
            prompt: &str,
            _temperature: f64,
        ) -> crate::error::Result<(String, TokenUsage)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Name: "))
                .unwrap_or("?");
            Ok((
                format!("  Summary for: {name}\n"),
                TokenUsage {
                    input_tokens: 1000,
                    output_tokens: 1000,
                },
            ))
        }
        fn cost_per_1k_input(&self) -> f64 {
            0.5
        }
        fn cost_per_1k_output(&self) -> f64 {
            0.5
        }
    }

    #[derive(Debug)]
    struct Scripted(&'static str);

    #[async_trait::async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model_id(&self) -> &str {
            "scripted-1"
        }
        async fn call(
            &self,
            _prompt: &str,
            _temperature: f64,
        ) -> crate::error::Result<(String, TokenUsage)> {
            match self.0 {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok((String::new(), TokenUsage::default()))
                }
                "down" => Err(SkaldError::Llm(LlmError::Network(
                    "connection refused".into(),
                ))),
                other => Ok((other.to_string(), TokenUsage::default())),
            }
        }
        fn cost_per_1k_input(&self) -> f64 {
            0.0
        }
        fn cost_per_1k_output(&self) -> f64 {
            0.0
        }
    }

    fn options() -> SummarizerOptions {
        SummarizerOptions {
            temperature: 0.0,
            timeout: Duration::from_secs(5),
            cost_budget: 0.0,
            cache: false,
        }
    }

    #[tokio::test]
    async fn successful_call_is_trimmed_and_tagged() {
        let s = Summarizer::new(Box::new(NameEcho::default()), options());
        let r = s.summarize_function("ctx", "def add(a, b): ...", "add").await;
        assert_eq!(r.summary, "Summary for: add");
        assert_eq!(r.code, "def add(a, b): ...");
        assert_eq!(r.kind, Some(SummaryKind::Function));
        assert_eq!(r.metadata[META_CONTEXT], "ctx");
        assert_eq!(r.metadata[META_MODEL], "echo-1");
        assert!(!r.is_error());

        let d = s.summarize_directory("", "File a.py: x", "utils").await;
        assert_eq!(d.code, "");
        assert_eq!(d.kind, Some(SummaryKind::Directory));
    }

    #[tokio::test]
    async fn import_description_is_named_after_the_module() {
        let s = Summarizer::new(Box::new(NameEcho::default()), options());
        let r = s
            .describe_import("", "from utils.helpers import avg\n", "utils.helpers")
            .await;
        assert_eq!(r.summary, "Summary for: utils.helpers");
        assert_eq!(r.kind, Some(SummaryKind::Import));
        assert_eq!(r.code, "");

        let failing = Summarizer::new(Box::new(Scripted("down")), options());
        let r = failing.describe_import("", "import x\n", "x").await;
        assert!(r.summary.starts_with(ERROR_MARKER));
        assert!(r.is_error());
    }

    #[tokio::test]
    async fn network_failure_becomes_error_summary() {
        let s = Summarizer::new(Box::new(Scripted("down")), options());
        let r = s.summarize_file("", "Function a: b", "main.py").await;
        assert!(r.summary.starts_with(ERROR_MARKER));
        assert!(r.metadata[META_ERROR].as_str().unwrap().contains("connection refused"));
        assert_eq!(s.costs().failures, 1);
    }

    #[tokio::test]
    async fn empty_completion_is_a_failure() {
        let s = Summarizer::new(Box::new(Scripted("   \n")), options());
        let r = s.summarize_readme("", "# Title", "README.md").await;
        assert!(r.is_error());
        assert!(r.summary.contains("empty completion"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_error_summary() {
        let s = Summarizer::new(Box::new(Scripted("slow")), options());
        let r = s.summarize_function("", "def f(): pass", "f").await;
        assert!(r.summary.starts_with(ERROR_MARKER));
        assert!(r.summary.contains("Timed out after 5s"));
    }

    #[tokio::test]
    async fn make_context_keeps_previous_on_failure() {
        let s = Summarizer::new(Box::new(Scripted("down")), options());
        assert_eq!(s.make_context("old context", "new summary").await, "old context");

        let ok = Summarizer::new(Box::new(Scripted("condensed")), options());
        assert_eq!(ok.make_context("", "summary").await, "condensed");
    }

    #[tokio::test]
    async fn cache_answers_identical_prompts_once() {
        let s = Summarizer::new(
            Box::new(NameEcho::default()),
            SummarizerOptions {
                cache: true,
                ..options()
            },
        );
        let first = s.summarize_function("", "def f(): pass", "f").await;
        let second = s.summarize_function("", "def f(): pass", "f").await;
        assert_eq!(first.summary, second.summary);
        assert!(!first.metadata.contains_key(META_CACHED));
        assert_eq!(second.metadata[META_CACHED], true);

        let costs = s.costs();
        assert_eq!(costs.total_requests, 1);
        assert_eq!(costs.cache_hits, 1);
    }

    #[tokio::test]
    async fn budget_stops_further_calls() {
        let s = Summarizer::new(
            Box::new(NameEcho::default()),
            SummarizerOptions {
                cost_budget: 0.5,
                ..options()
            },
        );
        // First call costs $1.00 and pushes the tracker over budget.
        assert!(!s.summarize_function("", "def a(): pass", "a").await.is_error());
        let r = s.summarize_function("", "def b(): pass", "b").await;
        assert!(r.is_error());
        assert!(r.summary.contains("Cost budget exceeded"));
        assert_eq!(s.costs().total_requests, 1);
    }
}
