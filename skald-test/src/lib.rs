// Integration test utilities and fixture management for Skald.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use skald_core::config::SkaldConfig;
use skald_core::error::{LlmError, SkaldError};
use skald_core::llm::{LlmProvider, TokenUsage};
use skald_core::pipeline::{PipelineResult, SkaldPipeline, SourceSpec};
use skald_core::progress::NoopReporter;
use skald_core::summarize::{Summarizer, SummarizerOptions};

/// A test fixture backed by a temporary directory.
#[derive(Debug)]
pub struct TestRepo {
    pub dir: tempfile::TempDir,
}

impl TestRepo {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The canonical sample: a README, a two-function module at the root and
    /// a `utils/` package with another two functions and a non-Python file.
    pub fn sample_project() -> Self {
        let repo = Self::empty();
        repo.write(
            "README.md",
            "# Sample Project\n\nA small calculator with string utilities.\n",
        );
        repo.write(
            "main.py",
            "def add(a, b):\n    return a + b\n\n\ndef subtract(a, b):\n    return a - b\n",
        );
        repo.write(
            "utils/helpers.py",
            "def format_string(s):\n    return s.strip().title()\n\n\ndef calculate_average(values):\n    return sum(values) / len(values)\n",
        );
        repo.write("utils/config.txt", "debug = true\n");
        repo
    }

    /// A Python file that sorts before the README, so visiting order matters.
    pub fn late_readme() -> Self {
        let repo = Self::empty();
        repo.write("Calc.py", "def total(xs):\n    return sum(xs)\n");
        repo.write("README.md", "# Totals\n\nSums things.\n");
        repo
    }

    /// Files that import each other: `main.py` uses `utils/helpers.py`
    /// and `os`, `utils/report.py` uses `helpers` through a relative import.
    pub fn with_imports() -> Self {
        let repo = Self::empty();
        repo.write(
            "main.py",
            "import os\nfrom utils.helpers import format_string\n\n\ndef greet(name):\n    return format_string(name) + os.linesep\n",
        );
        repo.write("utils/__init__.py", "");
        repo.write(
            "utils/helpers.py",
            "def format_string(s):\n    return s.strip().title()\n",
        );
        repo.write(
            "utils/report.py",
            "from . import helpers\n\n\ndef render(rows):\n    return [helpers.format_string(r) for r in rows]\n",
        );
        repo
    }

    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    /// Write `content` at `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write fixture file");
        path
    }
}

/// Deterministic oracle: answers `Summary for: <name>` using the prompt's
/// `Name:` line, and fails any prompt whose name is in `fail_names`.
/// Every prompt it receives is recorded.
#[derive(Debug, Clone, Default)]
pub struct NameStub {
    pub prompts: Arc<Mutex<Vec<String>>>,
    fail_names: Vec<String>,
}

impl NameStub {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_on(mut self, name: &str) -> Self {
        self.fail_names.push(name.to_string());
        self
    }

    pub fn recorded(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for NameStub {
    fn name(&self) -> &str {
        "stub"
    }

    fn model_id(&self) -> &str {
        "stub-1"
    }

    async fn call(
        &self,
        prompt: &str,
        _temperature: f64,
    ) -> skald_core::error::Result<(String, TokenUsage)> {
        self.prompts
            .lock()
            .expect("prompt log")
            .push(prompt.to_string());
        let name = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Name: "))
            .unwrap_or_default()
            .to_string();
        if self.fail_names.contains(&name) {
            return Err(SkaldError::Llm(LlmError::ApiError {
                status: 500,
                body: format!("refused {name}"),
            }));
        }
        Ok((format!("Summary for: {name}"), TokenUsage::default()))
    }

    fn cost_per_1k_input(&self) -> f64 {
        0.0
    }

    fn cost_per_1k_output(&self) -> f64 {
        0.0
    }
}

/// Run the full pipeline over a local directory with the given oracle.
pub async fn run_pipeline(root: &Path, config: SkaldConfig, oracle: NameStub) -> PipelineResult {
    let pipeline = SkaldPipeline::new(config);
    let source = pipeline
        .open_source(&SourceSpec::Local(root.to_path_buf()))
        .expect("open local source");
    let summarizer = Summarizer::new(
        Box::new(oracle),
        SummarizerOptions {
            cache: false,
            ..SummarizerOptions::default()
        },
    );
    pipeline.run(source, summarizer, &NoopReporter).await
}
