use skald_core::config::SkaldConfig;
use skald_core::export::{self, DocumentType};
use skald_core::pipeline::SkaldPipeline;
use skald_core::types::{ERROR_MARKER, EntryKind, META_CONTEXT};
use skald_test::{NameStub, TestRepo, run_pipeline};

fn doc_types(result: &skald_core::pipeline::PipelineResult) -> Vec<DocumentType> {
    result.documents.iter().map(|d| d.metadata.doc_type).collect()
}

fn doc_names(result: &skald_core::pipeline::PipelineResult) -> Vec<&str> {
    result
        .documents
        .iter()
        .map(|d| d.metadata.name.as_str())
        .collect()
}

// ── Sample project ───────────────────────────────────────────────

#[tokio::test]
async fn sample_project_documents_in_preorder() {
    let repo = TestRepo::sample_project();
    let result = run_pipeline(repo.path(), SkaldConfig::default(), NameStub::new()).await;

    assert_eq!(
        doc_types(&result),
        [
            DocumentType::Directory,
            DocumentType::PythonFile,
            DocumentType::Function,
            DocumentType::Function,
            DocumentType::Directory,
            DocumentType::PythonFile,
            DocumentType::Function,
            DocumentType::Function,
        ],
        "Root, main.py with its functions, then utils/ with helpers.py"
    );
    assert_eq!(
        &doc_names(&result)[1..],
        [
            "main.py",
            "add",
            "subtract",
            "utils",
            "helpers.py",
            "format_string",
            "calculate_average"
        ]
    );

    let stats = &result.stats;
    assert_eq!(stats.functions_summarized, 4);
    assert_eq!(stats.files_summarized, 2);
    assert_eq!(stats.directories_summarized, 2);
    assert_eq!(stats.readmes_read, 1);
    assert_eq!(stats.entries_ignored, 1, "config.txt is ignored");
    assert_eq!(stats.read_failures + stats.parse_failures + stats.oracle_failures, 0);
}

#[tokio::test]
async fn function_documents_carry_code_and_owning_file() {
    let repo = TestRepo::sample_project();
    let result = run_pipeline(repo.path(), SkaldConfig::default(), NameStub::new()).await;

    let add = result
        .documents
        .iter()
        .find(|d| d.metadata.name == "add")
        .expect("add document");
    assert!(add.metadata.path.ends_with("main.py"));
    assert_eq!(add.metadata.summary, "Summary for: add");
    assert_eq!(add.metadata.code, "def add(a, b):\n    return a + b");
    assert_eq!(
        add.page_content,
        format!("{}\n\n{}", add.metadata.summary, add.metadata.code)
    );

    let main = result
        .documents
        .iter()
        .find(|d| d.metadata.name == "main.py")
        .expect("main.py document");
    assert!(
        main.metadata.code.contains("def subtract"),
        "File documents carry the full file text"
    );
}

#[tokio::test]
async fn readme_context_reaches_files_and_subdirectories() {
    let repo = TestRepo::sample_project();
    let oracle = NameStub::new();
    let result = run_pipeline(repo.path(), SkaldConfig::default(), oracle.clone()).await;

    for id in result.tree.preorder().into_iter().skip(1) {
        let node = result.tree.get(id).expect("node");
        if node.kind == EntryKind::PythonFile {
            assert_eq!(node.context, "Summary for: context", "{} context", node.name);
            for function in &node.summaries {
                assert_eq!(function.metadata[META_CONTEXT], "Summary for: context");
            }
        }
    }

    let helper_prompt = oracle
        .recorded()
        .into_iter()
        .find(|p| p.contains("Name: format_string"))
        .expect("format_string prompt");
    assert!(
        helper_prompt.contains("Context: Summary for: context"),
        "Subdirectory functions inherit the root README context: {helper_prompt}"
    );
}

// ── Visiting order ───────────────────────────────────────────────

#[tokio::test]
async fn readme_only_affects_entries_after_it() {
    let repo = TestRepo::late_readme();
    let oracle = NameStub::new();
    run_pipeline(repo.path(), SkaldConfig::default(), oracle.clone()).await;

    let total = oracle
        .recorded()
        .into_iter()
        .find(|p| p.contains("Name: total"))
        .expect("total prompt");
    assert!(
        !total.contains("Context:"),
        "Calc.py is listed before README.md and sees no context: {total}"
    );
}

#[tokio::test]
async fn readme_first_hoists_readme_context() {
    let repo = TestRepo::late_readme();
    let oracle = NameStub::new();
    let mut config = SkaldConfig::default();
    config.summary.readme_first = true;
    run_pipeline(repo.path(), config, oracle.clone()).await;

    let total = oracle
        .recorded()
        .into_iter()
        .find(|p| p.contains("Name: total"))
        .expect("total prompt");
    assert!(total.contains("Context: Summary for: context"), "{total}");
}

// ── Failure containment ──────────────────────────────────────────

#[tokio::test]
async fn oracle_failure_is_contained_to_one_summary() {
    let repo = TestRepo::sample_project();
    let oracle = NameStub::new().failing_on("subtract");
    let result = run_pipeline(repo.path(), SkaldConfig::default(), oracle).await;

    assert_eq!(result.documents.len(), 8, "Every node still yields documents");
    assert_eq!(result.stats.oracle_failures, 1);

    let subtract = result
        .documents
        .iter()
        .find(|d| d.metadata.name == "subtract")
        .expect("subtract document");
    assert!(subtract.metadata.summary.starts_with(ERROR_MARKER));

    let add = result
        .documents
        .iter()
        .find(|d| d.metadata.name == "add")
        .expect("add document");
    assert_eq!(add.metadata.summary, "Summary for: add");
    assert_eq!(result.costs.failures, 1);
}

#[tokio::test]
async fn syntax_error_file_is_summarized_without_functions() {
    let repo = TestRepo::sample_project();
    repo.write("broken.py", "def broken(:\n    pass\n");
    let result = run_pipeline(repo.path(), SkaldConfig::default(), NameStub::new()).await;

    assert_eq!(result.stats.parse_failures, 1);
    assert_eq!(result.stats.files_summarized, 3);
    assert_eq!(result.stats.functions_summarized, 4);

    let broken: Vec<_> = result
        .documents
        .iter()
        .filter(|d| d.metadata.path.ends_with("broken.py"))
        .collect();
    assert_eq!(broken.len(), 1, "Only the file document, no function documents");
    assert_eq!(broken[0].metadata.doc_type, DocumentType::PythonFile);
}

#[tokio::test]
async fn non_utf8_python_file_is_skipped() {
    let repo = TestRepo::sample_project();
    repo.write("blob.py", [0xff_u8, 0xfe, 0x00, 0x81]);
    let result = run_pipeline(repo.path(), SkaldConfig::default(), NameStub::new()).await;

    assert_eq!(result.stats.read_failures, 1);
    assert_eq!(result.documents.len(), 8);
    assert!(!doc_names(&result).contains(&"blob.py"));
}

#[tokio::test]
async fn directory_without_summaries_has_no_document() {
    let repo = TestRepo::sample_project();
    repo.write("docs/notes.txt", "nothing to see\n");
    let result = run_pipeline(repo.path(), SkaldConfig::default(), NameStub::new()).await;

    assert_eq!(result.documents.len(), 8);
    let docs_node = result
        .tree
        .iter()
        .map(|(_, n)| n)
        .find(|n| n.name == "docs")
        .expect("docs/ is still part of the tree");
    assert!(docs_node.final_summary.is_none());
    assert!(docs_node.children.is_empty());
}

// ── Relations ────────────────────────────────────────────────────

fn relations_of<'a>(
    relations: &'a skald_core::relations::RelationMap,
    suffix: &str,
) -> &'a skald_core::relations::FileRelations {
    relations
        .iter()
        .find(|(path, _)| path.ends_with(suffix))
        .map(|(_, r)| r)
        .unwrap_or_else(|| panic!("no relations for {suffix}"))
}

#[tokio::test]
async fn relations_link_importers_and_imported_files() {
    let repo = TestRepo::with_imports();
    let mut config = SkaldConfig::default();
    config.summary.relations = true;
    let result = run_pipeline(repo.path(), config, NameStub::new()).await;

    let relations = result.relations.as_ref().expect("relations enabled");
    let main = relations_of(relations, "main.py");
    let used: Vec<_> = main
        .uses_relationships
        .iter()
        .map(|u| u.module.as_str())
        .collect();
    assert_eq!(used, ["utils.helpers"], "Standard library imports are dropped");

    let report = relations_of(relations, "report.py");
    assert_eq!(report.module, "utils.report");
    let used: Vec<_> = report
        .uses_relationships
        .iter()
        .map(|u| u.module.as_str())
        .collect();
    assert_eq!(used, ["utils", "utils.helpers"]);

    let helpers = relations_of(relations, "helpers.py");
    let users: Vec<_> = helpers
        .used_by_relationships
        .iter()
        .map(|u| u.description.as_str())
        .collect();
    assert_eq!(
        users,
        [
            "main expects Summary for: utils.helpers",
            "report expects Summary for: utils.helpers"
        ]
    );
}

#[tokio::test]
async fn relation_description_failure_is_contained() {
    let repo = TestRepo::with_imports();
    let mut config = SkaldConfig::default();
    config.summary.relations = true;
    let oracle = NameStub::new().failing_on("utils.helpers");
    let result = run_pipeline(repo.path(), config, oracle).await;

    let stats = result.relation_stats.as_ref().expect("relation stats");
    assert_eq!(stats.description_failures, 2);
    assert_eq!(result.stats.oracle_failures, 0, "Tree summaries are unaffected");

    let relations = result.relations.as_ref().expect("relations enabled");
    let main = relations_of(relations, "main.py");
    assert!(main.uses_relationships[0].description.starts_with(ERROR_MARKER));
    let report = relations_of(relations, "report.py");
    assert_eq!(
        report.uses_relationships[0].description,
        "Imports utils for Summary for: utils"
    );
}

#[tokio::test]
async fn relations_file_is_written_next_to_the_tree() {
    let repo = TestRepo::with_imports();
    let mut config = SkaldConfig::default();
    config.summary.relations = true;
    let result = run_pipeline(repo.path(), config.clone(), NameStub::new()).await;

    let out = tempfile::tempdir().unwrap();
    let written = SkaldPipeline::new(config)
        .write_outputs(&result, out.path(), false)
        .unwrap();
    let path = written.relations.expect("relations written");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json.as_object().unwrap().len(), 4);
}

// ── Outputs ──────────────────────────────────────────────────────

#[tokio::test]
async fn written_tree_round_trips_to_same_documents() {
    let repo = TestRepo::sample_project();
    let result = run_pipeline(repo.path(), SkaldConfig::default(), NameStub::new()).await;

    let out = tempfile::tempdir().unwrap();
    let pipeline = SkaldPipeline::new(SkaldConfig::default());
    let written = pipeline.write_outputs(&result, out.path(), false).unwrap();
    assert!(written.vector_batch.is_none());

    let tree = export::read_tree_json(&written.tree).unwrap();
    assert_eq!(tree.node_count(), result.tree.len());
    assert_eq!(export::documents_from_export(&tree), result.documents);

    let docs: Vec<export::Document> =
        serde_json::from_str(&std::fs::read_to_string(&written.documents).unwrap()).unwrap();
    assert_eq!(docs, result.documents);
}
