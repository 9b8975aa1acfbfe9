#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for the LanceDB vector store driven through the pipeline
use async_trait::async_trait;
use doc_rag::config::Config;
use doc_rag::database::{LanceVectorStore, VectorRecord, VectorStore};
use doc_rag::embeddings::{Embedder, EmbeddingVector};
use doc_rag::pipeline::RagPipeline;
use doc_rag::{RagError, Result};
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 64;
const TOPICS: [&str; 4] = ["entropy", "photosynthesis", "derivative", "database"];

/// Embeds text as keyword counts over a few study topics, plus a bias term
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = TOPICS
                    .iter()
                    .map(|topic| lower.matches(topic).count() as f32)
                    .collect();
                vector.push(0.1);
                vector.resize(DIMENSION, 0.0);
                vector
            })
            .collect())
    }
}

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.embedding_dimension = DIMENSION as u32;
    (config, temp_dir)
}

async fn create_pipeline(config: &Config) -> RagPipeline<TopicEmbedder, Arc<LanceVectorStore>> {
    let store = LanceVectorStore::new(config)
        .await
        .expect("should create vector store");
    RagPipeline::from_config(config, TopicEmbedder, Arc::new(store)).expect("valid config")
}

fn study_notes() -> Vec<(&'static str, String)> {
    vec![
        (
            "physics.md",
            "Entropy measures disorder. The entropy of an isolated system never decreases. "
                .repeat(30),
        ),
        (
            "biology.md",
            "Photosynthesis converts light into chemical energy in chloroplasts. ".repeat(30),
        ),
        (
            "calculus.md",
            "The derivative is the instantaneous rate of change of a function. ".repeat(30),
        ),
    ]
}

#[tokio::test]
async fn realistic_ingest_and_retrieve() {
    let (config, _temp_dir) = create_test_config();
    let pipeline = create_pipeline(&config).await;

    for (name, text) in study_notes() {
        let report = pipeline
            .ingest_text(name, &text)
            .await
            .expect("ingest should succeed");
        assert_eq!(report.committed_chunks, report.total_chunks);
    }

    let context = pipeline
        .retrieve("What does entropy measure?")
        .await
        .expect("retrieve should succeed");

    assert!(context.starts_with("Source: physics.md\nContent: "));
    assert!(context.matches("Source: ").count() <= 5);
    // All three physics chunks outrank every other document
    let sources: Vec<&str> = context
        .lines()
        .filter_map(|line| line.strip_prefix("Source: "))
        .collect();
    assert_eq!(&sources[..3], &["physics.md"; 3]);
}

#[tokio::test]
async fn scores_are_non_increasing() {
    let (config, _temp_dir) = create_test_config();
    let pipeline = create_pipeline(&config).await;
    for (name, text) in study_notes() {
        pipeline.ingest_text(name, &text).await.expect("ingest");
    }

    let matches = pipeline
        .search("derivative of entropy")
        .await
        .expect("search should succeed");

    assert_eq!(matches.len(), 5);
    assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn large_document_is_stored_in_order() {
    let (config, _temp_dir) = create_test_config();
    let pipeline = create_pipeline(&config).await;
    let chunks: Vec<String> = (0..250)
        .map(|i| format!("database normalization note {i}"))
        .collect();

    let report = pipeline
        .ingest("big.docx", &chunks)
        .await
        .expect("ingest should succeed");

    assert_eq!(report.batches, 3);
    assert_eq!(
        pipeline
            .store()
            .count("ns1", Some("big.docx"))
            .await
            .expect("count"),
        250
    );
}

#[tokio::test]
async fn forget_then_retrieve_excludes_document() {
    let (config, _temp_dir) = create_test_config();
    let pipeline = create_pipeline(&config).await;
    for (name, text) in study_notes() {
        pipeline.ingest_text(name, &text).await.expect("ingest");
    }

    pipeline.forget("physics.md").await.expect("forget");
    pipeline.forget("physics.md").await.expect("forget again");

    let context = pipeline
        .retrieve("entropy")
        .await
        .expect("retrieve should succeed");
    assert!(!context.contains("physics.md"));
    assert_eq!(
        pipeline
            .store()
            .count("ns1", Some("physics.md"))
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn replace_removes_stale_ordinals() {
    let (config, _temp_dir) = create_test_config();
    let pipeline = create_pipeline(&config).await;
    let long: Vec<String> = (0..6).map(|i| format!("entropy draft {i}")).collect();
    let short: Vec<String> = (0..2).map(|i| format!("entropy final {i}")).collect();

    pipeline.ingest("notes.md", &long).await.expect("ingest");
    pipeline.ingest("notes.md", &short).await.expect("reingest");
    assert_eq!(
        pipeline.store().count("ns1", Some("notes.md")).await.expect("count"),
        6
    );

    pipeline.replace("notes.md", &short).await.expect("replace");
    assert_eq!(
        pipeline.store().count("ns1", Some("notes.md")).await.expect("count"),
        2
    );
}

#[tokio::test]
async fn records_persist_across_reopen() {
    let (config, _temp_dir) = create_test_config();
    {
        let pipeline = create_pipeline(&config).await;
        let (name, text) = &study_notes()[1];
        pipeline.ingest_text(name, text).await.expect("ingest");
        pipeline.store().optimize().await.expect("optimize");
    }

    let reopened = create_pipeline(&config).await;
    let context = reopened
        .retrieve("photosynthesis")
        .await
        .expect("retrieve should succeed");
    assert!(context.starts_with("Source: biology.md"));
}

#[tokio::test]
async fn dimension_change_is_refused() {
    let (config, _temp_dir) = create_test_config();
    let store = LanceVectorStore::new(&config)
        .await
        .expect("should create vector store");

    store
        .upsert(
            "ns1",
            &[VectorRecord::new("a.md", 0, "text".to_string(), vec![0.1; 5])],
        )
        .await
        .expect("first upsert");

    let err = store
        .upsert(
            "ns1",
            &[VectorRecord::new("b.md", 0, "text".to_string(), vec![0.1; 768])],
        )
        .await
        .expect_err("different model dimension");
    assert!(matches!(err, RagError::VectorStore(_)));
    assert_eq!(store.count("ns1", None).await.expect("count"), 1);
}
