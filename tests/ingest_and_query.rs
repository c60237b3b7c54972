//! End-to-end flow: ingest a directory, query it both ways, project the
//! result subgraph. Uses the plain-text extractor and the offline embedder
//! so the whole suite runs without models or fixtures.

use std::path::Path;

use papergraph::{
    embedder::HashingEmbedder,
    error::Error,
    extractor::PlainTextExtractor,
    graph::GraphStore,
    keywords::TermFrequencyExtractor,
    pipeline::{self, FileStatus, PipelineContext},
    projection,
    query::{self, QueryField, SemanticQuery},
};

fn write_paper(dir: &Path, name: &str, title: &str, author: &str, body: &str) {
    let content = format!("{title}\n\n{author}\n\nAbstract\n{body}\n");
    std::fs::write(dir.join(name), content).unwrap();
}

fn corpus(dir: &Path) {
    write_paper(
        dir,
        "embeddings.txt",
        "Dense Vector Embeddings for Retrieval",
        "Robinson Fuller",
        "We study dense vector embeddings and similarity retrieval over \
         large document collections with approximate nearest neighbors.",
    );
    write_paper(
        dir,
        "graphs.txt",
        "Property Graph Storage Engines",
        "Robinson Fuller, Ada Lovelace",
        "Transactional property graph storage with typed nodes and edges, \
         focusing on embedded databases and crash safety.",
    );
    write_paper(
        dir,
        "parsing.txt",
        "Robust Text Extraction From Scanned Documents",
        "Grace Hopper",
        "Heuristics for extracting structured text and metadata from noisy \
         scanned documents and digital papers.",
    );
    // A corrupt blob that must fail extraction without harming the batch.
    std::fs::write(dir.join("corrupt.txt"), [0xff, 0xfe, 0x00, 0x01]).unwrap();
    write_paper(
        dir,
        "ranking.txt",
        "Deterministic Ranking Under Score Ties",
        "Ada Lovelace",
        "Stable orderings for ranked retrieval when similarity scores tie, \
         with reproducible tie-breaking rules.",
    );
}

struct Fixture {
    _store_dir: tempfile::TempDir,
    corpus_dir: tempfile::TempDir,
    store: GraphStore,
    embedder: HashingEmbedder,
}

fn fixture() -> Fixture {
    let store_dir = tempfile::tempdir().unwrap();
    let corpus_dir = tempfile::tempdir().unwrap();
    corpus(corpus_dir.path());

    let store = GraphStore::open(&store_dir.path().join("graph.redb")).unwrap();
    Fixture {
        _store_dir: store_dir,
        corpus_dir,
        store,
        embedder: HashingEmbedder::default(),
    }
}

fn ingest(fx: &Fixture) -> pipeline::IngestReport {
    let extractor = PlainTextExtractor;
    let keywords = TermFrequencyExtractor;
    let ctx = PipelineContext::new(&extractor, &keywords, &fx.embedder);
    pipeline::ingest_directory(&fx.store, &ctx, fx.corpus_dir.path()).unwrap()
}

#[test]
fn batch_ingest_isolates_the_corrupt_file() {
    let fx = fixture();
    let report = ingest(&fx);

    assert_eq!(report.ingested, 4);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.failed, 1);

    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].path.ends_with("corrupt.txt"));

    let stats = fx.store.stats().unwrap();
    assert_eq!(stats.papers, 4);
    assert_eq!(stats.authors, 3);
}

#[test]
fn second_ingest_is_pure_duplicates() {
    let fx = fixture();
    let first = ingest(&fx);
    let second = ingest(&fx);

    assert_eq!(second.ingested, 0);
    assert_eq!(second.duplicates, first.ingested);
    assert_eq!(second.failed, 1); // the corrupt file fails again
    assert_eq!(fx.store.stats().unwrap().papers, 4);
}

#[test]
fn partial_author_name_finds_both_papers() {
    let fx = fixture();
    ingest(&fx);

    let hits =
        query::exact_search(&fx.store, QueryField::Author, "fuller").unwrap();
    let titles: Vec<&str> =
        hits.iter().map(|h| h.record.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Dense Vector Embeddings for Retrieval",
            "Property Graph Storage Engines",
        ]
    );
}

#[test]
fn semantic_query_is_reproducible() {
    let fx = fixture();
    ingest(&fx);

    let q = SemanticQuery::new("vector similarity retrieval");
    let first = query::semantic_search(&fx.store, &fx.embedder, &q).unwrap();
    let second = query::semantic_search(&fx.store, &fx.embedder, &q).unwrap();

    assert!(!first.is_empty());
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.id, b.id);
        assert!((a.score - b.score).abs() < 1e-9);
    }
    for pair in first.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn projection_closes_over_shared_authors() {
    let fx = fixture();
    ingest(&fx);

    let hits =
        query::exact_search(&fx.store, QueryField::Author, "fuller").unwrap();
    let ids: Vec<_> = hits.into_iter().map(|h| h.id).collect();
    assert_eq!(ids.len(), 2);

    let graph = projection::project(&fx.store, &ids).unwrap();

    let fuller_nodes: Vec<_> = graph
        .nodes
        .iter()
        .filter(|n| n.kind == "author" && n.label == "Robinson Fuller")
        .collect();
    assert_eq!(fuller_nodes.len(), 1);

    let fuller_edges: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| {
            e.kind == "AUTHORED_BY" && e.to == fuller_nodes[0].id
        })
        .collect();
    assert_eq!(fuller_edges.len(), 2);

    // The projection is valid JSON for the renderer boundary.
    let json = graph.to_json().unwrap();
    serde_json::from_str::<serde_json::Value>(&json).unwrap();
}

#[test]
fn switching_embedders_is_rejected_before_any_work() {
    let fx = fixture();
    ingest(&fx);

    let other = HashingEmbedder::new(16);

    let err = query::semantic_search(
        &fx.store,
        &other,
        &SemanticQuery::new("anything"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::EmbeddingConfigMismatch { .. }));

    let extractor = PlainTextExtractor;
    let keywords = TermFrequencyExtractor;
    let ctx = PipelineContext::new(&extractor, &keywords, &other);
    let err = pipeline::ingest_directory(&fx.store, &ctx, fx.corpus_dir.path())
        .unwrap_err();
    assert!(matches!(err, Error::EmbeddingConfigMismatch { .. }));

    // The mismatch halted before mutating anything.
    assert_eq!(fx.store.stats().unwrap().papers, 4);
}

#[test]
fn empty_store_queries_are_empty_not_errors() {
    let store_dir = tempfile::tempdir().unwrap();
    let store = GraphStore::open(&store_dir.path().join("graph.redb")).unwrap();
    let embedder = HashingEmbedder::default();

    assert!(query::exact_search(&store, QueryField::Topic, "graphs")
        .unwrap()
        .is_empty());
    assert!(query::semantic_search(
        &store,
        &embedder,
        &SemanticQuery::new("graphs")
    )
    .unwrap()
    .is_empty());
    assert!(projection::project(&store, &[]).unwrap().is_empty());
}
