use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    embedder::{normalize_text, Embedder, EmbeddingConfig},
    error::{Error, Result},
    extractor::DocumentExtractor,
    graph::{EdgeKind, GraphStore, PaperRecord},
    identity::{normalize_key, resolve_key, EntityKind, PaperId},
    keywords::{KeywordExtractor, DEFAULT_MAX_KEYWORDS},
    metadata::CandidateMetadata,
};

/// The capability handles one ingestion run works with. Passed in explicitly
/// rather than held as ambient state, so swapping a model swaps it everywhere
/// at once.
pub struct PipelineContext<'a> {
    pub extractor: &'a dyn DocumentExtractor,
    pub keywords: &'a dyn KeywordExtractor,
    pub embedder: &'a dyn Embedder,
    pub max_keywords: usize,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        extractor: &'a dyn DocumentExtractor,
        keywords: &'a dyn KeywordExtractor,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            extractor,
            keywords,
            embedder,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }
}

/// How one file ended up in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ingested,
    /// Content hash already present; nothing written. Informational.
    DuplicateSkipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Present iff `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A non-fatal naming collision: a different file already holds this
/// normalized title. Both papers coexist; surfaced for the user to review.
#[derive(Debug, Clone, Serialize)]
pub struct TitleCollision {
    pub path: PathBuf,
    pub title: String,
    pub existing: PaperId,
}

/// Summary of one batch ingestion. Per-file failures are captured here and
/// never raised out of the batch call.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// One entry per discovered file, in processing (path) order.
    pub outcomes: Vec<FileOutcome>,
    pub collisions: Vec<TitleCollision>,
}

impl IngestReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Ingested => self.ingested += 1,
            FileStatus::DuplicateSkipped => self.duplicates += 1,
            FileStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// A file eligible for ingestion.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// Recursively discover ingestible files under `root`, skipping hidden
/// entries, filtered by the extractor's extension list. Sorted by path so
/// repeated runs process files in the same order.
pub fn discover_papers(
    root: &Path,
    extensions: &[&str],
) -> Result<Vec<DiscoveredFile>> {
    let mut results = Vec::new();
    walk_dir(root, extensions, &mut results)?;
    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

fn walk_dir(
    current: &Path,
    extensions: &[&str],
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();

        // Skip hidden files and directories.
        if file_name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(&entry.path(), extensions, results)?;
        } else if file_type.is_file() && has_extension(&entry.path(), extensions)
        {
            results.push(DiscoveredFile {
                path: entry.path(),
                file_name,
            });
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_lowercase();
            extensions.contains(&ext.as_str())
        })
}

/// Everything derived from one file, ready to commit.
struct PreparedPaper {
    id: PaperId,
    record: PaperRecord,
    /// (key, display) per author, in listing order.
    authors: Vec<(String, String)>,
    /// (key, display) of the topic, when one was found or synthesized.
    topic: Option<(String, String)>,
    /// (key, display, weight) per keyword.
    keywords: Vec<(String, String, f64)>,
    vector: Vec<f32>,
}

/// Ingest every eligible file under `dir` into the graph.
///
/// Each file is processed independently: extraction, metadata resolution,
/// keyword extraction and embedding run in parallel across files, then
/// commits apply sequentially in path order, one transaction per file. A
/// failing file is recorded in the report and never aborts the batch; a
/// failing transaction rolls back completely.
///
/// Halts with [`Error::EmbeddingConfigMismatch`] before mutating anything if
/// the store was built with a different embedder.
pub fn ingest_directory(
    store: &GraphStore,
    ctx: &PipelineContext,
    dir: &Path,
) -> Result<IngestReport> {
    let active = EmbeddingConfig::of(ctx.embedder);
    store.ensure_embedding_config(&active)?;

    let files = discover_papers(dir, ctx.extractor.extensions())?;
    info!(count = files.len(), dir = %dir.display(), "discovered files");

    // Record the embedding configuration on first use.
    if store.embedding_config()?.is_none() && !files.is_empty() {
        let mut txn = store.begin()?;
        txn.set_embedding_config(&active)?;
        txn.commit()?;
    }

    // CPU-bound per-file work in parallel; order is preserved.
    let prepared: Vec<(PathBuf, Result<PreparedPaper>)> = files
        .par_iter()
        .map(|file| (file.path.clone(), prepare_file(ctx, file)))
        .collect();

    // Sequential, transactional writes in path order.
    let mut report = IngestReport::default();
    for (path, result) in prepared {
        match result {
            Err(err) => {
                warn!(path = %path.display(), error = %err, "file failed");
                report.record(FileOutcome {
                    path,
                    status: FileStatus::Failed,
                    error: Some(err.to_string()),
                });
            }
            Ok(paper) => match commit_paper(store, &paper, &path, &mut report) {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "commit failed");
                    report.record(FileOutcome {
                        path,
                        status: FileStatus::Failed,
                        error: Some(err.to_string()),
                    });
                }
            },
        }
    }

    info!(
        ingested = report.ingested,
        duplicates = report.duplicates,
        failed = report.failed,
        "ingestion finished"
    );
    Ok(report)
}

/// Extract, resolve, and embed one file. No store access; safe to run
/// concurrently across files.
fn prepare_file(
    ctx: &PipelineContext,
    file: &DiscoveredFile,
) -> Result<PreparedPaper> {
    let bytes =
        std::fs::read(&file.path).map_err(|e| Error::ExtractionFailed {
            path: file.path.clone(),
            reason: e.to_string(),
        })?;
    let id = PaperId::from_bytes(&bytes);

    let doc = ctx.extractor.extract(&file.path, &bytes)?;
    let meta = CandidateMetadata::resolve(&doc);

    let title = meta
        .title
        .clone()
        .unwrap_or_else(|| title_from_file_name(&file.path));
    let title_key = normalize_key(&title);

    let embed_input =
        normalize_text(meta.snippet.as_deref().unwrap_or(&doc.full_text));
    let vector = ctx.embedder.embed(&embed_input)?;

    let ranked =
        ctx.keywords.extract_keywords(&embed_input, ctx.max_keywords);

    let authors: Vec<(String, String)> = meta
        .authors
        .iter()
        .map(|raw| resolve_key(EntityKind::Author, raw))
        .collect();

    // Explicit subject metadata wins; otherwise the top keyword is
    // synthesized into the topic.
    let topic_raw = meta
        .subject
        .clone()
        .or_else(|| ranked.first().map(|(term, _)| term.clone()));
    let topic = topic_raw.map(|raw| resolve_key(EntityKind::Topic, &raw));

    let keywords: Vec<(String, String, f64)> = ranked
        .into_iter()
        .map(|(term, weight)| {
            let (key, display) = resolve_key(EntityKind::Keyword, &term);
            (key, display, weight)
        })
        .collect();

    Ok(PreparedPaper {
        id,
        record: PaperRecord {
            title,
            title_key,
            file_name: file.file_name.clone(),
            source_path: file.path.to_string_lossy().to_string(),
            snippet: meta.snippet,
            year: meta.year,
            doi: meta.doi,
            ingested_at: unix_now(),
        },
        authors,
        topic,
        keywords,
        vector,
    })
}

/// Apply one prepared paper to the store: duplicate check, collision check,
/// then a single transaction for the paper node, its embedding, and every
/// entity and edge.
fn commit_paper(
    store: &GraphStore,
    paper: &PreparedPaper,
    path: &Path,
    report: &mut IngestReport,
) -> Result<FileOutcome> {
    if store.get_paper(&paper.id)?.is_some() {
        info!(path = %path.display(), id = %paper.id, "duplicate skipped");
        return Ok(FileOutcome {
            path: path.to_path_buf(),
            status: FileStatus::DuplicateSkipped,
            error: None,
        });
    }

    // Title-only matches are not duplicates, but they are worth a warning.
    for existing in store.papers_with_title_key(&paper.record.title_key)? {
        if existing != paper.id {
            warn!(
                path = %path.display(),
                title = %paper.record.title,
                existing = %existing,
                "title collision with existing paper"
            );
            report.collisions.push(TitleCollision {
                path: path.to_path_buf(),
                title: paper.record.title.clone(),
                existing,
            });
        }
    }

    let mut txn = store.begin()?;
    txn.upsert_paper(&paper.id, &paper.record)?;
    txn.store_embedding(&paper.id, &paper.vector)?;

    for (key, display) in &paper.authors {
        txn.upsert_entity(EntityKind::Author, key, display)?;
        txn.upsert_edge(EdgeKind::AuthoredBy, &paper.id, key, 1.0)?;
    }
    if let Some((key, display)) = &paper.topic {
        txn.upsert_entity(EntityKind::Topic, key, display)?;
        txn.upsert_edge(EdgeKind::HasTopic, &paper.id, key, 1.0)?;
    }
    for (key, display, weight) in &paper.keywords {
        txn.upsert_entity(EntityKind::Keyword, key, display)?;
        txn.upsert_edge(EdgeKind::HasKeyword, &paper.id, key, *weight)?;
    }

    txn.commit()?;
    info!(path = %path.display(), id = %paper.id, "ingested");

    Ok(FileOutcome {
        path: path.to_path_buf(),
        status: FileStatus::Ingested,
        error: None,
    })
}

fn title_from_file_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .replace(['_', '-'], " ")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedder::HashingEmbedder, extractor::PlainTextExtractor,
        keywords::TermFrequencyExtractor,
    };

    fn test_store() -> (tempfile::TempDir, GraphStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&tmp.path().join("graph.redb")).unwrap();
        (tmp, store)
    }

    fn write_paper(dir: &Path, name: &str, title: &str, author: &str) {
        let body = format!(
            "{title}\n\n{author}\n\nAbstract\nThis paper studies {title} \
             in considerable depth with experiments.\n"
        );
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn run(store: &GraphStore, dir: &Path) -> IngestReport {
        let extractor = PlainTextExtractor;
        let keywords = TermFrequencyExtractor;
        let embedder = HashingEmbedder::default();
        let ctx = PipelineContext::new(&extractor, &keywords, &embedder);
        ingest_directory(store, &ctx, dir).unwrap()
    }

    #[test]
    fn ingests_valid_files() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "Graph Storage Engines", "Ada Lovelace");
        write_paper(dir.path(), "b.txt", "Vector Search Methods", "Alan Turing");

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 2);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(store.stats().unwrap().papers, 2);
    }

    #[test]
    fn partial_failure_is_isolated() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "First Valid Paper", "Ada Lovelace");
        write_paper(dir.path(), "b.txt", "Second Valid Paper", "Ada Lovelace");
        // Invalid UTF-8 blob: extraction fails for this file only.
        std::fs::write(dir.path().join("c.txt"), [0xff, 0xfe, 0x01]).unwrap();
        write_paper(dir.path(), "d.txt", "Third Valid Paper", "Alan Turing");
        write_paper(dir.path(), "e.txt", "Fourth Valid Paper", "Alan Turing");

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 4);
        assert_eq!(report.failed, 1);

        let failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| o.status == FileStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].path.ends_with("c.txt"));
        assert!(failed[0].error.as_deref().unwrap().contains("extraction"));

        // Nothing attributable to the corrupt file is in the graph.
        assert_eq!(store.stats().unwrap().papers, 4);
    }

    #[test]
    fn reingest_is_idempotent() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "Graph Storage Engines", "Ada Lovelace");
        write_paper(dir.path(), "b.txt", "Vector Search Methods", "Alan Turing");

        let first = run(&store, dir.path());
        assert_eq!(first.ingested, 2);
        let edges_after_first = store.stats().unwrap().edges;

        let second = run(&store, dir.path());
        assert_eq!(second.ingested, 0);
        assert_eq!(second.duplicates, first.ingested);
        assert_eq!(second.failed, 0);

        let stats = store.stats().unwrap();
        assert_eq!(stats.papers, 2);
        // Re-ingestion created no duplicate edges either.
        assert_eq!(stats.edges, edges_after_first);
    }

    #[test]
    fn identical_files_deduplicate_within_one_batch() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "Graph Storage Engines", "Ada Lovelace");
        std::fs::copy(dir.path().join("a.txt"), dir.path().join("z.txt"))
            .unwrap();

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.stats().unwrap().papers, 1);
    }

    #[test]
    fn author_identity_folds_across_papers() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "First Distinct Title", "Robinson Fuller");
        write_paper(dir.path(), "b.txt", "Second Distinct Title", "Robinson  Fuller");
        write_paper(dir.path(), "c.txt", "Third Distinct Title", "ROBINSON FULLER");

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 3);
        assert_eq!(store.stats().unwrap().authors, 1);

        let papers = store
            .papers_of_entity(EdgeKind::AuthoredBy, "robinson fuller")
            .unwrap();
        assert_eq!(papers.len(), 3);
    }

    #[test]
    fn title_collision_is_warned_not_deduplicated() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "Shared Title Here", "Ada Lovelace");
        // Different content, same title line.
        std::fs::write(
            dir.path().join("b.txt"),
            "Shared Title Here\n\nAlan Turing\n\nEntirely different body.\n",
        )
        .unwrap();

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 2);
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.collisions[0].title, "Shared Title Here");
        assert_eq!(store.stats().unwrap().papers, 2);
    }

    #[test]
    fn config_mismatch_halts_before_mutation() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "a.txt", "Graph Storage Engines", "Ada Lovelace");

        run(&store, dir.path());

        let extractor = PlainTextExtractor;
        let keywords = TermFrequencyExtractor;
        let other = HashingEmbedder::new(32);
        let ctx = PipelineContext::new(&extractor, &keywords, &other);
        let err = ingest_directory(&store, &ctx, dir.path()).unwrap_err();
        assert!(matches!(err, Error::EmbeddingConfigMismatch { .. }));

        // Nothing was touched.
        assert_eq!(store.stats().unwrap().papers, 1);
    }

    #[test]
    fn empty_directory_reports_nothing() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 0);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.failed, 0);
        assert!(report.outcomes.is_empty());
        assert!(store.embedding_config().unwrap().is_none());
    }

    #[test]
    fn filename_title_fallback() {
        let (_tmp, store) = test_store();
        let dir = tempfile::tempdir().unwrap();
        // Too short for the title heuristic; falls back to the file name.
        std::fs::write(dir.path().join("my_notes-2021.txt"), "x y\n").unwrap();

        let report = run(&store, dir.path());
        assert_eq!(report.ingested, 1);

        let papers = store.list_papers().unwrap();
        assert_eq!(papers[0].1.title, "my notes 2021");
    }

    #[test]
    fn discovery_is_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("z.txt"), "z").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "h").unwrap();
        std::fs::write(dir.path().join("image.png"), "p").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("m.txt"), "m").unwrap();

        let files = discover_papers(dir.path(), &["txt"]).unwrap();
        let names: Vec<_> =
            files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "m.txt", "z.txt"]);
    }
}
