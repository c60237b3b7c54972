use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    embedder::{normalize_text, Embedder, EmbeddingConfig},
    error::{Error, Result},
    graph::{EdgeKind, GraphStore, PaperRecord},
    identity::{normalize_key, EntityKind, PaperId},
};

/// Default number of results for a semantic query.
pub const DEFAULT_TOP_K: usize = 10;

/// The metadata fields an exact query can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryField {
    Title,
    Author,
    Topic,
    Keyword,
}

/// A paper matched by an exact-field query.
#[derive(Debug, Clone)]
pub struct PaperHit {
    pub id: PaperId,
    pub record: PaperRecord,
}

/// A paper ranked by a semantic query.
#[derive(Debug, Clone)]
pub struct ScoredHit {
    pub id: PaperId,
    pub record: PaperRecord,
    /// Cosine similarity to the query, computed in double precision.
    pub score: f64,
}

/// Parameters of one semantic query.
#[derive(Debug, Clone)]
pub struct SemanticQuery {
    pub text: String,
    /// Maximum results returned. Defaults to [`DEFAULT_TOP_K`].
    pub limit: usize,
    /// Drop results scoring below this, when set.
    pub min_score: Option<f64>,
}

impl SemanticQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: DEFAULT_TOP_K,
            min_score: None,
        }
    }
}

/// Find papers whose `field` matches `term`.
///
/// The term is normalized exactly like stored identities, then matched as a
/// substring of the normalization key, so `fuller` finds papers by
/// "Robinson Fuller". Results are deduplicated by paper identity and ordered
/// by (normalized title, content hash) for determinism. An empty store
/// yields an empty result set, not an error.
pub fn exact_search(
    store: &GraphStore,
    field: QueryField,
    term: &str,
) -> Result<Vec<PaperHit>> {
    let term_key = normalize_key(term);
    if term_key.is_empty() {
        return Err(Error::InvalidQuery(
            "query term is empty after normalization".into(),
        ));
    }
    debug!(field = ?field, term = %term_key, "exact query");

    // BTreeMap keyed by paper id deduplicates papers reachable through
    // several matching entities.
    let mut matched: BTreeMap<PaperId, ()> = BTreeMap::new();

    match field {
        QueryField::Title => {
            for (id, record) in store.list_papers()? {
                if record.title_key.contains(&term_key) {
                    matched.insert(id, ());
                }
            }
        }
        QueryField::Author | QueryField::Topic | QueryField::Keyword => {
            let kind = match field {
                QueryField::Author => EntityKind::Author,
                QueryField::Topic => EntityKind::Topic,
                _ => EntityKind::Keyword,
            };
            let edge = EdgeKind::for_target(kind);
            for (entity_key, _) in
                store.find_entities_by_substring(kind, &term_key)?
            {
                for id in store.papers_of_entity(edge, &entity_key)? {
                    matched.insert(id, ());
                }
            }
        }
    }

    let mut hits = Vec::with_capacity(matched.len());
    for (id, ()) in matched {
        let record = store.get_paper(&id)?.ok_or(Error::NotFound {
            kind: "paper",
            name: id.to_string(),
        })?;
        hits.push(PaperHit { id, record });
    }

    hits.sort_by(|a, b| {
        a.record
            .title_key
            .cmp(&b.record.title_key)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(hits)
}

/// Rank every stored paper against the query text by cosine similarity.
///
/// Scores are computed in f64 regardless of stored precision; ranking is
/// score descending with ties broken by normalized title ascending, then
/// content hash, so repeated runs over an unchanged store return identical
/// orderings. Halts with [`Error::EmbeddingConfigMismatch`] if the active
/// embedder differs from the store's recorded configuration.
pub fn semantic_search(
    store: &GraphStore,
    embedder: &dyn Embedder,
    query: &SemanticQuery,
) -> Result<Vec<ScoredHit>> {
    if query.text.trim().is_empty() {
        return Err(Error::InvalidQuery("query text is empty".into()));
    }

    store.ensure_embedding_config(&EmbeddingConfig::of(embedder))?;

    let query_vector = embedder.embed(&normalize_text(&query.text))?;

    let records: BTreeMap<PaperId, PaperRecord> =
        store.list_papers()?.into_iter().collect();

    let mut scored = Vec::new();
    for (id, vector) in store.all_embeddings()? {
        let Some(record) = records.get(&id) else {
            continue;
        };
        let score = cosine_similarity(&query_vector, &vector);
        scored.push(ScoredHit {
            id,
            record: record.clone(),
            score,
        });
    }
    debug!(candidates = scored.len(), "semantic query scored");

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.title_key.cmp(&b.record.title_key))
            .then_with(|| a.id.cmp(&b.id))
    });

    if let Some(min) = query.min_score {
        scored.retain(|hit| hit.score >= min);
    }
    scored.truncate(query.limit);
    Ok(scored)
}

/// Cosine similarity in double precision. Zero-magnitude vectors and
/// mismatched dimensions score 0.0 rather than NaN.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
