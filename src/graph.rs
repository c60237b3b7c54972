use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};

use crate::{
    embedder::EmbeddingConfig,
    error::{Error, Result},
    identity::{EntityKind, PaperId},
};

// Paper hash hex -> serialized PaperRecord.
const PAPERS: TableDefinition<&str, &[u8]> = TableDefinition::new("papers");
// Paper hash hex -> u32 LE dimension followed by dimension f32 LE values.
const EMBEDDINGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("embeddings");
// (kind code, normalization key) -> serialized EntityRecord.
const ENTITIES: TableDefinition<(u8, &str), &[u8]> =
    TableDefinition::new("entities");
// (edge kind code, paper hash hex, entity key) -> weight.
const EDGES: TableDefinition<(u8, &str, &str), f64> =
    TableDefinition::new("edges");
const META: TableDefinition<&str, &str> = TableDefinition::new("meta");

const META_EMBEDDING_MODEL: &str = "embedding_model";
const META_EMBEDDING_DIMENSION: &str = "embedding_dimension";

/// Header size: 4 bytes vector dimension.
const EMBEDDING_HEADER: usize = 4;

/// The typed edges of the bipartite paper graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    AuthoredBy,
    HasTopic,
    HasKeyword,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 3] =
        [EdgeKind::AuthoredBy, EdgeKind::HasTopic, EdgeKind::HasKeyword];

    pub fn code(self) -> u8 {
        match self {
            EdgeKind::AuthoredBy => 0,
            EdgeKind::HasTopic => 1,
            EdgeKind::HasKeyword => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EdgeKind::AuthoredBy),
            1 => Some(EdgeKind::HasTopic),
            2 => Some(EdgeKind::HasKeyword),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EdgeKind::AuthoredBy => "AUTHORED_BY",
            EdgeKind::HasTopic => "HAS_TOPIC",
            EdgeKind::HasKeyword => "HAS_KEYWORD",
        }
    }

    /// The entity kind this edge type points at.
    pub fn target_kind(self) -> EntityKind {
        match self {
            EdgeKind::AuthoredBy => EntityKind::Author,
            EdgeKind::HasTopic => EntityKind::Topic,
            EdgeKind::HasKeyword => EntityKind::Keyword,
        }
    }

    /// The edge type whose target is the given entity kind.
    pub fn for_target(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Author => EdgeKind::AuthoredBy,
            EntityKind::Topic => EdgeKind::HasTopic,
            EntityKind::Keyword => EdgeKind::HasKeyword,
        }
    }
}

/// Attributes stored on a Paper node. Never mutated after ingestion except
/// by whole-record upsert of the same content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    /// Normalized title key, used for collision warnings and ordering.
    pub title_key: String,
    pub file_name: String,
    pub source_path: String,
    pub snippet: Option<String>,
    pub year: Option<u16>,
    pub doi: Option<String>,
    /// Unix seconds at ingestion time.
    pub ingested_at: u64,
}

/// Attributes stored on an Author/Topic/Keyword node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// First-seen raw form, kept for display.
    pub display: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub papers: usize,
    pub authors: usize,
    pub topics: usize,
    pub keywords: usize,
    pub edges: usize,
}

/// Typed CRUD over the property graph, backed by a single redb database.
///
/// All writes go through a [`GraphTxn`]; readers get snapshot isolation from
/// redb's MVCC, so a projection read never observes a half-committed ingest.
pub struct GraphStore {
    db: Database,
}

impl GraphStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(PAPERS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.open_table(ENTITIES)?;
        txn.open_table(EDGES)?;
        txn.open_table(META)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a write transaction scope. Dropping the returned [`GraphTxn`]
    /// without calling [`GraphTxn::commit`] aborts it; nothing written inside
    /// the scope survives.
    pub fn begin(&self) -> Result<GraphTxn> {
        Ok(GraphTxn {
            txn: self.db.begin_write()?,
        })
    }

    // -- Papers --

    pub fn get_paper(&self, id: &PaperId) -> Result<Option<PaperRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PAPERS)?;
        let Some(guard) = table.get(id.as_hex())? else {
            return Ok(None);
        };
        Ok(Some(decode_record(guard.value())?))
    }

    /// All papers in content-hash order.
    pub fn list_papers(&self) -> Result<Vec<(PaperId, PaperRecord)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PAPERS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result
                .push((PaperId::from_hex(k.value()), decode_record(v.value())?));
        }
        Ok(result)
    }

    /// Papers whose normalized title key equals the given key. Used for the
    /// title-collision warning; content-hash identity is what decides
    /// duplicates.
    pub fn papers_with_title_key(&self, title_key: &str) -> Result<Vec<PaperId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PAPERS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            let record: PaperRecord = decode_record(v.value())?;
            if record.title_key == title_key {
                result.push(PaperId::from_hex(k.value()));
            }
        }
        Ok(result)
    }

    // -- Entities --

    pub fn get_entity(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<EntityRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        let Some(guard) = table.get((kind.code(), key))? else {
            return Ok(None);
        };
        Ok(Some(decode_record(guard.value())?))
    }

    /// Entities of a kind whose normalization key contains `term_key` as a
    /// substring, in key order.
    pub fn find_entities_by_substring(
        &self,
        kind: EntityKind,
        term_key: &str,
    ) -> Result<Vec<(String, EntityRecord)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            let (code, key) = k.value();
            if code == kind.code() && key.contains(term_key) {
                result.push((key.to_string(), decode_record(v.value())?));
            }
        }
        Ok(result)
    }

    // -- Edges --

    /// Entity neighbors of a paper along one edge type, with edge weights,
    /// in key order.
    pub fn neighbors(
        &self,
        paper: &PaperId,
        kind: EdgeKind,
    ) -> Result<Vec<(String, f64)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EDGES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            let (code, paper_hex, entity_key) = k.value();
            if code == kind.code() && paper_hex == paper.as_hex() {
                result.push((entity_key.to_string(), v.value()));
            }
        }
        Ok(result)
    }

    /// Papers connected to an entity along one edge type, in hash order.
    pub fn papers_of_entity(
        &self,
        kind: EdgeKind,
        entity_key: &str,
    ) -> Result<Vec<PaperId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EDGES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            let (code, paper_hex, key) = k.value();
            if code == kind.code() && key == entity_key {
                result.push(PaperId::from_hex(paper_hex));
            }
        }
        Ok(result)
    }

    // -- Embeddings --

    /// Every stored (paper, vector) pair, in hash order.
    pub fn all_embeddings(&self) -> Result<Vec<(PaperId, Vec<f32>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            if let Some(vector) = decode_embedding(v.value()) {
                result.push((PaperId::from_hex(k.value()), vector));
            }
        }
        Ok(result)
    }

    pub fn get_embedding(&self, id: &PaperId) -> Result<Option<Vec<f32>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        let Some(guard) = table.get(id.as_hex())? else {
            return Ok(None);
        };
        Ok(decode_embedding(guard.value()))
    }

    // -- Embedding configuration --

    pub fn embedding_config(&self) -> Result<Option<EmbeddingConfig>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;

        let model = table
            .get(META_EMBEDDING_MODEL)?
            .map(|v| v.value().to_string());
        let dimension = table
            .get(META_EMBEDDING_DIMENSION)?
            .and_then(|v| v.value().parse::<usize>().ok());

        match (model, dimension) {
            (Some(model_id), Some(dimension)) => Ok(Some(EmbeddingConfig {
                model_id,
                dimension,
            })),
            _ => Ok(None),
        }
    }

    /// Reject any operation whose active embedder differs from the store's
    /// recorded configuration. A store without a record (never ingested)
    /// accepts any embedder.
    pub fn ensure_embedding_config(
        &self,
        active: &EmbeddingConfig,
    ) -> Result<()> {
        match self.embedding_config()? {
            Some(stored) if stored != *active => {
                Err(Error::EmbeddingConfigMismatch {
                    stored_model: stored.model_id,
                    stored_dimension: stored.dimension,
                    active_model: active.model_id.clone(),
                    active_dimension: active.dimension,
                })
            }
            _ => Ok(()),
        }
    }

    // -- Stats --

    pub fn stats(&self) -> Result<StoreStats> {
        let txn = self.db.begin_read()?;

        let papers_table = txn.open_table(PAPERS)?;
        let edges_table = txn.open_table(EDGES)?;

        let mut stats = StoreStats {
            papers: papers_table.iter()?.count(),
            edges: edges_table.iter()?.count(),
            ..Default::default()
        };

        let entities = txn.open_table(ENTITIES)?;
        for entry in entities.iter()? {
            let (k, _) = entry?;
            match EntityKind::from_code(k.value().0) {
                Some(EntityKind::Author) => stats.authors += 1,
                Some(EntityKind::Topic) => stats.topics += 1,
                Some(EntityKind::Keyword) => stats.keywords += 1,
                None => {}
            }
        }

        Ok(stats)
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore").finish_non_exhaustive()
    }
}

/// A scoped write transaction over the graph. Commit consumes the scope;
/// dropping it without committing rolls everything back, including on error
/// paths mid-ingest.
pub struct GraphTxn {
    txn: WriteTransaction,
}

impl GraphTxn {
    pub fn upsert_paper(
        &mut self,
        id: &PaperId,
        record: &PaperRecord,
    ) -> Result<()> {
        let bytes = encode_record(record)?;
        let mut table = self.txn.open_table(PAPERS)?;
        table.insert(id.as_hex(), bytes.as_slice())?;
        Ok(())
    }

    pub fn store_embedding(
        &mut self,
        id: &PaperId,
        vector: &[f32],
    ) -> Result<()> {
        let mut bytes =
            Vec::with_capacity(EMBEDDING_HEADER + std::mem::size_of_val(vector));
        bytes.extend_from_slice(&(vector.len() as u32).to_le_bytes());
        bytes.extend_from_slice(bytemuck::cast_slice(vector));

        let mut table = self.txn.open_table(EMBEDDINGS)?;
        table.insert(id.as_hex(), bytes.as_slice())?;
        Ok(())
    }

    /// Create the entity node if absent. An existing node keeps its
    /// first-seen display form.
    pub fn upsert_entity(
        &mut self,
        kind: EntityKind,
        key: &str,
        display: &str,
    ) -> Result<()> {
        let mut table = self.txn.open_table(ENTITIES)?;
        if table.get((kind.code(), key))?.is_some() {
            return Ok(());
        }
        let bytes = encode_record(&EntityRecord {
            display: display.to_string(),
        })?;
        table.insert((kind.code(), key), bytes.as_slice())?;
        Ok(())
    }

    /// Insert or overwrite the single edge of `kind` between the ordered
    /// pair. Key uniqueness makes re-ingestion idempotent.
    pub fn upsert_edge(
        &mut self,
        kind: EdgeKind,
        paper: &PaperId,
        entity_key: &str,
        weight: f64,
    ) -> Result<()> {
        let mut table = self.txn.open_table(EDGES)?;
        table.insert((kind.code(), paper.as_hex(), entity_key), weight)?;
        Ok(())
    }

    pub fn set_embedding_config(
        &mut self,
        config: &EmbeddingConfig,
    ) -> Result<()> {
        let mut table = self.txn.open_table(META)?;
        table.insert(META_EMBEDDING_MODEL, config.model_id.as_str())?;
        table
            .insert(META_EMBEDDING_DIMENSION, config.dimension.to_string().as_str())?;
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        // CommitError maps to Error::StoreTransactionFailed.
        self.txn.commit()?;
        Ok(())
    }
}

fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record)
        .map_err(|e| Error::Config(format!("record encode failed: {e}")))
}

fn decode_record<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Config(format!("record decode failed: {e}")))
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() < EMBEDDING_HEADER {
        return None;
    }
    let dimension =
        u32::from_le_bytes(bytes[..EMBEDDING_HEADER].try_into().ok()?) as usize;
    let payload = &bytes[EMBEDDING_HEADER..];
    if payload.len() != dimension * 4 {
        return None;
    }
    // Manual LE decode; the mmap'd value bytes are not alignment-guaranteed.
    Some(
        payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
