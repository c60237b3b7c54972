//! papergraph - a personal research-paper knowledge graph.
//!
//! papergraph ingests directories of academic PDFs, resolves papers,
//! authors, topics and keywords into a property graph stored in
//! [redb](https://github.com/cberner/redb), and answers exact-metadata and
//! semantic-similarity queries over the collection. Query results can be
//! projected into an induced subgraph for visualization.
//!
//! # Quick start
//!
//! ```no_run
//! use papergraph::{DataDir, GraphStore};
//! use papergraph::embedder::HashingEmbedder;
//! use papergraph::extractor::PdfExtractor;
//! use papergraph::keywords::TermFrequencyExtractor;
//! use papergraph::pipeline::{self, PipelineContext};
//! use papergraph::query::{self, SemanticQuery};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let store = GraphStore::open(&data_dir.graph_db()).unwrap();
//!
//! let extractor = PdfExtractor;
//! let keywords = TermFrequencyExtractor;
//! let embedder = HashingEmbedder::default();
//! let ctx = PipelineContext::new(&extractor, &keywords, &embedder);
//!
//! let report =
//!     pipeline::ingest_directory(&store, &ctx, "papers/".as_ref()).unwrap();
//! println!("ingested {} papers", report.ingested);
//!
//! let hits = query::semantic_search(
//!     &store,
//!     &embedder,
//!     &SemanticQuery::new("transformer architectures"),
//! )
//! .unwrap();
//! for hit in &hits {
//!     println!("{} {:.3} {}", hit.id, hit.score, hit.record.title);
//! }
//! ```

pub mod cli;
pub mod data_dir;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod identity;
pub mod keywords;
pub mod metadata;
pub mod pipeline;
pub mod projection;
pub mod query;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use graph::GraphStore;
pub use identity::PaperId;
