//! # Mémoire Core
//!
//! Personal conversational-memory engine: a store of tagged, vectorized
//! conversation segments plus the three components built on top of it.
//!
//! - **Indexer** ("Scribe"): turns raw conversation turns into stored
//!   segments — segmentation, LLM-backed metadata extraction, significance
//!   filtering, fragment-file emission. Runs in bulk (backlog) or real-time
//!   (streaming) mode.
//! - **Retriever** ("Hermès"): answers a free-text query with a ranked,
//!   token-budgeted context block, combining metadata SQL search, six-signal
//!   hybrid scoring, and a raw-text fallback when the database comes up
//!   empty.
//! - **Coherence Agent** ("Mnémosyne") + **Sbire**: a nightly batch pass
//!   that rectifies factual corrections, weaves trajectories of thought into
//!   typed edges, proposes consolidated piliers, and injects its findings
//!   back into memory as `iris_internal` segments — the "memory
//!   short-circuit" that lets the system notice its own reasoning.
//!
//! Storage is an embedded SQLite database (`rusqlite`) plus a parallel tree
//! of tokenized fragment files. Tags live in a hierarchical Roget-style
//! taxonomy; each segment also carries a fixed-layout sparse vector used for
//! cheap resonance scoring against a query mask.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use memoire_core::store::Store;
//! use memoire_core::retriever::Hermes;
//! use memoire_core::query_profile::QueryProfile;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::open("memoire.db")?);
//! let hermes = Hermes::new(store, "fragments".into());
//! let result = hermes.run("le projet rust de la semaine dernière", &QueryProfile::default())?;
//! println!("{}", result.formatted_context(4000, &tiktoken_rs::cl100k_base()?));
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

/// Data model shared across every component: segments, edges, piliers,
/// candidate entities, sparse vectors.
pub mod model;

/// Embedded SQLite store and the `normalize_search` matching function.
pub mod store;

/// Fragment file storage — the tokenized, line-numbered copy of each
/// indexed conversation.
pub mod fragment;

/// Hierarchical Roget-style tag taxonomy and tag-proximity scoring.
pub mod taxonomy;

/// Fixed-layout sparse vector encoding and resonance math.
pub mod vector;

/// Query acceptance contract shared by the Retriever and Coherence Agent.
pub mod query_profile;

/// LLM extraction contract, JSON repair, and retry wrapper for the Indexer.
pub mod extract;

/// The Indexer ("Scribe"): bulk and real-time conversation ingestion.
pub mod indexer;

/// The Retriever ("Hermès"): hybrid-scored memory search.
pub mod retriever;

/// The Sbire: deterministic search/write execution for the Coherence Agent.
pub mod sbire;

/// The Coherence Agent ("Mnémosyne"): rectification, reflection, injection.
pub mod coherence;

/// Mnémosyne's session notes file, with bounded retention.
pub mod notes;

/// Knowledge-file tools operating on Iris's Markdown memory files.
pub mod knowledge;

/// Closed tool-dispatch enum consumed by the `memoire-mcp` stdio binary.
pub mod tools;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use model::{
    Auteur, CandidatProjet, CandidatePersonne, Edge, EdgeType, Pilier, PilierCategory, Segment,
    SparseVector, TruthStatus,
};

pub use store::{NewSegment, Store, StoreError, StoreStats};

pub use fragment::{Fragment, FragmentError};

pub use taxonomy::Taxonomy;

pub use query_profile::{QueryFilters, QueryProfile, QueryStrategy};

pub use extract::{ExtractError, ExtractedRecord, Extractor};

pub use indexer::{IndexerError, RealtimeHandle, Turn};

pub use retriever::{Hermes, RetrievalResult, RetrieverError, ScoredCandidate};

pub use sbire::{Mandat, MandatHit, Sbire, SbireError};

pub use coherence::{CoherenceMode, CoherenceResult, Mnemosyne};

pub use tools::{ToolError, ToolName};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        Auteur, CoherenceMode, CoherenceResult, Edge, EdgeType, ExtractedRecord, Extractor, Hermes, Mandat,
        MandatHit, Mnemosyne, NewSegment, Pilier, PilierCategory, QueryProfile, RetrievalResult,
        Sbire, ScoredCandidate, Segment, SparseVector, Store, ToolName, TruthStatus, Turn,
    };
}
