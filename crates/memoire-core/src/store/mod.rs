//! Embedded relational store: SQLite wrapping `metadata`, `edges`,
//! `piliers`, and the two candidate-entity tables, plus the
//! `normalize_search` user-defined scalar function used for accent- and
//! JSON-array-aware text matching.

mod migrations;
mod normalize;

pub use migrations::MIGRATIONS;
pub use normalize::normalize_search;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{
    Auteur, CandidatProjet, CandidatePersonne, Edge, EdgeType, Pilier, PilierCategory, Segment,
    SparseVector, TruthStatus,
};
use crate::vector::{json_to_vector, vector_to_json};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("segment not found: {0}")]
    NotFound(i64),
    #[error("initialization error: {0}")]
    Init(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// New segment data, before an id/created_at has been assigned.
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub timestamp: chrono::DateTime<Utc>,
    pub token_start: i64,
    pub token_end: i64,
    pub source_file: String,
    pub source_nature: String,
    pub source_format: String,
    pub source_origine: String,
    pub auteur: Auteur,
    pub emotion_valence: f64,
    pub emotion_activation: f64,
    pub tags_roget: Vec<String>,
    pub personnes: Vec<String>,
    pub projets: Vec<String>,
    pub sujets: Vec<String>,
    pub lieux: Vec<String>,
    pub resume_texte: String,
    pub gr_id: Option<i64>,
    pub confidence_score: f64,
    pub vector: SparseVector,
    pub extractor_version: String,
    pub extractor_model: String,
}

impl NewSegment {
    /// A throwaway [`Segment`] carrying this data, for callers (the Vector
    /// Engine) that only need the field values and not a real row id.
    pub fn as_segment_preview(&self) -> Segment {
        Segment {
            id: 0,
            timestamp: self.timestamp,
            timestamp_epoch: self.timestamp.timestamp(),
            token_start: self.token_start,
            token_end: self.token_end,
            source_file: self.source_file.clone(),
            source_nature: self.source_nature.clone(),
            source_format: self.source_format.clone(),
            source_origine: self.source_origine.clone(),
            auteur: self.auteur.clone(),
            emotion_valence: self.emotion_valence,
            emotion_activation: self.emotion_activation,
            tags_roget: self.tags_roget.clone(),
            personnes: self.personnes.clone(),
            projets: self.projets.clone(),
            sujets: self.sujets.clone(),
            lieux: self.lieux.clone(),
            resume_texte: self.resume_texte.clone(),
            gr_id: self.gr_id,
            confidence_score: self.confidence_score,
            statut_verite: TruthStatus::Unknown,
            vector: self.vector.clone(),
            extractor_version: self.extractor_version.clone(),
            extractor_model: self.extractor_model.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Main store struct. Separate reader/writer connections for interior
/// mutability: all methods take `&self`, so callers share one `Arc<Store>`
/// instead of `Arc<Mutex<Store>>`.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Store {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        normalize::register(conn)?;
        Ok(())
    }

    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = directories::ProjectDirs::from("com", "memoire", "core")
                    .ok_or_else(|| StoreError::Init("could not determine project directories".into()))?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("metadata.db")
            }
        };

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Open an in-memory store, for tests. Both connections point at the
    /// same shared-cache in-memory database (a plain `:memory:` URI per
    /// connection would give each its own, invisible-to-each-other
    /// database).
    pub fn open_in_memory() -> Result<Self> {
        use rusqlite::OpenFlags;
        let uri = format!(
            "file:memoire-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_SHARED_CACHE;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&writer_conn)?;
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn lock_writer(&self) -> std::result::Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.writer
            .lock()
            .map_err(|_| StoreError::Init("writer lock poisoned".into()))
    }

    fn lock_reader(&self) -> std::result::Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.reader
            .lock()
            .map_err(|_| StoreError::Init("reader lock poisoned".into()))
    }

    /// Insert a new segment. Invariant `token_start < token_end` is checked
    /// here rather than left to the caller.
    pub fn insert_segment(&self, new: NewSegment) -> Result<Segment> {
        if new.token_start >= new.token_end {
            return Err(StoreError::Init(format!(
                "token_start ({}) must be < token_end ({})",
                new.token_start, new.token_end
            )));
        }
        let conn = self.lock_writer()?;
        let created_at = Utc::now();
        let timestamp_epoch = new.timestamp.timestamp();

        conn.execute(
            "INSERT INTO metadata (
                timestamp, timestamp_epoch, token_start, token_end,
                source_file, source_nature, source_format, source_origine,
                auteur, emotion_valence, emotion_activation,
                tags_roget, personnes, projets, sujets, lieux,
                resume_texte, gr_id, confidence_score, statut_verite,
                vecteur_trildasa, extractor_version, extractor_model, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24)",
            params![
                new.timestamp.to_rfc3339(),
                timestamp_epoch,
                new.token_start,
                new.token_end,
                new.source_file,
                new.source_nature,
                new.source_format,
                new.source_origine,
                new.auteur.to_string(),
                new.emotion_valence,
                new.emotion_activation,
                serde_json::to_string(&new.tags_roget).unwrap(),
                serde_json::to_string(&new.personnes).unwrap(),
                serde_json::to_string(&new.projets).unwrap(),
                serde_json::to_string(&new.sujets).unwrap(),
                serde_json::to_string(&new.lieux).unwrap(),
                new.resume_texte,
                new.gr_id,
                new.confidence_score,
                TruthStatus::Unknown as i8,
                vector_to_json(&new.vector),
                new.extractor_version,
                new.extractor_model,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.get_segment_locked(&conn, id)
    }

    pub fn get_segment(&self, id: i64) -> Result<Segment> {
        let conn = self.lock_reader()?;
        self.get_segment_locked(&conn, id)
    }

    fn get_segment_locked(&self, conn: &Connection, id: i64) -> Result<Segment> {
        conn.query_row(
            "SELECT * FROM metadata WHERE id = ?1",
            [id],
            row_to_segment,
        )
        .optional()?
        .ok_or(StoreError::NotFound(id))
    }

    pub fn update_statut_verite(&self, id: i64, statut: TruthStatus) -> Result<()> {
        let conn = self.lock_writer()?;
        conn.execute(
            "UPDATE metadata SET statut_verite = ?1 WHERE id = ?2",
            params![statut as i8, id],
        )?;
        Ok(())
    }

    pub fn insert_edge(
        &self,
        source_id: i64,
        target_id: i64,
        edge_type: EdgeType,
        metadata: Option<String>,
        weight: f64,
    ) -> Result<Edge> {
        let conn = self.lock_writer()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO edges (source_id, target_id, edge_type, weight, metadata, created_at)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                source_id,
                target_id,
                edge_type.to_string(),
                weight,
                metadata,
                created_at.to_rfc3339()
            ],
        )?;
        Ok(Edge {
            id: conn.last_insert_rowid(),
            source_id,
            target_id,
            edge_type,
            weight,
            metadata,
            created_at,
        })
    }

    pub fn insert_pilier(
        &self,
        category: PilierCategory,
        importance: u8,
        fact: String,
        source_segment_id: Option<i64>,
    ) -> Result<Pilier> {
        let conn = self.lock_writer()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO piliers (category, importance, fact, source_segment_id, created_at)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                category.to_string(),
                importance,
                fact.clone(),
                source_segment_id,
                created_at.to_rfc3339()
            ],
        )?;
        Ok(Pilier {
            id: conn.last_insert_rowid(),
            category,
            importance,
            fact,
            source_segment_id,
            created_at,
        })
    }

    pub fn insert_candidat_personne(
        &self,
        segment_id: i64,
        name: String,
        context_snippet: String,
    ) -> Result<CandidatePersonne> {
        let conn = self.lock_writer()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO personnes_candidats (segment_id, name, context_snippet, created_at)
             VALUES (?1,?2,?3,?4)",
            params![segment_id, name.clone(), context_snippet.clone(), created_at.to_rfc3339()],
        )?;
        Ok(CandidatePersonne {
            id: conn.last_insert_rowid(),
            segment_id,
            name,
            context_snippet,
            created_at,
        })
    }

    pub fn insert_candidat_projet(
        &self,
        segment_id: i64,
        name: String,
        context_snippet: String,
    ) -> Result<CandidatProjet> {
        let conn = self.lock_writer()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO projets_candidats (segment_id, name, context_snippet, created_at)
             VALUES (?1,?2,?3,?4)",
            params![segment_id, name.clone(), context_snippet.clone(), created_at.to_rfc3339()],
        )?;
        Ok(CandidatProjet {
            id: conn.last_insert_rowid(),
            segment_id,
            name,
            context_snippet,
            created_at,
        })
    }

    /// Most recently inserted segment sharing `(timestamp, auteur)` — used
    /// by the Indexer's significance filter.
    pub fn last_segment_with_timestamp_auteur(
        &self,
        timestamp: chrono::DateTime<Utc>,
        auteur: &Auteur,
    ) -> Result<Option<Segment>> {
        let conn = self.lock_reader()?;
        conn.query_row(
            "SELECT * FROM metadata WHERE timestamp = ?1 AND auteur = ?2
             ORDER BY id DESC LIMIT 1",
            params![timestamp.to_rfc3339(), auteur.to_string()],
            row_to_segment,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Run an arbitrary read query against `metadata` returning segments.
    /// Used by the Retriever and Sbire, both of which build their own
    /// parameterized `WHERE` clauses.
    pub fn query_segments(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Segment>> {
        let conn = self.lock_reader()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_segment)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn highest_gr_id(&self, source_file: &str) -> Result<Option<i64>> {
        let conn = self.lock_reader()?;
        conn.query_row(
            "SELECT MAX(gr_id) FROM metadata WHERE source_file = ?1",
            [source_file],
            |row| row.get(0),
        )
        .map_err(StoreError::from)
    }

    /// Every edge touching `segment_id`, either as source or target.
    /// Used by the `explore_links` tool to surface a segment's graph
    /// neighborhood.
    pub fn edges_for_segment(&self, segment_id: i64) -> Result<Vec<Edge>> {
        let conn = self.lock_reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, target_id, edge_type, weight, metadata, created_at
             FROM edges WHERE source_id = ?1 OR target_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([segment_id], |row| {
            let edge_type_str: String = row.get("edge_type")?;
            let created_at_str: String = row.get("created_at")?;
            Ok(Edge {
                id: row.get("id")?,
                source_id: row.get("source_id")?,
                target_id: row.get("target_id")?,
                edge_type: EdgeType::from_str(&edge_type_str).unwrap_or_default(),
                weight: row.get("weight")?,
                metadata: row.get("metadata")?,
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Coarse counts over every table, for the `inspect_memory` tool.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock_reader()?;
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };
        Ok(StoreStats {
            segments: count("SELECT COUNT(*) FROM metadata")?,
            edges: count("SELECT COUNT(*) FROM edges")?,
            piliers: count("SELECT COUNT(*) FROM piliers")?,
            validated: count("SELECT COUNT(*) FROM metadata WHERE statut_verite = 1")?,
            refuted: count("SELECT COUNT(*) FROM metadata WHERE statut_verite = -1")?,
        })
    }
}

/// Coarse per-table counts, returned by [`Store::stats`].
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StoreStats {
    pub segments: i64,
    pub edges: i64,
    pub piliers: i64,
    pub validated: i64,
    pub refuted: i64,
}

fn row_to_segment(row: &Row<'_>) -> rusqlite::Result<Segment> {
    let tags_roget: String = row.get("tags_roget")?;
    let personnes: String = row.get("personnes")?;
    let projets: String = row.get("projets")?;
    let sujets: String = row.get("sujets")?;
    let lieux: String = row.get("lieux")?;
    let vecteur: String = row.get("vecteur_trildasa")?;
    let timestamp_str: String = row.get("timestamp")?;
    let created_at_str: String = row.get("created_at")?;
    let auteur_str: String = row.get("auteur")?;
    let statut: i8 = row.get("statut_verite")?;

    Ok(Segment {
        id: row.get("id")?,
        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        timestamp_epoch: row.get("timestamp_epoch")?,
        token_start: row.get("token_start")?,
        token_end: row.get("token_end")?,
        source_file: row.get("source_file")?,
        source_nature: row.get("source_nature")?,
        source_format: row.get("source_format")?,
        source_origine: row.get("source_origine")?,
        auteur: Auteur::from_str(&auteur_str).expect("Auteur::from_str is infallible"),
        emotion_valence: row.get("emotion_valence")?,
        emotion_activation: row.get("emotion_activation")?,
        tags_roget: serde_json::from_str(&tags_roget).unwrap_or_default(),
        personnes: serde_json::from_str(&personnes).unwrap_or_default(),
        projets: serde_json::from_str(&projets).unwrap_or_default(),
        sujets: serde_json::from_str(&sujets).unwrap_or_default(),
        lieux: serde_json::from_str(&lieux).unwrap_or_default(),
        resume_texte: row.get("resume_texte")?,
        gr_id: row.get("gr_id")?,
        confidence_score: row.get("confidence_score")?,
        statut_verite: match statut {
            -1 => TruthStatus::Refuted,
            1 => TruthStatus::Validated,
            _ => TruthStatus::Unknown,
        },
        vector: json_to_vector(&vecteur),
        extractor_version: row.get("extractor_version")?,
        extractor_model: row.get("extractor_model")?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_segment() -> NewSegment {
        NewSegment {
            timestamp: Utc::now(),
            token_start: 0,
            token_end: 5,
            source_file: "f.txt".into(),
            source_nature: "trace".into(),
            source_format: "txt".into(),
            source_origine: "test".into(),
            auteur: Auteur::Human,
            emotion_valence: 0.2,
            emotion_activation: 0.3,
            tags_roget: vec!["06-0030-0110".into()],
            personnes: vec!["Marie".into()],
            projets: vec![],
            sujets: vec![],
            lieux: vec![],
            resume_texte: "bonjour".into(),
            gr_id: Some(1),
            confidence_score: 0.9,
            vector: SparseVector::new(),
            extractor_version: "test-1".into(),
            extractor_model: "test-model".into(),
        }
    }

    #[test]
    fn insert_and_fetch_round_trips_fields() {
        let store = Store::open_in_memory().unwrap();
        let inserted = store.insert_segment(sample_new_segment()).unwrap();
        let fetched = store.get_segment(inserted.id).unwrap();
        assert_eq!(fetched.personnes, vec!["Marie".to_string()]);
        assert_eq!(fetched.gr_id, Some(1));
        assert!(fetched.token_start < fetched.token_end);
        assert_eq!(fetched.timestamp_epoch, fetched.timestamp.timestamp());
    }

    #[test]
    fn rejects_non_monotonic_token_range() {
        let store = Store::open_in_memory().unwrap();
        let mut new = sample_new_segment();
        new.token_start = 10;
        new.token_end = 5;
        assert!(store.insert_segment(new).is_err());
    }

    #[test]
    fn normalize_search_matches_accented_name_via_udf() {
        let store = Store::open_in_memory().unwrap();
        let mut new = sample_new_segment();
        new.personnes = vec!["Christian Gagné".into()];
        store.insert_segment(new).unwrap();

        let rows = store
            .query_segments(
                "SELECT * FROM metadata WHERE normalize_search(personnes) LIKE ?1",
                &[&"%christian gagne%"],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
