//! Database schema migrations for the embedded store.

/// Migration definitions, applied in order on first open.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: metadata, edges, piliers, candidate tables",
        up: MIGRATION_V1_UP,
    },
];

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    timestamp_epoch INTEGER NOT NULL,
    token_start INTEGER NOT NULL,
    token_end INTEGER NOT NULL,
    source_file TEXT NOT NULL,
    source_nature TEXT NOT NULL DEFAULT 'trace',
    source_format TEXT NOT NULL DEFAULT 'txt',
    source_origine TEXT NOT NULL,
    auteur TEXT NOT NULL,
    emotion_valence REAL NOT NULL DEFAULT 0.0,
    emotion_activation REAL NOT NULL DEFAULT 0.5,
    tags_roget TEXT NOT NULL DEFAULT '[]',
    personnes TEXT NOT NULL DEFAULT '[]',
    projets TEXT NOT NULL DEFAULT '[]',
    sujets TEXT NOT NULL DEFAULT '[]',
    lieux TEXT NOT NULL DEFAULT '[]',
    resume_texte TEXT NOT NULL DEFAULT '',
    gr_id INTEGER,
    confidence_score REAL NOT NULL DEFAULT 0.5,
    statut_verite INTEGER NOT NULL DEFAULT 0,
    vecteur_trildasa TEXT NOT NULL DEFAULT '{}',
    extractor_version TEXT NOT NULL DEFAULT '',
    extractor_model TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metadata_timestamp ON metadata(timestamp);
CREATE INDEX IF NOT EXISTS idx_metadata_source_file ON metadata(source_file);
CREATE INDEX IF NOT EXISTS idx_metadata_gr_id ON metadata(gr_id);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES metadata(id),
    target_id INTEGER NOT NULL REFERENCES metadata(id),
    edge_type TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

CREATE TABLE IF NOT EXISTS piliers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    importance INTEGER NOT NULL DEFAULT 1,
    fact TEXT NOT NULL,
    source_segment_id INTEGER REFERENCES metadata(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS personnes_candidats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    segment_id INTEGER NOT NULL REFERENCES metadata(id),
    name TEXT NOT NULL,
    context_snippet TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projets_candidats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    segment_id INTEGER NOT NULL REFERENCES metadata(id),
    name TEXT NOT NULL,
    context_snippet TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);
"#;

pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY);",
    )?;
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT INTO schema_migrations (version) VALUES (?1)",
                [migration.version],
            )?;
            tracing::info!(version = migration.version, description = migration.description, "applied migration");
        }
    }
    Ok(())
}
