//! Core domain types: the records the rest of the crate reads and writes.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// A sparse `position -> weight` vector. `BTreeMap` keeps positions in order
/// so JSON round-trips byte-for-byte regardless of insertion order.
pub type SparseVector = BTreeMap<u32, f64>;

/// Who or what produced a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auteur {
    Human,
    Assistant,
    IrisInternal,
    Other(String),
}

impl Serialize for Auteur {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Auteur {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Auteur::from_str(&s).expect("Auteur::from_str is infallible"))
    }
}

impl std::fmt::Display for Auteur {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auteur::Human => write!(f, "human"),
            Auteur::Assistant => write!(f, "assistant"),
            Auteur::IrisInternal => write!(f, "iris_internal"),
            Auteur::Other(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for Auteur {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "human" => Auteur::Human,
            "assistant" => Auteur::Assistant,
            "iris_internal" => Auteur::IrisInternal,
            other => Auteur::Other(other.to_string()),
        })
    }
}

/// `statut_verite`: whether a segment's content has been confirmed, refuted,
/// or never checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum TruthStatus {
    Refuted = -1,
    #[default]
    Unknown = 0,
    Validated = 1,
}

/// A single inserted row in `metadata` — one bounded chunk of conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub timestamp_epoch: i64,
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
    pub statut_verite: TruthStatus,
    pub vector: SparseVector,
    pub extractor_version: String,
    pub extractor_model: String,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    /// Concatenation of tags, summary, and entity lists — the "bag of words"
    /// the Vector Engine matches keyword sets against.
    pub fn bag_of_words(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.tags_roget.iter().map(String::as_str));
        parts.push(self.resume_texte.as_str());
        parts.extend(self.personnes.iter().map(String::as_str));
        parts.extend(self.projets.iter().map(String::as_str));
        parts.extend(self.sujets.iter().map(String::as_str));
        parts.extend(self.lieux.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Directed typed link between two segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    CorrigePar,
    #[default]
    Trajectoire,
    Genealogie,
    EvolueVers,
    MemeGroupe,
    TagsPartages,
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeType::CorrigePar => "CORRIGE_PAR",
            EdgeType::Trajectoire => "TRAJECTOIRE",
            EdgeType::Genealogie => "GENEALOGIE",
            EdgeType::EvolueVers => "EVOLUE_VERS",
            EdgeType::MemeGroupe => "MEME_GROUPE",
            EdgeType::TagsPartages => "TAGS_PARTAGES",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CORRIGE_PAR" => Ok(EdgeType::CorrigePar),
            "TRAJECTOIRE" => Ok(EdgeType::Trajectoire),
            "GENEALOGIE" => Ok(EdgeType::Genealogie),
            "EVOLUE_VERS" => Ok(EdgeType::EvolueVers),
            "MEME_GROUPE" => Ok(EdgeType::MemeGroupe),
            "TAGS_PARTAGES" => Ok(EdgeType::TagsPartages),
            other => Err(format!("unknown edge type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub edge_type: EdgeType,
    pub weight: f64,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A consolidated long-lived fact, elevated from ephemeral memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PilierCategory {
    Identite,
    Recherche,
    Technique,
    Relation,
    Valeur,
    #[default]
    Fait,
}

impl std::fmt::Display for PilierCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PilierCategory::Identite => "IDENTITE",
            PilierCategory::Recherche => "RECHERCHE",
            PilierCategory::Technique => "TECHNIQUE",
            PilierCategory::Relation => "RELATION",
            PilierCategory::Valeur => "VALEUR",
            PilierCategory::Fait => "FAIT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PilierCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDENTITE" => Ok(PilierCategory::Identite),
            "RECHERCHE" => Ok(PilierCategory::Recherche),
            "TECHNIQUE" => Ok(PilierCategory::Technique),
            "RELATION" => Ok(PilierCategory::Relation),
            "VALEUR" => Ok(PilierCategory::Valeur),
            "FAIT" => Ok(PilierCategory::Fait),
            other => Err(format!("unknown pilier category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pilier {
    pub id: i64,
    pub category: PilierCategory,
    /// 0..=3. Not clamped away from 0 — see DESIGN.md for why this is
    /// looser than the usual 1..=3 "meaningful pilier" range.
    pub importance: u8,
    pub fact: String,
    pub source_segment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A proposed named entity not yet confirmed, pointing back to the segment
/// that introduced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePersonne {
    pub id: i64,
    pub segment_id: i64,
    pub name: String,
    pub context_snippet: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatProjet {
    pub id: i64,
    pub segment_id: i64,
    pub name: String,
    pub context_snippet: String,
    pub created_at: DateTime<Utc>,
}
