//! `search_memory` tool — hybrid search over the metadata store via Hermès.

use memoire_core::QueryProfile;
use serde::Deserialize;

use super::AppState;

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Free-text search query"
            },
            "top_k": {
                "type": "integer",
                "description": "Maximum number of results to return (default 5)"
            },
            "date_range_days": {
                "type": "integer",
                "description": "Restrict results to the last N days"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    top_k: Option<usize>,
    date_range_days: Option<i64>,
}

pub async fn execute(state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let args: Args = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments: 'query' is required".to_string()),
    };

    let mut profile = QueryProfile::default();
    if let Some(top_k) = args.top_k {
        profile.strategy.top_k = top_k;
    }
    profile.filters.date_range_days = args.date_range_days;

    let result = state.hermes.run(&args.query, &profile).map_err(|e| e.to_string())?;

    let candidates: Vec<serde_json::Value> = result
        .candidates
        .iter()
        .map(|c| {
            serde_json::json!({
                "id": c.segment.id,
                "score": c.score,
                "resume": c.segment.resume_texte,
                "sujets": c.segment.sujets,
                "personnes": c.segment.personnes,
                "timestamp": c.segment.timestamp.to_rfc3339(),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "query": result.query,
        "used_fallback": result.used_fallback,
        "candidates": candidates,
        "fallback_hits": result.fallback_hits.len(),
    }))
}
