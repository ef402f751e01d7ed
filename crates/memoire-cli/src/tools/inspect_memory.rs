//! `inspect_memory` tool — coarse counts over the store, for a quick health
//! check without running a search.

use super::AppState;

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute(state: &AppState, _args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let stats = state.store.stats().map_err(|e| e.to_string())?;
    Ok(serde_json::json!({
        "segments": stats.segments,
        "edges": stats.edges,
        "piliers": stats.piliers,
        "validated": stats.validated,
        "refuted": stats.refuted,
    }))
}
