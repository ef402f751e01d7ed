//! `explore_links` tool — the edges touching one segment, for walking the
//! graph the Coherence Agent weaves between corrections and trajectories.

use serde::Deserialize;

use super::AppState;

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "segment_id": {
                "type": "integer",
                "description": "Segment id to explore edges from"
            }
        },
        "required": ["segment_id"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    segment_id: i64,
}

pub async fn execute(state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let args: Args = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments: 'segment_id' is required".to_string()),
    };

    let edges = state.store.edges_for_segment(args.segment_id).map_err(|e| e.to_string())?;

    let edges: Vec<serde_json::Value> = edges
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id,
                "source_id": e.source_id,
                "target_id": e.target_id,
                "edge_type": e.edge_type.to_string(),
                "weight": e.weight,
                "metadata": e.metadata,
            })
        })
        .collect();

    Ok(serde_json::json!({ "segment_id": args.segment_id, "edges": edges }))
}
