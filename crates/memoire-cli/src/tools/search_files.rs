//! `search_files` tool — raw regex grep over fragment files via the Sbire,
//! for when the caller wants to see exact matched text rather than scored
//! segments.

use memoire_core::{Mandat, MandatHit};
use serde::Deserialize;

use super::AppState;

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "pattern": {
                "type": "string",
                "description": "Regular expression to match against fragment file lines"
            },
            "max": {
                "type": "integer",
                "description": "Maximum number of hits to return (default 20)"
            }
        },
        "required": ["pattern"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    pattern: String,
    max: Option<usize>,
}

pub async fn execute(state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let args: Args = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments: 'pattern' is required".to_string()),
    };

    let mandat = Mandat::Grep { pattern: args.pattern, max: args.max.unwrap_or(20) };
    let hits = state.sbire.execute(&mandat).map_err(|e| e.to_string())?;

    let hits: Vec<serde_json::Value> = hits
        .into_iter()
        .filter_map(|hit| match hit {
            MandatHit::Grep { file, line_no, token_start, content, matched_text } => Some(serde_json::json!({
                "file": file.display().to_string(),
                "line": line_no,
                "token_start": token_start,
                "content": content,
                "matched_text": matched_text,
            })),
            MandatHit::Segment(_) => None,
        })
        .collect();

    Ok(serde_json::json!({ "hits": hits }))
}
