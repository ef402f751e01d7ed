//! `read_knowledge` tool — reads a Markdown knowledge file verbatim.

use memoire_core::knowledge;
use serde::Deserialize;

use super::AppState;

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "fichier": {
                "type": "string",
                "description": "Knowledge file name, bare or with a subpath (e.g. 'personnes' or 'projets/memoire')"
            }
        },
        "required": ["fichier"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    fichier: String,
}

pub async fn execute(state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let args: Args = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments: 'fichier' is required".to_string()),
    };

    let content = knowledge::read_knowledge(&state.knowledge_dir, &args.fichier).map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "fichier": args.fichier, "content": content }))
}
