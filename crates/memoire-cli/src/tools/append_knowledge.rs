//! `append_knowledge` tool — appends a blank-line-separated paragraph to an
//! existing knowledge file.

use memoire_core::knowledge;
use serde::Deserialize;

use super::AppState;

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "fichier": {
                "type": "string",
                "description": "Knowledge file name, bare or with a subpath"
            },
            "contenu": {
                "type": "string",
                "description": "Paragraph to append"
            }
        },
        "required": ["fichier", "contenu"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    fichier: String,
    contenu: String,
}

pub async fn execute(state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let args: Args = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments: 'fichier' and 'contenu' are required".to_string()),
    };

    knowledge::append_knowledge(&state.knowledge_dir, &args.fichier, &args.contenu).map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "fichier": args.fichier, "appended": true }))
}
