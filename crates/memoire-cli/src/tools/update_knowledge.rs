//! `update_knowledge` tool — replaces the body of a named section, keeping
//! its header line intact.

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
            "section": {
                "type": "string",
                "description": "Section header text, without the leading '#'/'##'"
            },
            "contenu": {
                "type": "string",
                "description": "New body for the section"
            }
        },
        "required": ["fichier", "section", "contenu"]
    })
}

#[derive(Debug, Deserialize)]
struct Args {
    fichier: String,
    section: String,
    contenu: String,
}

pub async fn execute(state: &AppState, args: Option<serde_json::Value>) -> Result<serde_json::Value, String> {
    let args: Args = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("invalid arguments: {e}"))?,
        None => return Err("missing arguments: 'fichier', 'section' and 'contenu' are required".to_string()),
    };

    knowledge::update_knowledge(&state.knowledge_dir, &args.fichier, &args.section, &args.contenu)
        .map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "fichier": args.fichier, "section": args.section, "updated": true }))
}
