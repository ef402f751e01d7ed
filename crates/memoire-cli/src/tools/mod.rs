//! MCP Tools
//!
//! Tool implementations for the `memoire-mcp` server — one module per
//! [`memoire_core::tools::ToolName`] variant.

pub mod append_knowledge;
pub mod explore_links;
pub mod inspect_memory;
pub mod read_knowledge;
pub mod search_files;
pub mod search_memory;
pub mod update_knowledge;

/// Shared handles every tool module reads from. Cheap to clone (everything
/// inside is an `Arc` or a plain path).
#[derive(Clone)]
pub struct AppState {
    pub store: std::sync::Arc<memoire_core::Store>,
    pub hermes: std::sync::Arc<memoire_core::Hermes>,
    pub sbire: std::sync::Arc<memoire_core::Sbire>,
    pub knowledge_dir: std::path::PathBuf,
    pub fragments_root: std::path::PathBuf,
}
