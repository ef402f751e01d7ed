//! Tool-dispatch surface shared by the `memoire-mcp` stdio binary: a closed
//! set of tool names, parsed from the string a client sends, with an alias
//! table consulted before falling through to an error. Ported from the
//! original's tool alias map.

use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("unknown tool '{name}' (expected one of: {})", allowed.join(", "))]
    UnknownTool { name: String, allowed: Vec<&'static str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchMemory,
    SearchFiles,
    ReadKnowledge,
    AppendKnowledge,
    UpdateKnowledge,
    ExploreLinks,
    InspectMemory,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        ToolName::SearchMemory,
        ToolName::SearchFiles,
        ToolName::ReadKnowledge,
        ToolName::AppendKnowledge,
        ToolName::UpdateKnowledge,
        ToolName::ExploreLinks,
        ToolName::InspectMemory,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            ToolName::SearchMemory => "search_memory",
            ToolName::SearchFiles => "search_files",
            ToolName::ReadKnowledge => "read_knowledge",
            ToolName::AppendKnowledge => "append_knowledge",
            ToolName::UpdateKnowledge => "update_knowledge",
            ToolName::ExploreLinks => "explore_links",
            ToolName::InspectMemory => "inspect_memory",
        }
    }

    fn from_alias(name: &str) -> Option<ToolName> {
        match name {
            "search_segments" => Some(ToolName::SearchMemory),
            "search_recent_files" => Some(ToolName::SearchFiles),
            "get_knowledge" => Some(ToolName::ReadKnowledge),
            "add_knowledge" => Some(ToolName::AppendKnowledge),
            "edit_knowledge" => Some(ToolName::UpdateKnowledge),
            "get_links" => Some(ToolName::ExploreLinks),
            "inspect" => Some(ToolName::InspectMemory),
            _ => None,
        }
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = match s {
            "search_memory" => Some(ToolName::SearchMemory),
            "search_files" => Some(ToolName::SearchFiles),
            "read_knowledge" => Some(ToolName::ReadKnowledge),
            "append_knowledge" => Some(ToolName::AppendKnowledge),
            "update_knowledge" => Some(ToolName::UpdateKnowledge),
            "explore_links" => Some(ToolName::ExploreLinks),
            "inspect_memory" => Some(ToolName::InspectMemory),
            _ => None,
        };

        canonical.or_else(|| ToolName::from_alias(s)).ok_or_else(|| ToolError::UnknownTool {
            name: s.to_string(),
            allowed: ToolName::ALL.iter().map(|t| t.canonical_name()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_name() {
        assert_eq!("search_memory".parse::<ToolName>().unwrap(), ToolName::SearchMemory);
    }

    #[test]
    fn parses_legacy_alias() {
        assert_eq!("search_segments".parse::<ToolName>().unwrap(), ToolName::SearchMemory);
        assert_eq!("get_links".parse::<ToolName>().unwrap(), ToolName::ExploreLinks);
    }

    #[test]
    fn unknown_name_lists_allowed_tools() {
        let err = "nonexistent".parse::<ToolName>().unwrap_err();
        match err {
            ToolError::UnknownTool { name, allowed } => {
                assert_eq!(name, "nonexistent");
                assert_eq!(allowed.len(), 7);
            }
        }
    }
}
