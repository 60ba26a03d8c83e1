/// Model used when `initialize` does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound on tool-result continuations within one turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub default_model: String,
    pub max_tool_rounds: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}
