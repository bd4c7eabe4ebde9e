use thiserror::Error;

pub type Result<T, E = JsonMapError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum JsonMapError {
    #[error("failed to parse {format} input: {message}")]
    Parse { format: String, message: String },
    #[error("cannot convert from {source_format} to {target_format}: {message}")]
    Conversion {
        source_format: String,
        target_format: String,
        message: String,
    },
    #[error("invalid query '{expression}': {message}")]
    Query { expression: String, message: String },
    #[error("schema error: {0}")]
    Schema(String),
    #[error("invalid graph structure: {0}")]
    InvalidGraphStructure(String),
    #[error("unsupported {kind} '{value}'")]
    Unsupported { kind: &'static str, value: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to render output: {0}")]
    Render(#[from] std::fmt::Error),
}

impl JsonMapError {
    pub fn parse(format: impl ToString, message: impl ToString) -> Self {
        JsonMapError::Parse {
            format: format.to_string(),
            message: message.to_string(),
        }
    }

    pub fn query(expression: &str, message: impl ToString) -> Self {
        JsonMapError::Query {
            expression: expression.to_string(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            JsonMapError::Parse { .. } => "parse",
            JsonMapError::Conversion { .. } => "conversion",
            JsonMapError::Query { .. } => "query",
            JsonMapError::Schema(_) => "schema",
            JsonMapError::InvalidGraphStructure(_) => "invalid_graph_structure",
            JsonMapError::Unsupported { .. } => "unsupported",
            JsonMapError::Io(_) => "io",
            JsonMapError::Transport(_) => "transport",
            JsonMapError::Render(_) => "render",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_names_the_expression() {
        let err = JsonMapError::query(".foo[", "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "invalid query '.foo[': unexpected end of input"
        );
        assert_eq!(err.kind(), "query");
    }

    #[test]
    fn parse_error_mentions_format() {
        let err = JsonMapError::parse("yaml", "bad indentation");
        assert!(err.to_string().contains("yaml"));
        assert!(err.to_string().contains("bad indentation"));
    }
}
