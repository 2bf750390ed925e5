use thiserror::Error;

/// Everything that can go wrong while resolving a token.
///
/// None of these escape `TextFilter::filter`; they are turned into literal
/// passthrough or an inline localized marker at the token's position.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("parse error: {0}")]
    Parse(String),

    /// A store failed while fetching a value.
    #[error("data access failure: {0}")]
    DataAccess(String),

    #[error("no instance for context `{0}`")]
    MissingInstance(String),

    #[error("unknown metadata context `{0}`")]
    UnknownContext(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<crate::parser::ParseError> for FilterError {
    fn from(e: crate::parser::ParseError) -> Self {
        FilterError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
