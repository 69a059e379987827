use thiserror::Error;

/// Errors raised by the pure request validators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Word cannot be empty")]
    EmptyWord,
    #[error("Word too long (max 200 characters)")]
    WordTooLong,
    #[error("Description cannot be empty")]
    EmptyDescription,
    #[error("Text cannot be empty")]
    EmptyText,
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),
    #[error("Comment body cannot be empty")]
    EmptyComment,
    #[error("Comment body too long (max 2000 characters)")]
    CommentTooLong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(ValidationError::EmptyWord.to_string(), "Word cannot be empty");
        assert_eq!(
            ValidationError::InvalidLanguage("english".to_string()).to_string(),
            "Invalid language code: english"
        );
    }
}
