pub type CoverkitResult<T> = Result<T, CoverkitError>;

#[derive(thiserror::Error, Debug)]
pub enum CoverkitError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoverkitError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        Self::OutOfBounds(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CoverkitError::decode("x")
                .to_string()
                .contains("decode error:")
        );
        assert!(
            CoverkitError::out_of_bounds("x")
                .to_string()
                .contains("out of bounds:")
        );
        assert!(
            CoverkitError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CoverkitError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
