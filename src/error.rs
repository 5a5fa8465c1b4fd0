pub type IsocapResult<T> = Result<T, IsocapError>;

#[derive(thiserror::Error, Debug)]
pub enum IsocapError {
    #[error("precondition error: {0}")]
    Precondition(String),

    #[error("scene error: {0}")]
    Scene(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IsocapError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn scene(msg: impl Into<String>) -> Self {
        Self::Scene(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            IsocapError::precondition("x")
                .to_string()
                .contains("precondition error:")
        );
        assert!(IsocapError::scene("x").to_string().contains("scene error:"));
        assert!(IsocapError::graph("x").to_string().contains("graph error:"));
        assert!(
            IsocapError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            IsocapError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = IsocapError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
