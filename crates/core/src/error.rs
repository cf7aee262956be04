use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist. This is the only variant callers are
    /// expected to match on.
    #[error("path does not exist: {path}")]
    NotExist { path: String },

    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to list {prefix}: {source}")]
    List {
        prefix: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{context}: {source}")]
    Transfer {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{key} is not under {base}")]
    Path { key: String, base: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl StorageError {
    pub fn is_not_exist(&self) -> bool {
        matches!(self, StorageError::NotExist { .. })
    }

    pub(crate) fn transfer(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        StorageError::Transfer {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Adds the operation that drove a bulk call to a transfer failure. Other
    /// variants already name the path involved and pass through unchanged.
    pub(crate) fn within(self, context: impl Into<String>) -> Self {
        match self {
            err @ StorageError::Transfer { .. } => StorageError::Transfer {
                context: context.into(),
                source: anyhow::Error::new(err),
            },
            other => other,
        }
    }
}
