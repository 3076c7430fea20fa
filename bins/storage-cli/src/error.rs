use storage_core::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(String),

    #[error("argument {arg}: {detail}")]
    Argument { arg: &'static str, detail: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {detail}")]
    Input { path: String, line: usize, detail: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Storage(#[from] StorageError),
}
