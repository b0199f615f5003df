use append_blob_writer::{ConfigError, WriterError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
}
