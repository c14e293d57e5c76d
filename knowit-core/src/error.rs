use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnowItError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Knowledge error: {0}")]
    Knowledge(String),

    #[error("Speech backend error: {0}")]
    Speech(String),
}
