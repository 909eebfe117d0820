#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {message}")]
    Internal { message: String },
}
