use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnsealError {
    #[error("Sealed blob malformed: {0}")]
    Malformed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Authentication tag mismatch (wrong key or corrupted blob)")]
    TagMismatch,

    #[error("Seal operation failed")]
    SealFailed,
}
