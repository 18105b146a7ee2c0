use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cadastral number must contain 13 or 14 digits")]
    CadastralNumber,

    #[error("Invalid email format: {0}")]
    Email(String),

    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("Passwords do not match")]
    PasswordMismatch,
}

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Failed to sign token: {0}")]
    Encode(String),

    #[error("Token is invalid: {0}")]
    Invalid(String),

    #[error("Token has expired")]
    Expired,

    #[error("Wrong token kind")]
    WrongKind,
}
