use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("messages must contain at least one message")]
    EmptyMessages,
}
