use parlour_listener::ConnectionError;
use thiserror::Error;

use crate::ban::BanStoreError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Ban store error: {0}")]
    BanStore(#[from] BanStoreError),
    #[error("Client disconnected")]
    Disconnected,
    #[error("Session already closed")]
    SessionClosed,
    #[error("Username {0:?} contains a denied word")]
    DeniedName(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
