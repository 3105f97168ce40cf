use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;

/// An error that might occur on a single connection.
#[derive(Error,Debug,Clone,PartialEq,Eq)]
pub enum ConnectionError
{
    #[error("Connection closed")]
    Closed,
    #[error("I/O Error: {0}")]
    IoError(String),
    #[error("Send queue full")]
    SendQueueFull,
}

/// An error that might occur when configuring a listener.
#[derive(Error,Debug)]
pub enum ListenerError
{
    #[error("Could not bind {0}: {1}")]
    BindError(String, std::io::Error),
    #[error("I/O Error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<std::io::Error> for ConnectionError
{
    fn from(e: std::io::Error) -> Self
    {
        Self::IoError(e.to_string())
    }
}

impl<T> From<TrySendError<T>> for ConnectionError
{
    fn from(e: TrySendError<T>) -> Self
    {
        match e
        {
            TrySendError::Full(_) => Self::SendQueueFull,
            TrySendError::Closed(_) => Self::Closed
        }
    }
}
