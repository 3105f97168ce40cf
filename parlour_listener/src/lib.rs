//! The client transport for parlour.
//!
//! This crate owns every TCP connection made to the chat server. Each accepted
//! stream is served by its own task, which frames input into lines, detects
//! bracketed pastes and in-band window size reports, and writes queued output
//! back to the client. The chat core only ever sees a [`Connection`], which
//! provides the line-oriented terminal contract the core drives.

pub mod id;
pub use id::*;

pub mod error;
pub use error::*;

mod window;
pub use window::WindowSize;

mod connection;
pub use connection::*;

mod listener;
pub use listener::*;

mod internal
{
    pub mod input;
    pub use input::*;
    pub mod connection_task;
    pub use connection_task::*;
}
