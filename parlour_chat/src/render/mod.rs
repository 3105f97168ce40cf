//! Everything involved in turning chat text into terminal output.

pub mod colors;

mod markdown;
pub use markdown::*;

mod message;
pub use message::*;
