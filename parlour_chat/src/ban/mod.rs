//! Persistent ban list.

mod store;
pub use store::*;
