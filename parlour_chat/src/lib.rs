//! The parlour chat core.
//!
//! [`ChatServer`] owns the room registry, the persistent ban list and the
//! per-identity rate limits. The transport hands it one [`Terminal`] per
//! client via [`ChatServer::handle_connection`]; from there the client is
//! checked against bans and join limits, shown the default room's backlog,
//! asked for a name, and then served by its [`Session`]'s read loop until it
//! disconnects.
//!
//! Every message is rendered separately for each receiver, since mentions,
//! bells, time banners and wrapping all depend on who is reading.

pub mod utils;

mod errors;
pub use errors::*;

pub mod config;
pub use config::{AntispamConfig, ChatConfig};

pub mod identity;
pub use identity::Identity;

pub mod ban;
pub mod rate;
pub mod render;
pub use render::TerminalMarkdown;
pub mod echo;
pub mod names;
pub mod autocomplete;

mod terminal;
pub use terminal::Terminal;

mod room;
pub use room::*;

mod registry;
pub use registry::*;

mod session;
pub use session::*;

pub mod commands;
pub use commands::{BuiltinCommands, CommandDispatcher};

pub mod panic_guard;

mod server;
pub use server::*;
