mod or_log;
pub use or_log::OrLog;

mod ansi;
pub use ansi::*;

mod time_utils;
pub use time_utils::*;
