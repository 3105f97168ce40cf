//! Turning submitted lines into actions.

use crate::render::{Direction, Envelope};
use crate::session::Session;
use crate::utils::OrLog;

use async_trait::async_trait;
use chrono_tz::Tz;
use itertools::Itertools;

use std::sync::Arc;

const HELP: &str = "Commands:
   =<user> <msg>   send a private message
   cd #<room>      change room (created if needed)
   cd <user>       send everything you type to <user> privately
   cd              leave private chat, or return to the main room
   nick <name>     change your name
   bell on|off|all ring on mentions, never, or on every message
   tz <zone> [24h] show times in a zone, e.g. `tz Europe/London 24h`
   users           list people in this room
   rooms           list rooms
   clear           clear the screen
   exit            leave
Use `\\\\n` for a newline, `@name` to mention someone, and markdown for style.";

/// Handles every non-empty line a session submits.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, session: &Arc<Session>, line: &str);
}

/// The standard command set. Anything that isn't a command is chat.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCommands;

#[async_trait]
impl CommandDispatcher for BuiltinCommands {
    async fn dispatch(&self, session: &Arc<Session>, line: &str) {
        if let Some(rest) = line.strip_prefix('=') {
            direct_message(session, rest);
            return;
        }

        let (command, args) = match line.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (line, ""),
        };

        match (command, args.is_empty()) {
            ("exit", true) => session.close(format!("{} has left the chat", session.name())),
            ("users", true) => users(session),
            ("rooms", true) => rooms(session),
            ("clear", true) => session.clear_screen(),
            ("help", true) => session.notify(HELP),
            ("cd", _) => change_directory(session, args).await,
            ("nick", _) => rename(session, args).await,
            ("bell", _) => bell(session, args),
            ("tz", _) => timezone(session, args),
            _ => say(session, line),
        }
    }
}

/// Plain chat: to the direct-message partner if there is one, otherwise the room.
fn say(session: &Arc<Session>, text: &str) {
    match session.messaging() {
        Some(target) => send_direct(session, &target, text),
        None => session.room().broadcast(Some(&session.name()), text),
    }
}

fn send_direct(session: &Session, target: &Session, text: &str) {
    let sender = session.name();
    let recipient = target.name();

    if let Err(e) = target.deliver(&Envelope::direct(&sender, Direction::Incoming, text)) {
        target.close(format!("{} has left the chat due to an error: {}", recipient, e));
        session.notify(format!("Couldn't reach {}", recipient));
        return;
    }
    session
        .deliver(&Envelope::direct(&recipient, Direction::Outgoing, text))
        .or_warn(format_args!("Writing to {}", session.id()));
}

fn direct_message(session: &Arc<Session>, rest: &str) {
    let (target_name, text) = match rest.split_once(char::is_whitespace) {
        Some((name, text)) if !text.trim().is_empty() => (name, text.trim()),
        _ => {
            session.notify("Usage: =<user> <message>");
            return;
        }
    };

    match session.room().find_member(target_name) {
        Some(target) if Arc::ptr_eq(&target, session) => session.notify("You can't message yourself"),
        Some(target) => send_direct(session, &target, text),
        None => session.notify("User not found"),
    }
}

async fn change_directory(session: &Arc<Session>, args: &str) {
    let target = args.split_whitespace().next().unwrap_or("");

    if target.is_empty() {
        if let Some(partner) = session.messaging() {
            session.set_messaging(None);
            session.notify(format!("Left private chat with {}", partner.name()));
            return;
        }
        let default_room = session.server().config().default_room.clone();
        session
            .change_room(&default_room)
            .await
            .or_warn(format_args!("Changing room for {}", session.id()));
        return;
    }

    if target.starts_with('#') {
        if target.len() == 1 {
            session.notify("Room names need at least one character after the #");
            return;
        }
        session.set_messaging(None);
        session
            .change_room(target)
            .await
            .or_warn(format_args!("Changing room for {}", session.id()));
        return;
    }

    match session.room().find_member(target) {
        Some(partner) if Arc::ptr_eq(&partner, session) => session.notify("You can't message yourself"),
        Some(partner) => {
            session.set_messaging(Some(&partner));
            session.notify(format!(
                "Now in private chat with {}. Type `cd` to leave.",
                partner.name()
            ));
        }
        None => session.notify("User not found"),
    }
}

async fn rename(session: &Arc<Session>, args: &str) {
    if args.is_empty() {
        session.notify("Usage: nick <name>");
        return;
    }
    session
        .pick_name(args)
        .await
        .or_warn(format_args!("Renaming {}", session.id()));
}

fn bell(session: &Session, args: &str) {
    let setting = match args {
        "on" => Some((true, false)),
        "off" => Some((false, false)),
        "all" => Some((true, true)),
        "" => None,
        _ => {
            session.notify("Usage: bell on|off|all");
            return;
        }
    };

    match setting {
        Some((bell, ping_everytime)) => {
            session.update_prefs(|prefs| {
                prefs.bell = bell;
                prefs.ping_everytime = ping_everytime;
            });
            session.notify(format!("Bell is now {}", args));
        }
        None => {
            let prefs = session.prefs();
            let state = match (prefs.bell, prefs.ping_everytime) {
                (false, _) => "off",
                (true, false) => "on",
                (true, true) => "all",
            };
            session.notify(format!("Bell is {}", state));
        }
    }
}

fn timezone(session: &Session, args: &str) {
    let mut words = args.split_whitespace();
    let Some(zone) = words.next() else {
        session.update_prefs(|prefs| prefs.timezone = None);
        session.notify("Times are now shown relative to when you joined");
        return;
    };
    let time_24h = words.next() == Some("24h");

    match zone.parse::<Tz>() {
        Ok(tz) => {
            session.update_prefs(|prefs| {
                prefs.timezone = Some(tz);
                prefs.time_24h = time_24h;
            });
            session.notify(format!("Times are now shown in {}", tz.name()));
        }
        Err(_) => session.notify(format!("Unknown time zone `{}`", zone)),
    }
}

fn users(session: &Session) {
    let room = session.room();
    let members = room.members();
    session.notify(format!(
        "{} in {}: {}",
        members.len(),
        room.name(),
        members.iter().map(|m| m.name()).join(", ")
    ));
}

fn rooms(session: &Session) {
    let listing = session
        .server()
        .rooms()
        .rooms()
        .iter()
        .map(|room| format!("{}: {}", room.name(), room.member_count()))
        .join("  \n");
    session.notify(format!("Rooms and users:  \n{}", listing));
}
