use crate::autocomplete;
use crate::ban::{BanEntry, BanStore};
use crate::commands::{BuiltinCommands, CommandDispatcher};
use crate::config::ChatConfig;
use crate::errors::ChatResult;
use crate::identity::Identity;
use crate::panic_guard::{self, PanicReport};
use crate::rate::{JoinVerdict, RateTracker};
use crate::registry::RoomRegistry;
use crate::render::{colors, Envelope, MarkdownRenderer, MessageRenderer, TerminalMarkdown};
use crate::room::{BacklogEntry, Room};
use crate::session::Session;
use crate::terminal::Terminal;
use crate::utils::{pretty_duration, OrLog};

use chrono::{DateTime, Duration, Utc};

use std::sync::{Arc, Weak};

/// Sent to every room when the server shuts down.
pub const FAREWELL: &str = "Server going down! This is probably because it is being updated. \
Try joining back immediately.  \nIf you still can't join, try joining back in 2 minutes.";

/// One line of backlog replay.
#[derive(Debug, PartialEq, Eq)]
enum ReplayLine<'a> {
    /// "<duration> earlier", drawn right-aligned.
    Marker(String),
    Entry(&'a BacklogEntry),
}

/// Interleave `backlog` with time markers: one before the first entry, and
/// one before any entry more than a minute after the previous marker.
fn replay_lines(backlog: &[BacklogEntry], join_time: DateTime<Utc>) -> Vec<ReplayLine<'_>> {
    let mut lines = Vec::with_capacity(backlog.len() + 1);
    let mut last_marker: Option<DateTime<Utc>> = None;

    for entry in backlog {
        let due = last_marker.map_or(true, |last| entry.timestamp - last > Duration::minutes(1));
        if due {
            last_marker = Some(entry.timestamp);
            lines.push(ReplayLine::Marker(format!(
                "{} earlier",
                pretty_duration(join_time - entry.timestamp)
            )));
        }
        lines.push(ReplayLine::Entry(entry));
    }
    lines
}

const MAINTENANCE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The farewell reached every room within the timeout.
    Clean,
    /// The farewell broadcast was abandoned.
    TimedOut,
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::TimedOut => 4,
        }
    }
}

/// The chat server: rooms, bans, rate limits and the session lifecycle.
pub struct ChatServer {
    config: ChatConfig,
    rooms: RoomRegistry,
    bans: BanStore,
    rate: RateTracker,
    renderer: MessageRenderer,
    commands: Arc<dyn CommandDispatcher>,
    system_name: String,
}

impl ChatServer {
    /// Create a server with the standard renderer and command set, loading
    /// the ban list from the configured file.
    pub fn new(config: ChatConfig) -> ChatResult<Arc<Self>> {
        Self::with_components(config, Arc::new(TerminalMarkdown), Arc::new(BuiltinCommands))
    }

    pub fn with_components(
        config: ChatConfig,
        markdown: Arc<dyn MarkdownRenderer>,
        commands: Arc<dyn CommandDispatcher>,
    ) -> ChatResult<Arc<Self>> {
        panic_guard::install_hook();

        let bans = BanStore::load(&config.ban_file)?;
        bans.check_writable()?;
        tracing::info!(path = %config.ban_file.display(), count = bans.len(), "Ban list loaded");

        Ok(Arc::new(Self {
            rooms: RoomRegistry::new(&config.default_room, config.scrollback),
            rate: RateTracker::new(config.antispam.clone()),
            renderer: MessageRenderer::new(markdown),
            system_name: colors::green(&config.system_name),
            commands,
            bans,
            config,
        }))
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn bans(&self) -> &BanStore {
        &self.bans
    }

    pub fn rate(&self) -> &RateTracker {
        &self.rate
    }

    pub fn renderer(&self) -> &MessageRenderer {
        &self.renderer
    }

    pub fn commands(&self) -> &dyn CommandDispatcher {
        &*self.commands
    }

    /// The styled name system notices are sent under.
    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    /// Send `text` to every room.
    pub fn universe_broadcast(&self, sender: Option<&str>, text: &str) {
        self.rooms.universe_broadcast(sender, text);
    }

    /// Periodically drop decayed rate counters. The task ends when the
    /// server is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>) {
        let server: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                interval.tick().await;
                match server.upgrade() {
                    Some(server) => server.rate.purge_idle(),
                    None => break,
                }
            }
        });
    }

    /// Serve one client from connection to disconnect.
    ///
    /// A panic while serving the client is contained: it is reported to the
    /// default room and the session is closed quietly.
    pub async fn handle_connection(self: &Arc<Self>, terminal: Arc<dyn Terminal>) {
        let identity = Identity::new(terminal.remote_addr(), terminal.public_key().as_deref());
        let login_name = terminal.login_name().unwrap_or_default();
        let session = Session::new(Arc::clone(self), Arc::clone(&terminal), identity, login_name);
        session.watch_window();

        match panic_guard::guard(self.admit(&session)).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(report) => {
                self.report_panic(&session, &report);
                return;
            }
        }

        if let Err(report) = panic_guard::guard(Arc::clone(&session).run()).await {
            self.report_panic(&session, &report);
        }
    }

    fn report_panic(&self, session: &Session, report: &PanicReport) {
        tracing::error!(session = %session.id(), message = %report.message, "Recovered from panic");
        session.close_quietly();

        let mut text = format!(
            "The server almost crashed while serving {}. Please tell the operator: {}",
            session.name(),
            report.message
        );
        if let Some(backtrace) = &report.backtrace {
            text.push_str(&format!("\n```\n{}\n```", backtrace));
        }
        self.rooms.default_room().broadcast(Some(&self.system_name), &text);
    }

    /// Run the join sequence. Returns false if the client was turned away or
    /// left before choosing a name.
    async fn admit(self: &Arc<Self>, session: &Arc<Session>) -> bool {
        let identity = session.identity();
        tracing::info!(
            session = %session.id(),
            address = %identity.address,
            fingerprint = %identity.fingerprint,
            "Connected"
        );

        if self.bans.contains(identity) {
            tracing::info!(session = %session.id(), address = %identity.address, "Rejected banned client");
            session.notify_from_system(format!(
                "**You are banned**. If you feel this was a mistake, please reach out to the \
                 server operator. Please include the following information: [ID {}]",
                identity.fingerprint
            ));
            session.close_quietly();
            return false;
        }

        if self.rate.check_join(&identity.fingerprint) == JoinVerdict::LimitExceeded {
            tracing::info!(session = %session.id(), address = %identity.address, "Join rate exceeded");
            self.bans.add(BanEntry::from(identity));
            self.bans.save().or_log("Saving ban list");
            self.rooms.default_room().broadcast(
                Some(&self.system_name),
                &format!(
                    "`{}` has been banned automatically. ID: {}",
                    session.login_name(),
                    identity.fingerprint
                ),
            );
            session.close_quietly();
            return false;
        }

        session.clear_screen();
        session.seasonal_greeting(Utc::now().date_naive());
        self.replay_backlog(session);

        let default_room = Arc::clone(self.rooms.default_room());
        if let Err(e) = session.pick_name_quietly(session.login_name(), &default_room).await {
            tracing::info!(session = %session.id(), error = %e, "Left before joining");
            session.close_quietly();
            return false;
        }

        let room = match session.enter_room(default_room.name()).await {
            Ok(room) => room,
            Err(e) => {
                tracing::info!(session = %session.id(), error = %e, "Left before joining");
                session.close_quietly();
                return false;
            }
        };

        self.install_autocomplete(session);
        session
            .terminal()
            .set_bracketed_paste(true)
            .or_warn(format_args!("Enabling bracketed paste for {}", session.id()));

        tracing::info!(session = %session.id(), name = %session.plain_name(), "Joined");
        self.welcome(session, &room);
        room.broadcast(
            Some(&self.system_name),
            &format!("{} has joined the chat", session.name()),
        );
        true
    }

    /// Replay the default room's backlog with its time markers.
    fn replay_backlog(&self, session: &Session) {
        let backlog = self.rooms.default_room().backlog();
        for line in replay_lines(&backlog, session.join_time()) {
            match line {
                ReplayLine::Marker(marker) => session.write_right(&marker),
                ReplayLine::Entry(entry) => session
                    .deliver(&Envelope::broadcast(entry.sender.as_deref(), entry.text.as_str()))
                    .or_warn(format_args!("Replaying backlog to {}", session.id())),
            }
        }
    }

    fn install_autocomplete(&self, session: &Arc<Session>) {
        let weak = Arc::downgrade(session);
        session.terminal().set_autocomplete(Box::new(move |line, pos| {
            let session = weak.upgrade()?;
            let members = session.room().member_names();
            let rooms = session.server().rooms().room_names();
            autocomplete::complete(line, pos, &members, &rooms)
        }));
    }

    fn welcome(&self, session: &Session, room: &Room) {
        let text = match room.member_count().saturating_sub(1) {
            0 => colors::blue("Welcome to the chat. There are no more users"),
            1 => colors::yellow("Welcome to the chat. There is one more user"),
            n => colors::green(&format!("Welcome to the chat. There are {} more users", n)),
        };
        session.notify(text);
    }

    /// Disconnect every session.
    pub fn disconnect_all(&self) {
        for room in self.rooms.rooms() {
            for member in room.members() {
                member.close_quietly();
            }
        }
    }

    /// Persist the ban list and say goodbye to every room, giving up on the
    /// farewell if it takes longer than the configured timeout.
    pub async fn shutdown(self: &Arc<Self>) -> ShutdownOutcome {
        tracing::info!("Shutting down");
        self.bans.save().or_log("Saving ban list");

        let server = Arc::clone(self);
        let farewell = tokio::task::spawn_blocking(move || {
            server.universe_broadcast(Some(&server.system_name), FAREWELL);
        });

        match tokio::time::timeout(self.config.shutdown_timeout(), farewell).await {
            Ok(_) => {
                self.disconnect_all();
                ShutdownOutcome::Clean
            }
            Err(_) => {
                tracing::warn!("Farewell broadcast took too long, exiting early");
                ShutdownOutcome::TimedOut
            }
        }
    }
}
