//! A connected participant and its read loop.

use crate::echo;
use crate::errors::{ChatError, ChatResult};
use crate::identity::Identity;
use crate::names::{clean_name, contains_denied_word, is_reserved};
use crate::rate::MessageVerdict;
use crate::registry::NameTaken;
use crate::render::{colors, colors::NameStyle, Envelope, Preferences, ReceiverView};
use crate::room::Room;
use crate::server::ChatServer;
use crate::terminal::Terminal;
use crate::utils::{pretty_duration, right_align, OrLog};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use parlour_listener::{ConnectionError, Input, WindowSize};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

const VALENTINE_HEART: &str = "![❤️](https://emojipedia-us.s3.dualstack.us-west-1.amazonaws.com/thumbs/160/apple/81/heavy-black-heart_2764.png)";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

struct SessionState {
    name: String,
    plain_name: String,
    style: NameStyle,
    room: Arc<Room>,
    messaging: Option<Weak<Session>>,
    prefs: Preferences,
    last_timestamp: DateTime<Utc>,
}

/// One connected participant.
///
/// Lock order, outermost first: `membership`, then the room registry, then a
/// room's member list, then `state`. Nothing is held across an await.
pub struct Session {
    id: SessionId,
    server: Arc<ChatServer>,
    terminal: Arc<dyn Terminal>,
    identity: Identity,
    login_name: String,
    join_time: DateTime<Utc>,
    state: Mutex<SessionState>,
    viewport: RwLock<WindowSize>,
    membership: Mutex<()>,
    closed: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.plain_name())
            .field("fingerprint", &self.identity.fingerprint)
            .finish()
    }
}

/// A fully read submission: one line, or a bracketed paste.
struct Submission {
    text: String,
    pasted: bool,
}

impl Session {
    pub(crate) fn new(
        server: Arc<ChatServer>,
        terminal: Arc<dyn Terminal>,
        identity: Identity,
        login_name: String,
    ) -> Arc<Self> {
        let now = Utc::now();
        let room = Arc::clone(server.rooms().default_room());
        Arc::new(Self {
            id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
            server,
            terminal,
            identity,
            login_name,
            join_time: now,
            state: Mutex::new(SessionState {
                name: String::new(),
                plain_name: String::new(),
                style: NameStyle::plain(colors::WHITE),
                room,
                messaging: None,
                prefs: Preferences::default(),
                last_timestamp: now,
            }),
            viewport: RwLock::new(WindowSize::default()),
            membership: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    pub fn join_time(&self) -> DateTime<Utc> {
        self.join_time
    }

    pub fn server(&self) -> &Arc<ChatServer> {
        &self.server
    }

    pub(crate) fn terminal(&self) -> &Arc<dyn Terminal> {
        &self.terminal
    }

    /// The styled display name.
    pub fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    pub fn plain_name(&self) -> String {
        self.state.lock().plain_name.clone()
    }

    pub fn style(&self) -> NameStyle {
        self.state.lock().style
    }

    pub fn room(&self) -> Arc<Room> {
        Arc::clone(&self.state.lock().room)
    }

    pub fn prefs(&self) -> Preferences {
        self.state.lock().prefs.clone()
    }

    pub fn update_prefs(&self, f: impl FnOnce(&mut Preferences)) {
        f(&mut self.state.lock().prefs)
    }

    /// The session plain messages currently go to, if in direct-message mode
    /// and that session is still connected.
    pub fn messaging(&self) -> Option<Arc<Session>> {
        let mut state = self.state.lock();
        let target = state.messaging.as_ref().and_then(Weak::upgrade);
        match target {
            Some(target) if !target.is_closed() => Some(target),
            _ => {
                state.messaging = None;
                None
            }
        }
    }

    pub fn set_messaging(&self, target: Option<&Arc<Session>>) {
        self.state.lock().messaging = target.map(Arc::downgrade);
    }

    pub fn viewport(&self) -> WindowSize {
        *self.viewport.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Render `envelope` for this session and write it as a single chunk.
    pub fn deliver(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Ok(());
        }

        let now = Utc::now();
        let width = self.viewport.read().width;
        let rendered = {
            let mut state = self.state.lock();
            let view = ReceiverView {
                name: &state.name,
                prefs: &state.prefs,
                width,
                join_time: self.join_time,
                last_timestamp: state.last_timestamp,
            };
            let rendered = self.server.renderer().render(envelope, &view, now);
            if rendered.timestamp_shown {
                state.last_timestamp = now;
            }
            rendered
        };
        self.terminal.write(rendered.output)
    }

    /// Unlabelled output meant for this session only.
    pub fn notify(&self, text: impl Into<String>) {
        self.deliver(&Envelope::system(text))
            .or_warn(format_args!("Writing to {}", self.id));
    }

    /// Output from the system user, meant for this session only.
    pub fn notify_from_system(&self, text: impl Into<String>) {
        self.deliver(&Envelope::broadcast(Some(self.server.system_name()), text))
            .or_warn(format_args!("Writing to {}", self.id));
    }

    /// A line aligned to the right edge of the terminal, outside the message flow.
    pub fn write_right(&self, text: &str) {
        let width = self.viewport.read().width;
        self.terminal
            .write(format!("{}\n", right_align(text, width)))
            .or_warn(format_args!("Writing to {}", self.id));
    }

    pub fn clear_screen(&self) {
        self.terminal
            .write(CLEAR_SCREEN.to_owned())
            .or_warn(format_args!("Writing to {}", self.id));
    }

    /// Leave the room, closing the connection and announcing `notice` to the
    /// room that was left. Only the first close of a session has any effect.
    pub fn close(&self, notice: String) {
        self.close_with(Some(notice));
    }

    /// As [`close`](Session::close), without any announcement.
    pub fn close_quietly(&self) {
        self.close_with(None);
    }

    fn close_with(&self, notice: Option<String>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let room = {
            let _membership = self.membership.lock();
            let room = self.room();
            room.remove_member(self);
            room
        };
        self.terminal.close();

        tracing::info!(session = %self.id, name = %self.plain_name(), fingerprint = %self.identity.fingerprint, "Session closed");

        if let Some(mut notice) = notice {
            let online = Utc::now() - self.join_time;
            if online > Duration::seconds(30) {
                notice.push_str(". They were online for ");
                notice.push_str(&pretty_duration(online));
            }
            room.broadcast(Some(self.server.system_name()), &notice);
        }
        self.server.rooms().cleanup(&room);
    }

    /// Keep the cached viewport in step with the terminal's size reports.
    pub(crate) fn watch_window(self: &Arc<Self>) {
        let mut sizes = self.terminal.window_size();
        *self.viewport.write() = *sizes.borrow();

        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            while sizes.changed().await.is_ok() {
                let size = *sizes.borrow();
                match session.upgrade() {
                    Some(session) if !session.is_closed() => *session.viewport.write() = size,
                    _ => break,
                }
            }
        });
    }

    /// A heart shown around Valentine's day, cleared after a second.
    pub fn seasonal_greeting(self: &Arc<Self>, today: NaiveDate) {
        if today.month() != 2 || !(13..=15).contains(&today.day()) {
            return;
        }
        self.notify(VALENTINE_HEART);

        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            if let Some(session) = session.upgrade() {
                if !session.is_closed() {
                    session.clear_screen();
                }
            }
        });
    }

    fn set_name(&self, plain: String) {
        let style = NameStyle::random(&mut rand::thread_rng());
        let styled = style.paint(&plain);
        {
            let mut state = self.state.lock();
            state.name = styled.clone();
            state.plain_name = plain;
            state.style = style;
        }
        self.terminal.set_prompt(&format!("{}: ", styled));
    }

    /// Recolour the current name.
    pub fn set_style(&self, style: NameStyle) {
        let styled = {
            let mut state = self.state.lock();
            state.style = style;
            state.name = style.paint(&state.plain_name);
            state.name.clone()
        };
        self.terminal.set_prompt(&format!("{}: ", styled));
    }

    /// Settle on a usable name starting from `requested`, prompting until one
    /// is acceptable. Names are checked against `room`'s other members.
    async fn choose_name(&self, requested: &str, room: Option<&Room>) -> ChatResult<String> {
        let config = self.server.config();
        let mut candidate = clean_name(requested);

        loop {
            let problem = if candidate.is_empty() {
                Some("Pick a username:")
            } else if is_reserved(&candidate, &config.system_name) {
                Some("Your username is invalid. Pick a different one:")
            } else if room
                .and_then(|r| r.find_member(&candidate))
                .map_or(false, |other| !std::ptr::eq(Arc::as_ptr(&other), self))
            {
                Some("Your username is already in use. Pick a different one:")
            } else {
                None
            };

            let Some(problem) = problem else { break };
            self.notify(problem);
            self.terminal.set_prompt("> ");

            candidate = match self.terminal.read_line().await? {
                Input::Line(line) | Input::PasteLine(line) => clean_name(&line),
                Input::Eof => return Err(ChatError::Disconnected),
            };
        }

        if contains_denied_word(&candidate, &config.denied_name_words) {
            tracing::info!(session = %self.id, name = %candidate, "Denied username");
            self.ban_quietly();
            return Err(ChatError::DeniedName(candidate));
        }
        Ok(candidate)
    }

    /// Choose a name without announcing it, checking for clashes in the room
    /// the session is about to join.
    pub async fn pick_name_quietly(&self, requested: &str, room: &Room) -> ChatResult<()> {
        let name = self.choose_name(requested, Some(room)).await?;
        self.set_name(name);
        Ok(())
    }

    /// Change name, announcing the change to the current room.
    pub async fn pick_name(&self, requested: &str) -> ChatResult<()> {
        let old_name = self.name();
        let old_plain = self.plain_name();
        let room = self.room();

        let name = self.choose_name(requested, Some(&room)).await?;
        if name == old_plain {
            return Ok(());
        }
        self.set_name(name);
        room.broadcast(
            Some(self.server.system_name()),
            &format!("{} is now called {}", old_name, self.name()),
        );
        Ok(())
    }

    /// Join `target`, re-picking the name until it is unique there.
    pub(crate) async fn enter_room(self: &Arc<Self>, target: &str) -> ChatResult<Arc<Room>> {
        let rooms = self.server.rooms();
        loop {
            let joined = {
                let _membership = self.membership.lock();
                if self.is_closed() {
                    return Err(ChatError::SessionClosed);
                }
                let joined = rooms.join(target, self);
                if let Ok(room) = &joined {
                    self.state.lock().room = Arc::clone(room);
                }
                joined
            };

            match joined {
                Ok(room) => return Ok(room),
                Err(NameTaken) => {
                    let existing = rooms.get(target);
                    let name = self.choose_name(&self.plain_name(), existing.as_deref()).await?;
                    self.set_name(name);
                }
            }
        }
    }

    /// Move to the room called `target`, telling the old room and the new one.
    pub async fn change_room(self: &Arc<Self>, target: &str) -> ChatResult<()> {
        let current = self.room();
        if current.name() == target && current.contains(self) {
            return Ok(());
        }

        let name = self.name();
        {
            let _membership = self.membership.lock();
            if self.is_closed() {
                return Err(ChatError::SessionClosed);
            }
            current.remove_member(self);
        }
        current.broadcast(None, &format!("{} is joining {}", name, colors::blue(target)));
        self.server.rooms().cleanup(&current);

        let room = self.enter_room(target).await?;
        tracing::debug!(session = %self.id, room = %room.name(), "Changed room");
        room.broadcast(
            Some(self.server.system_name()),
            &format!("{} has joined {}", self.name(), colors::blue(room.name())),
        );
        Ok(())
    }

    fn ban_quietly(&self) {
        let bans = self.server.bans();
        if bans.add_if_absent(&self.identity) {
            bans.save().or_log("Saving ban list");
        }
        self.close_quietly();
    }

    fn ban_for_spam(&self) {
        tracing::info!(session = %self.id, fingerprint = %self.identity.fingerprint, "Banning for spam");
        let bans = self.server.bans();
        if bans.add_if_absent(&self.identity) {
            bans.save().or_log("Saving ban list");
        }
        self.notify_from_system("anti-spam triggered");
        self.close(colors::red(&format!("{} has been banned for spamming", self.name())));
    }

    /// Read one submission. A bracketed paste is gathered into a single
    /// submission; `\n` typed inside the continuation lines is escaped so it
    /// stays literal. `None` means the client went away.
    async fn read_submission(&self) -> Result<Option<Submission>, ConnectionError> {
        let mut text = String::new();
        let mut pasted = false;

        let mut input = self.terminal.read_line().await?;
        loop {
            match input {
                Input::Eof => return Ok(None),
                Input::Line(line) => {
                    if pasted {
                        text.push_str(&line.replace("\\n", "\\\\n"));
                    } else {
                        text.push_str(&line);
                    }
                    text.push('\n');
                    break;
                }
                Input::PasteLine(line) => {
                    if pasted {
                        text.push_str(&line.replace("\\n", "\\\\n"));
                    } else {
                        text.push_str(&line);
                    }
                    text.push('\n');
                    pasted = true;
                    self.terminal.set_prompt("");
                    input = self.terminal.read_line().await?;
                }
            }
        }

        Ok(Some(Submission { text, pasted }))
    }

    /// Apply the length limit, trim, and erase the client's echo of what was typed.
    fn accept_submission(&self, submission: Submission) -> String {
        let limit = self.server.config().max_message_length;
        let mut text = submission.text;
        if text.len() > limit {
            let mut end = limit;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        let text = text.trim().to_owned();

        let name = self.name();
        self.terminal.set_prompt(&format!("{}: ", name));

        let width = self.viewport.read().width;
        let rows = if submission.pasted {
            echo::pasted_rows(&format!("{}: {}", name, text), width)
        } else {
            echo::typed_rows(&name, &text, width)
        };
        self.terminal
            .write(echo::erase_rows(rows))
            .or_warn(format_args!("Writing to {}", self.id));

        text
    }

    /// Returns false once the session has been banned.
    fn check_spam(&self) -> bool {
        let verdict = self.server.rate().check_message(&self.identity.fingerprint);
        if verdict >= MessageVerdict::Warn {
            self.room().broadcast(
                Some(self.server.system_name()),
                &format!("{}, stop spamming or you could get banned.", self.name()),
            );
        }
        if verdict == MessageVerdict::Ban {
            self.ban_for_spam();
            return false;
        }
        true
    }

    /// Read and act on input until the session ends.
    pub async fn run(self: Arc<Self>) {
        while !self.is_closed() {
            let submission = match self.read_submission().await {
                Ok(Some(submission)) => submission,
                Ok(None) => {
                    self.close(format!("{} has left the chat", self.name()));
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        session = %self.id,
                        name = %self.plain_name(),
                        fingerprint = %self.identity.fingerprint,
                        error = %e,
                        "Read failed"
                    );
                    self.close(format!("{} has left the chat due to an error: {}", self.name(), e));
                    return;
                }
            };

            let line = self.accept_submission(submission);
            if line.is_empty() {
                continue;
            }
            if !self.check_spam() {
                return;
            }

            self.server.commands().dispatch(&self, &line).await;
        }
    }
}
