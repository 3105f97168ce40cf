use super::markdown::MarkdownRenderer;
use crate::utils::{pretty_duration, right_align, visible_len};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use std::sync::Arc;

const BELL: char = '\x07';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The receiver is the recipient; the label names the sender.
    Incoming,
    /// The receiver sent the message; the label names the recipient.
    Outgoing,
}

/// How a message reached its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Broadcast,
    Direct(Direction),
}

/// A message on its way to one receiver, before per-receiver rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Styled name of the sender, or for direct messages the styled name of
    /// the other party. `None` for unlabelled system output.
    pub peer: Option<String>,
    pub delivery: Delivery,
    pub text: String,
}

impl Envelope {
    pub fn broadcast(sender: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            peer: sender.map(str::to_owned),
            delivery: Delivery::Broadcast,
            text: text.into(),
        }
    }

    pub fn direct(peer: &str, direction: Direction, text: impl Into<String>) -> Self {
        Self {
            peer: Some(peer.to_owned()),
            delivery: Delivery::Direct(direction),
            text: text.into(),
        }
    }

    /// Unlabelled output, such as command responses.
    pub fn system(text: impl Into<String>) -> Self {
        Self::broadcast(None, text)
    }

    fn label(&self) -> Option<String> {
        let peer = self.peer.as_deref()?;
        Some(match self.delivery {
            Delivery::Broadcast => format!("{}: ", peer),
            Delivery::Direct(Direction::Incoming) => format!("{} -> ", peer),
            Delivery::Direct(Direction::Outgoing) => format!("{} <- ", peer),
        })
    }

    fn is_from(&self, receiver_name: &str) -> bool {
        match self.delivery {
            Delivery::Broadcast => self.peer.as_deref() == Some(receiver_name),
            Delivery::Direct(Direction::Outgoing) => true,
            Delivery::Direct(Direction::Incoming) => false,
        }
    }
}

/// Per-session display preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Whether bell characters reach the terminal at all.
    pub bell: bool,
    /// Ring the bell for every message not sent by this session.
    pub ping_everytime: bool,
    /// Show timestamps in this zone instead of elapsed time since joining.
    pub timezone: Option<Tz>,
    pub time_24h: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            bell: true,
            ping_everytime: false,
            timezone: None,
            time_24h: false,
        }
    }
}

/// Everything about the receiver that affects how a message is drawn.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverView<'a> {
    /// Styled name, as substituted into mentions.
    pub name: &'a str,
    pub prefs: &'a Preferences,
    pub width: usize,
    pub join_time: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Text to write, including the trailing newline.
    pub output: String,
    /// Set when a time banner was emitted; the receiver's last timestamp
    /// should then be moved to the render time.
    pub timestamp_shown: bool,
}

/// Turns envelopes into terminal output for a specific receiver.
#[derive(Clone)]
pub struct MessageRenderer {
    markdown: Arc<dyn MarkdownRenderer>,
}

impl MessageRenderer {
    pub fn new(markdown: Arc<dyn MarkdownRenderer>) -> Self {
        Self { markdown }
    }

    /// The right-aligned banner shown when a minute or more has passed
    /// since the receiver's last timestamp.
    pub fn time_banner(receiver: &ReceiverView, now: DateTime<Utc>) -> String {
        let text = match receiver.prefs.timezone {
            Some(tz) => {
                let local = now.with_timezone(&tz);
                if receiver.prefs.time_24h {
                    local.format("%H:%M").to_string()
                } else {
                    local.format("%-I:%M %P").to_string()
                }
            }
            None => format!("{} in", pretty_duration(now - receiver.join_time)),
        };
        right_align(&text, receiver.width)
    }

    pub fn render(&self, envelope: &Envelope, receiver: &ReceiverView, now: DateTime<Utc>) -> Rendered {
        let mut ping = !receiver.name.is_empty() && envelope.text.contains(receiver.name);

        let text = envelope.text.replace("\\n", "\n").replace("\\\n", "\\n");

        let body = match envelope.label() {
            Some(label) => {
                if matches!(envelope.delivery, Delivery::Direct(_)) {
                    ping = true;
                }
                let rendered = self.markdown.render(&text, visible_len(&label), receiver.width);
                format!("{}{}", label, rendered.trim())
            }
            None => self.markdown.render(&text, 0, receiver.width).trim().to_owned(),
        };

        let mut output = String::new();
        let timestamp_shown = now - receiver.last_timestamp > Duration::minutes(1);
        if timestamp_shown {
            output.push_str(&Self::time_banner(receiver, now));
            output.push('\n');
        }
        output.push_str(&body);

        if receiver.prefs.ping_everytime && !envelope.is_from(receiver.name) {
            ping = true;
        }
        if ping {
            output.push(BELL);
        }
        if !receiver.prefs.bell {
            output.retain(|c| c != BELL);
        }
        output.push('\n');

        Rendered {
            output,
            timestamp_shown,
        }
    }
}
