//! The line-oriented terminal a session is driven through.

use async_trait::async_trait;
use parlour_listener::{AutocompleteCallback, Connection, ConnectionError, Input, WindowSize};
use tokio::sync::watch;

use std::net::IpAddr;

/// What the chat core needs from a client connection.
///
/// [`Connection`] is the production implementation; tests drive sessions
/// through scripted in-memory terminals.
#[async_trait]
pub trait Terminal: Send + Sync {
    fn remote_addr(&self) -> IpAddr;

    /// Login name presented by the transport, if it has one.
    fn login_name(&self) -> Option<String>;

    /// Public key presented by the transport, if it has one.
    fn public_key(&self) -> Option<Vec<u8>>;

    async fn read_line(&self) -> Result<Input, ConnectionError>;

    /// Queue text for the client. Each call is written contiguously.
    fn write(&self, text: String) -> Result<(), ConnectionError>;

    fn set_prompt(&self, prompt: &str);

    fn set_bracketed_paste(&self, enabled: bool) -> Result<(), ConnectionError>;

    fn set_autocomplete(&self, callback: AutocompleteCallback);

    fn window_size(&self) -> watch::Receiver<WindowSize>;

    fn close(&self);
}

#[async_trait]
impl Terminal for Connection {
    fn remote_addr(&self) -> IpAddr {
        self.remote_addr
    }

    fn login_name(&self) -> Option<String> {
        Connection::login_name(self)
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Connection::public_key(self)
    }

    async fn read_line(&self) -> Result<Input, ConnectionError> {
        Connection::read_line(self).await
    }

    fn write(&self, text: String) -> Result<(), ConnectionError> {
        self.send(text)
    }

    fn set_prompt(&self, prompt: &str) {
        Connection::set_prompt(self, prompt)
    }

    fn set_bracketed_paste(&self, enabled: bool) -> Result<(), ConnectionError> {
        Connection::set_bracketed_paste(self, enabled)
    }

    fn set_autocomplete(&self, callback: AutocompleteCallback) {
        Connection::set_autocomplete(self, callback)
    }

    fn window_size(&self) -> watch::Receiver<WindowSize> {
        Connection::window_size(self)
    }

    fn close(&self) {
        Connection::close(self)
    }
}
