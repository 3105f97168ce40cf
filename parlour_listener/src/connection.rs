use crate::*;
use internal::*;

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{
    mpsc::{channel, Receiver, Sender},
    watch,
    Mutex as AsyncMutex,
};

const SEND_QUEUE_LEN: usize = 256;
const RECEIVE_QUEUE_LEN: usize = 64;

/// Invoked when the client requests completion of the current line.
///
/// Receives the line and the cursor position; returns the replacement line and
/// cursor position, or `None` if nothing could be completed.
pub type AutocompleteCallback = Box<dyn Fn(&str, usize) -> Option<(String, usize)> + Send + Sync>;

/// One unit of input read from a connection
#[derive(Debug,Clone,PartialEq,Eq)]
pub enum Input
{
    /// A complete submitted line
    Line(String),
    /// A line of a pasted block; more lines of the same block follow
    PasteLine(String),
    /// The client closed its side of the stream
    Eof,
}

/// A client connection.
///
/// All methods take `&self`; the handle is shared between the session driving
/// it and anything that needs to write to it.
pub struct Connection
{
    pub id: ConnectionId,
    pub remote_addr: IpAddr,
    control_channel: Sender<ConnectionControlDetail>,
    input: AsyncMutex<Receiver<Result<Input, ConnectionError>>>,
    window: watch::Receiver<WindowSize>,
    prompt: Mutex<String>,
    autocomplete: Mutex<Option<AutocompleteCallback>>,
    closed: AtomicBool,
}

impl Connection
{
    /// Wrap a stream in a `Connection`, spawning the task that serves it.
    pub fn spawn<S>(id: ConnectionId, remote_addr: IpAddr, stream: S) -> Self
        where S: AsyncRead + AsyncWrite + Send + 'static
    {
        let (control_send, control_recv) = channel(SEND_QUEUE_LEN);
        let (input_send, input_recv) = channel(RECEIVE_QUEUE_LEN);
        let (window_send, window_recv) = watch::channel(WindowSize::default());

        let task = ConnectionTask::new(id, stream, control_recv, input_send, window_send);
        tokio::spawn(task.run());

        Self {
            id,
            remote_addr,
            control_channel: control_send,
            input: AsyncMutex::new(input_recv),
            window: window_recv,
            prompt: Mutex::new(String::new()),
            autocomplete: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// The name the client logged in with. Plain TCP carries none.
    pub fn login_name(&self) -> Option<String>
    {
        None
    }

    /// The client's public key, if the transport authenticated one. Plain TCP carries none.
    pub fn public_key(&self) -> Option<Vec<u8>>
    {
        None
    }

    /// A receiver that observes every window size change reported by the client
    pub fn window_size(&self) -> watch::Receiver<WindowSize>
    {
        self.window.clone()
    }

    /// Queue `msg` to be written to the client in a single write.
    pub fn send(&self, msg: String) -> Result<(), ConnectionError>
    {
        if self.closed.load(Ordering::Acquire)
        {
            return Err(ConnectionError::Closed);
        }
        Ok(self.control_channel.try_send(ConnectionControlDetail::Send(msg))?)
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&self)
    {
        if self.closed.swap(true, Ordering::AcqRel)
        {
            return;
        }
        if let Err(e) = self.control_channel.try_send(ConnectionControlDetail::Close)
        {
            tracing::debug!("Error sending close to connection {}: {}", self.id, e);
        }
    }

    pub fn is_closed(&self) -> bool
    {
        self.closed.load(Ordering::Acquire)
    }

    pub fn set_prompt(&self, prompt: &str)
    {
        *self.prompt.lock() = prompt.to_owned();
    }

    pub fn prompt(&self) -> String
    {
        self.prompt.lock().clone()
    }

    /// Ask the client terminal to bracket pasted text
    pub fn set_bracketed_paste(&self, enabled: bool) -> Result<(), ConnectionError>
    {
        self.send(if enabled { "\x1b[?2004h" } else { "\x1b[?2004l" }.to_owned())
    }

    pub fn set_autocomplete(&self, callback: AutocompleteCallback)
    {
        *self.autocomplete.lock() = Some(callback);
    }

    /// Read the next unit of input.
    ///
    /// A submitted line ending in a tab is treated as a completion request: the
    /// autocomplete callback is consulted, the completed line is echoed back to
    /// the client, and reading continues.
    pub async fn read_line(&self) -> Result<Input, ConnectionError>
    {
        let mut input = self.input.lock().await;
        loop
        {
            let prompt = self.prompt();
            if !prompt.is_empty()
            {
                self.send(prompt)?;
            }

            match input.recv().await
            {
                None => return Ok(Input::Eof),
                Some(Err(e)) => return Err(e),
                Some(Ok(Input::Line(line))) if line.ends_with('\t') => {
                    let partial = line.trim_end_matches('\t');
                    if let Some(completed) = self.complete(partial)
                    {
                        self.send(format!("\r\x1b[2K{}{}\r\n", self.prompt(), completed))?;
                    }
                }
                Some(Ok(other)) => return Ok(other),
            }
        }
    }

    fn complete(&self, line: &str) -> Option<String>
    {
        let callback = self.autocomplete.lock();
        let callback = callback.as_ref()?;
        callback(line, line.len()).map(|(completed, _)| completed)
    }
}

impl Drop for Connection
{
    fn drop(&mut self)
    {
        self.close();
    }
}
