use crate::*;

use tokio::io::{
    AsyncBufReadExt,
    AsyncRead,
    BufReader,
};

/// Longest line kept from a client, in bytes. Anything beyond it on the same
/// line is dropped as it arrives.
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

const PASTE_START: &str = "\x1b[200~";
const PASTE_END: &str = "\x1b[201~";

/// Commands sent from a [`Connection`] handle to its I/O task
#[derive(Debug)]
pub enum ConnectionControlDetail
{
    Send(String),
    Close,
}

/// What the I/O task made of a single line received from the socket
#[derive(Debug,PartialEq,Eq)]
pub enum Framed
{
    Input(Input),
    Resize(WindowSize),
}

/// Splits raw socket lines into submitted lines, paste continuation lines and
/// window size reports.
///
/// A bracketed paste arrives as `ESC[200~` on its first line and `ESC[201~`
/// on its last; every line before the closing marker is reported as
/// [`Input::PasteLine`] so the reader knows more of the block follows.
#[derive(Debug,Default)]
pub struct LineFramer
{
    in_paste: bool,
}

impl LineFramer
{
    pub fn frame(&mut self, raw: String) -> Framed
    {
        let line = raw.strip_suffix('\r').map(str::to_owned).unwrap_or(raw);

        if !self.in_paste
        {
            if let Some(size) = WindowSize::parse_report(&line)
            {
                return Framed::Resize(size);
            }
        }

        let mut text = line;
        if text.contains(PASTE_START)
        {
            text = text.replace(PASTE_START, "");
            self.in_paste = true;
        }
        if text.contains(PASTE_END)
        {
            text = text.replace(PASTE_END, "");
            self.in_paste = false;
            return Framed::Input(Input::Line(text));
        }

        if self.in_paste
        {
            Framed::Input(Input::PasteLine(text))
        }
        else
        {
            Framed::Input(Input::Line(text))
        }
    }
}

/// Reads newline-terminated lines without ever holding more than `max_len`
/// bytes of one line.
///
/// `next_line` is cancel safe: a partly received line stays buffered for the
/// next call.
pub struct LineReader<R>
{
    reader: BufReader<R>,
    max_len: usize,
    buf: Vec<u8>,
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R>
{
    pub fn new(reader: R, max_len: usize) -> Self
    {
        Self {
            reader: BufReader::new(reader),
            max_len,
            buf: Vec::new(),
            discarding: false,
        }
    }

    /// The next line without its `\n`, or `None` at end of stream. A final
    /// line with no terminator is still returned.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>>
    {
        loop
        {
            let available = self.reader.fill_buf().await?;
            if available.is_empty()
            {
                if self.buf.is_empty() && !self.discarding
                {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let (chunk, used, complete) = match available.iter().position(|b| *b == b'\n')
            {
                Some(end) => (&available[..end], end + 1, true),
                None => (available, available.len(), false),
            };

            if !self.discarding
            {
                let room = self.max_len.saturating_sub(self.buf.len());
                if chunk.len() > room
                {
                    self.buf.extend_from_slice(&chunk[..room]);
                    self.discarding = true;
                }
                else
                {
                    self.buf.extend_from_slice(chunk);
                }
            }
            self.reader.consume(used);

            if complete
            {
                return Ok(Some(self.take_line()));
            }
        }
    }

    fn take_line(&mut self) -> String
    {
        self.discarding = false;
        let bytes = std::mem::take(&mut self.buf);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
