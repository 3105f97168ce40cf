use crate::*;
use crate::internal::*;

use tokio::{
    io::{
        AsyncRead,
        AsyncWrite,
        AsyncWriteExt,
    },
    sync::{
        mpsc::{
            Sender,
            Receiver
        },
        watch,
    },
    select,
};

/// Drives the socket for a single connection.
///
/// Reads are framed and forwarded to the connection's input channel; writes
/// arrive on the control channel, one queued message per `write_all`, so that
/// output from concurrent senders never interleaves mid-message.
pub struct ConnectionTask<S> {
    id: ConnectionId,
    conn: S,
    control_channel: Receiver<ConnectionControlDetail>,
    input_channel: Sender<Result<Input, ConnectionError>>,
    window: watch::Sender<WindowSize>,
}

impl<S> ConnectionTask<S>
    where S: AsyncRead + AsyncWrite
{
    pub fn new(id: ConnectionId,
        stream: S,
        control: Receiver<ConnectionControlDetail>,
        input: Sender<Result<Input, ConnectionError>>,
        window: watch::Sender<WindowSize>) -> Self
    {
        Self {
            id,
            conn: stream,
            control_channel: control,
            input_channel: input,
            window,
        }
    }

    pub async fn run(mut self)
    {
        let (reader, mut writer) = tokio::io::split(self.conn);
        let mut lines = LineReader::new(reader, MAX_LINE_LENGTH);
        let mut framer = LineFramer::default();
        let mut reading = true;

        loop
        {
            select!
            {
                control = self.control_channel.recv() => match control
                {
                    None => { break; },
                    Some(ConnectionControlDetail::Close) => { break; },
                    Some(ConnectionControlDetail::Send(msg)) => {
                        if let Err(e) = writer.write_all(msg.as_bytes()).await {
                            tracing::debug!(id=%self.id, "write failed: {}", e);
                            let _ = self.input_channel.send(Err(e.into())).await;
                            break;
                        }
                    }
                },
                message = lines.next_line(), if reading => match message {
                    Ok(None) => {
                        reading = false;
                        if self.input_channel.send(Ok(Input::Eof)).await.is_err() {
                            break;
                        }
                    },
                    Ok(Some(m)) => match framer.frame(m) {
                        Framed::Resize(size) => {
                            tracing::trace!(id=%self.id, ?size, "window size report");
                            self.window.send_replace(size);
                        }
                        Framed::Input(input) => {
                            if self.input_channel.send(Ok(input)).await.is_err() {
                                tracing::error!("Error notifying socket message on connection {}", self.id);
                                break;
                            }
                        }
                    },
                    Err(e) => {
                        reading = false;
                        if self.input_channel.send(Err(ConnectionError::from(e))).await.is_err() {
                            tracing::error!("Error notifying socket error on connection {}", self.id);
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!("closing {}", self.id);
        let _ = writer.shutdown().await;
    }
}
