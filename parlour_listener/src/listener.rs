use crate::*;

use std::net::SocketAddr;

use tokio::{
    net::TcpListener,
    sync::{
        broadcast,
        mpsc::Sender,
    },
    select,
};

/// A bound listening socket.
///
/// Binding is separate from accepting so that a bind failure can be reported
/// at startup, before any connection is served.
pub struct Listener
{
    id: ListenerId,
    listener: TcpListener,
    id_gen: ConnectionIdGenerator,
}

impl Listener
{
    pub async fn bind(id: ListenerId, address: SocketAddr) -> Result<Self, ListenerError>
    {
        let listener = TcpListener::bind(address).await
                                   .map_err(|e| ListenerError::BindError(address.to_string(), e))?;

        tracing::info!(listener=%id, %address, "listening");

        Ok(Self {
            id,
            listener,
            id_gen: ConnectionIdGenerator::new(id, 1),
        })
    }

    pub fn id(&self) -> ListenerId
    {
        self.id
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError>
    {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires or the receiving end of
    /// `connections` goes away
    pub async fn run(self, connections: Sender<Connection>, mut shutdown: broadcast::Receiver<()>)
    {
        loop
        {
            select! {
                res = self.listener.accept() => {
                    match res {
                        Ok((stream, addr)) =>
                        {
                            let id = self.id_gen.next();
                            tracing::debug!(connection=%id, remote=%addr, "accepted");
                            let conn = Connection::spawn(id, addr.ip(), stream);
                            if connections.send(conn).await.is_err()
                            {
                                break;
                            }
                        },
                        Err(e) => {
                            tracing::error!(listener=%self.id, "Error accepting connection: {}", e);
                        }
                    }
                },
                _ = shutdown.recv() => {
                    break;
                }
            }
        }
        tracing::info!(listener=%self.id, "listener closed");
    }
}
