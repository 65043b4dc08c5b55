use crate::{
    dispatcher::{Dispatcher, FnRpcFunction, RpcFunction},
    envelope::{DecodeError, EncodeError, Envelope},
    transport::{Transport, TransportError, DEFAULT_MAX_FRAME},
};
use std::{io, sync::Arc};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task;
use tracing::{debug, error, info, warn};

/// A TCP server exposing registered functions by name.
///
/// Functions are registered first; [`serve`](Self::serve) then consumes the
/// server, so the function table is immutable once connections can observe
/// it.
pub struct Server {
    dispatcher: Dispatcher,
    max_frame: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Cap on a single request or response payload, in bytes.
    pub fn max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }

    /// Bind `name` to a plain async function or closure. First registration
    /// wins; duplicates are ignored.
    pub fn register<Args, F>(&mut self, name: impl Into<String>, function: F)
    where
        FnRpcFunction<F, Args>: RpcFunction + Send + Sync + 'static,
    {
        self.dispatcher.register(name, function);
    }

    /// Bind `name` to an [`RpcFunction`] implementation.
    pub fn add<RFn>(&mut self, name: impl Into<String>, rpc_function: RFn)
    where
        RFn: RpcFunction + Send + Sync + 'static,
    {
        self.dispatcher.add(name, rpc_function);
    }

    /// Bind a listening socket and serve until the process exits.
    ///
    /// A bind failure is fatal and returned; everything after that only
    /// terminates the session it happened on.
    pub async fn serve(self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .inspect_err(|err| error!(%err, "bind failed"))?;
        self.serve_on(listener).await
    }

    /// Serve connections from an already-bound listener.
    ///
    /// Useful when the caller wants to bind port 0 and read the real address
    /// back before serving.
    pub async fn serve_on(self, listener: TcpListener) -> io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "listening");
        }
        let max_frame = self.max_frame;
        let dispatcher = Arc::new(self.dispatcher);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };
            debug!(%peer, "connection accepted");

            let dispatcher = dispatcher.clone();
            task::spawn(async move {
                match session(stream, dispatcher, max_frame).await {
                    Ok(()) => debug!(%peer, "peer closed connection"),
                    Err(err) => warn!(%peer, %err, "session terminated"),
                }
            });
        }
    }
}

#[derive(Debug, Error)]
enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// One connection's read loop: receive, decode, execute, encode, send.
///
/// Strictly sequential, so responses leave in request order. Returns `Ok`
/// on a clean peer close; any protocol-level failure ends the session
/// without a response for the message that caused it.
async fn session(
    stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
    max_frame: usize,
) -> Result<(), SessionError> {
    let mut transport = Transport::with_max_frame(stream, max_frame);
    while let Some(frame) = transport.receive().await? {
        let request = Envelope::decode(&frame)?;
        let response = dispatcher.execute(request).await;
        transport.send(response.encode()?).await?;
    }
    Ok(())
}
