//! Minimal TCP RPC: register named functions, serve encoded call envelopes.
//!
//! A [`Server`] owns a table of named functions. Each accepted connection
//! runs its own session: read one length-delimited frame, decode the
//! [`Envelope`] inside it, dispatch to the named function, and send the
//! response envelope back. Arguments and results are dynamically typed
//! [`Value`]s, so functions of any signature share one wire format.
//!
//! ```no_run
//! use callwire::Server;
//! use std::convert::Infallible;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut server = Server::new();
//!     server.register("add", |a: i64, b: i64| async move {
//!         Ok::<_, Infallible>(a + b)
//!     });
//!     server.serve("127.0.0.1:9090").await
//! }
//! ```

pub mod dispatcher;
pub mod envelope;
pub mod server;
pub mod transport;
pub mod types;

pub use dispatcher::{DispatchError, Dispatcher, FromArgs, IntoReply, IntoResults, RpcFunction};
pub use envelope::{DecodeError, EncodeError, Envelope};
pub use server::Server;
pub use transport::{Transport, TransportError, DEFAULT_MAX_FRAME};
pub use types::{FromValue, TypeMismatch, Value};
