//! Sealgate Client
//!
//! Production glue between the sans-IO core and an embedded context. A
//! [`Session`] owns the token store, the handshake and both interceptors for
//! one embedded page, and executes the handshake's actions through a
//! [`Host`]:
//!
//! ```text
//!   message channel ──> Session::handle_message ─┐
//!   animation frame ──> Session::tick ───────────┤
//!                                                ▼
//!                                   Handshake (sans-IO) ──> Vec<HandshakeAction>
//!                                                                 │
//!                              Host::post_message / stop_listening <┘
//!
//!   UI engine "configure request" ──> Session::before_request
//!   UI engine "before swap"       ──> Session::before_swap
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod host;
pub mod session;
pub mod system_env;

pub use error::SessionError;
pub use host::Host;
pub use session::{RequestDisposition, Session};
pub use system_env::SystemEnv;
