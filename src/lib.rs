//! Asynchronous TLS handshake grabber.
//!
//! Connects to targets, optionally negotiates STARTTLS (SMTP, POP3, IMAP) or
//! explicit FTPS, performs an instrumented TLS handshake under a chosen
//! cipher-suite policy and records what the server sent: hello parameters,
//! certificates, key-exchange parameters and Heartbleed exposure.

#[cfg(feature = "cli")]
pub mod cli;
pub mod clients;
pub mod conn;
pub mod engine;
pub mod input;
pub mod model;
pub mod output;
pub mod protocols;
pub mod tls;
pub mod util;
