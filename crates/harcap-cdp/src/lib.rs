//! # harcap-cdp
//!
//! The real protocol backend: a [`harcap_capture::DebuggerChannel`]
//! implementation over the Chrome DevTools Protocol. One WebSocket
//! connection per attached target, command/response correlation with a
//! timeout that converts lost replies into `None`, and event frames mapped
//! into [`harcap_capture::ChannelEvent`]s. Also hosts DevTools HTTP
//! endpoint discovery and local Chrome launch support.

#![deny(unsafe_code)]

pub mod channel;
pub mod chrome;
pub mod discovery;
pub mod error;
pub mod wire;

pub use channel::CdpChannel;
pub use chrome::{find_chrome, LaunchedChrome};
pub use discovery::{DevToolsEndpoint, TargetDescriptor};
pub use error::ChannelError;
