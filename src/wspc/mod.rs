//! In-process RPC acceptor.
//!
//! A secondary acceptor that lets the controller terminate its RPC calls
//! inside this process. The wiring (dialer, lifecycle, metrics) is complete;
//! the three procedures are not implemented yet and always fail.

pub mod server;

pub use server::Server;
