//! Typed error taxonomy for each component boundary.
//!
//! Components return their own `thiserror` enum; only `main` collapses
//! everything into `anyhow` for top-level reporting.

use std::net::AddrParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("scan denied: insufficient permission on the wireless control socket")]
    ScanDenied,
    #[error("link did not become ready in time")]
    LinkNotReady,
    #[error("driver ioctl failed: {0}")]
    Driver(#[from] nix::Error),
    #[error("interface {0} not found")]
    NoSuchInterface(String),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record for ssid {0}")]
    CorruptRecord(String),
    #[error("invalid access point record: {0}")]
    InvalidRecord(String),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    BadCommand(String),
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    #[error("too many tokens (max {0})")]
    TooManyTokens(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Addr(#[from] AddrParseError),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{0} is not a regular, executable file")]
    NotExecutable(String),
    #[error("fork failed: {0}")]
    Fork(#[from] nix::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum IpConfigError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
