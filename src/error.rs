use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("interface index {if_index} already has an RA socket registration")]
    AlreadyRegistered { if_index: u32 },

    #[error("interface index {if_index} has no RA socket registration")]
    NotRegistered { if_index: u32 },

    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    #[error("interface {name} does not support router discovery")]
    UnsupportedInterface { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
