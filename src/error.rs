use std::process::ExitCode;
use thiserror::Error;

/// Dial failures. Never fatal on their own: the caller keeps an absent
/// connection and only commands that need the server give up.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to connect to {endpoint}: {source}")]
    Dial {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {endpoint} after {secs}s")]
    Timeout { endpoint: String, secs: u64 },
}

/// Errors raised by a beanstalkd round-trip. The `Display` text is what the
/// user sees, in the form `<operation>: <reason>`.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("{op}: not found")]
    NotFound { op: &'static str },

    #[error("{op}: timeout")]
    TimedOut { op: &'static str },

    #[error("{op}: deadline soon")]
    DeadlineSoon { op: &'static str },

    #[error("{op}: job buried (id {id})")]
    Buried { op: &'static str, id: u64 },

    #[error("{op}: expected CRLF")]
    ExpectedCrlf { op: &'static str },

    #[error("{op}: job too big")]
    JobTooBig { op: &'static str },

    #[error("{op}: server in drain mode")]
    Draining { op: &'static str },

    #[error("{op}: not ignored")]
    NotIgnored { op: &'static str },

    #[error("{op}: out of memory")]
    OutOfMemory { op: &'static str },

    #[error("{op}: internal error")]
    InternalError { op: &'static str },

    #[error("{op}: bad format")]
    BadFormat { op: &'static str },

    #[error("{op}: unknown command")]
    UnknownCommand { op: &'static str },

    #[error("{op}: unexpected response {line:?}")]
    Unexpected { op: &'static str, line: String },

    #[error("{op}: connection closed by server")]
    Closed { op: &'static str },

    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: malformed reply body: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Command-level failures, each mapped to a stable process exit status.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("You're not connected to beanstalkd")]
    NotConnected,

    #[error("no command given")]
    NoCommand,

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_status(&self) -> u8 {
        match self {
            CliError::NoCommand => 1,
            CliError::NotConnected => 2,
            CliError::InvalidArgument(_) => 3,
            CliError::Protocol(_) => 4,
            CliError::Output(_) => 5,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
