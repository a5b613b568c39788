//! Beanstalkd text protocol: request encoding and reply-line parsing.
//!
//! Every command is a single ASCII line terminated by `\r\n`. `put` is
//! followed by the job body, and `RESERVED`/`OK` replies are followed by a
//! body of the announced length plus a trailing `\r\n`. Reading those bodies
//! is left to the connection; this module only deals with the lines.

use crate::error::ProtocolError;
use crate::models::JobId;

pub const CRLF: &[u8] = b"\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    Use(&'a str),
    Watch(&'a str),
    Ignore(&'a str),
    Put {
        priority: u32,
        delay: u64,
        ttr: u64,
        data: &'a [u8],
    },
    ReserveWithTimeout(u64),
    Delete(JobId),
    Kick(u64),
    Stats,
    StatsTube(&'a str),
    ListTubes,
    Quit,
}

impl Request<'_> {
    /// Operation name used to prefix errors, e.g. `delete: not found`.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Use(_) => "use",
            Request::Watch(_) => "watch",
            Request::Ignore(_) => "ignore",
            Request::Put { .. } => "put",
            Request::ReserveWithTimeout(_) => "reserve-with-timeout",
            Request::Delete(_) => "delete",
            Request::Kick(_) => "kick",
            Request::Stats => "stats",
            Request::StatsTube(_) => "stats-tube",
            Request::ListTubes => "list-tubes",
            Request::Quit => "quit",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = match self {
            Request::Use(tube) => format!("use {tube}").into_bytes(),
            Request::Watch(tube) => format!("watch {tube}").into_bytes(),
            Request::Ignore(tube) => format!("ignore {tube}").into_bytes(),
            Request::Put { priority, delay, ttr, data } => {
                let mut b =
                    format!("put {priority} {delay} {ttr} {}", data.len()).into_bytes();
                b.extend_from_slice(CRLF);
                b.extend_from_slice(data);
                b
            }
            Request::ReserveWithTimeout(secs) => {
                format!("reserve-with-timeout {secs}").into_bytes()
            }
            Request::Delete(id) => format!("delete {id}").into_bytes(),
            Request::Kick(bound) => format!("kick {bound}").into_bytes(),
            Request::Stats => b"stats".to_vec(),
            Request::StatsTube(tube) => format!("stats-tube {tube}").into_bytes(),
            Request::ListTubes => b"list-tubes".to_vec(),
            Request::Quit => b"quit".to_vec(),
        };
        buf.extend_from_slice(CRLF);
        buf
    }
}

/// Successful reply heads. `Reserved` and `Ok` announce a body of `len` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Using(String),
    Watching(u64),
    Inserted(JobId),
    Reserved { id: JobId, len: usize },
    Deleted,
    Kicked(u64),
    Ok { len: usize },
}

/// Parse one reply line (without its `\r\n`) sent in answer to `op`.
pub fn parse_reply(op: &'static str, line: &str) -> Result<Reply, ProtocolError> {
    let mut words = line.split_ascii_whitespace();
    let head = words.next().unwrap_or_default();
    let unexpected = || ProtocolError::Unexpected {
        op,
        line: line.to_string(),
    };

    let reply = match head {
        "USING" => Reply::Using(words.next().ok_or_else(unexpected)?.to_string()),
        "WATCHING" => Reply::Watching(parse_num(words.next()).ok_or_else(unexpected)?),
        "INSERTED" => Reply::Inserted(parse_num(words.next()).ok_or_else(unexpected)?),
        "RESERVED" => {
            let id = parse_num(words.next()).ok_or_else(unexpected)?;
            let len = parse_num(words.next()).ok_or_else(unexpected)?;
            Reply::Reserved { id, len }
        }
        "DELETED" => Reply::Deleted,
        "KICKED" => Reply::Kicked(parse_num(words.next()).ok_or_else(unexpected)?),
        "OK" => Reply::Ok {
            len: parse_num(words.next()).ok_or_else(unexpected)?,
        },
        "BURIED" => {
            let id = parse_num(words.next()).unwrap_or_default();
            return Err(ProtocolError::Buried { op, id });
        }
        "NOT_FOUND" => return Err(ProtocolError::NotFound { op }),
        "TIMED_OUT" => return Err(ProtocolError::TimedOut { op }),
        "DEADLINE_SOON" => return Err(ProtocolError::DeadlineSoon { op }),
        "EXPECTED_CRLF" => return Err(ProtocolError::ExpectedCrlf { op }),
        "JOB_TOO_BIG" => return Err(ProtocolError::JobTooBig { op }),
        "DRAINING" => return Err(ProtocolError::Draining { op }),
        "NOT_IGNORED" => return Err(ProtocolError::NotIgnored { op }),
        "OUT_OF_MEMORY" => return Err(ProtocolError::OutOfMemory { op }),
        "INTERNAL_ERROR" => return Err(ProtocolError::InternalError { op }),
        "BAD_FORMAT" => return Err(ProtocolError::BadFormat { op }),
        "UNKNOWN_COMMAND" => return Err(ProtocolError::UnknownCommand { op }),
        _ => return Err(unexpected()),
    };
    Ok(reply)
}

fn parse_num<T: std::str::FromStr>(word: Option<&str>) -> Option<T> {
    word.and_then(|w| w.parse().ok())
}
