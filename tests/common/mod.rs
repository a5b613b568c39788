//! A small in-process beanstalkd stand-in speaking the text protocol over TCP.
//!
//! Reservations never block: an empty watch list answers `TIMED_OUT` at once.

#![allow(dead_code)]

use beans::connection::{ClientConfig, Connection};
use beans::dispatch::dispatch;
use beans::error::CliError;
use beans::output::{OutputFormat, Printer};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Reserved,
    Delayed,
    Buried,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub tube: String,
    pub priority: u32,
    pub payload: Vec<u8>,
    pub state: JobState,
}

#[derive(Debug)]
pub struct State {
    pub next_id: u64,
    pub jobs: BTreeMap<u64, Job>,
    pub tubes: BTreeSet<String>,
    pub commands: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_id: 1,
            jobs: BTreeMap::new(),
            tubes: BTreeSet::from(["default".to_string()]),
            commands: Vec::new(),
        }
    }
}

impl State {
    fn insert(&mut self, tube: &str, priority: u32, payload: Vec<u8>, state: JobState) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tubes.insert(tube.to_string());
        self.jobs.insert(
            id,
            Job {
                tube: tube.to_string(),
                priority,
                payload,
                state,
            },
        );
        id
    }

    fn count(&self, tube: Option<&str>, state: JobState) -> usize {
        self.jobs
            .values()
            .filter(|j| j.state == state && tube.is_none_or(|t| j.tube == t))
            .count()
    }

    fn yaml_dict(pairs: &[(&str, String)]) -> String {
        let mut out = String::from("---\n");
        for (k, v) in pairs {
            out.push_str(&format!("{k}: {v}\n"));
        }
        out
    }
}

pub struct FakeBeanstalkd {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<State>>,
}

impl FakeBeanstalkd {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(State::default()));
        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = shared.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });
        Ok(Self { addr, state })
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.addr.to_string(),
            ..ClientConfig::default()
        }
    }

    pub async fn connect(&self) -> anyhow::Result<Connection> {
        Ok(Connection::connect(&self.config()).await?)
    }

    pub async fn seed(&self, tube: &str, payload: &str, state: JobState) -> u64 {
        self.state
            .lock()
            .await
            .insert(tube, 0, payload.as_bytes().to_vec(), state)
    }

    pub async fn job_count(&self, tube: &str) -> usize {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .filter(|j| j.tube == tube)
            .count()
    }

    pub async fn commands(&self) -> Vec<String> {
        self.state.lock().await.commands.clone()
    }
}

/// Run `words` against `conn` and capture what was printed.
pub async fn run(
    words: &[&str],
    conn: Option<&mut Connection>,
    format: OutputFormat,
) -> (Result<(), CliError>, String) {
    let args: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    let mut printer = Printer::new(Vec::new(), format);
    let res = dispatch(&args, conn, &mut printer).await;
    let out = String::from_utf8(printer.into_inner()).unwrap_or_default();
    (res, out)
}

async fn serve(stream: TcpStream, state: Arc<Mutex<State>>) -> anyhow::Result<()> {
    let mut stream = BufReader::new(stream);
    let mut using = "default".to_string();
    let mut watched = vec!["default".to_string()];
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end().to_string();
        let words: Vec<&str> = line.split(' ').collect();
        let mut st = state.lock().await;
        st.commands.push(line.clone());

        let reply: Vec<u8> = match words.as_slice() {
            ["quit"] => return Ok(()),
            ["use", tube] => {
                using = tube.to_string();
                st.tubes.insert(using.clone());
                format!("USING {tube}\r\n").into_bytes()
            }
            ["watch", tube] => {
                if !watched.iter().any(|w| w == tube) {
                    watched.push(tube.to_string());
                }
                st.tubes.insert(tube.to_string());
                format!("WATCHING {}\r\n", watched.len()).into_bytes()
            }
            ["ignore", tube] => {
                if watched.len() == 1 && watched[0] == *tube {
                    b"NOT_IGNORED\r\n".to_vec()
                } else {
                    watched.retain(|w| w != tube);
                    format!("WATCHING {}\r\n", watched.len()).into_bytes()
                }
            }
            ["put", pri, delay, _ttr, len] => {
                let len: usize = len.parse()?;
                let mut body = vec![0u8; len + 2];
                stream.read_exact(&mut body).await?;
                body.truncate(len);
                let state = if *delay == "0" {
                    JobState::Ready
                } else {
                    JobState::Delayed
                };
                let id = st.insert(&using, pri.parse()?, body, state);
                format!("INSERTED {id}\r\n").into_bytes()
            }
            ["reserve-with-timeout", _secs] => {
                let next = st
                    .jobs
                    .iter()
                    .filter(|(_, j)| j.state == JobState::Ready && watched.contains(&j.tube))
                    .min_by_key(|(id, j)| (j.priority, **id))
                    .map(|(id, _)| *id);
                match next {
                    Some(id) => {
                        let job = st.jobs.get_mut(&id).expect("job exists");
                        job.state = JobState::Reserved;
                        let mut reply =
                            format!("RESERVED {id} {}\r\n", job.payload.len()).into_bytes();
                        reply.extend_from_slice(&job.payload);
                        reply.extend_from_slice(b"\r\n");
                        reply
                    }
                    None => b"TIMED_OUT\r\n".to_vec(),
                }
            }
            ["delete", id] => match st.jobs.remove(&id.parse::<u64>()?) {
                Some(_) => b"DELETED\r\n".to_vec(),
                None => b"NOT_FOUND\r\n".to_vec(),
            },
            ["kick", bound] => {
                let bound: usize = bound.parse()?;
                let target = if st.count(Some(using.as_str()), JobState::Buried) > 0 {
                    JobState::Buried
                } else {
                    JobState::Delayed
                };
                let mut kicked = 0;
                for job in st.jobs.values_mut() {
                    if kicked == bound {
                        break;
                    }
                    if job.tube == using && job.state == target {
                        job.state = JobState::Ready;
                        kicked += 1;
                    }
                }
                format!("KICKED {kicked}\r\n").into_bytes()
            }
            ["stats-tube", tube] => {
                let tube: &str = tube;
                if st.tubes.contains(tube) {
                    let body = State::yaml_dict(&[
                        ("name", tube.to_string()),
                        ("current-jobs-ready", st.count(Some(tube), JobState::Ready).to_string()),
                        (
                            "current-jobs-reserved",
                            st.count(Some(tube), JobState::Reserved).to_string(),
                        ),
                        (
                            "current-jobs-delayed",
                            st.count(Some(tube), JobState::Delayed).to_string(),
                        ),
                        ("current-jobs-buried", st.count(Some(tube), JobState::Buried).to_string()),
                    ]);
                    ok_body(body)
                } else {
                    b"NOT_FOUND\r\n".to_vec()
                }
            }
            ["stats"] => {
                let body = State::yaml_dict(&[
                    ("version", "\"1.13\"".to_string()),
                    ("id", "1234567890123e45".to_string()),
                    ("rusage-utime", "0.004000".to_string()),
                    ("current-jobs-ready", st.count(None, JobState::Ready).to_string()),
                    ("current-tubes", st.tubes.len().to_string()),
                    ("total-jobs", (st.next_id - 1).to_string()),
                ]);
                ok_body(body)
            }
            ["list-tubes"] => {
                let mut body = String::from("---\n");
                for tube in &st.tubes {
                    body.push_str(&format!("- {tube}\n"));
                }
                ok_body(body)
            }
            _ => b"UNKNOWN_COMMAND\r\n".to_vec(),
        };
        drop(st);
        stream.get_mut().write_all(&reply).await?;
    }
}

fn ok_body(body: String) -> Vec<u8> {
    let mut reply = format!("OK {}\r\n", body.len()).into_bytes();
    reply.extend_from_slice(body.as_bytes());
    reply.extend_from_slice(b"\r\n");
    reply
}
