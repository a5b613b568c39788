//! `beans`: a command-line client for beanstalkd.
//!
//! It inspects server and tube statistics and runs basic job lifecycle
//! actions (put, kick, delete, drain) against one tube per invocation.

pub mod cli;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod output;
pub mod protocol;
pub mod stats;
pub mod tube;

#[cfg(test)]
mod testing;
