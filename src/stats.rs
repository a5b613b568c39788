//! Server statistics: decoding the YAML dictionaries beanstalkd returns and
//! rendering them as an aligned, key-sorted report.

use crate::error::ProtocolError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Metric name to server-formatted value. Keys are kept sorted so rendering
/// never depends on the order the server (or a caller) produced them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatsReport(BTreeMap<String, String>);

impl StatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the body of an `OK <bytes>` reply to `stats` or `stats-tube`.
    /// Values keep the server's text (`0.004000` stays `0.004000`).
    pub fn from_yaml(op: &'static str, body: &[u8]) -> Result<Self, ProtocolError> {
        let raw: Option<BTreeMap<String, String>> =
            serde_yaml::from_slice(body).map_err(|source| ProtocolError::Decode { op, source })?;
        Ok(Self(raw.unwrap_or_default()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Width every key is padded to: the longest key plus one.
    pub fn key_width(&self) -> usize {
        self.0.keys().map(|k| k.chars().count()).max().unwrap_or(0) + 1
    }

    /// One `<key padded>: <value>` line per entry, ascending by key.
    pub fn lines(&self) -> Vec<String> {
        let width = self.key_width();
        self.iter()
            .map(|(k, v)| format!("{k:<width$}: {v}"))
            .collect()
    }
}

impl FromIterator<(String, String)> for StatsReport {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<HashMap<String, String>> for StatsReport {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Decode the body of an `OK <bytes>` reply to `list-tubes`.
pub fn decode_list(op: &'static str, body: &[u8]) -> Result<Vec<String>, ProtocolError> {
    let raw: Option<Vec<String>> =
        serde_yaml::from_slice(body).map_err(|source| ProtocolError::Decode { op, source })?;
    Ok(raw.unwrap_or_default())
}
