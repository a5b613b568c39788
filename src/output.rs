//! Output formatting for command results: plain text for people, JSON for
//! scripts.

use serde::Serialize;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON document per result.
    Json,
}

/// Writes command results in the selected format.
pub struct Printer<W: Write = Box<dyn Write>> {
    out: W,
    format: OutputFormat,
}

impl Printer<Box<dyn Write>> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self {
            out: Box::new(std::io::stdout()),
            format,
        }
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    /// Free-form text. Always printed as-is; used for help and usage.
    pub fn print_text(&mut self, text: &str) -> std::io::Result<()> {
        writeln!(self.out, "{text}")
    }

    /// A titled value. Text mode prints the title, a blank line, then the
    /// value's `Display`; JSON mode prints only the value.
    pub fn print_section<T>(&mut self, title: &str, value: &T) -> std::io::Result<()>
    where
        T: Serialize + fmt::Display,
    {
        match self.format {
            OutputFormat::Text => write!(self.out, "{title}\n\n{value}"),
            OutputFormat::Json => self.print_json(value),
        }
    }

    /// A command result, through `Display` or as JSON.
    pub fn print_value<T>(&mut self, value: &T) -> std::io::Result<()>
    where
        T: Serialize + fmt::Display,
    {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{value}"),
            OutputFormat::Json => self.print_json(value),
        }
    }

    fn print_json<T: Serialize>(&mut self, value: &T) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
        writeln!(self.out, "{json}")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> fmt::Debug for Printer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Printer")
            .field("format", &self.format)
            .finish()
    }
}
