//! Maps a command token and its arguments onto a server or tube operation.
//!
//! Arguments are validated before the first round-trip of the operation, so
//! an invalid argument never reaches the server.

use crate::cli;
use crate::connection::{QueueClient, require_live};
use crate::error::CliError;
use crate::models::{DEFAULT_DELAY, DEFAULT_PRIORITY, DEFAULT_TTR, JobId, PutRequest};
use crate::output::Printer;
use crate::tube::{DEFAULT_KICK_BOUND, Tube};
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// A parsed tube action, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TubeAction {
    Info,
    Kick { bound: u64 },
    Delete(DeleteTarget),
    Put(PutRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    All,
    Job(JobId),
}

/// An optional numeric argument: either it parsed, or the field keeps its
/// default. Malformed values are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue<T> {
    Parsed(T),
    UseDefault,
}

impl<T: FromStr> ArgValue<T> {
    pub fn parse(arg: Option<&str>) -> Self {
        match arg.map(str::parse) {
            Some(Ok(v)) => ArgValue::Parsed(v),
            _ => ArgValue::UseDefault,
        }
    }
}

impl<T> ArgValue<T> {
    pub fn or(self, default: T) -> T {
        match self {
            ArgValue::Parsed(v) => v,
            ArgValue::UseDefault => default,
        }
    }
}

impl TubeAction {
    /// Parse `[<action> [<action-args...>]]`; no action means `info`.
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let Some((action, rest)) = args.split_first() else {
            return Ok(TubeAction::Info);
        };
        match action.as_str() {
            "info" => Ok(TubeAction::Info),
            "kick" => parse_kick(rest),
            "delete" => parse_delete(rest),
            "put" => parse_put(rest),
            other => Err(CliError::InvalidArgument(format!(
                "Unknown command '{other}'. Type '{} help' to see usage information",
                cli::PROGRAM
            ))),
        }
    }
}

fn parse_kick(args: &[String]) -> Result<TubeAction, CliError> {
    let bound = match args.first() {
        None => DEFAULT_KICK_BOUND,
        Some(arg) => arg
            .parse()
            .map_err(|_| CliError::InvalidArgument(format!("Wrong argument for kick: {arg}")))?,
    };
    Ok(TubeAction::Kick { bound })
}

fn parse_delete(args: &[String]) -> Result<TubeAction, CliError> {
    let arg = args.first().ok_or_else(|| {
        CliError::InvalidArgument("You must specify argument for delete: all|{job_id}".to_string())
    })?;
    if arg == "all" {
        return Ok(TubeAction::Delete(DeleteTarget::All));
    }
    let id = arg
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("Wrong argument for delete: {arg}")))?;
    Ok(TubeAction::Delete(DeleteTarget::Job(id)))
}

/// `put <data> [pri] [delay] [ttr]`. Extras past the fourth are ignored.
fn parse_put(args: &[String]) -> Result<TubeAction, CliError> {
    let payload = args.first().ok_or_else(|| {
        CliError::InvalidArgument(
            "You must specify data for put: {data} [pri] [delay] [ttr]".to_string(),
        )
    })?;
    let arg = |i: usize| args.get(i).map(String::as_str);
    let priority = ArgValue::<u32>::parse(arg(1)).or(DEFAULT_PRIORITY);
    let delay = ArgValue::<u32>::parse(arg(2))
        .or(DEFAULT_DELAY.as_secs() as u32);
    let ttr = ArgValue::<u32>::parse(arg(3)).or(DEFAULT_TTR.as_secs() as u32);
    Ok(TubeAction::Put(PutRequest {
        payload: payload.clone().into_bytes(),
        priority,
        delay: Duration::from_secs(delay.into()),
        ttr: Duration::from_secs(ttr.into()),
    }))
}

/// Run one command. `args` is the full positional list, command token first.
pub async fn dispatch<C, W>(
    args: &[String],
    conn: Option<&mut C>,
    printer: &mut Printer<W>,
) -> Result<(), CliError>
where
    C: QueueClient,
    W: Write,
{
    let Some((command, rest)) = args.split_first() else {
        return Err(CliError::NoCommand);
    };
    debug!(%command, args = ?rest, "dispatching");
    match command.as_str() {
        "help" => help(conn, printer).await,
        "server-info" => {
            let conn = require_live(conn)?;
            let report = conn.stats().await?;
            printer.print_section("Global server info:", &report)?;
            Ok(())
        }
        tube => {
            let conn = require_live(conn)?;
            validate_tube_name(tube)?;
            let action = TubeAction::parse(rest)?;
            run_tube_action(Tube::new(conn, tube), action, printer).await
        }
    }
}

/// Tube names travel inside protocol lines, so they may not be empty or
/// carry whitespace or control characters.
fn validate_tube_name(name: &str) -> Result<(), CliError> {
    if name.is_empty() {
        return Err(CliError::InvalidArgument(
            "Tube name must not be empty".to_string(),
        ));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CliError::InvalidArgument(format!(
            "Wrong tube name: {name:?}"
        )));
    }
    Ok(())
}

async fn run_tube_action<C, W>(
    mut tube: Tube<'_, C>,
    action: TubeAction,
    printer: &mut Printer<W>,
) -> Result<(), CliError>
where
    C: QueueClient,
    W: Write,
{
    match action {
        TubeAction::Info => {
            let report = tube.info().await;
            printer.print_section(&format!("Info for tube {}:", tube.name()), &report)?;
        }
        TubeAction::Kick { bound } => {
            let outcome = tube.kick(bound).await?;
            printer.print_value(&outcome)?;
        }
        TubeAction::Delete(DeleteTarget::All) => {
            let outcome = tube.drain().await;
            printer.print_value(&outcome)?;
        }
        TubeAction::Delete(DeleteTarget::Job(id)) => {
            let outcome = tube.delete(id).await?;
            printer.print_value(&outcome)?;
        }
        TubeAction::Put(request) => {
            let receipt = tube.put(&request).await?;
            printer.print_value(&receipt)?;
        }
    }
    Ok(())
}

/// Static help, plus the live tube list when connected. Never fails on the
/// server's account.
async fn help<C, W>(conn: Option<&mut C>, printer: &mut Printer<W>) -> Result<(), CliError>
where
    C: QueueClient,
    W: Write,
{
    printer.print_text(&cli::usage())?;
    printer.print_text(cli::TUBE_ACTIONS_HELP)?;
    if let Some(conn) = conn {
        match conn.list_tubes().await {
            Ok(tubes) => {
                printer.print_text(&format!("\nAvailable tubes: {}", tubes.join(" | ")))?
            }
            Err(error) => debug!(%error, "could not list tubes for help"),
        }
    }
    printer.print_text(cli::GLOBAL_ARGS_HELP)?;
    Ok(())
}
