use crate::connection::{ClientConfig, Connection, DEFAULT_ENDPOINT};
use crate::dispatch::dispatch;
use crate::error::CliError;
use crate::output::{OutputFormat, Printer};
use clap::Parser;
use std::process::ExitCode;
use tracing::debug;

pub const PROGRAM: &str = "beans";

pub const TUBE_ACTIONS_HELP: &str = "\nAvailable tube actions:
- info
- kick [bound]
- delete all|{id}
- put {data} [pri] [delay] [ttr]";

pub const GLOBAL_ARGS_HELP: &str = "\nGlobal args:
-b=127.0.0.1:11300\tBeanstalkd [addr]:port
--format=text|json\tOutput format for results
";

pub fn usage() -> String {
    format!(
        "\nBase usage: {PROGRAM} (help | server-info | {{tube_name}} [tube_action]) [{{global_args}}]"
    )
}

/// Beans CLI interface
#[derive(Parser, Debug)]
#[command(name = PROGRAM, about = "Inspect and administer beanstalkd tubes")]
pub struct Cli {
    /// help | server-info | <tube> [info | kick [bound] | delete all|<id> | put <data> [pri] [delay] [ttr]]
    #[arg(value_name = "COMMAND", allow_negative_numbers = true)]
    pub args: Vec<String>,

    /// Beanstalkd [addr]:port
    #[arg(short = 'b', long = "beanstalk", env = "BEANSTALKD_ADDR", default_value = DEFAULT_ENDPOINT)]
    pub beanstalk: String,

    /// Output format for command results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Cli {
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.beanstalk.clone(),
            ..ClientConfig::default()
        }
    }

    /// Dial once, run the command, close the connection, and turn the
    /// outcome into an exit status.
    pub async fn run(self) -> ExitCode {
        let config = self.config();
        let mut conn = match Connection::connect(&config).await {
            Ok(conn) => Some(conn),
            Err(error) => {
                debug!(%error, "dial failed");
                eprintln!(
                    "Warning: can't connect to beanstalk on {} (use -b arg to specify correct connection addr:port)",
                    config.endpoint
                );
                None
            }
        };

        let mut printer = Printer::stdout(self.format);
        let result = dispatch(&self.args, conn.as_mut(), &mut printer).await;

        if let Some(conn) = conn {
            if let Err(error) = conn.close().await {
                debug!(%error, "failed to close connection");
            }
        }

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(CliError::NoCommand) => {
                println!("{}", usage());
                CliError::NoCommand.exit_code()
            }
            Err(error) => {
                eprintln!("{error}");
                error.exit_code()
            }
        }
    }
}
