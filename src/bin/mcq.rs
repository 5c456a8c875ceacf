use std::{process::ExitCode, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mc_probe::{
    execute_command, query_status, ServerAddress, DEFAULT_RCON_PORT, DEFAULT_STATUS_PORT,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Query a minecraft server's status or run an RCON command", long_about = None)]
struct Args {
    #[arg(long, short, default_value_t = 5.0, help = "Seconds to wait for connecting and for each response")]
    timeout: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server's status as JSON
    Status {
        #[arg(help = "host[:port], port defaults to 25565")]
        address: String,
    },
    /// Run one command over RCON and print its output
    Rcon {
        #[arg(help = "host[:port], port defaults to 25575")]
        address: String,

        #[arg(long, short)]
        password: String,

        #[arg(required = true, trailing_var_arg = true, help = "Command to run; words are joined with spaces")]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let timeout = Duration::try_from_secs_f64(args.timeout).context("invalid --timeout")?;
    debug!(?timeout, "starting");

    match args.command {
        Command::Status { address } => {
            let address = ServerAddress::parse_with_default(&address, DEFAULT_STATUS_PORT)?;
            let status = query_status(&address, timeout).await;
            println!("{}", serde_json::to_string_pretty(&status)?);

            Ok(if status.online {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Rcon {
            address,
            password,
            command,
        } => {
            let address = ServerAddress::parse_with_default(&address, DEFAULT_RCON_PORT)?;
            let output = execute_command(&address, &password, &command.join(" "), timeout)
                .await
                .with_context(|| format!("rcon command on {address} failed"))?;
            println!("{output}");

            Ok(ExitCode::SUCCESS)
        }
    }
}
