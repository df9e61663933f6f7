mod cache;
mod cli;
mod commands;
mod discovery;
mod dispatch;
mod error;
mod host;
mod normalize;
mod paths;
mod runtime;
mod schema;
mod trace;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use std::io::Read;

use cache::CacheStore;
use cli::{Cli, Command, InputArgs};
use error::{DscBridgeError, EXIT_FAILURE};
use host::{Method, PwshHost};
use runtime::RuntimeInfo;

fn main() {
    let cli = Cli::parse();
    trace::init(cli.trace_level);

    if let Err(e) = run(cli) {
        // Relay the failure on the trace protocol, then abort the whole
        // invocation with the category's exit code.
        log::error!("{e:#}");
        let code = e
            .downcast_ref::<DscBridgeError>()
            .map_or(EXIT_FAILURE, DscBridgeError::exit_code);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = RuntimeInfo::current();
    let store = CacheStore::at_default_location()?;
    let host = PwshHost::default();

    match cli.command {
        Command::List => commands::list::run(&store, &host, runtime),
        Command::Get(args) => invoke(Method::Get, args, &store, &host, runtime),
        Command::Set(args) => invoke(Method::Set, args, &store, &host, runtime),
        Command::Test(args) => invoke(Method::Test, args, &store, &host, runtime),
        Command::Export(args) => invoke(Method::Export, args, &store, &host, runtime),
        Command::Validate(args) => commands::validate::run(&read_input(args)?),
        Command::ClearCache => commands::cache::clear(&store),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dscbridge", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn invoke(
    method: Method,
    args: InputArgs,
    store: &CacheStore,
    host: &PwshHost,
    runtime: RuntimeInfo,
) -> Result<()> {
    let input = read_input(args)?;
    commands::invoke::run(method, &input, store, host, host, runtime)
}

fn read_input(args: InputArgs) -> Result<String> {
    match args.input {
        Some(input) => Ok(input),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read request envelope from stdin")?;
            Ok(buffer)
        }
    }
}
