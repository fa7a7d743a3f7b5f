//! Entrypoint of the cinder3 binary

use cinder3_clap_blocks::tokio::TokioRuntimeConfig;
use dotenvy::dotenv;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod collect;
    pub(crate) mod common;
    pub(crate) mod list;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "cinder3",
    version,
    disable_help_flag = true,
    arg(
        clap::Arg::new("help")
            .short('h')
            .long("help")
            .help("Print help information")
            .action(clap::ArgAction::Help)
            .global(true)
    ),
    about = "Cinder block storage utilization collector",
    long_about = r#"Cinder block storage utilization collector

Collects volume, snapshot and quota metrics of every tenant of an OpenStack cloud.

Examples:
    # List every metric that can be collected
    cinder3 list --endpoint http://keystone:5000 --user admin --password secret --tenant admin

    # Collect two metrics once
    cinder3 collect intel/openstack/cinder/demo/volumes/count \
        intel/openstack/cinder/demo/limits/MaxTotalVolumes

    # Collect every metric once a minute, until interrupted, with debug logging
    LOG_FILTER=debug cinder3 collect --interval 1m

Credentials are read from CINDER3_ENDPOINT, CINDER3_USER, CINDER3_PASSWORD and CINDER3_TENANT
when not given as arguments, including from a .env file in the working directory.
"#
)]
struct Config {
    #[clap(flatten)]
    runtime_config: TokioRuntimeConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// List every metric namespace that can be collected
    List(commands::list::Config),

    /// Collect the values of metric namespaces
    Collect(commands::collect::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    let tokio_runtime = config.runtime_config.builder()?.build()?;

    tokio_runtime.block_on(async move {
        fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
            match r {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Initializing logs failed: {e}");
                    std::process::exit(ReturnCode::Failure as _);
                }
            }
        }

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::List(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.common.logging_config));
                if let Err(e) = commands::list::command(config).await {
                    eprintln!("List command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Collect(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.common.logging_config));
                if let Err(e) = commands::collect::command(config).await {
                    eprintln!("Collect command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // Ignore this - a missing env file is not an error, defaults will
            // be applied when initialising the Config struct.
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(1);
        }
    };
}

fn init_logs_and_tracing(
    config: &trogging::cli::LoggingConfig,
) -> Result<TroggingGuard, trogging::Error> {
    let log_layer = trogging::Builder::new()
        .with_default_log_filter("info")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(log_layer);
    trogging::install_global(subscriber)
}
