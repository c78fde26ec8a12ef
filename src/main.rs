mod budget;
mod core;
mod display;
mod plaid;
mod render;
mod settings;
mod spending;
mod upstream;
mod weather;

use anyhow::Result;
use clap::{arg, Command};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::settings::Settings;

static CLIENT_NAME: &str = "budget-display";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run() -> Result<()> {
    let app = Command::new(CLIENT_NAME)
        .about("The budget-display utility pulls recent transactions from Plaid, \
         totals the day, week and month of spending, and renders them as a \
         grayscale image for an e-ink display.")
        .version("0.1.0")
        .subcommand_required(true)
        .allow_external_subcommands(false)
        .arg(arg!(CONFIG: -c --config [FILE] "Sets a custom config file"))
        .arg(arg!(verbose: -v --verbose "Logs progress to stderr"))
        .subcommand(Command::new("render")
            .about("Fetches transactions and writes the display image.")
            .arg(arg!(output: -o --output [FILE] "Where to write the PNG, defaults to the configured output path."))
            .arg(arg!(demo: --demo "Renders sample figures without calling Plaid."))
            .arg(arg!(no_weather: --"no-weather" "Skips the current weather block."))
            .arg(arg!(date: --date [DATE] "Renders as of the given day (YYYY-MM-DD) instead of today.")))
        .subcommand(Command::new("summary")
            .about("Prints the spending totals and the transactions behind them.")
            .arg(arg!(demo: --demo "Prints sample figures without calling Plaid."))
            .arg(arg!(date: --date [DATE] "Summarizes as of the given day (YYYY-MM-DD) instead of today.")));

    let matches = app.get_matches();

    if matches.is_present("verbose") || std::env::var_os("RUST_LOG").is_some() {
        init_tracing();
    }

    let settings = Settings::new(matches.value_of("CONFIG"))?;
    budget::run(&matches, settings).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
