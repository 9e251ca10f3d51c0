mod urls;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[clap(version, about)]
/// Generate the list of game paths requested by the load test
struct Cli {
    #[clap(flatten)]
    args: urls::UrlArgs,

    #[clap(short, long, action = clap::ArgAction::Count)]
    /// Log more detail (repeat for debug output)
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    urls::generate(&cli.args)?;

    Ok(())
}
