use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use bjt_fit::config::Config;
use bjt_fit::{analysis, plot, report};

const DEFAULT_CONFIG: &str = "analysis.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Fit BJT output characteristics and derive beta, V_A and g_o")]
struct Cli {
    /// Analysis description, `analysis.toml` or the built-in two dataset run when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Chart destination, overrides the configured `output`
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Plot the data points only
    #[arg(long)]
    no_fits: bool,
}

fn load_config(cli: &Cli) -> bjt_fit::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            Config::from_file(Path::new(DEFAULT_CONFIG))?
        }
        None => {
            log::info!("no {DEFAULT_CONFIG} found, running the built-in analysis");
            Config::default()
        }
    };
    if let Some(output) = &cli.output {
        config.output.clone_from(output);
    }
    if cli.no_fits {
        config.draw_fits = false;
    }
    Ok(config)
}

fn run(cli: &Cli) -> bjt_fit::Result<()> {
    let config = load_config(cli)?;
    let analysis = analysis::run(&config)?;

    report::write_report(&mut io::stdout().lock(), &analysis)?;
    if let Some(summary) = &config.summary {
        report::write_summary(summary, &analysis)?;
    }
    plot::render(&analysis.datasets, &config)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
