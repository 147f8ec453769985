use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod config;
use config::{Config, DEFAULT_BASE_URL, DEFAULT_COOKIE_NAME};

mod downloader;
use downloader::{AudioAssembler, Context, CourseProcessor, FailurePolicy};

mod error;
use error::Result;

mod fetcher;
mod scraper;
mod utils;

#[cfg(test)]
mod test_support;

#[derive(Debug, Parser)]
#[command(name = "webwocnurse")]
#[command(about = "Download the audio lessons of a webwocnurse course")]
#[command(version = "1.0")]
struct Cli {
    #[arg(short, long, help = "Value of the TotaraSessionprod cookie")]
    cookie: String,
    #[arg(short, long, help = "Log every request")]
    debug: bool,
    #[arg(long, help = "Name of the session cookie", default_value = DEFAULT_COOKIE_NAME)]
    cookie_name: String,
    #[arg(long, help = "Platform address", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(short, long, help = "Directory for the mp3 files", default_value = ".")]
    output_dir: PathBuf,
    #[arg(
        long,
        help = "Maximum modules processed at once (default: all)",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    concurrency: Option<u32>,
    #[arg(long, help = "Stop at the first module that fails")]
    fail_fast: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List all audio for a course
    List {
        #[arg(value_name = "COURSE_ID")]
        course_id: String,
    },
    /// Download all audio for a course
    #[command(alias = "a")]
    Download {
        #[arg(value_name = "COURSE_ID")]
        course_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli).await {
        println!();
        println!("{}", e);
        if e.is_authentication() {
            println!("The session cookie was rejected. Copy a fresh TotaraSessionprod value from the browser.");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::new(cli.cookie)
        .with_cookie_name(cli.cookie_name)
        .with_base_url(cli.base_url)
        .with_debug(cli.debug);
    let ctx = Context::new(config)?;
    debug!(base_url = %ctx.config.base_url, "configured");

    let processor = CourseProcessor::new(ctx.clone())
        .with_concurrency(cli.concurrency.map(|n| n as usize))
        .with_policy(if cli.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        });

    match cli.command {
        Commands::List { course_id } => downloader::list_course(&processor, &course_id).await,
        Commands::Download { course_id } => {
            let assembler = AudioAssembler::new(ctx);
            downloader::download_course(&processor, &assembler, cli.output_dir, &course_id)
                .await
                .map(|_| ())
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,webwocnurse=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
