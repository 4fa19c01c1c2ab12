use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use discopolis::format::render;
use discopolis::scraper::WebScraper;
use discopolis::{DateWindow, Downloader, OutputFormat};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "discopolis")]
#[command(about = "List, find and download episodes of the Discópolis radio archive", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List every episode broadcast in a given month
    List {
        #[arg(help = "Month of the broadcast (1-12)")]
        month: u32,

        #[arg(help = "Year of the broadcast")]
        year: i32,

        #[arg(
            short = 'o',
            long = "output",
            value_parser = parse_format,
            default_value = "text",
            help = "Output format (json, csv, text)"
        )]
        format: OutputFormat,
    },
    /// Find an episode by its number and open it in the browser
    Play {
        #[arg(help = "Episode number, e.g. 10939 or 10.939")]
        episode: String,

        #[arg(long, help = "Enable debug logging")]
        debug: bool,
    },
    /// Download an episode's audio into the cache directory
    Download {
        #[arg(help = "Episode number, used to name the file")]
        episode: String,

        #[arg(help = "Direct URL of the episode audio")]
        audio_url: String,

        #[arg(long, default_value = "downloads", help = "Directory for downloaded audio")]
        cache_dir: PathBuf,
    },
    /// Issue a single listing request and report what the site returns
    #[command(hide = true)]
    Analyze {
        #[arg(long, default_value_t = DateWindow::DISCOPOLIS.end().0)]
        month: u32,

        #[arg(long, default_value_t = DateWindow::DISCOPOLIS.end().1)]
        year: i32,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(s).map_err(|e| e.to_string())
}

fn out_of_range_message(window: &DateWindow, month: u32, year: i32) -> Option<String> {
    (!window.contains(month, year))
        .then(|| format!("Date {:02}/{} is outside the archive ({})", month, year, window))
}

fn new_scraper() -> WebScraper {
    WebScraper::new().unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match &cli.command {
        Commands::Play { debug: true, .. } => LevelFilter::Debug,
        _ => cli.log_level.clone().into(),
    };
    env_logger::Builder::new().filter_level(level).init();

    match cli.command {
        Commands::List {
            month,
            year,
            format,
        } => {
            if let Some(message) = out_of_range_message(&DateWindow::DISCOPOLIS, month, year) {
                eprintln!("{}", message);
                return;
            }

            let scraper = new_scraper();
            let episodes = scraper.fetch_month(month, year).await;
            if episodes.is_empty() {
                eprintln!("No episodes found for {:02}/{}", month, year);
                return;
            }

            log::debug!("Rendering {} episode(s) as {}", episodes.len(), format);
            let output = render(&episodes, format).unwrap_or_else(|e| {
                log::error!("Error formatting episodes: {}", e);
                process::exit(1);
            });
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
        }

        Commands::Play { episode, .. } => {
            let scraper = new_scraper();
            log::info!("Searching episode {} in {}...", episode, DateWindow::DISCOPOLIS);

            let Some(found) = scraper.find_episode(&episode).await else {
                println!("Episode {} was not found", episode.trim());
                return;
            };

            print!("{}", found);
            if found.url.is_empty() {
                println!("No playback URL available for this episode");
                return;
            }

            println!("URL: {}", found.url);
            if let Err(e) = webbrowser::open(&found.url) {
                log::error!("Could not open the browser: {}", e);
                process::exit(1);
            }
        }

        Commands::Download {
            episode,
            audio_url,
            cache_dir,
        } => {
            let downloader = Downloader::new(cache_dir).unwrap_or_else(|e| {
                log::error!("Error creating downloader: {}", e);
                process::exit(1);
            });

            let path = downloader
                .download(&audio_url, &episode, |written, total| {
                    let mut stderr = std::io::stderr();
                    let _ = match total {
                        Some(total) => write!(stderr, "\r{} / {} bytes", written, total),
                        None => write!(stderr, "\r{} bytes", written),
                    };
                    let _ = stderr.flush();
                })
                .await
                .unwrap_or_else(|e| {
                    eprintln!();
                    log::error!("Error downloading episode {}: {}", episode, e);
                    process::exit(1);
                });

            eprintln!();
            println!("{}", path.display());
        }

        Commands::Analyze { month, year, page } => {
            let scraper = new_scraper();
            let report = scraper.analyze(month, year, page).await.unwrap_or_else(|e| {
                log::error!("Error analyzing listing page: {}", e);
                process::exit(1);
            });
            log::info!(
                "Status {}, {} bytes, {} item(s), next page: {}",
                report.status,
                report.bytes,
                report.items,
                report.has_next_page
            );
            print!("{}", report);
        }
    }
}
