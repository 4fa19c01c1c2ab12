pub mod download;
pub mod format;
pub mod parser;
pub mod scraper;
pub mod search;
pub mod types;

pub use download::{DownloadError, Downloader};
pub use format::{FormatError, OutputFormat};
pub use parser::{LinkBase, ParseError};
pub use scraper::{PageSource, ScraperConfig, ScraperError, WebScraper};
pub use types::{DateWindow, EpisodeRecord};

pub(crate) const SITE_ORIGIN: &str = "https://www.rtve.es";
pub(crate) const LISTING_URL: &str = "https://www.rtve.es/play/modulos/capitulos/1955/";
pub(crate) const MEDIA_BASE_URL: &str = "https://www.rtve.es/play/audios/discopolis/";
