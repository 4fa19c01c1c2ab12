use std::fmt::Display;
use std::str::FromStr;

use crate::types::EpisodeRecord;

const SEPARATOR: &str = "----------------------------------------";

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not flush CSV output: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid output format '{0}'. Accepted values: 'json', 'csv', 'text'")]
pub struct OutputFormatParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Text,
}

impl FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "text" => Ok(OutputFormat::Text),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

pub fn render(episodes: &[EpisodeRecord], format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(episodes)?),
        OutputFormat::Csv => render_csv(episodes),
        OutputFormat::Text => Ok(render_text(episodes)),
    }
}

/// Columns come from the first record only; later records with other optional
/// fields get empty cells or lose the extra ones.
fn render_csv(episodes: &[EpisodeRecord]) -> Result<String, FormatError> {
    let Some(first) = episodes.first() else {
        return Ok(String::new());
    };

    let columns = first.field_names();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for episode in episodes {
        writer.write_record(columns.iter().map(|c| episode.field_value(c)))?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn render_text(episodes: &[EpisodeRecord]) -> String {
    episodes
        .iter()
        .map(|e| format!("{}{}\n", e, SEPARATOR))
        .collect()
}
