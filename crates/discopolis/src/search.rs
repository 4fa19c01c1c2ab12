use std::sync::LazyLock;

use crate::scraper::{PageSource, WebScraper, walk_month};
use crate::types::{DateWindow, EpisodeRecord};

use regex::Regex;

static RE_EPISODE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("invalid regex: episode number")
});

/// Strips surrounding whitespace and every `.` from a user supplied number.
pub fn normalize_episode_number(input: &str) -> String {
    input.trim().replace('.', "")
}

/// Numeric designator a title starts with, normalized like user input.
pub fn title_episode_number(title: &str) -> Option<String> {
    RE_EPISODE_NUMBER
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace('.', ""))
}

/// Scans every month of `window`, oldest first, and returns the first episode
/// whose title number equals `episode`. Nothing is cached between calls.
pub async fn find_episode<S: PageSource>(
    source: &S,
    window: &DateWindow,
    episode: &str,
    max_pages: u32,
) -> Option<EpisodeRecord> {
    let wanted = normalize_episode_number(episode);
    if wanted.is_empty() || !wanted.chars().all(|c| c.is_ascii_digit()) {
        log::warn!("'{}' is not an episode number", episode.trim());
        return None;
    }

    for (month, year) in window.months() {
        log::info!("Searching episode {} in {:02}/{}...", wanted, month, year);
        let found = walk_month(source, month, year, max_pages)
            .await
            .into_iter()
            .find(|e| e.episode_number().as_deref() == Some(wanted.as_str()));

        if found.is_some() {
            return found;
        }
    }

    log::info!("Episode {} not found in {}", wanted, window);
    None
}

impl WebScraper {
    /// Looks an episode up by number across the whole broadcast window.
    pub async fn find_episode(&self, episode: &str) -> Option<EpisodeRecord> {
        find_episode(
            self,
            &DateWindow::DISCOPOLIS,
            episode,
            self.config().max_pages,
        )
        .await
    }
}
