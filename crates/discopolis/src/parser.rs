use std::sync::LazyLock;

use crate::types::{EpisodeRecord, UNTITLED};

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::error::Category;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid embedded metadata: {0}")]
    InvalidMetadata(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

const DATE_LABEL_PREFIX: &str = "Fecha de Emisión: ";
const DURATION_LABEL_PREFIX: &str = "Duración: ";

static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.elemento").expect("invalid selector: item"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.maintitle").expect("invalid selector: title"));
static MEDIA_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.goto_media").expect("invalid selector: media link"));
static DATE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.datpub").expect("invalid selector: date"));
static DURATION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.duration").expect("invalid selector: duration"));
static DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.detalle").expect("invalid selector: description"));
static NEXT_PAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.siguiente a").expect("invalid selector: next page"));

/// Where relative links and id-derived playback URLs point to.
#[derive(Debug, Clone, Copy)]
pub struct LinkBase<'a> {
    pub site_origin: &'a str,
    pub media_base_url: &'a str,
}

impl Default for LinkBase<'static> {
    fn default() -> Self {
        Self {
            site_origin: crate::SITE_ORIGIN,
            media_base_url: crate::MEDIA_BASE_URL,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedMetadata {
    #[serde(rename = "idAsset")]
    id_asset: Option<AssetId>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AssetId {
    Text(String),
    Number(serde_json::Number),
}

impl AssetId {
    fn into_string(self) -> String {
        match self {
            AssetId::Text(s) => s.trim().to_string(),
            AssetId::Number(n) => n.to_string(),
        }
    }
}

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn label_without_prefix(element: ElementRef, prefix: &str) -> String {
    element
        .value()
        .attr("aria-label")
        .map(|label| {
            let label = label.trim();
            label.strip_prefix(prefix).unwrap_or(label).trim().to_string()
        })
        .unwrap_or_default()
}

/// Parses every episode entry on a listing page, in markup order. Entries that
/// cannot be parsed are logged and left out.
pub fn parse_episode_page(html: &str) -> Vec<EpisodeRecord> {
    parse_episode_page_with(html, LinkBase::default())
}

pub fn parse_episode_page_with(html: &str, links: LinkBase) -> Vec<EpisodeRecord> {
    let document = Html::parse_document(html);
    let mut episodes = Vec::new();

    for (i, item) in document.select(&ITEM_SELECTOR).enumerate() {
        match parse_episode_item(item, links) {
            Ok(episode) => episodes.push(episode),
            Err(e) => log::warn!("Skipping episode item {}: {}", i + 1, e),
        }
    }

    episodes
}

/// Whether the page links to a following page of results.
pub fn has_next_page(html: &str) -> bool {
    Html::parse_document(html)
        .select(&NEXT_PAGE_SELECTOR)
        .next()
        .is_some()
}

/// Raw `data-setup` payloads of the items on a page, for diagnostics.
pub fn embedded_metadata_payloads(html: &str) -> Vec<String> {
    Html::parse_document(html)
        .select(&ITEM_SELECTOR)
        .filter_map(|item| item.value().attr("data-setup").map(str::to_string))
        .collect()
}

fn parse_embedded_metadata(item: ElementRef) -> Result<EmbeddedMetadata, ParseError> {
    let Some(raw) = item.value().attr("data-setup") else {
        log::warn!("Episode item has no data-setup attribute");
        return Ok(EmbeddedMetadata::default());
    };

    match serde_json::from_str::<EmbeddedMetadata>(raw) {
        Ok(metadata) => Ok(metadata),
        Err(e) if matches!(e.classify(), Category::Syntax | Category::Eof) => {
            log::warn!("Could not decode data-setup, ignoring it: {}", e);
            Ok(EmbeddedMetadata::default())
        }
        Err(e) => Err(ParseError::InvalidMetadata(e.to_string())),
    }
}

fn resolve_link(href: &str, site_origin: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!(
            "{}/{}",
            site_origin.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

fn parse_episode_item(item: ElementRef, links: LinkBase) -> Result<EpisodeRecord, ParseError> {
    let metadata = parse_embedded_metadata(item)?;

    let id = metadata
        .id_asset
        .map(AssetId::into_string)
        .unwrap_or_default();

    let title = item
        .select(&TITLE_SELECTOR)
        .next()
        .map(|e| elem_text(e).trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            metadata
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| UNTITLED.to_string());

    let media_href = match item.select(&MEDIA_LINK_SELECTOR).next() {
        Some(link) => Some(
            link.value()
                .attr("href")
                .ok_or_else(|| ParseError::MissingField("media link href".to_string()))?,
        ),
        None => None,
    };

    let url = media_href
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| resolve_link(href, links.site_origin))
        .unwrap_or_else(|| {
            if id.is_empty() {
                String::new()
            } else {
                format!("{}{}/", links.media_base_url, id)
            }
        });

    let broadcast_date = item
        .select(&DATE_SELECTOR)
        .next()
        .map(|e| label_without_prefix(e, DATE_LABEL_PREFIX))
        .unwrap_or_default();

    let duration = item
        .select(&DURATION_SELECTOR)
        .next()
        .map(|e| label_without_prefix(e, DURATION_LABEL_PREFIX));

    let description = item
        .select(&DESCRIPTION_SELECTOR)
        .next()
        .map(|e| normalize_whitespace(&elem_text(e)));

    Ok(EpisodeRecord {
        id,
        title,
        url,
        broadcast_date,
        duration,
        description,
    })
}
