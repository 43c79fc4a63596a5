//! Turning the channel listing page into table rows.
//!
//! The listing loads lazily, so it is first scrolled until its height stops
//! growing, then the document is scraped with ordered fallback selectors.

use scraper::{ElementRef, Html, Selector};
use subsweep_core::ChannelRecord;
use url::Url;

use crate::settings::ScrollSettings;
use crate::surface::ScrollSurface;
use crate::TransportError;

pub const NO_DESCRIPTION: &str = "No description available";
pub const UNKNOWN_SUBSCRIBERS: &str = "N/A";

const SUBSCRIBED_SUFFIX: &str = "Subscribed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    /// Scrolls performed.
    pub attempts: usize,
    pub final_extent: u64,
    /// False when the attempt cap was hit while the page was still growing.
    pub stabilized: bool,
}

/// Scrolls to the bottom until two consecutive measurements agree, or until
/// `max_attempts` scrolls have been made.
pub async fn stabilize_scroll<S: ScrollSurface + ?Sized>(
    surface: &S,
    settings: &ScrollSettings,
) -> Result<ScrollReport, TransportError> {
    let mut last = surface.content_extent().await?;
    let mut attempts = 0;
    while attempts < settings.max_attempts {
        surface.scroll_to_bottom().await?;
        attempts += 1;
        tokio::time::sleep(settings.settle()).await;
        let extent = surface.content_extent().await?;
        sweep_logging::sweep_debug!("Scroll {attempts}: extent {last} -> {extent}");
        if extent == last {
            return Ok(ScrollReport {
                attempts,
                final_extent: extent,
                stabilized: true,
            });
        }
        last = extent;
    }
    sweep_logging::sweep_warn!(
        "Listing still growing after {} scrolls; scraping what is loaded",
        settings.max_attempts
    );
    Ok(ScrollReport {
        attempts,
        final_extent: last,
        stabilized: false,
    })
}

/// Ordered selector lists, tried first to last. The first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRules {
    pub entries: Vec<String>,
    pub name: Vec<String>,
    pub url: Vec<String>,
    pub subscribers: Vec<String>,
    pub description: Vec<String>,
}

impl Default for ScrapeRules {
    fn default() -> Self {
        let owned =
            |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            entries: owned(&[
                "ytd-channel-renderer",
                "div#contents ytd-channel-renderer",
                "ytd-grid-channel-renderer",
            ]),
            name: owned(&[
                "a#main-link yt-formatted-string",
                "yt-formatted-string#text",
                "h3 a",
                "a[href*=\"/channel/\"] yt-formatted-string",
                "a[href*=\"/@\"] yt-formatted-string",
            ]),
            url: owned(&["a#main-link", "a[href*=\"/channel/\"]", "a[href*=\"/@\"]"]),
            subscribers: owned(&["span#subscribers", "span[class*=\"subscriber\"]"]),
            description: owned(&[
                "yt-formatted-string#description-text",
                "div[class*=\"description\"]",
                "#description-text",
                ".description",
            ]),
        }
    }
}

/// Compiled form of [`ScrapeRules`]. Selectors that fail to parse are skipped.
pub struct ChannelScraper {
    entries: Vec<Selector>,
    name: Vec<Selector>,
    url: Vec<Selector>,
    subscribers: Vec<Selector>,
    description: Vec<Selector>,
}

impl Default for ChannelScraper {
    fn default() -> Self {
        Self::new(&ScrapeRules::default())
    }
}

impl ChannelScraper {
    pub fn new(rules: &ScrapeRules) -> Self {
        let compile = |list: &[String]| -> Vec<Selector> {
            list.iter()
                .filter_map(|raw| match Selector::parse(raw) {
                    Ok(selector) => Some(selector),
                    Err(err) => {
                        sweep_logging::sweep_warn!("Ignoring selector {raw:?}: {err:?}");
                        None
                    }
                })
                .collect()
        };
        Self {
            entries: compile(&rules.entries),
            name: compile(&rules.name),
            url: compile(&rules.url),
            subscribers: compile(&rules.subscribers),
            description: compile(&rules.description),
        }
    }

    /// Scrapes every channel entry. Entries missing a name or a URL are dropped.
    ///
    /// Relative links resolve against `base_url`; `date` fills `date_collected`.
    pub fn scrape(&self, html: &str, base_url: Option<&str>, date: &str) -> Vec<ChannelRecord> {
        let doc = Html::parse_document(html);
        let base = base_url.and_then(|raw| Url::parse(raw).ok());

        let entries: Vec<ElementRef<'_>> = self
            .entries
            .iter()
            .map(|selector| doc.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let name = first_text(entry, &self.name);
            let url = self.first_href(entry, base.as_ref());
            let (Some(channel_name), Some(channel_url)) = (name, url) else {
                sweep_logging::sweep_debug!("Skipping channel entry {index}: no name or link");
                continue;
            };
            records.push(ChannelRecord {
                channel_name,
                channel_url,
                subscriber_count: first_text(entry, &self.subscribers)
                    .unwrap_or_else(|| UNKNOWN_SUBSCRIBERS.to_string()),
                description: self.description(entry),
                unsubscribe: String::new(),
                date_collected: date.to_string(),
            });
        }
        records
    }

    fn first_href(&self, entry: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        self.url
            .iter()
            .filter_map(|selector| entry.select(selector).next())
            .filter_map(|link| link.value().attr("href"))
            .find_map(|href| resolve_url(href, base))
    }

    fn description(&self, entry: ElementRef<'_>) -> String {
        let from_selectors = self
            .description
            .iter()
            .filter_map(|selector| entry.select(selector).next())
            .map(|node| clean_description(&node.text().collect::<String>()))
            .find(|text| !text.is_empty());
        if let Some(text) = from_selectors {
            return text;
        }

        // Without a dedicated element, the description is whatever text follows
        // the name line and the handle/subscriber line.
        let lines: Vec<&str> = entry
            .text()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let fallback = if lines.len() > 2 {
            clean_description(&lines[2..].join(" "))
        } else {
            String::new()
        };
        if fallback.is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            fallback
        }
    }
}

fn first_text(entry: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|selector| entry.select(selector).next())
        .map(|node| collapse_whitespace(&node.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

/// Drops the trailing "Subscribed" button caption the listing renders inline.
fn clean_description(raw: &str) -> String {
    let text = collapse_whitespace(raw);
    match text.strip_suffix(SUBSCRIBED_SUFFIX) {
        Some(rest) => rest.trim_end().to_string(),
        None => text,
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.to_string());
    }
    base.and_then(|base| base.join(trimmed).ok())
        .map(|url| url.to_string())
}
