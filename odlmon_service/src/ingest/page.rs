//! Station page reader.
//!
//! The BfS station page shows the current dose rate as
//! `<p class="aktmw"> ... <strong class="js-decimal">0,082</strong> ... </p>`.
//! The served document usually carries that element empty; the page's
//! scripts fill it from the `odlinfo_odl_1h_latest` WFS layer. So the page is
//! loaded once, and when the element has no text the value is read from that
//! layer and rendered the way the page renders it (decimal comma).
//!
//! HTML handling is plain case-insensitive string slicing; the page is small
//! and we only need one element.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

use super::wfs::value_text;
use super::{FetchOutcome, Fetcher, build_client};
use crate::logging::DataSource;
use crate::model::{DOSE_RATE_UNIT, FetchError, Measurement};

/// WFS layer holding the newest value per station, as used by the page.
const PAGE_DATA_LAYER: &str = "opendata:odlinfo_odl_1h_latest";

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

pub fn build_page_url(page_url: &str, station_id: &str) -> String {
    format!("{}?id={}", page_url, station_id)
}

/// `GetFeature` for the page's latest-value layer, filtered to one station.
pub fn build_page_data_url(data_url: &str, station_id: &str) -> String {
    format!(
        "{}?service=WFS&version=1.1.0&request=GetFeature&typeName={}\
         &outputFormat=application/json&CQL_FILTER=kenn%3D%27{}%27",
        data_url, PAGE_DATA_LAYER, station_id
    )
}

// ---------------------------------------------------------------------------
// HTML extraction
// ---------------------------------------------------------------------------

/// Returns the trimmed text of `p.aktmw > strong.js-decimal`, or `None` if
/// the element is missing or empty.
pub fn extract_dose_rate(html: &str) -> Option<String> {
    let lc = html.to_ascii_lowercase();
    let mut from = 0;

    while let Some((start, open_end, block_end)) = next_element(&lc, "p", from) {
        if has_class(&lc[start..open_end], "aktmw") {
            if let Some(text) = strong_decimal_text(html, &lc, open_end..block_end) {
                return Some(text);
            }
        }
        from = open_end;
    }
    None
}

/// Finds the next `<name ...>` at or after `from` and returns
/// (start of opening tag, end of opening tag, start of closing tag). Nesting
/// of the same element is not tracked; neither `<p>` nor `<strong>` nests on
/// this page.
fn next_element(lc: &str, name: &str, from: usize) -> Option<(usize, usize, usize)> {
    let open_pat = format!("<{}", name);
    let close_pat = format!("</{}", name);
    let mut at = from;

    loop {
        let start = lc.get(at..)?.find(&open_pat)? + at;
        let after_name = start + open_pat.len();
        // `<p` must not match `<pre` or `<param`
        match lc.as_bytes().get(after_name) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {}
            _ => {
                at = after_name;
                continue;
            }
        }
        let open_end = lc[start..].find('>')? + start + 1;
        let close = lc[open_end..].find(&close_pat)? + open_end;
        return Some((start, open_end, close));
    }
}

/// Checks whether an opening tag carries `class` token `wanted`.
fn has_class(open_tag: &str, wanted: &str) -> bool {
    attribute_value(open_tag, "class")
        .is_some_and(|value| value.split_whitespace().any(|token| token == wanted))
}

/// Value of attribute `name` in a lowercased opening tag. Attribute names are
/// matched whole, and whitespace around `=` is allowed.
fn attribute_value<'a>(open_tag: &'a str, name: &str) -> Option<&'a str> {
    let inner = open_tag.trim_start_matches('<').trim_end_matches('>');
    // skip the element name
    let mut rest = inner.trim_start_matches(|c: char| !c.is_ascii_whitespace());

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
        if rest.is_empty() {
            return None;
        }
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let attr = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                match after.chars().next() {
                    Some(q @ ('"' | '\'')) => {
                        let body = &after[1..];
                        let end = body.find(q).unwrap_or(body.len());
                        rest = body.get(end + 1..).unwrap_or("");
                        &body[..end]
                    }
                    _ => {
                        let end = after.find(|c: char| c.is_ascii_whitespace()).unwrap_or(after.len());
                        rest = &after[end..];
                        &after[..end]
                    }
                }
            }
            None => "",
        };

        if attr == name {
            return Some(value);
        }
    }
}

fn strong_decimal_text(html: &str, lc: &str, within: std::ops::Range<usize>) -> Option<String> {
    let mut from = within.start;
    while let Some((start, open_end, close)) = next_element(lc, "strong", from) {
        if close > within.end {
            return None;
        }
        if has_class(&lc[start..open_end], "js-decimal") {
            let text = strip_tags(&html[open_end..close]);
            let text = text.replace("&nbsp;", " ");
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
        from = open_end;
    }
    None
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Page data
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageDataCollection {
    features: Vec<PageDataFeature>,
}

#[derive(Debug, Deserialize)]
struct PageDataFeature {
    properties: PageDataProperties,
}

#[derive(Debug, Deserialize)]
struct PageDataProperties {
    value: Option<serde_json::Value>,
}

/// Parses the latest-value layer into the text the page would display.
///
/// No feature or a `null` value leaves the element empty on the page, so both
/// map to [`FetchError::ElementMissing`].
pub fn parse_page_data(body: &str) -> Result<String, FetchError> {
    let collection: PageDataCollection =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let Some(feature) = collection.features.into_iter().next() else {
        return Err(FetchError::ElementMissing);
    };
    if feature.properties.value.is_none() {
        return Err(FetchError::ElementMissing);
    }
    let text = value_text(feature.properties.value)?;
    Ok(text.replacen('.', ",", 1))
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct PageFetcher {
    page_url: String,
    data_url: String,
    user_agent: String,
}

impl PageFetcher {
    pub fn new(
        page_url: impl Into<String>,
        data_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            page_url: page_url.into(),
            data_url: data_url.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Loads the page and, if its value element is empty, the page's data
    /// layer. Both requests share the one `timeout`.
    ///
    /// The HTTP client lives only for this call, so its connections are
    /// released on every return path.
    pub async fn read_value(
        &self,
        station_id: &str,
        timeout: Duration,
    ) -> Result<Measurement, FetchError> {
        let client = build_client(&self.user_agent)
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let secs = timeout.as_secs();
        // No deadline when `timeout` is too large to represent; each request
        // then gets the full timeout.
        let deadline = Instant::now().checked_add(timeout);
        let remaining = || match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()),
            None => timeout,
        };

        let url = build_page_url(&self.page_url, station_id);
        debug!(source = %DataSource::Page, station = station_id, "loading {} (timeout {}s)", url, secs);
        let html = get_text(&client, &url, remaining())
            .await
            .map_err(|e| e.into_fetch_error(secs))?;

        let value = match extract_dose_rate(&html) {
            Some(value) => value,
            None => {
                let left = remaining();
                if left.is_zero() {
                    return Err(FetchError::ElementMissing);
                }
                let data_url = build_page_data_url(&self.data_url, station_id);
                debug!(source = %DataSource::Page, station = station_id, "value not in served page, reading {}", data_url);
                let body = get_text(&client, &data_url, left).await.map_err(|e| match e {
                    // The page loaded, its value just never arrived.
                    GetError::Request(err) if err.is_timeout() => FetchError::ElementMissing,
                    other => other.into_fetch_error(secs),
                })?;
                parse_page_data(&body)?
            }
        };

        Ok(Measurement {
            name: None,
            value,
            unit: DOSE_RATE_UNIT.to_string(),
            timestamp: None,
            retrieved_at: Local::now().naive_local(),
        })
    }
}

enum GetError {
    Request(reqwest::Error),
    Status(u16),
}

impl GetError {
    fn into_fetch_error(self, timeout_secs: u64) -> FetchError {
        match self {
            GetError::Request(e) => FetchError::from_reqwest(e, timeout_secs),
            GetError::Status(code) => FetchError::HttpStatus(code),
        }
    }
}

async fn get_text(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<String, GetError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(GetError::Request)?;
    if !response.status().is_success() {
        return Err(GetError::Status(response.status().as_u16()));
    }
    response.text().await.map_err(GetError::Request)
}

#[async_trait]
impl Fetcher for PageFetcher {
    fn source(&self) -> DataSource {
        DataSource::Page
    }

    async fn fetch(&self, station_id: &str, timeout: Duration) -> FetchOutcome {
        self.read_value(station_id, timeout).await.into()
    }
}
