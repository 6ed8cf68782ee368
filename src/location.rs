//! Page location handling: the `filter` query parameter and the push
//! endpoint derived from the page URL.

use thiserror::Error;
use url::Url;

pub const FILTER_PARAM: &str = "filter";
const STREAM_PATH: &str = "/ws";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("unsupported page scheme `{0}` (expected http or https)")]
    UnsupportedScheme(String),
    #[error("page URL has no host")]
    MissingHost,
    #[error("invalid stream URL: {0}")]
    Invalid(#[from] url::ParseError),
}

/// Read the `filter` query parameter. An absent or empty value means "no filter".
pub fn read_filter(page: &Url) -> Option<String> {
    page.query_pairs()
        .find(|(key, _)| key == FILTER_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Build the push endpoint for a page: `{ws|wss}://{host}/ws{?query}`.
///
/// The socket scheme mirrors the page scheme and the query string is
/// forwarded as-is, so the server sees exactly what the page was loaded with.
pub fn build_target(page: &Url) -> Result<Url, TargetError> {
    let scheme = match page.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(TargetError::UnsupportedScheme(other.to_string())),
    };
    let host = page.host_str().ok_or(TargetError::MissingHost)?;

    let mut target = format!("{}://{}", scheme, host);
    if let Some(port) = page.port() {
        target.push_str(&format!(":{}", port));
    }
    target.push_str(STREAM_PATH);
    if let Some(query) = page.query() {
        target.push('?');
        target.push_str(query);
    }

    Ok(Url::parse(&target)?)
}

/// Return a copy of `page` with the `filter` parameter replaced (or removed
/// when `filter` is `None` or empty). Other query pairs keep their order.
pub fn with_filter(page: &Url, filter: Option<&str>) -> Url {
    let filter = filter.filter(|f| !f.is_empty());
    let others: Vec<(String, String)> = page
        .query_pairs()
        .filter(|(key, _)| key != FILTER_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = page.clone();
    url.set_query(None);
    if !others.is_empty() || filter.is_some() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &others {
            pairs.append_pair(key, value);
        }
        if let Some(filter) = filter {
            pairs.append_pair(FILTER_PARAM, filter);
        }
    }
    url
}
