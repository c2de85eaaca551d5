use crate::gitlab::Result;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use url::Url;

// -------------------------------------------------------------------------------------------------
// Page
// -------------------------------------------------------------------------------------------------
pub struct Page<T> {
    pub items: Vec<T>,
    pub links: HeaderLinks,
}

impl<T: serde::de::DeserializeOwned> Page<T> {
    pub async fn from_response(response: reqwest::Response) -> Result<Self> {
        let links = HeaderLinks::from_headers(response.headers());
        let items = response.json().await?;
        Ok(Page { items, links })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeaderLinks {
    pub next: Option<Url>,
    // NOTE: GitLab also sends `prev`, `first`, and `last`, plus `x-next-page` style headers;
    // only `next` is needed to walk every page.
}

lazy_static! {
    static ref HEADER_LINKS_PATTERN: Regex =
        RegexBuilder::new(r#"<([^>]+)>; \s* rel \s* = \s* "next""#)
            .ignore_whitespace(true)
            .build()
            .expect("header links regex should compile");
}

impl HeaderLinks {
    /// Extract pagination links from a set of response headers.
    ///
    /// GitLab sends all links in a single comma-separated `Link` header, so each entry of each
    /// header value is examined.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let next = headers
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|entry| HEADER_LINKS_PATTERN.captures(entry.trim()))
            .filter_map(|captures| captures.get(1))
            .find_map(|capture| Url::parse(capture.as_str()).ok());

        HeaderLinks { next }
    }
}
