//! Content negotiation.
//!
//! Picks the response representation from the `Accept` header and sets it as
//! the response `Content-Type`. Supported representations, in server order:
//! JSON, CSS, plain text, XML, HTML, GIF, PNG and octet-stream.
//!
//! Media ranges are tried by descending quality; ranges with equal quality
//! keep their header order. Within a range, the first supported
//! representation that matches exactly, by `type/*` or by `*/*` wins.

use http::header::{HeaderValue, CONTENT_TYPE};
use mime::Mime;
use stratum_core::{headers, media};

use crate::context::Exchange;
use crate::middleware::{BoxFuture, Middleware, Next};

/// Returns the representation for an `Accept` header value.
///
/// A missing or blank header selects JSON. `None` means nothing supported
/// matched.
///
/// ```
/// use stratum_middleware::stages::negotiate;
///
/// assert_eq!(negotiate(None), Some("application/json"));
/// assert_eq!(negotiate(Some("text/*")), Some("text/css"));
/// assert_eq!(negotiate(Some("image/png;q=0.5, application/xml")), Some("application/xml"));
/// assert_eq!(negotiate(Some("video/mp4")), None);
/// ```
#[must_use]
pub fn negotiate(accept: Option<&str>) -> Option<&'static str> {
    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return Some(media::JSON);
    };

    let mut ranges: Vec<(Mime, f32)> = accept
        .split(',')
        .filter_map(|part| part.trim().parse::<Mime>().ok())
        .map(|range| {
            let q = range
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            (range, q)
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();

    // Stable, so equal qualities keep header order.
    ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranges.iter().find_map(|(range, _)| {
        media::ACCEPTED
            .iter()
            .copied()
            .find(|candidate| matches_range(range, candidate))
    })
}

fn matches_range(range: &Mime, candidate: &str) -> bool {
    let Ok(candidate) = candidate.parse::<Mime>() else {
        return false;
    };
    if range.type_() == mime::STAR {
        return true;
    }
    if range.type_() != candidate.type_() {
        return false;
    }
    range.subtype() == mime::STAR || range.subtype() == candidate.subtype()
}

/// Sets the negotiated `Content-Type` and echoes the inhibit header.
#[derive(Debug, Clone, Copy, Default)]
pub struct Negotiator;

impl Negotiator {
    /// Creates the negotiator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn apply(ex: &mut Exchange) {
        let chosen = negotiate(ex.header(headers::ACCEPT));
        let inhibit = ex.request().headers().contains_key(headers::INHIBIT_RESPONSE);

        let response = ex.response_mut().headers_mut();
        if let Some(content_type) = chosen {
            response.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        if inhibit {
            response.insert(headers::INHIBIT_RESPONSE, HeaderValue::from_static("1"));
        }
    }
}

impl Middleware for Negotiator {
    fn name(&self) -> &'static str {
        "negotiator"
    }

    fn handle<'a>(&'a self, ex: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            Self::apply(ex);
            next.run(ex).await;
        })
    }
}
