//! HTTP request building and response header extraction.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// Realistic browser request headers to reduce bot detection.
///
/// Modern bot detection systems analyze headers to identify automated
/// clients; these mimic a current Chrome navigation request. Used for both
/// acquisition tiers so the two fetches present the same fingerprint.
pub(crate) struct RequestHeaders;

impl RequestHeaders {
    /// Applies the standard request headers to a `reqwest::RequestBuilder`.
    pub(crate) fn apply_to_request_builder(
        builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        builder
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate, br")
            .header(
                reqwest::header::HeaderName::from_static("sec-fetch-dest"),
                "document",
            )
            .header(
                reqwest::header::HeaderName::from_static("sec-fetch-mode"),
                "navigate",
            )
            .header(
                reqwest::header::HeaderName::from_static("sec-fetch-site"),
                "none",
            )
            .header(reqwest::header::UPGRADE_INSECURE_REQUESTS, "1")
            .header(reqwest::header::CACHE_CONTROL, "max-age=0")
    }
}

/// Flattens response headers into a lowercase-keyed map.
///
/// Repeated headers are joined with ", " per RFC 9110 field-line folding;
/// non-UTF-8 values are dropped rather than mangled.
pub(crate) fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers.iter() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Extracts raw `name=value` cookie strings from `Set-Cookie` headers.
///
/// Attributes after the first `;` (Path, HttpOnly, ...) are not part of the
/// cookie pair and are stripped.
pub(crate) fn cookies_from_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|raw| {
            raw.split(';')
                .next()
                .unwrap_or(raw)
                .trim()
                .to_string()
        })
        .filter(|pair| !pair.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    #[test]
    fn test_headers_to_map_lowercases_and_joins() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Powered-By", HeaderValue::from_static("PHP/8.2"));
        headers.append(
            HeaderName::from_static("via"),
            HeaderValue::from_static("1.1 varnish"),
        );
        headers.append(
            HeaderName::from_static("via"),
            HeaderValue::from_static("1.1 cloudfront"),
        );

        let map = headers_to_map(&headers);
        assert_eq!(map.get("x-powered-by").map(String::as_str), Some("PHP/8.2"));
        assert_eq!(
            map.get("via").map(String::as_str),
            Some("1.1 varnish, 1.1 cloudfront")
        );
    }

    /// Cookie attributes after the first ';' are stripped.
    #[test]
    fn test_cookies_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("PHPSESSID=abc123; Path=/; HttpOnly"),
        );
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("wordpress_logged_in=1"),
        );

        let cookies = cookies_from_headers(&headers);
        assert_eq!(cookies, vec!["PHPSESSID=abc123", "wordpress_logged_in=1"]);
    }
}
