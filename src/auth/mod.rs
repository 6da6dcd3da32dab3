pub mod provision;
pub mod token;

use axum::http::{header, HeaderMap};

pub use token::{Identity, TokenVerifier};

/// Access token from `Authorization: Bearer …`, falling back to the named
/// cookie.
pub fn access_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    bearer_token(headers).or_else(|| cookie_value(headers, cookie_name))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
