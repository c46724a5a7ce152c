//! Turning raw query parameters into a validated targeting request.

use std::collections::HashMap;

use url::form_urlencoded;

use reach_core::constants::{
    missing_dimension_message, DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, LIMIT_PARAM, MANDATORY_DIMENSIONS,
    MAX_PAGE_LIMIT, PAGE_PARAM,
};
use reach_core::error::{ReachError, Result};
use reach_core::types::{Page, TargetingRequest};

/// Builds a targeting request from `(name, value)` query parameters.
///
/// - Names and values are trimmed; a repeated name keeps its first value.
/// - `app_id`, `country`, and `os` are required, checked in that order.
/// - `page` and `limit` are optional; blank counts as absent. Anything else
///   that is not a positive integer, or a limit above the maximum, is
///   rejected with the raw value in the message.
/// - Every other non-blank parameter becomes a dimension.
pub fn parse_params<I, K, V>(params: I) -> Result<TargetingRequest>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut ordered: Vec<(String, String)> = Vec::new();
    let mut first: HashMap<String, usize> = HashMap::new();
    for (name, value) in params {
        let name = name.as_ref().trim();
        if name.is_empty() || first.contains_key(name) {
            continue;
        }
        first.insert(name.to_string(), ordered.len());
        ordered.push((name.to_string(), value.as_ref().trim().to_string()));
    }
    let lookup = |name: &str| first.get(name).map(|&i| ordered[i].1.as_str());

    for dimension in MANDATORY_DIMENSIONS {
        if lookup(dimension).map_or(true, str::is_empty) {
            return Err(ReachError::Validation(missing_dimension_message(dimension)));
        }
    }

    let page = parse_number(lookup(PAGE_PARAM), DEFAULT_PAGE, PAGE_PARAM, u32::MAX)?;
    let limit = parse_number(lookup(LIMIT_PARAM), DEFAULT_PAGE_LIMIT, LIMIT_PARAM, MAX_PAGE_LIMIT)?;
    let mut request = TargetingRequest::new(Page::new(page, limit)?);

    for (name, value) in &ordered {
        if name != PAGE_PARAM && name != LIMIT_PARAM {
            request.insert(name, value);
        }
    }
    Ok(request)
}

/// Builds a targeting request from a raw `a=b&c=d` query string.
pub fn parse_query_string(query: &str) -> Result<TargetingRequest> {
    parse_params(form_urlencoded::parse(query.trim_start_matches('?').as_bytes()))
}

fn parse_number(raw: Option<&str>, default: u32, param: &str, max: u32) -> Result<u32> {
    let raw = match raw {
        None | Some("") => return Ok(default),
        Some(raw) => raw,
    };
    match raw.parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(ReachError::Validation(format!(
            "invalid {} parameter: {}",
            param, raw
        ))),
    }
}
