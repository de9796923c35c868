//! The `ways_should_connect` predicate used by intersection synthesis.

use crate::highway::Highway;
use std::collections::BTreeMap;

fn tag<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key).map(String::as_str)
}

fn is_polygonish(tags: &BTreeMap<String, String>) -> bool {
    tags.contains_key("building") || tags.contains_key("landuse") || tags.contains_key("natural")
}

fn is_separated(tags: &BTreeMap<String, String>) -> bool {
    tags.contains_key("bridge") || tags.contains_key("tunnel")
}

fn layer(tags: &BTreeMap<String, String>) -> &str {
    tag(tags, "layer").unwrap_or("0")
}

/// True iff two ways should be considered connectable for the merge
/// engine's intersection synthesis pass.
pub fn ways_should_connect(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> bool {
    if is_polygonish(a) || is_polygonish(b) {
        return false;
    }
    if is_separated(a) || is_separated(b) {
        return false;
    }
    if layer(a) != layer(b) {
        return false;
    }

    let a_highway = tag(a, "highway");
    let b_highway = tag(b, "highway");
    match (a_highway, b_highway) {
        (Some(_), Some(_)) => true,
        (Some(_), None) => is_footlike_highway(b),
        (None, Some(_)) => is_footlike_highway(a),
        (None, None) => false,
    }
}

fn is_footlike_highway(tags: &BTreeMap<String, String>) -> bool {
    match tag(tags, "highway") {
        Some(v) => v.parse::<Highway>().map(|h| h.is_footlike()).unwrap_or(false),
        None => false,
    }
}
