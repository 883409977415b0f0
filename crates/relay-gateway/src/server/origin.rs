//! Origin policy for upgrade requests

/// Whether `origin` is on the allow-list
///
/// An entry matches when it equals the whole origin (`http://host:port`) or
/// just its `host[:port]` part, ignoring ASCII case. A missing origin never
/// matches, and an empty list rejects everything.
pub fn origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty()) else {
        return false;
    };

    let host = origin
        .split_once("://")
        .map_or(origin, |(_, rest)| rest)
        .trim_end_matches('/');

    allowed
        .iter()
        .any(|entry| entry.eq_ignore_ascii_case(origin) || entry.eq_ignore_ascii_case(host))
}
