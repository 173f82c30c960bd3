//! Dotted-path key relevance
//!
//! A config key is relevant to a persisted item when it is the item key, an
//! ancestor of it (`mail` for `mail.host`) or a descendant of it
//! (`mail.host.port` for `mail.host`). Comparison happens on whole path
//! segments, so `foo` is unrelated to `foobar`.

const SEPARATOR: char = '.';

/// Whether `candidate` and `item_key` lie on the same dotted path
pub fn keys_match(candidate: &str, item_key: &str) -> bool {
    let candidate = format!("{candidate}{SEPARATOR}");
    let item_key = format!("{item_key}{SEPARATOR}");
    candidate.starts_with(&item_key) || item_key.starts_with(&candidate)
}

/// Whether any candidate matches any item key
pub fn any_match<'a, I>(candidates: I, item_keys: &[String]) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .any(|candidate| item_keys.iter().any(|key| keys_match(candidate, key)))
}
