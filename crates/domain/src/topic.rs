//! MQTT topic names and topic filters.
//!
//! A topic *name* is what a message is published to; a topic *filter* is
//! what a subscription asks for and may contain the `+` (single level) and
//! `#` (remaining levels) wildcards.
//!
//! Follows the rules of rumqttc's `valid_filter`/`matches` for the layers
//! that do not link the MQTT client. The adapter itself uses rumqttc.

/// Check that `topic` is a valid publish topic (non-empty, no wildcards).
#[must_use]
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#', '\0'])
}

/// Check that `filter` is a valid subscription filter.
///
/// `#` must be the last level and occupy it alone; `+` must occupy a whole
/// level.
#[must_use]
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() || filter.contains('\0') {
        return false;
    }
    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        let is_last = levels.peek().is_none();
        if level.contains('#') && (level != "#" || !is_last) {
            return false;
        }
        if level.contains('+') && level != "+" {
            return false;
        }
    }
    true
}

/// Whether a message published on `topic` is delivered to `filter`.
///
/// Topics starting with `$` are never matched by a leading wildcard.
#[must_use]
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && filter.starts_with(['+', '#']) {
        return false;
    }
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Join topic levels with `/`, skipping empty levels.
#[must_use]
pub fn join<'a>(levels: impl IntoIterator<Item = &'a str>) -> String {
    levels
        .into_iter()
        .filter(|level| !level.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
