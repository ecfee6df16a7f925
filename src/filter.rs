//! Derives the list of channels to display from the cached collections and
//! the current view. Everything here is a pure function over borrowed data.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::api::{Channel, StreamType};
use crate::state::{SelectedCategory, SortOrder, ViewState};

/// Queries shorter than this (after trimming) do not trigger a global search.
pub const MIN_SEARCH_CHARS: usize = 2;

/// Whether `query` is long enough to search the whole cache.
pub fn is_global_search(query: &str) -> bool {
    query.trim().chars().count() >= MIN_SEARCH_CHARS
}

/// Case-insensitive substring match of `query` against channel names.
pub fn search<'a>(channels: &'a [Channel], query: &str) -> Vec<&'a Channel> {
    let needle = query.to_lowercase();
    channels
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&needle))
        .collect()
}

/// Live content keeps server order. A live selection, or any live item in
/// the list, disables sorting for the whole list.
pub fn sorting_allowed(channels: &[&Channel], selected: Option<&SelectedCategory>) -> bool {
    if matches!(selected, Some(SelectedCategory::Category { kind: StreamType::Live, .. })) {
        return false;
    }
    !channels.iter().any(|c| c.is_live())
}

/// Stable re-ordering of `channels`; returns a new vector.
pub fn sort_channels<'a>(
    channels: &[&'a Channel],
    order: SortOrder,
    selected: Option<&SelectedCategory>,
) -> Vec<&'a Channel> {
    let mut out = channels.to_vec();
    if !sorting_allowed(channels, selected) {
        return out;
    }

    match order {
        SortOrder::Newest => out.sort_by(|a, b| added_key(b).cmp(&added_key(a))),
        SortOrder::Oldest => out.sort_by(|a, b| added_key(a).cmp(&added_key(b))),
        SortOrder::Rating => out.sort_by(|a, b| rating_of(b).total_cmp(&rating_of(a))),
    }
    out
}

/// The ordered list to render for `view`.
///
/// With a global query the whole cache is searched regardless of the selected
/// category; otherwise the selected category's channels are shown, or nothing
/// when no category is selected.
pub fn visible_channels<'a>(
    cache: &'a [Channel],
    category_channels: &'a [Channel],
    view: &ViewState,
) -> Vec<&'a Channel> {
    let base: Vec<&Channel> = if is_global_search(&view.search_query) {
        search(cache, &view.search_query)
    } else if view.selected.is_some() {
        category_channels.iter().collect()
    } else {
        Vec::new()
    };

    sort_channels(&base, view.sort_order, view.selected.as_ref())
}

// Dated items order by timestamp; undated items fall back to id, on the
// assumption that higher ids were ingested later.
fn added_key(channel: &Channel) -> (i64, i64) {
    match channel.added.as_deref() {
        Some(added) => (parse_added(added).unwrap_or(0), 0),
        None => (0, channel.id),
    }
}

fn rating_of(channel: &Channel) -> f64 {
    channel.rating.as_ref().map(|r| r.as_f64()).unwrap_or(0.0)
}

/// Parse an `added` timestamp into unix seconds.
///
/// Accepts unix seconds, RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`.
pub fn parse_added(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flex::Rating;

    fn ch(id: i64, name: &str, kind: StreamType) -> Channel {
        Channel {
            id,
            name: name.to_string(),
            url: format!("http://host/{}/{}.ts", kind, id),
            stream_type: Some(kind),
            ..Default::default()
        }
    }

    fn rated(id: i64, rating: Option<Rating>) -> Channel {
        Channel {
            rating,
            ..ch(id, &format!("movie {}", id), StreamType::Movie)
        }
    }

    fn dated(id: i64, added: Option<&str>) -> Channel {
        Channel {
            added: added.map(str::to_string),
            ..ch(id, &format!("movie {}", id), StreamType::Movie)
        }
    }

    fn ids(list: &[&Channel]) -> Vec<i64> {
        list.iter().map(|c| c.id).collect()
    }

    fn movie_view(order: SortOrder) -> ViewState {
        ViewState {
            selected: Some(SelectedCategory::Category {
                kind: StreamType::Movie,
                id: 1,
            }),
            sort_order: order,
            ..ViewState::default()
        }
    }

    #[test]
    fn test_search_is_global_and_case_insensitive() {
        let cache = vec![
            ch(1, "BBC News", StreamType::Live),
            ch(2, "Sky Sports", StreamType::Live),
            ch(3, "The Newsroom", StreamType::Series),
        ];
        let category = vec![ch(2, "Sky Sports", StreamType::Live)];
        let view = ViewState {
            selected: Some(SelectedCategory::Category {
                kind: StreamType::Live,
                id: 9,
            }),
            search_query: "NEWS".to_string(),
            ..ViewState::default()
        };
        assert_eq!(ids(&visible_channels(&cache, &category, &view)), vec![1, 3]);
    }

    #[test]
    fn test_short_query_keeps_category_list() {
        let cache = vec![ch(1, "Alpha", StreamType::Live), ch(2, "Beta", StreamType::Live)];
        let category = vec![ch(2, "Beta", StreamType::Live)];
        let mut view = ViewState {
            selected: Some(SelectedCategory::Category {
                kind: StreamType::Live,
                id: 1,
            }),
            search_query: "a".to_string(),
            ..ViewState::default()
        };
        assert_eq!(ids(&visible_channels(&cache, &category, &view)), vec![2]);

        view.search_query = "   ".to_string();
        assert_eq!(ids(&visible_channels(&cache, &category, &view)), vec![2]);

        view.selected = None;
        view.search_query.clear();
        assert!(visible_channels(&cache, &category, &view).is_empty());
    }

    #[test]
    fn test_rating_sort_descending_and_stable() {
        let list = vec![
            rated(1, Some(Rating::Text("7.0".into()))),
            rated(2, None),
            rated(3, Some(Rating::Number(9.1))),
            rated(4, Some(Rating::Text("7".into()))),
            rated(5, Some(Rating::Text("n/a".into()))),
        ];
        let view = movie_view(SortOrder::Rating);
        assert_eq!(ids(&visible_channels(&[], &list, &view)), vec![3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_newest_and_oldest_fall_back_to_id() {
        let list = vec![dated(5, None), dated(9, None), dated(1, None)];
        assert_eq!(
            ids(&visible_channels(&[], &list, &movie_view(SortOrder::Newest))),
            vec![9, 5, 1]
        );
        assert_eq!(
            ids(&visible_channels(&[], &list, &movie_view(SortOrder::Oldest))),
            vec![1, 5, 9]
        );
    }

    #[test]
    fn test_newest_uses_added_timestamps() {
        let list = vec![
            dated(1, Some("2023-01-05 10:00:00")),
            dated(2, Some("1700000000")),
            dated(3, Some("2021-06-01")),
        ];
        assert_eq!(
            ids(&visible_channels(&[], &list, &movie_view(SortOrder::Newest))),
            vec![2, 1, 3]
        );
    }

    #[test]
    fn test_any_live_item_suppresses_sort() {
        let list = vec![
            rated(1, Some(Rating::Number(1.0))),
            ch(2, "Live One", StreamType::Live),
            rated(3, Some(Rating::Number(9.0))),
        ];
        let view = ViewState {
            selected: Some(SelectedCategory::Favorites),
            sort_order: SortOrder::Rating,
            ..ViewState::default()
        };
        assert_eq!(ids(&visible_channels(&[], &list, &view)), vec![1, 2, 3]);
    }

    #[test]
    fn test_filter_is_idempotent_and_non_mutating() {
        let list = vec![
            rated(1, Some(Rating::Number(2.0))),
            rated(2, Some(Rating::Number(8.0))),
        ];
        let before = list.clone();
        let view = movie_view(SortOrder::Rating);
        let first = ids(&visible_channels(&[], &list, &view));
        let second = ids(&visible_channels(&[], &list, &view));
        assert_eq!(first, second);
        assert_eq!(list, before);
    }

    #[test]
    fn test_parse_added_formats() {
        assert_eq!(parse_added("1700000000"), Some(1_700_000_000));
        assert_eq!(parse_added("1970-01-02"), Some(86_400));
        assert_eq!(parse_added("2020-01-01T00:00:00Z"), Some(1_577_836_800));
        assert_eq!(parse_added("yesterday"), None);
    }
}
