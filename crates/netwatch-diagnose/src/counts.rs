//! Deterministic frequency tables.

use std::collections::HashMap;

use serde::Serialize;

/// One row of a frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

/// Count keys and order by count descending. Ties keep first-seen order.
pub fn rank_counts<I, K>(keys: I) -> Vec<CountEntry>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<CountEntry> = Vec::new();
    for key in keys {
        let key = key.into();
        match index.get(&key) {
            Some(&i) => rows[i].count += 1,
            None => {
                index.insert(key.clone(), rows.len());
                rows.push(CountEntry { key, count: 1 });
            }
        }
    }
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Sort by a float metric descending, keeping input order for ties, and cap
/// the result at `limit`.
pub(crate) fn top_by<T>(mut items: Vec<T>, metric: impl Fn(&T) -> f64, limit: usize) -> Vec<T> {
    items.sort_by(|a, b| metric(b).total_cmp(&metric(a)));
    items.truncate(limit);
    items
}

/// Host part of a URL, falling back to the URL itself when it does not parse.
pub(crate) fn host_of(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}
