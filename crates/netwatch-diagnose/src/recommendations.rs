//! Fixed advisory rules.
//!
//! Each rule counts over the whole record set (not the capped top-N lists)
//! and contributes at most one message. Rules are evaluated in a fixed order.

use netwatch_types::NetworkRecord;

use crate::caching::{is_static_asset, url_counts};
use crate::performance::is_large_image;
use crate::thresholds::*;

pub const SLOW_ENDPOINTS: &str = "Consider optimizing slow endpoints or adding caching";
pub const HIGH_TTFB: &str =
    "High TTFB detected - check server response times, consider edge caching";
pub const LARGE_IMAGES: &str = "Compress/resize large images, consider WebP/AVIF format";
pub const MISSING_CACHE_CONTROL: &str = "Add Cache-Control headers to static assets";
pub const DUPLICATE_REQUESTS: &str = "Eliminate duplicate requests - check for redundant fetches";
pub const UPGRADE_HTTP2: &str = "Upgrade to HTTP/2 to improve parallelization";
pub const PRELOAD_CRITICAL: &str = "Preload critical resources, reduce dependency chains";
pub const REDUCE_QUEUING: &str = "Reduce request queuing - fewer requests or HTTP/2";

fn count(records: &[NetworkRecord], pred: impl Fn(&NetworkRecord) -> bool) -> usize {
    records.iter().filter(|&r| pred(r)).count()
}

/// Static asset whose cache-control is absent or forbids reuse.
///
/// Unlike the caching pass, already-cached responses are not excused here.
fn lacks_cache_control(r: &NetworkRecord) -> bool {
    is_static_asset(r)
        && match r.cache_control() {
            None => true,
            Some(cc) => cc.contains("no-cache"),
        }
}

pub fn recommend(records: &[NetworkRecord]) -> Vec<&'static str> {
    let mut advice = Vec::new();

    if count(records, |r| r.time > SLOW_REQUEST_MS) > RECOMMEND_SLOW_REQUESTS {
        advice.push(SLOW_ENDPOINTS);
    }
    if count(records, |r| r.phase(|t| t.wait).is_some_and(|w| w > SLOW_TTFB_MS)) > 0 {
        advice.push(HIGH_TTFB);
    }
    if count(records, is_large_image) > 0 {
        advice.push(LARGE_IMAGES);
    }
    if count(records, lacks_cache_control) > RECOMMEND_MISSING_CACHE {
        advice.push(MISSING_CACHE_CONTROL);
    }
    if url_counts(records)
        .iter()
        .any(|c| c.count >= RECOMMEND_DUPLICATE_COUNT)
    {
        advice.push(DUPLICATE_REQUESTS);
    }
    let http1 = count(records, NetworkRecord::is_http1);
    if http1 as f64 > records.len() as f64 * RECOMMEND_HTTP1_SHARE {
        advice.push(UPGRADE_HTTP2);
    }
    let late = count(records, |r| {
        r.relative_start.is_some_and(|s| s > LATE_DISCOVERY_MS)
    });
    if late > RECOMMEND_LATE_DISCOVERIES {
        advice.push(PRELOAD_CRITICAL);
    }
    let blocked = count(records, |r| {
        r.phase(|t| t.blocked).is_some_and(|b| b > HIGH_BLOCKED_MS)
    });
    if blocked > RECOMMEND_HIGH_BLOCKED {
        advice.push(REDUCE_QUEUING);
    }

    advice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{phases, record};

    fn many(n: usize, f: impl Fn(&mut NetworkRecord)) -> Vec<NetworkRecord> {
        (0..n)
            .map(|i| {
                let mut r = record(&format!("https://x/{i}"));
                f(&mut r);
                r
            })
            .collect()
    }

    #[test]
    fn quiet_capture_has_no_advice() {
        assert!(recommend(&many(10, |_| {})).is_empty());
    }

    #[test]
    fn slow_rule_needs_more_than_three() {
        assert!(recommend(&many(3, |r| r.time = 1500.0)).is_empty());
        assert_eq!(recommend(&many(4, |r| r.time = 1500.0)), vec![SLOW_ENDPOINTS]);
    }

    #[test]
    fn single_slow_ttfb_fires() {
        let mut records = many(5, |_| {});
        let mut t = phases();
        t.wait = 501.0;
        records[2].timings = Some(t);
        assert_eq!(recommend(&records), vec![HIGH_TTFB]);
    }

    #[test]
    fn missing_cache_rule_ignores_cached_flag() {
        let records = many(6, |r| {
            r.resource_type = Some("Image".into());
            r.cached = true;
        });
        assert_eq!(recommend(&records), vec![MISSING_CACHE_CONTROL]);
        let five = many(5, |r| r.resource_type = Some("Font".into()));
        assert!(recommend(&five).is_empty());
    }

    #[test]
    fn duplicate_rule_needs_three() {
        let mut records = many(2, |r| r.url = "https://x/a?v=1".into());
        assert!(recommend(&records).is_empty());
        records.push(record("https://x/a"));
        assert_eq!(recommend(&records), vec![DUPLICATE_REQUESTS]);
    }

    #[test]
    fn http1_share_is_strictly_above_threshold() {
        let mut records = many(10, |_| {});
        for r in records.iter_mut().take(3) {
            r.http_version = Some("http/1.1".into());
        }
        assert!(recommend(&records).is_empty());
        records[3].http_version = Some("HTTP/1.1".into());
        assert_eq!(recommend(&records), vec![UPGRADE_HTTP2]);
    }

    #[test]
    fn rules_fire_in_fixed_order() {
        let records = many(6, |r| {
            r.time = 2000.0;
            r.relative_start = Some(2500.0);
            r.mime_type = Some("image/jpeg".into());
            r.transfer_size = 250_000;
            let mut t = phases();
            t.blocked = 150.0;
            t.wait = 900.0;
            r.timings = Some(t);
        });
        assert_eq!(
            recommend(&records),
            vec![SLOW_ENDPOINTS, HIGH_TTFB, LARGE_IMAGES, PRELOAD_CRITICAL, REDUCE_QUEUING]
        );
    }
}
