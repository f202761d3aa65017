//! Request concurrency and discovery order.
//!
//! Only records with a `relativeStart` take part; failed requests carry none.
//! A request occupies `[relativeStart, end)` where `end` is its
//! `relativeEnd`, or start plus total time when that is missing.

use std::collections::HashMap;

use serde::Serialize;

use netwatch_types::NetworkRecord;

use crate::counts::{host_of, top_by};
use crate::thresholds::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LateRequest {
    pub url: String,
    pub relative_start: f64,
    pub initiator_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedRequest {
    pub url: String,
    pub blocked: f64,
    pub http_version: Option<String>,
}

/// Requests issued by one script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptInitiator {
    pub initiator: String,
    pub requests: usize,
    pub average_start: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCount {
    pub host: String,
    pub requests: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaterfallReport {
    /// Records with timing placement. Zero means nothing else is meaningful.
    pub timed_requests: usize,
    pub max_concurrency: usize,
    /// Percent of the span with more than one request in flight.
    pub parallelization: u32,
    pub late_discoveries: Vec<LateRequest>,
    pub queued: Vec<QueuedRequest>,
    pub script_initiators: Vec<ScriptInitiator>,
    pub http1_hosts: Vec<HostCount>,
}

/// Sweep result over a set of `[start, end)` intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Concurrency {
    pub max: usize,
    /// Milliseconds with two or more intervals open.
    pub overlapped: f64,
    /// First start to last end.
    pub span: f64,
}

impl Concurrency {
    pub fn score(&self) -> u32 {
        if self.span > 0.0 {
            (self.overlapped / self.span * 100.0).round() as u32
        } else {
            0
        }
    }
}

/// Sweep the intervals in time order, opening at each start and closing at
/// each end. Intervals must be ordered by start.
pub fn sweep(intervals: &[(f64, f64)]) -> Concurrency {
    let mut marks: Vec<(f64, i32)> = Vec::with_capacity(intervals.len() * 2);
    for &(start, end) in intervals {
        marks.push((start, 1));
        marks.push((end, -1));
    }
    marks.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut open: i32 = 0;
    let mut max = 0;
    let mut overlapped = 0.0;
    let mut last = 0.0;
    for (time, delta) in marks {
        if open > 1 {
            overlapped += time - last;
        }
        open += delta;
        max = max.max(open.max(0) as usize);
        last = time;
    }

    let span = match intervals.first() {
        Some(&(first_start, _)) => {
            intervals.iter().map(|&(_, end)| end).fold(f64::MIN, f64::max) - first_start
        }
        None => 0.0,
    };

    Concurrency {
        max,
        overlapped,
        span,
    }
}

fn interval(r: &NetworkRecord, start: f64) -> (f64, f64) {
    let end = match r.relative_end {
        Some(end) if end > 0.0 => end,
        _ => start + r.time,
    };
    (start, end)
}

pub fn analyze(records: &[NetworkRecord]) -> WaterfallReport {
    let mut timed: Vec<(&NetworkRecord, f64)> = records
        .iter()
        .filter_map(|r| r.relative_start.map(|s| (r, s)))
        .collect();
    if timed.is_empty() {
        return WaterfallReport::default();
    }
    timed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let intervals: Vec<(f64, f64)> = timed.iter().map(|&(r, s)| interval(r, s)).collect();
    let concurrency = sweep(&intervals);

    let late_discoveries = timed
        .iter()
        .filter(|(_, start)| *start > LATE_DISCOVERY_MS)
        .take(TOP_LATE_DISCOVERIES)
        .map(|&(r, start)| LateRequest {
            url: r.url.clone(),
            relative_start: start,
            initiator_type: r.initiator.as_ref().map(|i| i.kind.clone()),
        })
        .collect();

    let queued: Vec<QueuedRequest> = timed
        .iter()
        .filter_map(|&(r, _)| {
            let blocked = r.phase(|t| t.blocked).filter(|&b| b > HIGH_BLOCKED_MS)?;
            Some(QueuedRequest {
                url: r.url.clone(),
                blocked,
                http_version: r.http_version.clone(),
            })
        })
        .collect();

    WaterfallReport {
        timed_requests: timed.len(),
        max_concurrency: concurrency.max,
        parallelization: concurrency.score(),
        late_discoveries,
        queued: top_by(queued, |q| q.blocked, TOP_QUEUED),
        script_initiators: script_initiators(&timed),
        http1_hosts: http1_hosts(&timed),
    }
}

fn script_initiators(timed: &[(&NetworkRecord, f64)]) -> Vec<ScriptInitiator> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for &(r, start) in timed {
        let Some(initiator) = r.initiator.as_ref().filter(|i| i.kind == "script") else {
            continue;
        };
        let key = initiator.url.clone().unwrap_or_else(|| "unknown".to_string());
        match index.get(&key) {
            Some(&i) => groups[i].1.push(start),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![start]));
            }
        }
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups.truncate(TOP_SCRIPT_INITIATORS);
    groups
        .into_iter()
        .map(|(initiator, starts)| ScriptInitiator {
            initiator,
            requests: starts.len(),
            average_start: starts.iter().sum::<f64>() / starts.len() as f64,
        })
        .collect()
}

fn http1_hosts(timed: &[(&NetworkRecord, f64)]) -> Vec<HostCount> {
    let mut hosts: Vec<HostCount> = Vec::new();
    for &(r, _) in timed.iter().filter(|(r, _)| r.is_http1()) {
        let host = host_of(&r.url);
        match hosts.iter_mut().find(|h| h.host == host) {
            Some(h) => h.requests += 1,
            None => hosts.push(HostCount { host, requests: 1 }),
        }
    }
    hosts.truncate(TOP_HTTP1_HOSTS);
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{phases, record};
    use netwatch_types::Initiator;

    fn placed(url: &str, start: f64, end: f64) -> NetworkRecord {
        let mut r = record(url);
        r.relative_start = Some(start);
        r.relative_end = Some(end);
        r.time = end - start;
        r
    }

    #[test]
    fn three_request_parallelization() {
        let records = vec![
            placed("https://x/a", 0.0, 100.0),
            placed("https://x/b", 10.0, 110.0),
            placed("https://x/c", 200.0, 210.0),
        ];
        let report = analyze(&records);
        assert_eq!(report.timed_requests, 3);
        assert_eq!(report.max_concurrency, 2);
        // 90ms overlapped over a 210ms span
        assert_eq!(report.parallelization, 43);
    }

    #[test]
    fn sweep_counts_overlap_only() {
        let c = sweep(&[(0.0, 100.0), (10.0, 110.0), (200.0, 210.0)]);
        assert_eq!(c.max, 2);
        assert_eq!(c.overlapped, 90.0);
        assert_eq!(c.span, 210.0);

        let serial = sweep(&[(0.0, 10.0), (10.0, 20.0)]);
        assert_eq!(serial.max, 1);
        assert_eq!(serial.score(), 0);

        let nested = sweep(&[(0.0, 100.0), (0.0, 100.0), (0.0, 100.0)]);
        assert_eq!(nested.max, 3);
        assert_eq!(nested.score(), 100);
    }

    #[test]
    fn zero_span_scores_zero() {
        assert_eq!(sweep(&[(5.0, 5.0)]).score(), 0);
        assert_eq!(sweep(&[]).score(), 0);
    }

    #[test]
    fn missing_end_falls_back_to_duration() {
        let mut r = placed("https://x/a", 0.0, 0.0);
        r.relative_end = None;
        r.time = 40.0;
        let other = placed("https://x/b", 20.0, 60.0);
        let report = analyze(&[r, other]);
        assert_eq!(report.max_concurrency, 2);
        // overlap [20, 40) over [0, 60)
        assert_eq!(report.parallelization, 33);
    }

    #[test]
    fn failed_requests_are_not_placed() {
        let mut failed = record("https://x/failed");
        failed.relative_start = None;
        failed.relative_end = None;
        let report = analyze(&[failed]);
        assert_eq!(report, WaterfallReport::default());
    }

    #[test]
    fn late_discoveries_in_start_order() {
        let mut late = placed("https://x/late", 2500.0, 2600.0);
        late.initiator = Some(Initiator {
            kind: "script".into(),
            url: Some("https://x/app.js".into()),
        });
        let records = vec![
            placed("https://x/later", 4000.0, 4100.0),
            late,
            placed("https://x/edge", 2000.0, 2050.0),
            placed("https://x/early", 0.0, 10.0),
        ];
        let report = analyze(&records);
        let got: Vec<_> = report
            .late_discoveries
            .iter()
            .map(|l| (l.url.as_str(), l.initiator_type.as_deref()))
            .collect();
        assert_eq!(
            got,
            vec![("https://x/late", Some("script")), ("https://x/later", None)]
        );
    }

    #[test]
    fn queued_by_blocked_time() {
        let mut records = Vec::new();
        for (i, blocked) in [150.0, 90.0, 300.0].into_iter().enumerate() {
            let mut r = placed(&format!("https://x/{i}"), i as f64, 500.0);
            let mut t = phases();
            t.blocked = blocked;
            r.timings = Some(t);
            r.http_version = Some("http/1.1".into());
            records.push(r);
        }
        let report = analyze(&records);
        let got: Vec<_> = report.queued.iter().map(|q| q.blocked).collect();
        assert_eq!(got, vec![300.0, 150.0]);
        assert_eq!(
            report.http1_hosts,
            vec![HostCount { host: "x".into(), requests: 3 }]
        );
    }

    #[test]
    fn script_initiators_grouped() {
        let script = |url: Option<&str>| {
            Some(Initiator {
                kind: "script".into(),
                url: url.map(str::to_string),
            })
        };
        let mut records = Vec::new();
        for (i, (init, start)) in [
            (script(Some("https://x/a.js")), 100.0),
            (script(Some("https://x/b.js")), 200.0),
            (script(Some("https://x/b.js")), 400.0),
            (script(None), 50.0),
            (
                Some(Initiator {
                    kind: "parser".into(),
                    url: Some("https://x/".into()),
                }),
                0.0,
            ),
        ]
        .into_iter()
        .enumerate()
        {
            let mut r = placed(&format!("https://x/r{i}"), start, start + 10.0);
            r.initiator = init;
            records.push(r);
        }

        let report = analyze(&records);
        let got: Vec<_> = report
            .script_initiators
            .iter()
            .map(|s| (s.initiator.as_str(), s.requests, s.average_start))
            .collect();
        assert_eq!(
            got,
            vec![
                ("https://x/b.js", 2, 300.0),
                ("unknown", 1, 50.0),
                ("https://x/a.js", 1, 100.0),
            ]
        );
    }

    #[test]
    fn http1_detection_is_case_insensitive() {
        let mut a = placed("https://one.test/a", 0.0, 10.0);
        a.http_version = Some("HTTP/1.1".into());
        let mut b = placed("https://two.test/b", 5.0, 10.0);
        b.http_version = Some("http/1.1".into());
        let c = placed("https://one.test/c", 6.0, 10.0);
        let report = analyze(&[a, b, c]);
        assert_eq!(
            report.http1_hosts,
            vec![
                HostCount { host: "one.test".into(), requests: 1 },
                HostCount { host: "two.test".into(), requests: 1 },
            ]
        );
    }
}
