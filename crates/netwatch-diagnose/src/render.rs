//! Plain-text rendering of a [`DiagnosisReport`].

use std::fmt;

use crate::failures::Severity;
use crate::report::DiagnosisReport;
use crate::thresholds::*;

const URL_WIDTH: usize = 60;
const INITIATOR_WIDTH: usize = 50;

/// Human-readable byte count using 1024-based units and one decimal.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    format!("{rounded} {}", UNITS[unit])
}

/// Milliseconds below one second, seconds with two decimals above. Negative
/// values (not applicable) render as `-`.
pub fn format_ms(ms: f64) -> String {
    if ms < 0.0 {
        "-".to_string()
    } else if ms < 1000.0 {
        format!("{}ms", ms.round())
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

/// Shorten to `max` characters, ending in `...` when cut.
pub fn truncate_url(url: &str, max: usize) -> String {
    if url.chars().count() <= max {
        url.to_string()
    } else {
        let kept: String = url.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "-".repeat(title.chars().count()))
}

fn status_label(status: Option<u16>) -> String {
    status.map_or_else(|| "---".to_string(), |s| s.to_string())
}

impl fmt::Display for DiagnosisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network Diagnosis Report")?;
        writeln!(f, "========================")?;
        self.fmt_summary(f)?;
        self.fmt_performance(f)?;
        self.fmt_caching(f)?;
        self.fmt_errors(f)?;
        self.fmt_waterfall(f)?;
        self.fmt_recommendations(f)
    }
}

impl DiagnosisReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        section(f, "Summary")?;
        writeln!(f, "  Total requests:    {}", s.total_requests)?;
        writeln!(
            f,
            "  Total transfer:    {} ({} uncompressed)",
            format_bytes(s.total_transfer),
            format_bytes(s.total_content)
        )?;
        writeln!(f, "  Page load time:    {}", format_ms(s.page_load_time))?;
        writeln!(f, "  Avg request time:  {}", format_ms(s.average_time))?;
        writeln!(
            f,
            "  Cache hit rate:    {}/{} ({}%)",
            s.cached, s.total_requests, s.cache_hit_rate
        )?;
        if s.errors > 0 {
            writeln!(f, "  Errors:            {} ({} failed)", s.errors, s.failed)?;
        }
        writeln!(f)?;
        writeln!(f, "  By type:")?;
        for row in &s.by_type {
            writeln!(f, "    {}: {}", row.key, row.count)?;
        }
        Ok(())
    }

    fn fmt_performance(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.performance;
        section(f, "Performance Issues")?;

        if !p.slow_requests.is_empty() {
            writeln!(f, "  Slow requests (>{})", format_ms(SLOW_REQUEST_MS))?;
            for t in &p.slow_requests {
                writeln!(
                    f,
                    "  {:>8}  {}  {}",
                    format_ms(t.ms),
                    status_label(t.status),
                    truncate_url(&t.url, URL_WIDTH)
                )?;
            }
            writeln!(f)?;
        }
        if !p.slow_ttfb.is_empty() {
            writeln!(f, "  Slow TTFB (>{})", format_ms(SLOW_TTFB_MS))?;
            for t in &p.slow_ttfb {
                writeln!(f, "  {:>8}  {}", format_ms(t.ms), truncate_url(&t.url, URL_WIDTH))?;
            }
            writeln!(f)?;
        }
        if !p.slow_dns.is_empty() {
            writeln!(f, "  Slow DNS (>{})", format_ms(SLOW_DNS_MS))?;
            for h in &p.slow_dns {
                writeln!(f, "  {:>8}  {}", format_ms(h.ms), h.host)?;
            }
            writeln!(f)?;
        }
        if !p.slow_ssl.is_empty() {
            writeln!(f, "  Slow TLS handshake (>{})", format_ms(SLOW_SSL_MS))?;
            for h in &p.slow_ssl {
                writeln!(f, "  {:>8}  {}", format_ms(h.ms), h.host)?;
            }
            writeln!(f)?;
        }
        if !p.large_payloads.is_empty() {
            writeln!(f, "  Large payloads (>{})", format_bytes(LARGE_PAYLOAD_BYTES))?;
            for s in &p.large_payloads {
                let subtype = s
                    .mime_type
                    .as_deref()
                    .and_then(|m| m.split('/').nth(1))
                    .unwrap_or("?");
                writeln!(
                    f,
                    "  {:>10}  {}  {}",
                    format_bytes(s.transfer_size),
                    subtype,
                    truncate_url(&s.url, URL_WIDTH)
                )?;
            }
            writeln!(f)?;
        }
        if !p.large_images.is_empty() {
            writeln!(f, "  Large images (>{})", format_bytes(LARGE_IMAGE_BYTES))?;
            for s in &p.large_images {
                writeln!(
                    f,
                    "  {:>10}  {}",
                    format_bytes(s.transfer_size),
                    truncate_url(&s.url, URL_WIDTH)
                )?;
            }
            writeln!(f)?;
        }
        if p.is_clean() {
            writeln!(f, "  No major performance issues detected")?;
        }
        Ok(())
    }

    fn fmt_caching(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.caching;
        section(f, "Caching Analysis")?;

        if !c.missing_cache_headers.is_empty() {
            writeln!(f, "  Missing/bad cache headers on static assets")?;
            for a in c.missing_cache_headers.iter().take(TEXT_LIST_LIMIT) {
                let cc = a.cache_control.as_deref().unwrap_or("none");
                writeln!(f, "  {:<20.20}  {}", cc, truncate_url(&a.url, URL_WIDTH))?;
            }
            let hidden = c.missing_cache_headers.len().saturating_sub(TEXT_LIST_LIMIT);
            if hidden > 0 {
                writeln!(f, "  ... and {hidden} more")?;
            }
            writeln!(f)?;
        }
        if !c.cdn_status.is_empty() {
            writeln!(f, "  CDN cache status (cf-cache-status)")?;
            for row in &c.cdn_status {
                writeln!(f, "  {:<10} {}", row.key, row.count)?;
            }
            writeln!(f)?;
        }
        if !c.duplicates.is_empty() {
            writeln!(f, "  Duplicate requests")?;
            for row in c.duplicates.iter().take(TEXT_LIST_LIMIT) {
                writeln!(f, "  {}x  {}", row.count, truncate_url(&row.key, URL_WIDTH))?;
            }
            writeln!(f)?;
        }
        if c.is_healthy() {
            writeln!(f, "  Caching looks healthy")?;
        }
        Ok(())
    }

    fn fmt_errors(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return Ok(());
        }
        section(f, "Errors")?;
        for e in &self.errors {
            let label = match e.severity {
                Severity::Failed => "FAIL".to_string(),
                Severity::ClientError | Severity::ServerError => status_label(e.status),
            };
            let message = e.message.as_deref().unwrap_or("");
            writeln!(
                f,
                "  {label:<6}  {} {message}",
                truncate_url(&e.url, URL_WIDTH)
            )?;
        }
        Ok(())
    }

    fn fmt_waterfall(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = &self.waterfall;
        section(f, "Waterfall Analysis")?;
        if w.timed_requests == 0 {
            return writeln!(f, "  No timing data available");
        }

        writeln!(f, "  Max concurrent:    {} requests", w.max_concurrency)?;
        writeln!(
            f,
            "  Parallelization:   {}% of time with concurrent requests",
            w.parallelization
        )?;
        writeln!(f)?;

        if !w.late_discoveries.is_empty() {
            writeln!(
                f,
                "  Late discoveries (>{} after page start)",
                format_ms(LATE_DISCOVERY_MS)
            )?;
            for l in &w.late_discoveries {
                writeln!(
                    f,
                    "  {:>8}  [{}]  {}",
                    format_ms(l.relative_start),
                    l.initiator_type.as_deref().unwrap_or("?"),
                    truncate_url(&l.url, URL_WIDTH)
                )?;
            }
            writeln!(f)?;
        }
        if !w.queued.is_empty() {
            writeln!(
                f,
                "  Connection queuing (>{} blocked)",
                format_ms(HIGH_BLOCKED_MS)
            )?;
            for q in &w.queued {
                writeln!(
                    f,
                    "  {:>8}  {}  {}",
                    format_ms(q.blocked),
                    q.http_version.as_deref().unwrap_or("?"),
                    truncate_url(&q.url, URL_WIDTH)
                )?;
            }
            writeln!(f)?;
        }
        if !w.script_initiators.is_empty() {
            writeln!(f, "  Script-initiated requests")?;
            for s in &w.script_initiators {
                writeln!(f, "  {}", truncate_url(&s.initiator, INITIATOR_WIDTH))?;
                writeln!(
                    f,
                    "    -> {} requests (avg start: {})",
                    s.requests,
                    format_ms(s.average_start)
                )?;
            }
            writeln!(f)?;
        }
        if !w.http1_hosts.is_empty() {
            writeln!(f, "  HTTP/1.1 requests (may cause queuing)")?;
            for h in &w.http1_hosts {
                writeln!(f, "  {} requests to {}", h.requests, h.host)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn fmt_recommendations(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Recommendations")?;
        if self.recommendations.is_empty() {
            return writeln!(f, "  No critical issues found");
        }
        for (i, rec) in self.recommendations.iter().enumerate() {
            writeln!(f, "  {}. {rec}", i + 1)?;
        }
        Ok(())
    }
}
