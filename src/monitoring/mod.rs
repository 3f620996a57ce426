//! In-process request metrics, tracked errors and threshold alerts.
//!
//! Everything lives in bounded ring buffers owned by [`Monitor`]; the oldest
//! entry is dropped when a buffer is full. State is per process and is lost
//! on restart.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MonitoringConfig;

/// Metric name used for every HTTP request
pub const REQUEST_METRIC: &str = "http.request.duration_ms";
pub const MAX_ALERTS: usize = 50;
/// Tag naming the tenant a metric belongs to
pub const TENANT_TAG: &str = "tenant";

const ALERT_COOLDOWN_MINUTES: i64 = 5;
const RESPONSE_WINDOW_MINUTES: i64 = 5;
const SLOWEST_ROUTES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn status(&self) -> Option<u16> {
        self.tag("status").and_then(|s| s.parse().ok())
    }

    fn in_scope(&self, tenant: Option<&str>) -> bool {
        tenant.map_or(true, |t| self.tag(TENANT_TAG) == Some(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackedError {
    pub id: Uuid,
    pub message: String,
    pub code: String,
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl TrackedError {
    fn in_scope(&self, tenant: Option<&str>) -> bool {
        tenant.map_or(true, |t| self.tenant.as_deref() == Some(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ErrorSpike,
    SlowResponses,
    HighErrorRate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteTiming {
    pub route: String,
    pub count: usize,
    pub avg_response_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSummary {
    pub window_secs: i64,
    pub request_count: usize,
    pub error_count: usize,
    pub error_rate: f64,
    pub avg_response_ms: f64,
    pub p95_response_ms: f64,
    pub slowest_routes: Vec<RouteTiming>,
    pub status_counts: BTreeMap<String, usize>,
    /// Non-request metrics in the window, by name and tag set
    pub event_counts: BTreeMap<String, usize>,
    pub tracked_errors: usize,
}

#[derive(Debug, Default)]
struct MonitorState {
    metrics: VecDeque<MetricPoint>,
    errors: VecDeque<TrackedError>,
    alerts: VecDeque<Alert>,
    last_raised: HashMap<AlertKind, DateTime<Utc>>,
}

pub struct Monitor {
    config: MonitoringConfig,
    state: Mutex<MonitorState>,
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

impl Monitor {
    pub fn new(config: MonitoringConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn record_metric(&self, name: &str, value: f64, tags: BTreeMap<String, String>) {
        self.record_metric_at(name, value, tags, Utc::now());
    }

    fn record_metric_at(&self, name: &str, value: f64, tags: BTreeMap<String, String>, timestamp: DateTime<Utc>) {
        let point = MetricPoint {
            name: name.to_string(),
            value,
            tags,
            timestamp,
        };
        let mut state = self.state.lock();
        push_bounded(&mut state.metrics, point, self.config.max_metrics);
    }

    pub fn record_request(&self, route: &str, method: &str, status: u16, duration: std::time::Duration, tenant: Option<&str>) {
        self.record_request_at(route, method, status, duration, tenant, Utc::now());
    }

    pub fn record_request_at(
        &self,
        route: &str,
        method: &str,
        status: u16,
        duration: std::time::Duration,
        tenant: Option<&str>,
        timestamp: DateTime<Utc>,
    ) {
        let mut tags = BTreeMap::from([
            ("route".to_string(), route.to_string()),
            ("method".to_string(), method.to_string()),
            ("status".to_string(), status.to_string()),
        ]);
        if let Some(tenant) = tenant {
            tags.insert(TENANT_TAG.to_string(), tenant.to_string());
        }
        let millis = duration.as_secs_f64() * 1000.0;

        if millis > self.config.slow_response_ms {
            debug!("Slow request {} {} took {:.1}ms", method, route, millis);
        }
        self.record_metric_at(REQUEST_METRIC, millis, tags, timestamp);
    }

    pub fn track_error(
        &self,
        message: &str,
        code: &str,
        route: Option<&str>,
        tenant: Option<&str>,
        severity: Severity,
    ) -> Uuid {
        self.track_error_at(message, code, route, tenant, severity, Utc::now())
    }

    pub fn track_error_at(
        &self,
        message: &str,
        code: &str,
        route: Option<&str>,
        tenant: Option<&str>,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Uuid {
        let error = TrackedError {
            id: Uuid::new_v4(),
            message: message.to_string(),
            code: code.to_string(),
            route: route.map(str::to_string),
            tenant: tenant.map(str::to_string),
            severity,
            timestamp,
        };
        let id = error.id;
        let mut state = self.state.lock();
        push_bounded(&mut state.errors, error, self.config.max_errors);
        id
    }

    pub fn summary(&self, window: Duration) -> MonitoringSummary {
        self.summary_at(window, Utc::now())
    }

    pub fn summary_at(&self, window: Duration, now: DateTime<Utc>) -> MonitoringSummary {
        self.summarize(window, now, None)
    }

    /// Summary restricted to one tenant's traffic
    pub fn tenant_summary(&self, tenant: &str, window: Duration) -> MonitoringSummary {
        self.summarize(window, Utc::now(), Some(tenant))
    }

    fn summarize(&self, window: Duration, now: DateTime<Utc>, tenant: Option<&str>) -> MonitoringSummary {
        let since = now - window;
        let state = self.state.lock();

        let requests: Vec<&MetricPoint> = state
            .metrics
            .iter()
            .filter(|m| m.name == REQUEST_METRIC && m.timestamp >= since && m.in_scope(tenant))
            .collect();

        let request_count = requests.len();
        let error_count = requests.iter().filter(|m| m.status().is_some_and(|s| s >= 500)).count();
        let mut durations: Vec<f64> = requests.iter().map(|m| m.value).collect();

        let mut status_counts = BTreeMap::new();
        let mut per_route: HashMap<&str, (usize, f64)> = HashMap::new();
        for m in &requests {
            if let Some(status) = m.tag("status") {
                *status_counts.entry(status.to_string()).or_insert(0) += 1;
            }
            let entry = per_route.entry(m.tag("route").unwrap_or("unknown")).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += m.value;
        }

        let mut slowest_routes: Vec<RouteTiming> = per_route
            .into_iter()
            .map(|(route, (count, total))| RouteTiming {
                route: route.to_string(),
                count,
                avg_response_ms: total / count as f64,
            })
            .collect();
        slowest_routes.sort_by(|a, b| b.avg_response_ms.total_cmp(&a.avg_response_ms).then(a.route.cmp(&b.route)));
        slowest_routes.truncate(SLOWEST_ROUTES);

        let mut event_counts = BTreeMap::new();
        for m in state
            .metrics
            .iter()
            .filter(|m| m.name != REQUEST_METRIC && m.timestamp >= since && m.in_scope(tenant))
        {
            let tags: Vec<&str> = m.tags.values().map(String::as_str).collect();
            let key = if tags.is_empty() { m.name.clone() } else { format!("{}:{}", m.name, tags.join(":")) };
            *event_counts.entry(key).or_insert(0) += 1;
        }

        MonitoringSummary {
            window_secs: window.num_seconds(),
            request_count,
            error_count,
            error_rate: ratio(error_count, request_count),
            avg_response_ms: mean(&durations),
            p95_response_ms: percentile(&mut durations, 95.0),
            slowest_routes,
            status_counts,
            event_counts,
            tracked_errors: state.errors.iter().filter(|e| e.timestamp >= since && e.in_scope(tenant)).count(),
        }
    }

    /// Most recent first
    pub fn recent_errors(&self, limit: usize) -> Vec<TrackedError> {
        self.state.lock().errors.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent first, only errors raised while serving `tenant`
    pub fn tenant_errors(&self, tenant: &str, limit: usize) -> Vec<TrackedError> {
        let state = self.state.lock();
        state.errors.iter().rev().filter(|e| e.in_scope(Some(tenant))).take(limit).cloned().collect()
    }

    /// Most recent first
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.state.lock().alerts.iter().rev().take(limit).cloned().collect()
    }

    /// Thresholds currently exceeded by one tenant's traffic. Nothing is recorded.
    pub fn tenant_alerts(&self, tenant: &str, now: DateTime<Utc>) -> Vec<Alert> {
        self.alert_candidates(now, Some(tenant))
            .into_iter()
            .map(|(kind, message, value, threshold)| Alert {
                kind,
                message,
                value,
                threshold,
                triggered_at: now,
            })
            .collect()
    }

    fn alert_candidates(&self, now: DateTime<Utc>, tenant: Option<&str>) -> Vec<(AlertKind, String, f64, f64)> {
        let last_minute = now - Duration::minutes(1);
        let errors_last_minute = self
            .state
            .lock()
            .errors
            .iter()
            .filter(|e| e.timestamp >= last_minute && e.in_scope(tenant))
            .count();
        let recent = self.summarize(Duration::minutes(RESPONSE_WINDOW_MINUTES), now, tenant);

        let mut candidates = Vec::new();
        if errors_last_minute > self.config.error_threshold_per_minute {
            candidates.push((
                AlertKind::ErrorSpike,
                format!("{} errors in the last minute", errors_last_minute),
                errors_last_minute as f64,
                self.config.error_threshold_per_minute as f64,
            ));
        }
        if recent.request_count > 0 && recent.avg_response_ms > self.config.slow_response_ms {
            candidates.push((
                AlertKind::SlowResponses,
                format!("Average response time {:.1}ms over the last 5 minutes", recent.avg_response_ms),
                recent.avg_response_ms,
                self.config.slow_response_ms,
            ));
        }
        if recent.request_count > 0 && recent.error_rate > self.config.error_rate_threshold {
            candidates.push((
                AlertKind::HighErrorRate,
                format!("Error rate {:.1}% over the last 5 minutes", recent.error_rate * 100.0),
                recent.error_rate,
                self.config.error_rate_threshold,
            ));
        }
        candidates
    }

    /// Check thresholds and record any newly raised alerts
    pub fn evaluate_alerts(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let candidates = self.alert_candidates(now, None);

        let mut raised = Vec::new();
        let mut state = self.state.lock();
        for (kind, message, value, threshold) in candidates {
            let cooling_down = state
                .last_raised
                .get(&kind)
                .is_some_and(|at| now - *at < Duration::minutes(ALERT_COOLDOWN_MINUTES));
            if cooling_down {
                continue;
            }

            warn!(alert = ?kind, value, threshold, "{}", message);
            let alert = Alert {
                kind,
                message,
                value,
                threshold,
                triggered_at: now,
            };
            state.last_raised.insert(kind, now);
            push_bounded(&mut state.alerts, alert.clone(), MAX_ALERTS);
            raised.push(alert);
        }
        raised
    }

    /// Drop metrics, errors and alerts older than the retention period
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(self.config.retention_secs);
        let mut state = self.state.lock();
        let before = state.metrics.len() + state.errors.len() + state.alerts.len();

        state.metrics.retain(|m| m.timestamp >= cutoff);
        state.errors.retain(|e| e.timestamp >= cutoff);
        state.alerts.retain(|a| a.triggered_at >= cutoff);

        before - (state.metrics.len() + state.errors.len() + state.alerts.len())
    }

    /// Periodic cleanup plus alert evaluation
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let every = std::time::Duration::from_secs(self.config.cleanup_interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let now = Utc::now();
                monitor.evaluate_alerts(now);
                let removed = monitor.cleanup(now);
                if removed > 0 {
                    debug!("Monitor cleanup removed {} entries", removed);
                }
            }
        })
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Nearest-rank percentile
fn percentile(values: &mut [f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let rank = ((pct / 100.0) * values.len() as f64).ceil() as usize;
    values[rank.clamp(1, values.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn config() -> MonitoringConfig {
        MonitoringConfig {
            max_metrics: 100,
            max_errors: 10,
            error_threshold_per_minute: 3,
            error_rate_threshold: 0.5,
            slow_response_ms: 500.0,
            retention_secs: 3600,
            cleanup_interval_secs: 60,
        }
    }

    fn ms(n: u64) -> StdDuration {
        StdDuration::from_millis(n)
    }

    #[test]
    fn buffers_are_bounded() {
        let monitor = Monitor::new(MonitoringConfig { max_metrics: 3, max_errors: 2, ..config() });
        for i in 0..5 {
            monitor.record_request("/api/books", "GET", 200, ms(i), None);
            monitor.track_error(&format!("boom {}", i), "INTERNAL_SERVER_ERROR", None, None, Severity::Error);
        }
        let state = monitor.state.lock();
        assert_eq!(state.metrics.len(), 3);
        assert_eq!(state.metrics.front().unwrap().value, 2.0);
        assert_eq!(state.errors.len(), 2);
        assert_eq!(state.errors.back().unwrap().message, "boom 4");
    }

    #[test]
    fn summary_statistics() {
        let monitor = Monitor::new(config());
        let now = Utc::now();
        for i in 1..=20u64 {
            let status = if i % 10 == 0 { 500 } else { 200 };
            monitor.record_request_at("/api/books", "GET", status, ms(i * 10), None, now);
        }
        monitor.record_request_at("/api/admin/stats", "GET", 200, ms(900), None, now);
        // Outside the window
        monitor.record_request_at("/api/blog", "GET", 200, ms(5), None, now - Duration::hours(2));
        let tags = BTreeMap::from([
            ("provider".to_string(), "stripe".to_string()),
            ("outcome".to_string(), "paid".to_string()),
        ]);
        monitor.record_metric("webhook.received", 1.0, tags);

        let summary = monitor.summary_at(Duration::minutes(15), now);
        assert_eq!(summary.request_count, 21);
        assert_eq!(summary.error_count, 2);
        assert_eq!(summary.status_counts.get("200"), Some(&19));
        assert_eq!(summary.p95_response_ms, 200.0);
        assert_eq!(summary.slowest_routes[0].route, "/api/admin/stats");
        assert!((summary.error_rate - 2.0 / 21.0).abs() < 1e-9);
        assert_eq!(summary.event_counts.get("webhook.received:paid:stripe"), Some(&1));
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = Monitor::new(config()).summary(Duration::minutes(5));
        assert_eq!(summary.request_count, 0);
        assert_eq!(summary.error_rate, 0.0);
        assert_eq!(summary.p95_response_ms, 0.0);
    }

    #[test]
    fn error_spike_alert_respects_cooldown() {
        let monitor = Monitor::new(config());
        let now = Utc::now();
        for _ in 0..4 {
            monitor.track_error_at("db down", "SERVICE_UNAVAILABLE", None, None, Severity::Critical, now);
        }

        let raised = monitor.evaluate_alerts(now);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::ErrorSpike);

        assert!(monitor.evaluate_alerts(now + Duration::seconds(30)).is_empty());

        for _ in 0..4 {
            monitor.track_error_at("db down", "SERVICE_UNAVAILABLE", None, None, Severity::Critical, now + Duration::minutes(6));
        }
        assert_eq!(monitor.evaluate_alerts(now + Duration::minutes(6)).len(), 1);
        assert_eq!(monitor.recent_alerts(10).len(), 2);
    }

    #[test]
    fn slow_and_failing_requests_alert() {
        let monitor = Monitor::new(config());
        let now = Utc::now();
        monitor.record_request_at("/api/checkout", "POST", 502, ms(1200), None, now);
        monitor.record_request_at("/api/checkout", "POST", 200, ms(800), None, now);

        let kinds: Vec<AlertKind> = monitor.evaluate_alerts(now).into_iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::SlowResponses));
        assert!(!kinds.contains(&AlertKind::HighErrorRate));

        monitor.record_request_at("/api/checkout", "POST", 500, ms(10), None, now);
        let kinds: Vec<AlertKind> = monitor.evaluate_alerts(now).into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::HighErrorRate]);
    }

    #[test]
    fn cleanup_drops_old_entries() {
        let monitor = Monitor::new(config());
        let now = Utc::now();
        monitor.record_request_at("/", "GET", 200, ms(1), None, now - Duration::hours(2));
        monitor.record_request_at("/", "GET", 200, ms(1), None, now);
        monitor.track_error_at("old", "X", None, None, Severity::Warning, now - Duration::hours(2));

        assert_eq!(monitor.cleanup(now), 2);
        assert_eq!(monitor.summary_at(Duration::hours(3), now).request_count, 1);
        assert!(monitor.recent_errors(10).is_empty());
    }

    #[test]
    fn tenant_views_only_see_their_own_traffic() {
        let monitor = Monitor::new(config());
        let now = Utc::now();
        monitor.record_request_at("/api/books", "GET", 200, ms(20), Some("acme"), now);
        for _ in 0..4 {
            monitor.record_request_at("/api/checkout", "POST", 500, ms(900), Some("globex"), now);
            monitor.track_error_at("db down", "INTERNAL_SERVER_ERROR", Some("/api/checkout"), Some("globex"), Severity::Error, now);
        }
        monitor.track_error_at("mail relay down", "EMAIL_SEND_FAILED", None, None, Severity::Warning, now);

        let acme = monitor.summarize(Duration::minutes(5), now, Some("acme"));
        assert_eq!(acme.request_count, 1);
        assert_eq!(acme.error_count, 0);
        assert_eq!(acme.tracked_errors, 0);
        assert_eq!(acme.slowest_routes[0].route, "/api/books");
        assert!(monitor.tenant_errors("acme", 20).is_empty());
        assert!(monitor.tenant_alerts("acme", now).is_empty());

        let globex = monitor.summarize(Duration::minutes(5), now, Some("globex"));
        assert_eq!(globex.request_count, 4);
        assert_eq!(monitor.tenant_errors("globex", 20).len(), 4);
        let kinds: Vec<AlertKind> = monitor.tenant_alerts("globex", now).into_iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::ErrorSpike));
        assert!(kinds.contains(&AlertKind::HighErrorRate));
        // Scoped checks do not feed the process-wide alert log
        assert!(monitor.recent_alerts(10).is_empty());

        assert_eq!(monitor.summary_at(Duration::minutes(5), now).request_count, 5);
        assert_eq!(monitor.recent_errors(20).len(), 5);
    }

    #[test]
    fn percentile_nearest_rank() {
        let mut values = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile(&mut values, 50.0), 3.0);
        assert_eq!(percentile(&mut values, 95.0), 5.0);
        assert_eq!(percentile(&mut [7.0], 95.0), 7.0);
    }
}
