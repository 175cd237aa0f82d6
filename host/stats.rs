use crate::*;

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

const WINDOW: Duration = Duration::from_secs(1);

/// Running request statistics shared by [`StatsLayer`] and the `/debug/stats` handler
#[derive(Clone)]
pub struct Stats {
    started: Instant,
    inner: Arc<Mutex<Counts>>,
}

struct Counts {
    window_start: Instant,
    count: u64,
    status_code_count: BTreeMap<String, u64>,
    total_count: u64,
    total_status_code_count: BTreeMap<String, u64>,
    total_response_time: Duration,
}

impl Counts {
    // per-second counters are cleared lazily once their window has passed
    fn roll_window(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= WINDOW {
            self.window_start = now;
            self.count = 0;
            self.status_code_count.clear();
        }
    }
}

/// Snapshot served by `/debug/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsData {
    pub pid: u32,
    pub uptime: String,
    pub uptime_sec: f64,
    pub time: String,
    pub unixtime: i64,
    pub status_code_count: BTreeMap<String, u64>,
    pub total_status_code_count: BTreeMap<String, u64>,
    pub count: u64,
    pub total_count: u64,
    pub total_response_time: String,
    pub total_response_time_sec: f64,
    pub average_response_time: String,
    pub average_response_time_sec: f64,
}

impl Stats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            inner: Arc::new(Mutex::new(Counts {
                window_start: now,
                count: 0,
                status_code_count: BTreeMap::new(),
                total_count: 0,
                total_status_code_count: BTreeMap::new(),
                total_response_time: Duration::ZERO,
            })),
        }
    }

    pub fn layer(&self) -> StatsLayer {
        StatsLayer {
            stats: self.clone(),
        }
    }

    pub fn record(&self, status: StatusCode, elapsed: Duration) {
        let status = status.as_u16().to_string();
        let mut counts = self.counts();
        counts.roll_window(Instant::now());
        counts.count += 1;
        counts.total_count += 1;
        *counts.status_code_count.entry(status.clone()).or_default() += 1;
        *counts.total_status_code_count.entry(status).or_default() += 1;
        counts.total_response_time += elapsed;
    }

    pub fn data(&self) -> StatsData {
        let now = Utc::now();
        let uptime = self.started.elapsed();
        let mut counts = self.counts();
        counts.roll_window(Instant::now());

        let average = match counts.total_count {
            0 => Duration::ZERO,
            n => counts.total_response_time.div_f64(n as f64),
        };

        StatsData {
            pid: std::process::id(),
            uptime: format!("{uptime:?}"),
            uptime_sec: uptime.as_secs_f64(),
            time: now.to_string(),
            unixtime: now.timestamp(),
            status_code_count: counts.status_code_count.clone(),
            total_status_code_count: counts.total_status_code_count.clone(),
            count: counts.count,
            total_count: counts.total_count,
            total_response_time: format!("{:?}", counts.total_response_time),
            total_response_time_sec: counts.total_response_time.as_secs_f64(),
            average_response_time: format!("{average:?}"),
            average_response_time_sec: average.as_secs_f64(),
        }
    }

    // a panic while holding the lock leaves plain counters behind, still usable
    fn counts(&self) -> MutexGuard<'_, Counts> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer recording the status and latency of every response into [`Stats`]
#[derive(Clone)]
pub struct StatsLayer {
    stats: Stats,
}

impl<S> Layer<S> for StatsLayer {
    type Service = StatsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatsMiddleware {
            inner,
            stats: self.stats.clone(),
        }
    }
}

/// Underlying middleware that powers [`StatsLayer`]
#[doc(hidden)]
#[derive(Clone)]
pub struct StatsMiddleware<S> {
    inner: S,
    stats: Stats,
}

impl<S> Service<Request<Body>> for StatsMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<
        Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send + 'static>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let started = Instant::now();
        let stats = self.stats.clone();
        let future = self.inner.call(request);
        Box::pin(async move {
            let response = future.await?;
            stats.record(response.status(), started.elapsed());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[test]
    fn empty_snapshot_serializes() {
        let data = Stats::new().data();
        assert_eq!(data.total_count, 0);
        assert_eq!(data.average_response_time_sec, 0.0);
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.is_object());
        assert_eq!(json["pid"], std::process::id());
    }

    #[test]
    fn records_statuses_and_latency() {
        let stats = Stats::new();
        stats.record(StatusCode::OK, Duration::from_millis(10));
        stats.record(StatusCode::OK, Duration::from_millis(30));
        stats.record(StatusCode::INTERNAL_SERVER_ERROR, Duration::from_millis(20));

        let data = stats.data();
        assert_eq!(data.total_count, 3);
        assert_eq!(data.total_status_code_count["200"], 2);
        assert_eq!(data.total_status_code_count["500"], 1);
        assert!((data.total_response_time_sec - 0.06).abs() < 1e-9);
        assert!((data.average_response_time_sec - 0.02).abs() < 1e-9);
    }

    #[test]
    fn window_counters_reset() {
        let stats = Stats::new();
        stats.record(StatusCode::FOUND, Duration::from_millis(1));
        {
            let mut counts = stats.counts();
            counts.window_start -= WINDOW;
        }
        let data = stats.data();
        assert_eq!(data.count, 0);
        assert!(data.status_code_count.is_empty());
        assert_eq!(data.total_count, 1);
        assert_eq!(data.total_status_code_count["302"], 1);
    }

    #[tokio::test]
    async fn middleware_records_responses() {
        let stats = Stats::new();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(stats.layer());

        for uri in ["/", "/", "/missing"] {
            let request = http::Request::builder().uri(uri).body(Body::empty()).unwrap();
            app.clone().oneshot(request).await.unwrap();
        }

        let data = stats.data();
        assert_eq!(data.total_count, 3);
        assert_eq!(data.total_status_code_count["200"], 2);
        assert_eq!(data.total_status_code_count["404"], 1);
    }
}
