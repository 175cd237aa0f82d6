use crate::*;

use axum::extract::ConnectInfo;
use std::{net::SocketAddr, time::Duration};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::TraceLayer,
};
use tracing::Span;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Target of access log lines
pub const ACCESS_LOG_TARGET: &str = "todo";

const DEFAULT_FILTER: &str = "info,sled=warn,hyper=info";

fn pretty_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes log collection, fails if a global subscriber is already set
pub fn init_tracing_subscriber() -> anyhow::Result<()> {
    let shell_layer = fmt::layer()
        .with_timer(ChronoUtc::new("%Y/%m/%d %H:%M:%S".to_owned()))
        .with_filter(pretty_filter());

    tracing_subscriber::registry().with(shell_layer).try_init()?;
    Ok(())
}

/// Access log, one line per response
pub fn trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    impl Fn(&Request<Body>) -> Span + Clone + Copy,
    (),
    impl Fn(&Response<Body>, Duration, &Span) + Clone + Copy,
    (),
    (),
> {
    TraceLayer::new_for_http()
        .on_eos(())
        .on_body_chunk(())
        .on_request(())
        .on_response(|resp: &Response, latency: Duration, _span: &Span| {
            let millis = latency.as_secs_f64() * 1000.0;
            let status = resp.status().as_u16();
            info!(target: ACCESS_LOG_TARGET, status, "{status} in {millis:.1}ms");
        })
        .make_span_with(|request: &Request| {
            let remote = remote_addr(request);
            let method = request.method().as_str();
            let uri = request.uri().to_string();
            let version = format!("{:?}", request.version());
            tracing::info_span!(target: ACCESS_LOG_TARGET, "request", %remote, %method, %uri, %version)
        })
}

/// First `X-Forwarded-For` hop when present, otherwise the peer address
pub fn remote_addr<B>(request: &Request<B>) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(addr) = forwarded {
        return addr.to_owned();
    }
    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.to_string(),
        None => "-".to_owned(),
    }
}
