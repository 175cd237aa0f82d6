use crate::*;

mod counters;
pub use counters::*;

mod handlers;
pub use handlers::*;

mod stats;
pub use stats::*;

mod traces;
pub use traces::*;

use axum_server::Handle;
use std::{net::SocketAddr, time::Duration};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Owns the store handle and the request handlers, serves them on `bind`
pub struct Server {
    bind: SocketAddr,
    store: TodoStore,
    handlers: Handlers,
}

impl Server {
    /// Parses the bundled templates, a malformed one aborts startup
    pub fn new(bind: SocketAddr, store: TodoStore) -> anyhow::Result<Self> {
        let templates = Templates::load()?;
        let handlers = Handlers::new(Arc::new(store.clone()), templates);
        Ok(Self {
            bind,
            store,
            handlers,
        })
    }

    /// Routes wrapped as `access log(stats(gzip(router)))`
    pub fn router(&self) -> Router {
        let stats = self.handlers.request_stats().layer();
        self.handlers
            .clone()
            .routes()
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(CompressionLayer::new())
            .layer(stats)
            .layer(trace_layer())
    }

    /// Serves until ctrl-c, then flushes the store
    pub async fn serve(self) -> anyhow::Result<()> {
        let handle = Handle::new();
        tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

        info!("Starting serving at http://{}", self.bind);
        axum_server::bind(self.bind)
            .handle(handle)
            .serve(
                self.router()
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;

        let flushed = self.store.flush()?;
        info!("Flushed {flushed} bytes to the store, bye");
        Ok(())
    }
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
        return;
    }
    warn!("Initiating shutdown process");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };
    error!("Panic occured: {details}");
    (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
}
