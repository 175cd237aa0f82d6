use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::*;

/// Named counters kept in a registry owned by one server instead of the global recorder
#[derive(Clone)]
pub struct Counters {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl Counters {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder: Arc::new(recorder),
            handle,
        }
    }

    pub fn inc(&self, name: &str) {
        self.inc_by(name, 1)
    }

    pub fn dec(&self, name: &str) {
        self.dec_by(name, 1)
    }

    pub fn inc_by(&self, name: &str, n: i64) {
        self.add(name, n as f64)
    }

    pub fn dec_by(&self, name: &str, n: i64) {
        self.add(name, -(n as f64))
    }

    /// Prometheus text exposition of every counter touched so far
    pub fn render(&self) -> String {
        self.handle.render()
    }

    fn add(&self, name: &str, delta: f64) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            gauge!(name.to_owned()).increment(delta)
        })
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(counters: &Counters, name: &str) -> Option<f64> {
        counters.render().lines().find_map(|line| {
            let (metric, value) = line.split_once(' ')?;
            (metric == name).then(|| value.trim().parse().ok())?
        })
    }

    #[test]
    fn counts_up_and_down() {
        let counters = Counters::new();
        counters.inc("n_index");
        counters.inc("n_index");
        counters.inc_by("n_add", 5);
        counters.dec("n_add");
        counters.dec_by("n_add", 2);

        assert_eq!(value_of(&counters, "n_index"), Some(2.0));
        assert_eq!(value_of(&counters, "n_add"), Some(2.0));
        assert_eq!(value_of(&counters, "n_done"), None);
    }

    #[test]
    fn registries_are_independent() {
        let first = Counters::new();
        let second = Counters::new();
        first.inc("n_done");
        assert_eq!(value_of(&first, "n_done"), Some(1.0));
        assert_eq!(value_of(&second, "n_done"), None);
    }
}
