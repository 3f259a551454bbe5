use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::SinkError;
use crate::metrics::{Metric, MetricsSink, StreamingSink};

use super::metric_csv::MetricCsvWriter;
use super::metric_json::MetricJsonWriter;

/// Files that receive every metric while the run is in progress.
#[derive(Debug, Clone, Default)]
pub struct StreamOutputs {
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl StreamOutputs {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.csv.is_none() && self.json.is_none()
    }
}

/// Records into the aggregating sink and forwards a copy of each metric to
/// the background writer task.
#[derive(Debug)]
pub struct ForwardingSink {
    sink: Arc<StreamingSink>,
    tx: mpsc::UnboundedSender<Metric>,
}

impl ForwardingSink {
    #[must_use]
    pub const fn new(sink: Arc<StreamingSink>, tx: mpsc::UnboundedSender<Metric>) -> Self {
        Self { sink, tx }
    }
}

impl MetricsSink for ForwardingSink {
    fn record(&self, metric: Metric) {
        if self.tx.send(metric.clone()).is_err() {
            debug!("Metric writer stopped, {} not streamed", metric.target_name);
        }
        self.sink.record(metric);
    }
}

/// Spawns the task that drains `rx` into the configured files. The task ends
/// once every sender is dropped and returns the number of streamed metrics.
#[must_use]
pub fn spawn_metric_writer(
    outputs: StreamOutputs,
    mut rx: mpsc::UnboundedReceiver<Metric>,
) -> JoinHandle<Result<u64, SinkError>> {
    tokio::spawn(async move {
        let mut csv = match outputs.csv.as_deref() {
            Some(path) => Some(MetricCsvWriter::create(path).await?),
            None => None,
        };
        let mut json = match outputs.json.as_deref() {
            Some(path) => Some(MetricJsonWriter::create(path).await?),
            None => None,
        };

        let mut streamed: u64 = 0;
        while let Some(metric) = rx.recv().await {
            if let Some(writer) = csv.as_mut() {
                writer.write(&metric).await?;
            }
            if let Some(writer) = json.as_mut() {
                writer.write(&metric).await?;
            }
            streamed = streamed.saturating_add(1);
        }

        if let (Some(writer), Some(path)) = (csv.as_mut(), outputs.csv.as_deref()) {
            let rows = writer.finish().await?;
            info!("Wrote {} metrics to {}", rows, path.display());
        }
        if let (Some(writer), Some(path)) = (json.as_mut(), outputs.json.as_deref()) {
            let records = writer.finish().await?;
            info!("Wrote {} metrics to {}", records, path.display());
        }
        Ok::<u64, SinkError>(streamed)
    })
}
