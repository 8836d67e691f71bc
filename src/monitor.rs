use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    backend::{MonitorControl, MonitorHandle},
    error::MixerError,
    property::Property,
};

/// Peak level attachment of a stream.
///
/// Created lazily by the stream on the first start request and dropped when
/// the stream goes away or its monitor target changes. Samples delivered by
/// the backend are forwarded into the stream's value channel; delivery is
/// best effort and slow subscribers lose samples rather than building up a
/// backlog.
pub struct Monitor {
    enabled: Property<bool>,
    control: Arc<dyn MonitorControl>,
    forward: tokio::task::JoinHandle<()>,
}

impl Monitor {
    /// Wrap a backend monitor handle and start forwarding its samples.
    pub(crate) fn new(handle: MonitorHandle, values_tx: broadcast::Sender<f64>) -> Self {
        let MonitorHandle { control, values } = handle;

        let forward = tokio::spawn(async move {
            let mut values = values;
            while let Some(value) = values.next().await {
                let _ = values_tx.send(value);
            }
            debug!("monitor value stream ended");
        });

        Self {
            enabled: Property::new(false),
            control,
            forward,
        }
    }

    /// Ask the backend to start or stop sampling, caching the state locally
    /// on success.
    pub(crate) async fn set_enabled(&self, enabled: bool) -> Result<(), MixerError> {
        self.control.set_enabled(enabled).await?;
        self.enabled.set(enabled);
        Ok(())
    }

    /// Locally cached enabled state.
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.forward.abort();
    }
}
