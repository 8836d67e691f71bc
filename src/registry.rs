use std::{collections::HashMap, sync::Arc};

use async_stream::stream;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    backend::{Backend, StreamKind, StreamSnapshot},
    stream::{Stream, StreamAttribute},
};

/// Arena key of a stream: backend index spaces are per subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    /// Stream subtype
    pub kind: StreamKind,
    /// Backend index within the subtype's index space
    pub index: u32,
}

/// Events emitted by the stream arena.
#[derive(Debug, Clone)]
pub enum MixerEvent {
    /// A new stream appeared
    StreamAdded(Arc<Stream>),
    /// Attributes of a stream changed, listed in flush order
    StreamChanged {
        /// Key of the changed stream
        key: StreamKey,
        /// Changed attributes in flush order
        attributes: Vec<StreamAttribute>,
    },
    /// A stream went away; this is its final notification
    StreamRemoved(Arc<Stream>),
}

/// Index-addressed arena of the streams reported by one connection.
///
/// Streams are created on the first snapshot for an unknown key, updated by
/// later snapshots and destroyed on backend removal or connection teardown.
/// Device relations between streams stay non-owning indices resolved through
/// the arena, so there are no ownership cycles.
pub struct StreamRegistry {
    backend: Arc<dyn Backend>,
    streams: HashMap<StreamKey, Arc<Stream>>,
    events_tx: broadcast::Sender<MixerEvent>,
}

impl StreamRegistry {
    /// Create an empty arena dispatching commands through `backend`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        Self {
            backend,
            streams: HashMap::new(),
            events_tx,
        }
    }

    /// Apply one backend snapshot, creating the stream if it is new.
    ///
    /// Emits [`MixerEvent::StreamAdded`] for a new stream and
    /// [`MixerEvent::StreamChanged`] when an existing one actually changed.
    pub fn apply(&mut self, snapshot: &StreamSnapshot) -> Arc<Stream> {
        let key = StreamKey {
            kind: snapshot.kind,
            index: snapshot.index,
        };
        if let Some(stream) = self.streams.get(&key) {
            let attributes = stream.apply_snapshot(snapshot);
            if !attributes.is_empty() {
                let _ = self.events_tx.send(MixerEvent::StreamChanged { key, attributes });
            }
            Arc::clone(stream)
        } else {
            let stream = Stream::new(Arc::clone(&self.backend), snapshot);
            debug!(index = key.index, kind = ?key.kind, "stream appeared");
            self.streams.insert(key, Arc::clone(&stream));
            let _ = self.events_tx.send(MixerEvent::StreamAdded(Arc::clone(&stream)));
            stream
        }
    }

    /// Destroy a stream the backend reported as removed.
    ///
    /// Tears the stream down (disabling its monitor) and emits the final
    /// [`MixerEvent::StreamRemoved`] notification.
    pub async fn remove(&mut self, kind: StreamKind, index: u32) -> Option<Arc<Stream>> {
        let stream = self.streams.remove(&StreamKey { kind, index })?;
        stream.teardown().await;
        debug!(index, ?kind, "stream removed");
        let _ = self
            .events_tx
            .send(MixerEvent::StreamRemoved(Arc::clone(&stream)));
        Some(stream)
    }

    /// Destroy every stream. Called when the owning connection goes away.
    pub async fn shutdown(&mut self) {
        let streams: Vec<Arc<Stream>> = self.streams.drain().map(|(_, stream)| stream).collect();
        for stream in streams {
            stream.teardown().await;
            let _ = self
                .events_tx
                .send(MixerEvent::StreamRemoved(Arc::clone(&stream)));
        }
    }

    /// Look up a stream by kind and backend index.
    pub fn get(&self, kind: StreamKind, index: u32) -> Option<Arc<Stream>> {
        self.streams.get(&StreamKey { kind, index }).cloned()
    }

    /// Resolve the device stream a client stream is attached to.
    pub fn device_of(&self, stream: &Stream) -> Option<Arc<Stream>> {
        let device_kind = stream.kind().device_kind()?;
        let device_index = stream.device.get()?;
        self.get(device_kind, device_index)
    }

    /// All streams currently in the arena, in no particular order.
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        self.streams.values().cloned().collect()
    }

    /// Number of streams in the arena.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Subscribe to arena events.
    ///
    /// Delivery is best effort: a subscriber that falls far behind skips
    /// over the events it missed.
    pub fn events(&self) -> impl futures::Stream<Item = MixerEvent> + Send + use<> {
        let mut events_rx = self.events_tx.subscribe();
        stream! {
            loop {
                match events_rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
