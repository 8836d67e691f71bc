pub(crate) mod update;

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::{
    backend::{Backend, StreamKind, StreamSnapshot, StreamState},
    balance,
    channel::{ChannelMap, ChannelPosition},
    error::MixerError,
    flags::StreamFlags,
    monitor::Monitor,
    port::{Port, PortRegistry},
    property::Property,
    volume::{self, VolumeVector},
};

pub use update::StreamAttribute;

/// A controllable audio stream.
///
/// Every attribute lives in a [`Property`] cell: `get()` is the synchronous
/// read accessor and `watch()` the attribute's change-notification channel.
/// Mutators are asynchronous, capability-gated requests to the backend; the
/// local model only changes when a confirming snapshot arrives, except for
/// the active port which commits as soon as the backend accepts the switch.
pub struct Stream {
    index: u32,
    kind: StreamKind,
    backend: Arc<dyn Backend>,

    /// Stream name
    pub name: Property<String>,
    /// Human readable description
    pub description: Property<String>,
    /// Index of the device stream this stream is attached to
    pub device: Property<Option<u32>>,
    /// Capability flags, recomputed from every snapshot
    pub flags: Property<StreamFlags>,
    /// Lifecycle state
    pub state: Property<StreamState>,
    /// Mute state
    pub mute: Property<bool>,
    /// Per-channel volume, always the same length as the channel map
    pub volume: Property<VolumeVector>,
    /// Device-defined reference volume
    pub base_volume: Property<u32>,
    /// Left/right balance, 0 unless the stream can balance
    pub balance: Property<f32>,
    /// Front/back fade, 0 unless the stream can fade
    pub fade: Property<f32>,
    /// Switchable ports in registry order
    pub ports: Property<PortRegistry>,
    /// Currently active port
    pub active_port: Property<Option<Port>>,

    channel_map: Property<ChannelMap>,
    monitor: Mutex<Option<Arc<Monitor>>>,
    monitor_values: broadcast::Sender<f64>,
    weak: Weak<Stream>,
}

impl Stream {
    /// Create a stream for a newly reported backend object and populate it
    /// from its first snapshot.
    pub(crate) fn new(backend: Arc<dyn Backend>, snapshot: &StreamSnapshot) -> Arc<Self> {
        let map = snapshot.channel_map.clone();
        let (monitor_values, _) = broadcast::channel(100);

        let stream = Arc::new_cyclic(|weak| Self {
            index: snapshot.index,
            kind: snapshot.kind,
            backend,
            name: Property::new(String::new()),
            description: Property::new(String::new()),
            device: Property::new(None),
            flags: Property::new(StreamFlags::default()),
            state: Property::new(StreamState::default()),
            mute: Property::new(false),
            volume: Property::new(VolumeVector::muted_for(&map)),
            base_volume: Property::new(volume::VOLUME_NORM),
            balance: Property::new(0.0),
            fade: Property::new(0.0),
            ports: Property::new(PortRegistry::default()),
            active_port: Property::new(None),
            channel_map: Property::new(map),
            monitor: Mutex::new(None),
            monitor_values,
            weak: weak.clone(),
        });
        stream.apply_snapshot(snapshot);
        stream
    }

    /// Stable backend identifier of the stream.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Stream subtype.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channel_map.get().channels()
    }

    /// Current channel layout.
    pub fn channel_map(&self) -> ChannelMap {
        self.channel_map.get()
    }

    /// Position of the channel at `index`, `Unknown` when out of range.
    pub fn channel_position(&self, channel: usize) -> ChannelPosition {
        self.channel_map.get().position(channel)
    }

    /// Whether any channel sits at the given position.
    pub fn has_position(&self, position: ChannelPosition) -> bool {
        self.channel_map.get().has_position(position)
    }

    /// Aggregate volume: the maximum across all channels.
    pub fn aggregate_volume(&self) -> u32 {
        self.volume.get().max()
    }

    /// Volume of a single channel.
    ///
    /// # Errors
    /// Returns an error when the channel index is out of range.
    pub fn channel_volume(&self, channel: usize) -> Result<u32, MixerError> {
        self.volume
            .get()
            .channel(channel)
            .ok_or(MixerError::InvalidChannel {
                channel,
                channels: self.channels(),
            })
    }

    /// Volume at a channel position.
    ///
    /// # Errors
    /// Returns an error when the channel map does not contain the position.
    pub fn position_volume(&self, position: ChannelPosition) -> Result<u32, MixerError> {
        self.volume.get().position(&self.channel_map.get(), position)
    }

    /// Aggregate volume in decibel.
    ///
    /// # Errors
    /// Returns an error when the stream has no decibel support.
    pub fn decibel(&self) -> Result<f64, MixerError> {
        self.require(StreamFlags::HAS_DECIBEL, "decibel")?;
        Ok(volume::volume_to_decibel(self.aggregate_volume()))
    }

    /// Volume of a single channel in decibel.
    ///
    /// # Errors
    /// Returns an error when the stream has no decibel support or the
    /// channel index is out of range.
    pub fn channel_decibel(&self, channel: usize) -> Result<f64, MixerError> {
        self.require(StreamFlags::HAS_DECIBEL, "decibel")?;
        Ok(volume::volume_to_decibel(self.channel_volume(channel)?))
    }

    /// Volume at a channel position in decibel.
    ///
    /// # Errors
    /// Returns an error when the stream has no decibel support or the map
    /// does not contain the position.
    pub fn position_decibel(&self, position: ChannelPosition) -> Result<f64, MixerError> {
        self.require(StreamFlags::HAS_DECIBEL, "decibel")?;
        Ok(volume::volume_to_decibel(self.position_volume(position)?))
    }

    /// Request a mute change from the backend.
    ///
    /// Setting the current state again is a no-op. The local mute state is
    /// left untouched until a snapshot confirms the change.
    ///
    /// # Errors
    /// Returns an error when mute is not writable or the backend declines.
    pub async fn set_mute(&self, mute: bool) -> Result<(), MixerError> {
        self.require(StreamFlags::MUTE_WRITABLE, "set-mute")?;
        if self.mute.get() == mute {
            return Ok(());
        }
        self.backend.set_mute(self.kind, self.index, mute).await
    }

    /// Request a volume change from the backend.
    ///
    /// # Errors
    /// Returns an error when volume is not writable, the vector does not
    /// match the channel map, or the backend declines. Nothing is committed
    /// on failure.
    pub async fn set_volume(&self, volume: VolumeVector) -> Result<(), MixerError> {
        self.dispatch_volume(volume, "set-volume").await
    }

    /// Scale every channel proportionally to a new aggregate volume.
    ///
    /// # Errors
    /// Returns an error when volume is not writable, the target is out of
    /// range, all channels are silent (the ratios are indeterminate), or the
    /// backend declines.
    pub async fn set_aggregate_volume(&self, target: u32) -> Result<(), MixerError> {
        self.require(StreamFlags::VOLUME_WRITABLE, "set-volume")?;
        let next = self.volume.get().scaled_to_max(target)?;
        self.dispatch_volume(next, "set-volume").await
    }

    /// Change the volume of a single channel.
    ///
    /// # Errors
    /// Returns an error when volume is not writable, the index or value is
    /// out of range, or the backend declines.
    pub async fn set_channel_volume(&self, channel: usize, volume: u32) -> Result<(), MixerError> {
        self.require(StreamFlags::VOLUME_WRITABLE, "set-channel-volume")?;
        let next = self.volume.get().with_channel(channel, volume)?;
        self.dispatch_volume(next, "set-channel-volume").await
    }

    /// Change the volume of every channel at a position.
    ///
    /// # Errors
    /// Returns an error when volume is not writable, the map does not
    /// contain the position, the value is out of range, or the backend
    /// declines.
    pub async fn set_position_volume(
        &self,
        position: ChannelPosition,
        volume: u32,
    ) -> Result<(), MixerError> {
        self.require(StreamFlags::VOLUME_WRITABLE, "set-position-volume")?;
        let next = self
            .volume
            .get()
            .with_position(&self.channel_map.get(), position, volume)?;
        self.dispatch_volume(next, "set-position-volume").await
    }

    /// Set the aggregate volume from a decibel value.
    ///
    /// # Errors
    /// Returns an error when the stream has no decibel support, volume is
    /// not writable, or the backend declines.
    pub async fn set_decibel(&self, decibel: f64) -> Result<(), MixerError> {
        self.require(StreamFlags::HAS_DECIBEL, "set-decibel")?;
        self.set_aggregate_volume(volume::volume_from_decibel(decibel))
            .await
    }

    /// Set the volume of a single channel from a decibel value.
    ///
    /// # Errors
    /// Returns an error when the stream has no decibel support, volume is
    /// not writable, the index is out of range, or the backend declines.
    pub async fn set_channel_decibel(&self, channel: usize, decibel: f64) -> Result<(), MixerError> {
        self.require(StreamFlags::HAS_DECIBEL, "set-decibel")?;
        self.set_channel_volume(channel, volume::volume_from_decibel(decibel))
            .await
    }

    /// Set the volume at a channel position from a decibel value.
    ///
    /// # Errors
    /// Returns an error when the stream has no decibel support, volume is
    /// not writable, the position is absent, or the backend declines.
    pub async fn set_position_decibel(
        &self,
        position: ChannelPosition,
        decibel: f64,
    ) -> Result<(), MixerError> {
        self.require(StreamFlags::HAS_DECIBEL, "set-decibel")?;
        self.set_position_volume(position, volume::volume_from_decibel(decibel))
            .await
    }

    /// Redistribute channel volumes to realize a left/right balance.
    ///
    /// The aggregate volume is preserved. Goes through the same commit path
    /// as a direct volume set.
    ///
    /// # Errors
    /// Returns an error when the stream cannot balance, the value is outside
    /// `-1.0..=1.0`, volume is not writable, or the backend declines.
    pub async fn set_balance(&self, balance: f32) -> Result<(), MixerError> {
        self.require(StreamFlags::CAN_BALANCE, "set-balance")?;
        let next = balance::with_balance(&self.volume.get(), &self.channel_map.get(), balance)?;
        self.dispatch_volume(next, "set-balance").await
    }

    /// Redistribute channel volumes to realize a front/back fade.
    ///
    /// The aggregate volume is preserved. Goes through the same commit path
    /// as a direct volume set.
    ///
    /// # Errors
    /// Returns an error when the stream cannot fade, the value is outside
    /// `-1.0..=1.0`, volume is not writable, or the backend declines.
    pub async fn set_fade(&self, fade: f32) -> Result<(), MixerError> {
        self.require(StreamFlags::CAN_FADE, "set-fade")?;
        let next = balance::with_fade(&self.volume.get(), &self.channel_map.get(), fade)?;
        self.dispatch_volume(next, "set-fade").await
    }

    /// Switch the active port.
    ///
    /// The only mutator that commits locally without waiting for a snapshot:
    /// the local active port is updated as soon as the backend accepts the
    /// switch, so the model and the device cannot diverge on a rejected one.
    ///
    /// # Errors
    /// Returns an error when called on a client stream, the port name is
    /// unknown, or the backend declines; local state is unchanged on every
    /// failure.
    pub async fn set_active_port(&self, name: &str) -> Result<(), MixerError> {
        self.require_device("set-active-port")?;
        let registry = self.ports.get();
        let Some(port) = registry.find(name).cloned() else {
            return Err(MixerError::UnknownPort(name.to_owned()));
        };
        self.backend
            .set_active_port(self.kind, self.index, name)
            .await?;
        self.active_port.set(Some(port));
        Ok(())
    }

    /// Ask the backend to suspend this device stream.
    ///
    /// # Errors
    /// Returns an error when called on a client stream or the backend
    /// declines.
    pub async fn suspend(&self) -> Result<(), MixerError> {
        self.require_device("suspend")?;
        self.backend.suspend(self.kind, self.index).await
    }

    /// Ask the backend to resume this device stream.
    ///
    /// # Errors
    /// Returns an error when called on a client stream or the backend
    /// declines.
    pub async fn resume(&self) -> Result<(), MixerError> {
        self.require_device("resume")?;
        self.backend.resume(self.kind, self.index).await
    }

    /// Ask the backend to terminate this client stream.
    ///
    /// The stream object stays in the model until the backend reports the
    /// removal.
    ///
    /// # Errors
    /// Returns an error when called on a device stream or the backend
    /// declines.
    pub async fn remove(&self) -> Result<(), MixerError> {
        self.require_client("remove")?;
        self.backend.remove(self.kind, self.index).await
    }

    /// Start peak level monitoring, creating the monitor on first use.
    ///
    /// Device streams are monitored directly; client streams are monitored
    /// through the device they are attached to.
    ///
    /// # Errors
    /// Returns an error when the stream has no monitor support, a client
    /// stream has no resolved device, or the backend declines.
    pub async fn monitor_start(&self) -> Result<(), MixerError> {
        self.require(StreamFlags::HAS_MONITOR, "monitor-start")?;
        let monitor = self.monitor_or_create().await?;
        monitor.set_enabled(true).await
    }

    /// Stop peak level monitoring. A stream without a monitor is a no-op.
    ///
    /// # Errors
    /// Returns an error when the backend declines.
    pub async fn monitor_stop(&self) -> Result<(), MixerError> {
        let monitor = self.monitor_slot().clone();
        match monitor {
            Some(monitor) => monitor.set_enabled(false).await,
            None => Ok(()),
        }
    }

    /// Locally cached monitoring state.
    pub fn monitor_is_running(&self) -> bool {
        self.monitor_slot().as_ref().is_some_and(|m| m.is_enabled())
    }

    /// Subscribe to peak level samples.
    ///
    /// Samples are delivered best effort; a slow subscriber loses samples
    /// instead of building up a backlog. The stream yields nothing until a
    /// monitor is started.
    pub fn monitor_values(&self) -> impl futures::Stream<Item = f64> + Send + use<> {
        BroadcastStream::new(self.monitor_values.subscribe())
            .filter_map(|value| async move { value.ok() })
    }

    /// Watch every attribute at once.
    ///
    /// Emits the stream itself whenever any attribute changes; read the
    /// attributes of interest through their properties. The combined stream
    /// ends when the stream object goes away.
    pub fn watch(&self) -> impl futures::Stream<Item = Arc<Stream>> + Send + use<> {
        let sources: Vec<futures::stream::BoxStream<'static, ()>> = vec![
            self.name.watch().map(|_| ()).boxed(),
            self.description.watch().map(|_| ()).boxed(),
            self.device.watch().map(|_| ()).boxed(),
            self.flags.watch().map(|_| ()).boxed(),
            self.state.watch().map(|_| ()).boxed(),
            self.mute.watch().map(|_| ()).boxed(),
            self.volume.watch().map(|_| ()).boxed(),
            self.balance.watch().map(|_| ()).boxed(),
            self.fade.watch().map(|_| ()).boxed(),
            self.ports.watch().map(|_| ()).boxed(),
            self.active_port.watch().map(|_| ()).boxed(),
        ];
        let weak = self.weak.clone();
        futures::stream::select_all(sources).filter_map(move |()| {
            let weak = weak.clone();
            async move { weak.upgrade() }
        })
    }

    /// Disable and drop the monitor and clear backend-facing references.
    /// Called when the backend removes the stream or the connection goes
    /// away.
    pub(crate) async fn teardown(&self) {
        let monitor = self.monitor_slot().take();
        if let Some(monitor) = monitor
            && monitor.is_enabled()
            && let Err(error) = monitor.set_enabled(false).await
        {
            warn!(index = self.index, %error, "failed to disable monitor during teardown");
        }
        self.device.set(None);
        self.active_port.set(None);
        self.ports.set(PortRegistry::default());
    }

    /// Drop a monitor whose target changed and recreate it against the new
    /// one, preserving the enabled state.
    pub(crate) fn refresh_monitor(&self) {
        let taken = self.monitor_slot().take();
        let Some(monitor) = taken else { return };
        let enabled = monitor.is_enabled();
        drop(monitor);
        if !enabled {
            return;
        }
        let Some(stream) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(error) = stream.monitor_start().await {
                warn!(
                    index = stream.index,
                    %error,
                    "failed to recreate monitor after device change"
                );
            }
        });
    }

    async fn dispatch_volume(
        &self,
        volume: VolumeVector,
        operation: &'static str,
    ) -> Result<(), MixerError> {
        self.require(StreamFlags::VOLUME_WRITABLE, operation)?;
        let map = self.channel_map.get();
        if !volume.matches(&map) {
            return Err(MixerError::ChannelMismatch {
                volume_channels: volume.channels(),
                map_channels: map.channels(),
            });
        }
        self.backend.set_volume(self.kind, self.index, &volume).await
    }

    async fn monitor_or_create(&self) -> Result<Arc<Monitor>, MixerError> {
        if let Some(monitor) = self.monitor_slot().clone() {
            return Ok(monitor);
        }
        let target = self.monitor_target()?;
        let handle = self.backend.create_monitor(target).await?;
        let created = Arc::new(Monitor::new(handle, self.monitor_values.clone()));
        let mut slot = self.monitor_slot();
        Ok(Arc::clone(slot.get_or_insert(created)))
    }

    fn monitor_target(&self) -> Result<u32, MixerError> {
        if self.kind.is_device() {
            Ok(self.index)
        } else {
            self.device.get().ok_or(MixerError::NoMonitorTarget)
        }
    }

    fn monitor_slot(&self) -> MutexGuard<'_, Option<Arc<Monitor>>> {
        match self.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn require(&self, flag: StreamFlags, operation: &'static str) -> Result<(), MixerError> {
        if self.flags.get().contains(flag) {
            Ok(())
        } else {
            Err(MixerError::NotPermitted { operation })
        }
    }

    fn require_device(&self, operation: &'static str) -> Result<(), MixerError> {
        if self.kind.is_device() {
            Ok(())
        } else {
            Err(MixerError::Unsupported {
                kind: self.kind,
                operation,
            })
        }
    }

    fn require_client(&self, operation: &'static str) -> Result<(), MixerError> {
        if self.kind.is_client() {
            Ok(())
        } else {
            Err(MixerError::Unsupported {
                kind: self.kind,
                operation,
            })
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name.get())
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}
