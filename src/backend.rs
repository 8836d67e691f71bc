use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::Stream;

use crate::{channel::ChannelMap, error::MixerError, volume::VolumeVector};

/// Backend-specific stream subtype.
///
/// Each kind carries a fixed operation set: suspending, resuming and port
/// switching only make sense for device streams, removal only for client
/// streams. Operations outside a kind's set fail with
/// [`MixerError::Unsupported`] without touching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Playback device stream
    Sink,
    /// Recording device stream
    Source,
    /// Application playback stream attached to a sink
    SinkInput,
    /// Application recording stream attached to a source
    SourceOutput,
}

impl StreamKind {
    /// Whether this is a device stream (sink or source).
    pub fn is_device(self) -> bool {
        matches!(self, Self::Sink | Self::Source)
    }

    /// Whether this is a client stream (sink input or source output).
    pub fn is_client(self) -> bool {
        !self.is_device()
    }

    /// Kind of the device stream a client stream attaches to.
    pub fn device_kind(self) -> Option<StreamKind> {
        match self {
            Self::SinkInput => Some(Self::Sink),
            Self::SourceOutput => Some(Self::Source),
            Self::Sink | Self::Source => None,
        }
    }
}

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Stream is actively transferring audio
    Running,
    /// Stream is open but silent
    Idle,
    /// Stream is suspended
    Suspended,
    /// State was not reported by the backend
    #[default]
    Unknown,
}

/// Port data as reported inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Unique port name
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Backend-assigned priority
    pub priority: u32,
    /// Whether the port is currently available
    pub available: bool,
}

/// Full state of one stream as reported by the backend at one point in time.
///
/// Optional fields model data the backend may not support for a particular
/// stream; the update protocol degrades them to defined defaults instead of
/// failing.
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    /// Stable backend identifier of the stream
    pub index: u32,
    /// Stream subtype
    pub kind: StreamKind,
    /// Name hint
    pub name: Option<String>,
    /// Description hint
    pub description: Option<String>,
    /// Lifecycle state
    pub state: StreamState,
    /// Channel layout, always present
    pub channel_map: ChannelMap,
    /// Per-channel volume, absent when the stream has no volume control
    pub volume: Option<VolumeVector>,
    /// Whether the reported volume may be changed
    pub volume_writable: bool,
    /// Device-defined reference volume, absent or zero means unity
    pub base_volume: Option<u32>,
    /// Mute state
    pub mute: bool,
    /// Whether the volume maps to decibel values
    pub has_decibel: bool,
    /// Whether the backend can attach a peak monitor
    pub has_monitor: bool,
    /// Whether the stream can be moved to another device
    pub movable: bool,
    /// Whether this is a stored control without a live owner
    pub stored: bool,
    /// Owning client index, present for application streams
    pub client: Option<u32>,
    /// Index of the device stream this stream is attached to
    pub device: Option<u32>,
    /// Media role hint, e.g. `"event"` for event sounds
    pub media_role: Option<String>,
    /// Description specific to event sounds, preferred over the name for
    /// event streams
    pub event_description: Option<String>,
    /// Switchable ports, unordered
    pub ports: Vec<PortInfo>,
    /// Name of the currently active port
    pub active_port: Option<String>,
}

/// Enable/disable surface of a backend peak monitor.
#[async_trait]
pub trait MonitorControl: Send + Sync {
    /// Start or stop sampling.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn set_enabled(&self, enabled: bool) -> Result<(), MixerError>;
}

/// A peak monitor created by the backend.
pub struct MonitorHandle {
    /// Control surface for enabling and disabling sampling
    pub control: Arc<dyn MonitorControl>,
    /// Peak level samples, one per sampling tick
    pub values: Pin<Box<dyn Stream<Item = f64> + Send>>,
}

/// Command surface of the sound-system connection.
///
/// Implemented by the connection layer that owns the wire protocol. Every
/// method is a fire-and-forget request: `Ok` means the backend accepted the
/// request, not that the local model already reflects it. The confirming
/// state change arrives later as a snapshot.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Change the mute state of a stream.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn set_mute(&self, kind: StreamKind, index: u32, mute: bool) -> Result<(), MixerError>;

    /// Change the per-channel volume of a stream.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn set_volume(
        &self,
        kind: StreamKind,
        index: u32,
        volume: &VolumeVector,
    ) -> Result<(), MixerError>;

    /// Switch the active port of a device stream.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn set_active_port(
        &self,
        kind: StreamKind,
        index: u32,
        port: &str,
    ) -> Result<(), MixerError>;

    /// Suspend a device stream.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn suspend(&self, kind: StreamKind, index: u32) -> Result<(), MixerError>;

    /// Resume a suspended device stream.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn resume(&self, kind: StreamKind, index: u32) -> Result<(), MixerError>;

    /// Terminate a client stream.
    ///
    /// # Errors
    /// Returns an error when the backend declines the request.
    async fn remove(&self, kind: StreamKind, index: u32) -> Result<(), MixerError>;

    /// Create a peak monitor sampling the given device stream index.
    ///
    /// # Errors
    /// Returns an error when the backend cannot create the monitor.
    async fn create_monitor(&self, target_index: u32) -> Result<MonitorHandle, MixerError>;
}
