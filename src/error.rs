use crate::{backend::StreamKind, channel::ChannelPosition, volume};

/// Errors that can occur while reading or mutating a stream.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MixerError {
    /// Channel count outside the supported range
    #[error("invalid channel count {channels} (supported range is 1..={max})", max = volume::CHANNELS_MAX)]
    InvalidChannelCount {
        /// Offending channel count
        channels: usize,
    },

    /// Volume value above the permitted maximum
    #[error("invalid volume {volume} for channel {channel} (maximum is {max})", max = volume::VOLUME_UI_MAX)]
    InvalidVolume {
        /// Channel index
        channel: usize,
        /// Offending volume value
        volume: u32,
    },

    /// Channel index outside the stream's channel range
    #[error("invalid channel index {channel} (stream has {channels} channels)")]
    InvalidChannel {
        /// Requested channel index
        channel: usize,
        /// Number of channels the stream actually has
        channels: usize,
    },

    /// Volume vector length does not match the channel map
    #[error("volume has {volume_channels} channels but the channel map has {map_channels}")]
    ChannelMismatch {
        /// Channel count of the rejected volume vector
        volume_channels: usize,
        /// Channel count of the current channel map
        map_channels: usize,
    },

    /// Rescaling a silent volume vector has no defined channel ratios
    #[error("cannot rescale a silent volume to {target}")]
    IndeterminateScale {
        /// Requested aggregate volume
        target: u32,
    },

    /// Channel position not present in the stream's channel map
    #[error("channel position {position:?} is not present in the channel map")]
    MissingPosition {
        /// Requested channel position
        position: ChannelPosition,
    },

    /// Balance value outside `-1.0..=1.0`
    #[error("balance value {0} out of range -1.0..=1.0")]
    InvalidBalance(f32),

    /// Fade value outside `-1.0..=1.0`
    #[error("fade value {0} out of range -1.0..=1.0")]
    InvalidFade(f32),

    /// Port with the given name is not known to the stream
    #[error("port {0:?} not found")]
    UnknownPort(String),

    /// Operation is not part of this stream kind's operation set
    #[error("{kind:?} streams do not support {operation}")]
    Unsupported {
        /// Kind of the rejecting stream
        kind: StreamKind,
        /// Name of the unsupported operation
        operation: &'static str,
    },

    /// Operation requires a capability bit the stream does not carry
    #[error("operation {operation} not permitted by stream capabilities")]
    NotPermitted {
        /// Name of the gated operation
        operation: &'static str,
    },

    /// Stream has no index a monitor could be attached to
    #[error("stream has no monitor target")]
    NoMonitorTarget,

    /// Request was dispatched but the backend declined it
    #[error("backend rejected the request: {0}")]
    Backend(String),
}
