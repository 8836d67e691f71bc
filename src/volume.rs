use crate::{
    channel::{ChannelMap, ChannelPosition},
    error::MixerError,
};

/// Volume of a silenced channel.
pub const VOLUME_MUTED: u32 = 0;

/// Unity gain, the reference "100%" volume.
pub const VOLUME_NORM: u32 = 0x10000;

/// Practical upper bound for user-facing volume, +11 dB above unity.
pub const VOLUME_UI_MAX: u32 = 99957;

/// Maximum number of channels a stream can have.
pub const CHANNELS_MAX: usize = 32;

/// Decibel floor standing in for negative infinity.
///
/// [`VOLUME_MUTED`] converts to this value and this value (or anything below
/// it) converts back to [`VOLUME_MUTED`].
pub const DECIBEL_MININFTY: f64 = -200.0;

/// Convert a linear volume to decibel.
///
/// Uses the cubic mapping of the sound-system family this model targets
/// (`dB = 60 · log10(v / NORM)`). Results are floored at
/// [`DECIBEL_MININFTY`], and a muted volume maps to the floor sentinel.
pub fn volume_to_decibel(volume: u32) -> f64 {
    if volume == VOLUME_MUTED {
        return DECIBEL_MININFTY;
    }
    let decibel = 60.0 * (f64::from(volume) / f64::from(VOLUME_NORM)).log10();
    decibel.max(DECIBEL_MININFTY)
}

/// Convert a decibel value to a linear volume.
///
/// Values at or below [`DECIBEL_MININFTY`] map to [`VOLUME_MUTED`].
pub fn volume_from_decibel(decibel: f64) -> u32 {
    if decibel <= DECIBEL_MININFTY {
        return VOLUME_MUTED;
    }
    (f64::from(VOLUME_NORM) * 10f64.powf(decibel / 60.0)).round() as u32
}

/// Per-channel linear volume magnitudes, paired 1:1 with a [`ChannelMap`].
///
/// Every constructor validates that the channel count is within
/// `1..=CHANNELS_MAX` and that every value is at most [`VOLUME_UI_MAX`];
/// mutating operations return a new vector and never leave a partially
/// updated one behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeVector {
    values: Vec<u32>,
}

impl VolumeVector {
    /// Create a volume vector from per-channel values.
    ///
    /// # Errors
    /// Returns an error if the channel count is outside `1..=CHANNELS_MAX`
    /// or any value exceeds [`VOLUME_UI_MAX`].
    pub fn new(values: Vec<u32>) -> Result<Self, MixerError> {
        if values.is_empty() || values.len() > CHANNELS_MAX {
            return Err(MixerError::InvalidChannelCount {
                channels: values.len(),
            });
        }
        for (channel, &volume) in values.iter().enumerate() {
            if volume > VOLUME_UI_MAX {
                return Err(MixerError::InvalidVolume { channel, volume });
            }
        }
        Ok(Self { values })
    }

    /// Create a vector with every channel at the same value.
    ///
    /// # Errors
    /// Returns an error for an invalid channel count or value.
    pub fn filled(channels: usize, volume: u32) -> Result<Self, MixerError> {
        Self::new(vec![volume; channels])
    }

    /// Silent vector paired with the given channel map.
    ///
    /// Used when a snapshot carries no usable volume; the map's channel
    /// count is already validated, so this cannot fail.
    pub(crate) fn muted_for(map: &ChannelMap) -> Self {
        Self {
            values: vec![VOLUME_MUTED; map.channels()],
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.values.len()
    }

    /// All channel values in channel order.
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Volume of a single channel, `None` when out of range.
    pub fn channel(&self, channel: usize) -> Option<u32> {
        self.values.get(channel).copied()
    }

    /// Aggregate volume: the maximum across all channels.
    pub fn max(&self) -> u32 {
        self.values.iter().copied().max().unwrap_or(VOLUME_MUTED)
    }

    /// Whether the vector's length matches the given channel map.
    pub fn matches(&self, map: &ChannelMap) -> bool {
        self.values.len() == map.channels()
    }

    /// Rescale every channel proportionally so the aggregate becomes `target`.
    ///
    /// Relative channel ratios are preserved.
    ///
    /// # Errors
    /// Returns an error if `target` is out of range, or if all channels are
    /// silent and `target` is nonzero (the channel ratios are indeterminate).
    pub fn scaled_to_max(&self, target: u32) -> Result<Self, MixerError> {
        if target > VOLUME_UI_MAX {
            return Err(MixerError::InvalidVolume {
                channel: 0,
                volume: target,
            });
        }
        let max = self.max();
        if max == target {
            return Ok(self.clone());
        }
        if max == VOLUME_MUTED {
            return Err(MixerError::IndeterminateScale { target });
        }
        let values = self
            .values
            .iter()
            .map(|&v| u32::try_from(u64::from(v) * u64::from(target) / u64::from(max)).unwrap_or(VOLUME_UI_MAX))
            .collect();
        Ok(Self { values })
    }

    /// Return a copy with the volume of one channel replaced.
    ///
    /// # Errors
    /// Returns an error if the channel index is out of range or the value
    /// exceeds [`VOLUME_UI_MAX`]; the original vector is untouched.
    pub fn with_channel(&self, channel: usize, volume: u32) -> Result<Self, MixerError> {
        if channel >= self.values.len() {
            return Err(MixerError::InvalidChannel {
                channel,
                channels: self.values.len(),
            });
        }
        if volume > VOLUME_UI_MAX {
            return Err(MixerError::InvalidVolume { channel, volume });
        }
        let mut values = self.values.clone();
        values[channel] = volume;
        Ok(Self { values })
    }

    /// Volume at a channel position: the maximum across all channels sitting
    /// at that position.
    ///
    /// # Errors
    /// Returns an error if the map does not contain the position or its
    /// length does not match this vector.
    pub fn position(&self, map: &ChannelMap, position: ChannelPosition) -> Result<u32, MixerError> {
        if !self.matches(map) {
            return Err(MixerError::ChannelMismatch {
                volume_channels: self.values.len(),
                map_channels: map.channels(),
            });
        }
        self.values
            .iter()
            .zip(map.positions())
            .filter(|&(_, &p)| p == position)
            .map(|(&v, _)| v)
            .max()
            .ok_or(MixerError::MissingPosition { position })
    }

    /// Return a copy with every channel at `position` set to `volume`.
    ///
    /// # Errors
    /// Returns an error if the map does not contain the position, its length
    /// does not match this vector, or the value is out of range.
    pub fn with_position(
        &self,
        map: &ChannelMap,
        position: ChannelPosition,
        volume: u32,
    ) -> Result<Self, MixerError> {
        if !self.matches(map) {
            return Err(MixerError::ChannelMismatch {
                volume_channels: self.values.len(),
                map_channels: map.channels(),
            });
        }
        if !map.has_position(position) {
            return Err(MixerError::MissingPosition { position });
        }
        if volume > VOLUME_UI_MAX {
            return Err(MixerError::InvalidVolume { channel: 0, volume });
        }
        let values = self
            .values
            .iter()
            .zip(map.positions())
            .map(|(&v, &p)| if p == position { volume } else { v })
            .collect();
        Ok(Self { values })
    }
}
