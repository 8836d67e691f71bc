use crate::{error::MixerError, volume::CHANNELS_MAX};

/// Position of a single channel within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelPosition {
    /// Position reported by the backend but not understood by the model
    #[default]
    Unknown,
    /// Mono channel, only used for single-channel streams
    Mono,
    /// Front left channel
    FrontLeft,
    /// Front right channel
    FrontRight,
    /// Front center channel
    FrontCenter,
    /// Low-frequency effects channel (subwoofer)
    Lfe,
    /// Back (rear) left channel
    BackLeft,
    /// Back (rear) right channel
    BackRight,
    /// Back (rear) center channel
    BackCenter,
    /// Front left of center channel
    FrontLeftCenter,
    /// Front right of center channel
    FrontRightCenter,
    /// Side left channel
    SideLeft,
    /// Side right channel
    SideRight,
    /// Top front left channel
    TopFrontLeft,
    /// Top front right channel
    TopFrontRight,
    /// Top front center channel
    TopFrontCenter,
    /// Top center channel
    TopCenter,
    /// Top back (rear) left channel
    TopBackLeft,
    /// Top back (rear) right channel
    TopBackRight,
    /// Top back (rear) center channel
    TopBackCenter,
}

impl ChannelPosition {
    /// Resolve a backend channel code to a position.
    ///
    /// Codes follow the PulseAudio channel position numbering; codes the
    /// model does not understand (including the aux range) map to `Unknown`.
    pub fn from_backend_code(code: u32) -> Self {
        match code {
            0 => Self::Mono,
            1 => Self::FrontLeft,
            2 => Self::FrontRight,
            3 => Self::FrontCenter,
            4 => Self::BackCenter,
            5 => Self::BackLeft,
            6 => Self::BackRight,
            7 => Self::Lfe,
            8 => Self::FrontLeftCenter,
            9 => Self::FrontRightCenter,
            10 => Self::SideLeft,
            11 => Self::SideRight,
            44 => Self::TopCenter,
            45 => Self::TopFrontLeft,
            46 => Self::TopFrontRight,
            47 => Self::TopFrontCenter,
            48 => Self::TopBackLeft,
            49 => Self::TopBackRight,
            50 => Self::TopBackCenter,
            _ => Self::Unknown,
        }
    }

    /// Backend channel code for this position, `None` for `Unknown`.
    pub fn backend_code(self) -> Option<u32> {
        match self {
            Self::Unknown => None,
            Self::Mono => Some(0),
            Self::FrontLeft => Some(1),
            Self::FrontRight => Some(2),
            Self::FrontCenter => Some(3),
            Self::BackCenter => Some(4),
            Self::BackLeft => Some(5),
            Self::BackRight => Some(6),
            Self::Lfe => Some(7),
            Self::FrontLeftCenter => Some(8),
            Self::FrontRightCenter => Some(9),
            Self::SideLeft => Some(10),
            Self::SideRight => Some(11),
            Self::TopCenter => Some(44),
            Self::TopFrontLeft => Some(45),
            Self::TopFrontRight => Some(46),
            Self::TopFrontCenter => Some(47),
            Self::TopBackLeft => Some(48),
            Self::TopBackRight => Some(49),
            Self::TopBackCenter => Some(50),
        }
    }

    /// Whether the position contributes to the left side of the balance.
    pub fn is_left(self) -> bool {
        matches!(
            self,
            Self::FrontLeft
                | Self::BackLeft
                | Self::FrontLeftCenter
                | Self::SideLeft
                | Self::TopFrontLeft
                | Self::TopBackLeft
        )
    }

    /// Whether the position contributes to the right side of the balance.
    pub fn is_right(self) -> bool {
        matches!(
            self,
            Self::FrontRight
                | Self::BackRight
                | Self::FrontRightCenter
                | Self::SideRight
                | Self::TopFrontRight
                | Self::TopBackRight
        )
    }

    /// Whether the position contributes to the front side of the fade.
    pub fn is_front(self) -> bool {
        matches!(
            self,
            Self::FrontLeft
                | Self::FrontRight
                | Self::FrontCenter
                | Self::FrontLeftCenter
                | Self::FrontRightCenter
                | Self::TopFrontLeft
                | Self::TopFrontRight
                | Self::TopFrontCenter
        )
    }

    /// Whether the position contributes to the back side of the fade.
    pub fn is_back(self) -> bool {
        matches!(
            self,
            Self::BackLeft
                | Self::BackRight
                | Self::BackCenter
                | Self::TopBackLeft
                | Self::TopBackRight
                | Self::TopBackCenter
        )
    }
}

/// Ordered sequence of channel positions describing a stream's layout.
///
/// A map always has between 1 and [`CHANNELS_MAX`] channels and its length
/// matches the stream's volume vector at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    positions: Vec<ChannelPosition>,
}

impl ChannelMap {
    /// Create a channel map from an ordered list of positions.
    ///
    /// # Errors
    /// Returns an error if the position count is outside `1..=CHANNELS_MAX`.
    pub fn new(positions: Vec<ChannelPosition>) -> Result<Self, MixerError> {
        if positions.is_empty() || positions.len() > CHANNELS_MAX {
            return Err(MixerError::InvalidChannelCount {
                channels: positions.len(),
            });
        }
        Ok(Self { positions })
    }

    /// Create a map from raw backend channel codes.
    ///
    /// # Errors
    /// Returns an error if the code count is outside `1..=CHANNELS_MAX`.
    pub fn from_backend_codes(codes: &[u32]) -> Result<Self, MixerError> {
        Self::new(
            codes
                .iter()
                .map(|&code| ChannelPosition::from_backend_code(code))
                .collect(),
        )
    }

    /// Number of channels in the map.
    pub fn channels(&self) -> usize {
        self.positions.len()
    }

    /// All positions in channel order.
    pub fn positions(&self) -> &[ChannelPosition] {
        &self.positions
    }

    /// Position of the channel at `index`, `Unknown` when out of range.
    pub fn position(&self, index: usize) -> ChannelPosition {
        self.positions.get(index).copied().unwrap_or_default()
    }

    /// Whether any channel sits at the given position.
    pub fn has_position(&self, position: ChannelPosition) -> bool {
        self.positions.contains(&position)
    }

    /// Whether the map allows left/right balancing.
    ///
    /// Requires at least one left and one right position.
    pub fn can_balance(&self) -> bool {
        self.positions.iter().any(|p| p.is_left()) && self.positions.iter().any(|p| p.is_right())
    }

    /// Whether the map allows front/back fading.
    ///
    /// Requires at least one front and one back position.
    pub fn can_fade(&self) -> bool {
        self.positions.iter().any(|p| p.is_front()) && self.positions.iter().any(|p| p.is_back())
    }
}
