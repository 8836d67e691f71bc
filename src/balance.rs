//! Pure derivation and application of the balance and fade scalars.
//!
//! Balance compares the average volume of left-side channels against
//! right-side channels; fade does the same for front against back. Both
//! scalars live in `[-1, 1]` with 0 meaning centered. Applying a scalar
//! redistributes per-channel volumes proportionally while keeping the
//! aggregate (maximum) volume unchanged.

use crate::{
    channel::{ChannelMap, ChannelPosition},
    error::MixerError,
    volume::VolumeVector,
};

/// Left/right or front/back channel-pair selector.
#[derive(Clone, Copy)]
struct Sides {
    lower: fn(ChannelPosition) -> bool,
    upper: fn(ChannelPosition) -> bool,
}

const BALANCE_SIDES: Sides = Sides {
    lower: ChannelPosition::is_left,
    upper: ChannelPosition::is_right,
};

const FADE_SIDES: Sides = Sides {
    lower: ChannelPosition::is_back,
    upper: ChannelPosition::is_front,
};

/// Left/right balance of a volume vector, 0 when the map cannot balance.
pub fn balance(volume: &VolumeVector, map: &ChannelMap) -> f32 {
    if !map.can_balance() {
        return 0.0;
    }
    scalar(volume, map, BALANCE_SIDES)
}

/// Front/back fade of a volume vector, 0 when the map cannot fade.
pub fn fade(volume: &VolumeVector, map: &ChannelMap) -> f32 {
    if !map.can_fade() {
        return 0.0;
    }
    scalar(volume, map, FADE_SIDES)
}

/// Apply a balance value, producing a redistributed volume vector.
///
/// # Errors
/// Returns an error if the value is outside `-1.0..=1.0`, the map has no
/// left/right pair, or the vector does not match the map.
pub fn with_balance(
    volume: &VolumeVector,
    map: &ChannelMap,
    value: f32,
) -> Result<VolumeVector, MixerError> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(MixerError::InvalidBalance(value));
    }
    if !map.can_balance() {
        return Err(MixerError::NotPermitted {
            operation: "set-balance",
        });
    }
    apply(volume, map, BALANCE_SIDES, value)
}

/// Apply a fade value, producing a redistributed volume vector.
///
/// # Errors
/// Returns an error if the value is outside `-1.0..=1.0`, the map has no
/// front/back pair, or the vector does not match the map.
pub fn with_fade(
    volume: &VolumeVector,
    map: &ChannelMap,
    value: f32,
) -> Result<VolumeVector, MixerError> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(MixerError::InvalidFade(value));
    }
    if !map.can_fade() {
        return Err(MixerError::NotPermitted {
            operation: "set-fade",
        });
    }
    apply(volume, map, FADE_SIDES, value)
}

/// Average volume over the channels matching `side`, 0 when none match.
fn side_average(volume: &VolumeVector, map: &ChannelMap, side: fn(ChannelPosition) -> bool) -> u32 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for (&value, &position) in volume.values().iter().zip(map.positions()) {
        if side(position) {
            sum += u64::from(value);
            count += 1;
        }
    }
    if count == 0 {
        0
    } else {
        u32::try_from(sum / count).unwrap_or(u32::MAX)
    }
}

fn scalar(volume: &VolumeVector, map: &ChannelMap, sides: Sides) -> f32 {
    let lower = side_average(volume, map, sides.lower);
    let upper = side_average(volume, map, sides.upper);

    if lower == upper {
        0.0
    } else if lower > upper {
        -(1.0 - upper as f32 / lower as f32)
    } else {
        1.0 - lower as f32 / upper as f32
    }
}

fn apply(
    volume: &VolumeVector,
    map: &ChannelMap,
    sides: Sides,
    value: f32,
) -> Result<VolumeVector, MixerError> {
    if !volume.matches(map) {
        return Err(MixerError::ChannelMismatch {
            volume_channels: volume.channels(),
            map_channels: map.channels(),
        });
    }

    let lower = side_average(volume, map, sides.lower);
    let upper = side_average(volume, map, sides.upper);
    let top = lower.max(upper);

    // A negative value attenuates the upper side, a positive one the lower.
    let (new_lower, new_upper) = if value <= 0.0 {
        (top, ((value + 1.0) * top as f32) as u32)
    } else {
        (((1.0 - value) * top as f32) as u32, top)
    };

    let values = volume
        .values()
        .iter()
        .zip(map.positions())
        .map(|(&v, &position)| {
            if (sides.lower)(position) {
                rescale(v, lower, new_lower)
            } else if (sides.upper)(position) {
                rescale(v, upper, new_upper)
            } else {
                v
            }
        })
        .collect();
    VolumeVector::new(values)
}

/// Rescale one channel from its side's old average to the new one; channels
/// on a silent side take the new side volume directly.
fn rescale(value: u32, side_avg: u32, new_side: u32) -> u32 {
    if side_avg == 0 {
        new_side
    } else {
        u32::try_from(u64::from(value) * u64::from(new_side) / u64::from(side_avg)).unwrap_or(u32::MAX)
    }
}
