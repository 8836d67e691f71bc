//! Application of backend snapshots to a stream.
//!
//! A snapshot is applied in two phases: every new attribute value is derived
//! and diffed against the current model first, then the changed ones are
//! committed together in a fixed flush order. Observers never see a
//! partially updated stream and re-applying an identical snapshot produces
//! zero notifications.

use tracing::{debug, warn};

use crate::{
    backend::{StreamSnapshot, StreamState},
    balance,
    channel::ChannelMap,
    flags::StreamFlags,
    port::{Port, PortRegistry},
    volume::{VOLUME_NORM, VolumeVector},
};

use super::Stream;

/// A stream attribute with its own change-notification channel.
///
/// The variant order is the snapshot flush order: attributes are always
/// notified after the attributes they are derived from (balance and fade
/// after volume, the active port after the port list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAttribute {
    /// Stream name
    Name,
    /// Human readable description
    Description,
    /// Attached device index
    Device,
    /// Capability flags
    Flags,
    /// Lifecycle state
    State,
    /// Mute state
    Mute,
    /// Per-channel volume
    Volume,
    /// Left/right balance
    Balance,
    /// Front/back fade
    Fade,
    /// Port list
    Ports,
    /// Active port
    ActivePort,
}

/// All attribute changes of one snapshot, computed before anything is
/// committed.
#[derive(Debug, Default)]
pub(crate) struct SnapshotDiff {
    channel_map: Option<ChannelMap>,
    base_volume: Option<u32>,
    name: Option<String>,
    description: Option<String>,
    device: Option<Option<u32>>,
    flags: Option<StreamFlags>,
    state: Option<StreamState>,
    mute: Option<bool>,
    volume: Option<VolumeVector>,
    balance: Option<f32>,
    fade: Option<f32>,
    ports: Option<PortRegistry>,
    active_port: Option<Option<Port>>,
}

impl SnapshotDiff {
    /// Derive every new attribute value from the snapshot and record the
    /// ones that differ from the stream's current state. Missing optional
    /// backend data falls back to neutral defaults instead of failing.
    pub(crate) fn compute(stream: &Stream, snapshot: &StreamSnapshot) -> Self {
        let map = snapshot.channel_map.clone();

        let volume = match &snapshot.volume {
            Some(volume) if volume.matches(&map) => Some(volume.clone()),
            Some(volume) => {
                warn!(
                    index = snapshot.index,
                    volume_channels = volume.channels(),
                    map_channels = map.channels(),
                    "snapshot volume does not match its channel map, treating volume as absent"
                );
                None
            }
            None => None,
        };

        let flags = compute_flags(snapshot, volume.is_some());

        let name = snapshot.name.clone().unwrap_or_default();

        // Event sounds get a much more readable description from the event
        // description hint than from the generic stream name.
        let mut description = snapshot
            .description
            .clone()
            .or_else(|| snapshot.name.clone())
            .unwrap_or_default();
        if flags.contains(StreamFlags::EVENT)
            && let Some(event_description) = &snapshot.event_description
        {
            description = event_description.clone();
        }

        let (volume, balance, fade, base_volume) = match volume {
            Some(volume) => {
                let balance = if map.can_balance() {
                    balance::balance(&volume, &map)
                } else {
                    0.0
                };
                let fade = if map.can_fade() {
                    balance::fade(&volume, &map)
                } else {
                    0.0
                };
                let base_volume = match snapshot.base_volume {
                    Some(base) if base > 0 => base,
                    _ => VOLUME_NORM,
                };
                (volume, balance, fade, base_volume)
            }
            None => (VolumeVector::muted_for(&map), 0.0, 0.0, VOLUME_NORM),
        };

        let ports = PortRegistry::new(snapshot.ports.iter().cloned().map(Port::from).collect());
        let active_port = match snapshot.active_port.as_deref() {
            Some(name) => {
                let port = ports.find(name).cloned();
                if port.is_none() {
                    warn!(
                        index = snapshot.index,
                        port = name,
                        "active port is not in the snapshot's port list"
                    );
                }
                port
            }
            None => None,
        };

        Self {
            channel_map: (stream.channel_map.get() != map).then_some(map),
            base_volume: (stream.base_volume.get() != base_volume).then_some(base_volume),
            name: (stream.name.get() != name).then_some(name),
            description: (stream.description.get() != description).then_some(description),
            device: (stream.device.get() != snapshot.device).then_some(snapshot.device),
            flags: (stream.flags.get() != flags).then_some(flags),
            state: (stream.state.get() != snapshot.state).then_some(snapshot.state),
            mute: (stream.mute.get() != snapshot.mute).then_some(snapshot.mute),
            volume: (stream.volume.get() != volume).then_some(volume),
            balance: (stream.balance.get() != balance).then_some(balance),
            fade: (stream.fade.get() != fade).then_some(fade),
            ports: (stream.ports.get() != ports).then_some(ports),
            active_port: (stream.active_port.get() != active_port).then_some(active_port),
        }
    }

    /// Whether the snapshot moved the stream to a different device.
    pub(crate) fn device_changed(&self) -> bool {
        self.device.is_some()
    }

    /// Commit the changed attributes in flush order and return which ones
    /// were notified.
    ///
    /// The channel map and base volume are committed first, silently: the
    /// map must be in place before the volume that is validated against it,
    /// and neither has a slot in the flush order.
    pub(crate) fn commit(self, stream: &Stream) -> Vec<StreamAttribute> {
        let mut changed = Vec::new();

        if let Some(map) = self.channel_map {
            stream.channel_map.set(map);
        }
        if let Some(base_volume) = self.base_volume {
            stream.base_volume.set(base_volume);
        }

        if let Some(name) = self.name {
            stream.name.set(name);
            changed.push(StreamAttribute::Name);
        }
        if let Some(description) = self.description {
            stream.description.set(description);
            changed.push(StreamAttribute::Description);
        }
        if let Some(device) = self.device {
            stream.device.set(device);
            changed.push(StreamAttribute::Device);
        }
        if let Some(flags) = self.flags {
            stream.flags.set(flags);
            changed.push(StreamAttribute::Flags);
        }
        if let Some(state) = self.state {
            stream.state.set(state);
            changed.push(StreamAttribute::State);
        }
        if let Some(mute) = self.mute {
            stream.mute.set(mute);
            changed.push(StreamAttribute::Mute);
        }
        if let Some(volume) = self.volume {
            stream.volume.set(volume);
            changed.push(StreamAttribute::Volume);
        }
        if let Some(balance) = self.balance {
            stream.balance.set(balance);
            changed.push(StreamAttribute::Balance);
        }
        if let Some(fade) = self.fade {
            stream.fade.set(fade);
            changed.push(StreamAttribute::Fade);
        }
        if let Some(ports) = self.ports {
            stream.ports.set(ports);
            changed.push(StreamAttribute::Ports);
        }
        if let Some(active_port) = self.active_port {
            stream.active_port.set(active_port);
            changed.push(StreamAttribute::ActivePort);
        }

        changed
    }
}

impl Stream {
    /// Apply one backend snapshot atomically.
    ///
    /// Returns the attributes that changed, in flush order. Re-applying an
    /// identical snapshot returns an empty list and notifies nobody.
    pub(crate) fn apply_snapshot(&self, snapshot: &StreamSnapshot) -> Vec<StreamAttribute> {
        let diff = SnapshotDiff::compute(self, snapshot);
        let device_changed = diff.device_changed();
        let changed = diff.commit(self);
        if !changed.is_empty() {
            debug!(
                index = self.index,
                changed = changed.len(),
                "applied stream snapshot"
            );
        }
        if device_changed {
            self.refresh_monitor();
        }
        changed
    }
}

/// Recompute the full capability bitset for one snapshot.
fn compute_flags(snapshot: &StreamSnapshot, volume_present: bool) -> StreamFlags {
    let mut flags = StreamFlags::MUTE_READABLE | StreamFlags::MUTE_WRITABLE;
    if volume_present {
        flags |= StreamFlags::VOLUME_READABLE;
        if snapshot.volume_writable {
            flags |= StreamFlags::VOLUME_WRITABLE;
        }
        if snapshot.has_decibel {
            flags |= StreamFlags::HAS_DECIBEL;
        }
    }
    if snapshot.channel_map.can_balance() {
        flags |= StreamFlags::CAN_BALANCE;
    }
    if snapshot.channel_map.can_fade() {
        flags |= StreamFlags::CAN_FADE;
    }
    if snapshot.movable {
        flags |= StreamFlags::MOVABLE;
    }
    if snapshot.has_monitor {
        flags |= StreamFlags::HAS_MONITOR;
    }
    if snapshot.stored {
        flags |= StreamFlags::STORED;
    }
    if snapshot.client.is_some() {
        flags |= StreamFlags::APPLICATION;
    }
    if snapshot.media_role.as_deref() == Some("event") {
        flags |= StreamFlags::EVENT;
    }
    flags
}
