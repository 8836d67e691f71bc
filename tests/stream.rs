//! Integration tests for the stream model driven through a mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mixtide::{
    Backend, ChannelMap, ChannelPosition, MixerError, MixerEvent, MonitorControl, MonitorHandle,
    PortInfo, StreamAttribute, StreamFlags, StreamKind, StreamRegistry, StreamSnapshot,
    StreamState, VOLUME_NORM, VolumeVector,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One request the model dispatched to the backend.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    SetMute { index: u32, mute: bool },
    SetVolume { index: u32, volume: Vec<u32> },
    SetActivePort { index: u32, port: String },
    Suspend { index: u32 },
    Resume { index: u32 },
    Remove { index: u32 },
    CreateMonitor { target: u32 },
    MonitorEnabled { enabled: bool },
}

/// Backend double that records every dispatch and can be told to decline.
struct MockBackend {
    commands: Arc<Mutex<Vec<Command>>>,
    fail: Arc<AtomicBool>,
    monitor_feeds: Mutex<Vec<mpsc::UnboundedSender<f64>>>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
            monitor_feeds: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, command: Command) -> Result<(), MixerError> {
        record(&self.commands, &self.fail, command)
    }

    fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn feed_monitor(&self, value: f64) {
        let feeds = self.monitor_feeds.lock().unwrap();
        if let Some(feed) = feeds.last() {
            let _ = feed.send(value);
        }
    }
}

fn record(
    commands: &Arc<Mutex<Vec<Command>>>,
    fail: &Arc<AtomicBool>,
    command: Command,
) -> Result<(), MixerError> {
    if fail.load(Ordering::SeqCst) {
        return Err(MixerError::Backend("mock failure".to_owned()));
    }
    commands.lock().unwrap().push(command);
    Ok(())
}

struct MockMonitorControl {
    commands: Arc<Mutex<Vec<Command>>>,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl MonitorControl for MockMonitorControl {
    async fn set_enabled(&self, enabled: bool) -> Result<(), MixerError> {
        record(&self.commands, &self.fail, Command::MonitorEnabled { enabled })
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn set_mute(&self, _kind: StreamKind, index: u32, mute: bool) -> Result<(), MixerError> {
        self.record(Command::SetMute { index, mute })
    }

    async fn set_volume(
        &self,
        _kind: StreamKind,
        index: u32,
        volume: &VolumeVector,
    ) -> Result<(), MixerError> {
        self.record(Command::SetVolume {
            index,
            volume: volume.values().to_vec(),
        })
    }

    async fn set_active_port(
        &self,
        _kind: StreamKind,
        index: u32,
        port: &str,
    ) -> Result<(), MixerError> {
        self.record(Command::SetActivePort {
            index,
            port: port.to_owned(),
        })
    }

    async fn suspend(&self, _kind: StreamKind, index: u32) -> Result<(), MixerError> {
        self.record(Command::Suspend { index })
    }

    async fn resume(&self, _kind: StreamKind, index: u32) -> Result<(), MixerError> {
        self.record(Command::Resume { index })
    }

    async fn remove(&self, _kind: StreamKind, index: u32) -> Result<(), MixerError> {
        self.record(Command::Remove { index })
    }

    async fn create_monitor(&self, target_index: u32) -> Result<MonitorHandle, MixerError> {
        self.record(Command::CreateMonitor {
            target: target_index,
        })?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.monitor_feeds.lock().unwrap().push(tx);
        Ok(MonitorHandle {
            control: Arc::new(MockMonitorControl {
                commands: Arc::clone(&self.commands),
                fail: Arc::clone(&self.fail),
            }),
            values: Box::pin(UnboundedReceiverStream::new(rx)),
        })
    }
}

fn stereo_map() -> ChannelMap {
    ChannelMap::new(vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight]).unwrap()
}

fn quad_map() -> ChannelMap {
    ChannelMap::new(vec![
        ChannelPosition::FrontLeft,
        ChannelPosition::FrontRight,
        ChannelPosition::BackLeft,
        ChannelPosition::BackRight,
    ])
    .unwrap()
}

fn sink_snapshot(index: u32) -> StreamSnapshot {
    StreamSnapshot {
        index,
        kind: StreamKind::Sink,
        name: Some(format!("alsa_output.pci-{index}")),
        description: Some("Built-in Audio".to_owned()),
        state: StreamState::Running,
        channel_map: stereo_map(),
        volume: Some(VolumeVector::filled(2, VOLUME_NORM).unwrap()),
        volume_writable: true,
        base_volume: None,
        mute: false,
        has_decibel: true,
        has_monitor: true,
        movable: false,
        stored: false,
        client: None,
        device: None,
        media_role: None,
        event_description: None,
        ports: vec![
            PortInfo {
                name: "analog-output".to_owned(),
                description: "Speakers".to_owned(),
                priority: 100,
                available: true,
            },
            PortInfo {
                name: "hdmi-output".to_owned(),
                description: "HDMI".to_owned(),
                priority: 50,
                available: false,
            },
        ],
        active_port: Some("analog-output".to_owned()),
    }
}

fn sink_input_snapshot(index: u32, device: Option<u32>) -> StreamSnapshot {
    StreamSnapshot {
        index,
        kind: StreamKind::SinkInput,
        name: Some("music-player".to_owned()),
        description: None,
        state: StreamState::Running,
        channel_map: stereo_map(),
        volume: Some(VolumeVector::filled(2, VOLUME_NORM).unwrap()),
        volume_writable: true,
        base_volume: None,
        mute: false,
        has_decibel: true,
        has_monitor: true,
        movable: true,
        stored: false,
        client: Some(42),
        device,
        media_role: None,
        event_description: None,
        ports: Vec::new(),
        active_port: None,
    }
}

/// Wait until `predicate` holds for the recorded commands; spawned tasks in
/// the model run while this sleeps.
async fn wait_for_commands<F: Fn(&[Command]) -> bool>(backend: &MockBackend, predicate: F) {
    for _ in 0..100 {
        if predicate(&backend.commands()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for commands, saw {:?}", backend.commands());
}

#[tokio::test]
async fn snapshot_populates_stream() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(backend);

    let stream = registry.apply(&sink_snapshot(1));

    assert_eq!(stream.index(), 1);
    assert_eq!(stream.kind(), StreamKind::Sink);
    assert_eq!(stream.name.get(), "alsa_output.pci-1");
    assert_eq!(stream.description.get(), "Built-in Audio");
    assert_eq!(stream.state.get(), StreamState::Running);
    assert_eq!(stream.aggregate_volume(), VOLUME_NORM);
    assert_eq!(stream.balance.get(), 0.0);
    assert_eq!(stream.base_volume.get(), VOLUME_NORM);
    assert_eq!(stream.channels(), 2);
    assert_eq!(stream.channel_position(0), ChannelPosition::FrontLeft);
    assert_eq!(stream.channel_position(7), ChannelPosition::Unknown);

    let flags = stream.flags.get();
    assert!(flags.contains(StreamFlags::VOLUME_READABLE | StreamFlags::VOLUME_WRITABLE));
    assert!(flags.contains(StreamFlags::CAN_BALANCE));
    assert!(!flags.contains(StreamFlags::CAN_FADE));
    assert!(flags.contains(StreamFlags::HAS_DECIBEL | StreamFlags::HAS_MONITOR));
    assert!(!flags.contains(StreamFlags::APPLICATION));

    let ports = stream.ports.get();
    assert_eq!(ports.len(), 2);
    assert_eq!(ports.ports()[0].name, "analog-output");
    assert_eq!(stream.active_port.get().unwrap().name, "analog-output");
}

#[tokio::test]
async fn identical_snapshot_yields_zero_notifications() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(backend);
    let snapshot = sink_snapshot(1);

    let stream = registry.apply(&snapshot);
    let mut events = Box::pin(registry.events());

    // Identical snapshot: no event may be emitted for it.
    registry.apply(&snapshot);

    // A real change afterwards must be the next event subscribers see.
    let mut changed = snapshot.clone();
    changed.mute = true;
    registry.apply(&changed);

    match events.next().await.unwrap() {
        MixerEvent::StreamChanged { attributes, .. } => {
            assert_eq!(attributes, vec![StreamAttribute::Mute]);
        }
        other => panic!("expected StreamChanged, got {other:?}"),
    }
    assert!(stream.mute.get());
}

#[tokio::test]
async fn full_change_flushes_in_fixed_order() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(backend);

    // Minimal first snapshot: no volume, no ports, mono layout.
    let mut first = sink_snapshot(1);
    first.name = Some("old".to_owned());
    first.description = Some("old description".to_owned());
    first.state = StreamState::Idle;
    first.channel_map = ChannelMap::new(vec![ChannelPosition::Mono]).unwrap();
    first.volume = None;
    first.has_monitor = false;
    first.ports = Vec::new();
    first.active_port = None;
    registry.apply(&first);

    let mut events = Box::pin(registry.events());

    let mut second = sink_snapshot(1);
    second.channel_map = quad_map();
    second.volume = Some(
        VolumeVector::new(vec![
            VOLUME_NORM,
            VOLUME_NORM / 2,
            VOLUME_NORM / 2,
            VOLUME_NORM / 4,
        ])
        .unwrap(),
    );
    second.device = Some(7);
    second.mute = true;
    registry.apply(&second);

    match events.next().await.unwrap() {
        MixerEvent::StreamChanged { attributes, .. } => {
            assert_eq!(
                attributes,
                vec![
                    StreamAttribute::Name,
                    StreamAttribute::Description,
                    StreamAttribute::Device,
                    StreamAttribute::Flags,
                    StreamAttribute::State,
                    StreamAttribute::Mute,
                    StreamAttribute::Volume,
                    StreamAttribute::Balance,
                    StreamAttribute::Fade,
                    StreamAttribute::Ports,
                    StreamAttribute::ActivePort,
                ]
            );
        }
        other => panic!("expected StreamChanged, got {other:?}"),
    }
}

#[tokio::test]
async fn snapshot_without_volume_degrades_to_defaults() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(backend);

    let mut snapshot = sink_snapshot(1);
    snapshot.volume = None;
    let stream = registry.apply(&snapshot);

    assert_eq!(stream.aggregate_volume(), 0);
    assert_eq!(stream.balance.get(), 0.0);
    assert_eq!(stream.fade.get(), 0.0);
    assert_eq!(stream.base_volume.get(), VOLUME_NORM);
    assert_eq!(stream.channels(), 2);

    let flags = stream.flags.get();
    assert!(!flags.contains(StreamFlags::VOLUME_READABLE));
    assert!(!flags.contains(StreamFlags::VOLUME_WRITABLE));
}

#[tokio::test]
async fn event_streams_prefer_event_description() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(backend);

    let mut snapshot = sink_input_snapshot(9, Some(1));
    snapshot.media_role = Some("event".to_owned());
    snapshot.event_description = Some("Volume Changed".to_owned());
    let stream = registry.apply(&snapshot);

    assert_eq!(stream.description.get(), "Volume Changed");
    let flags = stream.flags.get();
    assert!(flags.contains(StreamFlags::EVENT));
    assert!(flags.contains(StreamFlags::APPLICATION));
}

#[tokio::test]
async fn mutators_dispatch_without_touching_local_state() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    stream.set_mute(true).await.unwrap();
    assert!(!stream.mute.get(), "mute must wait for a confirming snapshot");
    assert_eq!(
        backend.commands(),
        vec![Command::SetMute {
            index: 1,
            mute: true
        }]
    );

    // Setting the current state again is a no-op without a dispatch.
    stream.set_mute(false).await.unwrap();
    assert_eq!(backend.commands().len(), 1);

    stream.set_aggregate_volume(VOLUME_NORM / 2).await.unwrap();
    assert_eq!(stream.aggregate_volume(), VOLUME_NORM);
    assert_eq!(backend.commands().len(), 2);
}

#[tokio::test]
async fn balance_set_goes_through_volume_commit_path() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    stream.set_balance(-0.5).await.unwrap();
    match &backend.commands()[0] {
        Command::SetVolume { index: 1, volume } => {
            assert_eq!(volume[0], VOLUME_NORM);
            assert_eq!(volume[1], VOLUME_NORM / 2);
        }
        other => panic!("expected SetVolume, got {other:?}"),
    }
    // Local balance stays until the backend confirms through a snapshot.
    assert_eq!(stream.balance.get(), 0.0);
}

#[tokio::test]
async fn gated_mutators_fail_before_dispatch() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let mut snapshot = sink_snapshot(1);
    snapshot.volume_writable = false;
    snapshot.channel_map = ChannelMap::new(vec![ChannelPosition::Mono]).unwrap();
    snapshot.volume = Some(VolumeVector::filled(1, VOLUME_NORM).unwrap());
    snapshot.ports = Vec::new();
    snapshot.active_port = None;
    let stream = registry.apply(&snapshot);

    assert!(matches!(
        stream.set_aggregate_volume(100).await,
        Err(MixerError::NotPermitted { .. })
    ));
    assert!(matches!(
        stream.set_balance(0.5).await,
        Err(MixerError::NotPermitted { .. })
    ));
    assert!(matches!(
        stream.set_fade(0.5).await,
        Err(MixerError::NotPermitted { .. })
    ));
    assert_eq!(stream.balance.get(), 0.0);
    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn channel_index_out_of_range_leaves_volume_unmodified() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    assert!(matches!(
        stream.set_channel_volume(5, VOLUME_NORM).await,
        Err(MixerError::InvalidChannel { .. })
    ));
    assert_eq!(stream.volume.get().values(), &[VOLUME_NORM, VOLUME_NORM]);
    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn unknown_active_port_fails_without_state_change() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    assert!(matches!(
        stream.set_active_port("nonexistent").await,
        Err(MixerError::UnknownPort(_))
    ));
    assert_eq!(stream.active_port.get().unwrap().name, "analog-output");
    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn active_port_commits_only_on_backend_success() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    backend.set_fail(true);
    assert!(matches!(
        stream.set_active_port("hdmi-output").await,
        Err(MixerError::Backend(_))
    ));
    assert_eq!(stream.active_port.get().unwrap().name, "analog-output");

    backend.set_fail(false);
    stream.set_active_port("hdmi-output").await.unwrap();
    assert_eq!(stream.active_port.get().unwrap().name, "hdmi-output");
}

#[tokio::test]
async fn stream_kinds_reject_foreign_operations() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let sink = registry.apply(&sink_snapshot(1));
    let input = registry.apply(&sink_input_snapshot(2, Some(1)));

    assert!(matches!(
        sink.remove().await,
        Err(MixerError::Unsupported { .. })
    ));
    assert!(matches!(
        input.suspend().await,
        Err(MixerError::Unsupported { .. })
    ));
    assert!(matches!(
        input.set_active_port("analog-output").await,
        Err(MixerError::Unsupported { .. })
    ));
    assert!(backend.commands().is_empty());

    sink.suspend().await.unwrap();
    sink.resume().await.unwrap();
    input.remove().await.unwrap();
    assert_eq!(
        backend.commands(),
        vec![
            Command::Suspend { index: 1 },
            Command::Resume { index: 1 },
            Command::Remove { index: 2 }
        ]
    );
}

#[tokio::test]
async fn monitor_is_created_lazily_and_cached() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    assert!(!stream.monitor_is_running());
    stream.monitor_start().await.unwrap();
    assert!(stream.monitor_is_running());

    stream.monitor_start().await.unwrap();
    let creates = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::CreateMonitor { .. }))
        .count();
    assert_eq!(creates, 1, "monitor must be created once");

    stream.monitor_stop().await.unwrap();
    assert!(!stream.monitor_is_running());
}

#[tokio::test]
async fn monitor_requires_capability() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let mut snapshot = sink_snapshot(1);
    snapshot.has_monitor = false;
    let stream = registry.apply(&snapshot);

    assert!(matches!(
        stream.monitor_start().await,
        Err(MixerError::NotPermitted { .. })
    ));
    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn monitor_samples_reach_subscribers() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    let mut values = Box::pin(stream.monitor_values());
    stream.monitor_start().await.unwrap();

    backend.feed_monitor(0.25);
    assert_eq!(values.next().await, Some(0.25));
}

#[tokio::test]
async fn client_monitor_targets_resolved_device() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let orphan = registry.apply(&sink_input_snapshot(2, None));
    assert!(matches!(
        orphan.monitor_start().await,
        Err(MixerError::NoMonitorTarget)
    ));

    let attached = registry.apply(&sink_input_snapshot(3, Some(7)));
    attached.monitor_start().await.unwrap();
    assert!(
        backend
            .commands()
            .contains(&Command::CreateMonitor { target: 7 })
    );
}

#[tokio::test]
async fn device_change_recreates_active_monitor() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let stream = registry.apply(&sink_input_snapshot(3, Some(7)));
    stream.monitor_start().await.unwrap();

    registry.apply(&sink_input_snapshot(3, Some(8)));
    wait_for_commands(&backend, |commands| {
        commands.contains(&Command::CreateMonitor { target: 8 })
            && commands
                .iter()
                .filter(|c| matches!(c, Command::MonitorEnabled { enabled: true }))
                .count()
                >= 2
    })
    .await;
    assert!(stream.monitor_is_running());
}

#[tokio::test]
async fn removal_emits_final_event_and_tears_down() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let stream = registry.apply(&sink_snapshot(1));
    stream.monitor_start().await.unwrap();
    let mut events = Box::pin(registry.events());

    let removed = registry.remove(StreamKind::Sink, 1).await.unwrap();
    assert_eq!(removed.index(), 1);
    assert!(registry.is_empty());
    assert!(!stream.monitor_is_running());
    assert!(stream.device.get().is_none());
    assert!(stream.active_port.get().is_none());
    assert!(stream.ports.get().is_empty());

    match events.next().await.unwrap() {
        MixerEvent::StreamRemoved(gone) => assert_eq!(gone.index(), 1),
        other => panic!("expected StreamRemoved, got {other:?}"),
    }

    assert!(registry.remove(StreamKind::Sink, 1).await.is_none());
}

#[tokio::test]
async fn shutdown_tears_down_every_stream() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    registry.apply(&sink_snapshot(1));
    registry.apply(&sink_input_snapshot(2, Some(1)));
    assert_eq!(registry.len(), 2);

    registry.shutdown().await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn registry_resolves_device_relations() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);

    let sink = registry.apply(&sink_snapshot(7));
    let input = registry.apply(&sink_input_snapshot(3, Some(7)));

    let device = registry.device_of(&input).unwrap();
    assert_eq!(device.index(), sink.index());
    assert!(registry.device_of(&sink).is_none());
}

#[tokio::test]
async fn decibel_round_trips_through_mutators() {
    let backend = MockBackend::new();
    let mut registry = StreamRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
    let stream = registry.apply(&sink_snapshot(1));

    assert!(stream.decibel().unwrap().abs() < 1e-9);

    stream.set_decibel(-6.0).await.unwrap();
    match &backend.commands()[0] {
        Command::SetVolume { volume, .. } => {
            let expected = mixtide::volume_from_decibel(-6.0);
            assert_eq!(volume[0], expected);
        }
        other => panic!("expected SetVolume, got {other:?}"),
    }

    let mut no_db = sink_input_snapshot(2, Some(1));
    no_db.has_decibel = false;
    let input = registry.apply(&no_db);
    assert!(matches!(
        input.decibel(),
        Err(MixerError::NotPermitted { .. })
    ));
}
