#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use nexus_audio::config::AudioConfig;
use nexus_audio::error::{AudioError, Result};
use nexus_audio::hal::{AudioHal, ForegroundChannel, PlayRequest};
use nexus_audio::kernel::arbiter::ForegroundArbiter;
use nexus_audio::kernel::event::{EventSender, OutboundEvent};
use nexus_audio::kernel::reactor::Reactor;
use nexus_audio::kernel::speech::SpeechPlayer;
use nexus_audio::kernel::state::SessionRegistry;
use nexus_audio::kernel::stream::BackgroundStream;
use nexus_audio::AudioService;

#[derive(Debug, Clone, PartialEq)]
pub enum HalCall {
    Play {
        channel: ForegroundChannel,
        path: PathBuf,
        volume: Option<f32>,
        media_id: Option<String>,
        correlation_id: Option<String>,
    },
    Stop(ForegroundChannel),
    StartBackground(Vec<String>),
    PauseBackground,
    ResumeBackground,
    StopBackground,
    SetVolume(f32),
    Shutdown,
}

/// HAL double that records every call and reports a fixed duration.
pub struct RecordingHal {
    calls: Mutex<Vec<HalCall>>,
    duration: Option<Duration>,
    fail_plays: AtomicBool,
    fail_background: AtomicBool,
    background_playing: AtomicBool,
    background_ms: AtomicI64,
}

impl RecordingHal {
    pub fn new(duration: Option<Duration>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            duration,
            fail_plays: AtomicBool::new(false),
            fail_background: AtomicBool::new(false),
            background_playing: AtomicBool::new(false),
            background_ms: AtomicI64::new(-1),
        }
    }

    fn record(&self, call: HalCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<HalCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn plays_on(&self, channel: ForegroundChannel) -> Vec<HalCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, HalCall::Play { channel: c, .. } if *c == channel))
            .collect()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HalCall::SetVolume(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &HalCall) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    pub fn fail_plays(&self, fail: bool) {
        self.fail_plays.store(fail, Ordering::SeqCst);
    }

    pub fn fail_background(&self, fail: bool) {
        self.fail_background.store(fail, Ordering::SeqCst);
    }

    pub fn set_background(&self, playing: bool, position_ms: i64) {
        self.background_playing.store(playing, Ordering::SeqCst);
        self.background_ms.store(position_ms, Ordering::SeqCst);
    }
}

impl AudioHal for RecordingHal {
    fn play_foreground(&self, request: PlayRequest<'_>) -> Result<Option<Duration>> {
        self.record(HalCall::Play {
            channel: request.channel,
            path: request.path.to_path_buf(),
            volume: request.volume,
            media_id: request.media_id.map(str::to_string),
            correlation_id: request.correlation_id.map(str::to_string),
        });
        if self.fail_plays.load(Ordering::SeqCst) {
            return Err(AudioError::Hal("device unavailable".to_string()));
        }
        Ok(self.duration)
    }

    fn stop_foreground(&self, channel: ForegroundChannel) {
        self.record(HalCall::Stop(channel));
    }

    fn start_background(&self, playlist: &[String]) -> Result<()> {
        self.record(HalCall::StartBackground(playlist.to_vec()));
        if self.fail_background.load(Ordering::SeqCst) {
            return Err(AudioError::Hal("no output device".to_string()));
        }
        Ok(())
    }

    fn pause_background(&self) {
        self.record(HalCall::PauseBackground);
    }

    fn resume_background(&self) {
        self.record(HalCall::ResumeBackground);
    }

    fn stop_background(&self) {
        self.record(HalCall::StopBackground);
    }

    fn is_background_playing(&self) -> bool {
        self.background_playing.load(Ordering::SeqCst)
    }

    fn background_time_ms(&self) -> i64 {
        self.background_ms.load(Ordering::SeqCst)
    }

    fn set_background_volume(&self, volume: f32) {
        self.record(HalCall::SetVolume(volume));
    }

    fn shutdown(&self) {
        self.record(HalCall::Shutdown);
    }
}

pub fn test_config() -> AudioConfig {
    let mut config = AudioConfig::default();
    config.speech.grace_ms = 50;
    config.stream.position_interval_ms = 20;
    config
}

/// Creates an empty file and returns its `file://` URI.
pub fn audio_file(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, b"RIFF").unwrap();
    format!("file://{}", path.display())
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receives events until `done` matches one, or panics after `limit`.
pub async fn collect_until<F>(
    rx: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    limit: Duration,
    mut done: F,
) -> Vec<OutboundEvent>
where
    F: FnMut(&OutboundEvent) -> bool,
{
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) => {
                let stop = done(&event);
                events.push(event);
                if stop {
                    return events;
                }
            }
            Ok(None) => panic!("event channel closed; got {:?}", events),
            Err(_) => panic!("timed out; got {:?}", events),
        }
    }
}

/// Receives whatever arrives within `window`.
pub async fn collect_for(
    rx: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    window: Duration,
) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        events.push(event);
    }
    events
}

pub fn session_ended(id: &str) -> OutboundEvent {
    OutboundEvent::SessionEnded {
        session_id: id.to_string(),
    }
}

pub fn output_end(id: &str) -> OutboundEvent {
    OutboundEvent::AudioOutputEnd {
        session_id: id.to_string(),
    }
}

pub fn count(events: &[OutboundEvent], wanted: &OutboundEvent) -> usize {
    events.iter().filter(|event| *event == wanted).count()
}

/// `(session_id, chunk_index, started)` for every chunk event, in order.
pub fn chunk_trace(events: &[OutboundEvent]) -> Vec<(String, i64, bool)> {
    events
        .iter()
        .filter_map(|event| match event {
            OutboundEvent::ChunkStarted { session_id, chunk } => {
                Some((session_id.clone(), chunk.chunk_index, true))
            }
            OutboundEvent::ChunkEnded { session_id, chunk } => {
                Some((session_id.clone(), chunk.chunk_index, false))
            }
            _ => None,
        })
        .collect()
}

/// Kernel components wired by hand; the speech loop is stepped manually.
pub struct Kernel {
    pub registry: Arc<SessionRegistry>,
    pub reactor: Arc<Reactor>,
    pub stream: Arc<BackgroundStream>,
    pub player: SpeechPlayer,
    pub hal: Arc<RecordingHal>,
    pub events: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl Kernel {
    pub fn new(hal: RecordingHal) -> Self {
        Self::with_config(hal, &test_config())
    }

    pub fn with_config(hal: RecordingHal, config: &AudioConfig) -> Self {
        let hal = Arc::new(hal);
        let (sender, events) = EventSender::channel();
        let registry = Arc::new(SessionRegistry::new());
        let arbiter = Arc::new(ForegroundArbiter::new(hal.clone(), config));
        let stream = Arc::new(BackgroundStream::new(hal.clone(), sender.clone()));
        let reactor = Arc::new(Reactor::new(
            registry.clone(),
            arbiter,
            stream.clone(),
            hal.clone(),
        ));
        let player = SpeechPlayer::new(registry.clone(), hal.clone(), sender, config.speech_grace());
        Self {
            registry,
            reactor,
            stream,
            player,
            hal,
            events,
        }
    }
}

/// Full service with its own speech loop and timer.
pub struct Running {
    pub service: AudioService,
    pub hal: Arc<RecordingHal>,
    pub events: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl Running {
    pub fn start(hal: RecordingHal) -> Self {
        Self::start_with(hal, &test_config())
    }

    pub fn start_with(hal: RecordingHal, config: &AudioConfig) -> Self {
        let hal = Arc::new(hal);
        let (sender, events) = EventSender::channel();
        let service = AudioService::start(config, hal.clone(), sender);
        Self {
            service,
            hal,
            events,
        }
    }
}
