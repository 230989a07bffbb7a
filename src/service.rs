//! Audio service lifecycle: wires the kernel components together, owns the
//! two long-lived tasks (speech loop, position timer) and shuts them down in
//! order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bus::Message;
use crate::config::AudioConfig;
use crate::error::Result;
use crate::hal::{AudioHal, ForegroundChannel};
use crate::kernel::arbiter::ForegroundArbiter;
use crate::kernel::event::{EventSender, InboundEvent};
use crate::kernel::reactor::Reactor;
use crate::kernel::speech::SpeechPlayer;
use crate::kernel::state::SessionRegistry;
use crate::kernel::stream::BackgroundStream;
use crate::kernel::time::RepeatingTimer;

pub struct AudioService {
    reactor: Arc<Reactor>,
    hal: Arc<dyn AudioHal>,
    position_timer: RepeatingTimer,
    timer_task: Option<JoinHandle<()>>,
    speech_task: Option<JoinHandle<()>>,
}

impl AudioService {
    /// Builds the orchestrator and spawns its tasks on the current runtime.
    pub fn start(config: &AudioConfig, hal: Arc<dyn AudioHal>, events: EventSender) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let arbiter = Arc::new(ForegroundArbiter::new(hal.clone(), config));
        let stream = Arc::new(BackgroundStream::new(hal.clone(), events.clone()));
        let reactor = Arc::new(Reactor::new(
            registry.clone(),
            arbiter,
            stream.clone(),
            hal.clone(),
        ));

        let player = SpeechPlayer::new(registry, hal.clone(), events, config.speech_grace());
        let speech_task = tokio::spawn(player.run());

        let position_timer = RepeatingTimer::new(config.position_interval());
        let timer_task = position_timer.spawn(move || stream.report_position());

        info!("Audio service started");
        Self {
            reactor,
            hal,
            position_timer,
            timer_task: Some(timer_task),
            speech_task: Some(speech_task),
        }
    }

    pub fn reactor(&self) -> Arc<Reactor> {
        self.reactor.clone()
    }

    pub fn handle(&self, event: InboundEvent) -> Result<()> {
        self.reactor.handle(event)
    }

    pub fn handle_message(&self, message: &Message) {
        self.reactor.handle_message(message)
    }

    /// Spawns the router over an inbound message channel.
    pub fn spawn_router(&self, inbound: mpsc::UnboundedReceiver<Message>) -> JoinHandle<()> {
        let reactor = self.reactor.clone();
        tokio::spawn(async move { reactor.run(inbound).await })
    }

    pub fn is_running(&self) -> bool {
        self.reactor.registry.is_running()
    }

    /// Stops the timer and the speech loop, then the HAL. Idempotent.
    pub async fn shutdown(&mut self) {
        let (Some(speech_task), Some(timer_task)) =
            (self.speech_task.take(), self.timer_task.take())
        else {
            return;
        };

        let registry = &self.reactor.registry;
        registry.clear_current();
        self.position_timer.cancel();

        self.hal.stop_foreground(ForegroundChannel::Speech);
        registry.stop_running();
        if let Err(e) = speech_task.await {
            error!("speech loop ended abnormally: {}", e);
        }
        if let Err(e) = timer_task.await {
            error!("position timer ended abnormally: {}", e);
        }

        self.hal.shutdown();
        info!("Audio service stopped");
    }
}
