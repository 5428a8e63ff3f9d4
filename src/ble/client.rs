//! Light client: one-shot and keep-alive command delivery.
//!
//! A client owns a single pending-operation slot. A request that arrives while
//! the slot is held fails fast with [`ClientError::Busy`] instead of queueing;
//! the event rate is low enough that dropping overlaps is harmless.

use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;

use super::command::LightCommand;
use super::error::ClientError;
use super::radio::Radio;
use super::session::{self, Cancel, CommandChannel, Stage, Target};
use crate::common::constants::STAGE_TIMEOUT;

/// How a keep-alive cycle on one connection ended.
enum CycleEnd {
    Shutdown,
    Dropped(ClientError),
}

pub struct LightClient<R: Radio> {
    radio: R,
    target: Target,
    stage_timeout: Duration,
    linger: Duration,
    debug_enabled: bool,
    slot: Mutex<()>,
}

impl<R: Radio> LightClient<R> {
    pub fn new(radio: R, target: Target) -> Self {
        Self {
            radio,
            target,
            stage_timeout: STAGE_TIMEOUT,
            linger: Duration::ZERO,
            debug_enabled: false,
            slot: Mutex::new(()),
        }
    }

    /// Override the per-stage watchdog.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Keep the link open this long after a successful one-shot write so the
    /// accessory's notification can arrive.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// True when no command currently holds the session slot.
    pub fn is_idle(&self) -> bool {
        self.slot.try_lock().is_ok()
    }

    /// Deliver one command: Idle → … → Done, then release the session.
    pub async fn send(&self, command: LightCommand) -> Result<(), ClientError> {
        self.send_until(command, Cancel::never()).await
    }

    /// Like [`send`](Self::send), but give up when `cancel` fires.
    ///
    /// An interrupted command always disconnects before returning
    /// [`ClientError::Cancelled`]. A write already in flight is allowed to
    /// finish; only the linger afterwards is cut short.
    pub async fn send_until(
        &self,
        command: LightCommand,
        mut cancel: Cancel,
    ) -> Result<(), ClientError> {
        let _slot = self.slot.try_lock().map_err(|_| ClientError::Busy)?;

        let channel = match self.open(&mut cancel).await {
            Ok(channel) => channel,
            Err(e) => {
                self.finish(command, Some(&e));
                return Err(e);
            }
        };
        let mut result = channel.write(command, self.stage_timeout).await;
        if result.is_ok() && !self.linger.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.linger) => {}
                _ = cancel.requested() => result = Err(ClientError::Cancelled),
            }
        }
        channel.close().await;

        self.finish(command, result.as_ref().err());
        result
    }

    /// Turn the light to `command` and resend it every `interval` until
    /// `shutdown` flips to `true`.
    ///
    /// Resends reuse the open session. When the link drops or a write fails the
    /// ticker is discarded, the session is closed and the next cycle starts from
    /// Idle after one interval. Radio and lookup failures end the loop with an
    /// error.
    pub async fn keep_alive(
        &self,
        command: LightCommand,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ClientError> {
        let _slot = self.slot.try_lock().map_err(|_| ClientError::Busy)?;
        let mut cancel = Cancel::on(shutdown);

        loop {
            let end = match self.open(&mut cancel).await {
                Ok(channel) => {
                    let end = self.drive(&channel, command, interval, &mut cancel).await;
                    channel.close().await;
                    end
                }
                Err(ClientError::Cancelled) => CycleEnd::Shutdown,
                Err(e) if e.is_retryable() => CycleEnd::Dropped(e),
                Err(e) => {
                    self.finish(command, Some(&e));
                    return Err(e);
                }
            };

            match end {
                CycleEnd::Shutdown => return Ok(()),
                CycleEnd::Dropped(e) => {
                    log_pipe!();
                    log_warning!("Keep-alive session lost: {e}");
                    log_indented!("Reconnecting in {:.1}s", interval.as_secs_f64());
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = cancel.requested() => return Ok(()),
                    }
                }
            }
        }
    }

    async fn open(&self, cancel: &mut Cancel) -> Result<CommandChannel<R::Link>, ClientError> {
        session::establish(
            &self.radio,
            &self.target,
            self.stage_timeout,
            self.debug_enabled,
            cancel,
        )
        .await
    }

    /// Write on every tick while the connection stays valid.
    async fn drive(
        &self,
        channel: &CommandChannel<R::Link>,
        command: LightCommand,
        interval: Duration,
        cancel: &mut Cancel,
    ) -> CycleEnd {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut writes: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if writes > 0 && !channel.is_alive().await {
                        return CycleEnd::Dropped(ClientError::Protocol {
                            stage: Stage::Writing,
                            source: btleplug::Error::NotConnected,
                        });
                    }
                    if let Err(e) = channel.write(command, self.stage_timeout).await {
                        return CycleEnd::Dropped(e);
                    }
                    writes += 1;
                    if writes == 1 {
                        log_decorated!("Light {command} on {}, keeping alive", channel.describe());
                    } else if self.debug_enabled {
                        log_debug!("Keep-alive write #{writes} acknowledged");
                    }
                }
                _ = cancel.requested() => return CycleEnd::Shutdown,
            }
        }
    }

    fn finish(&self, command: LightCommand, error: Option<&ClientError>) {
        match error {
            None => {
                if self.debug_enabled {
                    log_debug!("BLE session → {}", Stage::Done);
                }
                log_decorated!("Light {command}: write acknowledged");
            }
            Some(ClientError::Cancelled) => {
                log_pipe!();
                log_warning!("Light {command} interrupted, link released");
            }
            Some(e) => {
                if self.debug_enabled {
                    log_debug!("BLE session → {}", Stage::Failed);
                }
                log_error!("Light {command} failed: {e}");
            }
        }
    }
}
