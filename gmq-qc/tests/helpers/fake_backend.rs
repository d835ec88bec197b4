//! Recording audio backend
//!
//! Records every control call in order and can be told to fail or hang
//! specific calls.

use async_trait::async_trait;
use gmq_common::{GuildId, Track};
use gmq_qc::backend::{AudioBackend, ControlMessage, VoiceConnection};
use gmq_qc::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Connect(GuildId, u64),
    /// Guild and track uri
    Play(GuildId, String),
    Stop(GuildId),
    Pause(GuildId, bool),
    Volume(GuildId, u16),
    Control(GuildId, ControlMessage),
    Disconnect(GuildId),
}

#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    fail_connect: AtomicBool,
    fail_play: AtomicBool,
    fail_control: AtomicBool,
    hang_play: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Uris passed to `play`, in order
    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Play(_, uri) => Some(uri),
                _ => None,
            })
            .collect()
    }

    pub fn disconnects(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Disconnect(_)))
    }

    pub fn volumes(&self) -> Vec<u16> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Volume(_, v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_control(&self, fail: bool) {
        self.fail_control.store(fail, Ordering::SeqCst);
    }

    pub fn set_hang_play(&self, hang: bool) {
        self.hang_play.store(hang, Ordering::SeqCst);
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AudioBackend for RecordingBackend {
    async fn connect(&self, guild: GuildId, voice: &VoiceConnection) -> Result<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Backend("voice channel unreachable".to_string()));
        }
        self.record(BackendCall::Connect(guild, voice.channel_id));
        Ok(())
    }

    async fn play(&self, guild: GuildId, track: &Track) -> Result<()> {
        if self.hang_play.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::Backend("play rejected".to_string()));
        }
        self.record(BackendCall::Play(guild, track.uri.clone()));
        Ok(())
    }

    async fn stop(&self, guild: GuildId) -> Result<()> {
        self.record(BackendCall::Stop(guild));
        Ok(())
    }

    async fn set_pause(&self, guild: GuildId, paused: bool) -> Result<()> {
        self.record(BackendCall::Pause(guild, paused));
        Ok(())
    }

    async fn set_volume(&self, guild: GuildId, volume: u16) -> Result<()> {
        self.record(BackendCall::Volume(guild, volume));
        Ok(())
    }

    async fn send_control(&self, guild: GuildId, message: ControlMessage) -> Result<()> {
        if self.fail_control.load(Ordering::SeqCst) {
            return Err(Error::Backend("filters rejected".to_string()));
        }
        self.record(BackendCall::Control(guild, message));
        Ok(())
    }

    async fn disconnect(&self, guild: GuildId) -> Result<()> {
        self.record(BackendCall::Disconnect(guild));
        Ok(())
    }
}
