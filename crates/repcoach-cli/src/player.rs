//! Rodio-backed announcement playback.
//!
//! A dedicated OS thread owns the output stream and the current sink;
//! commands arrive over a channel and decode results are acknowledged
//! synchronously so the delivery engine's retry logic sees real errors.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::Mutex;

use repcoach_core::audio::store::ClipHandle;
use repcoach_core::{AnnouncementPlayer, AudioError};

enum PlayerCommand {
    Play {
        bytes: Vec<u8>,
        ack: mpsc::Sender<Result<(), AudioError>>,
    },
    PlayUrl {
        url: String,
        ack: mpsc::Sender<Result<(), AudioError>>,
    },
    Pause,
}

pub struct RodioPlayer {
    tx: Mutex<mpsc::Sender<PlayerCommand>>,
}

impl RodioPlayer {
    /// `volume` in percent, 0-100.
    pub fn new(volume: u32) -> Self {
        let (tx, rx) = mpsc::channel();
        let volume = (volume.min(100)) as f32 / 100.0;
        std::thread::spawn(move || playback_loop(rx, volume));
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, command: PlayerCommand) -> Result<(), AudioError> {
        let tx = self
            .tx
            .lock()
            .map_err(|_| AudioError::Backend("player channel poisoned".into()))?;
        tx.send(command)
            .map_err(|_| AudioError::Backend("playback thread gone".into()))
    }

    fn send_and_wait(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<(), AudioError>>) -> PlayerCommand,
    ) -> Result<(), AudioError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(build(ack_tx))?;
        ack_rx
            .recv()
            .map_err(|_| AudioError::Backend("playback thread gone".into()))?
    }
}

impl AnnouncementPlayer for RodioPlayer {
    fn play_remote(&self, url: &str) -> Result<(), AudioError> {
        let url = url.to_string();
        self.send_and_wait(|ack| PlayerCommand::PlayUrl { url, ack })
    }

    fn play_clip(&self, clip: &ClipHandle) -> Result<(), AudioError> {
        let bytes = clip.bytes().to_vec();
        self.send_and_wait(|ack| PlayerCommand::Play { bytes, ack })
    }

    fn decode_and_play(&self, bytes: &[u8]) -> Result<(), AudioError> {
        let bytes = bytes.to_vec();
        self.send_and_wait(|ack| PlayerCommand::Play { bytes, ack })
    }

    fn pause(&self) {
        let _ = self.send(PlayerCommand::Pause);
    }
}

fn playback_loop(rx: mpsc::Receiver<PlayerCommand>, volume: f32) {
    use rodio::{OutputStream, Sink};

    let Ok((_stream, stream_handle)) = OutputStream::try_default() else {
        // No audio device: acknowledge every request with an error so
        // the engine degrades to silence instead of hanging.
        while let Ok(command) = rx.recv() {
            match command {
                PlayerCommand::Play { ack, .. } | PlayerCommand::PlayUrl { ack, .. } => {
                    let _ = ack.send(Err(AudioError::Backend("no audio output device".into())));
                }
                PlayerCommand::Pause => {}
            }
        }
        return;
    };

    let mut current: Option<Sink> = None;
    while let Ok(command) = rx.recv() {
        match command {
            PlayerCommand::Play { bytes, ack } => {
                let result = start_sink(&stream_handle, bytes, volume);
                match result {
                    Ok(sink) => {
                        if let Some(old) = current.replace(sink) {
                            old.stop();
                        }
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = ack.send(Err(e));
                    }
                }
            }
            PlayerCommand::PlayUrl { url, ack } => {
                let result = fetch_bytes(&url)
                    .and_then(|bytes| start_sink(&stream_handle, bytes, volume));
                match result {
                    Ok(sink) => {
                        if let Some(old) = current.replace(sink) {
                            old.stop();
                        }
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = ack.send(Err(e));
                    }
                }
            }
            PlayerCommand::Pause => {
                if let Some(sink) = &current {
                    sink.pause();
                }
            }
        }
    }
}

fn start_sink(
    handle: &rodio::OutputStreamHandle,
    bytes: Vec<u8>,
    volume: f32,
) -> Result<rodio::Sink, AudioError> {
    let source = rodio::Decoder::new(Cursor::new(bytes))
        .map_err(|e| AudioError::Backend(format!("decode failed: {e}")))?;
    let sink = rodio::Sink::try_new(handle)
        .map_err(|e| AudioError::Backend(format!("sink failed: {e}")))?;
    sink.set_volume(volume);
    sink.append(source);
    Ok(sink)
}

fn fetch_bytes(url: &str) -> Result<Vec<u8>, AudioError> {
    let response = reqwest::blocking::get(url)
        .map_err(|e| AudioError::Backend(format!("stream fetch failed: {e}")))?;
    if !response.status().is_success() {
        return Err(AudioError::Backend(format!(
            "stream fetch failed: status {}",
            response.status()
        )));
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| AudioError::Backend(format!("stream read failed: {e}")))
}
