//! Cue players
//!
//! - `CommandPlayer`: hands a generated WAV file to a system audio player
//! - `BellPlayer`: rings the terminal bell once per tone

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tempfile::TempPath;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, warn};

use super::tones::{cue_tones, render_cue};
use super::{Cue, CuePlayer};
use crate::config::{AlertConfig, PlayerKind};

const CUE_FILE_PREFIX: &str = "lbwatch-cue-";

/// Runs `<program> <args..> <wav file>` and waits for it to exit
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    temp_dir: Option<PathBuf>,
    ready: AtomicBool,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            temp_dir: None,
            ready: AtomicBool::new(false),
        }
    }

    /// Known player for the current platform, if any
    pub fn platform_default() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::new("afplay", Vec::new()))
        } else if cfg!(target_os = "linux") {
            Some(Self::new("aplay", vec!["-q".to_string()]))
        } else {
            None
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Write cue files under `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn program_exists(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Cue rendered to a WAV file that is deleted when the returned path drops
    fn write_temp_wav(&self, cue: Cue) -> Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(CUE_FILE_PREFIX).suffix(".wav");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("Failed to create cue file")?;

        file.write_all(&render_cue(cue))
            .context("Failed to write cue file")?;
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

#[async_trait]
impl CuePlayer for CommandPlayer {
    async fn resume(&self) -> Result<()> {
        if self.ready.load(Ordering::Relaxed) {
            return Ok(());
        }
        if !self.program_exists() {
            return Err(anyhow!("Audio player '{}' not found", self.program));
        }
        self.ready.store(true, Ordering::Relaxed);
        debug!("Audio player '{}' ready", self.program);
        Ok(())
    }

    async fn play(&self, cue: Cue) -> Result<()> {
        let wav = self.write_temp_wav(cue)?;

        // Dropping this future mid-playback kills the player and deletes `wav`
        let output = AsyncCommand::new(&self.program)
            .args(&self.args)
            .arg(&*wav)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run audio player '{}'", self.program))?;

        if !output.status.success() {
            return Err(anyhow!(
                "Audio player exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Terminal bell fallback; sleeps through each tone so cues never overlap
pub struct BellPlayer;

#[async_trait]
impl CuePlayer for BellPlayer {
    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    async fn play(&self, cue: Cue) -> Result<()> {
        for tone in cue_tones(cue) {
            {
                let mut stderr = std::io::stderr().lock();
                stderr.write_all(b"\x07")?;
                stderr.flush()?;
            }
            let ms = u64::from(tone.duration_ms + tone.gap_ms);
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
        Ok(())
    }
}

/// Build the player selected by the alert configuration
pub fn player_from_config(config: &AlertConfig) -> Arc<dyn CuePlayer> {
    match config.player {
        PlayerKind::Bell => Arc::new(BellPlayer),
        PlayerKind::Command => match &config.command {
            Some(program) => Arc::new(CommandPlayer::new(program.clone(), config.args.clone())),
            None => {
                warn!("player = \"command\" without a command, using terminal bell");
                Arc::new(BellPlayer)
            }
        },
        PlayerKind::Auto => match CommandPlayer::platform_default() {
            Some(player) => {
                info!("Using audio player '{}'", player.program());
                Arc::new(player)
            }
            None => Arc::new(BellPlayer),
        },
    }
}
