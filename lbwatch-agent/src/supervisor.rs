//! Keeps exactly one poll activation matching the current credentials and
//! mute flag. Any change tears the running activation down first.

use tracing::info;

use crate::credentials::Credentials;
use crate::poller::{PollHandle, PollLoop};

pub struct Supervisor {
    poller: PollLoop,
    credentials: Option<Credentials>,
    muted: bool,
    active: Option<PollHandle>,
}

impl Supervisor {
    pub fn new(poller: PollLoop, muted: bool) -> Self {
        Self {
            poller,
            credentials: None,
            muted,
            active: None,
        }
    }

    pub fn poller(&self) -> &PollLoop {
        &self.poller
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// `None` logs out: the loop stops and stays stopped
    pub async fn set_credentials(&mut self, credentials: Option<Credentials>) {
        if self.credentials == credentials && (credentials.is_none() || self.active.is_some()) {
            return;
        }
        self.credentials = credentials;
        self.restart().await;
    }

    pub async fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        info!(muted, "Alert sound toggled");
        self.restart().await;
    }

    pub async fn toggle_mute(&mut self) -> bool {
        let muted = !self.muted;
        self.set_muted(muted).await;
        muted
    }

    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.deactivate().await;
        }
    }

    async fn restart(&mut self) {
        self.shutdown().await;
        if let Some(credentials) = &self.credentials {
            self.active = Some(self.poller.activate(credentials.clone(), self.muted));
        }
    }
}
