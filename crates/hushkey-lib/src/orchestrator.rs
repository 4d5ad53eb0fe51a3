//! Mute orchestration: the single owner of the mute state.
//!
//! Every trigger (hotkey, menu, icon click, CLI, session lock) funnels into
//! [`MuteOrchestrator`]. Each side effect of a transition (devices, icon,
//! cue, lighting profile) is attempted independently; a failure in one never
//! blocks or rolls back the others.

use std::time::{Duration, Instant};

use crate::audio::{AudioError, MuteGateway};
use crate::config::SettingsStore;
use crate::hotkey::KeyCombination;
use crate::lighting::{self, ConnectionState, LightingClient};

/// Icon and audio-cue output. Fire-and-forget.
pub trait FeedbackSink {
    fn set_icon_state(&mut self, muted: bool);
    fn play_cue(&mut self, muted: bool);
}

/// Workstation session notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Locked,
    Unlocked,
}

/// What a transition did.
#[derive(Debug)]
pub struct Transition {
    /// The requested (and now displayed) state.
    pub muted: bool,
    /// Devices that took the new flag.
    pub devices: usize,
    /// Set when enumeration failed or some devices rejected the flag.
    pub device_error: Option<AudioError>,
}

impl Transition {
    pub fn is_clean(&self) -> bool {
        self.device_error.is_none()
    }
}

pub struct MuteOrchestrator<F, S> {
    muted: bool,
    gateway: MuteGateway,
    lighting: LightingClient,
    feedback: F,
    settings: S,
    repeat_guard: Duration,
    last_hotkey: Option<Instant>,
}

impl<F: FeedbackSink, S: SettingsStore> MuteOrchestrator<F, S> {
    /// Nothing is applied until the first transition or [`apply_current`](Self::apply_current).
    pub fn new(
        initial_muted: bool,
        gateway: MuteGateway,
        lighting: LightingClient,
        feedback: F,
        settings: S,
    ) -> Self {
        MuteOrchestrator {
            muted: initial_muted,
            gateway,
            lighting,
            feedback,
            settings,
            repeat_guard: Duration::ZERO,
            last_hotkey: None,
        }
    }

    /// Ignore hotkey triggers closer together than `guard`. Zero disables.
    pub fn with_repeat_guard(mut self, guard: Duration) -> Self {
        self.repeat_guard = guard;
        self
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut F {
        &mut self.feedback
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn lighting_state(&self) -> ConnectionState {
        self.lighting.state()
    }

    pub fn next_poll(&self) -> Option<Instant> {
        self.lighting.next_poll()
    }

    // ── Transitions ──

    /// Flip the mute state and apply it everywhere, with cue.
    pub fn toggle(&mut self) -> Transition {
        self.set_muted(!self.muted)
    }

    /// Set an explicit state and apply it everywhere, with cue.
    pub fn set_muted(&mut self, muted: bool) -> Transition {
        self.transition(muted, true, true)
    }

    /// Hotkey entry point. Triggers inside the repeat guard window after the
    /// previous one are ignored, so holding the combination toggles once.
    pub fn on_hotkey(&mut self, now: Instant) -> Option<Transition> {
        let within_guard = self
            .last_hotkey
            .is_some_and(|last| now.saturating_duration_since(last) < self.repeat_guard);
        self.last_hotkey = Some(now);
        if within_guard {
            log::debug!("[orchestrator] hotkey repeat ignored");
            return None;
        }
        Some(self.toggle())
    }

    /// Lock forces mute silently and leaves lighting alone. Unlock re-applies
    /// the lighting profile for the current state.
    pub fn on_session_event(&mut self, event: SessionEvent) -> Option<Transition> {
        match event {
            SessionEvent::Locked => {
                log::info!("[orchestrator] session locked, muting");
                Some(self.transition(true, false, false))
            }
            SessionEvent::Unlocked => {
                log::info!("[orchestrator] session unlocked");
                self.apply_profile();
                None
            }
        }
    }

    /// Push the current state to devices, icon and lighting without a cue.
    pub fn apply_current(&mut self) -> Transition {
        self.transition(self.muted, false, true)
    }

    fn transition(&mut self, muted: bool, cue: bool, lighting: bool) -> Transition {
        self.muted = muted;

        let (devices, device_error) = match self.gateway.set_mute(muted) {
            Ok(n) => (n, None),
            Err(e) => {
                log::warn!("[orchestrator] mute={muted}: {e}");
                let applied = match &e {
                    AudioError::PartialFailure { applied, .. } => *applied,
                    _ => 0,
                };
                (applied, Some(e))
            }
        };

        self.feedback.set_icon_state(muted);
        if cue && self.settings.play_audio() {
            self.feedback.play_cue(muted);
        }
        if lighting {
            self.apply_profile();
        }

        log::info!(
            "[orchestrator] {} ({devices} device(s))",
            if muted { "muted" } else { "unmuted" }
        );
        Transition {
            muted,
            devices,
            device_error,
        }
    }

    /// Select the profile for the current state if connected. Returns whether
    /// a profile was loaded.
    fn apply_profile(&mut self) -> bool {
        if !self.lighting.is_connected() {
            return false;
        }
        let profile = self.settings.profile_for_state(self.muted).to_string();
        if profile.is_empty() {
            return false;
        }
        // Failure already tore the link down and was logged by the client.
        self.lighting.select_profile(&profile).is_ok()
    }

    // ── Lighting ──

    /// Connect to the lighting server and select the current state's profile.
    pub fn connect_lighting(&mut self) -> lighting::Result<()> {
        self.lighting.connect()?;
        self.apply_profile();
        Ok(())
    }

    pub fn disconnect_lighting(&mut self) {
        self.lighting.disconnect();
    }

    /// Connect if disconnected, disconnect otherwise. Returns the new
    /// connected flag.
    pub fn toggle_lighting_connection(&mut self) -> lighting::Result<bool> {
        if self.lighting.is_connected() {
            self.lighting.disconnect();
            Ok(false)
        } else {
            self.connect_lighting()?;
            Ok(true)
        }
    }

    /// Drive the liveness poll. Poll failures disconnect and are logged.
    pub fn tick(&mut self, now: Instant) {
        let _ = self.lighting.tick(now);
    }

    pub fn lighting_profiles(&mut self) -> lighting::Result<Vec<String>> {
        self.lighting.list_profiles()
    }

    /// Load a profile by name right now, regardless of state mapping.
    pub fn load_profile(&mut self, name: &str) -> lighting::Result<()> {
        self.lighting.select_profile(name)
    }

    // ── Settings ──

    /// Persist the profile for a state; applied at once when it is the
    /// current state's profile.
    pub fn set_profile_for_state(&mut self, muted: bool, profile: &str) -> std::io::Result<()> {
        self.settings.set_profile_for_state(muted, profile);
        let saved = self.settings.save();
        if muted == self.muted {
            self.apply_profile();
        }
        saved
    }

    pub fn set_play_audio(&mut self, enabled: bool) -> std::io::Result<()> {
        self.settings.set_play_audio(enabled);
        self.settings.save()
    }

    /// Persist a new hotkey. Registering it with the hook is the caller's job.
    pub fn set_hotkey(&mut self, combination: &KeyCombination) -> std::io::Result<()> {
        self.settings.set_hotkey_string(&combination.to_string());
        self.settings.save()
    }
}

/// Recording [`FeedbackSink`] for tests.
pub mod stub {
    use super::FeedbackSink;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Feedback {
        Icon(bool),
        Cue(bool),
    }

    #[derive(Debug, Default)]
    pub struct RecordingFeedback {
        pub events: Vec<Feedback>,
    }

    impl RecordingFeedback {
        pub fn cues(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, Feedback::Cue(_)))
                .count()
        }

        pub fn last_icon(&self) -> Option<bool> {
            self.events.iter().rev().find_map(|e| match e {
                Feedback::Icon(m) => Some(*m),
                _ => None,
            })
        }
    }

    impl FeedbackSink for RecordingFeedback {
        fn set_icon_state(&mut self, muted: bool) {
            self.events.push(Feedback::Icon(muted));
        }

        fn play_cue(&mut self, muted: bool) {
            self.events.push(Feedback::Cue(muted));
        }
    }
}
