//! Lighting connection lifecycle and liveness polling.
//!
//! One connect attempt per call, no automatic retry. A failed poll or
//! request drops the link and returns to `Disconnected`.

use std::time::{Duration, Instant};

use super::{LightingError, LightingLink, LinkConnector, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

enum State {
    Disconnected,
    Connecting,
    Connected(Box<dyn LightingLink>),
}

/// Connection lifecycle: Disconnected -> Connecting -> Connected -> Disconnected.
///
/// The liveness deadline exists only while connected. It is armed by a
/// successful [`connect`](Self::connect) and cleared by every teardown.
pub struct LightingClient {
    connector: Box<dyn LinkConnector>,
    state: State,
    connect_timeout: Duration,
    poll_interval: Duration,
    next_poll: Option<Instant>,
}

impl LightingClient {
    pub fn new(
        connector: Box<dyn LinkConnector>,
        connect_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        LightingClient {
            connector,
            state: State::Disconnected,
            connect_timeout,
            poll_interval,
            next_poll: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.state {
            State::Disconnected => ConnectionState::Disconnected,
            State::Connecting => ConnectionState::Connecting,
            State::Connected(_) => ConnectionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    /// When the next liveness poll is due, if connected.
    pub fn next_poll(&self) -> Option<Instant> {
        self.next_poll
    }

    /// Connect once, bounded by the connect timeout. No retry on failure.
    ///
    /// Already connected is a no-op.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let target = self.connector.describe();
        log::info!("[lighting] connecting to {target}");
        self.state = State::Connecting;
        match self.connector.connect(self.connect_timeout) {
            Ok(link) => {
                self.state = State::Connected(link);
                self.next_poll = Some(Instant::now() + self.poll_interval);
                log::info!("[lighting] connected to {target}");
                Ok(())
            }
            Err(e) => {
                self.teardown();
                log::warn!("[lighting] connect to {target} failed: {e}");
                Err(e)
            }
        }
    }

    /// Drop the connection. Safe to call in any state.
    pub fn disconnect(&mut self) {
        if self.is_connected() {
            log::info!("[lighting] disconnected");
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        self.state = State::Disconnected;
        self.next_poll = None;
    }

    /// Run `op` on the live link; any error tears the connection down.
    fn with_link<T>(
        &mut self,
        what: &str,
        op: impl FnOnce(&mut dyn LightingLink) -> Result<T>,
    ) -> Result<T> {
        let State::Connected(link) = &mut self.state else {
            return Err(LightingError::NotConnected);
        };
        match op(link.as_mut()) {
            Ok(v) => Ok(v),
            Err(e) => {
                log::warn!("[lighting] {what} failed, disconnecting: {e}");
                self.teardown();
                Err(e)
            }
        }
    }

    /// Issue the liveness poll if it is due at `now`.
    ///
    /// Returns `Ok(true)` when a poll ran and succeeded.
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        match self.next_poll {
            Some(due) if now >= due => {}
            _ => return Ok(false),
        }
        let count = self.with_link("liveness poll", |link| link.controller_count())?;
        log::trace!("[lighting] poll ok ({count} controllers)");
        self.next_poll = Some(now + self.poll_interval);
        Ok(true)
    }

    pub fn list_profiles(&mut self) -> Result<Vec<String>> {
        self.with_link("profile list", |link| link.profiles())
    }

    /// Best-effort profile load. Failure disconnects rather than retrying.
    pub fn select_profile(&mut self, name: &str) -> Result<()> {
        self.with_link("profile load", |link| link.load_profile(name))?;
        log::debug!("[lighting] profile {name:?} loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::stub::StubServer;
    use super::*;

    fn client(server: &StubServer) -> LightingClient {
        LightingClient::new(
            Box::new(server.connector()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn starts_disconnected() {
        let server = StubServer::with_profiles(&["Default", "Muted"]);
        let c = client(&server);
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.next_poll(), None);
    }

    #[test]
    fn connect_arms_poll() {
        let server = StubServer::with_profiles(&["Default"]);
        let mut c = client(&server);
        c.connect().unwrap();
        assert!(c.is_connected());
        assert!(c.next_poll().is_some());
    }

    #[test]
    fn connect_when_connected_is_noop() {
        let server = StubServer::with_profiles(&["Default"]);
        let mut c = client(&server);
        c.connect().unwrap();
        c.connect().unwrap();
        assert_eq!(server.connect_attempts(), 1);
    }

    #[test]
    fn connect_timeout_leaves_disconnected_without_retry() {
        let server = StubServer::with_profiles(&["Default"]);
        server.set_timeout(true);
        let mut c = client(&server);
        assert!(matches!(c.connect(), Err(LightingError::Timeout)));
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.next_poll(), None);

        // Ticking never reconnects
        let later = Instant::now() + Duration::from_secs(60);
        assert!(!c.tick(later).unwrap());
        assert_eq!(server.connect_attempts(), 1);

        // An explicit reconnect may succeed
        server.set_timeout(false);
        c.connect().unwrap();
        assert!(c.is_connected());
        assert_eq!(server.connect_attempts(), 2);
    }

    #[test]
    fn tick_polls_only_when_due() {
        let server = StubServer::with_profiles(&["Default"]);
        let mut c = client(&server);
        c.connect().unwrap();
        let due = c.next_poll().unwrap();

        assert!(!c.tick(due - Duration::from_millis(1)).unwrap());
        assert_eq!(server.polls(), 0);
        assert!(c.tick(due).unwrap());
        assert_eq!(server.polls(), 1);
        assert_eq!(c.next_poll(), Some(due + Duration::from_secs(1)));
    }

    #[test]
    fn failed_poll_tears_down_and_cancels_timer() {
        let server = StubServer::with_profiles(&["Default"]);
        let mut c = client(&server);
        c.connect().unwrap();
        server.set_alive(false);
        let due = c.next_poll().unwrap();
        assert!(c.tick(due).is_err());
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.next_poll(), None);
    }

    #[test]
    fn list_profiles_requires_connection() {
        let server = StubServer::with_profiles(&["Default", "Muted"]);
        let mut c = client(&server);
        assert!(matches!(c.list_profiles(), Err(LightingError::NotConnected)));
        c.connect().unwrap();
        assert_eq!(c.list_profiles().unwrap(), vec!["Default", "Muted"]);
    }

    #[test]
    fn select_profile_failure_disconnects() {
        let server = StubServer::with_profiles(&["Default", "Muted"]);
        let mut c = client(&server);
        c.connect().unwrap();
        c.select_profile("Muted").unwrap();
        assert_eq!(server.loaded(), vec!["Muted"]);

        server.set_alive(false);
        assert!(c.select_profile("Default").is_err());
        assert!(!c.is_connected());
        assert!(matches!(c.select_profile("Default"), Err(LightingError::NotConnected)));
        assert_eq!(server.loaded(), vec!["Muted"]);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let server = StubServer::with_profiles(&["Default"]);
        let mut c = client(&server);
        c.disconnect();
        c.connect().unwrap();
        c.disconnect();
        c.disconnect();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.next_poll(), None);
    }
}
