//! In-memory lighting server for unit and integration tests.
//!
//! [`StubServer`] clones share state: hand a [`StubConnector`] to the client
//! and keep the server to script failures and inspect loaded profiles.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{LightingError, LightingLink, LinkConnector, Result};

#[derive(Debug)]
struct Inner {
    profiles: Vec<String>,
    alive: bool,
    timeout: bool,
    loaded: Vec<String>,
    polls: usize,
    connect_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct StubServer {
    inner: Rc<RefCell<Inner>>,
}

impl StubServer {
    pub fn with_profiles(profiles: &[&str]) -> Self {
        StubServer {
            inner: Rc::new(RefCell::new(Inner {
                profiles: profiles.iter().map(|p| p.to_string()).collect(),
                alive: true,
                timeout: false,
                loaded: Vec::new(),
                polls: 0,
                connect_attempts: 0,
            })),
        }
    }

    pub fn connector(&self) -> StubConnector {
        StubConnector {
            inner: Rc::clone(&self.inner),
        }
    }

    /// A dead server refuses connects and fails every request on open links.
    pub fn set_alive(&self, alive: bool) {
        self.inner.borrow_mut().alive = alive;
    }

    /// Make connect attempts time out.
    pub fn set_timeout(&self, timeout: bool) {
        self.inner.borrow_mut().timeout = timeout;
    }

    /// Profiles loaded so far, in order.
    pub fn loaded(&self) -> Vec<String> {
        self.inner.borrow().loaded.clone()
    }

    pub fn polls(&self) -> usize {
        self.inner.borrow().polls
    }

    pub fn connect_attempts(&self) -> usize {
        self.inner.borrow().connect_attempts
    }
}

pub struct StubConnector {
    inner: Rc<RefCell<Inner>>,
}

impl LinkConnector for StubConnector {
    fn connect(&self, _timeout: Duration) -> Result<Box<dyn LightingLink>> {
        let mut inner = self.inner.borrow_mut();
        inner.connect_attempts += 1;
        if inner.timeout {
            return Err(LightingError::Timeout);
        }
        if !inner.alive {
            return Err(LightingError::Unavailable("connection refused".into()));
        }
        Ok(Box::new(StubLink {
            inner: Rc::clone(&self.inner),
        }))
    }

    fn describe(&self) -> String {
        "stub".into()
    }
}

struct StubLink {
    inner: Rc<RefCell<Inner>>,
}

impl StubLink {
    fn check_alive(&self) -> Result<()> {
        if self.inner.borrow().alive {
            Ok(())
        } else {
            Err(LightingError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "stub server gone",
            )))
        }
    }
}

impl LightingLink for StubLink {
    fn controller_count(&mut self) -> Result<u32> {
        self.check_alive()?;
        self.inner.borrow_mut().polls += 1;
        Ok(1)
    }

    fn profiles(&mut self) -> Result<Vec<String>> {
        self.check_alive()?;
        Ok(self.inner.borrow().profiles.clone())
    }

    fn load_profile(&mut self, name: &str) -> Result<()> {
        self.check_alive()?;
        self.inner.borrow_mut().loaded.push(name.to_string());
        Ok(())
    }
}
