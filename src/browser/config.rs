// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser session configuration and device profiles

use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome user agent
pub const CHROME_DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

/// Mobile Safari user agent, used for the `chrome` alias on mobile profiles
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_3_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.3.1 Mobile/15E148 Safari/604";

/// Viewport used when no device profile applies
pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 720);

/// Default DevTools port for remote sessions
pub const DEFAULT_REMOTE_PORT: u16 = 9222;

pub const PROFILE_DESKTOP: &str = "desktop";
pub const PROFILE_MOBILE: &str = "mobile";
pub const SIZE_LARGE: &str = "large";
pub const SIZE_MEDIUM: &str = "medium";
pub const SIZE_SMALL: &str = "small";

/// Check a device type name
pub fn is_valid_device_type(device_type: &str) -> bool {
    device_type == PROFILE_DESKTOP || device_type == PROFILE_MOBILE
}

/// Check a device size name
pub fn is_valid_device_size(device_size: &str) -> bool {
    device_size == SIZE_LARGE || device_size == SIZE_MEDIUM || device_size == SIZE_SMALL
}

/// Viewport dimensions for a device profile.
///
/// An empty type means desktop and an empty size means medium. Anything
/// unrecognised falls back to [`DEFAULT_VIEWPORT`].
pub fn dimensions(device_type: &str, device_size: &str) -> (u32, u32) {
    match (device_type, device_size) {
        (PROFILE_DESKTOP | "", SIZE_LARGE) => (1920, 1080),
        (PROFILE_DESKTOP | "", SIZE_MEDIUM | "") => (1536, 864),
        (PROFILE_DESKTOP | "", SIZE_SMALL) => (1280, 720),
        (PROFILE_MOBILE, SIZE_LARGE) => (430, 932),
        (PROFILE_MOBILE, SIZE_MEDIUM | "") => (390, 844),
        (PROFILE_MOBILE, SIZE_SMALL) => (375, 812),
        _ => DEFAULT_VIEWPORT,
    }
}

/// User agent for a device type and alias. `None` leaves the browser default.
pub fn user_agent(device_type: &str, alias: &str) -> Option<&'static str> {
    match (alias, device_type) {
        ("chrome" | "", PROFILE_DESKTOP | "") => Some(CHROME_DESKTOP_USER_AGENT),
        ("chrome" | "", PROFILE_MOBILE) => Some(MOBILE_USER_AGENT),
        _ => None,
    }
}

/// How the browser is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Launch a local Chrome process
    Local { headless: bool },
    /// Attach to an already running DevTools endpoint
    Remote { host: String, port: u16 },
}

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local or remote browser
    pub mode: SessionMode,
    /// Chrome executable override for local sessions
    pub executable: Option<PathBuf>,
    /// Disable the Chrome sandbox (containers)
    pub no_sandbox: bool,
    /// Timeout for launching or connecting
    pub launch_timeout: Duration,
    /// Timeout for individual protocol requests
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Local { headless: true },
            executable: None,
            no_sandbox: false,
            launch_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Create a new session config (local, headless)
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a remote DevTools endpoint
    pub fn remote(mut self, host: impl Into<String>, port: u16) -> Self {
        self.mode = SessionMode::Remote {
            host: host.into(),
            port,
        };
        self
    }

    /// Launch a local browser with a visible window
    pub fn headful(mut self, headful: bool) -> Self {
        self.mode = SessionMode::Local { headless: !headful };
        self
    }

    /// Set the Chrome executable
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Disable the Chrome sandbox
    pub fn no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.no_sandbox = no_sandbox;
        self
    }

    /// Set launch/connect timeout
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    /// Set protocol request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// DevTools version endpoint for remote sessions
    pub fn remote_url(&self) -> Option<String> {
        match &self.mode {
            SessionMode::Remote { host, port } => {
                if host.contains(':') && !host.starts_with('[') {
                    Some(format!("http://[{}]:{}/json/version", host, port))
                } else {
                    Some(format!("http://{}:{}/json/version", host, port))
                }
            }
            SessionMode::Local { .. } => None,
        }
    }

    /// Whether this session is launched locally
    pub fn is_local(&self) -> bool {
        matches!(self.mode, SessionMode::Local { .. })
    }
}
