// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser control
//!
//! Session management, navigation capture and in-page interaction over the
//! Chrome DevTools Protocol.

mod clipboard;
mod config;
mod crawler;
mod fake;
mod form;
mod interact;
pub mod query;
pub mod scripts;
mod session;

pub use clipboard::{origin_of, probe_clipboard, ClipboardCapture};
pub use config::{
    dimensions, is_valid_device_size, is_valid_device_type, user_agent, SessionConfig,
    SessionMode, CHROME_DESKTOP_USER_AGENT, DEFAULT_REMOTE_PORT, DEFAULT_VIEWPORT,
    MOBILE_USER_AGENT, PROFILE_DESKTOP, PROFILE_MOBILE, SIZE_LARGE, SIZE_MEDIUM, SIZE_SMALL,
};
pub use crawler::{Crawler, CrawlerConfig, PageState};
pub use fake::{FixedFormData, FormData, RandomFormData};
pub use form::{
    rank_forms, Form, FormSnapshot, FormSubmission, Input, InputKind, LabelIndex, LiveHandle,
    RawForm, RawInput, RawLabel, INPUT_HIDDEN,
};
pub use interact::{
    element_exists, fill_form, run_form_interactions, scan_forms, submit, submit_form,
    InteractionConfig,
};
pub use session::{discover_websocket_url, BrowserSession, SessionStats, Tab};
