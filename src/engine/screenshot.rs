// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Viewport screenshots

use base64::Engine as _;
use bytes::Bytes;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use serde::{Serialize, Serializer};
use tracing::debug;

use super::task::Task;
use crate::browser::Tab;
use crate::error::{ErrorContext, Result};

/// PNG image of the rendered viewport
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScreenshotResult {
    #[serde(serialize_with = "serialize_base64")]
    pub buffer: Bytes,
}

impl ScreenshotResult {
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// File stem for a screenshot of `url`: host and path with path and
/// filename-hostile characters replaced by `_`
pub fn screenshot_file_name(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let combined = format!("{}{}", host, parsed.path());
    let safe: String = combined
        .trim_matches('/')
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
            c => c,
        })
        .collect();

    if safe.is_empty() {
        Ok("index".to_string())
    } else {
        Ok(safe)
    }
}

fn serialize_base64<S: Serializer>(buffer: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(buffer))
}

/// Load the task URL and capture the viewport as PNG
pub async fn perform_screenshot(tab: &Tab, task: &Task) -> Result<ScreenshotResult> {
    let (width, height) = task.dimensions();
    tab.execute(SetDeviceMetricsOverrideParams::new(
        i64::from(width),
        i64::from(height),
        1.0,
        false,
    ))
    .await?;
    if !task.user_agent_str().is_empty() {
        tab.set_user_agent(task.user_agent_str()).await?;
    }

    tab.goto(task.url()).await.with_url(task.url())?;

    let png = tab
        .screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
        )
        .await?;
    debug!(url = task.url(), size = png.len(), "screenshot captured");

    Ok(ScreenshotResult {
        buffer: Bytes::from(png),
    })
}
