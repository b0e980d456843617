// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Task engine and the actions it runs

mod analyze;
mod collect;
#[allow(clippy::module_inception)]
mod engine;
mod favicon;
mod html;
mod screenshot;
mod task;

pub use analyze::{
    collect_links, crawler_config, perform_analyze, AnalyzeContext, AnalyzeOptions,
    AnalyzeResult, Cookie, Head, HeadLink, HeadMeta, HeadScan, Link,
};
pub use collect::{perform_collect, CollectResult};
pub use engine::{perform_task, BrowserRunner, Engine, EngineConfig, TaskRunner};
pub use favicon::{fetch_favicon_hash, favicon_hash, murmur3_32, shodan_base64};
pub use html::{title_from_html, TITLE_SCAN_NODES};
pub use screenshot::{perform_screenshot, screenshot_file_name, ScreenshotResult};
pub use task::{
    Action, Delivery, Params, Payload, Task, TaskResult, PARAM_CLIPBOARD, PARAM_FAVICON_HASH,
    PARAM_FORMS, PARAM_MAX_FORM_SUBMITS, PARAM_WAIT,
};
