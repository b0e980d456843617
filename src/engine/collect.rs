// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plain capture of a page load

use serde::Serialize;

use super::analyze::crawler_config;
use super::task::Task;
use crate::browser::{Crawler, Tab};
use crate::error::Result;
use crate::network::Visit;

/// A visit plus size summaries
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectResult {
    #[serde(flatten)]
    pub visit: Visit,
    pub assets_count: usize,
    pub body_size: usize,
    pub initial_body_size: usize,
}

impl From<Visit> for CollectResult {
    fn from(visit: Visit) -> Self {
        Self {
            assets_count: visit.assets.len(),
            body_size: visit.body.len(),
            initial_body_size: visit.initial_body.len(),
            visit,
        }
    }
}

/// Visit the task URL in `tab` and summarize what loaded
pub async fn perform_collect(tab: &Tab, task: &Task) -> Result<CollectResult> {
    let mut crawler = Crawler::new(tab.page().clone(), crawler_config(task));
    let visit = crawler.visit(task.url()).await?;
    Ok(CollectResult::from(visit))
}
