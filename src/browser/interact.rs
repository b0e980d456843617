// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Live form discovery, filling and submission

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use tracing::{debug, info, warn};

use super::crawler::{Crawler, PageState};
use super::fake::FormData;
use super::form::{rank_forms, Form, FormSnapshot, FormSubmission, LiveHandle};
use super::query::{evaluate, evaluate_within};
use super::scripts::{xpath_exists_script, FORM_SNAPSHOT_SCRIPT, SUBMIT_FUNCTION};
use crate::error::{ErrorContext, Result};

/// Form interaction settings
#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Maximum number of forms to submit
    pub max_submits: usize,
    /// Pause before and after reading the post-submit location
    pub settle: Duration,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            max_submits: 1,
            settle: Duration::from_secs(2),
        }
    }
}

impl InteractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum submissions
    pub fn max_submits(mut self, max: usize) -> Self {
        self.max_submits = max;
        self
    }

    /// Set settle pause
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Discover every form on the page. Running past `wait` yields no forms.
pub async fn scan_forms(page: &Page, wait: Duration) -> Result<Vec<Form>> {
    let snapshot: FormSnapshot =
        evaluate_within(page, wait, "form scan", FORM_SNAPSHOT_SCRIPT).await?;
    Ok(snapshot.into_forms())
}

/// Check that a live handle still resolves
pub async fn element_exists(page: &Page, handle: &LiveHandle) -> Result<bool> {
    evaluate(page, &xpath_exists_script(handle.xpath())).await
}

async fn type_into(page: &Page, handle: &LiveHandle, value: &str) -> Result<()> {
    let element = page.find_xpath(handle.xpath()).await?;
    element.focus().await?;
    element.type_str(value).await?;
    Ok(())
}

/// Fill every input with a confident classification. Returns the handle of
/// the last input filled.
pub async fn fill_form(page: &Page, form: &Form, data: &dyn FormData) -> Option<LiveHandle> {
    let mut last = None;

    for input in form.inputs.iter().filter(|i| !i.is_hidden()) {
        let Some(value) = data.value_for(input.fill_kind()) else {
            debug!(form = %form, input = %input, kind = %input.input_type, "skipping input");
            continue;
        };

        if let Err(e) = type_into(page, input.handle(), &value).await {
            warn!(form = %form, input = %input, "complete form input error: {}", e);
        }
        last = Some(input.handle().clone());
    }

    last
}

/// Submit the form owning the element behind `handle`
pub async fn submit(page: &Page, handle: &LiveHandle) -> Result<()> {
    let element = page.find_xpath(handle.xpath()).await?;
    element.call_js_fn(SUBMIT_FUNCTION, false).await?;
    Ok(())
}

/// Fill and submit one form, then read where the page went.
///
/// Returns `None` when the form has no usable submit trigger.
pub async fn submit_form(
    page: &Page,
    form: &Form,
    data: &dyn FormData,
    settle: Duration,
) -> Result<Option<PageState>> {
    let last = fill_form(page, form, data).await;
    if last.is_none() {
        info!(form = %form, "form has no inputs to interact with");
    }

    let Some(trigger) = form.submit_trigger(last.as_ref()) else {
        debug!(form = %form, "no submit trigger, skipping form");
        return Ok(None);
    };

    submit(page, trigger).await?;
    tokio::time::sleep(settle).await;
    let location = page.url().await?.unwrap_or_default();
    tokio::time::sleep(settle).await;
    let body = page.content().await?;

    Ok(Some(PageState { location, body }))
}

/// Submit forms in score order, capturing a visit for each submission.
///
/// Every form after the first is preceded by a return to `origin`; a form
/// whose locator no longer resolves there is skipped. A failing submission
/// is logged and the next form is tried.
pub async fn run_form_interactions(
    crawler: &mut Crawler,
    forms: &[Form],
    origin: &str,
    data: Arc<dyn FormData>,
    config: &InteractionConfig,
) -> Result<Vec<FormSubmission>> {
    let mut submissions = Vec::new();
    if config.max_submits == 0 {
        return Ok(submissions);
    }

    let ranked = rank_forms(forms);
    debug!(forms = ranked.len(), "ranked forms for submission");

    for (index, form) in ranked.into_iter().enumerate() {
        if index > 0 {
            crawler.page().goto(origin).await.with_url(origin)?;

            match element_exists(crawler.page(), form.handle()).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(index, form = %form, "form not found on return visit");
                    continue;
                }
                Err(e) => {
                    warn!(index, form = %form, "form lookup on return visit failed: {}", e);
                    continue;
                }
            }
        }

        let owned = form.clone();
        let data = Arc::clone(&data);
        let settle = config.settle;
        let captured = crawler
            .capture(&form.action, move |page| async move {
                submit_form(&page, &owned, data.as_ref(), settle).await
            })
            .await;

        let visit = match captured {
            Ok(Some(visit)) => visit,
            Ok(None) => continue,
            Err(e) => {
                warn!(form = %form, "form submission error: {}", e);
                continue;
            }
        };

        info!(form = %form, method = %form.method, location = %visit.location, "form submitted");
        submissions.push(FormSubmission {
            method: form.method.clone(),
            visit,
        });

        if submissions.len() >= config.max_submits {
            break;
        }
    }

    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_defaults() {
        let config = InteractionConfig::default();
        assert_eq!(config.max_submits, 1);
        assert_eq!(config.settle, Duration::from_secs(2));

        let config = InteractionConfig::new()
            .max_submits(3)
            .settle(Duration::from_millis(10));
        assert_eq!(config.max_submits, 3);
        assert_eq!(config.settle, Duration::from_millis(10));
    }
}
