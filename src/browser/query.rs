// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Bounded page queries
//!
//! A query that runs past its wait budget found nothing. Only real errors
//! propagate.

use std::future::Future;
use std::time::Duration;

use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// Run `fut` under `wait`; expiry yields `T::default()`
pub async fn with_deadline<T, F>(wait: Duration, what: &str, fut: F) -> Result<T>
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(wait, fut).await {
        Ok(res) => res,
        Err(_) => {
            debug!("{} exceeded {}ms, treating as empty", what, wait.as_millis());
            Ok(T::default())
        }
    }
}

/// Evaluate an expression and deserialize its value
pub async fn evaluate<T: DeserializeOwned>(page: &Page, expression: &str) -> Result<T> {
    let result = page.evaluate(expression).await?;
    Ok(result.into_value()?)
}

/// Evaluate an expression, awaiting the promise it returns
pub async fn evaluate_promise<T: DeserializeOwned>(page: &Page, expression: &str) -> Result<T> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(Error::other)?;
    let result = page.evaluate_expression(params).await?;
    Ok(result.into_value()?)
}

/// Evaluate an expression under a wait budget
pub async fn evaluate_within<T>(page: &Page, wait: Duration, what: &str, expression: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    with_deadline(wait, what, evaluate(page, expression)).await
}
