// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Pisces - Phishing Site Analysis
//!
//! Drives a real Chrome over the DevTools protocol to capture what a
//! suspected phishing page does: the full network trace of every navigation,
//! the forms it presents and where they post, what it writes to the
//! clipboard when clicked, and which detection rules it trips.
//!
//! ## Features
//!
//! - Visit capture: redirect chain, TLS certificate, every asset with headers and body
//! - Form interaction: discovery, label resolution, scoring, fake fill and submit
//! - Clipboard probe: click-through with navigation locked, clipboard read after each click
//! - Page metadata: visible text, links, head tags, cookies, favicon hash
//! - Detection: Sigma-style YAML rules over the flattened result
//! - Engine: bounded worker pool with per-task browser contexts
//!
//! ## Example
//!
//! ```rust,no_run
//! use pisces::{Engine, EngineConfig, RuleSet, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rules = RuleSet::load_dir("rules")?;
//!     let engine = Engine::new(2, EngineConfig::default());
//!     let mut results = engine.results().expect("results stream");
//!     engine.start().await?;
//!
//!     engine.add(Task::new("analyze", "example.com").param("wait", 100)).await?;
//!     engine.shutdown().await;
//!
//!     while let Some(result) = results.recv().await {
//!         println!("{}", result.to_json()?);
//!         for hit in rules.evaluate(&result)?.iter().filter(|r| r.matched) {
//!             println!("matched {}", hit.rule_id);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod detection;
pub mod engine;
pub mod error;
pub mod network;

// Re-exports for convenience

// Engine
pub use engine::{BrowserRunner, Engine, EngineConfig, TaskRunner};

// Tasks and results
pub use engine::{Action, Delivery, Params, Payload, Task, TaskResult};
pub use engine::{AnalyzeResult, CollectResult, Cookie, Head, Link, ScreenshotResult};

// Browser
pub use browser::{BrowserSession, Crawler, CrawlerConfig, SessionConfig, SessionMode, Tab};

// Forms
pub use browser::{FixedFormData, Form, FormData, FormSubmission, Input, InputKind, RandomFormData};

// Network capture
pub use network::{Asset, CertificateInfo, Redirect, Visit};

// Detection
pub use detection::{flatten, Event, Rule, RuleResult, RuleSet};

// Errors
pub use error::{Error, ErrorContext, Result};

/// Pisces version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
