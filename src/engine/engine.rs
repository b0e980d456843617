// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Task engine
//!
//! A fixed pool of workers pulls tasks from a bounded queue, runs them and
//! publishes each result either to the shared results stream or to the
//! task's own reply channel.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use super::analyze::{perform_analyze, AnalyzeContext};
use super::collect::perform_collect;
use super::screenshot::perform_screenshot;
use super::task::{Action, Delivery, Payload, Task, TaskResult};
use crate::browser::{BrowserSession, FormData, InteractionConfig, RandomFormData, SessionConfig, Tab};
use crate::error::{Error, Result};

/// Runs a single parsed action
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Execute `action` for `task`
    async fn run(&self, action: Action, task: &Task) -> Result<Payload>;

    /// Release resources once every worker has stopped
    async fn close(&self) {}
}

/// Engine configuration
#[derive(Clone)]
pub struct EngineConfig {
    /// Browser session settings
    pub session: SessionConfig,
    /// Synthetic values for form filling
    pub form_data: Arc<dyn FormData>,
    /// Form submission settings
    pub interaction: InteractionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            form_data: Arc::new(RandomFormData::new()),
            interaction: InteractionConfig::default(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("session", &self.session)
            .field("interaction", &self.interaction)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a remote browser at `host:port`
    pub fn remote(mut self, host: impl Into<String>, port: u16) -> Self {
        self.session = self.session.remote(host, port);
        self
    }

    /// Launch the local browser with a visible window
    pub fn headful(mut self, headful: bool) -> Self {
        self.session = self.session.headful(headful);
        self
    }

    /// Replace the session configuration
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the form data source
    pub fn form_data(mut self, form_data: Arc<dyn FormData>) -> Self {
        self.form_data = form_data;
        self
    }

    /// Set form interaction settings
    pub fn interaction(mut self, interaction: InteractionConfig) -> Self {
        self.interaction = interaction;
        self
    }

    /// DevTools version endpoint when attached to a remote browser
    pub fn remote_url(&self) -> Option<String> {
        self.session.remote_url()
    }
}

/// Runs tasks against a shared browser session, one isolated tab per task
pub struct BrowserRunner {
    session: BrowserSession,
    context: AnalyzeContext,
}

impl BrowserRunner {
    /// Start the browser session
    pub async fn start(config: &EngineConfig) -> Result<Self> {
        let session = BrowserSession::start(config.session.clone()).await?;
        Ok(Self {
            session,
            context: AnalyzeContext {
                form_data: Arc::clone(&config.form_data),
                http: reqwest::Client::new(),
                interaction: config.interaction.clone(),
            },
        })
    }

    async fn dispatch(&self, action: Action, tab: &Tab, task: &Task) -> Result<Payload> {
        Ok(match action {
            Action::Analyze => Payload::Analyze(Box::new(perform_analyze(tab, task, &self.context).await?)),
            Action::Collect => Payload::Collect(Box::new(perform_collect(tab, task).await?)),
            Action::Screenshot => Payload::Screenshot(perform_screenshot(tab, task).await?),
        })
    }
}

#[async_trait]
impl TaskRunner for BrowserRunner {
    async fn run(&self, action: Action, task: &Task) -> Result<Payload> {
        let cancel = self.session.child_token();
        let tab = self.session.new_tab().await?;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Error::EngineClosed),
            res = self.dispatch(action, &tab, task) => res,
        };

        self.session.close_tab(tab).await;
        outcome
    }

    async fn close(&self) {
        self.session.close().await;
    }
}

/// Parse the action and run it. Never fails: errors become error results.
pub async fn perform_task(runner: &dyn TaskRunner, task: &Task) -> TaskResult {
    let action = match task.action().parse::<Action>() {
        Ok(action) => action,
        Err(e) => {
            warn!("{}", e);
            return TaskResult::failure(task, e);
        }
    };

    match runner.run(action, task).await {
        Ok(payload) => {
            let result = TaskResult::success(task, payload);
            info!(elapsed_ms = result.elapsed.as_millis() as u64, "task complete");
            result
        }
        Err(e) => {
            warn!("task failed: {}", e);
            TaskResult::failure(task, e)
        }
    }
}

/// Worker pool over a bounded task queue
pub struct Engine {
    concurrency: usize,
    config: EngineConfig,
    runner: Mutex<Option<Arc<dyn TaskRunner>>>,
    tasks_tx: Mutex<Option<mpsc::Sender<Task>>>,
    tasks_rx: Mutex<Option<mpsc::Receiver<Task>>>,
    results_tx: Mutex<Option<mpsc::UnboundedSender<TaskResult>>>,
    results_rx: Mutex<Option<mpsc::UnboundedReceiver<TaskResult>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Create an engine that will drive a browser session. Concurrency below
    /// 1 is raised to 1.
    pub fn new(concurrency: usize, config: EngineConfig) -> Self {
        let concurrency = concurrency.max(1);
        let (tasks_tx, tasks_rx) = mpsc::channel(concurrency);
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        Self {
            concurrency,
            config,
            runner: Mutex::new(None),
            tasks_tx: Mutex::new(Some(tasks_tx)),
            tasks_rx: Mutex::new(Some(tasks_rx)),
            results_tx: Mutex::new(Some(results_tx)),
            results_rx: Mutex::new(Some(results_rx)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Create an engine around an existing runner
    pub fn with_runner(concurrency: usize, runner: Arc<dyn TaskRunner>) -> Self {
        let engine = Self::new(concurrency, EngineConfig::default());
        *engine.runner.lock() = Some(runner);
        engine
    }

    /// Number of workers
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the browser session (unless a runner was supplied) and spawn
    /// the workers. No worker is spawned when the session fails to start.
    pub async fn start(&self) -> Result<()> {
        let existing = self.runner.lock().clone();
        let runner: Arc<dyn TaskRunner> = match existing {
            Some(runner) => runner,
            None => {
                let runner: Arc<dyn TaskRunner> = Arc::new(BrowserRunner::start(&self.config).await?);
                *self.runner.lock() = Some(Arc::clone(&runner));
                runner
            }
        };

        let tasks_rx = self
            .tasks_rx
            .lock()
            .take()
            .ok_or_else(|| Error::other("engine already started"))?;
        let results_tx = self
            .results_tx
            .lock()
            .clone()
            .ok_or(Error::EngineClosed)?;

        let queue = Arc::new(tokio::sync::Mutex::new(tasks_rx));
        let mut workers = self.workers.lock();
        for id in 0..self.concurrency {
            workers.push(tokio::spawn(worker(
                id,
                Arc::clone(&queue),
                Arc::clone(&runner),
                results_tx.clone(),
            )));
        }

        info!(concurrency = self.concurrency, "engine started");
        Ok(())
    }

    /// Queue a task, waiting while the queue is full
    pub async fn add(&self, task: Task) -> Result<()> {
        let sender = self.tasks_tx.lock().clone().ok_or(Error::EngineClosed)?;
        sender.send(task).await.map_err(|_| Error::EngineClosed)
    }

    /// Take the shared results stream. Only the first call gets it.
    pub fn results(&self) -> Option<mpsc::UnboundedReceiver<TaskResult>> {
        self.results_rx.lock().take()
    }

    /// Stop accepting tasks, wait for queued work to finish, release the
    /// browser, then end the results stream.
    pub async fn shutdown(&self) {
        self.tasks_tx.lock().take();

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!("task worker panicked: {}", e);
            }
        }

        let runner = self.runner.lock().take();
        if let Some(runner) = runner {
            runner.close().await;
        }

        self.results_tx.lock().take();
        info!("engine shut down");
    }
}

async fn worker(
    id: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    runner: Arc<dyn TaskRunner>,
    results: mpsc::UnboundedSender<TaskResult>,
) {
    debug!("task worker #{} started", id);

    loop {
        let next = queue.lock().await.recv().await;
        let Some(mut task) = next else {
            break;
        };

        let delivery = task.take_delivery();
        let span = info_span!("task", id = %task.id(), action = task.action(), url = task.url());
        let result = perform_task(runner.as_ref(), &task).instrument(span).await;

        match delivery {
            Delivery::Shared => {
                if results.send(result).is_err() {
                    debug!("results stream closed, dropping result");
                }
            }
            Delivery::Reply(reply) => {
                if reply.send(result).is_err() {
                    debug!("reply receiver dropped, discarding result");
                }
            }
        }
    }

    debug!("task worker #{} stopped", id);
}
