// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Pisces CLI - Phishing Site Analysis
//!
//! Runs analyze, collect or screenshot tasks against a list of URLs and
//! streams the results.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pisces::browser::{
    is_valid_device_size, is_valid_device_type, DEFAULT_REMOTE_PORT, PROFILE_DESKTOP, SIZE_LARGE,
};
use pisces::engine::{screenshot_file_name, PARAM_FAVICON_HASH, PARAM_WAIT};
use pisces::{Action, Engine, EngineConfig, Payload, RuleSet, Task, TaskResult};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let action = match args[1].as_str() {
        "--help" | "-h" | "help" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        "--version" | "-v" | "version" => {
            println!("pisces {}", pisces::VERSION);
            return ExitCode::SUCCESS;
        }
        cmd => match cmd.parse::<Action>() {
            Ok(action) => action,
            Err(_) => {
                eprintln!("Unknown command: {}", cmd);
                print_usage();
                return ExitCode::from(1);
            }
        },
    };

    let options = match CliOptions::parse(&args[2..]) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: pisces {} [OPTIONS] <url>...", action);
            return ExitCode::from(1);
        }
    };

    init_logging(options.debug);

    match run(action, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "pisces=debug" } else { "pisces=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn print_usage() {
    println!(
        r#"Pisces - Phishing Site Analysis

USAGE:
    pisces <COMMAND> [OPTIONS] <url>...

COMMANDS:
    analyze         Capture the visit, forms, clipboard and page metadata
    collect         Capture the visit and its assets
    screenshot      Save a PNG of each page
    help            Show this help message
    version         Show version information

OPTIONS:
    --remote <host:port>    Use a running Chrome instead of launching one
    --headful               Launch Chrome with a visible window
    --concurrency <N>       Tasks processed in parallel [default: 1]
    --wait <MS>             Per-query wait budget in milliseconds
    --device-type <TYPE>    desktop or mobile [default: desktop]
    --device-size <SIZE>    small, medium or large [default: large]
    --user-agent <ALIAS>    User agent alias [default: chrome]
    --favicon-hash          Fetch and hash the favicon (analyze)
    --rules-dir <DIR>       Detection rules [default: rules]
    --output-dir <DIR>      Screenshot directory [default: screenshots]
    --debug                 Debug logging

Results are written to stdout as one JSON object per line. Logs go to
stderr and honour RUST_LOG.

EXAMPLES:
    pisces analyze https://login.example.com --wait 200
    pisces collect example.com example.org --concurrency 2
    pisces screenshot example.com --device-type mobile --output-dir shots
    pisces analyze example.com --remote 127.0.0.1:9222
"#
    );
}

/// Parsed command-line options
#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    urls: Vec<String>,
    remote: Option<(String, u16)>,
    headful: bool,
    concurrency: usize,
    wait: Option<u64>,
    device_type: String,
    device_size: String,
    user_agent: String,
    favicon_hash: bool,
    rules_dir: PathBuf,
    output_dir: PathBuf,
    debug: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            remote: None,
            headful: false,
            concurrency: 1,
            wait: None,
            device_type: PROFILE_DESKTOP.to_string(),
            device_size: SIZE_LARGE.to_string(),
            user_agent: "chrome".to_string(),
            favicon_hash: false,
            rules_dir: PathBuf::from("rules"),
            output_dir: PathBuf::from("screenshots"),
            debug: false,
        }
    }
}

impl CliOptions {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut options = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("Missing value for {}", name))
            };

            match arg.as_str() {
                "--remote" => options.remote = Some(parse_remote(&value("--remote")?)?),
                "--headful" => options.headful = true,
                "--concurrency" => {
                    options.concurrency = value("--concurrency")?
                        .parse()
                        .map_err(|_| "Invalid --concurrency".to_string())?
                }
                "--wait" => {
                    options.wait = Some(
                        value("--wait")?
                            .parse()
                            .map_err(|_| "Invalid --wait".to_string())?,
                    )
                }
                "--device-type" => {
                    let v = value("--device-type")?;
                    if !is_valid_device_type(&v) {
                        return Err(format!("Invalid device type: {}", v));
                    }
                    options.device_type = v;
                }
                "--device-size" => {
                    let v = value("--device-size")?;
                    if !is_valid_device_size(&v) {
                        return Err(format!("Invalid device size: {}", v));
                    }
                    options.device_size = v;
                }
                "--user-agent" => options.user_agent = value("--user-agent")?,
                "--favicon-hash" => options.favicon_hash = true,
                "--rules-dir" => options.rules_dir = PathBuf::from(value("--rules-dir")?),
                "--output-dir" => options.output_dir = PathBuf::from(value("--output-dir")?),
                "--debug" => options.debug = true,
                flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
                url => options.urls.push(url.to_string()),
            }
        }

        if options.urls.is_empty() {
            return Err("No URLs given".to_string());
        }
        Ok(options)
    }

    fn task(&self, action: Action, url: &str) -> Task {
        let mut task = Task::new(action.as_str(), url)
            .device(&self.device_type, &self.device_size)
            .user_agent_alias(&self.device_type, &self.user_agent);
        if let Some(wait) = self.wait {
            task = task.param(PARAM_WAIT, wait);
        }
        if self.favicon_hash {
            task = task.param(PARAM_FAVICON_HASH, true);
        }
        task
    }
}

fn parse_remote(value: &str) -> Result<(String, u16), String> {
    let parse_port = |port: &str| {
        port.parse()
            .map_err(|_| format!("Invalid remote port: {}", port))
    };

    // [v6]:port or a bare [v6]
    if let Some(rest) = value.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("Invalid remote address: {}", value))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), parse_port(port)?)),
            None if tail.is_empty() => Ok((host.to_string(), DEFAULT_REMOTE_PORT)),
            None => Err(format!("Invalid remote address: {}", value)),
        };
    }

    match value.rsplit_once(':') {
        // An unbracketed v6 address carries no port
        Some(_) if value.matches(':').count() > 1 => Ok((value.to_string(), DEFAULT_REMOTE_PORT)),
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((value.to_string(), DEFAULT_REMOTE_PORT)),
    }
}

async fn run(action: Action, options: CliOptions) -> anyhow::Result<()> {
    let rules = match action {
        Action::Screenshot => RuleSet::default(),
        _ => RuleSet::load_dir(&options.rules_dir).context("failed to load rules")?,
    };

    let mut config = EngineConfig::new().headful(options.headful);
    if let Some((host, port)) = &options.remote {
        config = config.remote(host.clone(), *port);
    }

    let engine = Arc::new(Engine::new(options.concurrency, config));
    let mut results = engine
        .results()
        .context("results stream already taken")?;
    engine.start().await.context("failed to start engine")?;

    let tasks: Vec<Task> = options.urls.iter().map(|url| options.task(action, url)).collect();
    info!(count = tasks.len(), action = %action, "submitting tasks");

    let feeder = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for task in tasks {
                if let Err(e) = engine.add(task).await {
                    warn!("failed to queue task: {}", e);
                    break;
                }
            }
            engine.shutdown().await;
        })
    };

    match action {
        Action::Screenshot => write_screenshots(&mut results, &options.output_dir).await?,
        _ => write_results(&mut results, &rules).await?,
    }

    feeder.await.context("task feeder failed")?;
    Ok(())
}

async fn write_results(
    results: &mut UnboundedReceiver<TaskResult>,
    rules: &RuleSet,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();

    while let Some(result) = results.recv().await {
        if let Some(e) = &result.error {
            warn!(url = %result.url, "task failed: {}", e);
            continue;
        }

        if let Err(e) = rules.evaluate(&result) {
            warn!(url = %result.url, "rule evaluation failed: {}", e);
        }

        let line = result.to_json()?;
        let mut out = stdout.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
    }
    Ok(())
}

async fn write_screenshots(
    results: &mut UnboundedReceiver<TaskResult>,
    output_dir: &Path,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    while let Some(result) = results.recv().await {
        if let Some(e) = &result.error {
            warn!(url = %result.url, "task failed: {}", e);
            continue;
        }

        let Some(Payload::Screenshot(shot)) = &result.result else {
            bail!("unexpected result for screenshot task: {}", result.url);
        };

        let path = output_dir.join(format!("{}.png", screenshot_file_name(&result.url)?));
        tokio::fs::write(&path, &shot.buffer)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(url = %result.url, file = %path.display(), elapsed = ?result.elapsed, "screenshot saved");
    }
    Ok(())
}
