//! Watch command implementation
//!
//! Wires a configuration source, rule listener and router chain together and
//! logs every reload until SIGINT or SIGTERM.

use crate::chain::RouterChain;
use crate::cli::endpoints::load_endpoints;
use crate::cli::WatchArgs;
use crate::condition::ClauseCompiler;
use crate::config::{CondgateConfig, SourceKind};
use crate::endpoint::{Pool, RequestContext};
use crate::listener::{attach, RuleChanged};
use crate::source::{ConfigSource, FileConfigSource, MemoryConfigSource};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &WatchArgs,
) -> Result<CondgateConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        CondgateConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        CondgateConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(ref application) = args.application {
        config.router.application = application.clone();
    }
    if let Some(ref dir) = args.rules_dir {
        config.source.dir = dir.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Running watch components.
pub struct Watch {
    pub chain: Arc<RouterChain>,
    handles: Vec<JoinHandle<()>>,
}

impl Watch {
    /// Wait for every background task to stop.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Watch task ended abnormally");
            }
        }
    }
}

/// Start source, listener and chain. Everything stops when `cancel_token`
/// is cancelled.
pub fn start_watch(
    config: &CondgateConfig,
    endpoints: Pool,
    cancel_token: CancellationToken,
) -> Result<Watch, Box<dyn std::error::Error>> {
    let mut handles = Vec::new();

    let source: Arc<dyn ConfigSource> = match config.source.kind {
        SourceKind::File => {
            let file = Arc::new(FileConfigSource::with_capacity(
                &config.source.dir,
                config.source.poll_interval(),
                config.notifications.capacity,
            ));
            handles.push(file.clone().start(cancel_token.clone()));
            file
        }
        SourceKind::Memory => {
            tracing::warn!("Memory source selected, the rule will not change");
            Arc::new(MemoryConfigSource::with_capacity(
                config.notifications.capacity,
            ))
        }
    };

    let attached = attach(
        source,
        &config.router.application,
        Arc::new(ClauseCompiler),
        config.notifications.capacity,
        cancel_token.clone(),
    )?;
    handles.push(attached.handle);

    let chain = Arc::new(RouterChain::new(
        attached.router,
        endpoints,
        RequestContext::new(),
    ));
    report(&chain);

    handles.push(
        chain
            .clone()
            .spawn_invalidation(attached.listener.subscribe(), cancel_token.clone()),
    );
    handles.push(spawn_reporter(
        chain.clone(),
        attached.listener.subscribe(),
        cancel_token,
    ));

    Ok(Watch { chain, handles })
}

/// Log the endpoints the chain currently selects.
fn report(chain: &RouterChain) {
    let router = chain.router();
    let snapshot = router.snapshot();
    match chain.route(&RequestContext::new()) {
        Ok(selected) => tracing::info!(
            key = %router.key(),
            version = snapshot.version(),
            installed_at = %snapshot.installed_at().to_rfc3339(),
            valid = snapshot.document().is_valid(),
            force = snapshot.is_force(),
            runtime = snapshot.is_runtime(),
            selected = ?selected.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            "Active routing rule"
        ),
        Err(e) => tracing::warn!(
            key = %router.key(),
            version = snapshot.version(),
            installed_at = %snapshot.installed_at().to_rfc3339(),
            error = %e,
            "Active routing rule rejects every endpoint"
        ),
    }
}

/// Report the chain's selection after every rule change. Plan invalidation
/// runs in the chain's own task.
fn spawn_reporter(
    chain: Arc<RouterChain>,
    mut changes: broadcast::Receiver<RuleChanged>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(_) | Err(RecvError::Lagged(_)) => report(&chain),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    })
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Main watch command handler
pub async fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    crate::logging::init_tracing(&config.logging)?;

    tracing::info!(
        application = %config.router.application,
        key = %config.router.rule_key(),
        source = ?config.source.kind,
        dir = %config.source.dir.display(),
        "Starting condgate watch"
    );
    tracing::debug!(?config, "Loaded configuration");

    let endpoints = match &args.endpoints {
        Some(path) => load_endpoints(path)?,
        None => Vec::new(),
    };

    let cancel_token = CancellationToken::new();
    let watch = start_watch(&config, endpoints, cancel_token.clone())?;

    shutdown_signal(cancel_token).await;
    watch.join().await;

    tracing::info!("condgate watch stopped");
    Ok(())
}
