// # cfsyncd - Cloudflare A record sync daemon
//
// This daemon is a thin integration layer. All sync logic lives in
// cfsync-core; this binary only:
//
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Wires the Cloudflare provider and the address endpoints together
// 4. Runs the reconciler until SIGTERM/SIGINT
//
// ## Configuration
//
// - `CLOUDFLARE_API_TOKEN`: API token (required)
// - `MONITORED_DOMAINS`: Comma-separated domains, wildcards allowed (required)
// - `CHECK_INTERVAL`: Seconds between checks (default 3600)
// - `DEBUG`: Any value but `0`/`false` reports full error chains
// - `CFSYNC_LOG_LEVEL`: trace, debug, info, warn, error
// - `CFSYNC_MODE`: `live` (default) or `dry-run`
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token
// export MONITORED_DOMAINS="example.com, *.example.com"
// export CHECK_INTERVAL=600
//
// cfsyncd
// ```

use anyhow::Result;
use cfsync_core::config::{DEFAULT_CHECK_INTERVAL_SECS, ReconcilerConfig, SyncConfig, format_interval};
use cfsync_core::{ErrorScope, MonitoredDomain, Reconciler, parse_domain_list};
use cfsync_provider_cloudflare::CloudflareProvider;
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CfsyncExitCode> for ExitCode {
    fn from(code: CfsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration, as read from the environment
struct Config {
    api_token: String,
    monitored_domains: String,
    check_interval_secs: u64,
    /// `CHECK_INTERVAL` value that was replaced by the default
    rejected_interval: Option<String>,
    debug: bool,
    log_level: String,
    dry_run: bool,
}

// Hides the API token
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"<REDACTED>")
            .field("monitored_domains", &self.monitored_domains)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("debug", &self.debug)
            .field("log_level", &self.log_level)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `get`, which returns a variable's value
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_token = get("CLOUDFLARE_API_TOKEN").unwrap_or_default();
        let monitored_domains = get("MONITORED_DOMAINS").ok_or_else(|| {
            anyhow::anyhow!(
                "MONITORED_DOMAINS is required. \
                Set it via: export MONITORED_DOMAINS=\"example.com, *.example.com\""
            )
        })?;

        let raw_interval = get("CHECK_INTERVAL");
        let check_interval_secs = parse_interval(raw_interval.as_deref());
        let rejected_interval = raw_interval.filter(|raw| {
            let raw = raw.trim();
            !raw.is_empty() && raw.parse::<u64>().ok() != Some(check_interval_secs)
        });

        let debug = parse_debug_flag(get("DEBUG").as_deref());
        let log_level = get("CFSYNC_LOG_LEVEL")
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| {
                let level = if debug { "debug" } else { "info" };
                level.to_string()
            });

        let dry_run = match get("CFSYNC_MODE").map(|m| m.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!(
                "CFSYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        Ok(Self {
            api_token,
            monitored_domains,
            check_interval_secs,
            rejected_interval,
            debug,
            log_level,
            dry_run,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            anyhow::bail!(
                "CLOUDFLARE_API_TOKEN is required. \
                Set it via: export CLOUDFLARE_API_TOKEN=your_token"
            );
        }

        if self.monitored_domains.split(',').all(|d| d.trim().is_empty()) {
            anyhow::bail!(
                "MONITORED_DOMAINS must contain at least one domain. \
                Set it via: export MONITORED_DOMAINS=\"example.com, *.example.com\""
            );
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "CFSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    /// Build the library configuration for the accepted domains
    fn to_sync_config(&self, domains: &[MonitoredDomain]) -> SyncConfig {
        let mut sync = SyncConfig::new(
            self.api_token.clone(),
            domains.iter().map(|d| d.name().to_string()).collect(),
        );
        sync.dry_run = self.dry_run;
        sync.reconciler = ReconcilerConfig {
            check_interval_secs: self.check_interval_secs,
            verbose: self.debug,
            ..ReconcilerConfig::default()
        };
        sync
    }
}

/// Parse `CHECK_INTERVAL`; missing, unparsable or zero gives the default
fn parse_interval(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS)
}

/// Parse `DEBUG`; any non-empty value other than `0`/`false` enables it
fn parse_debug_flag(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(value) => !value.eq_ignore_ascii_case("false"),
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return CfsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return CfsyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CfsyncExitCode::ConfigError.into();
    }

    info!("Starting cfsyncd v{}", env!("CARGO_PKG_VERSION"));
    if let Some(ref raw) = config.rejected_interval {
        warn!(
            "Invalid CHECK_INTERVAL '{}', using default of {}",
            raw,
            format_interval(DEFAULT_CHECK_INTERVAL_SECS)
        );
    }

    // Invalid entries are logged and skipped; only an empty result is fatal
    let list = parse_domain_list(&config.monitored_domains);
    if list.domains.is_empty() {
        error!("No valid domains to monitor, exiting");
        return CfsyncExitCode::ConfigError.into();
    }

    let sync_config = config.to_sync_config(&list.domains);
    if let Err(e) = sync_config.validate() {
        error!("Configuration validation error: {}", e);
        return CfsyncExitCode::ConfigError.into();
    }

    info!("Monitoring {} domain(s):", list.domains.len());
    for domain in &list.domains {
        info!("  - {}", domain);
    }
    info!(
        "Checking every {}",
        format_interval(sync_config.reconciler.check_interval_secs)
    );
    if config.debug {
        info!("Verbose error reporting enabled");
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CfsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(sync_config, list.domains).await {
            Ok(()) => CfsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

/// Startup failures from the library are configuration errors
fn exit_code_for(err: &anyhow::Error) -> CfsyncExitCode {
    match err.downcast_ref::<cfsync_core::Error>() {
        Some(e) if e.scope() == ErrorScope::Fatal => CfsyncExitCode::ConfigError,
        _ => CfsyncExitCode::RuntimeError,
    }
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: SyncConfig, domains: Vec<MonitoredDomain>) -> Result<()> {
    let provider = CloudflareProvider::from_config(&config)?;
    let addresses = cfsync_ip_http::default_chain(config.address_endpoints.as_slice());
    debug!(sources = ?addresses.source_names(), "Address discovery order");

    let (reconciler, mut events) =
        Reconciler::new(addresses, Box::new(provider), domains, &config.reconciler)?;

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Sync event");
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let signal_task = tokio::spawn(forward_shutdown(wait_for_shutdown(), shutdown_tx));

    let state = reconciler.run_with_shutdown(Some(shutdown_rx)).await?;

    // Closing the event channel ends the logger task
    drop(reconciler);
    let _ = event_task.await;
    signal_task.abort();

    match state.last_public_ip {
        Some(ip) => info!("Shutting down (last public IP: {})", ip),
        None => info!("Shutting down (public IP never resolved)"),
    }

    Ok(())
}

/// Fire `shutdown_tx` once `signal` reports a shutdown signal
///
/// If the handlers cannot be installed the daemon keeps running: the error
/// is logged and `shutdown_tx` is held without ever being sent or dropped.
async fn forward_shutdown<F>(signal: F, shutdown_tx: tokio::sync::oneshot::Sender<()>)
where
    F: std::future::Future<Output = Result<&'static str>>,
{
    match signal.await {
        Ok(signal) => {
            info!("Received shutdown signal: {}", signal);
            let _ = shutdown_tx.send(());
        }
        Err(e) => {
            error!("Signal handling failed, continuing without graceful shutdown: {:#}", e);
            let _held = shutdown_tx;
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// The name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_forward_shutdown_sends_on_signal() {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(forward_shutdown(async { Ok::<_, anyhow::Error>("SIGTERM") }, tx));

        let received = tokio::time::timeout(Duration::from_secs(1), rx).await;
        assert!(matches!(received, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_forward_shutdown_keeps_running_when_handlers_fail() {
        let (tx, mut rx) = oneshot::channel();
        let task = tokio::spawn(forward_shutdown(
            async { Err::<&'static str, _>(anyhow::anyhow!("Failed to setup SIGTERM handler")) },
            tx,
        ));

        // Neither sent nor dropped: the receiver stays pending
        let waited = tokio::time::timeout(Duration::from_millis(100), &mut rx).await;
        assert!(waited.is_err(), "shutdown must not fire: {:?}", waited);
        assert!(!task.is_finished());

        task.abort();
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval(None), 3600);
        assert_eq!(parse_interval(Some("600")), 600);
        assert_eq!(parse_interval(Some(" 90 ")), 90);
        assert_eq!(parse_interval(Some("0")), 3600);
        assert_eq!(parse_interval(Some("ten")), 3600);
        assert_eq!(parse_interval(Some("-5")), 3600);
    }

    #[test]
    fn test_parse_debug_flag() {
        assert!(!parse_debug_flag(None));
        assert!(!parse_debug_flag(Some("")));
        assert!(!parse_debug_flag(Some("0")));
        assert!(!parse_debug_flag(Some("FALSE")));
        assert!(parse_debug_flag(Some("1")));
        assert!(parse_debug_flag(Some("true")));
        assert!(parse_debug_flag(Some("yes")));
    }

    #[test]
    fn test_minimal_env() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "example.com"),
        ]))
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval_secs, 3600);
        assert_eq!(config.log_level, "info");
        assert!(!config.debug);
        assert!(!config.dry_run);
        assert!(config.rejected_interval.is_none());
    }

    #[test]
    fn test_missing_domains_is_error() {
        let result = Config::from_lookup(lookup(&[("CLOUDFLARE_API_TOKEN", "abc123")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_token_fails_validation() {
        let config = Config::from_lookup(lookup(&[("MONITORED_DOMAINS", "example.com")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_domain_list_fails_validation() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", " , ,"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_raises_default_log_level() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "example.com"),
            ("DEBUG", "1"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "debug");

        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "example.com"),
            ("DEBUG", "1"),
            ("CFSYNC_LOG_LEVEL", "WARN"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_log_level_fails_validation() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "example.com"),
            ("CFSYNC_LOG_LEVEL", "loud"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejected_interval_is_remembered() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "example.com"),
            ("CHECK_INTERVAL", "0"),
        ]))
        .unwrap();
        assert_eq!(config.check_interval_secs, 3600);
        assert_eq!(config.rejected_interval.as_deref(), Some("0"));
    }

    #[test]
    fn test_mode() {
        let base = [
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "example.com"),
        ];

        let mut vars = base.to_vec();
        vars.push(("CFSYNC_MODE", "Dry-Run"));
        assert!(Config::from_lookup(lookup(&vars)).unwrap().dry_run);

        let mut vars = base.to_vec();
        vars.push(("CFSYNC_MODE", "yolo"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_sync_config_from_accepted_domains() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "abc123"),
            ("MONITORED_DOMAINS", "Example.com, *.example.com, bad..name"),
            ("CHECK_INTERVAL", "120"),
            ("DEBUG", "true"),
        ]))
        .unwrap();

        let list = parse_domain_list(&config.monitored_domains);
        let sync = config.to_sync_config(&list.domains);

        assert_eq!(sync.domains, vec!["example.com", "*.example.com"]);
        assert_eq!(sync.reconciler.check_interval_secs, 120);
        assert!(sync.reconciler.verbose);
        assert!(sync.validate().is_ok());
    }

    #[test]
    fn test_exit_code_for_errors() {
        let fatal = anyhow::Error::new(cfsync_core::Error::config("bad token"));
        assert_eq!(exit_code_for(&fatal), CfsyncExitCode::ConfigError);

        let other = anyhow::anyhow!("runtime went away");
        assert_eq!(exit_code_for(&other), CfsyncExitCode::RuntimeError);
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = Config::from_lookup(lookup(&[
            ("CLOUDFLARE_API_TOKEN", "very-secret-token"),
            ("MONITORED_DOMAINS", "example.com"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("very-secret-token"));
    }
}
