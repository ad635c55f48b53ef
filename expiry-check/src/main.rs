//! Expiry Check CLI Application
//!
//! A command-line interface for checking how many days remain before domain
//! registrations or TLS certificates expire, for a list of domains read one
//! per line. This CLI application is a thin layer over expiry-check-lib.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use expiry_check_lib::{
    build_probe, load_env_config, parse_timeout_string, validate_threads, ChannelReporter,
    CheckConfig, CheckMode, ConfigManager, EnvConfig, ExpiryCheckError, FileConfig, InputPolicy,
    WorkDispatcher,
};
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Domain list read when neither `--file`, `EC_FILE` nor a config file names one.
const DEFAULT_FILE: &str = "Default.conf";

/// CLI arguments for expiry-check
#[derive(Parser, Debug)]
#[command(name = "expiry-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check domain registration or TLS certificate expiry for a list of domains")]
#[command(
    long_about = "Check how many days remain before domain registrations (WHOIS) or TLS certificates expire.\n\nDomains are read one per line from a file (or '-' for stdin) and checked concurrently.\nReading stops at the first blank or invalid line unless --skip-invalid is given."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// File with domains to check, one per line ('-' reads stdin) [default: Default.conf]
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Input"
    )]
    pub file: Option<String>,

    /// Skip blank or invalid lines instead of stopping at the first one
    #[arg(long = "skip-invalid", help_heading = "Input")]
    pub skip_invalid: bool,

    /// Check TLS certificate expiry
    #[arg(short = 's', long = "ssl", help_heading = "Mode")]
    pub ssl: bool,

    /// Check domain registration expiry (WHOIS)
    #[arg(short = 'd', long = "domain", help_heading = "Mode")]
    pub domain: bool,

    /// Output one JSON object per result line
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Max concurrent checks (default: 1)
    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub threads: Option<usize>,

    /// TLS connect and handshake timeout, e.g. 5s, 1m (default: 5s)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Performance")]
    pub timeout: Option<String>,

    /// WHOIS query timeout, e.g. 10s (default: 10s)
    #[arg(
        long = "whois-timeout",
        value_name = "DURATION",
        help_heading = "Performance"
    )]
    pub whois_timeout: Option<String>,

    /// Port for certificate checks (default: 443)
    #[arg(long = "port", value_name = "PORT", help_heading = "Protocol")]
    pub port: Option<u16>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logging and per-check timings
    #[arg(long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging and a final summary
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything a run needs besides the mode.
#[derive(Debug, Clone)]
struct RunSettings {
    check: CheckConfig,
    file: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            check: CheckConfig::default(),
            file: DEFAULT_FILE.to_string(),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Mode and flag values are checked before any input is opened
    let mode = match validate_args(&args) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    init_logging(&args);

    if let Err(e) = run_expiry_check(args, mode).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Validate command line arguments and resolve the check mode.
fn validate_args(args: &Args) -> Result<CheckMode, String> {
    let mode = CheckMode::from_flags(args.ssl, args.domain).map_err(|e| e.to_string())?;

    if let Some(threads) = args.threads {
        validate_threads(threads).map_err(|e| e.to_string())?;
    }

    for (flag, value) in [
        ("--timeout", &args.timeout),
        ("--whois-timeout", &args.whois_timeout),
    ] {
        if let Some(value) = value {
            if parse_timeout_string(value).is_none() {
                return Err(format!(
                    "Invalid {} '{}'. Use format like '5s', '30s', '2m'",
                    flag, value
                ));
            }
        }
    }

    if args.port == Some(0) {
        return Err("Port must be between 1 and 65535".to_string());
    }

    Ok(mode)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the flags.
fn init_logging(args: &Args) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("expiry_check_lib={0},expiry_check={0}", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main expiry checking logic
async fn run_expiry_check(args: Args, mode: CheckMode) -> Result<(), Box<dyn std::error::Error>> {
    let env_config = load_env_config(args.verbose);
    let settings = build_config(&args, &env_config)?;
    debug!(?settings, %mode, "resolved configuration");

    let input = open_input(&settings.file).await?;

    let probe = build_probe(mode, &settings.check);
    let (reporter, mut results) = ChannelReporter::channel();
    let dispatcher = WorkDispatcher::new(probe, Arc::new(reporter), settings.check.threads)?
        .with_input_policy(settings.check.input_policy);

    if args.verbose && !args.json {
        ui::print_header(mode, settings.check.threads, &settings.file);
    }

    let start = Instant::now();
    let dispatch = tokio::spawn(dispatcher.run(input));

    let mut stats = ui::RunStats::default();
    while let Some(result) = results.recv().await {
        stats.record(&result);
        if args.json {
            println!("{}", ui::format_json(&result)?);
        } else {
            ui::print_result(&result, args.debug);
        }
    }

    let summary = dispatch
        .await
        .map_err(|e| ExpiryCheckError::internal(format!("dispatcher task failed: {}", e)))??;
    info!(
        scheduled = summary.scheduled,
        failed = stats.failed(),
        "run complete"
    );

    if args.verbose && !args.json {
        ui::print_summary(&stats, &summary, start.elapsed());
    }

    Ok(())
}

/// Open the domain list, or stdin for `-`.
async fn open_input(
    path: &str,
) -> Result<Box<dyn AsyncBufRead + Send + Unpin>, ExpiryCheckError> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(path).await.map_err(|e| {
        ExpiryCheckError::file_error(path, format!("Failed to open domain list: {}", e))
    })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Resolve settings: CLI flags > `EC_*` environment > config file > defaults.
fn build_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<RunSettings, Box<dyn std::error::Error>> {
    let mut settings = RunSettings::default();

    let config_manager = ConfigManager::new(args.verbose);

    // Step 1: explicit config file, or automatic discovery
    let explicit_path = args.config.as_ref().or(env_config.config.as_ref());
    if let Some(path) = explicit_path {
        info!(path = %path, "using explicit config file");
        let file_config = config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
        settings = merge_file_config(settings, file_config);
    } else {
        let file_config = config_manager.discover_and_load()?;
        settings = merge_file_config(settings, file_config);
    }

    // Step 2: environment variables (EC_*)
    settings = apply_environment_config(settings, env_config);

    // Step 3: CLI arguments (highest precedence)
    Ok(apply_cli_args(settings, args))
}

fn merge_file_config(mut settings: RunSettings, file_config: FileConfig) -> RunSettings {
    let Some(defaults) = file_config.defaults else {
        return settings;
    };

    if let Some(threads) = defaults.threads {
        settings.check = settings.check.with_threads(threads);
    }
    if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
        settings.check = settings.check.with_tls_timeout(timeout);
    }
    if let Some(timeout) = defaults
        .whois_timeout
        .as_deref()
        .and_then(parse_timeout_string)
    {
        settings.check = settings.check.with_whois_timeout(timeout);
    }
    if let Some(port) = defaults.port {
        settings.check = settings.check.with_port(port);
    }
    if let Some(skip) = defaults.skip_invalid {
        settings.check = settings.check.with_input_policy(input_policy(skip));
    }
    if let Some(file) = defaults.file {
        settings.file = file;
    }

    settings
}

fn apply_environment_config(mut settings: RunSettings, env_config: &EnvConfig) -> RunSettings {
    if let Some(threads) = env_config.threads {
        settings.check = settings.check.with_threads(threads);
    }
    if let Some(timeout) = env_config.timeout.as_deref().and_then(parse_timeout_string) {
        settings.check = settings.check.with_tls_timeout(timeout);
    }
    if let Some(timeout) = env_config
        .whois_timeout
        .as_deref()
        .and_then(parse_timeout_string)
    {
        settings.check = settings.check.with_whois_timeout(timeout);
    }
    if let Some(skip) = env_config.skip_invalid {
        settings.check = settings.check.with_input_policy(input_policy(skip));
    }
    if let Some(file) = &env_config.file {
        settings.file = file.clone();
    }

    settings
}

fn apply_cli_args(mut settings: RunSettings, args: &Args) -> RunSettings {
    if let Some(threads) = args.threads {
        settings.check = settings.check.with_threads(threads);
    }
    if let Some(timeout) = args.timeout.as_deref().and_then(parse_timeout_string) {
        settings.check = settings.check.with_tls_timeout(timeout);
    }
    if let Some(timeout) = args.whois_timeout.as_deref().and_then(parse_timeout_string) {
        settings.check = settings.check.with_whois_timeout(timeout);
    }
    if let Some(port) = args.port {
        settings.check = settings.check.with_port(port);
    }
    // only an explicit flag overrides; absence keeps env/config values
    if args.skip_invalid {
        settings.check = settings.check.with_input_policy(InputPolicy::SkipAnomalies);
    }
    if let Some(file) = &args.file {
        settings.file = file.clone();
    }

    settings
}

fn input_policy(skip_invalid: bool) -> InputPolicy {
    if skip_invalid {
        InputPolicy::SkipAnomalies
    } else {
        InputPolicy::StopOnFirstAnomaly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_test_args() -> Args {
        Args {
            file: None,
            skip_invalid: false,
            ssl: true,
            domain: false,
            json: false,
            threads: None,
            timeout: None,
            whois_timeout: None,
            port: None,
            config: None,
            debug: false,
            verbose: false,
        }
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_validate_args_mode() {
        let args = create_test_args();
        assert_eq!(validate_args(&args).unwrap(), CheckMode::Certificate);

        let args = Args {
            ssl: false,
            domain: true,
            ..create_test_args()
        };
        assert_eq!(validate_args(&args).unwrap(), CheckMode::Registration);

        let args = Args {
            ssl: false,
            ..create_test_args()
        };
        assert!(validate_args(&args).is_err());

        let args = Args {
            domain: true,
            ..create_test_args()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_values() {
        for args in [
            Args {
                threads: Some(0),
                ..create_test_args()
            },
            Args {
                timeout: Some("soon".to_string()),
                ..create_test_args()
            },
            Args {
                port: Some(0),
                ..create_test_args()
            },
        ] {
            assert!(validate_args(&args).is_err(), "{:?}", args);
        }

        let args = Args {
            threads: Some(150),
            ..create_test_args()
        };
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_defaults_without_overrides() {
        let file = config_file("");
        let args = Args {
            config: Some(file.path().to_string_lossy().into_owned()),
            ..create_test_args()
        };
        let settings = build_config(&args, &EnvConfig::default()).unwrap();

        assert_eq!(settings.file, "Default.conf");
        assert_eq!(settings.check.threads, 1);
        assert_eq!(settings.check.tls_timeout, Duration::from_secs(5));
        assert_eq!(settings.check.whois_timeout, Duration::from_secs(10));
        assert_eq!(settings.check.port, 443);
        assert_eq!(
            settings.check.input_policy,
            InputPolicy::StopOnFirstAnomaly
        );
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let file = config_file(
            "[defaults]\nthreads = 4\ntimeout = \"7s\"\nport = 8443\nfile = \"from-file.txt\"\n",
        );
        let env_config = EnvConfig {
            threads: Some(8),
            file: Some("from-env.txt".to_string()),
            skip_invalid: Some(true),
            ..Default::default()
        };

        let args = Args {
            config: Some(file.path().to_string_lossy().into_owned()),
            ..create_test_args()
        };
        let settings = build_config(&args, &env_config).unwrap();
        assert_eq!(settings.check.threads, 8);
        assert_eq!(settings.check.tls_timeout, Duration::from_secs(7));
        assert_eq!(settings.check.port, 8443);
        assert_eq!(settings.file, "from-env.txt");
        assert_eq!(settings.check.input_policy, InputPolicy::SkipAnomalies);

        let args = Args {
            threads: Some(16),
            file: Some("-".to_string()),
            port: Some(9443),
            ..args
        };
        let settings = build_config(&args, &env_config).unwrap();
        assert_eq!(settings.check.threads, 16);
        assert_eq!(settings.check.port, 9443);
        assert_eq!(settings.file, "-");
    }

    #[test]
    fn test_env_config_path_is_used() {
        let file = config_file("[defaults]\nwhois_timeout = \"30s\"\n");
        let env_config = EnvConfig {
            config: Some(file.path().to_string_lossy().into_owned()),
            ..Default::default()
        };
        let settings = build_config(&create_test_args(), &env_config).unwrap();
        assert_eq!(settings.check.whois_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_broken_explicit_config_is_fatal() {
        let file = config_file("[defaults]\nthreads = 0\n");
        let args = Args {
            config: Some(file.path().to_string_lossy().into_owned()),
            ..create_test_args()
        };
        assert!(build_config(&args, &EnvConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_open_missing_input_is_file_error() {
        let err = open_input("/definitely/not/here/Default.conf")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ExpiryCheckError::FileError { .. }));
    }
}
