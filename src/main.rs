use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use openair::config::{AppConfig, JsonFileStore, SELECTION_FILE};
use openair::core::{AccessorySelection, MetricStore, PollLoop, PollOptions};
use openair::sources::{SimulatedSource, SimulatedSourceConfig};
use openair::ui::{run_dashboard, DashboardOptions};
use openair_core::{
    MemoryStore, MetricKind, SensorSource, SettingsStore, SharedSensorSource, TemperatureUnit,
    ThresholdClassifier,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

/// openair - Air-quality dashboard for home-automation sensors
#[derive(Parser, Debug, Clone)]
#[command(name = "openair")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Poll interval in seconds (overrides the config file)
    #[arg(short = 'i', long = "interval", value_name = "SECS")]
    interval: Option<u64>,

    /// Show temperatures in Celsius
    #[arg(long = "celsius")]
    celsius: bool,

    /// Hide a metric (co2, pm2_5, voc, no2, temperature, humidity); repeatable
    #[arg(long = "hide", value_name = "METRIC")]
    hide: Vec<MetricKind>,

    /// Home to select by id
    #[arg(long = "home", value_name = "ID")]
    home: Option<String>,

    /// Accessory to select by id
    #[arg(long = "accessory", value_name = "ID")]
    accessory: Option<String>,

    /// Exit after this many panel renders
    #[arg(short = 'n', long = "ticks", value_name = "N")]
    ticks: Option<u64>,

    /// Probability (0.0 - 1.0) that a simulated read fails
    #[arg(long = "failure-rate", value_name = "RATE", default_value = "0.0")]
    failure_rate: f64,

    /// Keep the selection in memory only
    #[arg(long = "no-persist")]
    no_persist: bool,

    /// Config file to load instead of the default location
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// List homes and accessories, then exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Level 0 (default): warn only
    // Level 1: info
    // Level 2: debug
    // Level 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Starting openair v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    if !(0.0..=1.0).contains(&cli.failure_rate) {
        bail!("--failure-rate must be between 0.0 and 1.0");
    }
    let simulated = Arc::new(SimulatedSource::new(SimulatedSourceConfig {
        failure_rate: cli.failure_rate,
        ..SimulatedSourceConfig::default()
    }));

    if cli.list {
        list_homes(simulated.as_ref());
        return Ok(());
    }

    let source: SharedSensorSource = simulated;
    let settings = open_settings(cli.no_persist)?;

    let store = Arc::new(MetricStore::with_hidden(&config.display.hidden_metrics));
    let selection = AccessorySelection::new(Arc::clone(&source), settings);
    selection.attach();

    let poll_loop = PollLoop::new(
        Arc::clone(&source),
        Arc::clone(&selection),
        Arc::clone(&store),
        ThresholdClassifier::new(config.thresholds.clone()),
        PollOptions {
            read_timeout: config.poll.read_timeout(),
            temperature_unit: config.display.temperature_unit,
        },
    );
    poll_loop.attach();

    apply_selection(&cli, source.as_ref(), &selection)?;

    poll_loop
        .start(config.poll.interval())
        .context("starting poll loop")?;
    info!("Polling every {:?}", config.poll.interval());

    let options = DashboardOptions {
        max_renders: cli.ticks,
        colored: std::io::stdout().is_terminal(),
        refresh: config.poll.interval(),
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Interrupted");
    };
    let renders = run_dashboard(
        &poll_loop,
        &selection,
        &store,
        &options,
        &mut std::io::stdout(),
        shutdown,
    )
    .await;

    poll_loop.stop();
    debug!("Rendered {} times", renders?);
    Ok(())
}

/// Load the config file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {:#}", e);
            AppConfig::default()
        }),
    };

    if let Some(interval) = cli.interval {
        config.poll.interval_secs = interval;
    }
    if cli.celsius {
        config.display.temperature_unit = TemperatureUnit::Celsius;
    }
    for kind in &cli.hide {
        if !config.display.hidden_metrics.contains(kind) {
            config.display.hidden_metrics.push(*kind);
        }
    }

    config.validate()?;
    Ok(config)
}

fn open_settings(no_persist: bool) -> Result<Arc<dyn SettingsStore>> {
    if no_persist {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = AppConfig::config_dir()?.join(SELECTION_FILE);
    Ok(Arc::new(JsonFileStore::open(path)))
}

/// Select from the command line, or bring back the persisted selection
fn apply_selection(
    cli: &Cli,
    source: &dyn SensorSource,
    selection: &AccessorySelection,
) -> Result<()> {
    // An accessory alone is enough; look up the home it lives in
    let home = cli.home.clone().or_else(|| {
        let accessory_id = cli.accessory.as_deref()?;
        source
            .list_homes()
            .into_iter()
            .find(|home| source.find_accessory(&home.id, accessory_id).is_some())
            .map(|home| home.id)
    });

    match (home, &cli.accessory) {
        (Some(home_id), accessory) => {
            selection.select_home(&home_id)?;
            if let Some(accessory_id) = accessory {
                selection.select_accessory(accessory_id)?;
            }
        }
        (None, Some(accessory_id)) => bail!("No home contains accessory {}", accessory_id),
        (None, None) => {
            if selection.restore().is_none() {
                warn!("No accessory selected; pass --home/--accessory (see --list)");
            }
        }
    }
    Ok(())
}

fn list_homes(source: &SimulatedSource) {
    for home in source.list_homes() {
        println!("{}  {}", home.id, home.name);
        for accessory in source.list_accessories(&home.id) {
            let metrics: Vec<_> = accessory
                .polled_characteristics()
                .into_iter()
                .map(|(_, kind)| kind.label())
                .collect();
            println!("    {}  {}  [{}]", accessory.id, accessory.name, metrics.join(", "));
        }
    }
}
