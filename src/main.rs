//! Motion Recorder CLI
//!
//! Record activity-labelled motion sensor sessions and export them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use motion_recorder::{
    collector::{system_platform, SensorPlatform, SimulatedPlatform},
    config::{Config, SensorSelection},
    core::{DirectorySink, ExportFormat, SessionEntry, StopOutcome},
    pipeline::Pipeline,
    stats::create_shared_stats_with_persistence,
    VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "relay")]
use motion_recorder::relay::HttpRelayTransport;

#[derive(Parser)]
#[command(name = "motion-recorder")]
#[command(version = VERSION)]
#[command(about = "Record activity-labelled motion sensor sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which sensors are available
    Sensors {
        /// Use the simulated platform instead of real hardware
        #[arg(long)]
        simulate: bool,
    },

    /// Record one session
    Record {
        /// Activity label for the session
        #[arg(long, short)]
        activity: String,

        /// Sampling rate in Hz (1-100)
        #[arg(long)]
        rate: Option<u32>,

        /// Sensors to start (comma-separated, or "all")
        #[arg(long)]
        sensors: Option<String>,

        /// Stop after this many seconds (otherwise Ctrl+C)
        #[arg(long)]
        duration: Option<u64>,

        /// Switch activity after a delay, e.g. "10:Running" (repeatable)
        #[arg(long = "switch", value_parser = parse_switch)]
        switches: Vec<(u64, String)>,

        /// Export format (csv, txt or json)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Output directory for the export
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Skip exporting after the session
        #[arg(long)]
        no_export: bool,

        /// Forward recorded events to the stream relay (requires relay feature)
        #[arg(long)]
        relay: bool,

        /// Relay host (overrides config)
        #[arg(long)]
        relay_host: Option<String>,

        /// Relay port (overrides config)
        #[arg(long)]
        relay_port: Option<u16>,

        /// Use the simulated platform instead of real hardware
        #[arg(long)]
        simulate: bool,
    },

    /// List or add activity labels
    Activities {
        /// Add a new activity label
        #[arg(long)]
        add: Option<String>,
    },

    /// Show recording statistics
    Stats,

    /// Show configuration
    Config,

    /// Run the HTTP control server (requires server feature)
    Serve {
        /// Port to bind to
        #[arg(long, default_value = "8090")]
        port: u16,

        /// Use the simulated platform instead of real hardware
        #[arg(long)]
        simulate: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sensors { simulate } => cmd_sensors(simulate),
        Commands::Record {
            activity,
            rate,
            sensors,
            duration,
            switches,
            format,
            output,
            no_export,
            relay,
            relay_host,
            relay_port,
            simulate,
        } => cmd_record(RecordArgs {
            activity,
            rate,
            sensors,
            duration: duration.map(Duration::from_secs),
            switches,
            format,
            output,
            no_export,
            relay,
            relay_host,
            relay_port,
            simulate,
        }),
        Commands::Activities { add } => cmd_activities(add),
        Commands::Stats => cmd_stats(),
        Commands::Config => cmd_config(),
        Commands::Serve { port, simulate } => cmd_serve(port, simulate),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

struct RecordArgs {
    activity: String,
    rate: Option<u32>,
    sensors: Option<String>,
    duration: Option<Duration>,
    switches: Vec<(u64, String)>,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
    no_export: bool,
    relay: bool,
    relay_host: Option<String>,
    relay_port: Option<u16>,
    simulate: bool,
}

/// Parse `SECONDS:ACTIVITY`.
fn parse_switch(s: &str) -> Result<(u64, String), String> {
    let (secs, activity) = s
        .split_once(':')
        .ok_or_else(|| format!("expected SECONDS:ACTIVITY, got '{s}'"))?;
    let secs = secs
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid seconds '{secs}': {e}"))?;
    let activity = activity.trim();
    if activity.is_empty() {
        return Err("activity must not be empty".to_string());
    }
    Ok((secs, activity.to_string()))
}

fn platform(simulate: bool) -> Box<dyn SensorPlatform> {
    if simulate {
        Box::new(SimulatedPlatform::all_native())
    } else {
        system_platform()
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}), using defaults");
        Config::default()
    })
}

fn cmd_sensors(simulate: bool) -> anyhow::Result<()> {
    let platform = platform(simulate);
    let capabilities = motion_recorder::collector::detect(platform.as_ref());

    println!("Sensor Status ({})", platform.name());
    println!("=============");
    for (sensor, available) in capabilities.iter() {
        println!(
            "  {:<26} {}",
            sensor.to_string(),
            if available { "available" } else { "not available" }
        );
    }
    Ok(())
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    println!("Motion Recorder v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(rate) = args.rate {
        config.sampling_rate = rate;
    }
    if let Some(ref sensors) = args.sensors {
        config.selected_sensors = SensorSelection::from_csv(sensors)?;
    }
    if let Some(host) = args.relay_host {
        config.relay.host = host;
    }
    if let Some(port) = args.relay_port {
        config.relay.port = port;
    }
    config.validate()?;
    if config.selected_sensors.is_empty() {
        anyhow::bail!("At least one sensor must be selected");
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let format = args.format.unwrap_or(config.export_format);
    let output = args.output.clone().unwrap_or_else(|| config.export_path.clone());
    let stats = create_shared_stats_with_persistence(config.stats_path());
    let mut pipeline = Pipeline::with_stats(config.clone(), platform(args.simulate), stats);

    println!("Platform: {}", pipeline.platform_name());
    println!("  Activity: {}", args.activity);
    println!("  Sampling rate: {} Hz", config.sampling_rate);
    let selected: Vec<String> = config.selected_sensors.iter().map(|s| s.to_string()).collect();
    println!("  Sensors: {}", selected.join(", "));

    if args.relay {
        connect_relay(&mut pipeline, &config);
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    pipeline
        .start_recording(Some(&args.activity))
        .context("Could not start recording")?;

    let active: Vec<String> = pipeline.active_sensors().iter().map(|s| s.to_string()).collect();
    if active.is_empty() {
        println!("  Active sources: none");
    } else {
        println!("  Active sources: {}", active.join(", "));
    }
    println!();
    match args.duration {
        Some(d) => println!("Recording for {}s (Ctrl+C to stop early)", d.as_secs()),
        None => println!("Recording... press Ctrl+C to stop"),
    }
    println!();

    let mut switches = args.switches;
    switches.sort_by_key(|(secs, _)| *secs);
    let mut switches = switches.into_iter().peekable();

    let started = Instant::now();
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        pipeline.pump(Duration::from_millis(100));

        let elapsed = started.elapsed();
        if args.duration.is_some_and(|d| elapsed >= d) {
            break;
        }

        while let Some((_, activity)) =
            switches.next_if(|(secs, _)| elapsed >= Duration::from_secs(*secs))
        {
            if pipeline.switch_activity(&activity) {
                println!("[{:>5.1}s] Switched activity to {activity}", elapsed.as_secs_f64());
            }
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            print_progress(&pipeline, elapsed);
            last_report = Instant::now();
        }
    }

    println!();
    println!("Stopping...");
    let outcome = pipeline.stop_recording();
    pipeline.disconnect_relay();

    match outcome {
        StopOutcome::Sealed { id, entries } => {
            println!("Session {id} sealed with {entries} entries");
        }
        StopOutcome::Discarded => println!("No data captured; session discarded"),
        StopOutcome::AlreadyIdle => {}
    }

    if !args.no_export && !pipeline.archive().is_empty() {
        let sink = DirectorySink::new(output);
        let path = pipeline
            .export_to(&sink, format)
            .context("Export failed")?;
        println!("Exported {} to {}", format, path.display());
    }

    if let Err(e) = pipeline.stats().save() {
        eprintln!("Warning: Could not save stats: {e}");
    }

    println!();
    println!("{}", pipeline.stats().summary());
    Ok(())
}

fn print_progress(pipeline: &Pipeline, elapsed: Duration) {
    let status = pipeline.status();
    let latest = pipeline
        .live_snapshot(1)
        .into_iter()
        .next()
        .map(|entry| match entry {
            SessionEntry::Reading(e) => match (e.payload.x(), e.payload.y(), e.payload.z()) {
                (Some(x), Some(y), Some(z)) => {
                    format!("{} x={x:.2} y={y:.2} z={z:.2}", e.sensor_type)
                }
                _ => e.sensor_type.to_string(),
            },
            SessionEntry::Switch(m) => format!("switch -> {}", m.activity),
        })
        .unwrap_or_else(|| "no data yet".to_string());

    println!(
        "[{:>5.1}s] {} | {} entries | {}",
        elapsed.as_secs_f64(),
        status.activity,
        status.open_entries,
        latest
    );
}

#[cfg(feature = "relay")]
fn connect_relay(pipeline: &mut Pipeline, config: &Config) {
    let transport = match HttpRelayTransport::new(config.relay.clone()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Warning: Relay initialization failed: {e}");
            return;
        }
    };
    println!("  Relay: {} (device {})", config.relay.url(), transport.device_id());
    if let Err(e) = pipeline.connect_relay(Box::new(transport)) {
        eprintln!("Warning: Could not connect to relay: {e}");
        eprintln!("Continuing without streaming.");
    }
}

#[cfg(not(feature = "relay"))]
fn connect_relay(_pipeline: &mut Pipeline, _config: &Config) {
    eprintln!("Warning: --relay flag ignored (relay feature not enabled at compile time)");
}

fn cmd_activities(add: Option<String>) -> anyhow::Result<()> {
    let mut config = load_config();

    if let Some(name) = add {
        config.add_activity(&name)?;
        config.save()?;
        println!("Added activity '{}'", name.trim());
        println!();
    }

    println!("Activities");
    println!("==========");
    for activity in &config.activities {
        println!("  {activity}");
    }
    Ok(())
}

fn cmd_stats() -> anyhow::Result<()> {
    let config = load_config();
    let stats = create_shared_stats_with_persistence(config.stats_path());
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16, simulate: bool) -> anyhow::Result<()> {
    use motion_recorder::server::{run, ServerConfig};

    let config = load_config();
    let server_config = ServerConfig::new(port, config).with_platform(platform(simulate));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Motion recorder server listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        // Let the server stop the open session before the runtime goes away
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: u16, _simulate: bool) -> anyhow::Result<()> {
    anyhow::bail!("the serve command requires the server feature (cargo build --features server)")
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
