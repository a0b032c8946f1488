use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Use modules from the library
use resguard::core::engine::{
    ControlAction, EngineEvent, GuardianEngine, GuardianRuntime, ProcessControl,
    ReportedCondition, ThrottleState,
};
use resguard::core::sampler::{LoadSampler, SystemLoadProbe};
use resguard::platform::SystemProcessControl;
use resguard::GuardianConfig;

fn main() -> Result<()> {
    let matches = Command::new("resguard")
        .version("0.1.0")
        .about("Desktop resource guardian: throttles or suspends a runaway process based on CPU/GPU load")
        .subcommand(
            Command::new("run")
                .about("Run the guardian engine loop")
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .value_name("NAME")
                        .help("Target process name (first case-insensitive substring match)")
                )
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("MS")
                        .value_parser(clap::value_parser!(u64))
                        .help("Poll interval in milliseconds")
                )
                .arg(
                    Arg::new("cpu-throttle")
                        .long("cpu-throttle")
                        .value_name("PCT")
                        .value_parser(clap::value_parser!(f32))
                        .help("CPU throttle threshold (%)")
                )
                .arg(
                    Arg::new("cpu-recovery")
                        .long("cpu-recovery")
                        .value_name("PCT")
                        .value_parser(clap::value_parser!(f32))
                        .help("CPU recovery threshold (%)")
                )
                .arg(
                    Arg::new("gpu-throttle")
                        .long("gpu-throttle")
                        .value_name("PCT")
                        .value_parser(clap::value_parser!(f32))
                        .help("GPU throttle threshold (%)")
                )
                .arg(
                    Arg::new("gpu-recovery")
                        .long("gpu-recovery")
                        .value_name("PCT")
                        .value_parser(clap::value_parser!(f32))
                        .help("GPU recovery threshold (%)")
                )
        )
        .subcommand(
            Command::new("check")
                .about("Validate configuration and probe the host capabilities")
        )
        .subcommand(
            Command::new("set")
                .about("Set a configuration value")
                .arg(
                    Arg::new("key")
                        .help("One of: target, poll-interval, cpu-throttle, cpu-recovery, gpu-throttle, gpu-recovery")
                        .required(true)
                        .index(1)
                )
                .arg(
                    Arg::new("value")
                        .help("New value")
                        .required(true)
                        .index(2)
                )
        )
        .subcommand(
            Command::new("get")
                .about("Print configuration (all values, or one key)")
                .arg(
                    Arg::new("key")
                        .help("Optional key to print")
                        .index(1)
                )
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => run_guardian(Some(sub)),
        Some(("check", _)) => check_host(),
        Some(("set", sub)) => set_config_value(sub),
        Some(("get", sub)) => get_config_value(sub),
        _ => run_guardian(None),
    }
}

fn load_config_with_overrides(matches: Option<&ArgMatches>) -> Result<GuardianConfig> {
    let mut config = GuardianConfig::load()?;

    if let Some(matches) = matches {
        if let Some(target) = matches.get_one::<String>("target") {
            config.target_process_name = target.clone();
        }
        if let Some(interval) = matches.get_one::<u64>("interval") {
            config.poll_interval_ms = *interval;
        }
        if let Some(value) = matches.get_one::<f32>("cpu-throttle") {
            config.cpu_throttle_threshold = *value;
        }
        if let Some(value) = matches.get_one::<f32>("cpu-recovery") {
            config.cpu_recovery_threshold = *value;
        }
        if let Some(value) = matches.get_one::<f32>("gpu-throttle") {
            config.gpu_throttle_threshold = *value;
        }
        if let Some(value) = matches.get_one::<f32>("gpu-recovery") {
            config.gpu_recovery_threshold = *value;
        }
    }

    config.validate()?;
    Ok(config)
}

fn run_guardian(matches: Option<&ArgMatches>) -> Result<()> {
    resguard::init_logging();

    let config = load_config_with_overrides(matches)?;
    let poll_interval_ms = config.poll_interval_ms;

    println!(
        "Guarding '{}' (cpu {}/{}%, gpu {}/{}%, every {}ms)",
        config.target_process_name.bold(),
        config.cpu_throttle_threshold,
        config.cpu_recovery_threshold,
        config.gpu_throttle_threshold,
        config.gpu_recovery_threshold,
        config.poll_interval_ms,
    );

    let probe = SystemLoadProbe::new();
    match probe.gpu_name() {
        Some(name) => println!("GPU telemetry: {}", name),
        None => println!("GPU telemetry: {}", "unavailable (CPU thresholds only)".dimmed()),
    }

    let sampler = LoadSampler::new(Box::new(probe));
    let control = Box::new(SystemProcessControl::new());
    let engine = GuardianEngine::new(config, sampler, control)?;
    let runtime = GuardianRuntime::start(engine)?;
    let mut events = runtime.subscribe();

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    println!("Press Ctrl-C to stop. A panicked target stays suspended on exit.");

    while !stop.load(Ordering::SeqCst) {
        loop {
            match events.try_recv() {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Console fell behind; {} events dropped", skipped);
                }
                Err(_) => break,
            }
        }
        thread::sleep(Duration::from_millis((poll_interval_ms / 2).clamp(50, 500)));
    }

    runtime.shutdown();
    println!("Stopped.");
    Ok(())
}

fn print_event(event: &EngineEvent) {
    let status = match event.state {
        ThrottleState::Normal => "NORMAL".blue().bold(),
        ThrottleState::Throttled => "THROTTLED".yellow().bold(),
        ThrottleState::Panic => "PANIC".red().bold(),
    };
    let gpu = event
        .sample
        .gpu_percent
        .map_or("  n/a ".to_string(), |gpu| format!("{:5.1}%", gpu));

    let mut line = format!(
        "{:<9} cpu {:5.1}%  gpu {}",
        status, event.sample.cpu_percent, gpu
    );

    if event.action != ControlAction::None {
        line.push_str(&format!("  {}", format!("{:?}", event.action).cyan()));
    }
    match event.condition {
        Some(ReportedCondition::SamplingDegraded) => {
            line.push_str(&format!("  {}", "degraded sampling".magenta()))
        }
        Some(ReportedCondition::ProcessGone) => {
            line.push_str(&format!("  {}", "target not running".dimmed()))
        }
        Some(ReportedCondition::PermissionDenied) => {
            line.push_str(&format!("  {}", "permission denied".red()))
        }
        None => {}
    }

    println!("{}", line);
}

fn check_host() -> Result<()> {
    let config = GuardianConfig::load()?;

    match config.validate() {
        Ok(()) => println!("{} configuration is valid", "ok:".green().bold()),
        Err(e) => println!("{} {}", "error:".red().bold(), e),
    }

    if resguard::platform::gpu::is_gpu_available() {
        println!("{} GPU telemetry available", "ok:".green().bold());
    } else {
        println!(
            "{} no GPU telemetry; only CPU thresholds will be actionable",
            "warn:".yellow().bold()
        );
    }

    let mut control = SystemProcessControl::new();
    match control.resolve(&config.target_process_name) {
        Some(pid) => println!(
            "{} target '{}' resolved to pid {}",
            "ok:".green().bold(),
            config.target_process_name,
            pid
        ),
        None => println!(
            "{} target '{}' is not currently running",
            "warn:".yellow().bold(),
            config.target_process_name
        ),
    }

    Ok(())
}

fn set_config_value(matches: &ArgMatches) -> Result<()> {
    let key = matches.get_one::<String>("key").unwrap();
    let value = matches.get_one::<String>("value").unwrap();

    let mut config = GuardianConfig::load()?;
    match key.as_str() {
        "target" => config.target_process_name = value.clone(),
        "poll-interval" => {
            config.poll_interval_ms = value
                .parse()
                .with_context(|| format!("'{}' is not a valid interval", value))?
        }
        "cpu-throttle" => config.cpu_throttle_threshold = parse_percent(value)?,
        "cpu-recovery" => config.cpu_recovery_threshold = parse_percent(value)?,
        "gpu-throttle" => config.gpu_throttle_threshold = parse_percent(value)?,
        "gpu-recovery" => config.gpu_recovery_threshold = parse_percent(value)?,
        other => bail!("Unknown configuration key: {}", other),
    }

    // Refuse to persist a config the engine would refuse to start with
    config.validate()?;
    config.save()?;
    println!("{} {} = {}", "saved:".green().bold(), key, value);
    Ok(())
}

fn parse_percent(value: &str) -> Result<f32> {
    let parsed: f32 = value
        .parse()
        .with_context(|| format!("'{}' is not a valid percentage", value))?;
    if !(0.0..=100.0).contains(&parsed) {
        bail!("'{}' is outside 0-100", value);
    }
    Ok(parsed)
}

fn get_config_value(matches: &ArgMatches) -> Result<()> {
    let config = GuardianConfig::load()?;

    match matches.get_one::<String>("key").map(|key| key.as_str()) {
        None => println!("{}", serde_json::to_string_pretty(&config)?),
        Some("target") => println!("{}", config.target_process_name),
        Some("poll-interval") => println!("{}", config.poll_interval_ms),
        Some("cpu-throttle") => println!("{}", config.cpu_throttle_threshold),
        Some("cpu-recovery") => println!("{}", config.cpu_recovery_threshold),
        Some("gpu-throttle") => println!("{}", config.gpu_throttle_threshold),
        Some("gpu-recovery") => println!("{}", config.gpu_recovery_threshold),
        Some(other) => bail!("Unknown configuration key: {}", other),
    }

    Ok(())
}
