//! Windhum CLI: real-time wind-turbine sound player.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use windhum_engine::{
    output_device_names, CaptureJob, CpalBackend, DerivedReadouts, MappingVariant, MeterFrame,
    MeterSink, ReadoutSink, Simulator, SimulatorSettings, TurbineConfiguration, WavCaptureBackend,
};

/// Simulate the sound of wind turbines heard from a distance
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file; missing fields take their defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective settings to FILE and exit
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// Listener distance in meters
    #[arg(long)]
    distance: Option<f32>,

    /// Rotor speed in revolutions per minute
    #[arg(long)]
    rpm: Option<f32>,

    #[arg(long)]
    blades: Option<i64>,

    /// Blade length in meters
    #[arg(long)]
    blade_length: Option<f32>,

    /// Hub height in meters
    #[arg(long)]
    hub_height: Option<f32>,

    /// Wind speed in m/s
    #[arg(long)]
    wind: Option<f32>,

    /// neutral, toward or away
    #[arg(long)]
    direction: Option<String>,

    #[arg(long)]
    turbines: Option<i64>,

    /// laptop, external or flat
    #[arg(long)]
    profile: Option<String>,

    #[arg(long, default_value_t = false)]
    no_air_absorption: bool,

    #[arg(long, default_value_t = false)]
    no_ground_effect: bool,

    /// Add the periodic blade "whump"
    #[arg(long, default_value_t = false)]
    realism: bool,

    /// Sharper tonal peak and a longer noise loop
    #[arg(long, default_value_t = false)]
    hq: bool,

    /// Use the earlier mapping (no profile EQ, no realism)
    #[arg(long, default_value_t = false)]
    legacy: bool,

    /// Output device name (see --list-devices)
    #[arg(long)]
    device: Option<String>,

    #[arg(long, default_value_t = false)]
    list_devices: bool,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Record a capture of the output as soon as playback starts
    #[arg(long, default_value_t = false)]
    export: bool,

    /// Print the readouts and exit without opening audio
    #[arg(long, default_value_t = false)]
    readouts_only: bool,

    /// Read `key=value` edits and commands from stdin
    #[arg(short, long, default_value_t = false)]
    interactive: bool,
}

impl Args {
    fn settings(&self) -> Result<SimulatorSettings> {
        let mut s = match &self.config {
            Some(path) => SimulatorSettings::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulatorSettings::default(),
        };

        let t = &mut s.turbine;
        if let Some(v) = self.distance { t.distance_m = v; }
        if let Some(v) = self.rpm { t.rpm = v; }
        if let Some(v) = self.blades { t.blade_count = v; }
        if let Some(v) = self.blade_length { t.blade_length_m = v; }
        if let Some(v) = self.hub_height { t.hub_height_m = v; }
        if let Some(v) = self.wind { t.wind_speed = v; }
        if let Some(v) = self.turbines { t.turbine_count = v; }
        if let Some(v) = &self.direction {
            t.wind_direction = v.parse().map_err(|()| anyhow!("unknown wind direction: {v}"))?;
        }
        if let Some(v) = &self.profile {
            t.output_profile = v.parse().map_err(|()| anyhow!("unknown output profile: {v}"))?;
        }
        if self.no_air_absorption { t.air_absorption = false; }
        if self.no_ground_effect { t.ground_effect = false; }
        if self.realism { t.realism = true; }
        if self.hq { t.high_fidelity = true; }

        if self.legacy { s.audio.variant = MappingVariant::Legacy; }
        if let Some(d) = &self.device { s.audio.device = Some(d.clone()); }
        Ok(s)
    }
}

struct PrintReadouts;

impl ReadoutSink for PrintReadouts {
    fn publish(&mut self, readouts: &DerivedReadouts) {
        println!("{readouts}");
    }
}

/// Single-line peak bar on stderr, refreshed a few times per second.
#[derive(Default)]
struct TerminalMeter {
    frames: u32,
}

impl TerminalMeter {
    const EVERY: u32 = 12;
    const WIDTH: usize = 40;
}

impl MeterSink for TerminalMeter {
    fn draw(&mut self, frame: &MeterFrame) {
        self.frames = self.frames.wrapping_add(1);
        if self.frames % Self::EVERY != 0 {
            return;
        }
        let filled = ((frame.peak.clamp(0.0, 1.0) * Self::WIDTH as f32).round() as usize).min(Self::WIDTH);
        let mut err = io::stderr().lock();
        let _ = write!(
            err,
            "\r[meter] {:<width$} peak {:.3} rms {:.3}",
            "#".repeat(filled),
            frame.peak,
            frame.rms,
            width = Self::WIDTH
        );
        let _ = err.flush();
    }

    fn clear(&mut self) {
        let _ = write!(io::stderr(), "\r{:<1$}\r", "", Self::WIDTH + 40);
    }
}

fn list_output_devices() -> Result<()> {
    println!("Available output devices:");
    for name in output_device_names()? {
        println!("- {name}");
    }
    Ok(())
}

/// Wait for a capture off the main thread and report how it ended.
fn report_in_background(job: CaptureJob) {
    let spawned = thread::Builder::new()
        .name("windhum-export-report".into())
        .spawn(move || report(job));
    if let Err(e) = spawned {
        log::error!("cannot watch capture: {e}");
    }
}

fn report(job: CaptureJob) {
    match job.wait() {
        Ok(path) => println!("\nSaved {}", path.display()),
        Err(e) => log::error!("export failed: {e}"),
    }
}

fn start_export(sim: &Simulator) -> Option<CaptureJob> {
    match sim.export() {
        Ok(Some(job)) => Some(job),
        Ok(None) => {
            println!("Export unavailable: audio not running or a capture is in progress");
            None
        }
        Err(e) => {
            log::error!("export failed: {e}");
            None
        }
    }
}

const HELP: &str = "\
commands:
  start | stop | export | status | help | quit
  <field>=<value>   e.g. rpm=18, distance=120, direction=toward, profile=flat, realism=on";

fn interactive(sim: &mut Simulator) -> Result<()> {
    println!("{HELP}");
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let cmd = line.trim();
        match cmd {
            "" => {}
            "quit" | "exit" | "q" => break,
            "help" | "?" => println!("{HELP}"),
            "start" => {
                if let Err(e) = sim.start() {
                    log::error!("cannot start audio: {e}");
                }
            }
            "stop" => sim.stop(),
            "export" | "record" => {
                if let Some(job) = start_export(sim) {
                    report_in_background(job);
                }
            }
            "status" => println!(
                "{} | {}",
                sim.readouts(),
                if sim.is_active() { "playing" } else { "stopped" }
            ),
            _ => match cmd.split_once('=') {
                Some((k, v)) => {
                    if let Err(e) = sim.edit(k, v.trim()) {
                        println!("{e}");
                    }
                }
                None => println!("unknown command `{cmd}` (try `help`)"),
            },
        }
    }
    sim.stop();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    if args.list_devices {
        return list_output_devices();
    }

    let settings = args.settings()?;

    if let Some(path) = &args.save_config {
        settings
            .save_to_file(path)
            .with_context(|| format!("saving {}", path.display()))?;
        println!("Settings written to {}", path.display());
        return Ok(());
    }

    if args.readouts_only {
        println!("{}", DerivedReadouts::compute(&TurbineConfiguration::from(settings.turbine)));
        return Ok(());
    }

    println!("windhum: wind-turbine sound simulator\n");

    let capture = WavCaptureBackend::new(&settings.export.directory)
        .with_file_name(settings.export.file_name.clone());
    let mut sim = Simulator::new(
        &settings,
        Box::new(CpalBackend::new(settings.audio.device.clone())),
        Box::new(capture),
    )
    .with_readout_sink(Box::new(PrintReadouts))
    .with_meter_sink(Box::new(TerminalMeter::default()));

    if args.interactive {
        return interactive(&mut sim);
    }

    sim.start().context("failed to start audio output")?;
    let job = if args.export { start_export(&sim) } else { None };

    match (args.duration, job) {
        (Some(d), job) => {
            println!("Auto-stop after {d} seconds");
            thread::sleep(Duration::from_secs(d));
            sim.stop();
            if let Some(job) = job {
                report(job);
            }
        }
        (None, Some(job)) => {
            report(job);
            sim.stop();
        }
        (None, None) => {
            println!("Press Ctrl+C to stop…\n");
            loop {
                thread::sleep(Duration::from_millis(500));
            }
        }
    }
    Ok(())
}
