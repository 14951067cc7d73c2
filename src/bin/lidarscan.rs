use clap::{Parser, Subcommand, ValueEnum};
use lidarscan::common::points_in_rect;
use lidarscan::config::AppConfig;
use lidarscan::geom2::align2::register_files;
use lidarscan::io;
use lidarscan::metrology::{l_profile_angle, profile_stats};
use lidarscan::sensors::{self, SensorSession, SessionStatus, find_port};
use lidarscan::{Point2, SensorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lidarscan", version)]
#[command(about = "Capture planar lidar scans and register them against each other")]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum SensorArg {
    Stl27l,
    A2m8,
}

impl From<SensorArg> for SensorKind {
    fn from(value: SensorArg) -> Self {
        match value {
            SensorArg::Stl27l => SensorKind::Stl27l,
            SensorArg::A2m8 => SensorKind::A2m8,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports and the sensors they match
    Ports,

    /// Capture scans from a sensor and save them to the scans directory
    Capture {
        #[arg(short, long, value_enum)]
        sensor: SensorArg,

        /// Number of non-empty scans to save
        #[arg(short = 'n', long, default_value = "1")]
        scans: usize,

        /// Give up if no populated scan arrives within this many seconds
        #[arg(long, default_value = "10")]
        wait: u64,
    },

    /// Crop a rectangular region from a saved scan into a named slice
    Crop {
        scan: PathBuf,
        name: String,
        #[arg(allow_hyphen_values = true)]
        x1: f64,
        #[arg(allow_hyphen_values = true)]
        y1: f64,
        #[arg(allow_hyphen_values = true)]
        x2: f64,
        #[arg(allow_hyphen_values = true)]
        y2: f64,
    },

    /// Register a source slice onto a target slice
    Register {
        source: PathBuf,
        target: PathBuf,

        /// Write the transformed source points to this file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Line fit statistics of a nominally straight slice
    Profile { slice: String },

    /// Included angle of an L-shaped slice
    Angle { slice: String },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> lidarscan::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Ports => ports(&config),
        Command::Capture {
            sensor,
            scans,
            wait,
        } => capture(&config, sensor.into(), scans, Duration::from_secs(wait)),
        Command::Crop {
            scan,
            name,
            x1,
            y1,
            x2,
            y2,
        } => {
            let points = io::read_points(&scan)?;
            let kept = points_in_rect(&points, &Point2::new(x1, y1), &Point2::new(x2, y2));
            let path = io::save_slice(&config.slices_dir, &name, &kept)?;
            println!("{} of {} points -> {}", kept.len(), points.len(), path.display());
            Ok(())
        }
        Command::Register {
            source,
            target,
            out,
            json,
        } => {
            let source = resolve_slice(&config, &source);
            let target = resolve_slice(&config, &target);
            let result = register_files(&source, &target, &config.icp)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let t = &result.transform;
                println!(
                    "tx = {:.3}  ty = {:.3}  theta = {:.5} rad  rmse = {:.4}",
                    t.tx, t.ty, t.theta, result.rmse
                );
            }
            if let Some(path) = out {
                io::write_points(&path, &result.transformed_source)?;
            }
            Ok(())
        }
        Command::Profile { slice } => {
            let points = load_named(&config, &slice)?;
            let stats = profile_stats(&points)?;
            println!("rmse:     {:.4}", stats.rmse);
            println!("pearson:  {:.4}", stats.pearson);
            println!("length:   {:.2}", stats.length);
            println!("distance: {:.2}", stats.centroid_distance);
            Ok(())
        }
        Command::Angle { slice } => {
            let points = load_named(&config, &slice)?;
            let angle = l_profile_angle(&points)?;
            println!("angle: {:.2} degrees", angle.degrees);
            Ok(())
        }
    }
}

/// Accepts either a path to an existing file or the name of a slice in the slices directory
fn resolve_slice(config: &AppConfig, arg: &Path) -> PathBuf {
    if arg.is_file() {
        arg.to_path_buf()
    } else {
        config.slices_dir.join(arg)
    }
}

fn load_named(config: &AppConfig, slice: &str) -> lidarscan::Result<Vec<Point2>> {
    let path = Path::new(slice);
    if path.is_file() {
        io::read_points(path)
    } else {
        io::load_slice(&config.slices_dir, slice)
    }
}

fn ports(config: &AppConfig) -> lidarscan::Result<()> {
    let ports = sensors::list_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in &ports {
        let sensor = config
            .sensors
            .iter()
            .find(|s| find_port(std::slice::from_ref(port), s).is_some())
            .map(|s| s.name())
            .unwrap_or("-");
        println!("{:<20} {:<48} {}", port.name, port.hwid, sensor);
    }
    Ok(())
}

fn capture(config: &AppConfig, kind: SensorKind, count: usize, wait: Duration) -> lidarscan::Result<()> {
    let session = SensorSession::connect(config.sensor(kind));
    if session.status() == SessionStatus::Disconnected {
        return Err(format!("{} is not connected", kind).into());
    }

    let stream = sensors::start(session)?;
    let mut saved = 0;
    while saved < count {
        let Some(scan) = stream.recv_populated(wait) else {
            break;
        };
        let path = io::save_scan(&config.scans_dir, &scan)?;
        println!("{} points -> {}", scan.len(), path.display());
        saved += 1;
    }

    stream.stop()?;
    if saved < count {
        return Err(format!("only {} of {} scans captured", saved, count).into());
    }
    Ok(())
}
