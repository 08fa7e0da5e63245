use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use snitch_fc::emitter::ControlEmitter;
use snitch_fc::msp::{self, RcCommand};
use snitch_fc::pilot::{clamp_channel, SharedPilot, ARM_VALUE, DISARM_VALUE};
use snitch_fc::safety::ClientCount;
use snitch_fc::state::FcStatus;
use snitch_fc::{doctor as fc_doctor, link, FcConfig};
use snitch_link::{doctor as link_doctor, ControlServer, LinkConfig, Vehicle};
use snitch_vision::camera::{self, CameraConfig};
use snitch_vision::{doctor as vision_doctor, Calibration, FrameSource, PerceptionTask, ThreatScanner, VisionConfig};

use std::sync::{Arc, Mutex};

#[derive(Debug, Parser)]
#[command(name = "snitch", version, about = "Snitch - camera threat avoidance and flight command link")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file.
    Doctor,
    /// Perception, operator surface and flight controller link until interrupted.
    Run,
    /// Grab one frame and print the room baseline.
    Calibrate,
    /// Calibrate, then print the verdict for the next N frames.
    Scan {
        #[arg(long, default_value_t = 10)]
        frames: u32,
    },
    Fc { #[command(subcommand)] cmd: FcCmd },
}

#[derive(Debug, Subcommand)]
enum FcCmd {
    /// Print the MSP_SET_RAW_RC frame for the given channels as hex.
    Frame {
        #[arg(long, default_value_t = 1000)]
        throttle: i32,
        #[arg(long, default_value_t = 1500)]
        yaw: i32,
        #[arg(long, default_value_t = 1500)]
        pitch: i32,
        #[arg(long, default_value_t = 1500)]
        roll: i32,
        #[arg(long)]
        armed: bool,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    camera: CameraConfig,
    #[serde(default)]
    vision: VisionConfig,
    #[serde(default)]
    fc: FcConfig,
    link: LinkConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(cfg).await?,
        Command::Calibrate => {
            let mut src = camera::open_source(&cfg.camera)?;
            let cal = calibrate(&mut src, &cfg.vision)?;
            println!("baseline={} sampled_mean={} low_light={}", cal.baseline, cal.sampled_mean, cal.low_light);
        }
        Command::Scan { frames } => scan(&cfg, frames)?,
        Command::Fc { cmd } => fc_cmd(cmd),
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    vision_doctor::check_camera(&cfg.camera)?;
    vision_doctor::check_vision(&cfg.vision)?;
    fc_doctor::check_fc(&cfg.fc)?;
    link_doctor::check_link(&cfg.link)?;
    info!("doctor: OK");
    Ok(())
}

/// Room calibration from the first frame. No frame here means the camera is
/// unusable and nothing else may start.
fn calibrate(src: &mut impl FrameSource, vision: &VisionConfig) -> Result<Calibration> {
    let frame = src
        .acquire()
        .context("camera: calibration capture")?
        .context("camera: no frame for calibration")?;
    let cal = Calibration::from_frame(&frame, vision.scan_params().brightness_floor);
    src.release(frame);
    Ok(cal)
}

fn scan(cfg: &Config, frames: u32) -> Result<()> {
    let mut src = camera::open_source(&cfg.camera)?;
    let cal = calibrate(&mut src, &cfg.vision)?;
    let scanner = ThreatScanner::new(cfg.vision.scan_params(), &cal);
    println!("baseline={} threshold={}", scanner.baseline(), scanner.dynamic_threshold());

    let mut task = PerceptionTask::new(src, scanner, |t: snitch_proto::Threat| {
        println!("active={} zone={} mass={}", t.active, t.zone_index(), t.mass);
    });
    for _ in 0..frames {
        task.step();
    }
    Ok(())
}

fn fc_cmd(cmd: FcCmd) {
    match cmd {
        FcCmd::Frame { throttle, yaw, pitch, roll, armed } => {
            let rc = RcCommand {
                roll: clamp_channel(roll),
                pitch: clamp_channel(pitch),
                throttle: clamp_channel(throttle),
                yaw: clamp_channel(yaw),
                aux1: if armed { ARM_VALUE } else { DISARM_VALUE },
            };
            println!("{}", hex::encode(msp::encode_rc(&rc)));
        }
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!("run: starting");

    // Camera first: if it can't calibrate, no control activity begins.
    let mut src = camera::open_source(&cfg.camera)?;
    let vision = cfg.vision.clone();
    let (src, cal) = tokio::task::spawn_blocking(move || -> Result<_> {
        let cal = calibrate(&mut src, &vision)?;
        Ok((src, cal))
    })
    .await
    .context("calibration task")??;
    info!("run: calibrated baseline={} low_light={}", cal.baseline, cal.low_light);
    let scanner = ThreatScanner::new(cfg.vision.scan_params(), &cal);

    let mut pilot = cfg.fc.build_pilot()?;
    pilot.set_vision(cfg.vision.enabled_at_start.unwrap_or(false));
    let pilot = SharedPilot::new(pilot);
    let clients = ClientCount::new();
    let fc_status = Arc::new(Mutex::new(FcStatus {
        port: cfg.fc.serial_dev.clone(),
        baud: cfg.fc.baud,
        ..FcStatus::default()
    }));

    let server = ControlServer::bind(
        &cfg.link,
        Vehicle { pilot: pilot.clone(), clients: clients.clone(), fc_status: fc_status.clone() },
    )
    .await?;
    let mut server = tokio::spawn(server.serve());

    // Perception owns its own OS thread: the camera may block for a long time.
    let fold = pilot.clone();
    let task = PerceptionTask::new(src, scanner, move |t| fold.apply_threat(t))
        .with_pace(cfg.vision.scan_interval());
    let mut perception = spawn_watched("perception", move || task.run())?;

    let sink = link::open_sink(&cfg.fc)?;
    let interval = cfg.fc.emit_interval();
    let emitter = ControlEmitter::new(pilot.clone(), sink, clients, fc_status);
    let mut control = tokio::spawn(emitter.run(interval));
    info!("run: control loop every {:?}", interval);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("run: interrupted, disarming");
            pilot.disarm();
            // Let a few disarmed frames reach the controller before exiting.
            tokio::time::sleep(interval * 3).await;
        }
        res = &mut server => {
            pilot.disarm();
            tokio::time::sleep(interval * 3).await;
            res.context("operator surface task")??;
            anyhow::bail!("operator surface stopped");
        }
        res = &mut control => {
            res.context("control loop task")?;
            anyhow::bail!("control loop stopped");
        }
        _ = &mut perception => {
            // Verdicts would go stale; stop flying on them.
            error!("run: perception thread exited, disarming");
            pilot.disarm();
            tokio::time::sleep(interval * 3).await;
            anyhow::bail!("perception stopped");
        }
    }
    Ok(())
}

/// Runs `f` on a named OS thread. The receiver resolves when the thread ends,
/// whether it returned or panicked.
fn spawn_watched<F>(name: &str, f: F) -> Result<oneshot::Receiver<()>>
where
    F: FnOnce() + Send + 'static,
{
    let (done, watch) = oneshot::channel::<()>();
    std::thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            // Dropped on return and while unwinding.
            let _done = done;
            f();
        })
        .with_context(|| format!("spawn {} thread", name))?;
    Ok(watch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = include_str!("../../../config/snitch.example.toml");

    #[test]
    fn example_config_passes_doctor() {
        let cfg: Config = toml::from_str(EXAMPLE).unwrap();
        doctor(&cfg).unwrap();
        assert_eq!(cfg.fc.emit_interval(), std::time::Duration::from_millis(20));
        let table = cfg.fc.zone_table().unwrap();
        assert_eq!(table.get(1).and_then(|r| r.pitch), Some(1200));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: Config = toml::from_str(
            "[camera]\nmode = \"replay\"\nreplay_dir = \"frames\"\n[link]\nlisten = \"127.0.0.1:5760\"\n",
        )
        .unwrap();
        assert!(cfg.fc.serial_dev.is_none());
        assert_eq!(cfg.vision.scan_params().sensitivity, 50);
        doctor(&cfg).unwrap();
    }

    #[tokio::test]
    async fn watched_thread_reports_panic() {
        let watch = spawn_watched("doomed", || panic!("camera driver fell over")).unwrap();
        let res = tokio::time::timeout(std::time::Duration::from_secs(5), watch).await;
        assert!(matches!(res, Ok(Err(_))));
    }

    #[tokio::test]
    async fn watched_thread_reports_return() {
        let watch = spawn_watched("short", || {}).unwrap();
        assert!(tokio::time::timeout(std::time::Duration::from_secs(5), watch).await.is_ok());
    }

    #[test]
    fn calibration_requires_a_frame() {
        let mut empty = snitch_vision::ReplaySource::default();
        assert!(calibrate(&mut empty, &VisionConfig::default()).is_err());

        let mut one = snitch_vision::ReplaySource::new(vec![snitch_vision::Frame::filled(30)]);
        let cal = calibrate(&mut one, &VisionConfig::default()).unwrap();
        assert_eq!(cal.baseline, 40);
        assert_eq!(one.released(), 1);
    }
}
