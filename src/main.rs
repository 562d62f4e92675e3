use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pinch_trigger::{
    LoopStats, MissingHandPolicy, PinchController,
    pipeline::{
        ActionDispatcher, ManualClock,
        dispatch::{ChannelDispatcher, LogDispatcher},
        trace::Trace,
    },
};

#[derive(Parser, Debug)]
#[command(name = "pinch-trigger", about = "Press space by pinching thumb and index finger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List capture devices
    Cameras,
    /// Watch a camera and press space on every confirmed pinch
    Run(RunArgs),
    /// Replay a recorded landmark trace and print every trigger
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct DecisionArgs {
    /// Count frames without a hand as "no pinch" instead of skipping them
    #[arg(long)]
    missing_hand_as_open: bool,

    /// Inject real key presses (needs the input-enigo feature)
    #[arg(long)]
    press: bool,
}

impl DecisionArgs {
    fn policy(&self) -> MissingHandPolicy {
        if self.missing_hand_as_open {
            MissingHandPolicy::CountAsOpen
        } else {
            MissingHandPolicy::Skip
        }
    }
}

#[derive(Args, Debug)]
#[cfg_attr(not(feature = "camera-nokhwa"), allow(dead_code))]
struct RunArgs {
    /// Camera index, as printed by `cameras`
    #[arg(long, default_value_t = 0)]
    camera: u32,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,

    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    #[command(flatten)]
    decision: DecisionArgs,

    /// Landmark detector command line, after `--`
    #[arg(last = true, required = true)]
    detector: Vec<String>,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// JSON-lines landmark trace
    trace: PathBuf,

    /// Frame rate used to stamp lines that carry no `t`
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    #[command(flatten)]
    decision: DecisionArgs,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Cameras => list_cameras(),
        Command::Run(args) => run_live(args),
        Command::Replay(args) => replay(args),
    }
}

fn key_dispatcher(press: bool) -> Result<Box<dyn ActionDispatcher>> {
    if !press {
        return Ok(Box::new(LogDispatcher));
    }

    #[cfg(feature = "input-enigo")]
    {
        Ok(Box::new(pinch_trigger::pipeline::dispatch::KeyDispatcher::new()))
    }
    #[cfg(not(feature = "input-enigo"))]
    {
        bail!("--press needs a build with the input-enigo feature")
    }
}

fn print_stats(stats: &LoopStats) {
    println!(
        "{} frames, {} missed reads, {} with a hand, {} triggers",
        stats.frames, stats.missed_reads, stats.hands, stats.triggers
    );
}

#[cfg(feature = "camera-nokhwa")]
mod live {
    use std::{
        io::{self, BufRead},
        thread,
    };

    use anyhow::{Context, Result, bail};
    use pinch_trigger::{
        PinchController, StopHandle,
        config::CaptureSettings,
        pipeline::{
            CameraEnumerator,
            camera::{CameraFrameSource, NokhwaEnumerator},
            detector::ProcessDetector,
        },
    };

    use super::{RunArgs, key_dispatcher, print_stats};

    pub fn list_cameras() -> Result<()> {
        let cameras = NokhwaEnumerator
            .cameras()
            .context("failed to list cameras")?;
        if cameras.is_empty() {
            bail!("no cameras detected");
        }
        for camera in cameras {
            println!("{:>2}  {}", camera.index, camera.label);
        }
        Ok(())
    }

    /// Stops the controller when a line reading `q` arrives on stdin.
    fn watch_for_quit(stop: StopHandle) {
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                        log::info!("quit requested");
                        stop.stop();
                        return;
                    }
                    Ok(_) => {}
                    Err(_) => return,
                }
            }
        });
    }

    pub fn run_live(args: RunArgs) -> Result<()> {
        let settings = CaptureSettings {
            width: args.width,
            height: args.height,
            fps: args.fps,
        };
        let mut frames = CameraFrameSource::open(args.camera, &settings)
            .with_context(|| format!("failed to open camera {}", args.camera))?;

        let (program, rest) = args
            .detector
            .split_first()
            .context("missing detector command")?;
        let mut detector =
            ProcessDetector::spawn(program, rest).context("failed to start landmark detector")?;

        let mut controller = PinchController::new(key_dispatcher(args.decision.press)?)
            .missing_hand_policy(args.decision.policy());
        watch_for_quit(controller.stop_handle());
        println!("pinch to press space, enter q to quit");

        let stats = controller.run(&mut frames, &mut detector)?;
        print_stats(&stats);
        Ok(())
    }
}

#[cfg(feature = "camera-nokhwa")]
use live::{list_cameras, run_live};

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    bail!("built without camera support; enable the camera-nokhwa feature")
}

#[cfg(not(feature = "camera-nokhwa"))]
fn run_live(_args: RunArgs) -> Result<()> {
    bail!("built without camera support; enable the camera-nokhwa feature")
}

fn replay(args: ReplayArgs) -> Result<()> {
    let trace = Trace::open(&args.trace, args.fps)
        .with_context(|| format!("failed to read trace {}", args.trace.display()))?;
    log::info!("replaying {} frames from {}", trace.len(), args.trace.display());

    let clock = ManualClock::new(Instant::now());
    let (mut frames, mut hands) = trace.into_sources(clock.clone());
    let base = frames.base();

    let (report, triggers) = ChannelDispatcher::unbounded();
    let dispatcher = (report, key_dispatcher(args.decision.press)?);
    let mut controller =
        PinchController::with_clock(dispatcher, clock).missing_hand_policy(args.decision.policy());

    let stats = controller.run(&mut frames, &mut hands)?;

    for event in triggers.try_iter() {
        println!(
            "trigger #{} at {:.3}s (frame {}, {} votes)",
            event.ordinal,
            event.at.saturating_duration_since(base).as_secs_f64(),
            event.frame.map_or_else(|| "-".to_string(), |f| f.to_string()),
            event.votes
        );
    }
    print_stats(&stats);
    Ok(())
}
