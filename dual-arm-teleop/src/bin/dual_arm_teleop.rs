use anyhow::{ensure, Result};
use clap::Parser;
use dual_arm_controller::{
    arm_config::{ConfigFile, DualArmConfig, DualLeaderConfig},
    arm_driver::{ArmDevice, TeleopDevice},
    dual_follower::DualArmDevice,
    dual_leader::DualArmTeleoperator,
    simulated::{SimulatedArm, SimulatedLeader},
};
use dual_arm_teleop::logging;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser)]
#[command(author, version, about = "Mirror two leader arms onto two follower arms")]
struct Args {
    /// Follower arms config (yaml), bundled config when omitted
    #[arg(long)]
    robot_config: Option<String>,

    /// Leader arms config (yaml), bundled config when omitted
    #[arg(long)]
    teleop_config: Option<String>,

    /// Control loop rate in Hz
    #[arg(long, default_value_t = 30.0)]
    fps: f32,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f32>,

    /// Swing of the simulated leaders around their home position
    #[arg(long, default_value_t = 30.0)]
    amplitude: f32,

    /// Period of the simulated leader motion in seconds
    #[arg(long, default_value_t = 4.0)]
    period: f32,

    /// Connect without calibrating
    #[arg(long)]
    skip_calibration: bool,

    /// Log as json
    #[arg(long)]
    json: bool,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbose, args.json);
    ensure!(
        args.fps > 0.0 && args.fps <= 1000.0,
        "fps must be within (0, 1000], got {}",
        args.fps
    );
    ensure!(
        args.period.is_finite() && args.period >= 0.0,
        "period must not be negative, got {}",
        args.period
    );
    let duration = match args.duration {
        Some(seconds) => {
            ensure!(
                seconds.is_finite() && seconds >= 0.0,
                "duration must not be negative, got {}",
                seconds
            );
            Some(Duration::from_secs_f32(seconds))
        }
        None => None,
    };

    let robot_config = match &args.robot_config {
        Some(path) => DualArmConfig::load_yaml(path)?,
        None => DualArmConfig::included()?,
    };
    let teleop_config = match &args.teleop_config {
        Some(path) => DualLeaderConfig::load_yaml(path)?,
        None => DualLeaderConfig::included()?,
    };

    let mut robot = DualArmDevice::from_config(robot_config, |_, config| {
        Ok(SimulatedArm::new(config.clone()) as Box<dyn ArmDevice>)
    })?;
    let amplitude = args.amplitude;
    let period = Duration::from_secs_f32(args.period);
    let mut teleop = DualArmTeleoperator::from_config(teleop_config, |_, config| {
        let leader = SimulatedLeader::new(config.clone()).with_motion(amplitude, period);
        Ok(leader as Box<dyn TeleopDevice>)
    })?;

    let calibrate = !args.skip_calibration;
    robot.connect(calibrate).await?;
    teleop.connect(calibrate).await?;

    let keep_running = Arc::new(AtomicBool::new(true));

    tokio::spawn({
        let keep_running = keep_running.clone();
        async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to wait for Ctrl+c: {}", error);
                return;
            }
            tracing::info!("Detected Ctrl+c");
            keep_running.store(false, Ordering::Relaxed);
        }
    });

    let result = run(
        &mut robot,
        &mut teleop,
        args.fps,
        duration,
        keep_running.as_ref(),
    )
    .await;

    tracing::info!("Disconnecting");
    let robot_disconnect = robot.disconnect().await;
    let teleop_disconnect = teleop.disconnect().await;
    result?;
    robot_disconnect?;
    teleop_disconnect?;
    Ok(())
}

async fn run(
    robot: &mut DualArmDevice,
    teleop: &mut DualArmTeleoperator,
    fps: f32,
    duration: Option<Duration>,
    keep_running: &AtomicBool,
) -> Result<()> {
    let mut ticker = interval(Duration::from_secs_f32(1.0 / fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let start = Instant::now();
    let mut cycles: u64 = 0;

    while keep_running.load(Ordering::Relaxed) {
        if duration.map_or(false, |duration| start.elapsed() >= duration) {
            break;
        }
        ticker.tick().await;
        let action = teleop.get_action().await?;
        let sent = robot.send_action(action).await?;
        tracing::trace!("Sent {:?}", sent);
        cycles += 1;
        if cycles % fps.ceil() as u64 == 0 {
            let observation = robot.get_observation().await?;
            tracing::debug!("Observation {:?}", observation);
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    tracing::info!(
        "Ran {} cycles in {:.1}s ({:.1} Hz)",
        cycles,
        elapsed,
        cycles as f32 / elapsed.max(f32::EPSILON)
    );
    Ok(())
}
