use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::anyhow;
use btleplug::{
    api::{Central as _, Manager as _, ScanFilter},
    platform::{Adapter, Manager},
};
use clap::{Parser, Subcommand};
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use domino_draw::{DrawConfig, Inbox, TurnRate};
use domino_protocol::{ManualCommand, PathStep};
use futures::StreamExt;

use crate::connection::{Domino, DominoLike};
use crate::simulator::Simulator;

mod connection;
mod simulator;
mod svg;
mod trace;

const TICK: Duration = Duration::from_millis(50);

/// How much one key press changes the manual turn rate.
const TURN_INCREMENT: i8 = 10;

#[derive(Parser)]
struct Args {
    /// Engine tuning, as JSON. Only the simulator uses this; the robot has
    /// its own copy.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Send a path (an SVG drawing, or a JSON list of steps) to the robot.
    Send {
        path: PathBuf,
        /// Millimeters per drawing unit.
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        /// Start drawing as soon as the path is sent.
        #[arg(long)]
        start: bool,
    },
    /// Follow a path with simulated wheels and draw the result.
    Simulate {
        path: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[arg(long, default_value = "simulated.svg")]
        out: PathBuf,
        /// Driving speed, in mm/s.
        #[arg(long, default_value_t = 100.0)]
        speed: f64,
        /// Give up after this many simulated seconds.
        #[arg(long, default_value_t = 600.0)]
        timeout: f64,
    },
    /// Drive the robot with the keyboard.
    Manual,
    /// Print the robot's status as it changes.
    Status,
}

#[derive(Debug)]
enum Error {
    Exit,
    Err(anyhow::Error),
}

impl<E> From<E> for Error
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Error::Err(e.into())
    }
}

type Result<T> = std::result::Result<T, Error>;

fn load_config(path: Option<&Path>) -> anyhow::Result<DrawConfig> {
    match path {
        Some(path) => Ok(serde_json::from_reader(std::fs::File::open(path)?)?),
        None => Ok(DrawConfig::default()),
    }
}

fn load_path(path: &Path, scale: f64) -> anyhow::Result<Vec<PathStep>> {
    if path.extension().is_some_and(|ext| ext == "json") {
        return Ok(serde_json::from_reader(std::fs::File::open(path)?)?);
    }
    let drawing = svg::load_svg(path)?;
    let points = svg::first_polyline(&drawing, svg::TOLERANCE);
    let steps = trace::trace(&points, scale);
    log::info!("traced {} points into {} steps", points.len(), steps.len());
    Ok(steps)
}

fn start_drawing() -> ManualCommand {
    ManualCommand {
        moving: true,
        manual_mode: false,
        ..ManualCommand::default()
    }
}

async fn drive_with_keys(domino: &mut impl DominoLike) -> Result<()> {
    let mut events = EventStream::new();
    let mut cmd = ManualCommand::default();

    while let Some(ev) = events.next().await.transpose()? {
        let Event::Key(ev) = ev else {
            continue;
        };
        if ev.kind != KeyEventKind::Press {
            continue;
        }
        match ev.code {
            KeyCode::Char('q') => {
                cmd.moving = false;
                domino.send_manual(cmd).await?;
                return Err(Error::Exit);
            }
            KeyCode::Char(' ') => cmd.moving = !cmd.moving,
            KeyCode::Char('c') => cmd.direction = 0,
            KeyCode::Char('d') => cmd.dispensing = !cmd.dispensing,
            KeyCode::Char('e') => cmd.stop_on_empty = !cmd.stop_on_empty,
            KeyCode::Left => cmd.direction = steer(cmd.direction, -TURN_INCREMENT),
            KeyCode::Right => cmd.direction = steer(cmd.direction, TURN_INCREMENT),
            _ => continue,
        }
        domino.send_manual(cmd).await?;
    }
    Err(anyhow!("event stream ended").into())
}

fn steer(direction: i8, by: i8) -> i8 {
    TurnRate::saturating(direction.saturating_add(by)).get()
}

async fn manual_drive(domino: &mut impl DominoLike) -> Result<()> {
    eprintln!("<space> to start/stop, arrows to steer, c to center, d to toggle dispensing,");
    eprintln!("e to toggle stopping when empty, q to quit.");
    enable_raw_mode()?;
    let err = drive_with_keys(domino).await;
    disable_raw_mode()?;
    err
}

async fn send_file(
    domino: &mut impl DominoLike,
    path: &Path,
    scale: f64,
    start: bool,
) -> Result<()> {
    let steps = load_path(path, scale)?;
    domino.send_path(&steps).await?;
    if start {
        domino.send_manual(start_drawing()).await?;
    }
    Ok(())
}

async fn simulate(
    config: &DrawConfig,
    path: &Path,
    scale: f64,
    out: &Path,
    speed: f64,
    timeout: f64,
) -> anyhow::Result<()> {
    let inbox = Inbox::from_config(config);
    let mut sim = Simulator::new(&inbox, config, speed);

    let steps = load_path(path, scale)?;
    sim.send_path(&steps).await?;
    sim.send_manual(start_drawing()).await?;
    if !sim.run(timeout) {
        eprintln!("gave up after {timeout} simulated seconds");
    }
    let status = sim.read_status().await?;
    eprintln!("drove {}mm", status.distance_traveled_mm);
    sim.illustrate(out)?;
    Ok(())
}

async fn handle_connection(adapter: &Adapter, args: &Args) -> Result<()> {
    let mut domino = Domino::new(adapter.clone()).await?;
    let status = domino.read_status().await?;
    eprintln!("status: {status:?}");

    match &args.cmd {
        Cmd::Send { path, scale, start } => send_file(&mut domino, path, *scale, *start).await,
        Cmd::Manual => manual_drive(&mut domino).await,
        Cmd::Status => {
            let mut statuses = domino.status_stream().await?;
            while let Some(status) = statuses.next().await {
                eprintln!("status: {:?}", status?);
            }
            Err(anyhow!("status stream ended").into())
        }
        Cmd::Simulate { .. } => unreachable!(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    if let Cmd::Simulate {
        path,
        scale,
        out,
        speed,
        timeout,
    } = &args.cmd
    {
        let config = load_config(args.config.as_deref())?;
        return simulate(&config, path, *scale, out, *speed, *timeout).await;
    }

    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(anyhow!("no bluetooth adapter"))?;
    adapter.start_scan(ScanFilter::default()).await?;
    loop {
        match handle_connection(&adapter, &args).await {
            Err(Error::Err(e)) => eprintln!("lost connection, restarting (cause: {e})"),
            Err(Error::Exit) => {
                eprintln!("exiting...");
                break;
            }
            Ok(()) => break,
        }
    }

    Ok(())
}
