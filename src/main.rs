//! Boss Engine headless runner
//!
//! Spawns one or more bosses on an open map, drives the cursor along a
//! scripted path and logs what happens.

use clap::{Parser, ValueEnum};
use log::{debug, info, warn};

use boss_engine::consts::*;
use boss_engine::sim::{BossKind, GameEvent, GameState, Request, TickInput, TickMetrics, WallGrid, tick};
use boss_engine::tuning::{Difficulty, Tuning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BossChoice {
    Quasar,
    Swarm,
    Storm,
    All,
}

impl BossChoice {
    fn kinds(self) -> Vec<BossKind> {
        match self {
            BossChoice::Quasar => vec![BossKind::Quasar],
            BossChoice::Swarm => vec![BossKind::Swarm],
            BossChoice::Storm => vec![BossKind::Storm],
            BossChoice::All => BossKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "boss-sim", version, about = "Run a headless boss encounter")]
struct Args {
    /// RNG seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
    /// Number of simulation ticks to run
    #[arg(long, default_value_t = 1800)]
    ticks: u64,
    /// JSON balance file (defaults are used for absent fields)
    #[arg(long)]
    tuning: Option<std::path::PathBuf>,
    #[arg(long, value_enum, default_value_t = BossChoice::All)]
    boss: BossChoice,
    /// easy, normal or hard
    #[arg(long, default_value = "normal")]
    difficulty: String,
    /// Log every event at debug level
    #[arg(long, short)]
    verbose: bool,
}

/// Simulated frame deltas: a steady 60 Hz with periodic hitches
fn frame_delta(frame: u64) -> f64 {
    match frame % 50 {
        0 => 0.25,
        n if n % 7 == 0 => 1.0 / 30.0,
        _ => 1.0 / 60.0,
    }
}

/// Lissajous sweep over the map with the shield up a third of the time
fn scripted_input(tick_no: u64, width: i32, height: i32) -> TickInput {
    let t = tick_no as f64 / 60.0;
    let x = (width as f64 / 2.0) * (1.0 + 0.8 * (t * 0.37).sin());
    let y = (height as f64 / 2.0) * (1.0 + 0.7 * (t * 0.61).cos());
    TickInput {
        cursor: Some((x as i32, y as i32)),
        shield: Some((tick_no / 120) % 3 == 2),
    }
}

fn log_event(tick_no: u64, event: &GameEvent) {
    match event {
        GameEvent::EnemyCreated { .. }
        | GameEvent::EnemyKilled { .. }
        | GameEvent::BossDespawned { .. }
        | GameEvent::StormCircleDestroyed { .. }
        | GameEvent::BossPhaseChanged { .. } => info!("[{tick_no}] {event:?}"),
        _ => debug!("[{tick_no}] {event:?}"),
    }
}

fn load_tuning(args: &Args) -> Tuning {
    let mut tuning = match &args.tuning {
        Some(path) => match Tuning::load(path) {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to load tuning from {}: {e}; using defaults", path.display());
                Tuning::default()
            }
        },
        None => Tuning::default(),
    };
    match Difficulty::parse(&args.difficulty) {
        Some(d) => tuning.apply_preset(d),
        None => warn!("Unknown difficulty '{}', using Normal", args.difficulty),
    }
    tuning
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    info!("Boss Engine sim starting (seed {})", args.seed);
    let tuning = load_tuning(&args);
    let (width, height) = (DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT);
    let mut state = GameState::new(args.seed, WallGrid::open(width, height), tuning);

    let kinds = args.boss.kinds();
    let spacing = width / (kinds.len() as i32 + 1);
    for (i, kind) in kinds.into_iter().enumerate() {
        let x = spacing * (i as i32 + 1);
        state.push_request(Request::Spawn { kind, x, y: height / 2 });
    }

    let mut totals = TickMetrics::default();
    let mut accumulator = 0.0;
    let mut frame = 0;
    while state.time_ticks < args.ticks {
        accumulator += frame_delta(frame).min(MAX_DT);
        frame += 1;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS && state.time_ticks < args.ticks {
            let input = scripted_input(state.time_ticks, width, height);
            let metrics = tick(&mut state, &input, SIM_DT);
            totals.merge(&metrics);
            for event in state.drain_events() {
                log_event(state.time_ticks, &event);
            }
            accumulator -= SIM_DT;
            substeps += 1;
        }

        if state.time_ticks % 600 == 0 {
            for snap in state.boss_snapshots() {
                debug!(
                    "{:?} {} hp {}/{} phase {} at ({:.1}, {:.1})",
                    snap.kind, snap.entity, snap.hp, snap.max_hp, snap.phase, snap.position.x, snap.position.y
                );
            }
        }
        if state.world.live_count() == 0 && state.requests.is_empty() {
            info!("No entities left after {} ticks", state.time_ticks);
            break;
        }
    }

    info!("Finished {} ticks over {frame} frames", state.time_ticks);
    for snap in state.boss_snapshots() {
        info!("{:?} {} survived with {}/{} hp ({})", snap.kind, snap.entity, snap.hp, snap.max_hp, snap.phase);
    }
    match serde_json::to_string_pretty(&totals) {
        Ok(json) => info!("Metrics:\n{json}"),
        Err(e) => warn!("Failed to serialize metrics: {e}"),
    }
}
