use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use tokio::sync::mpsc;

use repcoach_core::plan::format_rest_time;
use repcoach_core::timer::{Countdown, CountdownEvent};
use repcoach_core::{
    AnnouncementKey, AnnouncementKind, AnnouncementPlayer, AnnouncementResolver, ApiClient,
    Config, SessionPhase, WorkoutPlan, WorkoutSession, DEFAULT_REST_SECS,
};

use crate::player::RodioPlayer;

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// Run a guided workout session
    Run {
        /// Routine ID
        routine: String,
        /// Disable announcement audio
        #[arg(long)]
        silent: bool,
        /// Advance automatically without prompting
        #[arg(long)]
        auto: bool,
    },
}

pub fn run(action: WorkoutAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        WorkoutAction::Run {
            routine,
            silent,
            auto,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_session(&routine, silent, auto))
        }
    }
}

/// User intents raised against the current phase.
enum Intent {
    Next,
    Back,
    Quit,
}

fn parse_intent(line: &str) -> Option<Intent> {
    match line.trim() {
        "" | "n" | "next" => Some(Intent::Next),
        "b" | "back" => Some(Intent::Back),
        "q" | "quit" | "exit" => Some(Intent::Quit),
        _ => None,
    }
}

/// Feeds stdin lines into the async loop. The reader thread exits with
/// the process; there is no clean shutdown for a blocked stdin read.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::BufRead::read_line(&mut stdin.lock(), &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

async fn next_intent(lines: &mut mpsc::UnboundedReceiver<String>, auto: bool) -> Intent {
    if auto {
        tokio::time::sleep(Duration::from_secs(1)).await;
        return Intent::Next;
    }
    loop {
        match lines.recv().await {
            Some(line) => {
                if let Some(intent) = parse_intent(&line) {
                    return intent;
                }
                println!("  (Enter = next, b = back, q = quit)");
            }
            // stdin closed: treat as quit rather than spinning.
            None => return Intent::Quit,
        }
    }
}

async fn announce(resolver: &AnnouncementResolver, key: AnnouncementKey, autoplay: bool) {
    let Some(engine) = resolver.engine_for(&key).await else {
        return;
    };
    if autoplay {
        engine.autoplay().await;
        if engine.awaiting_gesture().await {
            // The user already acted by launching the session; that is
            // our gesture equivalent.
            engine.play().await;
        }
    } else {
        engine.play().await;
    }
}

async fn hush(resolver: &AnnouncementResolver, key: AnnouncementKey) {
    if let Some(engine) = resolver.engine_for(&key).await {
        engine.pause().await;
    }
}

async fn run_session(
    routine_id: &str,
    silent: bool,
    auto: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let api = Arc::new(ApiClient::new(&config.api.base_url)?);

    let routine = match api.fetch_routine(routine_id).await? {
        Some(routine) => routine,
        None => {
            eprintln!("routine not found: {routine_id}");
            std::process::exit(1);
        }
    };
    let exercises = api.fetch_exercises(routine_id).await?;
    let plan = WorkoutPlan::new(routine, exercises)?;

    let player: Arc<dyn AnnouncementPlayer> = if silent {
        Arc::new(repcoach_core::audio::NullPlayer)
    } else {
        Arc::new(RodioPlayer::new(config.audio.volume))
    };
    let resolver = AnnouncementResolver::new(api, player);
    // Resolution runs in the background; playback falls back to
    // streaming for anything not yet materialized.
    let _handles = resolver.resolve_plan(&plan).await;

    let mut session = WorkoutSession::new(plan);
    let mut lines = spawn_stdin_reader();
    let autoplay = config.audio.autoplay && !silent;

    println!("{}", session.plan().routine.name);
    println!(
        "estimated duration: {} min\n",
        session.plan().estimated_duration_min()
    );

    loop {
        match session.phase() {
            SessionPhase::Warmup { .. } => {
                println!("Warm up. First up: {}", session.snapshot().exercise);
                announce(&resolver, AnnouncementKey::intro(), autoplay).await;
                match next_intent(&mut lines, auto).await {
                    Intent::Next => {
                        session.advance();
                    }
                    // Back from warmup exits the session.
                    Intent::Back | Intent::Quit => {
                        session.exit();
                    }
                }
                hush(&resolver, AnnouncementKey::intro()).await;
            }
            SessionPhase::Exercising { position } => {
                let snap = session.snapshot();
                println!(
                    "\n{}  set {} of {}  ({} reps)",
                    snap.exercise, snap.set, snap.total_sets_for_exercise, snap.reps
                );
                let key = AnnouncementKey::for_set(
                    &session.plan().exercises()[position.exercise].id,
                    position.set,
                    AnnouncementKind::ExerciseStart,
                );
                announce(&resolver, key.clone(), autoplay).await;
                match next_intent(&mut lines, auto).await {
                    Intent::Next => {
                        session.advance();
                    }
                    Intent::Back => {
                        session.back();
                    }
                    Intent::Quit => {
                        session.exit();
                    }
                }
                hush(&resolver, key).await;
            }
            SessionPhase::Resting { position, next } => {
                let duration = session.rest_duration_secs().unwrap_or(DEFAULT_REST_SECS);
                let upcoming = &session.plan().exercises()[next.exercise];
                println!(
                    "\nRest {}  (next: {}, set {})",
                    format_rest_time(duration),
                    upcoming.name,
                    next.set
                );
                let key = AnnouncementKey::for_set(
                    &session.plan().exercises()[position.exercise].id,
                    position.set,
                    AnnouncementKind::RestStart,
                );
                announce(&resolver, key.clone(), autoplay).await;

                run_rest_timer(&mut session, &mut lines, duration, auto).await;
                hush(&resolver, key).await;
            }
            SessionPhase::Complete => {
                let snap = session.snapshot();
                println!(
                    "\nWorkout complete. {} sets done.",
                    snap.plan_total_sets
                );
                break;
            }
        }
        if session.is_over() {
            println!("\nSession ended.");
            break;
        }
    }

    resolver.release_all().await;
    Ok(())
}

/// Drives the rest countdown, honoring skip/back/quit while it runs.
/// Leaving the phase by any route stops the timer first.
async fn run_rest_timer(
    session: &mut WorkoutSession,
    lines: &mut mpsc::UnboundedReceiver<String>,
    duration_secs: u32,
    auto: bool,
) {
    let mut countdown = Countdown::new();
    countdown.start(if auto { 1 } else { duration_secs });
    let mut interval = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match countdown.tick() {
                    Some(CountdownEvent::Tick { remaining_secs }) => {
                        print!("\r  {}   ", format_rest_time(remaining_secs));
                        let _ = std::io::stdout().flush();
                    }
                    Some(CountdownEvent::Completed) => {
                        println!();
                        session.advance();
                        return;
                    }
                    None => {}
                }
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    countdown.stop();
                    session.exit();
                    return;
                };
                match parse_intent(&line) {
                    Some(Intent::Next) => {
                        countdown.stop();
                        println!();
                        session.advance();
                        return;
                    }
                    Some(Intent::Back) => {
                        countdown.stop();
                        println!();
                        session.back();
                        return;
                    }
                    Some(Intent::Quit) => {
                        countdown.stop();
                        println!();
                        session.exit();
                        return;
                    }
                    None => {}
                }
            }
        }
    }
}
