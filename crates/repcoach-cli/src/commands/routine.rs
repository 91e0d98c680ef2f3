use clap::Subcommand;
use repcoach_core::plan::format_rest_time;
use repcoach_core::{ApiClient, Config, WorkoutPlan};

#[derive(Subcommand)]
pub enum RoutineAction {
    /// List available routines
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a routine's exercises and estimated duration
    Show {
        /// Routine ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: RoutineAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let api = ApiClient::new(&config.api.base_url)?;
    let runtime = tokio::runtime::Runtime::new()?;

    match action {
        RoutineAction::List { json } => {
            let routines = runtime.block_on(api.list_routines())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&routines)?);
                return Ok(());
            }
            if routines.is_empty() {
                println!("no routines found");
                return Ok(());
            }
            for routine in routines {
                if routine.description.is_empty() {
                    println!("{}  {}", routine.id, routine.name);
                } else {
                    println!("{}  {}  -  {}", routine.id, routine.name, routine.description);
                }
            }
        }
        RoutineAction::Show { id, json } => {
            let (routine, exercises) = runtime.block_on(async {
                let routine = api.fetch_routine(&id).await?;
                let exercises = api.fetch_exercises(&id).await?;
                Ok::<_, repcoach_core::ApiError>((routine, exercises))
            })?;

            let Some(routine) = routine else {
                eprintln!("routine not found: {id}");
                std::process::exit(1);
            };

            let plan = WorkoutPlan::new(routine, exercises)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }

            println!("{}", plan.routine.name);
            if !plan.routine.description.is_empty() {
                println!("{}", plan.routine.description);
            }
            println!();
            for exercise in plan.exercises() {
                println!(
                    "  {}. {}  {} x {} reps, rest {}",
                    exercise.ordinal + 1,
                    exercise.name,
                    exercise.sets,
                    exercise.reps,
                    format_rest_time(exercise.rest_secs)
                );
            }
            println!();
            println!("estimated duration: {} min", plan.estimated_duration_min());
        }
    }
    Ok(())
}
