//! skillsim - run manipulation skills against a point-mass arm.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use serde_json::json;
use skill_core::report::ReportWriter;
use skill_core::{ControllerConfig, SkillController, SkillKind};
use skillsim::{run_script, Script};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "skillsim", about = "Run parameterized skills in a kinematic simulator", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a JSON skill script
    Run {
        /// Path to the script
        #[arg(long)]
        script: PathBuf,

        /// Controller config file (key=value)
        #[arg(long, env = "SKILLSIM_CONFIG")]
        config: Option<PathBuf>,

        /// Append one TSV row per skill execution
        #[arg(long)]
        report: Option<PathBuf>,

        /// Collect one image observation per step
        #[arg(long)]
        image_obs: bool,
    },

    /// Print the parameter count of every skill
    Dims {
        /// Controller config file (key=value)
        #[arg(long, env = "SKILLSIM_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Run {
            script,
            config,
            report,
            image_obs,
        } => run(&script, config.as_deref(), report.as_deref(), image_obs),
        Command::Dims { config } => dims(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> eyre::Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::from_file(path)
            .wrap_err_with(|| format!("failed to load config {}", path.display())),
        None => Ok(ControllerConfig::default()),
    }
}

fn run(
    script_path: &Path,
    config: Option<&Path>,
    report: Option<&Path>,
    image_obs: bool,
) -> eyre::Result<()> {
    let mut controller =
        SkillController::new(load_config(config)?).wrap_err("invalid controller config")?;
    let image_obs = image_obs || controller.image_obs_in_info();

    let script = Script::from_file(script_path)
        .wrap_err_with(|| format!("failed to load script {}", script_path.display()))?;
    let mut env = script.environment();

    let mut writer = report
        .map(|path| {
            ReportWriter::new(path)
                .wrap_err_with(|| format!("failed to open report {}", path.display()))
        })
        .transpose()?;

    let results = run_script(&mut controller, &mut env, &script, writer.as_mut(), image_obs)
        .wrap_err("script aborted")?;

    for (step, result) in script.steps.iter().zip(&results) {
        let summary = json!({
            "skill": step.skill,
            "num_ac_calls": result.num_ac_calls,
            "skill_success": result.skill_success,
            "reward": result.reward,
            "aff_reward": result.aff_reward,
            "aff_success": result.aff_success,
            "done": result.done,
            "images": result.image_obs.len(),
        });
        println!("{summary}");
    }
    Ok(())
}

fn dims(config: Option<&Path>) -> eyre::Result<()> {
    let controller = SkillController::new(load_config(config)?).wrap_err("invalid controller config")?;
    for kind in SkillKind::ALL {
        println!("{}\t{}", kind, controller.param_dim(kind.as_str())?);
    }
    Ok(())
}
