use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use wlights::config::{load_config_file, resolve_settings, Overrides, Settings};
use wlights::error_codes::{envelope_for, exit_code_for, CodedError};
use wlights::geometry::{generate, GeometryPreset, RegionCoords};
use wlights::patcher::PatchReport;
use wlights::pipeline::{apply_to_database, check_file, patch_file, ApplyRequest, PatchFileRequest};
use wlights::settings_db::default_settings_db_path;

const SETUP_STEPS: &str = "\
Before continuing, prepare a World of Warcraft lighting profile in G Hub:

  1. Create a keyboard lighting profile for World of Warcraft.
  2. Set it to use the Screen Sampler lighting effect.
  3. Edit the sampler and rename the five default regions to wl11, wl12,
     wl13, wl14 and wl15 (lowercase w, lowercase l).
  4. Optionally add regions wl16, wl21..wl26 and wl31..wl36 yourself;
     missing ones are created automatically when only wl11..wl15 exist.
  5. Close the screen sampler editor.
  6. Quit G Hub completely so it no longer controls your lights.

Assign keys to the regions after restarting G Hub.
";

#[derive(Debug, Parser)]
#[command(name = "wlights")]
#[command(version)]
#[command(about = "Align G Hub screen sampler regions to the WoW Lights 6x3 grid")]
struct Cli {
    /// Print results and failures as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the 18 generated sampler rectangles.
    Grid {
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Report which lighting profiles in a settings JSON file can be patched.
    Check { input: PathBuf },
    /// Patch a settings JSON file and write the result to a new file.
    Patch {
        input: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Patch the newest settings row inside G Hub's settings.db.
    Apply {
        /// Path to settings.db; defaults to the G Hub data directory.
        #[arg(long)]
        db: Option<PathBuf>,
        /// Directory for the prior/changed JSON snapshots.
        #[arg(long = "snapshot-dir")]
        snapshot_dir: Option<PathBuf>,
        /// Skip the interactive confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
}

#[derive(Debug, Args)]
struct GeometryArgs {
    /// YAML config file with geometry and screen defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Starting values: default, mac or windows.
    #[arg(long)]
    preset: Option<String>,
    /// Pixel height of one scan cell.
    #[arg(long = "grid-size")]
    grid_size: Option<u32>,
    /// Horizontal stretch factor.
    #[arg(long = "aspect-scale")]
    aspect_scale: Option<f64>,
    /// Horizontal pixel offset applied to every region.
    #[arg(long, allow_negative_numbers = true)]
    shift: Option<i32>,
    /// Pixels trimmed from each cell's edges.
    #[arg(long)]
    margin: Option<u32>,
    /// Apparent screen width in pixels.
    #[arg(long)]
    width: Option<u32>,
    /// Apparent screen height in pixels.
    #[arg(long)]
    height: Option<u32>,
}

impl GeometryArgs {
    fn resolve(&self) -> Result<Settings> {
        let preset = self
            .preset
            .as_deref()
            .map(GeometryPreset::from_keyword)
            .transpose()?;
        let overrides = Overrides {
            preset,
            grid_size: self.grid_size,
            aspect_scale: self.aspect_scale,
            shift: self.shift,
            margin: self.margin,
            width: self.width,
            height: self.height,
        };
        let file = load_config_file(self.config.as_deref())?;
        resolve_settings(&file, &overrides)
    }

    fn coords(&self) -> Result<RegionCoords> {
        let settings = self.resolve()?;
        let screen = settings.screen()?;
        tracing::info!(%screen, params = ?settings.params, "using screen geometry");
        Ok(generate(screen, &settings.params))
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_mode = cli.json;
    if let Err(error) = run(cli) {
        if json_mode {
            let envelope = envelope_for(&error);
            match serde_json::to_string_pretty(&envelope) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("error: {error:#}"),
            }
        } else {
            eprintln!("error: {error:#}");
        }
        process::exit(exit_code_for(&error));
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Grid { geometry } => run_grid(&geometry, cli.json),
        Commands::Check { input } => run_check(&input, cli.json),
        Commands::Patch {
            input,
            output,
            geometry,
        } => run_patch(&input, &output, &geometry, cli.json),
        Commands::Apply {
            db,
            snapshot_dir,
            yes,
            geometry,
        } => run_apply(db, snapshot_dir, yes, &geometry, cli.json),
    }
}

fn run_grid(geometry: &GeometryArgs, json_mode: bool) -> Result<()> {
    let coords = geometry.coords()?;
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&coords)?);
        return Ok(());
    }

    println!("region        top     bottom       left      right");
    for (name, rect) in coords.iter() {
        println!(
            "{name}    {:>9.6}  {:>9.6}  {:>9.6}  {:>9.6}",
            rect.top, rect.bottom, rect.left, rect.right
        );
    }
    Ok(())
}

fn run_check(input: &Path, json_mode: bool) -> Result<()> {
    let validation = check_file(input)?;
    if json_mode {
        let report = json!({
            "ok": true,
            "full_profiles": validation.full,
            "partial_profiles": validation.partial,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("OK: {}", input.display());
    println!("Profiles with 18 regions: {}", validation.full);
    println!("Profiles with 5 regions (will be extended): {}", validation.partial);
    Ok(())
}

fn run_patch(input: &Path, output: &Path, geometry: &GeometryArgs, json_mode: bool) -> Result<()> {
    let coords = geometry.coords()?;
    let report = patch_file(
        &PatchFileRequest {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        },
        &coords,
    )?;

    if json_mode {
        let mut summary = report_json(&report);
        summary["output"] = json!(output.display().to_string());
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_report(&report);
    println!("Wrote {}", output.display());
    Ok(())
}

fn run_apply(
    db: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    yes: bool,
    geometry: &GeometryArgs,
    json_mode: bool,
) -> Result<()> {
    let db_path = match db {
        Some(path) => path,
        None => default_settings_db_path()?,
    };
    let coords = geometry.coords()?;

    if !yes {
        confirm_setup()?;
    }

    let summary = apply_to_database(
        &ApplyRequest {
            db_path: db_path.clone(),
            snapshot_dir,
        },
        &coords,
    )?;

    if json_mode {
        let mut report = report_json(&summary.report);
        report["row_id"] = json!(summary.row_id);
        report["backup"] = json!(summary.backup_path.display().to_string());
        report["prior_snapshot"] = json!(summary.prior_snapshot.display().to_string());
        report["changed_snapshot"] = json!(summary.changed_snapshot.display().to_string());
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Backed up {} to {}", db_path.display(), summary.backup_path.display());
    print_report(&summary.report);
    println!("The G Hub settings have been updated. You can restart G Hub now.");
    Ok(())
}

fn confirm_setup() -> Result<()> {
    println!("{SETUP_STEPS}");
    print!("Confirm all steps are complete by typing y and pressing ENTER: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if answer.contains(['y', 'Y']) {
        return Ok(());
    }
    Err(anyhow!(CodedError::usage(
        "NOT_CONFIRMED",
        "setup was not confirmed; complete the steps and run again",
    )))
}

fn report_json(report: &PatchReport) -> serde_json::Value {
    json!({
        "ok": true,
        "full_profiles": report.validation.full,
        "partial_profiles": report.validation.partial,
        "extended": report.extended,
        "rewritten": report.rewritten,
    })
}

fn print_report(report: &PatchReport) {
    if report.extended > 0 {
        println!("Extended {} partial screen sampler profiles to 18 regions", report.extended);
    }
    println!("Screen sampler profiles changed: {}", report.rewritten);
}
