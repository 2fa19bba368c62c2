use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use herdscope::report::{self, Format};
use herdscope::{ingest, render_with, DashboardView, FilterParams, FrameRate, Pipeline, RowPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "herdscope")]
#[command(author, version, about = "Summarize and chart animal-tracking detections")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Tracking file or directory (optional in GUI mode)
    path: Option<PathBuf>,

    /// Launch GUI file picker (auto-enabled when double-clicked)
    #[arg(long)]
    gui: bool,

    /// Output report file (.html, .json, .csv, .xlsx); single input only
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "herdscope-reports")]
    report_dir: PathBuf,

    /// Format for auto-generated reports
    #[arg(long, default_value = "html")]
    format: String,

    /// Don't auto-generate a report
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open report
    #[arg(long)]
    no_open: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Video frame rate used for elapsed seconds
    #[arg(long, env = "HERDSCOPE_FPS", default_value = "25", value_parser = parse_fps)]
    fps: FrameRate,

    /// Only these subject ids (comma-separated)
    #[arg(long)]
    ids: Option<String>,

    /// Only these actions (comma-separated, any case)
    #[arg(long)]
    actions: Option<String>,

    /// First frame to include
    #[arg(long)]
    frame_min: Option<i64>,

    /// Last frame to include
    #[arg(long)]
    frame_max: Option<i64>,

    /// Skip rows whose values don't convert instead of failing the file
    #[arg(long)]
    skip_invalid_rows: bool,

    /// Show pipeline details
    #[arg(short, long)]
    verbose: bool,

    /// Only show totals
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the interactive dashboard
    Serve {
        /// Tracking file to preload
        path: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, env = "HERDSCOPE_PORT", default_value = "3001")]
        port: u16,

        /// Initial frame rate
        #[arg(long, env = "HERDSCOPE_FPS", default_value = "25", value_parser = parse_fps)]
        fps: FrameRate,

        /// Skip rows whose values don't convert instead of rejecting the file
        #[arg(long)]
        skip_invalid_rows: bool,

        /// Log pipeline details
        #[arg(short, long)]
        verbose: bool,
    },
}

fn parse_fps(s: &str) -> std::result::Result<FrameRate, String> {
    s.parse::<FrameRate>().map_err(|e| e.to_string())
}

fn row_policy(skip: bool) -> RowPolicy {
    if skip {
        RowPolicy::Skip
    } else {
        RowPolicy::Strict
    }
}

fn init_logging(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Outcome for one input file.
struct FileReport {
    path: PathBuf,
    view: herdscope::Result<DashboardView>,
}

impl FileReport {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    // Handle subcommands first
    if let Some(Command::Serve { path, port, fps, skip_invalid_rows, verbose }) = args.command {
        init_logging(if verbose { "herdscope=debug" } else { "herdscope=info" });
        let pipeline = Pipeline::new()
            .with_frame_rate(fps)
            .with_row_policy(row_policy(skip_invalid_rows));
        herdscope::serve::start(port, path, pipeline).context("server error")?;
        return Ok(());
    }

    init_logging(if args.verbose { "herdscope=debug" } else { "herdscope=warn" });

    // With GUI feature: launch GUI if --gui flag OR no path provided
    #[cfg(feature = "gui")]
    let use_gui = args.gui || args.path.is_none();

    #[cfg(not(feature = "gui"))]
    let use_gui = false;

    let path = match args.path.clone() {
        Some(p) if !use_gui => p,
        _ => match pick_path(use_gui) {
            Some(p) => p,
            None => {
                eprintln!("No file or folder selected.");
                return Ok(());
            }
        },
    };

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let files = collect_files(&path);
    if files.is_empty() {
        bail!(
            "no tracking files found in {} (supported: {})",
            path.display(),
            ingest::SUPPORTED_EXTENSIONS.join(", ")
        );
    }
    if args.output.is_some() && files.len() > 1 {
        bail!("--output needs a single input file; use --report-dir for directories");
    }

    if !args.quiet {
        eprintln!("\x1b[1mHerdscope - Tracking Summary\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} tracking file(s)\n", files.len());
    }

    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let pipeline = Pipeline::new()
        .with_frame_rate(args.fps)
        .with_row_policy(row_policy(args.skip_invalid_rows));
    let params = FilterParams {
        ids: args.ids.as_deref().map(FilterParams::parse_ids),
        actions: args.actions.as_deref().map(FilterParams::parse_actions),
        frame_min: args.frame_min,
        frame_max: args.frame_max,
    };

    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| {
            let view = pipeline
                .load_path(path)
                .map(|dataset| render_with(&dataset, &params));
            let report = FileReport { path: path.clone(), view };
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(report.name());
            }
            report
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !args.quiet {
        for r in &reports {
            print_report(r, args.verbose);
        }
    }

    let failed = reports.iter().filter(|r| r.view.is_err()).count();
    let detections: usize = reports
        .iter()
        .filter_map(|r| r.view.as_ref().ok())
        .map(|v| v.rows.len())
        .sum();

    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Loaded:\x1b[0m     {}", reports.len() - failed);
        eprintln!("  \x1b[36m  Detections:\x1b[0m {}", detections);
        if failed > 0 {
            eprintln!("  \x1b[31m✗ Failed:\x1b[0m     {}", failed);
        }
    }

    let mut written = Vec::new();
    if args.output.is_some() || !args.no_report {
        let format = Format::from_extension(&args.format);
        let root = walk_root(&path);
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        for r in &reports {
            let Ok(view) = &r.view else { continue };
            let output_path = match args.output {
                Some(ref output) => output.clone(),
                None => auto_report_path(&args.report_dir, &root, &r.path, format, &timestamp)?,
            };
            report::generate(&output_path, view)
                .with_context(|| format!("failed to write report {}", output_path.display()))?;
            if !args.quiet {
                eprintln!("\x1b[32mReport saved: {}\x1b[0m", output_path.display());
            }
            written.push(output_path);
        }
    }

    // Offer to open when there is exactly one report to look at
    if let [output_path] = written.as_slice() {
        if !args.no_open {
            if use_gui {
                let _ = open::that(output_path);
            } else if !args.quiet && prompt_yes("\nOpen report? [Y/n] ") {
                if let Err(e) = open::that(output_path) {
                    eprintln!("Failed to open report: {}", e);
                }
            }
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mDone.\x1b[0m");
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn collect_files(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && ingest::is_supported(&e.path().to_string_lossy()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    }
}

/// Directory that report names are taken relative to.
fn walk_root(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

/// `a/run.csv` under `root` becomes `a_run`.
fn report_label(root: &Path, input: &Path) -> String {
    let relative = input.strip_prefix(root).unwrap_or(input).with_extension("");
    let label = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .filter(|c| !c.is_empty() && c != "/" && c != "." && c != "..")
        .collect::<Vec<_>>()
        .join("_");
    if label.is_empty() {
        "tracking".to_string()
    } else {
        label
    }
}

/// A path in `report_dir` that no existing report uses. Inputs whose labels
/// collide (`run.csv` next to `run.xlsx`) get `-2`, `-3`, ...
fn auto_report_path(
    report_dir: &Path,
    root: &Path,
    input: &Path,
    format: Format,
    timestamp: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(report_dir)
        .with_context(|| format!("cannot create {}", report_dir.display()))?;
    let base = format!("{}_{}", report_label(root, input), timestamp);

    let mut candidate = report_dir.join(format!("{}.{}", base, format.extension()));
    let mut n = 2;
    while candidate.exists() {
        candidate = report_dir.join(format!("{}-{}.{}", base, n, format.extension()));
        n += 1;
    }
    Ok(candidate)
}

fn print_report(r: &FileReport, verbose: bool) {
    let view = match &r.view {
        Ok(view) => view,
        Err(e) => {
            println!("\x1b[31m{:<10}\x1b[0m {}  {}", "[ERROR]", r.name(), e);
            return;
        }
    };

    println!(
        "\x1b[32m{:<10}\x1b[0m {}  ({} rows, {} subjects, {} fps)",
        "[OK]",
        r.name(),
        view.summary.total_frames,
        view.summary.subjects,
        view.frame_rate
    );

    if view.summary.is_empty() {
        println!("           \x1b[90mno rows match the filters\x1b[0m");
        return;
    }

    println!(
        "           {:>6}  {:<14} {:>8} {:>12} {:>8}",
        "ID", "ACTION", "FRAMES", "SECONDS", "SHARE"
    );
    for row in &view.summary.rows {
        println!(
            "           {:>6}  {:<14} {:>8} {:>12.2} {:>7.2}%",
            row.subject_id,
            truncate(&row.action, 14),
            row.frame_count,
            row.duration_seconds,
            row.percentage
        );
    }

    if verbose {
        eprintln!(
            "    frames {}..{}  extra columns: {}",
            view.selection.frames.min,
            view.selection.frames.max,
            if view.columns.len() > 8 { view.columns[7..view.columns.len() - 1].join(",") } else { "-".to_string() }
        );
    }
}

fn prompt_yes(question: &str) -> bool {
    eprint!("{}", question);
    io::stderr().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    let input = input.trim().to_lowercase();
    input.is_empty() || input == "y" || input == "yes"
}

#[cfg(feature = "gui")]
fn pick_path(use_gui: bool) -> Option<PathBuf> {
    if !use_gui {
        return None;
    }
    rfd::FileDialog::new()
        .set_title("Select tracking file")
        .add_filter("Tracking files", ingest::SUPPORTED_EXTENSIONS)
        .pick_file()
        .or_else(|| {
            rfd::FileDialog::new()
                .set_title("Select folder of tracking files")
                .pick_folder()
        })
}

#[cfg(not(feature = "gui"))]
fn pick_path(_use_gui: bool) -> Option<PathBuf> {
    eprintln!("Usage: herdscope <PATH>");
    eprintln!("Run 'herdscope --help' for more options.");
    eprintln!("Note: GUI mode not available in this build.");
    None
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
