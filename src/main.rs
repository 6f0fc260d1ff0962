use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use dendrostyle::{
    assign_colours, find_trees, process_trees, BatchReport, Cohort, ColouredCohort, Config,
    OutputLayout, Renderer,
};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dendrostyle")]
#[command(author, version, about = "Colour tree leaves by time since infection and render them with Dendroscope")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: nearest .dendrostyle/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Style and render a single tree
    ProcessFile {
        /// Newick tree; the patient id is the first '_' field of its name
        #[arg(long)]
        tree_file: PathBuf,

        /// Visit lookup CSV (PID, Visit Code, Weeks post infection, Weeks pre-ART)
        #[arg(long)]
        lookup_file: PathBuf,

        /// Where images, command files and logs are written
        #[arg(long)]
        output_directory: PathBuf,

        /// Dendroscope launcher (overrides the config file)
        #[arg(long)]
        dendroscope_bin: Option<String>,

        /// Only write command files, don't run Dendroscope
        #[arg(long)]
        no_render: bool,
    },

    /// Style and render every .nwk tree in a directory
    ProcessDir {
        /// Directory of Newick trees
        #[arg(long)]
        tree_directory: PathBuf,

        /// Visit lookup CSV (PID, Visit Code, Weeks post infection, Weeks pre-ART)
        #[arg(long)]
        lookup_file: PathBuf,

        /// Where images, command files and logs are written
        #[arg(long)]
        output_directory: PathBuf,

        /// Dendroscope launcher (overrides the config file)
        #[arg(long)]
        dendroscope_bin: Option<String>,

        /// Only write command files, don't run Dendroscope
        #[arg(long)]
        no_render: bool,

        /// Number of trees processed at once (default: number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Print the colour assigned to every visit
    Colours {
        /// Visit lookup CSV
        #[arg(long)]
        lookup_file: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion script
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "dendrostyle=debug"
    } else {
        "dendrostyle=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("DENDROSTYLE_LOG").unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_path(path),
        None => Config::load(),
    };
    config.context("Failed to load config")
}

fn load_cohort(lookup_file: &Path) -> Result<ColouredCohort> {
    let cohort = Cohort::from_csv_path(lookup_file)
        .with_context(|| format!("Failed to read lookup table {}", lookup_file.display()))?;
    tracing::info!(
        patients = cohort.patient_count(),
        visits = cohort.visit_count(),
        "loaded {}",
        lookup_file.display()
    );
    assign_colours(&cohort).context("Failed to assign visit colours")
}

fn renderer(config: &Config, dendroscope_bin: Option<String>, no_render: bool) -> Option<Renderer> {
    if no_render {
        return None;
    }
    let renderer = Renderer::from_config(&config.dendroscope);
    Some(match dendroscope_bin {
        Some(bin) => renderer.with_binary(bin),
        None => renderer,
    })
}

fn print_summary(report: &BatchReport) {
    let completed = report.completed().count();
    let skipped = report.skipped().count();
    let failed = report.failed().count();

    eprintln!("\n{}", "Summary:".bold());
    eprintln!("  {} {}", "✓ Styled: ".green(), completed);
    if skipped > 0 {
        eprintln!("  {} {}", "- Skipped:".yellow(), skipped);
    }
    if failed > 0 {
        eprintln!("  {} {}", "✗ Failed: ".red(), failed);
        for error in report.failed() {
            eprintln!("    {}", error);
        }
    }
}

fn print_colours(coloured: &ColouredCohort) {
    println!(
        "{:<12} {:>6} {:>5} {:>5}  {:<14} {:<12}",
        "PATIENT", "VISIT", "WPI", "WPA", "CLASS", "RGB"
    );
    for cv in coloured.visits() {
        let visit = cv.visit();
        let colour = cv.colour();
        println!(
            "{:<12} {:>6} {:>5} {:>5}  {:<14} {:<12} {}",
            visit.patient_id,
            visit.visit_code,
            visit.weeks_post_infection,
            visit.weeks_pre_art,
            cv.class().to_string(),
            colour.to_string(),
            "    ".on_truecolor(colour.r, colour.g, colour.b)
        );
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::ProcessFile {
            tree_file,
            lookup_file,
            output_directory,
            dendroscope_bin,
            no_render,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let layout = OutputLayout::prepare(&output_directory).with_context(|| {
                format!("Failed to set up {}", output_directory.display())
            })?;
            let coloured = load_cohort(&lookup_file)?;
            let cohort_file = layout.write_cohort(&coloured)?;
            tracing::debug!("wrote {}", cohort_file.display());

            let renderer = renderer(&config, dendroscope_bin, no_render);
            let report = process_trees(&[tree_file], &coloured, &layout, &config, renderer.as_ref());
            print_summary(&report);
            Ok(!report.has_failures())
        }

        Command::ProcessDir {
            tree_directory,
            lookup_file,
            output_directory,
            dendroscope_bin,
            no_render,
            jobs,
        } => {
            if let Some(jobs) = jobs {
                let _ = rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global();
            }

            let config = load_config(cli.config.as_deref())?;
            let layout = OutputLayout::prepare(&output_directory).with_context(|| {
                format!("Failed to set up {}", output_directory.display())
            })?;
            let coloured = load_cohort(&lookup_file)?;

            let trees = find_trees(&tree_directory)
                .with_context(|| format!("Failed to list {}", tree_directory.display()))?;
            if trees.is_empty() {
                tracing::warn!("no .nwk trees in {}", tree_directory.display());
            }
            tracing::info!(trees = trees.len(), "processing trees");

            let renderer = renderer(&config, dendroscope_bin, no_render);
            let report = process_trees(&trees, &coloured, &layout, &config, renderer.as_ref());
            print_summary(&report);
            Ok(!report.has_failures())
        }

        Command::Colours { lookup_file, json } => {
            let coloured = load_cohort(&lookup_file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&coloured.summary())?);
            } else {
                print_colours(&coloured);
            }
            Ok(true)
        }

        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dendrostyle", &mut io::stdout());
            Ok(true)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
