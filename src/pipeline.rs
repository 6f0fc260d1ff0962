//! Per-tree workflow and batch processing
//!
//! Colours are assigned once for the whole cohort. Each tree is then handled
//! on its own: list its leaves, keep the patient's visits that appear in it,
//! build the styling, write the command file and optionally run Dendroscope.
//! A failure in one tree never stops the others.

use crate::colour::ColouredCohort;
use crate::command::{build_command, ExportTargets};
use crate::config::{Config, DendroscopeConfig};
use crate::error::{Error, Result};
use crate::style::build_directives;
use crate::tree::{prune_to_tree, read_leaf_names};
use rayon::prelude::*;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Extension of tree files picked up from a directory
pub const TREE_EXTENSION: &str = "nwk";

/// Patient id a tree belongs to: the first `_` field of its file stem
pub fn patient_id_for_tree(tree_file: &Path) -> Option<String> {
    let stem = tree_file.file_stem()?.to_str()?;
    stem.split('_').next().filter(|s| !s.is_empty()).map(str::to_string)
}

fn tree_stem(tree_file: &Path) -> String {
    tree_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tree".to_string())
}

/// All `*.nwk` files directly inside a directory, sorted by path
pub fn find_trees(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut trees = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == TREE_EXTENSION).unwrap_or(false) {
            trees.push(path);
        }
    }
    trees.sort();
    Ok(trees)
}

/// Output directory with its `tmp/` and `logs/` subdirectories
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub tmp: PathBuf,
    pub logs: PathBuf,
}

impl OutputLayout {
    /// Create the directories if needed
    pub fn prepare(root: &Path) -> Result<Self> {
        let layout = Self {
            root: root.to_path_buf(),
            tmp: root.join("tmp"),
            logs: root.join("logs"),
        };
        std::fs::create_dir_all(&layout.tmp)?;
        std::fs::create_dir_all(&layout.logs)?;
        Ok(layout)
    }

    pub fn command_file(&self, stem: &str) -> PathBuf {
        self.tmp.join(format!("{}.dendrocmd.txt", stem))
    }

    pub fn log_file(&self, stem: &str) -> PathBuf {
        self.logs.join(format!("{}.dendro.log", stem))
    }

    pub fn cohort_file(&self) -> PathBuf {
        self.tmp.join("patients.json")
    }

    /// Dump the coloured cohort as JSON for inspection
    pub fn write_cohort(&self, cohort: &ColouredCohort) -> Result<PathBuf> {
        let path = self.cohort_file();
        let json = serde_json::to_string_pretty(&cohort.summary())?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Launches Dendroscope on a command file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renderer {
    pub binary: String,
    pub args: Vec<String>,
    pub wrapper: Vec<String>,
}

impl Renderer {
    pub fn from_config(config: &DendroscopeConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            args: config.args.clone(),
            wrapper: config.wrapper.clone(),
        }
    }

    /// Replace the binary, keeping arguments and wrapper
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Full argument vector, program first
    pub fn argv(&self, command_file: &Path) -> Vec<String> {
        let mut argv = self.wrapper.clone();
        argv.push(self.binary.clone());
        argv.extend(self.args.iter().cloned());
        argv.push("--commandFile".to_string());
        argv.push(command_file.display().to_string());
        argv
    }

    /// Run Dendroscope, appending its stdout and stderr to `log_file`
    pub fn render(&self, command_file: &Path, log_file: &Path) -> Result<()> {
        let argv = self.argv(command_file);
        let log = OpenOptions::new().create(true).append(true).open(log_file)?;

        tracing::debug!(command = %argv.join(" "), "launching dendroscope");
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .status()?;

        if !status.success() {
            return Err(Error::Render {
                command: argv.join(" "),
                status,
            });
        }
        Ok(())
    }
}

/// What happened to one tree that was processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeReport {
    pub tree: PathBuf,
    pub patient: String,
    pub command_file: PathBuf,
    /// Styled visits, not counting the reference directive
    pub styled_visits: usize,
    pub rendered: bool,
}

/// Build and write the command file for one tree, then render it if a
/// renderer is given.
pub fn process_tree(
    tree_file: &Path,
    cohort: &ColouredCohort,
    layout: &OutputLayout,
    config: &Config,
    renderer: Option<&Renderer>,
) -> Result<TreeReport> {
    let patient = patient_id_for_tree(tree_file).unwrap_or_default();
    if !cohort.contains_patient(&patient) {
        return Err(Error::MissingVisitData {
            patient,
            tree: tree_file.to_path_buf(),
        });
    }

    let stem = tree_stem(tree_file);
    let leaves = read_leaf_names(tree_file)?;
    let visits = prune_to_tree(cohort.patient(&patient), &leaves)?;
    let styled_visits = visits.len();
    tracing::debug!(
        patient = %patient,
        tree = %tree_file.display(),
        leaves = leaves.len(),
        visits = styled_visits,
        "pruned visits to tree"
    );

    let directives = build_directives(visits, &config.style)?;
    let targets = ExportTargets::for_stem(&layout.root, &stem);
    let script = build_command(tree_file, &directives, &targets, &config.preamble);

    let command_file = layout.command_file(&stem);
    std::fs::write(&command_file, script)?;
    tracing::info!(
        patient = %patient,
        tree = %tree_file.display(),
        "wrote {}",
        command_file.display()
    );

    let rendered = match renderer {
        Some(renderer) => {
            tracing::info!(patient = %patient, tree = %tree_file.display(), "running dendroscope");
            renderer.render(&command_file, &layout.log_file(&stem))?;
            true
        }
        None => false,
    };

    Ok(TreeReport {
        tree: tree_file.to_path_buf(),
        patient,
        command_file,
        styled_visits,
        rendered,
    })
}

/// Outcome of a batch: one entry per tree, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(PathBuf, Result<TreeReport>)>,
}

impl BatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &TreeReport> {
        self.outcomes.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Error> {
        self.outcomes
            .iter()
            .filter_map(|(_, r)| r.as_ref().err())
            .filter(|e| e.is_skip())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Error> {
        self.outcomes
            .iter()
            .filter_map(|(_, r)| r.as_ref().err())
            .filter(|e| !e.is_skip())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Process every tree in parallel. Each tree only reads the shared cohort.
pub fn process_trees(
    trees: &[PathBuf],
    cohort: &ColouredCohort,
    layout: &OutputLayout,
    config: &Config,
    renderer: Option<&Renderer>,
) -> BatchReport {
    let outcomes = trees
        .par_iter()
        .map(|tree| {
            let result = process_tree(tree, cohort, layout, config, renderer)
                .map_err(|e| e.in_tree(tree));
            match &result {
                Err(e) if e.is_skip() => tracing::warn!("skipping tree: {}", e),
                Err(e) => tracing::error!("tree failed: {}", e),
                Ok(_) => {}
            }
            (tree.clone(), result)
        })
        .collect();

    BatchReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::assign_colours;
    use crate::visit::{Cohort, VisitRecord};
    use tempfile::TempDir;

    const TREE: &str = "((CAP336_2000_004WPI_NEF_1_NGS_12_0.2:0.1,CAP336_2100_106WPI_NEF_1_NGS_3_0.1:0.2):0.05,CAP336_xxxx_000WPI_NEF_1_OGV_B-W39:0.3);";

    fn coloured() -> ColouredCohort {
        let mut cohort = Cohort::new();
        for (code, wpi, wpa) in [(1, 4, 300), (2, 53, 250), (3, 106, 200), (4, 160, 20)] {
            cohort.insert(VisitRecord::new("CAP336", code, wpi, wpa)).unwrap();
        }
        cohort.insert(VisitRecord::new("CAP257", 1, 4, 100)).unwrap();
        assign_colours(&cohort).unwrap()
    }

    #[test]
    fn test_patient_id_for_tree() {
        assert_eq!(
            patient_id_for_tree(Path::new("trees/CAP336_env_aligned.nwk")),
            Some("CAP336".to_string())
        );
        assert_eq!(patient_id_for_tree(Path::new("CAP257.nwk")), Some("CAP257".to_string()));
        assert_eq!(patient_id_for_tree(Path::new("_x.nwk")), None);
    }

    #[test]
    fn test_find_trees_sorted_nwk_only() {
        let dir = TempDir::new().unwrap();
        for name in ["b.nwk", "a.nwk", "notes.txt", "c.nwk.bak"] {
            std::fs::write(dir.path().join(name), TREE).unwrap();
        }
        std::fs::create_dir(dir.path().join("d.nwk")).unwrap();

        let trees = find_trees(dir.path()).unwrap();
        let names: Vec<_> = trees
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.nwk", "b.nwk"]);
    }

    #[test]
    fn test_process_tree_writes_pruned_script() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("CAP336_nef.nwk");
        std::fs::write(&tree, TREE).unwrap();
        let layout = OutputLayout::prepare(&dir.path().join("out")).unwrap();

        let report = process_tree(&tree, &coloured(), &layout, &Config::default(), None).unwrap();
        assert_eq!(report.patient, "CAP336");
        assert_eq!(report.styled_visits, 2);
        assert!(!report.rendered);

        let script = std::fs::read_to_string(&report.command_file).unwrap();
        assert!(script.contains("(.*(004WPI)).*(NGS).*"));
        assert!(script.contains("(.*(106WPI)).*(NGS).*"));
        assert!(!script.contains("053WPI"));
        assert!(!script.contains("160WPI"));
        assert_eq!(script.matches("find ").count(), 3);
        assert!(report.command_file.ends_with("tmp/CAP336_nef.dendrocmd.txt"));
    }

    #[test]
    fn test_process_tree_missing_patient() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("CAP999_nef.nwk");
        std::fs::write(&tree, TREE).unwrap();
        let layout = OutputLayout::prepare(dir.path()).unwrap();

        let err = process_tree(&tree, &coloured(), &layout, &Config::default(), None).unwrap_err();
        assert!(err.is_skip());
        assert!(err.to_string().contains("CAP999"));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("CAP336_nef.nwk");
        let bad = dir.path().join("CAP257_nef.nwk");
        let missing = dir.path().join("CAP1_nef.nwk");
        std::fs::write(&good, TREE).unwrap();
        std::fs::write(&bad, "(CAP257_1_xxWPI_NEF_1_NGS,CAP257_2_004WPI_NEF_1_NGS);").unwrap();
        std::fs::write(&missing, TREE).unwrap();
        let layout = OutputLayout::prepare(&dir.path().join("out")).unwrap();

        let trees = find_trees(dir.path()).unwrap();
        let report = process_trees(&trees, &coloured(), &layout, &Config::default(), None);

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.completed().count(), 1);
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(report.failed().count(), 1);
        assert!(report.has_failures());

        let failure = report.failed().next().unwrap().to_string();
        assert!(failure.contains("CAP257_nef.nwk"));
        assert!(failure.contains("xxWPI"));
        assert!(layout.command_file("CAP336_nef").exists());
        assert!(!layout.command_file("CAP257_nef").exists());
    }

    #[test]
    fn test_write_cohort() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::prepare(dir.path()).unwrap();
        let path = layout.write_cohort(&coloured()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["CAP336"]["4"]["wpi"], 160);
        assert_eq!(json["CAP257"]["1"]["class"]["kind"], "acute");
    }

    #[test]
    fn test_renderer_argv() {
        let config = DendroscopeConfig {
            binary: "Dendroscope".to_string(),
            args: vec!["-g".to_string()],
            wrapper: vec!["xvfb-run".to_string(), "--auto-servernum".to_string()],
        };
        let renderer = Renderer::from_config(&config).with_binary("/opt/Dendroscope");
        assert_eq!(
            renderer.argv(Path::new("tmp/a.dendrocmd.txt")),
            vec![
                "xvfb-run",
                "--auto-servernum",
                "/opt/Dendroscope",
                "-g",
                "--commandFile",
                "tmp/a.dendrocmd.txt",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_render_logs_and_reports_exit_status() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("render.log");
        let script = dir.path().join("cmd.txt");
        std::fs::write(&script, "quit;\n").unwrap();

        let ok = Renderer {
            binary: "sh".to_string(),
            args: vec!["-c".to_string(), "echo rendered \"$2\"".to_string(), "sh".to_string()],
            wrapper: Vec::new(),
        };
        ok.render(&script, &log).unwrap();
        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("rendered"));
        assert!(logged.contains("cmd.txt"));

        let failing = Renderer {
            binary: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string(), "sh".to_string()],
            wrapper: Vec::new(),
        };
        let err = failing.render(&script, &log).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }
}
