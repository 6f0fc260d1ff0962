//! Dendrostyle - colour phylogenetic tree leaves by time since infection
//!
//! Longitudinal visits are coloured for the whole cohort at once, then each
//! patient's tree gets a Dendroscope command file that styles its leaves.
//!
//! # Colour classes
//!
//! | Class | Rule | Colour |
//! |-------|------|--------|
//! | Acute | first year of infection | red |
//! | Intermediate | years 2-6, more than a year before ART | per-year hue, drifting by WPI |
//! | Pre-treatment | final year before ART | blue, drifting by WPI |
//!
//! # Quick Start
//!
//! ```no_run
//! use dendrostyle::{assign_colours, Cohort, Config, OutputLayout};
//! use std::path::Path;
//!
//! let cohort = Cohort::from_csv_path(Path::new("lookup.csv")).unwrap();
//! let coloured = assign_colours(&cohort).unwrap();
//!
//! let layout = OutputLayout::prepare(Path::new("out")).unwrap();
//! let report = dendrostyle::process_tree(
//!     Path::new("trees/CAP336_nef.nwk"),
//!     &coloured,
//!     &layout,
//!     &Config::default(),
//!     None,
//! )
//! .unwrap();
//! println!("wrote {}", report.command_file.display());
//! ```

pub mod colour;
pub mod command;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod style;
pub mod tree;
pub mod visit;

pub use colour::{assign_colours, ColourClass, ColouredCohort, ColouredVisit, Rgb};
pub use command::{build_command, ExportTargets};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{
    find_trees, patient_id_for_tree, process_tree, process_trees, BatchReport, OutputLayout,
    Renderer, TreeReport,
};
pub use style::{build_directives, StyleDirective};
pub use tree::{list_leaf_names, prune_to_tree};
pub use visit::{Cohort, VisitRecord};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify core types are re-exported from crate root
        let _ = Config::default();
        let _ = Cohort::new();
    }
}
