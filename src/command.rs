//! Dendroscope command files
//!
//! A command file is a flat script run by `Dendroscope --commandFile`:
//! open the tree, apply styling one `find ...; set ...; deselect all;` block
//! at a time, export the images and quit.

use crate::config::PreambleConfig;
use crate::style::StyleDirective;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Alpha written after label colours
const LABEL_ALPHA: u8 = 255;

/// Alpha written after fill colours
const FILL_ALPHA: u8 = 150;

/// Files Dendroscope writes at the end of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTargets {
    /// Image drawn with the preamble's drawer
    pub circular_image: PathBuf,
    /// Image drawn as a rectangular phylogram
    pub linear_image: PathBuf,
    /// NeXML copy of the styled tree
    pub nexml: PathBuf,
}

impl ExportTargets {
    /// Standard names for a tree with the given file stem
    pub fn for_stem(output_directory: &Path, stem: &str) -> Self {
        Self {
            circular_image: output_directory.join(format!("{}.dendrotree.png", stem)),
            linear_image: output_directory.join(format!("{}.linear.dendrotree.png", stem)),
            nexml: output_directory.join(format!("{}.dendro_nexml.xml", stem)),
        }
    }
}

/// Open the tree and set up the window
pub fn preamble(tree_file: &Path, config: &PreambleConfig) -> String {
    let mut out = String::new();

    writeln!(out, "open file='{}';", tree_file.display()).unwrap();
    writeln!(out, "set window width={} height={};", config.width, config.height).unwrap();
    writeln!(out, "set drawer={};", config.drawer).unwrap();
    writeln!(out, "zoom what={};", config.zoom).unwrap();
    writeln!(out, "set radiallabels={};", config.radial_labels).unwrap();
    writeln!(out, "ladderize={};", config.ladderize).unwrap();
    writeln!(out, "set sparselabels={};", config.sparse_labels).unwrap();

    out
}

/// One find/set/deselect block. Unset attributes produce no line.
pub fn directive_block(directive: &StyleDirective) -> String {
    let mut out = String::new();

    writeln!(
        out,
        "find searchtext='{}' target=Nodes regex=true;",
        directive.selector
    )
    .unwrap();

    if let Some(colour) = directive.label_colour {
        writeln!(out, "set labelcolor={} {};", colour, LABEL_ALPHA).unwrap();
    }
    if let Some(size) = directive.node_size {
        writeln!(out, "set nodesize={};", size).unwrap();
    }
    if let Some(shape) = &directive.node_shape {
        writeln!(out, "set nodeshape={};", shape).unwrap();
    }
    if let Some(font) = &directive.font {
        writeln!(out, "set font={};", font).unwrap();
    }
    if let Some(colour) = directive.fill_colour {
        writeln!(out, "set fillcolor={} {};", colour, FILL_ALPHA).unwrap();
    }

    writeln!(out, "deselect all;").unwrap();

    out
}

/// Export both layouts, save NeXML and quit
pub fn export_block(targets: &ExportTargets) -> String {
    let mut out = String::new();

    writeln!(
        out,
        "exportimage file='{}' format=PNG replace=true;",
        targets.circular_image.display()
    )
    .unwrap();
    writeln!(out, "set drawer=RectangularPhylogram;").unwrap();
    writeln!(
        out,
        "exportimage file='{}' format=PNG replace=true;",
        targets.linear_image.display()
    )
    .unwrap();
    writeln!(out, "save format=NeXML file='{}';", targets.nexml.display()).unwrap();
    writeln!(out, "quit;").unwrap();

    out
}

/// Full command script for one tree
pub fn build_command(
    tree_file: &Path,
    directives: &[StyleDirective],
    targets: &ExportTargets,
    config: &PreambleConfig,
) -> String {
    let mut script = preamble(tree_file, config);
    for directive in directives {
        script.push_str(&directive_block(directive));
    }
    script.push_str(&export_block(targets));
    script
}
