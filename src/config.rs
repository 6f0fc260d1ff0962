//! Configuration file support for dendrostyle
//!
//! Reads from .dendrostyle/config.toml, or from the path given with --config

use crate::colour::Rgb;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// How to launch Dendroscope
    #[serde(default)]
    pub dendroscope: DendroscopeConfig,

    /// Window and layout settings written at the top of every command file
    #[serde(default)]
    pub preamble: PreambleConfig,

    /// Leaf styling
    #[serde(default)]
    pub style: StyleConfig,
}

/// Dendroscope launch settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DendroscopeConfig {
    /// Path to the Dendroscope launcher
    /// Default: "Dendroscope" (looked up on PATH)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Arguments placed before --commandFile
    /// Default: ["-g"] (no GUI)
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Command prefix for headless hosts, e.g. ["xvfb-run", "--auto-servernum"]
    #[serde(default)]
    pub wrapper: Vec<String>,
}

fn default_binary() -> String {
    "Dendroscope".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-g".to_string()]
}

impl Default for DendroscopeConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            args: default_args(),
            wrapper: Vec::new(),
        }
    }
}

/// Settings for the command file preamble
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PreambleConfig {
    pub width: u32,
    pub height: u32,
    /// Drawer for the main image, e.g. CircularPhylogram
    pub drawer: String,
    pub zoom: String,
    pub radial_labels: bool,
    /// left, right or random
    pub ladderize: String,
    pub sparse_labels: bool,
}

impl Default for PreambleConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            drawer: "CircularPhylogram".to_string(),
            zoom: "expand".to_string(),
            radial_labels: true,
            ladderize: "right".to_string(),
            sparse_labels: false,
        }
    }
}

/// Leaf styling settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    /// Token every sequenced sample leaf carries
    pub sample_marker: String,
    /// Font for sample leaf labels
    pub visit_font: String,
    /// Token carried by reference/outgroup leaves
    pub reference_marker: String,
    pub reference_colour: Rgb,
    pub reference_fill: Rgb,
    pub reference_shape: String,
    pub reference_size: u32,
    pub reference_font: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            sample_marker: "NGS".to_string(),
            visit_font: "arial-italic-8".to_string(),
            reference_marker: "OGV".to_string(),
            reference_colour: Rgb::new(255, 61, 240),
            reference_fill: Rgb::new(255, 61, 240),
            reference_shape: "rectangle".to_string(),
            reference_size: 20,
            reference_font: "arial-bold-16".to_string(),
        }
    }
}

impl Config {
    /// Load config from .dendrostyle/config.toml
    /// Returns default config if no file is found
    pub fn load() -> Result<Self> {
        match Self::find_config_path() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load a specific config file. Unlike [`Config::load`], a missing file
    /// is an error.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".dendrostyle").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }
}
