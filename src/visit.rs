//! Visit records and the patient cohort
//!
//! The lookup table is a CSV with one row per sampled visit. Rows are grouped
//! by patient, and each visit is classified by how far into infection and how
//! far before treatment it was taken.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const WEEKS_IN_YEAR: u32 = 52;

/// Year of infection a visit falls in, counting from 1
pub fn year_of_infection(weeks_post_infection: u32) -> u32 {
    weeks_post_infection / WEEKS_IN_YEAR + 1
}

/// Whole years remaining before treatment started
pub fn years_pre_art(weeks_pre_art: u32) -> u32 {
    weeks_pre_art / WEEKS_IN_YEAR
}

/// A single sampled timepoint for one patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub patient_id: String,
    pub visit_code: u32,
    /// Weeks post infection. 0 marks reference samples.
    pub weeks_post_infection: u32,
    /// Weeks left before ART started
    pub weeks_pre_art: u32,
}

impl VisitRecord {
    pub fn new(
        patient_id: impl Into<String>,
        visit_code: u32,
        weeks_post_infection: u32,
        weeks_pre_art: u32,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            visit_code,
            weeks_post_infection,
            weeks_pre_art,
        }
    }

    pub fn year_of_infection(&self) -> u32 {
        year_of_infection(self.weeks_post_infection)
    }

    pub fn years_pre_art(&self) -> u32 {
        years_pre_art(self.weeks_pre_art)
    }

    /// Reference/outgroup samples are recorded at 0 WPI
    pub fn is_reference(&self) -> bool {
        self.weeks_post_infection == 0
    }
}

/// One row of the lookup table
#[derive(Debug, Deserialize)]
struct LookupRow {
    #[serde(rename = "PID")]
    pid: String,
    #[serde(rename = "Visit Code")]
    visit_code: u32,
    #[serde(rename = "Weeks post infection")]
    weeks_post_infection: u32,
    #[serde(rename = "Weeks pre-ART")]
    weeks_pre_art: u32,
}

/// All visits for all patients, keyed by patient then visit code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cohort {
    patients: BTreeMap<String, BTreeMap<u32, VisitRecord>>,
}

impl Cohort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a visit, rejecting a second visit with the same code for a patient
    pub fn insert(&mut self, visit: VisitRecord) -> Result<()> {
        let visits = self.patients.entry(visit.patient_id.clone()).or_default();
        if visits.contains_key(&visit.visit_code) {
            return Err(Error::DuplicateVisit {
                patient: visit.patient_id,
                visit_code: visit.visit_code,
            });
        }
        visits.insert(visit.visit_code, visit);
        Ok(())
    }

    /// Read the lookup table from a CSV file
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Read the lookup table from any reader. Unknown columns are ignored.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut cohort = Self::new();

        for row in rdr.deserialize() {
            let row: LookupRow = row?;
            cohort.insert(VisitRecord::new(
                row.pid,
                row.visit_code,
                row.weeks_post_infection,
                row.weeks_pre_art,
            ))?;
        }

        tracing::debug!(
            patients = cohort.patient_count(),
            visits = cohort.visit_count(),
            "loaded lookup table"
        );
        Ok(cohort)
    }

    pub fn contains_patient(&self, patient_id: &str) -> bool {
        self.patients.contains_key(patient_id)
    }

    /// Visits of one patient, ordered by visit code
    pub fn patient(&self, patient_id: &str) -> Option<impl Iterator<Item = &VisitRecord>> {
        self.patients.get(patient_id).map(|v| v.values())
    }

    pub fn patient_ids(&self) -> impl Iterator<Item = &str> {
        self.patients.keys().map(String::as_str)
    }

    /// Every visit, ordered by patient id then visit code
    pub fn visits(&self) -> impl Iterator<Item = &VisitRecord> {
        self.patients.values().flat_map(|v| v.values())
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn visit_count(&self) -> usize {
        self.patients.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}
