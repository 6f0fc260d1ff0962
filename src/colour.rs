//! Colour assignment for a visit cohort
//!
//! Colours mark how far into infection a sample was taken:
//!
//! | Class | Colour |
//! |-------|--------|
//! | First year of infection | red, identical for every visit |
//! | Years 2-6 | one base hue per year (orange, yellow, green, teal, light blue) |
//! | Final year before ART | blue |
//!
//! Inside a year, and inside the pre-ART group, visits are ranked by WPI and
//! each rank nudges the hue by [`HUE_STEP`]. The drift is barely visible but
//! keeps temporally adjacent samples next to each other in hue.

use crate::error::{Error, Result};
use crate::visit::{Cohort, VisitRecord};
use palette::encoding::Srgb as SrgbStandard;
use palette::{FromColor, Hsl, Srgb};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hue drift per rank, in normalized hue units (0..1 is the full circle)
pub const HUE_STEP: f64 = 0.001;

/// Integer RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn to_hsl(self) -> Hsl<SrgbStandard, f64> {
        let rgb = Srgb::<u8>::new(self.r, self.g, self.b).into_format::<f64>();
        Hsl::from_color(rgb)
    }

    fn from_hsl(hsl: Hsl<SrgbStandard, f64>) -> Self {
        let rgb = Srgb::<f64>::from_color(hsl);
        Self::new(
            unit_to_byte(rgb.red),
            unit_to_byte(rgb.green),
            unit_to_byte(rgb.blue),
        )
    }
}

fn unit_to_byte(c: f64) -> u8 {
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Rgb {
    /// Dendroscope's colour syntax: "r g b"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)
    }
}

/// Every first-year visit
pub const ACUTE_COLOUR: Rgb = Rgb::new(255, 0, 0);

/// Base of the final-year-before-ART gradient
pub const PRE_TREATMENT_COLOUR: Rgb = Rgb::new(0, 0, 255);

/// Base colour for an intermediate year of infection
pub fn year_base_colour(year: u32) -> Option<Rgb> {
    match year {
        2 => Some(Rgb::new(0xff, 0x73, 0x00)), // Orange
        3 => Some(Rgb::new(0xff, 0xea, 0x00)), // Yellow
        4 => Some(Rgb::new(0x00, 0xff, 0x00)), // Green
        5 => Some(Rgb::new(0x00, 0xff, 0xb7)), // Teal
        6 => Some(Rgb::new(0x87, 0xce, 0xeb)), // Light blue
        _ => None,
    }
}

/// Why a visit got its colour
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColourClass {
    /// First year of infection
    Acute,
    /// Year 2 or later, more than a year before ART
    Intermediate { year: u32, rank: usize, hue: f64 },
    /// Final year before ART
    PreTreatment { rank: usize, hue: f64 },
}

impl ColourClass {
    /// Normalized hue before wrapping, for the gradient classes
    pub fn hue(&self) -> Option<f64> {
        match *self {
            ColourClass::Acute => None,
            ColourClass::Intermediate { hue, .. } | ColourClass::PreTreatment { hue, .. } => {
                Some(hue)
            }
        }
    }
}

impl fmt::Display for ColourClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColourClass::Acute => write!(f, "acute"),
            ColourClass::Intermediate { year, rank, .. } => write!(f, "year {} #{}", year, rank),
            ColourClass::PreTreatment { rank, .. } => write!(f, "pre-ART #{}", rank),
        }
    }
}

/// A visit together with its assigned colour. Only built by
/// [`assign_colours`], so a coloured visit always has a colour.
#[derive(Debug, Clone, PartialEq)]
pub struct ColouredVisit {
    visit: VisitRecord,
    colour: Rgb,
    class: ColourClass,
}

impl ColouredVisit {
    pub fn visit(&self) -> &VisitRecord {
        &self.visit
    }

    pub fn colour(&self) -> Rgb {
        self.colour
    }

    pub fn class(&self) -> ColourClass {
        self.class
    }

    pub fn patient_id(&self) -> &str {
        &self.visit.patient_id
    }

    pub fn weeks_post_infection(&self) -> u32 {
        self.visit.weeks_post_infection
    }
}

/// Flat, serializable view of a coloured visit
#[derive(Debug, Serialize)]
pub struct VisitSummary<'a> {
    pub code: u32,
    pub patient: &'a str,
    pub wpi: u32,
    pub year_of_infection: u32,
    pub wpa: u32,
    pub years_pre_art: u32,
    pub colour: Rgb,
    pub class: ColourClass,
}

impl<'a> From<&'a ColouredVisit> for VisitSummary<'a> {
    fn from(cv: &'a ColouredVisit) -> Self {
        Self {
            code: cv.visit.visit_code,
            patient: &cv.visit.patient_id,
            wpi: cv.visit.weeks_post_infection,
            year_of_infection: cv.visit.year_of_infection(),
            wpa: cv.visit.weeks_pre_art,
            years_pre_art: cv.visit.years_pre_art(),
            colour: cv.colour,
            class: cv.class,
        }
    }
}

/// The whole cohort after colouring. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColouredCohort {
    visits: Vec<ColouredVisit>,
}

impl ColouredCohort {
    /// All visits: acute first, then each intermediate year in ascending
    /// order, then pre-ART. WPI ascending within each group.
    pub fn visits(&self) -> &[ColouredVisit] {
        &self.visits
    }

    /// One patient's visits, in the same order as [`Self::visits`]
    pub fn patient<'a>(&'a self, patient_id: &'a str) -> impl Iterator<Item = &'a ColouredVisit> + 'a {
        self.visits.iter().filter(move |cv| cv.patient_id() == patient_id)
    }

    pub fn contains_patient(&self, patient_id: &str) -> bool {
        self.visits.iter().any(|cv| cv.patient_id() == patient_id)
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// patient -> visit code -> summary, for dumping as JSON
    pub fn summary(&self) -> BTreeMap<&str, BTreeMap<u32, VisitSummary<'_>>> {
        let mut out: BTreeMap<&str, BTreeMap<u32, VisitSummary<'_>>> = BTreeMap::new();
        for cv in &self.visits {
            out.entry(cv.patient_id())
                .or_default()
                .insert(cv.visit.visit_code, VisitSummary::from(cv));
        }
        out
    }
}

/// Colour every visit in the cohort.
///
/// Fails with [`Error::UnsupportedYear`] if any intermediate visit falls in a
/// year without a base colour; no partial result is returned.
pub fn assign_colours(cohort: &Cohort) -> Result<ColouredCohort> {
    let mut acute: Vec<&VisitRecord> = Vec::new();
    let mut years: BTreeMap<u32, Vec<&VisitRecord>> = BTreeMap::new();
    let mut pre_treatment: Vec<&VisitRecord> = Vec::new();

    for visit in cohort.visits() {
        match visit.year_of_infection() {
            1 => acute.push(visit),
            _ if visit.years_pre_art() == 0 => pre_treatment.push(visit),
            year => years.entry(year).or_default().push(visit),
        }
    }

    let mut visits = Vec::with_capacity(cohort.visit_count());

    sort_by_wpi(&mut acute);
    visits.extend(acute.into_iter().map(|visit| ColouredVisit {
        visit: visit.clone(),
        colour: ACUTE_COLOUR,
        class: ColourClass::Acute,
    }));

    for (year, mut bucket) in years {
        let base = match year_base_colour(year) {
            Some(base) => base,
            None => {
                let visit = bucket[0];
                return Err(Error::UnsupportedYear {
                    patient: visit.patient_id.clone(),
                    visit_code: visit.visit_code,
                    wpi: visit.weeks_post_infection,
                    year,
                });
            }
        };
        sort_by_wpi(&mut bucket);
        visits.extend(gradient(base, &bucket, |rank, hue| ColourClass::Intermediate {
            year,
            rank,
            hue,
        }));
    }

    sort_by_wpi(&mut pre_treatment);
    visits.extend(gradient(PRE_TREATMENT_COLOUR, &pre_treatment, |rank, hue| {
        ColourClass::PreTreatment { rank, hue }
    }));

    tracing::info!(visits = visits.len(), "assigned visit colours");
    Ok(ColouredCohort { visits })
}

/// Stable, so equal WPIs keep patient then visit-code order
fn sort_by_wpi(visits: &mut [&VisitRecord]) {
    visits.sort_by_key(|v| v.weeks_post_infection);
}

/// Drift the base hue by one step per rank. Ranks start at 0 for every call.
fn gradient(
    base: Rgb,
    bucket: &[&VisitRecord],
    class: impl Fn(usize, f64) -> ColourClass,
) -> Vec<ColouredVisit> {
    let base_hsl = base.to_hsl();
    let base_hue = base_hsl.hue.into_positive_degrees() / 360.0;

    bucket
        .iter()
        .enumerate()
        .map(|(rank, visit)| {
            let hue = base_hue + rank as f64 * HUE_STEP;
            let hsl = Hsl::<SrgbStandard, f64>::new(
                hue * 360.0,
                base_hsl.saturation,
                base_hsl.lightness,
            );
            ColouredVisit {
                visit: (*visit).clone(),
                colour: Rgb::from_hsl(hsl),
                class: class(rank, hue),
            }
        })
        .collect()
}
