//! Styling directives: which leaves to select and how to draw them

use crate::colour::{ColouredVisit, Rgb};
use crate::config::StyleConfig;
use crate::error::{Error, Result};
use regex::Regex;

/// A selector plus the attributes to set on the leaves it matches.
/// Attributes left as `None` are not touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDirective {
    /// Regular expression over leaf names
    pub selector: String,
    pub label_colour: Option<Rgb>,
    pub node_size: Option<u32>,
    pub node_shape: Option<String>,
    pub font: Option<String>,
    pub fill_colour: Option<Rgb>,
}

impl StyleDirective {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            label_colour: None,
            node_size: None,
            node_shape: None,
            font: None,
            fill_colour: None,
        }
    }

    pub fn label_colour(mut self, colour: Rgb) -> Self {
        self.label_colour = Some(colour);
        self
    }

    pub fn node_size(mut self, size: u32) -> Self {
        self.node_size = Some(size);
        self
    }

    pub fn node_shape(mut self, shape: impl Into<String>) -> Self {
        self.node_shape = Some(shape.into());
        self
    }

    pub fn font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    pub fn fill_colour(mut self, colour: Rgb) -> Self {
        self.fill_colour = Some(colour);
        self
    }

    /// Check that the selector compiles
    pub fn validate(&self) -> Result<()> {
        Regex::new(&self.selector)
            .map(|_| ())
            .map_err(|source| Error::InvalidSelector {
                selector: self.selector.clone(),
                source,
            })
    }
}

/// Selector for sample leaves at one WPI, e.g. `(.*(004WPI)).*(NGS).*`
pub fn wpi_selector(wpi: u32, sample_marker: &str) -> String {
    format!("(.*({:03}WPI)).*({}).*", wpi, sample_marker)
}

/// One directive per visit: label coloured by the visit's colour
pub fn visit_directive(visit: &ColouredVisit, style: &StyleConfig) -> StyleDirective {
    StyleDirective::new(wpi_selector(visit.weeks_post_infection(), &style.sample_marker))
        .label_colour(visit.colour())
        .font(style.visit_font.as_str())
}

/// Reference/outgroup leaves. Not tied to any visit.
pub fn reference_directive(style: &StyleConfig) -> StyleDirective {
    StyleDirective::new(style.reference_marker.as_str())
        .label_colour(style.reference_colour)
        .node_shape(style.reference_shape.as_str())
        .node_size(style.reference_size)
        .font(style.reference_font.as_str())
        .fill_colour(style.reference_fill)
}

/// Directives for a tree: visits in the given order, then the reference
/// directive.
pub fn build_directives<'a>(
    visits: impl IntoIterator<Item = &'a ColouredVisit>,
    style: &StyleConfig,
) -> Result<Vec<StyleDirective>> {
    let mut directives: Vec<StyleDirective> = visits
        .into_iter()
        .map(|visit| visit_directive(visit, style))
        .collect();
    directives.push(reference_directive(style));

    for directive in &directives {
        directive.validate()?;
    }
    Ok(directives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::assign_colours;
    use crate::visit::{Cohort, VisitRecord};

    #[test]
    fn test_wpi_selector() {
        assert_eq!(wpi_selector(4, "NGS"), "(.*(004WPI)).*(NGS).*");
        assert_eq!(wpi_selector(138, "NGS"), "(.*(138WPI)).*(NGS).*");
        assert_eq!(wpi_selector(1040, "NGS"), "(.*(1040WPI)).*(NGS).*");
    }

    #[test]
    fn test_selector_matches_sample_leaves_only() {
        let re = Regex::new(&format!("^{}$", wpi_selector(4, "NGS"))).unwrap();
        assert!(re.is_match("CAP336_2000_004WPI_NEF_1_NGS_12_0.2"));
        assert!(!re.is_match("CAP336_2000_104WPI_NEF_1_NGS_12_0.2"));
        assert!(!re.is_match("CAP336_xxxx_004WPI_NEF_1_OGV_B-W39"));
        assert!(!re.is_match("CAP336_2000_053WPI_NEF_1_NGS_12_0.2"));
    }

    #[test]
    fn test_build_directives_order_and_attributes() {
        let mut cohort = Cohort::new();
        cohort.insert(VisitRecord::new("CAP1", 1, 60, 300)).unwrap();
        cohort.insert(VisitRecord::new("CAP1", 2, 4, 300)).unwrap();
        let coloured = assign_colours(&cohort).unwrap();
        let style = StyleConfig::default();

        let directives = build_directives(coloured.visits(), &style).unwrap();
        assert_eq!(directives.len(), 3);
        assert_eq!(directives[0].selector, "(.*(004WPI)).*(NGS).*");
        assert_eq!(directives[1].selector, "(.*(060WPI)).*(NGS).*");
        assert_eq!(directives[0].font.as_deref(), Some("arial-italic-8"));
        assert_eq!(directives[0].node_shape, None);
        assert_eq!(directives[0].fill_colour, None);

        let reference = &directives[2];
        assert_eq!(reference, &reference_directive(&style));
        assert_eq!(reference.selector, "OGV");
        assert_eq!(reference.node_size, Some(20));
        assert_eq!(reference.font.as_deref(), Some("arial-bold-16"));
    }

    #[test]
    fn test_reference_directive_always_present() {
        let directives = build_directives(std::iter::empty(), &StyleConfig::default()).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].selector, "OGV");
    }

    #[test]
    fn test_invalid_marker_rejected() {
        let style = StyleConfig {
            reference_marker: "OGV(".to_string(),
            ..StyleConfig::default()
        };
        let err = build_directives(std::iter::empty(), &style).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }
}
