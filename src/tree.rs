//! Phylogenetic tree leaves
//!
//! Leaf names carry sample metadata as `_`-separated fields, e.g.
//! `CAP336_4210_138WPI_NEF_1_NGS_353_0.001`. Field 2 is the sample's weeks
//! post infection with a `WPI` suffix. Reference sequences use `000WPI`.

use crate::colour::ColouredVisit;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Index of the WPI field in a leaf name
pub const WPI_FIELD: usize = 2;

/// Unit marker after the week count
pub const WPI_SUFFIX: &str = "WPI";

/// Terminal node labels of a Newick tree, in file order.
///
/// Internal node labels, branch lengths and `[...]` comments are skipped.
/// Quoted labels are unquoted. Unnamed leaves are not reported.
pub fn list_leaf_names(newick: &str) -> Result<Vec<String>> {
    let mut leaves = Vec::new();
    let mut chars = newick.chars().peekable();
    let mut depth: usize = 0;
    // A label straight after ')' names an internal node
    let mut after_close = false;

    while let Some(c) = chars.next() {
        match c {
            '(' => {
                depth += 1;
                after_close = false;
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| Error::Newick {
                    reason: "unbalanced ')'".to_string(),
                })?;
                after_close = true;
            }
            ',' => after_close = false,
            ';' => break,
            '[' => {
                if !chars.by_ref().any(|c| c == ']') {
                    return Err(Error::Newick {
                        reason: "unterminated comment".to_string(),
                    });
                }
            }
            ':' => {
                // Branch length
                while let Some(&next) = chars.peek() {
                    if matches!(next, ',' | ')' | ';' | '[') {
                        break;
                    }
                    chars.next();
                }
            }
            c if c.is_whitespace() => {}
            '\'' => {
                let mut label = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            label.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => label.push(c),
                        None => {
                            return Err(Error::Newick {
                                reason: "unterminated quoted label".to_string(),
                            })
                        }
                    }
                }
                if !after_close {
                    leaves.push(label);
                }
            }
            c => {
                let mut label = String::from(c);
                while let Some(&next) = chars.peek() {
                    if matches!(next, '(' | ')' | ',' | ':' | ';' | '[' | '\'') || next.is_whitespace() {
                        break;
                    }
                    label.push(next);
                    chars.next();
                }
                if !after_close {
                    leaves.push(label);
                }
            }
        }
    }

    if depth != 0 {
        return Err(Error::Newick {
            reason: format!("{} unclosed '('", depth),
        });
    }

    Ok(leaves)
}

/// Read a Newick file and list its leaves
pub fn read_leaf_names(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    list_leaf_names(&text)
}

fn malformed(leaf: &str, reason: impl Into<String>) -> Error {
    Error::MalformedLeafName {
        leaf: leaf.to_string(),
        reason: reason.into(),
    }
}

/// Weeks post infection encoded in a leaf name
pub fn leaf_wpi(leaf: &str) -> Result<u32> {
    let field = leaf
        .split('_')
        .nth(WPI_FIELD)
        .ok_or_else(|| malformed(leaf, "missing WPI field"))?;

    let upper = field.to_ascii_uppercase();
    let count = upper.strip_suffix(WPI_SUFFIX).unwrap_or(&upper);

    count
        .parse::<u32>()
        .map_err(|e| malformed(leaf, format!("'{}' is not a week count ({})", field, e)))
}

/// Distinct non-reference WPIs present among the leaves
pub fn tree_wpis<S: AsRef<str>>(leaves: &[S]) -> Result<BTreeSet<u32>> {
    let mut wpis = BTreeSet::new();
    for leaf in leaves {
        let wpi = leaf_wpi(leaf.as_ref())?;
        if wpi != 0 {
            wpis.insert(wpi);
        }
    }
    Ok(wpis)
}

/// Keep only the visits whose WPI appears in this tree. Order is preserved.
pub fn prune_to_tree<'a, S: AsRef<str>>(
    visits: impl IntoIterator<Item = &'a ColouredVisit>,
    leaves: &[S],
) -> Result<Vec<&'a ColouredVisit>> {
    let wpis = tree_wpis(leaves)?;
    Ok(visits
        .into_iter()
        .filter(|cv| wpis.contains(&cv.weeks_post_infection()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::assign_colours;
    use crate::visit::{Cohort, VisitRecord};

    #[test]
    fn test_list_leaf_names() {
        let nwk = "((CAP336_4210_138WPI_NEF_1_NGS_353_0.001:0.01,CAP336_2000_004WPI_NEF_1_NGS_12_0.2:0.02)0.95:0.1,CAP336_xxxx_000WPI_NEF_1_OGV_B-W39:0.3);";
        let leaves = list_leaf_names(nwk).unwrap();
        assert_eq!(
            leaves,
            vec![
                "CAP336_4210_138WPI_NEF_1_NGS_353_0.001",
                "CAP336_2000_004WPI_NEF_1_NGS_12_0.2",
                "CAP336_xxxx_000WPI_NEF_1_OGV_B-W39",
            ]
        );
    }

    #[test]
    fn test_list_leaf_names_skips_internal_labels_and_comments() {
        let nwk = "(('A b'[&support=1]:1,B)inner:2,C)root;\n";
        let leaves = list_leaf_names(nwk).unwrap();
        assert_eq!(leaves, vec!["A b", "B", "C"]);
    }

    #[test]
    fn test_list_leaf_names_quote_escape() {
        let leaves = list_leaf_names("('it''s',x);").unwrap();
        assert_eq!(leaves, vec!["it's", "x"]);
    }

    #[test]
    fn test_list_leaf_names_unbalanced() {
        assert!(matches!(list_leaf_names("((A,B);"), Err(Error::Newick { .. })));
        assert!(matches!(list_leaf_names("(A,B));"), Err(Error::Newick { .. })));
    }

    #[test]
    fn test_leaf_wpi() {
        assert_eq!(leaf_wpi("CAP336_4210_138WPI_NEF_1_NGS_353_0.001").unwrap(), 138);
        assert_eq!(leaf_wpi("CAP336_4210_004wpi_NEF").unwrap(), 4);
        assert_eq!(leaf_wpi("CAP336_xxxx_000WPI_NEF_1_OGV_B-W39").unwrap(), 0);
    }

    #[test]
    fn test_leaf_wpi_malformed() {
        let err = leaf_wpi("CONSENSUS_C_ENV_2004LANL").unwrap_err();
        match err {
            Error::MalformedLeafName { leaf, .. } => assert_eq!(leaf, "CONSENSUS_C_ENV_2004LANL"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(leaf_wpi("CAP1_2").is_err());
    }

    #[test]
    fn test_prune_keeps_only_tree_wpis() {
        let mut cohort = Cohort::new();
        for (code, wpi) in [(1, 0), (2, 4), (3, 53), (4, 106)] {
            cohort.insert(VisitRecord::new("CAP336", code, wpi, 300)).unwrap();
        }
        let coloured = assign_colours(&cohort).unwrap();

        let leaves = [
            "CAP336_2000_004WPI_NEF_1_NGS_12_0.2",
            "CAP336_2100_106WPI_NEF_1_NGS_3_0.1",
            "CAP336_xxxx_000WPI_NEF_1_OGV_B-W39",
        ];
        let kept = prune_to_tree(coloured.patient("CAP336"), &leaves[..]).unwrap();
        let wpis: Vec<u32> = kept.iter().map(|cv| cv.weeks_post_infection()).collect();
        assert_eq!(wpis, vec![4, 106]);
    }

    #[test]
    fn test_prune_fails_on_malformed_leaf() {
        let cohort = Cohort::new();
        let coloured = assign_colours(&cohort).unwrap();
        let leaves = ["CAP336_2000_abcWPI_NEF"];
        assert!(prune_to_tree(coloured.visits(), &leaves[..]).is_err());
    }
}
