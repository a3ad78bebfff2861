//! Built-in orthopedic journal catalogue.
//!
//! Journal names are the abbreviations PubMed expects in `[Journal]` clauses.
//! Categories may nest one level of sub-categories.

use serde::Serialize;

/// A single journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Journal {
    /// Short selector id (e.g. "joa")
    pub id: &'static str,
    /// PubMed journal name (e.g. "J Arthroplasty")
    pub name: &'static str,
}

/// A category of journals, optionally split into sub-categories
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub journals: &'static [Journal],
    pub sub_categories: &'static [Category],
}

impl Category {
    /// Every journal in this category and its sub-categories, in catalogue order.
    pub fn all_journals(&self) -> Vec<Journal> {
        let mut out: Vec<Journal> = self.journals.to_vec();
        for sub in self.sub_categories {
            out.extend(sub.all_journals());
        }
        out
    }
}

macro_rules! j {
    ($id:literal, $name:literal) => {
        Journal {
            id: $id,
            name: $name,
        }
    };
}

macro_rules! leaf {
    ($id:literal, $name:literal, [$($journal:expr),* $(,)?] $(,)?) => {
        Category {
            id: $id,
            name: $name,
            journals: &[$($journal),*],
            sub_categories: &[],
        }
    };
}

static SPECIALIZED: &[Category] = &[
    leaf!(
        "sports",
        "Sports Medicine",
        [
            j!("kssta", "Knee Surg Sports Traumatol Arthrosc"),
            j!("arthroscopy", "Arthroscopy"),
            j!("ojsm", "Orthop J Sports Med"),
        ],
    ),
    leaf!(
        "trauma",
        "Trauma",
        [j!("jot-trauma", "J Orthop Trauma"), j!("injury", "Injury")],
    ),
    leaf!(
        "arthroplasty",
        "Arthroplasty / Joint Replacement",
        [j!("joa", "J Arthroplasty"), j!("hip-int", "Hip Int")],
    ),
    leaf!("shoulder", "Shoulder & Elbow", [j!("jse", "J Shoulder Elbow Surg")]),
    leaf!(
        "spine",
        "Spine",
        [
            j!("spine", "Spine (Phila Pa 1976)"),
            j!("ejss", "Eur Spine J"),
            j!("spj", "Spine J"),
            j!("spine-phila", "Spine (Phila Pa 1976)"),
            j!("gsj", "Global Spine J"),
        ],
    ),
    leaf!(
        "foot",
        "Foot & Ankle",
        [j!("fai", "Foot Ankle Int"), j!("fas", "Foot Ankle Surg")],
    ),
    leaf!("pediatric", "Pediatric Orthopedics", [j!("jpo", "J Pediatr Orthop")]),
    leaf!(
        "hand",
        "Hand Surgery",
        [j!("jhsa", "J Hand Surg Am"), j!("jhse", "J Hand Surg Eur Vol")],
    ),
    leaf!(
        "bone",
        "Osteoporosis & Bone Metabolism",
        [
            j!("oac", "Osteoarthritis Cartilage"),
            j!("ao-osteo", "Arch Osteoporos"),
            j!("bjr", "Bone Joint Res"),
        ],
    ),
];

static CATALOGUE: &[Category] = &[
    leaf!(
        "general",
        "General Orthopedics",
        [
            j!("bjj", "Bone Joint J"),
            j!("corr", "Clin Orthop Relat Res"),
            j!("ao", "Acta Orthop"),
            j!("jor", "J Orthop Res"),
            j!("io", "Int Orthop"),
            j!("bmc", "BMC Musculoskelet Disord"),
            j!("josr", "J Orthop Surg Res"),
            j!("aots", "Arch Orthop Trauma Surg"),
            j!("otsr", "Orthop Traumatol Surg Res"),
            j!("eor", "EFORT Open Rev"),
        ],
    ),
    Category {
        id: "specialized",
        name: "Specialized Areas",
        journals: &[],
        sub_categories: SPECIALIZED,
    },
];

/// Top-level categories.
pub fn categories() -> &'static [Category] {
    CATALOGUE
}

/// Every journal in the catalogue, de-duplicated by name, first-seen order.
pub fn all_journals() -> Vec<Journal> {
    let mut out: Vec<Journal> = Vec::new();
    for journal in CATALOGUE.iter().flat_map(|c| c.all_journals()) {
        if !out.iter().any(|j| j.name == journal.name) {
            out.push(journal);
        }
    }
    out
}

/// Lookup a journal by its selector id.
pub fn find_by_id(id: &str) -> Option<Journal> {
    CATALOGUE
        .iter()
        .flat_map(|c| c.all_journals())
        .find(|j| j.id.eq_ignore_ascii_case(id))
}

fn find_category<'a>(cats: &'a [Category], id: &str) -> Option<&'a Category> {
    for cat in cats {
        if cat.id.eq_ignore_ascii_case(id) {
            return Some(cat);
        }
        if let Some(found) = find_category(cat.sub_categories, id) {
            return Some(found);
        }
    }
    None
}

/// Resolve selectors into PubMed journal names.
///
/// A selector is a category or sub-category id, a journal id, or a literal
/// journal name (passed through unchanged). Output is de-duplicated and keeps
/// the order in which names were first produced.
pub fn resolve<S: AsRef<str>>(selectors: &[S]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for selector in selectors {
        let selector = selector.as_ref().trim();
        if selector.is_empty() {
            continue;
        }
        if let Some(cat) = find_category(CATALOGUE, selector) {
            for journal in cat.all_journals() {
                push(journal.name);
            }
        } else if let Some(journal) = find_by_id(selector) {
            push(journal.name);
        } else {
            push(selector);
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_journals_deduplicated() {
        let all = all_journals();
        let spine = all.iter().filter(|j| j.name == "Spine (Phila Pa 1976)").count();
        assert_eq!(spine, 1);
        assert_eq!(all[0].name, "Bone Joint J");
    }

    #[test]
    fn test_find_by_id() {
        assert_eq!(find_by_id("joa").map(|j| j.name), Some("J Arthroplasty"));
        assert_eq!(find_by_id("JOA").map(|j| j.name), Some("J Arthroplasty"));
        assert!(find_by_id("nope").is_none());
    }

    #[test]
    fn test_resolve_mixed_selectors() {
        let names = resolve(&["trauma", "joa", "Custom Journal", "injury"]);
        assert_eq!(
            names,
            vec!["J Orthop Trauma", "Injury", "J Arthroplasty", "Custom Journal"]
        );
    }

    #[test]
    fn test_resolve_prefers_category_over_journal_id() {
        let names = resolve(&["spine"]);
        assert_eq!(
            names,
            vec!["Spine (Phila Pa 1976)", "Eur Spine J", "Spine J", "Global Spine J"]
        );
    }

    #[test]
    fn test_resolve_parent_category() {
        let names = resolve(&["specialized"]);
        assert!(names.contains(&"Arthroscopy".to_string()));
        assert!(names.contains(&"Bone Joint Res".to_string()));
        assert!(!names.contains(&"Bone Joint J".to_string()));
    }
}
