//! Selects the fleet template a battle was fought with.
//!
//! A template qualifies when its roster contains every surviving ship. The
//! library is injected as an ordered slice so selection stays a pure function.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fleet::FleetTemplate;

/// How to choose when several templates qualify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// First qualifying template in library order.
    #[default]
    FirstSuperset,
    /// Qualifying template with the fewest ships; library order breaks ties.
    SmallestSuperset,
}

fn is_superset(template: &FleetTemplate, survivors: &BTreeSet<String>) -> bool {
    let roster = template.ship_names();
    survivors.iter().all(|name| roster.contains(name.as_str()))
}

/// First template, in library order, whose roster is a superset of `survivors`.
pub fn find_matching_template<'a>(
    survivors: &BTreeSet<String>,
    templates: &'a [FleetTemplate],
) -> Option<&'a FleetTemplate> {
    templates.iter().find(|t| is_superset(t, survivors))
}

/// Select a template under `policy`, warning when the choice is ambiguous.
pub fn select_template<'a>(
    survivors: &BTreeSet<String>,
    templates: &'a [FleetTemplate],
    policy: MatchPolicy,
) -> Option<&'a FleetTemplate> {
    let candidates: Vec<&FleetTemplate> = templates
        .iter()
        .filter(|t| is_superset(t, survivors))
        .collect();

    if candidates.len() > 1 {
        let names: Vec<&str> = candidates.iter().map(|t| t.name.as_str()).collect();
        warn!(
            "{} templates contain all survivors {:?}: {:?}; choosing by {:?}",
            candidates.len(),
            survivors,
            names,
            policy
        );
    }

    let chosen = match policy {
        MatchPolicy::FirstSuperset => candidates.first().copied(),
        // min_by_key keeps the first of equal elements
        MatchPolicy::SmallestSuperset => candidates.iter().copied().min_by_key(|t| t.ships.len()),
    };

    if let Some(template) = chosen {
        debug!("Matched template '{}'", template.name);
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::XmlDocument;
    use crate::fleet::parse_template;

    fn template(name: &str, ships: &[&str]) -> FleetTemplate {
        let ships: String = ships
            .iter()
            .map(|s| format!("<Ship><Name>{}</Name></Ship>", s))
            .collect();
        let xml = format!("<Fleet><Name>{}</Name><Ships>{}</Ships></Fleet>", name, ships);
        parse_template(XmlDocument::parse(&xml, name).unwrap()).unwrap()
    }

    fn survivors(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_superset_selected_over_subset() {
        let library = vec![
            template("B", &["Ardent"]),
            template("A", &["Ardent", "Valor", "Zeal"]),
        ];
        let chosen = find_matching_template(&survivors(&["Ardent", "Valor"]), &library).unwrap();
        assert_eq!(chosen.name, "A");
    }

    #[test]
    fn test_no_template_qualifies() {
        let library = vec![template("A", &["Ardent"]), template("B", &["Valor"])];
        assert!(find_matching_template(&survivors(&["Ardent", "Valor"]), &library).is_none());
        assert!(find_matching_template(&survivors(&["Ardent"]), &[]).is_none());
    }

    #[test]
    fn test_first_in_library_order_wins() {
        let library = vec![
            template("Big", &["Ardent", "Valor", "Zeal"]),
            template("Small", &["Ardent", "Valor"]),
        ];
        let s = survivors(&["Ardent"]);
        assert_eq!(find_matching_template(&s, &library).unwrap().name, "Big");
        assert_eq!(
            select_template(&s, &library, MatchPolicy::FirstSuperset).unwrap().name,
            "Big"
        );
    }

    #[test]
    fn test_smallest_superset_policy() {
        let library = vec![
            template("Big", &["Ardent", "Valor", "Zeal"]),
            template("Small", &["Ardent", "Valor"]),
            template("AlsoSmall", &["Valor", "Ardent"]),
        ];
        let chosen = select_template(&survivors(&["Ardent"]), &library, MatchPolicy::SmallestSuperset);
        assert_eq!(chosen.unwrap().name, "Small");
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let library = vec![template("A", &["Ardent"])];
        assert!(find_matching_template(&survivors(&["ardent"]), &library).is_none());
    }
}
