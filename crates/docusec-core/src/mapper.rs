//! Naive control mapping by literal substring presence.
//!
//! Works without any index: a control maps to the documents when its text
//! appears, case-insensitively, inside at least one of them.

use std::collections::BTreeMap;

use crate::models::Control;

/// Framework name → (control id → control text).
pub type FrameworkControls = BTreeMap<String, BTreeMap<String, String>>;

/// Return, per framework, the ids of controls whose text occurs in any
/// document. Frameworks without a match map to an empty list.
pub fn map_controls(
    frameworks: &FrameworkControls,
    documents: &[String],
) -> BTreeMap<String, Vec<String>> {
    let lowered: Vec<String> = documents.iter().map(|d| d.to_lowercase()).collect();

    frameworks
        .iter()
        .map(|(name, controls)| {
            let matched = controls
                .iter()
                .filter(|(_, text)| {
                    let needle = text.to_lowercase();
                    lowered.iter().any(|doc| doc.contains(&needle))
                })
                .map(|(id, _)| id.clone())
                .collect();
            (name.clone(), matched)
        })
        .collect()
}

/// Group controls into the nested shape [`map_controls`] expects.
pub fn group_controls(controls: &[Control]) -> FrameworkControls {
    let mut grouped = FrameworkControls::new();
    for c in controls {
        grouped
            .entry(c.framework_title.clone())
            .or_default()
            .insert(c.control_number.clone(), c.control_language.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framework(name: &str, controls: &[(&str, &str)]) -> (String, BTreeMap<String, String>) {
        (
            name.to_string(),
            controls
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        )
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let fw: FrameworkControls = [framework("ISO", &[("1", "Policy statement")])].into();
        let docs = vec!["This policy statement applies".to_string()];
        let mapping = map_controls(&fw, &docs);
        assert_eq!(mapping["ISO"], vec!["1".to_string()]);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn unmatched_framework_is_kept_empty() {
        let fw: FrameworkControls = [
            framework("ISO", &[("1", "Policy statement")]),
            framework(
                "NIST",
                &[("AC-1", "access control policy"), ("AU-2", "event logging")],
            ),
        ]
        .into();
        let docs = vec!["This policy statement applies".to_string()];
        let mapping = map_controls(&fw, &docs);
        assert_eq!(mapping["ISO"], vec!["1".to_string()]);
        assert!(mapping["NIST"].is_empty());
    }

    #[test]
    fn any_document_can_match() {
        let fw: FrameworkControls = [framework(
            "SOC 2",
            &[("CC6.1", "logical access"), ("CC7.2", "monitoring")],
        )]
        .into();
        let docs = vec![
            "Unrelated".to_string(),
            "Continuous MONITORING is performed".to_string(),
            "Logical access is restricted".to_string(),
        ];
        let mapping = map_controls(&fw, &docs);
        assert_eq!(mapping["SOC 2"], vec!["CC6.1".to_string(), "CC7.2".to_string()]);
    }

    #[test]
    fn no_documents_means_no_matches() {
        let fw: FrameworkControls = [framework("ISO", &[("1", "x")])].into();
        let mapping = map_controls(&fw, &[]);
        assert!(mapping["ISO"].is_empty());
    }

    #[test]
    fn group_controls_nests_by_framework() {
        let controls = vec![
            Control::new("ISO", "1", "one"),
            Control::new("ISO", "2", "two"),
            Control::new("NIST", "A", "alpha"),
        ];
        let grouped = group_controls(&controls);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["ISO"]["2"], "two");
        assert_eq!(grouped["NIST"]["A"], "alpha");
    }
}
