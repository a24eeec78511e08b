//! Plain-text rendering of an [`AnalysisReport`].
//!
//! The layout is fixed: every section is a header line, a 60-character `=`
//! rule, its body, and a blank line. Section order matters to readers who
//! diff reports textually, so do not reorder.
//!
//! ```text
//! CORE CLAIMS
//! ============================================================
//! 1. The council approved the budget.
//!
//! LANGUAGE & TONE ANALYSIS
//! ============================================================
//! Neutral: factual reporting.
//! ...
//! ```

use crate::models::AnalysisReport;

const RULE_WIDTH: usize = 60;
const NONE_IDENTIFIED: &str = "None identified";

/// Render `report` as a multi-section plain-text document.
///
/// Red flags fall back to `None identified` when empty. The named entity
/// section is omitted unless some category has entities, and the opposing
/// viewpoint section is omitted when empty.
pub fn render(report: &AnalysisReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    section(&mut lines, "CORE CLAIMS", numbered(&report.core_claims));

    section(
        &mut lines,
        "LANGUAGE & TONE ANALYSIS",
        vec![report.tone_analysis.clone()],
    );

    let red_flags = if report.red_flags.is_empty() {
        vec![NONE_IDENTIFIED.to_string()]
    } else {
        numbered(&report.red_flags)
    };
    section(&mut lines, "POTENTIAL RED FLAGS", red_flags);

    section(
        &mut lines,
        "VERIFICATION QUESTIONS",
        numbered(&report.verification_questions),
    );

    if report.has_entities() {
        let mut body = Vec::new();
        // BTreeMap iteration is already sorted by category
        for (category, entities) in &report.named_entities {
            if entities.is_empty() {
                continue;
            }
            body.push(format!("{}:", category.to_uppercase()));
            body.extend(entities.iter().map(|e| format!("  - {e}")));
        }
        section(&mut lines, "NAMED ENTITY RECOGNITION", body);
    }

    if !report.opposing_viewpoint.is_empty() {
        section(
            &mut lines,
            "OPPOSING VIEWPOINT",
            vec![report.opposing_viewpoint.clone()],
        );
    }

    lines.join("\n")
}

fn section(lines: &mut Vec<String>, header: &str, body: Vec<String>) {
    lines.push(header.to_string());
    lines.push("=".repeat(RULE_WIDTH));
    lines.extend(body);
    lines.push(String::new());
}

fn numbered(items: &[String]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            core_claims: strings(&["Claim one.", "Claim two.", "Claim three."]),
            tone_analysis: "Neutral".to_string(),
            red_flags: vec![],
            verification_questions: strings(&["Q1?", "Q2?", "Q3?"]),
            named_entities: BTreeMap::new(),
            opposing_viewpoint: String::new(),
        }
    }

    #[test]
    fn test_render_minimal_report_exactly() {
        let rule = "=".repeat(60);
        let expected = [
            "CORE CLAIMS",
            &rule,
            "1. Claim one.",
            "2. Claim two.",
            "3. Claim three.",
            "",
            "LANGUAGE & TONE ANALYSIS",
            &rule,
            "Neutral",
            "",
            "POTENTIAL RED FLAGS",
            &rule,
            "None identified",
            "",
            "VERIFICATION QUESTIONS",
            &rule,
            "1. Q1?",
            "2. Q2?",
            "3. Q3?",
            "",
        ]
        .join("\n");
        assert_eq!(render(&report()), expected);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut r = report();
        r.named_entities
            .insert("person".into(), strings(&["Lois Lane"]));
        r.named_entities
            .insert("location".into(), strings(&["Metropolis"]));
        assert_eq!(render(&r), render(&r.clone()));
    }

    #[test]
    fn test_render_red_flags_numbered() {
        let mut r = report();
        r.red_flags = strings(&["Anonymous source", "Loaded language"]);
        let text = render(&r);
        assert!(text.contains("POTENTIAL RED FLAGS\n"));
        assert!(text.contains("1. Anonymous source\n2. Loaded language\n"));
        assert!(!text.contains(NONE_IDENTIFIED));
    }

    #[test]
    fn test_render_entities_sorted_and_uppercased() {
        let mut r = report();
        r.named_entities
            .insert("person".into(), strings(&["Lois Lane", "Clark Kent"]));
        r.named_entities.insert("location".into(), strings(&["Metropolis"]));
        r.named_entities.insert("organization".into(), vec![]);
        let text = render(&r);
        let section = text
            .split("NAMED ENTITY RECOGNITION\n")
            .nth(1)
            .unwrap();
        assert!(section.starts_with(&format!(
            "{}\nLOCATION:\n  - Metropolis\nPERSON:\n  - Lois Lane\n  - Clark Kent\n",
            "=".repeat(60)
        )));
        assert!(!text.contains("ORGANIZATION:"));
    }

    #[test]
    fn test_render_omits_empty_optional_sections() {
        let mut r = report();
        r.named_entities.insert("person".into(), vec![]);
        let text = render(&r);
        assert!(!text.contains("NAMED ENTITY RECOGNITION"));
        assert!(!text.contains("OPPOSING VIEWPOINT"));
    }

    #[test]
    fn test_render_opposing_viewpoint_last() {
        let mut r = report();
        r.named_entities.insert("person".into(), strings(&["A"]));
        r.opposing_viewpoint = "Critics say otherwise.".to_string();
        let text = render(&r);
        let entities = text.find("NAMED ENTITY RECOGNITION").unwrap();
        let opposing = text.find("OPPOSING VIEWPOINT").unwrap();
        assert!(entities < opposing);
        assert!(text.ends_with("Critics say otherwise.\n"));
    }
}
