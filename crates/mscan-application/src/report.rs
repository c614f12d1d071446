//! Deterministic Markdown report assembly.
//!
//! Used when the report consolidator is disabled or its LLM call fails.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use mscan_core::workflow::ANALYSIS_STEPS;

pub const MISSING_SECTION: &str = "*No data available for this section.*";

const DISCLAIMER: &str = "**Disclaimer:** This report is generated for internal assessment \
purposes only. All information is based on publicly available data and should be verified \
independently.";

/// Concatenates node outputs into a report, in pipeline order.
pub fn build_markdown_report(company_name: &str, sections: &BTreeMap<String, String>) -> String {
    build_markdown_report_at(company_name, sections, Local::now())
}

fn build_markdown_report_at(
    company_name: &str,
    sections: &BTreeMap<String, String>,
    now: DateTime<Local>,
) -> String {
    let mut report = format!(
        "# Market Scan Report: {company_name}\n*Report Date: {}*\n\n---\n\n",
        now.format("%d-%b-%Y")
    );

    for step in ANALYSIS_STEPS.iter() {
        let heading = format!("## {}", step.section_title);
        match sections.get(step.id).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(content) if content.starts_with(&heading) => {
                report.push_str(content);
            }
            Some(content) => {
                report.push_str(&heading);
                report.push_str("\n\n");
                report.push_str(content);
            }
            None => {
                report.push_str(&heading);
                report.push_str("\n\n");
                report.push_str(MISSING_SECTION);
            }
        }
        report.push_str("\n\n---\n\n");
    }

    report.push_str(DISCLAIMER);
    report.push('\n');
    report
}
