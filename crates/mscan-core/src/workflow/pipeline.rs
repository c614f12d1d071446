//! The fixed market scan pipeline.
//!
//! Seven analysis steps feed one report consolidator. The topology is static;
//! only prompts and the enabled flags are configurable.

use super::model::NodeKind;

/// Static description of one analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStep {
    pub id: &'static str,
    pub kind: NodeKind,
    /// Numbered heading used in the consolidated report.
    pub section_title: &'static str,
    /// Prefix for error messages raised by this step.
    pub error_label: &'static str,
    /// Phrase used when the step is skipped for lack of a document.
    pub skip_label: &'static str,
}

impl PipelineStep {
    pub fn needs_document(&self) -> bool {
        self.kind == NodeKind::PdfAnalysis
    }
}

pub const COMPANY_OVERVIEW: &str = "company_overview";
pub const INDUSTRY_OVERVIEW: &str = "industry_overview";
pub const PROMOTERS_DIRECTORS: &str = "promoters_directors";
pub const CREDIT_RATING: &str = "credit_rating";
pub const FINANCIALS: &str = "financials";
pub const COMPLIANCE_CHECKS: &str = "compliance_checks";
pub const NEWS_CHECKS: &str = "news_checks";
pub const REPORT_CONSOLIDATOR: &str = "report_consolidator";

/// Analysis steps in report order.
pub static ANALYSIS_STEPS: [PipelineStep; 7] = [
    PipelineStep {
        id: COMPANY_OVERVIEW,
        kind: NodeKind::GoogleSearch,
        section_title: "1. Company & Business Overview",
        error_label: "Company overview",
        skip_label: "company overview",
    },
    PipelineStep {
        id: INDUSTRY_OVERVIEW,
        kind: NodeKind::GoogleSearch,
        section_title: "2. Industry Overview",
        error_label: "Industry overview",
        skip_label: "industry overview",
    },
    PipelineStep {
        id: PROMOTERS_DIRECTORS,
        kind: NodeKind::PdfAnalysis,
        section_title: "3. Promoters and Board of Directors",
        error_label: "Promoters/Directors",
        skip_label: "directors",
    },
    PipelineStep {
        id: CREDIT_RATING,
        kind: NodeKind::PdfAnalysis,
        section_title: "4. Credit Rating History",
        error_label: "Credit rating",
        skip_label: "credit rating",
    },
    PipelineStep {
        id: FINANCIALS,
        kind: NodeKind::PdfAnalysis,
        section_title: "5. Financial Performance",
        error_label: "Financial analysis",
        skip_label: "financial",
    },
    PipelineStep {
        id: COMPLIANCE_CHECKS,
        kind: NodeKind::GoogleSearch,
        section_title: "6. Compliance & Due Diligence",
        error_label: "Compliance checks",
        skip_label: "compliance",
    },
    PipelineStep {
        id: NEWS_CHECKS,
        kind: NodeKind::GoogleSearch,
        section_title: "7. News & Media Analysis",
        error_label: "News analysis",
        skip_label: "news",
    },
];

/// Steps whose output must exist for a report to be worth writing.
pub const CORE_SECTIONS: [&str; 3] = [COMPANY_OVERVIEW, INDUSTRY_OVERVIEW, PROMOTERS_DIRECTORS];

/// Looks up an analysis step by node id.
pub fn step(id: &str) -> Option<&'static PipelineStep> {
    ANALYSIS_STEPS.iter().find(|s| s.id == id)
}
