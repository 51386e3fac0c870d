//! Post-rollback report types.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_evidence::{EvidenceValue, combine_hashes, sha256_hex};

/// The analysis axis a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// What caused the incident.
    RootCause,
    /// Estimated versus actual business impact.
    BusinessImpact,
    /// How well the rollback itself performed.
    PerformanceImpact,
    /// Whether stakeholders were informed effectively.
    Communication,
    /// Whether regulatory requirements were met.
    Compliance,
    /// What to carry forward.
    LessonsLearned,
}

impl AnalysisType {
    /// Returns the axis as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RootCause => "root_cause",
            Self::BusinessImpact => "business_impact",
            Self::PerformanceImpact => "performance_impact",
            Self::Communication => "communication",
            Self::Compliance => "compliance",
            Self::LessonsLearned => "lessons_learned",
        }
    }
}

/// Severity of an analysis finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingSeverity {
    /// Informational.
    Info,
    /// Minor issue.
    Low,
    /// Worth addressing.
    Medium,
    /// Needs prompt attention.
    High,
    /// Needs immediate attention.
    Critical,
}

impl FindingSeverity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// One severity-classified finding produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFinding {
    /// Unique finding id.
    pub finding_id: Uuid,
    /// The analysis axis.
    pub analysis_type: AnalysisType,
    /// Severity of the finding.
    pub severity: FindingSeverity,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Supporting evidence.
    pub evidence: EvidenceValue,
    /// Actionable recommendations.
    pub recommendations: Vec<String>,
    /// SHA-256 over the finding's identifying fields.
    pub hash: String,
}

impl AnalysisFinding {
    /// Creates a finding, computing its hash.
    #[must_use]
    pub fn new(
        analysis_type: AnalysisType,
        severity: FindingSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
        evidence: EvidenceValue,
    ) -> Self {
        let mut finding = Self {
            finding_id: Uuid::new_v4(),
            analysis_type,
            severity,
            title: title.into(),
            description: description.into(),
            evidence,
            recommendations: Vec::new(),
            hash: String::new(),
        };
        finding.hash = compute_finding_hash(&finding);
        finding
    }

    /// Adds a recommendation.
    #[must_use]
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    /// Adds several recommendations.
    #[must_use]
    pub fn with_recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations
            .extend(recommendations.into_iter().map(Into::into));
        self
    }
}

fn compute_finding_hash(finding: &AnalysisFinding) -> String {
    let content = EvidenceValue::map()
        .with("finding_id", finding.finding_id.to_string())
        .with("analysis_type", finding.analysis_type.as_str())
        .with("severity", finding.severity.as_str())
        .with("title", finding.title.clone())
        .with("description", finding.description.clone());
    sha256_hex(&content.canonical_json())
}

/// The full post-rollback report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRollbackReport {
    /// Unique report id.
    pub report_id: Uuid,
    /// The execution the report analyzes.
    pub execution_id: Uuid,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Findings across the six analysis axes.
    pub findings: Vec<AnalysisFinding>,
    /// Derived numeric metrics (accuracy, efficiency, compliance score).
    pub metrics: BTreeMap<String, f64>,
    /// Deduplicated recommendations, ranked by severity, top 15.
    pub recommendations: Vec<String>,
    /// SHA-256 binding the report to its execution's forensic timeline.
    pub report_hash: String,
}

impl PostRollbackReport {
    /// Maximum recommendations kept in the ranked list.
    pub const MAX_RECOMMENDATIONS: usize = 15;

    /// Assembles a report from findings, ranking recommendations and
    /// binding the report hash to the execution timeline.
    #[must_use]
    pub fn assemble(
        execution_id: Uuid,
        timeline_head_hash: Option<&str>,
        findings: Vec<AnalysisFinding>,
        metrics: BTreeMap<String, f64>,
    ) -> Self {
        let recommendations = rank_recommendations(&findings);

        let mut hashes: Vec<String> = findings.iter().map(|f| f.hash.clone()).collect();
        if let Some(head) = timeline_head_hash {
            hashes.push(head.to_string());
        }
        let bound = combine_hashes(&hashes);
        let report_id = Uuid::new_v4();
        let generated_at = Utc::now();
        let report_hash = sha256_hex(&format!(
            "{report_id}|{execution_id}|{}|{bound}",
            generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));

        Self {
            report_id,
            execution_id,
            generated_at,
            findings,
            metrics,
            recommendations,
            report_hash,
        }
    }

    /// Returns the findings on one axis.
    #[must_use]
    pub fn findings_for(&self, analysis_type: AnalysisType) -> Vec<&AnalysisFinding> {
        self.findings
            .iter()
            .filter(|f| f.analysis_type == analysis_type)
            .collect()
    }

    /// Returns the highest finding severity in the report.
    #[must_use]
    pub fn max_severity(&self) -> Option<FindingSeverity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Deduplicates recommendations and ranks them by the severity of the
/// finding that produced them, keeping the top 15.
fn rank_recommendations(findings: &[AnalysisFinding]) -> Vec<String> {
    let mut ranked: Vec<(FindingSeverity, &str)> = Vec::new();
    for finding in findings {
        for recommendation in &finding.recommendations {
            ranked.push((finding.severity, recommendation.as_str()));
        }
    }
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut seen = std::collections::BTreeSet::new();
    ranked
        .into_iter()
        .filter_map(|(_, r)| seen.insert(r).then(|| r.to_string()))
        .take(PostRollbackReport::MAX_RECOMMENDATIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: FindingSeverity, recommendation: &str) -> AnalysisFinding {
        AnalysisFinding::new(
            AnalysisType::PerformanceImpact,
            severity,
            "title",
            "description",
            EvidenceValue::map(),
        )
        .with_recommendation(recommendation)
    }

    #[test]
    fn finding_severities_order() {
        assert!(FindingSeverity::Info < FindingSeverity::Low);
        assert!(FindingSeverity::High < FindingSeverity::Critical);
    }

    #[test]
    fn recommendations_are_deduplicated_and_ranked() {
        let findings = vec![
            finding(FindingSeverity::Low, "tune step timeouts"),
            finding(FindingSeverity::Critical, "fix the database migration"),
            finding(FindingSeverity::Medium, "tune step timeouts"),
        ];

        let report =
            PostRollbackReport::assemble(Uuid::new_v4(), None, findings, BTreeMap::new());

        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(report.recommendations[0], "fix the database migration");
    }

    #[test]
    fn recommendation_list_is_capped() {
        let findings: Vec<AnalysisFinding> = (0..30)
            .map(|i| finding(FindingSeverity::Medium, &format!("recommendation {i}")))
            .collect();

        let report =
            PostRollbackReport::assemble(Uuid::new_v4(), None, findings, BTreeMap::new());
        assert_eq!(
            report.recommendations.len(),
            PostRollbackReport::MAX_RECOMMENDATIONS
        );
    }

    #[test]
    fn report_hash_binds_timeline_head() {
        let findings = vec![finding(FindingSeverity::Low, "r")];
        let a = PostRollbackReport::assemble(
            Uuid::new_v4(),
            Some("abc"),
            findings.clone(),
            BTreeMap::new(),
        );
        let b =
            PostRollbackReport::assemble(Uuid::new_v4(), Some("def"), findings, BTreeMap::new());

        assert_ne!(a.report_hash, b.report_hash);
    }

    #[test]
    fn max_severity_reflects_worst_finding() {
        let report = PostRollbackReport::assemble(
            Uuid::new_v4(),
            None,
            vec![
                finding(FindingSeverity::Low, "a"),
                finding(FindingSeverity::Critical, "b"),
            ],
            BTreeMap::new(),
        );
        assert_eq!(report.max_severity(), Some(FindingSeverity::Critical));
    }
}
