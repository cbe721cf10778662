//! 解析結果の絞り込み・検索・集計

use crate::types::{Component, ComponentStatus, Condition, Defect, PcbAnalysis, Presence};

/// 部品一覧の絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct ExplorerFilter {
    /// designator / MPN の部分一致（大文字小文字を区別しない）
    pub query: String,
    /// 問題のある部品のみ
    pub issues_only: bool,
    pub presence: Option<Presence>,
    pub condition: Option<Condition>,
}

impl ExplorerFilter {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn issues() -> Self {
        Self {
            issues_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, component: &Component, board_voltage: Option<f64>) -> bool {
        if self.issues_only && !component.has_issue(board_voltage) {
            return false;
        }
        if self.presence.is_some_and(|p| p != component.presence) {
            return false;
        }
        if self.condition.is_some_and(|c| c != component.condition) {
            return false;
        }
        let query = self.query.trim().to_lowercase();
        query.is_empty()
            || component.designator.to_lowercase().contains(&query)
            || component.mpn.to_lowercase().contains(&query)
    }

    pub fn apply<'a>(&self, analysis: &'a PcbAnalysis, board_voltage: Option<f64>) -> Vec<&'a Component> {
        analysis
            .components
            .iter()
            .filter(|c| self.matches(c, board_voltage))
            .collect()
    }
}

/// 不良の検索（id / 種別 / 説明の部分一致）
pub fn search_defects<'a>(analysis: &'a PcbAnalysis, query: &str) -> Vec<&'a Defect> {
    let query = query.trim().to_lowercase();
    analysis
        .defects
        .iter()
        .filter(|d| {
            query.is_empty()
                || d.id.to_lowercase().contains(&query)
                || d.defect_type.to_lowercase().contains(&query)
                || d
                    .description
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&query))
        })
        .collect()
}

/// 集計値（サマリー表示用）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisStats {
    pub total_components: usize,
    pub ok: usize,
    pub missing: usize,
    pub damaged: usize,
    pub over_voltage: usize,
    pub defects: usize,
    /// 部品と不良の平均信頼度（0件なら None）
    pub mean_confidence: Option<f64>,
}

impl AnalysisStats {
    pub fn from_analysis(analysis: &PcbAnalysis, board_voltage: Option<f64>) -> Self {
        let mut stats = Self {
            total_components: analysis.components.len(),
            defects: analysis.defects.len(),
            ..Default::default()
        };

        for component in &analysis.components {
            match component.status(board_voltage) {
                ComponentStatus::Ok => stats.ok += 1,
                ComponentStatus::Missing => stats.missing += 1,
                ComponentStatus::Damaged => stats.damaged += 1,
                ComponentStatus::VoltageMismatch => stats.over_voltage += 1,
            }
        }

        let confidences: Vec<f64> = analysis
            .components
            .iter()
            .map(|c| c.confidence)
            .chain(analysis.defects.iter().map(|d| d.confidence))
            .collect();
        if !confidences.is_empty() {
            stats.mean_confidence = Some(confidences.iter().sum::<f64>() / confidences.len() as f64);
        }

        stats
    }

    pub fn issues(&self) -> usize {
        self.missing + self.damaged + self.over_voltage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn component(designator: &str, mpn: &str, presence: Presence, condition: Condition) -> Component {
        Component {
            designator: designator.to_string(),
            mpn: mpn.to_string(),
            bbox: BoundingBox::new(0.1, 0.1, 0.1, 0.1),
            presence,
            condition,
            confidence: 0.8,
            temperature: None,
            max_voltage: None,
            datasheet_url: None,
        }
    }

    fn sample() -> PcbAnalysis {
        let mut u2 = component("U2", "ATmega328P", Presence::Ok, Condition::Ok);
        u2.max_voltage = Some(6.0);
        PcbAnalysis {
            components: vec![
                component("R17", "", Presence::Ok, Condition::Ok),
                component("U1", "LM1117-3.3", Presence::Ok, Condition::Burnt),
                component("C3", "GRM188", Presence::Missing, Condition::Ok),
                u2,
            ],
            defects: vec![Defect {
                id: "D1".to_string(),
                defect_type: "solder_bridge".to_string(),
                bbox: BoundingBox::new(0.3, 0.3, 0.1, 0.1),
                confidence: 0.6,
                description: Some("Bridge on U2 pins".to_string()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_query_matches_designator_and_mpn() {
        let analysis = sample();
        let hits: Vec<&str> = ExplorerFilter::query("lm1117")
            .apply(&analysis, None)
            .iter()
            .map(|c| c.designator.as_str())
            .collect();
        assert_eq!(hits, vec!["U1"]);

        let hits = ExplorerFilter::query("u").apply(&analysis, None);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_issues_only_depends_on_voltage() {
        let analysis = sample();
        assert_eq!(ExplorerFilter::issues().apply(&analysis, None).len(), 2);
        assert_eq!(ExplorerFilter::issues().apply(&analysis, Some(12.0)).len(), 3);
    }

    #[test]
    fn test_presence_filter() {
        let analysis = sample();
        let filter = ExplorerFilter {
            presence: Some(Presence::Missing),
            ..Default::default()
        };
        let hits = filter.apply(&analysis, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].designator, "C3");
    }

    #[test]
    fn test_search_defects() {
        let analysis = sample();
        assert_eq!(search_defects(&analysis, "bridge").len(), 1);
        assert_eq!(search_defects(&analysis, "u2 pins").len(), 1);
        assert!(search_defects(&analysis, "corrosion").is_empty());
        assert_eq!(search_defects(&analysis, "").len(), 1);
    }

    #[test]
    fn test_stats() {
        let stats = AnalysisStats::from_analysis(&sample(), Some(12.0));
        assert_eq!(stats.total_components, 4);
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.damaged, 1);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.over_voltage, 1);
        assert_eq!(stats.issues(), 3);
        assert_eq!(stats.defects, 1);
        let mean = stats.mean_confidence.unwrap();
        assert!((mean - 0.76).abs() < 1e-9);
    }

    #[test]
    fn test_stats_empty() {
        let stats = AnalysisStats::from_analysis(&PcbAnalysis::default(), None);
        assert_eq!(stats.total_components, 0);
        assert!(stats.mean_confidence.is_none());
    }
}
