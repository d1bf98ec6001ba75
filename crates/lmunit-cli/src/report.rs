//! Score extraction and the end-of-run summary.

use std::collections::BTreeMap;

use lmunit_client::Outcome;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::dataset::PreparedRow;

/// Score used when an outcome carries none.
pub const MISSING_SCORE: f64 = 0.0;

/// One score per outcome; failures and payloads without `score` count as 0.
pub fn extract_scores(outcomes: &[Outcome]) -> Vec<f64> {
    outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| {
            outcome.score().unwrap_or_else(|| {
                warn!(index, record = %outcome.to_record(), "missing score in result");
                MISSING_SCORE
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetSummary {
    pub count: usize,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub mean_score: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subsets: BTreeMap<String, SubsetSummary>,
}

impl Summary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.cancelled > 0
    }
}

pub fn summarize(rows: &[PreparedRow], outcomes: &[Outcome], scores: &[f64]) -> Summary {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let cancelled = outcomes.iter().filter(|o| o.is_cancelled()).count();

    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (row, score) in rows.iter().zip(scores) {
        if let Some(subset) = &row.subset {
            grouped.entry(subset.clone()).or_default().push(*score);
        }
    }

    Summary {
        total: outcomes.len(),
        succeeded,
        failed: outcomes.len() - succeeded - cancelled,
        cancelled,
        mean_score: mean(scores),
        subsets: grouped
            .into_iter()
            .map(|(subset, scores)| {
                (
                    subset,
                    SubsetSummary {
                        count: scores.len(),
                        mean_score: mean(&scores),
                    },
                )
            })
            .collect(),
    }
}

/// Output records in input order, tagged with the row's id and subset when known.
pub fn records(rows: &[PreparedRow], outcomes: &[Outcome]) -> Vec<Value> {
    rows.iter()
        .zip(outcomes)
        .enumerate()
        .map(|(index, (row, outcome))| {
            json!({
                "index": index,
                "id": row.id,
                "subset": row.subset,
                "outcome": outcome.to_record(),
            })
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmunit_client::{LmunitError, ScorePayload, UnitTestRequest};

    fn row(subset: Option<&str>) -> PreparedRow {
        PreparedRow {
            request: UnitTestRequest::new("q", "r", "t"),
            subset: subset.map(String::from),
            id: None,
        }
    }

    fn scored(score: f64) -> Outcome {
        Outcome::success(1, ScorePayload(json!({ "score": score })))
    }

    #[test]
    fn test_missing_scores_default_to_zero() {
        let outcomes = vec![
            scored(4.0),
            Outcome::success(1, ScorePayload(json!({"detail": "none"}))),
            Outcome::failure(
                2,
                LmunitError::Transport {
                    message: "reset".into(),
                },
            ),
        ];
        assert_eq!(extract_scores(&outcomes), vec![4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_summary_groups_by_subset() {
        let rows = vec![row(Some("Math")), row(Some("Math")), row(Some("Safety")), row(None)];
        let outcomes = vec![
            scored(4.0),
            scored(2.0),
            Outcome::failure(
                0,
                LmunitError::Cancelled {
                    reason: "deadline".into(),
                },
            ),
            scored(5.0),
        ];
        let scores = extract_scores(&outcomes);
        let summary = summarize(&rows, &outcomes, &scores);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.cancelled, 1);
        assert!(summary.has_failures());
        assert_eq!(summary.mean_score, 11.0 / 4.0);
        assert_eq!(
            summary.subsets["Math"],
            SubsetSummary {
                count: 2,
                mean_score: 3.0
            }
        );
        assert_eq!(summary.subsets["Safety"].mean_score, 0.0);
        assert_eq!(summary.subsets.len(), 2);
    }

    #[test]
    fn test_records_keep_order_and_tags() {
        let rows = vec![row(Some("Focus")), row(None)];
        let outcomes = vec![
            scored(1.0),
            Outcome::failure(
                3,
                LmunitError::RetriesExhausted {
                    attempts: 3,
                    last_status: Some(503),
                    last_error: "HTTP 503: busy".into(),
                },
            ),
        ];
        let out = records(&rows, &outcomes);

        assert_eq!(out[0]["index"], json!(0));
        assert_eq!(out[0]["subset"], json!("Focus"));
        assert_eq!(out[0]["outcome"]["score"], json!(1.0));
        assert_eq!(out[1]["outcome"]["status"], json!(503));
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[], &[], &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.mean_score, 0.0);
        assert!(!summary.has_failures());
    }
}
