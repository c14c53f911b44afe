//! Plain-text rendering of predictions and training results.

use clausify_ai::FineTuneReport;
use clausify_core::Prediction;
use clausify_store::ExtractStats;

const PREVIEW_CHARS: usize = 100;

/// Predicted label, then every score to three decimals in label-id order.
pub fn format_prediction(prediction: &Prediction) -> String {
    let mut out = format!("Predicted label: {}\nScores:\n", prediction.label);
    for (label, score) in &prediction.scores {
        out.push_str(&format!("  {label}: {score:.3}\n"));
    }
    out
}

/// One line per clause: best label, its score, and the start of the text.
pub fn format_clause_row(index: usize, clause: &str, prediction: &Prediction) -> String {
    let score = prediction
        .scores
        .get(&prediction.label)
        .copied()
        .unwrap_or_default();
    format!(
        "{:>3}  {:<28} {:.3}  {}",
        index + 1,
        prediction.label,
        score,
        preview(clause)
    )
}

pub fn format_extract_stats(stats: &ExtractStats) -> String {
    let mut out = format!(
        "Rows read:          {}\nClauses extracted:  {}\nDuplicates dropped: {}\nClauses written:    {}\n",
        stats.rows_seen,
        stats.clauses_extracted,
        stats.duplicates_dropped(),
        stats.clauses_written
    );
    if !stats.missing_labels.is_empty() {
        out.push_str(&format!(
            "Missing columns:    {}\n",
            stats.missing_labels.join(", ")
        ));
    }
    out
}

pub fn format_report(report: &FineTuneReport) -> String {
    format!(
        "Labels:         {}\nTrain samples:  {}\nEval samples:   {}\nSteps:          {}\nTrain loss:     {:.4}\nEval loss:      {:.4}\nEval accuracy:  {:.4}\nEval macro-F1:  {:.4}\nElapsed:        {:.1}s\n",
        report.labels.len(),
        report.train_samples,
        report.eval.eval_samples,
        report.global_steps,
        report.train_loss,
        report.eval.eval_loss,
        report.eval.eval_accuracy,
        report.eval.eval_macro_f1,
        report.elapsed_secs
    )
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn prediction() -> Prediction {
        Prediction {
            label: "Non-Compete".into(),
            scores: BTreeMap::from([
                ("Exclusivity".to_string(), 0.1234),
                ("Non-Compete".to_string(), 0.8766),
            ]),
        }
    }

    #[test]
    fn prediction_lists_scores_to_three_decimals() {
        assert_eq!(
            format_prediction(&prediction()),
            "Predicted label: Non-Compete\nScores:\n  Exclusivity: 0.123\n  Non-Compete: 0.877\n"
        );
    }

    #[test]
    fn clause_row_shows_best_score() {
        let row = format_clause_row(0, "Licensee shall not compete.", &prediction());
        assert!(row.starts_with("  1  Non-Compete"));
        assert!(row.contains("0.877"));
        assert!(row.ends_with("Licensee shall not compete."));
    }

    #[test]
    fn long_clauses_are_truncated() {
        let long = "x".repeat(150);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn extract_stats_mentions_missing_columns() {
        let stats = ExtractStats {
            rows_seen: 2,
            clauses_extracted: 5,
            clauses_written: 4,
            missing_labels: vec!["Exclusivity".into()],
        };
        let text = format_extract_stats(&stats);
        assert!(text.contains("Duplicates dropped: 1"));
        assert!(text.contains("Missing columns:    Exclusivity"));
    }
}
