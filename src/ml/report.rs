// ============================================================
// Layer 5 — Classification Report
// ============================================================
// Metrics computed from predicted and true labels after the
// test loop:
//
//   accuracy          correct / total, as a percentage
//   micro P / R / F1  pooled over all classes; for single-label
//                     multi-class data all three equal accuracy
//   macro P / R / F1  unweighted mean over classes that appear in
//                     the truth or the predictions
//   confusion matrix  rows = true class, columns = predicted class

use std::fmt;

use crate::domain::emotion::Emotion;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub num_classes:     usize,
    pub total:           usize,
    pub correct:         usize,
    /// Top-1 accuracy in percent
    pub accuracy:        f64,
    pub precision_micro: f64,
    pub recall_micro:    f64,
    pub f1_micro:        f64,
    pub precision_macro: f64,
    pub recall_macro:    f64,
    pub f1_macro:        f64,
    /// `confusion[truth][prediction]`
    pub confusion:       Vec<Vec<usize>>,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(p: f64, r: f64) -> f64 {
    if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
}

impl ClassificationReport {
    /// Build the report. Labels `>= num_classes` are ignored.
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> Self {
        let mut confusion = vec![vec![0usize; num_classes]; num_classes];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t < num_classes && p < num_classes {
                confusion[t][p] += 1;
            }
        }

        let total: usize   = confusion.iter().flatten().sum();
        let correct: usize = (0..num_classes).map(|k| confusion[k][k]).sum();

        // Micro averages pool true positives, false positives and false
        // negatives over classes. Every miss is one FP and one FN.
        let precision_micro = ratio(correct, total);
        let recall_micro    = ratio(correct, total);
        let f1_micro        = f1(precision_micro, recall_micro);

        let mut p_sum = 0.0;
        let mut r_sum = 0.0;
        let mut f_sum = 0.0;
        let mut present = 0usize;
        for k in 0..num_classes {
            let tp        = confusion[k][k];
            let support   = confusion[k].iter().sum::<usize>();
            let predicted = confusion.iter().map(|row| row[k]).sum::<usize>();
            if support == 0 && predicted == 0 {
                continue;
            }
            let p = ratio(tp, predicted);
            let r = ratio(tp, support);
            p_sum += p;
            r_sum += r;
            f_sum += f1(p, r);
            present += 1;
        }
        let present_f = present.max(1) as f64;

        Self {
            num_classes,
            total,
            correct,
            accuracy: 100.0 * ratio(correct, total),
            precision_micro,
            recall_micro,
            f1_micro,
            precision_macro: p_sum / present_f,
            recall_macro:    r_sum / present_f,
            f1_macro:        f_sum / present_f,
            confusion,
        }
    }

    /// Number of true samples of class `k`
    pub fn support(&self, k: usize) -> usize {
        self.confusion.get(k).map(|row| row.iter().sum()).unwrap_or(0)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Top 1 Accuracy: {:2.6} %", self.accuracy)?;
        writeln!(f, "Precision: {:2.6}", self.precision_micro)?;
        writeln!(f, "Recall: {:2.6}", self.recall_micro)?;
        writeln!(f, "F1 Score: {:2.6}", self.f1_micro)?;
        writeln!(f, "Confusion Matrix:")?;

        let width = self
            .confusion
            .iter()
            .flatten()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1)
            .max(5);
        write!(f, "{:>10}", "")?;
        for k in 0..self.num_classes {
            write!(f, " {:>width$}", class_name(k).chars().take(width).collect::<String>())?;
        }
        writeln!(f)?;
        for (k, row) in self.confusion.iter().enumerate() {
            write!(f, "{:>10}", class_name(k))?;
            for v in row {
                write!(f, " {v:>width$}")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "Macro Precision: {:2.6}  Macro Recall: {:2.6}  Macro F1: {:2.6}",
            self.precision_macro, self.recall_macro, self.f1_macro,
        )
    }
}

fn class_name(k: usize) -> String {
    Emotion::from_label(k)
        .map(|e| e.name().to_string())
        .unwrap_or_else(|| k.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_and_accuracy() {
        let y_true = [0, 0, 1, 2, 2, 2];
        let y_pred = [0, 1, 1, 2, 0, 2];
        let r = ClassificationReport::from_predictions(&y_true, &y_pred, 3);
        assert_eq!(r.confusion, vec![vec![1, 1, 0], vec![0, 1, 0], vec![1, 0, 2]]);
        assert_eq!(r.correct, 4);
        assert!((r.accuracy - 400.0 / 6.0).abs() < 1e-9);
        assert_eq!(r.support(2), 3);
    }

    #[test]
    fn test_micro_scores_equal_accuracy() {
        let r = ClassificationReport::from_predictions(&[0, 1, 2, 1], &[0, 2, 2, 1], 3);
        assert!((r.precision_micro - 0.75).abs() < 1e-12);
        assert!((r.recall_micro - 0.75).abs() < 1e-12);
        assert!((r.f1_micro - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_macro_scores() {
        // class 0: p=1, r=1; class 1: p=1, r=0.5; class 2: p=0.5, r=1
        let r = ClassificationReport::from_predictions(&[0, 1, 2, 1], &[0, 2, 2, 1], 3);
        assert!((r.precision_macro - 2.5 / 3.0).abs() < 1e-12);
        assert!((r.recall_macro - 2.5 / 3.0).abs() < 1e-12);
        let f1_1 = 2.0 * 0.5 / 1.5;
        assert!((r.f1_macro - (1.0 + f1_1 + f1_1) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_predictions() {
        let r = ClassificationReport::from_predictions(&[], &[], 7);
        assert_eq!(r.total, 0);
        assert_eq!(r.accuracy, 0.0);
        assert_eq!(r.f1_macro, 0.0);
    }

    #[test]
    fn test_display_header_lines() {
        let r = ClassificationReport::from_predictions(&[3, 3], &[3, 4], 7);
        let text = r.to_string();
        assert!(text.starts_with("Top 1 Accuracy: 50.000000 %\n"));
        assert!(text.contains("Precision: 0.500000"));
        assert!(text.contains("Happy"));

        let matrix = text.find("Confusion Matrix:").unwrap();
        let macros = text.find("Macro Precision").unwrap();
        assert!(matrix < macros);
        assert!(text.trim_end().ends_with(&format!("Macro F1: {:2.6}", r.f1_macro)));
    }
}
