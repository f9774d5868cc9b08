// ============================================================
// Layer 3 — Emotion Domain Type
// ============================================================
// The seven FER2013 expression classes. The integer value of
// each variant is the label stored in the dataset's `emotion`
// column and the index of its logit in the network output.
//
//   0 Angry   1 Disgust   2 Fear   3 Happy
//   4 Sad     5 Surprise  6 Neutral
//
// Reference: Goodfellow et al. (2013) FER2013 challenge

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of expression classes the network predicts.
pub const NUM_CLASSES: usize = 7;

/// One facial expression label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All classes in label order.
    pub const ALL: [Emotion; NUM_CLASSES] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Map a dataset label to its class, `None` when out of range.
    pub fn from_label(label: usize) -> Option<Self> {
        Self::ALL.get(label).copied()
    }

    /// The dataset label of this class
    pub fn label(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Emotion::Angry    => "Angry",
            Emotion::Disgust  => "Disgust",
            Emotion::Fear     => "Fear",
            Emotion::Happy    => "Happy",
            Emotion::Sad      => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral  => "Neutral",
        }
    }

    /// The label → name table, in label order.
    pub fn mapping() -> Vec<(usize, &'static str)> {
        Self::ALL.iter().map(|e| (e.label(), e.name())).collect()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip_matches_dataset_order() {
        assert_eq!(Emotion::from_label(0), Some(Emotion::Angry));
        assert_eq!(Emotion::from_label(3), Some(Emotion::Happy));
        assert_eq!(Emotion::from_label(6), Some(Emotion::Neutral));
        assert_eq!(Emotion::Surprise.label(), 5);
    }

    #[test]
    fn test_out_of_range_label() {
        assert_eq!(Emotion::from_label(7), None);
    }

    #[test]
    fn test_mapping_is_complete() {
        let mapping = Emotion::mapping();
        assert_eq!(mapping.len(), NUM_CLASSES);
        assert_eq!(mapping[1], (1, "Disgust"));
    }
}
