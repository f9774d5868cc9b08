// ============================================================
// Layer 5 — Test Loop
// ============================================================
// Same forward pass as the evaluator (crop-averaged logits) but
// keeps every prediction so the classification report can be
// built from the full confusion matrix.

use anyhow::{anyhow, Result};
use burn::prelude::*;

use crate::data::loaders::FerLoader;
use crate::ml::{
    evaluator::{forward_crops, predict},
    model::FerNet,
    report::ClassificationReport,
};

pub fn test<B: Backend>(
    model:       &FerNet<B>,
    loader:      &FerLoader<B>,
    num_classes: usize,
) -> Result<ClassificationReport> {
    let mut y_pred = Vec::with_capacity(loader.num_items());
    let mut y_true = Vec::with_capacity(loader.num_items());

    for batch in loader.iter() {
        let logits = forward_crops(model, batch.images);
        let preds  = predict(logits)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow!("Cannot read predictions: {e:?}"))?;

        y_pred.extend(preds.into_iter().map(|p| p as usize));
        y_true.extend(batch.labels);
    }

    tracing::debug!("Collected {} test predictions", y_pred.len());
    Ok(ClassificationReport::from_predictions(&y_true, &y_pred, num_classes))
}
