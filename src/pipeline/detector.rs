use std::time::Instant;

use crate::error::{DetectorError, Result};
use crate::pipeline::detection::Detections;
use crate::pipeline::engine::InferenceEngine;
use crate::pipeline::labels::LabelTable;
use crate::pipeline::postprocess::{process_output, PostProcessParams};
use crate::pipeline::preprocess::prepare_input;

/// Owns the model handle and turns encoded images into detections.
pub struct YoloDetector<E> {
    engine: Option<E>,
    labels: LabelTable,
    params: PostProcessParams,
}

impl<E: InferenceEngine> YoloDetector<E> {
    pub fn new(params: PostProcessParams) -> Self {
        Self {
            engine: None,
            labels: LabelTable::default(),
            params,
        }
    }

    /// Builds the engine and installs the label table. Any previously
    /// loaded engine is released first. Returns whether a model is loaded.
    pub fn load_model<F>(&mut self, factory: F, labels: LabelTable) -> bool
    where
        F: FnOnce() -> Result<E>,
    {
        self.close();
        match factory().and_then(|engine| self.check_input_size(engine)) {
            Ok(engine) => {
                tracing::info!(labels = labels.len(), "model loaded");
                self.engine = Some(engine);
                self.labels = labels;
                true
            }
            Err(err) => {
                tracing::error!(%err, "error loading model");
                false
            }
        }
    }

    fn check_input_size(&self, engine: E) -> Result<E> {
        if engine.input_size() != self.params.input_size {
            return Err(DetectorError::InvalidInput(format!(
                "model input {} does not match configured {}",
                engine.input_size(),
                self.params.input_size
            )));
        }
        Ok(engine)
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.is_some()
    }

    pub fn detect_objects(&mut self, image_bytes: &[u8]) -> Result<Detections> {
        let Some(engine) = self.engine.as_mut() else {
            tracing::warn!("detect requested without a loaded model");
            return Ok(Detections::new());
        };

        let prepared = prepare_input(image_bytes, self.params.input_size)?;
        let start = Instant::now();
        let output = engine.run(&prepared.data)?;
        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "inference complete");

        let detections = process_output(
            Some(&output),
            prepared.original_width,
            prepared.original_height,
            &self.labels,
            &self.params,
        );
        tracing::debug!(count = detections.len(), "detections after nms");
        Ok(detections)
    }

    /// Releases the model. Safe to call more than once.
    pub fn close(&mut self) {
        if self.engine.take().is_some() {
            tracing::info!("model released");
        }
    }
}
