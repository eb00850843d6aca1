pub mod channel;
pub mod config;

use std::error::Error;

use crate::app::channel::{MethodCall, MethodResult, DETECTION_FAILED, DETECT_OBJECTS, INVALID_ARGUMENT, LOAD_MODEL};
use crate::app::config::{AlertConfig, AppConfig, ModelConfig};
use crate::pipeline::{log_detections, InferenceEngine};
use crate::worker::{DetectorHandle, DetectorWorker};

/// Hosts the detector worker and answers method calls from the UI side.
pub struct App {
    worker: DetectorWorker,
    detector: DetectorHandle,
    alerts: AlertConfig,
}

impl App {
    #[cfg(feature = "tflite")]
    pub async fn start(config: AppConfig) -> Result<App, Box<dyn Error>> {
        Self::start_with(config, crate::pipeline::TFLiteEngine::new).await
    }

    pub async fn start_with<E, F>(config: AppConfig, factory: F) -> Result<App, Box<dyn Error>>
    where
        E: InferenceEngine + 'static,
        F: Fn(&ModelConfig) -> crate::Result<E> + Send + 'static,
    {
        tracing::info!(%config.model, "starting detector");
        let params = config.postprocess_params();
        let worker = DetectorWorker::spawn(config.model, params, factory)?;
        let detector = worker.handle();
        Ok(Self {
            worker,
            detector,
            alerts: config.alerts,
        })
    }

    pub async fn handle(&self, call: &MethodCall) -> MethodResult {
        tracing::trace!(method = %call.method, "handling method call");
        match call.method.as_str() {
            LOAD_MODEL => {
                let loaded = self.detector.load_model().await.unwrap_or_else(|err| {
                    tracing::error!(%err, "load request failed");
                    false
                });
                MethodResult::Success(loaded.into())
            }
            DETECT_OBJECTS => {
                let Some(image) = call.image_bytes() else {
                    return MethodResult::error(INVALID_ARGUMENT, "Image bytes are null");
                };
                match self.detector.detect(image).await {
                    Ok(dets) => {
                        log_detections(&dets, &self.alerts);
                        match serde_json::to_value(&dets) {
                            Ok(value) => MethodResult::Success(value),
                            Err(err) => MethodResult::error(DETECTION_FAILED, err.to_string()),
                        }
                    }
                    Err(err) => MethodResult::error(DETECTION_FAILED, err.to_string()),
                }
            }
            _ => MethodResult::NotImplemented,
        }
    }

    pub async fn stop(self) {
        self.worker.shutdown().await;
    }
}
