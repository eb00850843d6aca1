//! A dedicated thread that exclusively owns the detector.
//!
//! The engine is built on the worker thread itself, so it never has to
//! cross threads. Requests are handled one at a time, which keeps at most
//! one inference in flight per model.

use std::thread;

use tokio::sync::{mpsc, oneshot};

use crate::app::config::ModelConfig;
use crate::error::{DetectorError, Result};
use crate::pipeline::{Detections, InferenceEngine, LabelTable, PostProcessParams, YoloDetector};

enum Request {
    LoadModel(oneshot::Sender<bool>),
    Detect(Vec<u8>, oneshot::Sender<Result<Detections>>),
    Close(oneshot::Sender<()>),
    Shutdown,
}

type RequestTx = mpsc::Sender<Request>;
type RequestRx = mpsc::Receiver<Request>;

pub struct DetectorWorker {
    handle: DetectorHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl DetectorWorker {
    const MAX_QUEUED_REQUESTS: usize = 16;

    pub fn spawn<E, F>(model: ModelConfig, params: PostProcessParams, factory: F) -> Result<Self>
    where
        E: InferenceEngine + 'static,
        F: Fn(&ModelConfig) -> Result<E> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(Self::MAX_QUEUED_REQUESTS);
        tracing::trace!(%model, "starting detector worker");
        let thread = thread::Builder::new()
            .name("yolo-detector".to_string())
            .spawn(move || Self::run::<E, F>(model, params, factory, request_rx))?;

        Ok(Self {
            handle: DetectorHandle { request_tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> DetectorHandle {
        self.handle.clone()
    }

    /// Releases the model and waits for the worker thread to exit.
    pub async fn shutdown(mut self) {
        tracing::trace!("sending stop signal to detector worker");
        let _ = self.handle.request_tx.send(Request::Shutdown).await;
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
        tracing::trace!("stopped detector worker");
    }

    fn run<E, F>(model: ModelConfig, params: PostProcessParams, factory: F, mut request_rx: RequestRx)
    where
        E: InferenceEngine,
        F: Fn(&ModelConfig) -> Result<E>,
    {
        let mut detector: YoloDetector<E> = YoloDetector::new(params);
        while let Some(request) = request_rx.blocking_recv() {
            match request {
                Request::LoadModel(reply) => {
                    let labels = LabelTable::from_file_or(&model.label_filename, &model.fallback_labels);
                    let loaded = detector.load_model(|| factory(&model), labels);
                    let _ = reply.send(loaded);
                }
                Request::Detect(image, reply) => {
                    let result = detector.detect_objects(&image);
                    if let Err(err) = &result {
                        tracing::error!(%err, "detection failed");
                    }
                    let _ = reply.send(result);
                }
                Request::Close(reply) => {
                    detector.close();
                    let _ = reply.send(());
                }
                Request::Shutdown => break,
            }
        }
        detector.close();
        tracing::trace!("detector worker exiting");
    }
}

/// Dropping without `shutdown` only queues a stop request and does not
/// join the thread. `shutdown` is the only guaranteed release path.
impl Drop for DetectorWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(err) = self.handle.request_tx.try_send(Request::Shutdown) {
                tracing::warn!(%err, "could not queue stop for detector worker; model stays loaded until all handles drop");
            }
        }
    }
}

/// Cloneable submitter of requests to a `DetectorWorker`.
#[derive(Clone)]
pub struct DetectorHandle {
    request_tx: RequestTx,
}

impl DetectorHandle {
    pub async fn load_model(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Request::LoadModel(reply_tx)).await?;
        reply_rx.await.map_err(|_| DetectorError::WorkerGone)
    }

    pub async fn detect(&self, image: Vec<u8>) -> Result<Detections> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Request::Detect(image, reply_tx)).await?;
        reply_rx.await.map_err(|_| DetectorError::WorkerGone)?
    }

    pub async fn close(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Request::Close(reply_tx)).await?;
        reply_rx.await.map_err(|_| DetectorError::WorkerGone)
    }

    async fn submit(&self, request: Request) -> Result<()> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| DetectorError::WorkerGone)
    }
}
