use image::RgbImage;
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use toonswap_core::{FilterError, Pipeline, Preset};
use toonswap_face::{SwapEngine, SwapError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("swap error: {0}")]
    Swap(#[from] SwapError),
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("engine thread exited")]
    ChannelClosed,
}

impl EngineError {
    /// True for failures the client caused (bad upload, no face).
    pub fn is_client_error(&self) -> bool {
        match self {
            EngineError::Swap(e) => e.is_client_error(),
            EngineError::Filter(_) => true,
            EngineError::ChannelClosed => false,
        }
    }
}

/// One unit of work for the engine thread.
pub struct ProcessRequest {
    /// Face donor. `None` skips the swap and runs filters on `base` alone.
    pub source: Option<RgbImage>,
    pub base: RgbImage,
    pub preset: Preset,
    pub apply_filters: bool,
    pub seed: u64,
}

enum EngineMsg {
    Process {
        request: ProcessRequest,
        reply: oneshot::Sender<Result<RgbImage, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMsg>,
}

impl EngineHandle {
    /// Run a request through the engine thread and await its reply.
    pub async fn process(&self, request: ProcessRequest) -> Result<RgbImage, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineMsg::Process {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads all ONNX models synchronously (fail-fast), then enters a request
/// loop. Each request runs start-to-finish on this thread; concurrency
/// exists only across queued requests.
pub fn spawn_engine(model_dir: &Path, queue_depth: usize) -> Result<EngineHandle, SwapError> {
    let mut swap_engine = SwapEngine::load(model_dir)?;

    let (tx, mut rx) = mpsc::channel::<EngineMsg>(queue_depth);

    std::thread::Builder::new()
        .name("toonswap-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(msg) = rx.blocking_recv() {
                match msg {
                    EngineMsg::Process { request, reply } => {
                        let _ = reply.send(run_process(&mut swap_engine, request));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// Swap (when a source is present), then run the filter pipeline.
fn run_process(
    swap_engine: &mut SwapEngine,
    request: ProcessRequest,
) -> Result<RgbImage, EngineError> {
    let swapped = match &request.source {
        Some(source) => swap_engine.swap(source, &request.base)?,
        None => request.base.clone(),
    };

    if !request.apply_filters {
        return Ok(swapped);
    }

    let pipeline = Pipeline::from_preset(&request.preset);
    tracing::debug!(
        preset = %request.preset.name,
        stages = pipeline.len(),
        seed = request.seed,
        "running filter pipeline"
    );
    Ok(pipeline.run(&swapped, request.seed)?)
}
