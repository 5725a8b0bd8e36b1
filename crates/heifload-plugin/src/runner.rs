//! Procedure entry point: validate the call, run the pipeline, report back.

use heifload_core::surface::raster::RasterImage;
use heifload_core::{
    ByteSource, Destination, HeifCodec, ItemChooser, LoadOutcome, LoaderConfig, Pipeline, Surface,
};
use tracing::{debug, warn};

use crate::procedure::{CallError, LoadRequest, Param, LOAD_PROC};
use crate::status::{PdbStatus, ReturnValues};

/// Where user-visible error messages go.
pub trait MessageSink {
    /// Show `text` to the user.
    fn message(&mut self, text: &str);
}

impl MessageSink for Vec<String> {
    fn message(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// A host image that can be named in the return values.
pub trait HostImage {
    /// ID returned to the caller.
    fn image_id(&self) -> u32;
}

impl HostImage for RasterImage {
    fn image_id(&self) -> u32 {
        self.id
    }
}

/// The host collaborators one call runs against.
pub struct Environment<'a, C, D, K: ?Sized, M: ?Sized> {
    /// Opens containers.
    pub codec: &'a C,
    /// Creates the image.
    pub destination: &'a mut D,
    /// Shown when several images are present.
    pub chooser: &'a mut K,
    /// Receives the error message.
    pub messages: &'a mut M,
    /// Loader settings.
    pub config: &'a LoaderConfig,
}

/// Result of one procedure call.
#[derive(Debug)]
pub struct RunOutput<I> {
    /// Status and image ID.
    pub values: ReturnValues,
    /// The created image on success.
    pub image: Option<I>,
}

impl<I> RunOutput<I> {
    fn status(status: PdbStatus) -> Self {
        Self {
            values: ReturnValues::status(status),
            image: None,
        }
    }
}

/// Handle a call of procedure `name`.
///
/// Malformed calls return `CallingError` without opening anything. Pipeline
/// failures return `ExecutionError` after exactly one message has been sent
/// to the sink. Cancelling the chooser returns `Cancel` silently.
pub fn run<C, D, K, M>(
    name: &str,
    params: &[Param],
    env: Environment<'_, C, D, K, M>,
) -> RunOutput<<D::Surface as Surface>::Image>
where
    C: HeifCodec,
    D: Destination,
    <D::Surface as Surface>::Image: HostImage,
    K: ItemChooser + ?Sized,
    M: MessageSink + ?Sized,
{
    let request = match parse_call(name, params) {
        Ok(request) => request,
        Err(e) => {
            warn!(procedure = name, error = %e, "Rejected call");
            return RunOutput::status(PdbStatus::CallingError);
        }
    };
    debug!(
        filename = %request.filename.display(),
        run_mode = ?request.run_mode,
        "Load requested"
    );

    let source = ByteSource::File(request.filename);
    let mut pipeline = Pipeline::new(env.codec, env.destination, env.chooser, env.config);
    match pipeline.load(&source, request.run_mode) {
        Ok(LoadOutcome::Loaded(loaded)) => RunOutput {
            values: ReturnValues::success(loaded.image.image_id()),
            image: Some(loaded.image),
        },
        Ok(LoadOutcome::Cancelled) => RunOutput::status(PdbStatus::Cancel),
        Err(e) => {
            env.messages.message(&e.to_string());
            RunOutput::status(PdbStatus::ExecutionError)
        }
    }
}

fn parse_call(name: &str, params: &[Param]) -> Result<LoadRequest, CallError> {
    if name != LOAD_PROC {
        return Err(CallError::UnknownProcedure(name.to_string()));
    }
    LoadRequest::parse(params)
}
