//! The load pipeline: inspect, choose, decode, transfer, attach, finalize.
//!
//! Stages run strictly in order on the calling thread. The container, image
//! handle, decoded buffer and destination surface are plain owned values, so
//! the first failure drops whatever has been acquired so far and nothing is
//! retried. A surface that never reaches [`finalize`] is discarded by its
//! host, which means no error path can hand back a half-built image.
//!
//! Cancelling the interactive chooser ends the run with
//! [`LoadOutcome::Cancelled`], not with an error.

use tracing::{debug, info, warn};

use crate::codec::{ByteSource, HeifCodec, ImageContainer, ItemId, PixelSource};
use crate::config::LoaderConfig;
use crate::decoder::{decode, extract_metadata, get_handle};
use crate::error::{CodecError, LoadError};
use crate::inspect::{
    count_top_level_items, open, primary_item, resolve_selected_item, select_interactively,
    Choice, ItemChooser,
};
use crate::metadata::EXIF_BLOCK_TYPE;
use crate::surface::{Destination, Surface};
use crate::transfer::{
    attach_metadata, create_destination, finalize, surface_spec_for, transfer, CopyMode,
};

/// How the host invoked the load procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// A user is present and may be prompted.
    Interactive,
    /// Scripted call; never prompt.
    #[default]
    NonInteractive,
    /// Repeat with previous settings; never prompt.
    WithLastVals,
}

impl RunMode {
    /// Decode the host's numeric run mode.
    ///
    /// Only `0` prompts. Any value other than `0` or `2` is treated as a
    /// non-interactive call.
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => RunMode::Interactive,
            2 => RunMode::WithLastVals,
            _ => RunMode::NonInteractive,
        }
    }

    /// Whether the chooser may be shown.
    pub fn is_interactive(self) -> bool {
        matches!(self, RunMode::Interactive)
    }
}

/// Pipeline states, in the order a successful run passes through them.
///
/// `Finalized`, `Cancelled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Nothing acquired yet.
    Init,
    /// The container is open.
    Opened,
    /// The primary item, or its fallback, is known.
    ItemResolved,
    /// The user picked an item in the chooser.
    ItemChosenInteractively,
    /// The resolved item was kept without prompting.
    ItemChosenByDefault,
    /// A handle for the selected item is held.
    HandleAcquired,
    /// Pixels are decoded.
    Decoded,
    /// The destination surface exists.
    SurfaceCreated,
    /// Pixels are copied into the surface.
    Transferred,
    /// Metadata attachment has been attempted.
    MetadataAttached,
    /// The host image was handed back.
    Finalized,
    /// The user dismissed the chooser.
    Cancelled,
    /// A stage failed. See [`Pipeline::failed_after`].
    Failed,
}

/// A successfully loaded image and how it was produced.
#[derive(Debug)]
pub struct LoadedImage<I> {
    /// The host image handed back to the caller.
    pub image: I,
    /// The item that was loaded.
    pub item: ItemId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the image has an alpha channel.
    pub has_alpha: bool,
    /// How pixels were copied into the surface.
    pub copy_mode: CopyMode,
    /// Whether an EXIF parasite was attached.
    pub exif_attached: bool,
}

/// Terminal outcomes that are not failures.
#[derive(Debug)]
pub enum LoadOutcome<I> {
    /// The image was created and finalized.
    Loaded(LoadedImage<I>),
    /// The user dismissed the chooser. No image was created.
    Cancelled,
}

impl<I> LoadOutcome<I> {
    /// Whether the user cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }

    /// The loaded image, if any.
    pub fn into_loaded(self) -> Option<LoadedImage<I>> {
        match self {
            LoadOutcome::Loaded(loaded) => Some(loaded),
            LoadOutcome::Cancelled => None,
        }
    }
}

type HostImage<D> = <<D as Destination>::Surface as Surface>::Image;

/// One load run over a codec, a destination and a chooser.
pub struct Pipeline<'a, C, D, K: ?Sized> {
    codec: &'a C,
    destination: &'a mut D,
    chooser: &'a mut K,
    config: &'a LoaderConfig,
    stage: PipelineStage,
    failed_after: Option<PipelineStage>,
}

impl<'a, C, D, K> Pipeline<'a, C, D, K>
where
    C: HeifCodec,
    D: Destination,
    K: ItemChooser + ?Sized,
{
    /// A pipeline at [`PipelineStage::Init`].
    pub fn new(
        codec: &'a C,
        destination: &'a mut D,
        chooser: &'a mut K,
        config: &'a LoaderConfig,
    ) -> Self {
        Self {
            codec,
            destination,
            chooser,
            config,
            stage: PipelineStage::Init,
            failed_after: None,
        }
    }

    /// The last stage reached.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// The last stage completed before the run failed.
    pub fn failed_after(&self) -> Option<PipelineStage> {
        self.failed_after
    }

    /// Run the pipeline over `source`.
    pub fn load(
        &mut self,
        source: &ByteSource,
        mode: RunMode,
    ) -> Result<LoadOutcome<HostImage<D>>, LoadError> {
        self.stage = PipelineStage::Init;
        self.failed_after = None;
        let result = self.run(source, mode);
        if let Err(e) = &result {
            warn!(stage = ?self.stage, error = %e, %source, "Load failed");
            self.failed_after = Some(self.stage);
            self.advance(PipelineStage::Failed);
        }
        result
    }

    fn advance(&mut self, stage: PipelineStage) {
        debug!(from = ?self.stage, to = ?stage, "Pipeline stage");
        self.stage = stage;
    }

    fn run(
        &mut self,
        source: &ByteSource,
        mode: RunMode,
    ) -> Result<LoadOutcome<HostImage<D>>, LoadError> {
        let container = open(self.codec, source)?;
        self.advance(PipelineStage::Opened);

        let count = count_top_level_items(&container)?;
        let declared = primary_item(&container)?;
        let mut selected = resolve_selected_item(&container, declared)?;
        self.advance(PipelineStage::ItemResolved);

        if mode.is_interactive() && count > 1 {
            match select_interactively(
                &container,
                &mut *self.chooser,
                selected,
                self.config.preview_edge,
            )? {
                Choice::Selected(item) => selected = item,
                Choice::Cancelled => {
                    info!(%source, "Image selection cancelled");
                    self.advance(PipelineStage::Cancelled);
                    return Ok(LoadOutcome::Cancelled);
                }
            }
            if !container.is_top_level(selected) {
                return Err(LoadError::HandleResolution {
                    item: selected,
                    source: CodecError::new(format!(
                        "Item {selected} is not a top-level image"
                    )),
                });
            }
            self.advance(PipelineStage::ItemChosenInteractively);
        } else {
            self.advance(PipelineStage::ItemChosenByDefault);
        }

        let handle = get_handle(&container, selected)?;
        self.advance(PipelineStage::HandleAcquired);

        let decoded = decode(&handle)?;
        self.advance(PipelineStage::Decoded);

        let spec = surface_spec_for(
            &decoded,
            decoded.has_alpha(),
            source.path(),
            &self.config.layer_name,
        );
        let mut surface = create_destination(&mut *self.destination, &spec)?;
        self.advance(PipelineStage::SurfaceCreated);

        let copy_mode = transfer(&decoded, &mut surface)?;
        self.advance(PipelineStage::Transferred);

        let exif_attached = self.config.attach_exif
            && match extract_metadata(&handle, EXIF_BLOCK_TYPE) {
                Some(block) => {
                    if let Some(summary) = block.exif_summary() {
                        debug!(
                            orientation = ?summary.orientation,
                            make = ?summary.camera_make,
                            model = ?summary.camera_model,
                            "EXIF present"
                        );
                    }
                    attach_metadata(&mut surface, &block)
                }
                None => false,
            };
        self.advance(PipelineStage::MetadataAttached);

        let image = finalize(surface);
        self.advance(PipelineStage::Finalized);

        info!(
            item = %selected,
            width = decoded.width(),
            height = decoded.height(),
            has_alpha = decoded.has_alpha(),
            ?copy_mode,
            exif_attached,
            "Loaded image"
        );
        Ok(LoadOutcome::Loaded(LoadedImage {
            image,
            item: selected,
            width: decoded.width(),
            height: decoded.height(),
            has_alpha: decoded.has_alpha(),
            copy_mode,
            exif_attached,
        }))
    }
}

/// Run one load with a fresh [`Pipeline`].
pub fn load<C, D, K>(
    codec: &C,
    destination: &mut D,
    chooser: &mut K,
    config: &LoaderConfig,
    source: &ByteSource,
    mode: RunMode,
) -> Result<LoadOutcome<HostImage<D>>, LoadError>
where
    C: HeifCodec,
    D: Destination,
    K: ItemChooser + ?Sized,
{
    Pipeline::new(codec, destination, chooser, config).load(source, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::memory::{MemoryCodec, MemoryFile, MemoryItem};
    use crate::inspect::ItemCandidate;
    use crate::surface::raster::RasterDestination;
    use std::path::PathBuf;

    fn source() -> ByteSource {
        ByteSource::File(PathBuf::from("photo.heic"))
    }

    fn never_called(_: &[ItemCandidate], _: ItemId) -> Choice {
        panic!("chooser must not be called")
    }

    #[test]
    fn test_run_mode_from_raw() {
        assert_eq!(RunMode::from_raw(0), RunMode::Interactive);
        assert_eq!(RunMode::from_raw(1), RunMode::NonInteractive);
        assert_eq!(RunMode::from_raw(2), RunMode::WithLastVals);
        assert_eq!(RunMode::from_raw(3), RunMode::NonInteractive);
        assert_eq!(RunMode::from_raw(-1), RunMode::NonInteractive);
        assert!(!RunMode::WithLastVals.is_interactive());
    }

    #[test]
    fn test_stage_reaches_finalized() {
        let codec = MemoryCodec::new().with_file(
            "photo.heic",
            MemoryFile::new().with_item(MemoryItem::patterned(1, 4, 4, false)),
        );
        let mut dest = RasterDestination::new();
        let mut chooser = never_called;
        let config = LoaderConfig::default();

        let mut pipeline = Pipeline::new(&codec, &mut dest, &mut chooser, &config);
        let outcome = pipeline.load(&source(), RunMode::NonInteractive).unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Finalized);
        assert!(!outcome.is_cancelled());
    }

    #[test]
    fn test_stage_stops_where_decoding_failed() {
        let codec = MemoryCodec::new().with_file(
            "photo.heic",
            MemoryFile::new()
                .with_item(MemoryItem::patterned(1, 4, 4, false).with_decode_error("bad slice")),
        );
        let mut dest = RasterDestination::new();
        let mut chooser = never_called;
        let config = LoaderConfig::default();

        let mut pipeline = Pipeline::new(&codec, &mut dest, &mut chooser, &config);
        let err = pipeline.load(&source(), RunMode::NonInteractive).unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
        assert_eq!(pipeline.stage(), PipelineStage::Failed);
        assert_eq!(pipeline.failed_after(), Some(PipelineStage::HandleAcquired));
    }

    #[test]
    fn test_cancel_is_terminal_stage() {
        let codec = MemoryCodec::new().with_file(
            "photo.heic",
            MemoryFile::new()
                .with_item(MemoryItem::patterned(1, 2, 2, false))
                .with_item(MemoryItem::patterned(2, 2, 2, false)),
        );
        let mut dest = RasterDestination::new();
        let mut chooser = |_: &[ItemCandidate], _: ItemId| Choice::Cancelled;
        let config = LoaderConfig::default();

        let mut pipeline = Pipeline::new(&codec, &mut dest, &mut chooser, &config);
        let outcome = pipeline.load(&source(), RunMode::Interactive).unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(pipeline.stage(), PipelineStage::Cancelled);
        assert_eq!(pipeline.failed_after(), None);
        assert_eq!(dest.created(), 0);
    }

    #[test]
    fn test_auxiliary_choice_fails_before_handle() {
        let codec = MemoryCodec::new().with_file(
            "photo.heic",
            MemoryFile::new()
                .with_item(MemoryItem::patterned(1, 2, 2, false))
                .with_item(MemoryItem::patterned(2, 2, 2, false))
                .with_item(MemoryItem::patterned(3, 2, 2, true).auxiliary()),
        );
        let mut dest = RasterDestination::new();
        let mut chooser = |_: &[ItemCandidate], _: ItemId| Choice::Selected(ItemId(3));
        let config = LoaderConfig::default();

        let mut pipeline = Pipeline::new(&codec, &mut dest, &mut chooser, &config);
        let err = pipeline.load(&source(), RunMode::Interactive).unwrap_err();
        match err {
            LoadError::HandleResolution { item, .. } => assert_eq!(item, ItemId(3)),
            other => panic!("expected HandleResolution, got {other:?}"),
        }
        assert_eq!(pipeline.failed_after(), Some(PipelineStage::ItemResolved));
        assert!(codec.all_released());
        assert_eq!(dest.created(), 0);
    }

    #[test]
    fn test_reused_pipeline_clears_failure() {
        let codec = MemoryCodec::new()
            .with_file(
                "photo.heic",
                MemoryFile::new().with_item(MemoryItem::patterned(1, 2, 2, false)),
            )
            .with_file("broken.heic", MemoryFile::new());
        let mut dest = RasterDestination::new();
        let mut chooser = never_called;
        let config = LoaderConfig::default();

        let mut pipeline = Pipeline::new(&codec, &mut dest, &mut chooser, &config);
        let broken = ByteSource::File(PathBuf::from("broken.heic"));
        assert!(pipeline.load(&broken, RunMode::NonInteractive).is_err());
        assert_eq!(pipeline.stage(), PipelineStage::Failed);

        pipeline.load(&source(), RunMode::NonInteractive).unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Finalized);
        assert_eq!(pipeline.failed_after(), None);
    }

    #[test]
    fn test_exif_can_be_disabled() {
        let codec = MemoryCodec::new().with_file(
            "photo.heic",
            MemoryFile::new().with_item(
                MemoryItem::patterned(1, 2, 2, false).with_metadata("Exif", vec![0, 0, 0, 0, 7]),
            ),
        );
        let mut dest = RasterDestination::new();
        let mut chooser = never_called;
        let mut config = LoaderConfig::default();
        config.attach_exif = false;

        let loaded = load(
            &codec,
            &mut dest,
            &mut chooser,
            &config,
            &source(),
            RunMode::NonInteractive,
        )
        .unwrap()
        .into_loaded()
        .unwrap();
        assert!(!loaded.exif_attached);
        assert!(loaded.image.parasites.is_empty());
    }
}
