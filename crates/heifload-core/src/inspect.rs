//! Container inspection and item selection.
//!
//! Opens a container, checks it holds something to decode, and settles on
//! exactly one item: the declared primary item, the first top-level item
//! when the primary pointer is unusable, or whatever the user picks in the
//! interactive chooser.

use tracing::{debug, warn};

use crate::codec::{ByteSource, HeifCodec, ImageContainer, ImageHandle, ItemId, PixelLayout};
use crate::error::LoadError;
use crate::preview::Preview;

/// Outcome of the interactive chooser. Cancelling is not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// The user picked this item.
    Selected(ItemId),
    /// The user dismissed the chooser.
    Cancelled,
}

/// One entry offered to the chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCandidate {
    /// Top-level item ID.
    pub id: ItemId,
    /// Item width in pixels.
    pub width: u32,
    /// Item height in pixels.
    pub height: u32,
    /// Whether this is the item preselected in the chooser.
    pub is_primary: bool,
    /// Thumbnail for the chooser, if one could be produced.
    pub preview: Option<Preview>,
}

/// The host UI that lets the user pick one of several images.
///
/// Blocks until the user picks an item or cancels.
pub trait ItemChooser {
    /// Show `candidates` with `default` preselected.
    fn choose(&mut self, candidates: &[ItemCandidate], default: ItemId) -> Choice;
}

impl<F> ItemChooser for F
where
    F: FnMut(&[ItemCandidate], ItemId) -> Choice,
{
    fn choose(&mut self, candidates: &[ItemCandidate], default: ItemId) -> Choice {
        self(candidates, default)
    }
}

/// Open `source` with the codec.
pub fn open<C: HeifCodec>(codec: &C, source: &ByteSource) -> Result<C::Container, LoadError> {
    let container = codec.open(source).map_err(LoadError::ContainerOpen)?;
    debug!(%source, "Opened container");
    Ok(container)
}

/// Number of top-level items.
///
/// # Errors
///
/// `EmptyContainer` when there are none.
pub fn count_top_level_items<C: ImageContainer>(container: &C) -> Result<usize, LoadError> {
    match container.top_level_item_ids().len() {
        0 => Err(LoadError::EmptyContainer),
        count => Ok(count),
    }
}

/// The primary item the container declares.
pub fn primary_item<C: ImageContainer>(container: &C) -> Result<ItemId, LoadError> {
    container
        .primary_item_id()
        .map_err(LoadError::PrimaryLookup)
}

/// The declared primary if it is a top-level item, otherwise the first
/// top-level item.
///
/// # Errors
///
/// `EmptyContainer` when there is no top-level item to fall back to.
pub fn resolve_selected_item<C: ImageContainer>(
    container: &C,
    declared_primary: ItemId,
) -> Result<ItemId, LoadError> {
    if container.is_top_level(declared_primary) {
        return Ok(declared_primary);
    }

    let fallback = resolve_from_list(&container.top_level_item_ids(), declared_primary)
        .ok_or(LoadError::EmptyContainer)?;
    warn!(
        declared = %declared_primary,
        using = %fallback,
        "Primary item is not a top-level image, using the first top-level image"
    );
    Ok(fallback)
}

/// Selection rule over an explicit top-level list.
pub fn resolve_from_list(top_level: &[ItemId], declared_primary: ItemId) -> Option<ItemId> {
    if top_level.contains(&declared_primary) {
        Some(declared_primary)
    } else {
        top_level.first().copied()
    }
}

/// Describe every top-level item for the chooser.
///
/// Previews come from each item's embedded thumbnail, scaled to fit
/// `preview_edge`; zero disables them.
pub fn candidates<C: ImageContainer>(
    container: &C,
    primary: ItemId,
    preview_edge: u32,
) -> Result<Vec<ItemCandidate>, LoadError> {
    container
        .top_level_item_ids()
        .into_iter()
        .map(|id| -> Result<ItemCandidate, LoadError> {
            let handle = container
                .handle(id)
                .map_err(|source| LoadError::HandleResolution { item: id, source })?;
            let preview = if preview_edge == 0 {
                None
            } else {
                let layout = PixelLayout::for_alpha(handle.has_alpha());
                handle
                    .thumbnail(layout)
                    .and_then(|thumb| Preview::from_pixels(&thumb, preview_edge))
            };
            Ok(ItemCandidate {
                id,
                width: handle.width(),
                height: handle.height(),
                is_primary: id == primary,
                preview,
            })
        })
        .collect()
}

/// Let the user pick an item.
///
/// Handles opened to describe the candidates are released before the
/// chooser returns.
pub fn select_interactively<C, K>(
    container: &C,
    chooser: &mut K,
    default: ItemId,
    preview_edge: u32,
) -> Result<Choice, LoadError>
where
    C: ImageContainer,
    K: ItemChooser + ?Sized,
{
    let candidates = candidates(container, default, preview_edge)?;
    let choice = chooser.choose(&candidates, default);
    debug!(?choice, offered = candidates.len(), "Chooser returned");
    Ok(choice)
}
