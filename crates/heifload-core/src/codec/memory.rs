//! In-memory codec.
//!
//! Containers are described with [`MemoryFile`] and [`MemoryItem`] and
//! registered under a path. Opening that path yields a container that behaves
//! like one read from disk: top-level and auxiliary items, a declared primary
//! pointer, per-row stride padding, metadata blocks, thumbnails and injected
//! decode failures.
//!
//! Every container, handle and decoded image holds a lease on a shared
//! ledger. The ledger counts acquisitions and releases per resource kind so
//! callers can check that nothing outlives the pipeline.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{ByteSource, HeifCodec, ImageContainer, ImageHandle, ItemId, PixelLayout, PixelSource};
use crate::error::CodecError;

/// Value written into every stride padding byte of a decoded buffer.
pub const PADDING_BYTE: u8 = 0xAB;

/// Kinds of codec resources tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// An open container.
    Container,
    /// An acquired item handle.
    Handle,
    /// A decoded pixel buffer.
    Image,
}

impl Resource {
    fn index(self) -> usize {
        match self {
            Resource::Container => 0,
            Resource::Handle => 1,
            Resource::Image => 2,
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    acquired: [Cell<usize>; 3],
    released: [Cell<usize>; 3],
}

#[derive(Debug)]
struct Lease {
    ledger: Rc<Ledger>,
    resource: Resource,
}

impl Lease {
    fn new(ledger: &Rc<Ledger>, resource: Resource) -> Self {
        let slot = &ledger.acquired[resource.index()];
        slot.set(slot.get() + 1);
        Self {
            ledger: Rc::clone(ledger),
            resource,
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let slot = &self.ledger.released[self.resource.index()];
        slot.set(slot.get() + 1);
    }
}

/// One item of an in-memory container.
#[derive(Debug, Clone)]
pub struct MemoryItem {
    /// Item ID inside the container.
    pub id: ItemId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the item carries alpha.
    pub has_alpha: bool,
    /// Whether the item is directly selectable (false for auxiliary images).
    pub top_level: bool,
    /// Extra bytes appended to every decoded row.
    pub row_padding: usize,
    /// Decoding fails with this message when set.
    pub decode_error: Option<String>,
    /// Metadata blocks as `(type, bytes)`, in container order.
    pub metadata: Vec<(String, Vec<u8>)>,
    /// Embedded thumbnail item.
    pub thumbnail: Option<Box<MemoryItem>>,
    pixels: Vec<u8>,
}

impl MemoryItem {
    /// An item from tightly packed pixels, RGBA when `has_alpha`, RGB otherwise.
    pub fn new(id: u32, width: u32, height: u32, has_alpha: bool, pixels: Vec<u8>) -> Self {
        let bpp = PixelLayout::for_alpha(has_alpha).bytes_per_pixel();
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * bpp,
            "Pixel buffer size mismatch"
        );
        Self {
            id: ItemId(id),
            width,
            height,
            has_alpha,
            top_level: true,
            row_padding: 0,
            decode_error: None,
            metadata: Vec::new(),
            thumbnail: None,
            pixels,
        }
    }

    /// An item whose pixel values depend on its id and position, so two
    /// items never decode to the same content.
    pub fn patterned(id: u32, width: u32, height: u32, has_alpha: bool) -> Self {
        let bpp = PixelLayout::for_alpha(has_alpha).bytes_per_pixel();
        let mut pixels = Vec::with_capacity(width as usize * height as usize * bpp);
        for y in 0..height {
            for x in 0..width {
                let base = id.wrapping_mul(37).wrapping_add(y * width + x) as u8;
                pixels.push(base);
                pixels.push(base.wrapping_add(id as u8));
                pixels.push(base ^ 0x5A);
                if has_alpha {
                    pixels.push(base.wrapping_mul(3));
                }
            }
        }
        Self::new(id, width, height, has_alpha, pixels)
    }

    /// Append `padding` bytes to every decoded row.
    pub fn with_row_padding(mut self, padding: usize) -> Self {
        self.row_padding = padding;
        self
    }

    /// Mark the item as auxiliary (not top-level).
    pub fn auxiliary(mut self) -> Self {
        self.top_level = false;
        self
    }

    /// Add a metadata block of `block_type`.
    pub fn with_metadata(mut self, block_type: &str, bytes: Vec<u8>) -> Self {
        self.metadata.push((block_type.to_string(), bytes));
        self
    }

    /// Make decoding fail with `message`.
    pub fn with_decode_error(mut self, message: &str) -> Self {
        self.decode_error = Some(message.to_string());
        self
    }

    /// Attach a thumbnail item.
    pub fn with_thumbnail(mut self, thumbnail: MemoryItem) -> Self {
        self.thumbnail = Some(Box::new(thumbnail));
        self
    }

    /// Tightly packed source pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The pixels converted to `layout`, tightly packed.
    pub fn pixels_as(&self, layout: PixelLayout) -> Vec<u8> {
        let src_bpp = PixelLayout::for_alpha(self.has_alpha).bytes_per_pixel();
        let mut out = Vec::with_capacity(self.pixels.len() / src_bpp * layout.bytes_per_pixel());
        for px in self.pixels.chunks_exact(src_bpp) {
            out.extend_from_slice(&px[..3]);
            if layout.has_alpha() {
                out.push(px.get(3).copied().unwrap_or(u8::MAX));
            }
        }
        out
    }

    fn render(&self, layout: PixelLayout) -> (Vec<u8>, usize) {
        let tight = self.width as usize * layout.bytes_per_pixel();
        let stride = tight + self.row_padding;
        if tight == 0 || self.height == 0 {
            return (Vec::new(), stride);
        }

        let packed = self.pixels_as(layout);
        let mut out = Vec::with_capacity(stride * self.height as usize);
        for row in packed.chunks_exact(tight) {
            out.extend_from_slice(row);
            out.resize(out.len() + self.row_padding, PADDING_BYTE);
        }
        (out, stride)
    }
}

/// Description of an in-memory container.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    /// Items in container order.
    pub items: Vec<MemoryItem>,
    /// Declared primary item. `None` means the container has no primary pointer.
    pub primary: Option<ItemId>,
}

impl MemoryFile {
    /// An empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. The first item added becomes the primary unless one is set.
    pub fn with_item(mut self, item: MemoryItem) -> Self {
        if self.items.is_empty() && self.primary.is_none() {
            self.primary = Some(item.id);
        }
        self.items.push(item);
        self
    }

    /// Declare item `id` as primary.
    pub fn with_primary(mut self, id: u32) -> Self {
        self.primary = Some(ItemId(id));
        self
    }

    /// Drop the primary item pointer.
    pub fn without_primary(mut self) -> Self {
        self.primary = None;
        self
    }
}

/// A codec serving [`MemoryFile`]s registered by path.
#[derive(Debug, Default)]
pub struct MemoryCodec {
    files: HashMap<PathBuf, Rc<MemoryFile>>,
    ledger: Rc<Ledger>,
}

impl MemoryCodec {
    /// A codec with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `file` for `path`.
    pub fn with_file(mut self, path: impl Into<PathBuf>, file: MemoryFile) -> Self {
        self.add_file(path, file);
        self
    }

    /// Serve `file` for `path`.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, file: MemoryFile) {
        self.files.insert(path.into(), Rc::new(file));
    }

    /// How many resources of this kind were acquired so far.
    pub fn acquired(&self, resource: Resource) -> usize {
        self.ledger.acquired[resource.index()].get()
    }

    /// How many resources of this kind were released so far.
    pub fn released(&self, resource: Resource) -> usize {
        self.ledger.released[resource.index()].get()
    }

    /// Resources acquired but not yet released.
    pub fn live(&self, resource: Resource) -> usize {
        self.acquired(resource) - self.released(resource)
    }

    /// True when every acquired resource has been released.
    pub fn all_released(&self) -> bool {
        [Resource::Container, Resource::Handle, Resource::Image]
            .into_iter()
            .all(|r| self.live(r) == 0)
    }

    fn lookup(&self, path: &Path) -> Option<Rc<MemoryFile>> {
        self.files.get(path).cloned()
    }
}

impl HeifCodec for MemoryCodec {
    type Container = MemoryContainer;

    fn open(&self, source: &ByteSource) -> Result<MemoryContainer, CodecError> {
        let file = match source {
            ByteSource::File(path) => self.lookup(path).ok_or_else(|| {
                CodecError::new(format!("Input file does not exist: {}", path.display()))
            })?,
            ByteSource::Memory(_) => {
                return Err(CodecError::new(
                    "Invalid input: No 'ftyp' box in in-memory source",
                ))
            }
        };
        Ok(MemoryContainer {
            file,
            ledger: Rc::clone(&self.ledger),
            _lease: Lease::new(&self.ledger, Resource::Container),
        })
    }
}

/// An open in-memory container.
#[derive(Debug)]
pub struct MemoryContainer {
    file: Rc<MemoryFile>,
    ledger: Rc<Ledger>,
    _lease: Lease,
}

impl ImageContainer for MemoryContainer {
    type Handle = MemoryHandle;

    fn top_level_item_ids(&self) -> Vec<ItemId> {
        self.file
            .items
            .iter()
            .filter(|item| item.top_level)
            .map(|item| item.id)
            .collect()
    }

    fn primary_item_id(&self) -> Result<ItemId, CodecError> {
        self.file
            .primary
            .ok_or_else(|| CodecError::new("No or invalid primary item"))
    }

    fn handle(&self, item: ItemId) -> Result<MemoryHandle, CodecError> {
        let found = self
            .file
            .items
            .iter()
            .find(|candidate| candidate.id == item && candidate.top_level)
            .ok_or_else(|| CodecError::new(format!("Nonexisting item ID referenced: {item}")))?;
        Ok(MemoryHandle {
            item: found.clone(),
            ledger: Rc::clone(&self.ledger),
            _lease: Lease::new(&self.ledger, Resource::Handle),
        })
    }
}

/// Handle to one in-memory item.
#[derive(Debug)]
pub struct MemoryHandle {
    item: MemoryItem,
    ledger: Rc<Ledger>,
    _lease: Lease,
}

impl MemoryHandle {
    fn materialize(&self, item: &MemoryItem, layout: PixelLayout) -> MemoryImage {
        let (data, stride) = item.render(layout);
        MemoryImage {
            width: item.width,
            height: item.height,
            bits_per_pixel: layout.bits_per_pixel(),
            stride,
            data,
            _lease: Lease::new(&self.ledger, Resource::Image),
        }
    }
}

impl ImageHandle for MemoryHandle {
    type Image = MemoryImage;

    fn item_id(&self) -> ItemId {
        self.item.id
    }

    fn width(&self) -> u32 {
        self.item.width
    }

    fn height(&self) -> u32 {
        self.item.height
    }

    fn has_alpha(&self) -> bool {
        self.item.has_alpha
    }

    fn decode(&self, layout: PixelLayout) -> Result<MemoryImage, CodecError> {
        if let Some(message) = &self.item.decode_error {
            return Err(CodecError::new(message.clone()));
        }
        Ok(self.materialize(&self.item, layout))
    }

    fn metadata_block_ids(&self, block_type: &str) -> Vec<ItemId> {
        self.item
            .metadata
            .iter()
            .enumerate()
            .filter(|(_, (kind, _))| kind == block_type)
            .map(|(index, _)| ItemId(index as u32 + 1))
            .collect()
    }

    fn metadata(&self, block: ItemId) -> Result<Vec<u8>, CodecError> {
        (block.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.item.metadata.get(index))
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| CodecError::new(format!("Nonexisting metadata block: {block}")))
    }

    fn thumbnail(&self, layout: PixelLayout) -> Option<MemoryImage> {
        self.item
            .thumbnail
            .as_deref()
            .map(|thumb| self.materialize(thumb, layout))
    }
}

/// A decoded in-memory image.
#[derive(Debug)]
pub struct MemoryImage {
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    stride: usize,
    data: Vec<u8>,
    _lease: Lease,
}

impl PixelSource for MemoryImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn bits_per_pixel(&self) -> u32 {
        self.bits_per_pixel
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
