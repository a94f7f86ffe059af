//! Document rendering
//!
//! `DocumentRenderer` is the seam between the laid-out pages and the output
//! format; `PdfRenderer` writes US-Letter PDFs in which each distinct image
//! is stored once and referenced from every page that shows it.

use crate::cache::{image_key, FileCache};
use crate::error::{ProxyError, Result};
use crate::layout::{Page, Placement};
use printpdf::image_crate::{self, ImageFormat};
use printpdf::lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, ObjectId, Stream,
};
use printpdf::{Mm, Pt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// US Letter, portrait
pub const PAGE_WIDTH_MM: f32 = 215.9;
pub const PAGE_HEIGHT_MM: f32 = 279.4;

/// Supported card image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
        }
    }
}

/// Detect the image format from its content, accepting only JPEG and PNG
pub fn sniff_image_kind(asset_name: &str, bytes: &[u8]) -> Result<ImageKind> {
    match image_crate::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok(ImageKind::Jpeg),
        Ok(ImageFormat::Png) => Ok(ImageKind::Png),
        Ok(other) => Err(ProxyError::UnsupportedImage {
            asset: asset_name.to_string(),
            detected: format!("image/{}", format!("{:?}", other).to_lowercase()),
        }),
        Err(_) => Err(ProxyError::UnsupportedImage {
            asset: asset_name.to_string(),
            detected: "unknown".to_string(),
        }),
    }
}

/// Output document under construction
pub trait DocumentRenderer {
    /// Make an image available for placement under `name`
    fn register_image(&mut self, name: &str, kind: ImageKind, bytes: &[u8]) -> Result<()>;

    /// Start a new page; subsequent placements go onto it
    fn add_page(&mut self) -> Result<()>;

    /// Place a registered image on the current page
    fn place_image(&mut self, placement: &Placement) -> Result<()>;

    fn write_to(self, path: &Path) -> Result<()>
    where
        Self: Sized;
}

/// Register every distinct image from the cache, then emit pages in order
pub fn render_document<R: DocumentRenderer>(
    renderer: &mut R,
    cache: &FileCache,
    pages: &[Page],
) -> Result<()> {
    let mut registered = HashSet::new();
    for placement in pages.iter().flat_map(|page| page.placements.iter()) {
        let name = placement.asset_name.as_str();
        if !registered.insert(name) {
            continue;
        }
        let bytes = cache.read(&image_key(name))?;
        let kind = sniff_image_kind(name, &bytes)?;
        renderer.register_image(name, kind, &bytes)?;
    }

    for page in pages {
        renderer.add_page()?;
        for placement in &page.placements {
            renderer.place_image(placement)?;
        }
    }

    log::debug!(
        "Rendered {} page(s) using {} distinct image(s)",
        pages.len(),
        registered.len()
    );
    Ok(())
}

/// An image stream shared by every placement of one asset
struct EmbeddedImage {
    id: ObjectId,
    /// Key in each page's /XObject resource dictionary
    resource: String,
}

#[derive(Default)]
struct PageContent {
    operations: Vec<Operation>,
    xobjects: BTreeMap<String, ObjectId>,
}

/// PDF renderer built on the lopdf object model that printpdf writes with
pub struct PdfRenderer {
    title: String,
    doc: Document,
    images: HashMap<String, EmbeddedImage>,
    pages: Vec<PageContent>,
}

impl PdfRenderer {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            doc: Document::with_version("1.5"),
            images: HashMap::new(),
            pages: Vec::new(),
        }
    }

    /// Serialize the whole document
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            self.pages.push(PageContent::default());
        }

        let pages_id = self.doc.new_object_id();
        let mut kids = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            let content = Content {
                operations: page.operations,
            };
            let mut stream = Stream::new(Dictionary::new(), content.encode().map_err(render_error)?);
            stream.compress().map_err(render_error)?;
            let content_id = self.doc.add_object(stream);

            let mut xobjects = Dictionary::new();
            for (resource, id) in page.xobjects {
                xobjects.set(resource, id);
            }
            let mut resources = Dictionary::new();
            resources.set("XObject", xobjects);

            let mut page_dict = Dictionary::new();
            page_dict.set("Type", "Page");
            page_dict.set("Parent", pages_id);
            page_dict.set("Contents", content_id);
            page_dict.set("Resources", resources);
            kids.push(Object::Reference(self.doc.add_object(page_dict)));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", "Pages");
        pages.set("Count", kids.len() as i64);
        pages.set("Kids", kids);
        pages.set(
            "MediaBox",
            vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(Pt::from(Mm(PAGE_WIDTH_MM)).0),
                Object::Real(Pt::from(Mm(PAGE_HEIGHT_MM)).0),
            ],
        );
        self.doc.set_object(pages_id, pages);

        let mut catalog = Dictionary::new();
        catalog.set("Type", "Catalog");
        catalog.set("Pages", pages_id);
        let catalog_id = self.doc.add_object(catalog);

        let mut info = Dictionary::new();
        info.set("Title", Object::string_literal(self.title.as_str()));
        info.set("Producer", Object::string_literal("cardproxy_pdf"));
        let info_id = self.doc.add_object(info);

        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).map_err(render_error)?;
        Ok(bytes)
    }
}

fn render_error(e: impl std::fmt::Display) -> ProxyError {
    ProxyError::Render(e.to_string())
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", "XObject");
    dict.set("Subtype", "Image");
    dict.set("Width", width);
    dict.set("Height", height);
    dict.set("ColorSpace", color_space);
    dict.set("BitsPerComponent", 8);
    dict
}

/// Size and component count from a JPEG frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
}

fn read_jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            // fill byte
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let is_frame = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            // precision, height, width, component count
            let header = bytes.get(pos + 4..pos + 10)?;
            let height = u16::from_be_bytes([header[1], header[2]]) as u32;
            let width = u16::from_be_bytes([header[3], header[4]]) as u32;
            if width == 0 || height == 0 {
                return None;
            }
            return Some(JpegFrame {
                width,
                height,
                components: header[5],
            });
        }
        pos += 2 + length;
    }
    None
}

/// JPEG data embedded as-is behind a DCTDecode filter
fn jpeg_stream(asset_name: &str, bytes: &[u8]) -> Result<Option<Stream>> {
    let frame = read_jpeg_frame(bytes).ok_or_else(|| ProxyError::ImageDecode {
        asset: asset_name.to_string(),
        reason: "no JPEG frame header".to_string(),
    })?;
    let color_space = match frame.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        // CMYK and anything unusual is decoded instead
        _ => return Ok(None),
    };
    let mut dict = image_dict(frame.width, frame.height, color_space);
    dict.set("Filter", "DCTDecode");
    Ok(Some(Stream::new(dict, bytes.to_vec()).with_compression(false)))
}

/// Decoded pixels, alpha flattened, Flate-compressed
fn decoded_stream(asset_name: &str, kind: ImageKind, bytes: &[u8]) -> Result<Stream> {
    let decoded = image_crate::load_from_memory_with_format(bytes, kind.image_format())
        .map_err(|e| ProxyError::ImageDecode {
            asset: asset_name.to_string(),
            reason: e.to_string(),
        })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut stream = Stream::new(image_dict(width, height, "DeviceRGB"), rgb.into_raw());
    stream.compress().map_err(render_error)?;
    Ok(stream)
}

impl DocumentRenderer for PdfRenderer {
    fn register_image(&mut self, name: &str, kind: ImageKind, bytes: &[u8]) -> Result<()> {
        let passthrough = match kind {
            ImageKind::Jpeg => jpeg_stream(name, bytes)?,
            ImageKind::Png => None,
        };
        let stream = match passthrough {
            Some(stream) => stream,
            None => decoded_stream(name, kind, bytes)?,
        };

        match self.images.get(name) {
            Some(existing) => self.doc.set_object(existing.id, stream),
            None => {
                let id = self.doc.add_object(stream);
                let resource = format!("Im{}", self.images.len() + 1);
                self.images
                    .insert(name.to_string(), EmbeddedImage { id, resource });
            }
        }
        Ok(())
    }

    fn add_page(&mut self) -> Result<()> {
        self.pages.push(PageContent::default());
        Ok(())
    }

    fn place_image(&mut self, placement: &Placement) -> Result<()> {
        let page = self
            .pages
            .last_mut()
            .ok_or_else(|| ProxyError::Render("image placed before any page".to_string()))?;
        let image = self.images.get(&placement.asset_name).ok_or_else(|| {
            ProxyError::Render(format!("image {} was not registered", placement.asset_name))
        })?;

        // Layout is top-left based, PDF user space is bottom-left
        let x = Pt::from(Mm(placement.x_mm)).0;
        let y = Pt::from(Mm(PAGE_HEIGHT_MM - placement.y_mm - placement.height_mm)).0;
        let width = Pt::from(Mm(placement.width_mm)).0;
        let height = Pt::from(Mm(placement.height_mm)).0;

        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(height),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image.resource.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        page.xobjects.insert(image.resource.clone(), image.id);
        Ok(())
    }

    /// Serializes in memory first so a failed render leaves no partial file
    fn write_to(self, path: &Path) -> Result<()> {
        let bytes = self.into_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
