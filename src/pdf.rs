//! Document collaborators: merging page PDFs and embedding page images.
//!
//! Both operations are CPU-bound and synchronous in `lopdf`, so the async
//! entry points move the work onto the blocking pool.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegDecoder;
use image::{ImageDecoder, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument};

use crate::error::PdfError;

/// Concatenates per-page documents into one file.
pub trait DocumentMerger {
    /// Merge `inputs` in order into a new document at `output`.
    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PdfError>;
}

/// [`DocumentMerger`] backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfMerger;

impl DocumentMerger for PdfMerger {
    #[instrument(level = "info", skip_all, fields(inputs = inputs.len(), output = %output.display()))]
    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), PdfError> {
        let inputs = inputs.to_vec();
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || merge_files(&inputs, &output)).await?
    }
}

/// Merge the PDF files at `inputs`, in order, into `output`.
pub fn merge_files(inputs: &[PathBuf], output: &Path) -> Result<(), PdfError> {
    if inputs.is_empty() {
        return Err(PdfError::NoInputs);
    }
    let documents = inputs
        .iter()
        .map(|path| {
            Document::load(path).map_err(|source| PdfError::Load {
                path: path.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = merge_documents(documents)?;
    merged.save(output).map_err(|source| PdfError::Save {
        path: output.to_path_buf(),
        source,
    })?;
    info!(pages = merged.get_pages().len(), "Wrote merged document");
    Ok(())
}

/// Page attributes a page may take from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Upper bound on page tree depth, guards against `Parent` cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Copy of `page` carrying every inheritable attribute it would otherwise
/// take from its own page tree, which does not survive the merge.
fn with_inherited_attributes(doc: &Document, page: &Dictionary) -> Dictionary {
    let mut page = page.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    page
}

/// Merge already loaded documents, keeping page order: all pages of the
/// first document, then all pages of the second, and so on.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, PdfError> {
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects = Vec::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        for (_, page_id) in doc.get_pages() {
            if let Ok(page) = doc.get_dictionary(page_id) {
                let page = with_inherited_attributes(&doc, page);
                pages.push((page_id, Object::Dictionary(page)));
            }
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut page_tree: Option<(ObjectId, Object)> = None;

    for (object_id, object) in objects {
        let kind = object.type_name().unwrap_or_default().as_bytes().to_vec();
        match kind.as_slice() {
            b"Catalog" => {
                let id = catalog.as_ref().map_or(object_id, |(id, _)| *id);
                catalog = Some((id, object));
            }
            b"Pages" => {
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    let id = match &page_tree {
                        Some((id, existing)) => {
                            if let Ok(existing) = existing.as_dict() {
                                dict.extend(existing);
                            }
                            *id
                        }
                        None => object_id,
                    };
                    page_tree = Some((id, Object::Dictionary(dict)));
                }
            }
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (catalog_id, catalog_object) = catalog.ok_or(PdfError::MissingPageTree)?;
    let (tree_id, tree_object) = page_tree.ok_or(PdfError::MissingPageTree)?;

    for (page_id, page) in &pages {
        if let Ok(dict) = page.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", tree_id);
            merged.objects.insert(*page_id, Object::Dictionary(dict));
        }
    }

    let mut tree = tree_object.as_dict().map_err(PdfError::Encode)?.clone();
    for key in INHERITABLE_KEYS {
        tree.remove(key);
    }
    tree.set("Count", pages.len() as i64);
    tree.set(
        "Kids",
        pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged.objects.insert(tree_id, Object::Dictionary(tree));

    let mut catalog_dict = catalog_object.as_dict().map_err(PdfError::Encode)?.clone();
    catalog_dict.set("Pages", tree_id);
    catalog_dict.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog_dict));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.adjust_zero_pages();
    merged.compress();
    debug!(pages = pages.len(), "Merged documents");
    Ok(merged)
}

/// Convert the raster image at `image_path` into a one-page PDF at `pdf_path`.
#[instrument(level = "debug", fields(image = %image_path.display(), pdf = %pdf_path.display()))]
pub async fn embed_image(image_path: &Path, pdf_path: &Path) -> Result<(), PdfError> {
    let image_path = image_path.to_path_buf();
    let pdf_path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), PdfError> {
        let bytes = std::fs::read(&image_path).map_err(|source| PdfError::Io {
            path: image_path.clone(),
            source,
        })?;
        let image = page_image(&bytes).map_err(|source| PdfError::Image {
            path: image_path.clone(),
            source,
        })?;
        let mut doc = image_document(image)?;
        doc.save(&pdf_path).map_err(|source| PdfError::Save {
            path: pdf_path.clone(),
            source,
        })?;
        Ok(())
    })
    .await?
}

/// A single image XObject ready to be placed on a page.
struct PageImage {
    width: u32,
    height: u32,
    stream: Stream,
}

fn page_image(bytes: &[u8]) -> Result<PageImage, image::ImageError> {
    let passthrough = match image::guess_format(bytes)? {
        ImageFormat::Jpeg => jpeg_color_space(bytes),
        _ => None,
    };
    // CMYK and other component layouts are re-encoded as RGB below.
    if let Some(color_space) = passthrough {
        let decoder = JpegDecoder::new(Cursor::new(bytes))?;
        let (width, height) = decoder.dimensions();
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        return Ok(PageImage {
            width,
            height,
            stream: Stream::new(dict, bytes.to_vec()),
        });
    }

    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    let mut stream = Stream::new(dict, rgb.into_raw());
    // Leaves the stream uncompressed if deflate doesn't help.
    let _ = stream.compress();
    Ok(PageImage {
        width,
        height,
        stream,
    })
}

/// PDF colour space for a JPEG whose DCT stream can be embedded as is, read
/// from the component count of its frame header. `None` for anything other
/// than one (gray) or three (YCbCr/RGB) components.
fn jpeg_color_space(bytes: &[u8]) -> Option<&'static str> {
    match jpeg_components(bytes)? {
        1 => Some("DeviceGray"),
        3 => Some("DeviceRGB"),
        _ => None,
    }
}

/// Number of components declared by the first SOF segment.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.get(..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut pos = 2;
    loop {
        while *bytes.get(pos)? != 0xFF {
            pos += 1;
        }
        while *bytes.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos)?;
        pos += 1;
        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
        // SOF0..SOF15 except DHT, JPG and DAC.
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return bytes.get(pos + 7).copied();
        }
        pos += len;
    }
}

/// Build a one-page document whose page is exactly the size of the image.
fn image_document(image: PageImage) -> Result<Document, PdfError> {
    let (w, h) = (image.width as i64, image.height as i64);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(image.stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(PdfError::Encode)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}
