//! lopdf-backed [`ImageSource`]: list image XObjects and rebuild their pixels.
//!
//! pdfium renders pages well but hides object numbers, and object numbers
//! are what lets the scan recognise the same logo drawn on twenty pages.
//! lopdf gives us the raw XObject streams keyed by object id, so listing and
//! byte extraction happen here while pdfium keeps rasterisation and text.
//!
//! ## Reconstruction rules
//!
//! * DCT (JPEG) data in a gray or RGB colour space without a soft mask is
//!   written out untouched.
//! * Everything else is decoded to pixels and normalised to 8-bit RGB
//!   before PNG encoding: CMYK is converted, ICC-based spaces are read by
//!   their component count, gray is widened, and `/Indexed` samples are
//!   looked up in their palette. Separation, DeviceN and Lab are skipped.
//! * With an `/SMask` the base pixels are composited over white using the
//!   mask as alpha. A mask that cannot be decoded or has a different size
//!   falls back to the unmasked rules above.

use crate::error::{DigestError, ResourceError};
use crate::pipeline::extract::{ExtractedImage, ImageFormat, ImageResource, ImageSource};
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// An opened PDF exposing its embedded raster images.
pub struct PdfImageSource {
    doc: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
}

impl PdfImageSource {
    /// Load a PDF from disk, decrypting it with `password` (or the empty
    /// user password) when needed.
    pub fn open(path: &Path, password: Option<&str>) -> Result<Self, DigestError> {
        let mut doc = Document::load(path).map_err(|e| DigestError::CorruptPdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        if doc.is_encrypted() {
            doc.decrypt(password.unwrap_or("")).map_err(|_| {
                if password.is_some() {
                    DigestError::WrongPassword {
                        path: path.to_path_buf(),
                    }
                } else {
                    DigestError::PasswordRequired {
                        path: path.to_path_buf(),
                    }
                }
            })?;
        }

        let source = Self::from_document(doc);
        info!(
            "Opened {} for image extraction: {} pages",
            path.display(),
            source.pages.len()
        );
        Ok(source)
    }

    /// Wrap an already loaded document.
    pub fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    /// Full object id for an object number; generations are not always 0
    /// in incrementally updated files.
    fn object_id(&self, number: u32) -> Option<ObjectId> {
        self.doc
            .objects
            .range((number, 0)..=(number, u16::MAX))
            .next()
            .map(|(id, _)| *id)
    }

    fn image_stream(&self, number: u32) -> Result<&Stream, ResourceError> {
        self.object_id(number)
            .and_then(|id| self.doc.get_object(id).ok())
            .and_then(|obj| obj.as_stream().ok())
            .ok_or(ResourceError::NotAnImage {
                resource_id: number,
            })
    }

    fn composite(&self, resource: &ImageResource, mask_id: u32) -> Result<RgbImage, ResourceError> {
        let id = resource.resource_id;
        let base = decode_pixels(&self.doc, id, self.image_stream(id)?)?;
        let mask_err = |detail: String| ResourceError::MaskMismatch {
            resource_id: id,
            mask_id,
            detail,
        };
        let mask_stream = self.image_stream(mask_id).map_err(|e| mask_err(e.to_string()))?;
        let mask = decode_pixels(&self.doc, mask_id, mask_stream)
            .map_err(|e| mask_err(e.to_string()))?
            .to_luma8();
        composite_over_white(&base.to_rgb8(), &mask).map_err(mask_err)
    }

    fn extract_plain(&self, id: u32, stream: &Stream) -> Result<ExtractedImage, ResourceError> {
        let filters = stream_filters(&stream.dict);

        if filters == ["DCTDecode"] {
            if let Ok(Some(ColourSpace::Direct(components @ (1 | 3)))) =
                colour_space(&self.doc, &stream.dict)
            {
                debug!("Object {}: passing JPEG through", id);
                return Ok(ExtractedImage {
                    bytes: stream.content.clone(),
                    format: ImageFormat::Jpeg,
                    components,
                });
            }
        }

        let rgb = decode_pixels(&self.doc, id, stream)?.to_rgb8();
        encode_png(id, rgb)
    }
}

impl ImageSource for PdfImageSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_images(&self, page_index: usize) -> Result<Vec<ImageResource>, ResourceError> {
        let page = page_index + 1;
        let page_id = *self.pages.get(page_index).ok_or(ResourceError::PageListing {
            page,
            detail: "page out of range".into(),
        })?;

        let images = self
            .doc
            .get_page_images(page_id)
            .map_err(|e| ResourceError::PageListing {
                page,
                detail: e.to_string(),
            })?;

        let mut resources = Vec::with_capacity(images.len());
        for img in images {
            let (Ok(width), Ok(height)) = (u32::try_from(img.width), u32::try_from(img.height))
            else {
                warn!("Page {}: object {:?} has invalid dimensions", page, img.id);
                continue;
            };
            let soft_mask = self
                .doc
                .get_object(img.id)
                .and_then(Object::as_stream)
                .ok()
                .and_then(|s| s.dict.get(b"SMask").ok())
                .and_then(|m| match m {
                    Object::Reference(mask_id) => Some(mask_id.0),
                    _ => None,
                });
            resources.push(ImageResource {
                resource_id: img.id.0,
                soft_mask,
                width,
                height,
            });
        }
        Ok(resources)
    }

    fn extract(&self, resource: &ImageResource) -> Result<ExtractedImage, ResourceError> {
        let id = resource.resource_id;
        if let Some(mask_id) = resource.soft_mask {
            match self.composite(resource, mask_id) {
                Ok(rgb) => return encode_png(id, rgb),
                Err(e) => warn!("{}; falling back to the unmasked image", e),
            }
        }
        self.extract_plain(id, self.image_stream(id)?)
    }
}

// ── Stream decoding ──────────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|o| o.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

/// Filter names of a stream, in application order.
pub(crate) fn stream_filters(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| match f {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Pixel layout declared by an image's `/ColorSpace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColourSpace {
    /// 1 (gray), 3 (RGB) or 4 (CMYK) components per pixel.
    Direct(u8),
    /// One index per pixel into `palette`, whose entries have `base` components.
    Indexed { base: u8, palette: Vec<u8> },
}

/// Read `/ColorSpace`. `Ok(None)` when the key is absent; `Err` for spaces we
/// do not decode (Separation, DeviceN, Lab, Pattern, malformed arrays).
pub(crate) fn colour_space(doc: &Document, dict: &Dictionary) -> Result<Option<ColourSpace>, String> {
    let Ok(cs) = dict.get(b"ColorSpace") else {
        return Ok(None);
    };
    let cs = resolve(doc, cs);
    if let Object::Array(parts) = cs {
        if let Some(Object::Name(n)) = parts.first() {
            if n.as_slice() == b"Indexed" || n.as_slice() == b"I" {
                return indexed_space(doc, parts).map(Some);
            }
        }
    }
    direct_components(doc, cs).map(|n| Some(ColourSpace::Direct(n)))
}

fn direct_components(doc: &Document, cs: &Object) -> Result<u8, String> {
    let by_name = |name: &[u8]| match name {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(1),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(3),
        b"DeviceCMYK" | b"CMYK" => Ok(4),
        other => Err(format!("colour space {}", String::from_utf8_lossy(other))),
    };
    match cs {
        Object::Name(name) => by_name(name.as_slice()),
        Object::Array(parts) => match parts.first() {
            Some(Object::Name(n)) if n.as_slice() == b"ICCBased" => {
                let profile = parts
                    .get(1)
                    .and_then(|p| resolve(doc, p).as_stream().ok())
                    .ok_or("ICCBased without a profile stream")?;
                match dict_u32(&profile.dict, b"N") {
                    Some(n @ (1 | 3 | 4)) => Ok(n as u8),
                    other => Err(format!("ICC profile with N = {other:?}")),
                }
            }
            Some(Object::Name(n)) => by_name(n.as_slice()),
            _ => Err("malformed colour space array".into()),
        },
        _ => Err("malformed colour space".into()),
    }
}

/// `[/Indexed base hival lookup]`, the lookup being a string or a stream.
fn indexed_space(doc: &Document, parts: &[Object]) -> Result<ColourSpace, String> {
    let [_, base, hival, lookup] = parts else {
        return Err(format!("Indexed colour space with {} entries", parts.len()));
    };
    let base = direct_components(doc, resolve(doc, base))?;
    let hival = resolve(doc, hival)
        .as_i64()
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or("Indexed hival is not a non-negative integer")?;

    let mut palette = match resolve(doc, lookup) {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(stream) => match stream_filters(&stream.dict).as_slice() {
            [] => stream.content.clone(),
            [f] if f == "FlateDecode" || f == "Fl" => {
                let mut out = Vec::new();
                ZlibDecoder::new(stream.content.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|e| format!("palette FlateDecode: {e}"))?;
                out
            }
            other => return Err(format!("palette filters {other:?}")),
        },
        _ => return Err("Indexed lookup is neither a string nor a stream".into()),
    };

    let needed = (hival + 1) * usize::from(base);
    if palette.len() < needed {
        return Err(format!("palette has {} bytes, expected {}", palette.len(), needed));
    }
    palette.truncate(needed);
    Ok(ColourSpace::Indexed { base, palette })
}

fn inflate(id: u32, data: &[u8]) -> Result<Vec<u8>, ResourceError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ResourceError::DecodeFailed {
            resource_id: id,
            detail: format!("FlateDecode: {e}"),
        })?;
    Ok(out)
}

/// Decode an image XObject stream into pixels.
fn decode_pixels(doc: &Document, id: u32, stream: &Stream) -> Result<DynamicImage, ResourceError> {
    let dict = &stream.dict;
    let mut data = stream.content.clone();

    for filter in stream_filters(dict) {
        match filter.as_str() {
            "FlateDecode" | "Fl" => data = inflate(id, &data)?,
            "DCTDecode" | "DCT" => {
                return image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
                    .map_err(|e| ResourceError::DecodeFailed {
                        resource_id: id,
                        detail: format!("JPEG: {e}"),
                    });
            }
            other => {
                return Err(ResourceError::Unsupported {
                    resource_id: id,
                    detail: format!("filter {other}"),
                })
            }
        }
    }

    let (Some(width), Some(height)) = (dict_u32(dict, b"Width"), dict_u32(dict, b"Height")) else {
        return Err(ResourceError::DecodeFailed {
            resource_id: id,
            detail: "missing /Width or /Height".into(),
        });
    };
    let bpc = dict_u32(dict, b"BitsPerComponent").unwrap_or(8);
    let unsupported = |detail: String| ResourceError::Unsupported {
        resource_id: id,
        detail,
    };

    let image = match colour_space(doc, dict).map_err(unsupported)? {
        Some(ColourSpace::Direct(n)) => samples_to_image(width, height, Some(n), bpc, data),
        Some(ColourSpace::Indexed { base, palette }) => {
            expand_palette(width, height, bpc, &data, base, &palette)
        }
        None => {
            let guessed = guess_components(width, height, data.len());
            samples_to_image(width, height, guessed, bpc, data)
        }
    };
    image.map_err(unsupported)
}

/// Infer the component count from the sample buffer length.
fn guess_components(width: u32, height: u32, len: usize) -> Option<u8> {
    let pixels = width as usize * height as usize;
    if pixels == 0 {
        None
    } else if len >= pixels * 3 {
        Some(3)
    } else if len >= pixels {
        Some(1)
    } else {
        None
    }
}

/// Interpret raw 8-bit samples as gray, RGB or CMYK pixels.
pub(crate) fn samples_to_image(
    width: u32,
    height: u32,
    components: Option<u8>,
    bits_per_component: u32,
    mut data: Vec<u8>,
) -> Result<DynamicImage, String> {
    if bits_per_component != 8 {
        return Err(format!("{bits_per_component} bits per component"));
    }
    let components = components.ok_or("unknown colour space")?;
    let expected = width as usize * height as usize * components as usize;
    if data.len() < expected {
        return Err(format!(
            "{} sample bytes, expected {}",
            data.len(),
            expected
        ));
    }
    data.truncate(expected);

    match components {
        1 => GrayImage::from_raw(width, height, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "gray buffer mismatch".to_string()),
        3 => RgbImage::from_raw(width, height, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "RGB buffer mismatch".to_string()),
        4 => {
            let rgb: Vec<u8> = data.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "CMYK buffer mismatch".to_string())
        }
        n => Err(format!("{n} colour components")),
    }
}

/// Unpack 1, 2, 4 or 8-bit palette indices; rows start on a byte boundary.
fn unpack_indices(width: u32, height: u32, bits: u32, data: &[u8]) -> Result<Vec<u8>, String> {
    if !matches!(bits, 1 | 2 | 4 | 8) {
        return Err(format!("{bits} bits per index"));
    }
    let (width, height, bits) = (width as usize, height as usize, bits as usize);
    if width == 0 || height == 0 {
        return Err("empty image".into());
    }
    let row_bytes = (width * bits).div_ceil(8);
    if data.len() < row_bytes * height {
        return Err(format!(
            "{} index bytes, expected {}",
            data.len(),
            row_bytes * height
        ));
    }

    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    let mut indices = Vec::with_capacity(width * height);
    for row in data.chunks_exact(row_bytes).take(height) {
        for x in 0..width {
            let shift = 8 - bits * (x % per_byte + 1);
            indices.push((row[x / per_byte] >> shift) & mask);
        }
    }
    Ok(indices)
}

/// Look every index up in `palette` and widen the entries to RGB.
/// Indices past the last entry take the last entry.
pub(crate) fn expand_palette(
    width: u32,
    height: u32,
    bits_per_component: u32,
    data: &[u8],
    base: u8,
    palette: &[u8],
) -> Result<DynamicImage, String> {
    let base = usize::from(base);
    if !matches!(base, 1 | 3 | 4) || palette.len() < base {
        return Err(format!("{base}-component palette of {} bytes", palette.len()));
    }
    let last = palette.len() / base - 1;

    let indices = unpack_indices(width, height, bits_per_component, data)?;
    let mut rgb = Vec::with_capacity(indices.len() * 3);
    for index in indices {
        let i = usize::from(index).min(last);
        let entry = &palette[i * base..(i + 1) * base];
        let px = match base {
            1 => [entry[0]; 3],
            3 => [entry[0], entry[1], entry[2]],
            _ => cmyk_to_rgb(entry),
        };
        rgb.extend_from_slice(&px);
    }
    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| "palette buffer mismatch".to_string())
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - u16::from(px[3]);
    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}

/// Flatten `base` onto a white background using `mask` as alpha.
pub(crate) fn composite_over_white(base: &RgbImage, mask: &GrayImage) -> Result<RgbImage, String> {
    if base.dimensions() != mask.dimensions() {
        return Err(format!(
            "mask is {}x{}, image is {}x{}",
            mask.width(),
            mask.height(),
            base.width(),
            base.height()
        ));
    }
    let mut out = base.clone();
    for (px, alpha) in out.pixels_mut().zip(mask.pixels()) {
        let a = u16::from(alpha.0[0]);
        for c in px.0.iter_mut() {
            *c = ((u16::from(*c) * a + 255 * (255 - a)) / 255) as u8;
        }
    }
    Ok(out)
}

fn encode_png(id: u32, rgb: RgbImage) -> Result<ExtractedImage, ResourceError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ResourceError::DecodeFailed {
            resource_id: id,
            detail: format!("PNG encode: {e}"),
        })?;
    Ok(ExtractedImage {
        bytes: buf,
        format: ImageFormat::Png,
        components: 3,
    })
}
