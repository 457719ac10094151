//! PDF text layer, page count and embedded image extraction

use crate::buffer::{self, PixelBuffer};
use crate::error::OcrError;
use image::ImageFormat;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Text layer of the whole document, pages in order
pub fn extract_text(data: &[u8]) -> Result<String, OcrError> {
    pdf_extract::extract_text_from_mem(data)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to parse PDF: {}", e)))
}

pub fn load(data: &[u8]) -> Result<Document, OcrError> {
    Document::load_mem(data)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to load PDF: {}", e)))
}

pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Form XObjects nested deeper than this are not searched for images
const MAX_FORM_DEPTH: usize = 8;

/// Page tree levels walked looking for inherited resources
const MAX_TREE_DEPTH: usize = 32;

/// Encoded images drawn by each page, in page order.
///
/// Only image XObjects named in a page's resources (or in forms it draws)
/// are returned, so soft masks and orphaned objects are left out. JPEG
/// streams are returned as stored; raw samples are re-encoded as PNG.
/// Images that cannot be read are skipped with a warning.
pub fn extract_images(doc: &Document) -> Vec<Vec<u8>> {
    let mut images = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        let mut image_ids = Vec::new();
        if let Some(resources) = page_resources(doc, page_id) {
            collect_image_ids(doc, resources, 0, &mut image_ids);
        }

        for object_id in image_ids {
            let Ok(stream) = doc.get_object(object_id).and_then(Object::as_stream) else {
                continue;
            };
            match extract_image(doc, stream) {
                Ok(bytes) => images.push(bytes),
                Err(e) => {
                    tracing::warn!(
                        "Skipping image {:?} on page {}: {}",
                        object_id,
                        page_number,
                        e
                    );
                }
            }
        }
    }

    images
}

/// Resources of a page, inherited from the page tree when the page has none
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources)?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn collect_image_ids(
    doc: &Document,
    resources: &Dictionary,
    depth: usize,
    image_ids: &mut Vec<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Ok(object_id) = value.as_reference() else {
            continue;
        };
        let Ok(stream) = doc.get_object(object_id).and_then(Object::as_stream) else {
            continue;
        };
        let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();
        match subtype {
            Some(b"Image") => {
                if !image_ids.contains(&object_id) {
                    image_ids.push(object_id);
                }
            }
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                if let Some(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|object| resolve(doc, object))
                    .and_then(|object| object.as_dict().ok())
                {
                    collect_image_ids(doc, form_resources, depth + 1, image_ids);
                }
            }
            _ => {}
        }
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn extract_image(doc: &Document, stream: &Stream) -> Result<Vec<u8>, OcrError> {
    let filters = filter_names(stream);
    if filters.iter().any(|f| f == "DCTDecode") {
        if filters.len() != 1 {
            return Err(OcrError::UnsupportedFormat(format!(
                "Filter chain {}",
                filters.join("+")
            )));
        }
        // Validate through the codec so unreadable images are skipped here
        buffer::decode(&stream.content)?;
        return Ok(stream.content.clone());
    }

    let pixels = decode_raw_samples(doc, stream)?;
    buffer::encode(&pixels, ImageFormat::Png)
}

fn decode_raw_samples(doc: &Document, stream: &Stream) -> Result<PixelBuffer, OcrError> {
    let width = dict_u32(stream, b"Width")
        .ok_or_else(|| OcrError::ProcessingError("Missing image width".to_string()))?;
    let height = dict_u32(stream, b"Height")
        .ok_or_else(|| OcrError::ProcessingError("Missing image height".to_string()))?;
    let bits_per_component = dict_u32(stream, b"BitsPerComponent").unwrap_or(8);

    let data = if filter_names(stream).is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to decompress image: {}", e)))?
    };

    let color_space = color_space(doc, stream);
    tracing::debug!(
        "PDF image: {}x{}, {} bits, color_space={}, data_len={}",
        width,
        height,
        bits_per_component,
        color_space,
        data.len()
    );

    if bits_per_component != 8 {
        return Err(OcrError::UnsupportedFormat(format!(
            "{}-bit {} image",
            bits_per_component, color_space
        )));
    }

    let area = width as usize * height as usize;
    let components = match color_space.as_str() {
        "DeviceGray" | "CalGray" => 1,
        "DeviceRGB" | "CalRGB" => 3,
        "DeviceCMYK" => 4,
        "ICCBased" => match icc_components(doc, stream) {
            n @ (1 | 3 | 4) => n,
            n => {
                return Err(OcrError::UnsupportedFormat(format!(
                    "ICC profile with {} components",
                    n
                )))
            }
        },
        other => {
            return Err(OcrError::UnsupportedFormat(format!(
                "Color space {}",
                other
            )))
        }
    };
    let expected = area * components;
    if data.len() < expected {
        return Err(OcrError::ProcessingError(format!(
            "Image data too short: {} bytes, expected {}",
            data.len(),
            expected
        )));
    }

    let samples = &data[..expected];
    match components {
        4 => PixelBuffer::new(width, height, 3, cmyk_to_rgb(samples)),
        n => PixelBuffer::new(width, height, n as u8, samples.to_vec()),
    }
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 1.0 - px[3] as f32 / 255.0;
            let channel = |v: u8| ((1.0 - v as f32 / 255.0) * k * 255.0) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

fn dict_u32(stream: &Stream, key: &[u8]) -> Option<u32> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

fn filter_names(stream: &Stream) -> Vec<String> {
    let Ok(filter) = stream.dict.get(b"Filter") else {
        return Vec::new();
    };
    match filter {
        Object::Name(name) => vec![String::from_utf8_lossy(name).to_string()],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| item.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Color space name, resolving indirect references and `[/ICCBased ref]` arrays
fn color_space(doc: &Document, stream: &Stream) -> String {
    let name = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| match object {
            Object::Array(items) => items.first().and_then(|first| first.as_name().ok()),
            other => other.as_name().ok(),
        });
    name.map(|n| String::from_utf8_lossy(n).to_string())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}

/// Component count (`/N`) of an ICC profile stream, RGB if absent
fn icc_components(doc: &Document, stream: &Stream) -> usize {
    stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_array().ok())
        .and_then(|items| items.get(1))
        .and_then(|profile| resolve(doc, profile))
        .and_then(|profile| profile.as_stream().ok())
        .and_then(|profile| dict_u32(profile, b"N"))
        .map_or(3, |n| n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// PDF whose pages draw the given object ids as image XObjects
    fn pdf_from(mut doc: Document, pages: Vec<Vec<ObjectId>>) -> Vec<u8> {
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for images in &pages {
            let mut xobjects = Dictionary::new();
            for (i, id) in images.iter().enumerate() {
                xobjects.set(format!("Im{}", i), *id);
            }
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Resources" => dictionary! { "XObject" => xobjects },
            });
            kids.push(Object::from(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// One-page PDF whose page draws the given image XObjects
    fn pdf_with_images(images: Vec<Stream>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let ids = images.into_iter().map(|image| doc.add_object(image)).collect();
        pdf_from(doc, vec![ids])
    }

    fn lumas(doc: &Document) -> Vec<u8> {
        extract_images(doc)
            .iter()
            .map(|bytes| buffer::decode(bytes).unwrap().luma(0, 0))
            .collect()
    }

    fn image_stream(width: i64, height: i64, color_space: &str, data: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
            },
            data,
        )
    }

    #[test]
    fn test_gray_image_is_reencoded_as_png() {
        let bytes = pdf_with_images(vec![image_stream(4, 3, "DeviceGray", vec![128; 12])]);
        let doc = load(&bytes).unwrap();

        let images = extract_images(&doc);

        assert_eq!(page_count(&doc), 1);
        assert_eq!(images.len(), 1);
        let decoded = buffer::decode(&images[0]).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.luma(2, 1), 128);
    }

    #[test]
    fn test_cmyk_image_is_converted() {
        // Pure black key channel
        let bytes = pdf_with_images(vec![image_stream(2, 2, "DeviceCMYK", [0, 0, 0, 255].repeat(4))]);
        let doc = load(&bytes).unwrap();

        let images = extract_images(&doc);

        let decoded = buffer::decode(&images[0]).unwrap();
        assert_eq!(decoded.channels(), 3);
        assert!(decoded.pixels().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_jpeg_stream_is_passed_through() {
        let jpeg = buffer::encode(&PixelBuffer::filled(8, 8, 90), ImageFormat::Jpeg).unwrap();
        let mut stream = image_stream(8, 8, "DeviceGray", jpeg.clone());
        stream.dict.set("Filter", "DCTDecode");
        let bytes = pdf_with_images(vec![stream]);
        let doc = load(&bytes).unwrap();

        assert_eq!(extract_images(&doc), vec![jpeg]);
    }

    #[test]
    fn test_truncated_image_is_skipped() {
        let bytes = pdf_with_images(vec![
            image_stream(10, 10, "DeviceRGB", vec![0; 20]),
            image_stream(2, 2, "DeviceGray", vec![255; 4]),
        ]);
        let doc = load(&bytes).unwrap();

        assert_eq!(extract_images(&doc).len(), 1);
    }

    #[test]
    fn test_images_follow_page_order_not_object_order() {
        let mut doc = Document::with_version("1.5");
        let second_page_image = doc.add_object(image_stream(2, 2, "DeviceGray", vec![20; 4]));
        let first_page_image = doc.add_object(image_stream(2, 2, "DeviceGray", vec![10; 4]));
        let bytes = pdf_from(doc, vec![vec![first_page_image], vec![second_page_image]]);
        let doc = load(&bytes).unwrap();

        assert_eq!(page_count(&doc), 2);
        assert_eq!(lumas(&doc), vec![10, 20]);
    }

    #[test]
    fn test_masks_and_orphaned_images_are_ignored() {
        let mut doc = Document::with_version("1.5");
        doc.add_object(image_stream(2, 2, "DeviceGray", vec![50; 4]));
        let mask = doc.add_object(image_stream(2, 2, "DeviceGray", vec![255; 4]));
        let mut drawn = image_stream(2, 2, "DeviceGray", vec![30; 4]);
        drawn.dict.set("SMask", mask);
        let drawn = doc.add_object(drawn);
        let bytes = pdf_from(doc, vec![vec![drawn, drawn]]);
        let doc = load(&bytes).unwrap();

        assert_eq!(lumas(&doc), vec![30]);
    }

    #[test]
    fn test_icc_gray_image_uses_profile_components() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Stream::new(dictionary! { "N" => 1 }, Vec::new()));
        let mut image = image_stream(4, 3, "DeviceGray", vec![77; 12]);
        image.dict.set(
            "ColorSpace",
            vec![Object::Name(b"ICCBased".to_vec()), profile.into()],
        );
        let image = doc.add_object(image);
        let bytes = pdf_from(doc, vec![vec![image]]);
        let doc = load(&bytes).unwrap();

        let images = extract_images(&doc);

        assert_eq!(images.len(), 1);
        let decoded = buffer::decode(&images[0]).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.luma(3, 2), 77);
    }

    #[test]
    fn test_garbage_is_not_a_pdf() {
        assert!(matches!(load(b"%PDF-1.4 not really"), Err(OcrError::ProcessingError(_))));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 255, 0, 0, 0]), vec![255, 255, 255, 0, 255, 255]);
    }
}
