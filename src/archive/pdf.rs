//! PDF assembly: one page per image, sized to the image's pixel dimensions.
//!
//! Rasters are embedded as DCTDecode (JPEG) image XObjects drawn to fill
//! their page. Placeholder pages additionally carry the missing-page message
//! as real text using the built-in Helvetica base font.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ArchiveError;

/// One assembled PDF page: JPEG bytes plus pixel dimensions and, for
/// placeholder pages, the message to overlay as text.
pub struct PdfPage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub message: Option<String>,
}

/// Assemble an ordered page list into a complete PDF document.
pub fn assemble_pdf(pages: &[PdfPage]) -> Result<Vec<u8>, ArchiveError> {
    let assembly_err = |e: lopdf::Error| ArchiveError::FatalBuild {
        message: format!("PDF assembly failed: {e}"),
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg.clone(),
        ));

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    (page.width as i64).into(),
                    0.into(),
                    0.into(),
                    (page.height as i64).into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ];
        if let Some(ref message) = page.message {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 18.into()]),
                Operation::new("Td", vec![36.into(), 36.into()]),
                Operation::new("Tj", vec![Object::string_literal(message.as_str())]),
                Operation::new("ET", vec![]),
            ]);
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(assembly_err)?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (page.width as i64).into(), (page.height as i64).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| ArchiveError::FatalBuild {
        message: format!("PDF write failed: {e}"),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn jpeg_page(width: u32, height: u32, message: Option<&str>) -> PdfPage {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 180, 160]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 85)
            .encode_image(&img)
            .unwrap();
        PdfPage {
            jpeg,
            width,
            height,
            message: message.map(String::from),
        }
    }

    #[test]
    fn test_assemble_produces_loadable_pdf() {
        let pages = vec![jpeg_page(100, 150, None), jpeg_page(80, 120, None)];
        let bytes = assemble_pdf(&pages).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_pages_sized_to_image_dimensions() {
        let pages = vec![jpeg_page(321, 457, None)];
        let bytes = assemble_pdf(&pages).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 321);
        assert_eq!(media_box[3].as_i64().unwrap(), 457);
    }

    #[test]
    fn test_placeholder_page_carries_message_text() {
        let pages = vec![jpeg_page(800, 200, Some("Page 3 could not be found"))];
        let bytes = assemble_pdf(&pages).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("Page 3 could not be found"), "got: {text}");
    }

    #[test]
    fn test_empty_archive_still_assembles() {
        let bytes = assemble_pdf(&[]).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 0);
    }
}
