// Certificate rendering: one landscape page, template image background,
// four centered text lines. Output is deterministic for identical inputs
// so re-renders can be compared byte-for-byte.

pub mod metrics;

pub use metrics::{FontFace, StandardMetrics, TextMetrics};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PAGE_WIDTH: f32 = 842.0;
pub const PAGE_HEIGHT: f32 = 595.0;

const NAME_PLACEHOLDER: &str = "Student Name";
const COURSE_PLACEHOLDER: &str = "Course Title";
const CAPTION: &str = "For successfully completing the course";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate template not found at {}", .0.display())]
    TemplateMissing(PathBuf),
    #[error("failed to read certificate template: {0}")]
    TemplateRead(#[from] std::io::Error),
    #[error("failed to decode certificate template: {0}")]
    TemplateDecode(#[from] image::ImageError),
    #[error("failed to assemble certificate document: {0}")]
    Document(#[from] lopdf::Error),
}

/// One positioned line of certificate text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub face: FontFace,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    pub color: (f32, f32, f32),
}

/// Computes the four text blocks, each centered horizontally on the page
/// and offset vertically from page center. Empty inputs fall back to
/// placeholder strings so the layout never collapses.
pub fn layout_blocks(
    student_name: &str,
    course_title: &str,
    date: &str,
    metrics: &dyn TextMetrics,
) -> Vec<TextBlock> {
    let name = if student_name.is_empty() {
        NAME_PLACEHOLDER
    } else {
        student_name
    };
    let course = if course_title.is_empty() {
        COURSE_PLACEHOLDER
    } else {
        course_title
    };
    let date_line = format!("Date: {}", date);
    let mid = PAGE_HEIGHT / 2.0;

    let lines: [(&str, FontFace, f32, f32, (f32, f32, f32)); 4] = [
        (name, FontFace::Bold, 50.0, mid + 20.0, (0.2, 0.2, 0.2)),
        (CAPTION, FontFace::Regular, 18.0, mid - 20.0, (0.4, 0.4, 0.4)),
        (course, FontFace::Bold, 30.0, mid - 60.0, (0.98, 0.8, 0.08)),
        (&date_line, FontFace::Regular, 14.0, mid - 100.0, (0.3, 0.3, 0.3)),
    ];

    lines
        .into_iter()
        .map(|(text, face, size, y, color)| {
            let width = metrics.text_width(text, face, size);
            TextBlock {
                text: text.to_string(),
                face,
                size,
                x: (PAGE_WIDTH - width) / 2.0,
                y,
                color,
            }
        })
        .collect()
}

/// Maps text to WinAnsi (CP1252) bytes for the string operands of Tj.
/// The font resources declare WinAnsiEncoding, so characters must be
/// re-encoded from UTF-8; unmappable characters degrade to '?', matching
/// the width fallback in metrics.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
        // The 0x80..0x9F block diverges from Latin-1.
        _ => match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => b'?',
        },
    }
}

#[derive(Clone)]
pub struct CertificateRenderer {
    template_path: PathBuf,
    metrics: StandardMetrics,
}

impl CertificateRenderer {
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            metrics: StandardMetrics,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Renders the certificate to PDF bytes. The template image is read on
    /// every call; a missing template is fatal to the render.
    pub fn render(
        &self,
        student_name: &str,
        course_title: &str,
        date: &str,
    ) -> Result<Vec<u8>, CertificateError> {
        if !self.template_path.exists() {
            return Err(CertificateError::TemplateMissing(self.template_path.clone()));
        }
        let template_bytes = std::fs::read(&self.template_path)?;
        let template = image::load_from_memory(&template_bytes)?.to_rgb8();
        let (img_width, img_height) = template.dimensions();

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        // Raw RGB image XObject; the template asset is small so the
        // uncompressed stream keeps the output deterministic.
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img_width as i64,
                "Height" => img_height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            template.into_raw(),
        ));

        let mut ops: Vec<Operation> = vec![
            Operation::new("q", vec![]),
            // Stretch the template to fill the page exactly.
            Operation::new(
                "cm",
                vec![
                    PAGE_WIDTH.into(),
                    0.into(),
                    0.into(),
                    PAGE_HEIGHT.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ];

        for block in layout_blocks(student_name, course_title, date, &self.metrics) {
            let font_name = match block.face {
                FontFace::Bold => "F1",
                FontFace::Regular => "F2",
            };
            let (r, g, b) = block.color;
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec![font_name.into(), block.size.into()]));
            ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
            ops.push(Operation::new("Td", vec![block.x.into(), block.y.into()]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&block.text), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => bold_id,
                    "F2" => regular_id,
                },
                "XObject" => dictionary! { "Im0" => image_id },
            },
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

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeMetrics;

    impl TextMetrics for FakeMetrics {
        fn text_width(&self, text: &str, _face: FontFace, size: f32) -> f32 {
            text.chars().count() as f32 * size * 0.5
        }
    }

    fn write_template(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("certificate-bg.png");
        let img = image::RgbImage::from_pixel(42, 30, image::Rgb([253, 250, 240]));
        img.save(&path).unwrap();
        path
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn every_block_is_horizontally_centered() {
        let blocks = layout_blocks("Jane Doe", "Intro to Faith", "March 1, 2026", &FakeMetrics);
        assert_eq!(blocks.len(), 4);
        for block in &blocks {
            let width = FakeMetrics.text_width(&block.text, block.face, block.size);
            assert_eq!(block.x, (PAGE_WIDTH - width) / 2.0, "block {:?}", block.text);
        }
    }

    #[test]
    fn blocks_sit_at_fixed_offsets_from_page_center() {
        let blocks = layout_blocks("Jane Doe", "Intro to Faith", "March 1, 2026", &FakeMetrics);
        let mid = PAGE_HEIGHT / 2.0;
        let offsets: Vec<f32> = blocks.iter().map(|b| b.y - mid).collect();
        assert_eq!(offsets, vec![20.0, -20.0, -60.0, -100.0]);
    }

    #[test]
    fn empty_inputs_fall_back_to_placeholders() {
        let blocks = layout_blocks("", "", "March 1, 2026", &FakeMetrics);
        assert_eq!(blocks[0].text, "Student Name");
        assert_eq!(blocks[2].text, "Course Title");
        assert_eq!(blocks[3].text, "Date: March 1, 2026");
    }

    #[test]
    fn render_is_deterministic_and_embeds_text() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CertificateRenderer::new(write_template(dir.path()));

        let first = renderer
            .render("Jane Doe", "Intro to Faith", "March 1, 2026")
            .unwrap();
        let second = renderer
            .render("Jane Doe", "Intro to Faith", "March 1, 2026")
            .unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with(b"%PDF"));
        assert!(contains(&first, b"Jane Doe"));
        assert!(contains(&first, b"Intro to Faith"));
        assert!(contains(&first, b"Date: March 1, 2026"));
    }

    #[test]
    fn win_ansi_maps_latin1_and_degrades_unmappable() {
        assert_eq!(encode_win_ansi("José"), b"Jos\xe9");
        assert_eq!(encode_win_ansi("A\u{2013}B"), b"A\x96B");
        assert_eq!(encode_win_ansi("\u{4FA1}"), b"?");
    }

    #[test]
    fn accented_names_are_win_ansi_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CertificateRenderer::new(write_template(dir.path()));
        let bytes = renderer.render("José", "Intro to Faith", "March 1, 2026").unwrap();
        // Single WinAnsi byte, not the UTF-8 pair.
        assert!(contains(&bytes, b"Jos\xe9"));
        assert!(!contains(&bytes, b"Jos\xc3\xa9"));
    }

    #[test]
    fn empty_name_renders_placeholder_text() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CertificateRenderer::new(write_template(dir.path()));
        let bytes = renderer.render("", "Intro to Faith", "March 1, 2026").unwrap();
        assert!(contains(&bytes, b"Student Name"));
    }

    #[test]
    fn missing_template_is_a_fatal_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CertificateRenderer::new(dir.path().join("missing.png"));
        match renderer.render("Jane Doe", "Intro to Faith", "March 1, 2026") {
            Err(CertificateError::TemplateMissing(path)) => {
                assert!(path.ends_with("missing.png"));
            }
            other => panic!("expected TemplateMissing, got {:?}", other.map(|b| b.len())),
        }
    }
}
