// Text measurement for the certificate layout.
//
// The renderer uses the PDF base-14 Helvetica faces, which viewers ship
// metrics for, so no font file is embedded. Widths below are the standard
// AFM advance widths (1000 units per em) for the printable ASCII range.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
}

pub trait TextMetrics {
    /// Width of `text` in layout units when set in `face` at `size` points.
    fn text_width(&self, text: &str, face: FontFace, size: f32) -> f32;
}

// Helvetica, chars 0x20..=0x7E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

// Helvetica-Bold, chars 0x20..=0x7E.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

// Fallback advance for characters outside the table (roughly a lowercase
// letter width in either face).
const FALLBACK_WIDTH: u16 = 556;

/// Metrics provider backed by the built-in Helvetica width tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMetrics;

impl StandardMetrics {
    fn advance(face: FontFace, ch: char) -> u16 {
        let table = match face {
            FontFace::Regular => &HELVETICA_WIDTHS,
            FontFace::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            table[(code - 0x20) as usize]
        } else {
            FALLBACK_WIDTH
        }
    }
}

impl TextMetrics for StandardMetrics {
    fn text_width(&self, text: &str, face: FontFace, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| Self::advance(face, c) as u32).sum();
        units as f32 / 1000.0 * size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_zero_width() {
        assert_eq!(StandardMetrics.text_width("", FontFace::Regular, 50.0), 0.0);
    }

    #[test]
    fn regular_widths_match_afm_values() {
        // 'H' = 722, 'i' = 222 in Helvetica
        let w = StandardMetrics.text_width("Hi", FontFace::Regular, 10.0);
        assert!((w - 9.44).abs() < 1e-4);
    }

    #[test]
    fn bold_face_is_wider_than_regular() {
        let regular = StandardMetrics.text_width("Jane Doe", FontFace::Regular, 30.0);
        let bold = StandardMetrics.text_width("Jane Doe", FontFace::Bold, 30.0);
        assert!(bold > regular);
    }

    #[test]
    fn non_ascii_uses_fallback_advance() {
        let w = StandardMetrics.text_width("é", FontFace::Regular, 10.0);
        assert!((w - 5.56).abs() < 1e-4);
    }
}
