use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::warn;
use printpdf::image_crate::codecs::jpeg::JpegDecoder;
use printpdf::{
    Actions, BuiltinFont, Color, ImageTransform, IndirectFontRef, Line, LinkAnnotation, Mm,
    PdfDocument, PdfLayerReference, Point, Rect, Rgb,
};

use super::layout::{Document, Element, FontStyle, Gray, PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::{RecipyaError, Result};

const LAYER: &str = "Layer 1";

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
        }
    }
}

fn pdf_err(err: impl std::fmt::Display) -> RecipyaError {
    RecipyaError::Pdf(err.to_string())
}

fn gray(level: Gray) -> Color {
    Color::Rgb(Rgb::new(level.0, level.0, level.0, None))
}

/// Render a laid-out document to PDF bytes.
pub fn render(document: &Document) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(&document.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);

    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        italic: doc.add_builtin_font(BuiltinFont::HelveticaOblique).map_err(pdf_err)?,
    };

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            doc.get_page(page_index).get_layer(layer_index)
        };
        for element in &page.elements {
            draw(&layer, &fonts, element)?;
        }
    }

    doc.save_to_bytes().map_err(pdf_err)
}

fn draw(layer: &PdfLayerReference, fonts: &Fonts, element: &Element) -> Result<()> {
    match element {
        Element::Text {
            x,
            y,
            size,
            style,
            color,
            content,
        } => {
            layer.set_fill_color(gray(*color));
            layer.use_text(content.as_str(), *size, Mm(*x), Mm(*y), fonts.get(*style));
        }
        Element::Border {
            x,
            y,
            width,
            height,
        } => {
            layer.set_outline_color(gray(Gray(0.0)));
            layer.set_outline_thickness(0.5);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(*x), Mm(*y)), false),
                    (Point::new(Mm(x + width), Mm(*y)), false),
                    (Point::new(Mm(x + width), Mm(y + height)), false),
                    (Point::new(Mm(*x), Mm(y + height)), false),
                ],
                is_closed: true,
            });
        }
        Element::Link {
            x,
            y,
            width,
            height,
            url,
        } => {
            layer.add_link_annotation(LinkAnnotation::new(
                Rect::new(Mm(*x), Mm(*y), Mm(x + width), Mm(y + height)),
                None,
                None,
                Actions::uri(url.clone()),
                None,
            ));
        }
        Element::Image {
            path,
            x,
            y,
            width,
            height,
        } => {
            // A broken cover image should not spoil the whole document
            if let Err(err) = draw_image(layer, path, *x, *y, *width, *height) {
                warn!("Skipping image {}: {}", path.display(), err);
            }
        }
    }
    Ok(())
}

fn draw_image(layer: &PdfLayerReference, path: &Path, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
    let file = File::open(path).map_err(|e| RecipyaError::io(format!("Failed to open {}", path.display()), e))?;
    let decoder = JpegDecoder::new(BufReader::new(file)).map_err(pdf_err)?;
    let image = printpdf::Image::try_from(decoder).map_err(pdf_err)?;

    // Pick the resolution that fits the image inside the box
    let px_width = image.image.width.0 as f32;
    let px_height = image.image.height.0 as f32;
    let dpi = (px_width * 25.4 / width).max(px_height * 25.4 / height).max(1.0);
    let drawn_width = px_width * 25.4 / dpi;
    let drawn_height = px_height * 25.4 / dpi;

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x + (width - drawn_width) / 2.0)),
            translate_y: Some(Mm(y + (height - drawn_height) / 2.0)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}
