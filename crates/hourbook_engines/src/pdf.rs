#![forbid(unsafe_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::render::{layout_lines, InvoiceDocument, RenderError, Renderer};

// US Letter in points.
const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 54;
const FONT_SIZE: i64 = 9;
const LEADING: i64 = 12;

/// Courier-only PDF of the shared fixed-width layout.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    lines_per_page: usize,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            lines_per_page: ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize,
        }
    }
}

impl PdfRenderer {
    pub fn with_lines_per_page(lines_per_page: usize) -> Self {
        Self {
            lines_per_page: lines_per_page.max(1),
        }
    }

    fn page_content(&self, lines: &[String], page_no: usize, pages: usize) -> Content {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE)],
            ),
            Operation::new("TL", vec![Object::Integer(LEADING)]),
            Operation::new(
                "Td",
                vec![
                    Object::Integer(MARGIN),
                    Object::Integer(PAGE_HEIGHT - MARGIN),
                ],
            ),
        ];
        for line in lines {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(pdf_safe(line))],
            ));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        if pages > 1 {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE)],
                ),
                Operation::new(
                    "Td",
                    vec![
                        Object::Integer(PAGE_WIDTH - MARGIN - 90),
                        Object::Integer(MARGIN / 2),
                    ],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!(
                        "Page {} of {}",
                        page_no + 1,
                        pages
                    ))],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        Content { operations }
    }
}

impl Renderer for PdfRenderer {
    fn render(&self, doc: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let lines = layout_lines(doc);
        let chunks: Vec<&[String]> = lines.chunks(self.lines_per_page).collect();
        let pages = chunks.len().max(1);

        let mut pdf = Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages);
        for (page_no, chunk) in chunks.iter().enumerate() {
            let content = self.page_content(chunk, page_no, pages);
            let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id: ObjectId = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages as i64),
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(PAGE_WIDTH),
                    Object::Integer(PAGE_HEIGHT),
                ],
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = pdf.add_object(dictionary! {
            "Title" => Object::string_literal(format!("Invoice {}", doc.invoice_id)),
        });
        pdf.trailer.set("Root", catalog_id);
        pdf.trailer.set("Info", info_id);
        pdf.compress();

        let mut out = Vec::new();
        pdf.save_to(&mut out)?;
        Ok(out)
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }
}

/// Courier in WinAnsi covers printable ASCII; anything else becomes `?`.
fn pdf_safe(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}
