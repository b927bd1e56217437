// src/pdf/testing.rs
//! In-memory PDF fixtures for unit tests.
//!
//! Pages use the core Helvetica font at 12pt with no `/Widths`, so glyphs
//! advance by the built-in metrics. Resources and MediaBox live on the page
//! tree root so that every fixture also exercises attribute inheritance.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub(crate) enum LinkTarget {
    /// `/Dest [page /Fit]`, 0-based page.
    Dest(usize),
    /// `/A << /S /GoTo /D [page /Fit] >>`, 0-based page.
    GoTo(usize),
    /// Named destination registered in the catalog `/Dests`.
    Named(String, usize),
    Uri(String),
}

pub(crate) struct FixtureLink {
    pub rect: [i64; 4],
    pub target: LinkTarget,
}

#[derive(Default)]
pub(crate) struct FixturePage {
    pub lines: Vec<(i64, i64, String)>,
    pub links: Vec<FixtureLink>,
}

impl FixturePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: &str) -> Self {
        Self::new().line(72, 720, text)
    }

    pub fn line(mut self, x: i64, y: i64, text: &str) -> Self {
        self.lines.push((x, y, text.to_string()));
        self
    }

    pub fn link(mut self, rect: [i64; 4], target: LinkTarget) -> Self {
        self.links.push(FixtureLink { rect, target });
        self
    }

    /// A TOC row: the label at baseline `y` with a link box covering it.
    pub fn toc_line(self, y: i64, label: &str, target: usize) -> Self {
        self.line(72, y, label)
            .link([70, y - 3, 560, y + 12], LinkTarget::Dest(target))
    }
}

fn fit_dest(page_id: ObjectId) -> Object {
    Object::Array(vec![
        Object::Reference(page_id),
        Object::Name(b"Fit".to_vec()),
    ])
}

fn link_annotation(
    link: &FixtureLink,
    page_ids: &[ObjectId],
    named: &mut Vec<(String, usize)>,
) -> Dictionary {
    let mut annot = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => link.rect.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
    };
    match &link.target {
        LinkTarget::Dest(page) => {
            annot.set("Dest", fit_dest(page_ids[*page]));
        }
        LinkTarget::GoTo(page) => {
            annot.set(
                "A",
                dictionary! {
                    "S" => "GoTo",
                    "D" => fit_dest(page_ids[*page]),
                },
            );
        }
        LinkTarget::Named(name, page) => {
            named.push((name.clone(), *page));
            annot.set(
                "Dest",
                Object::String(name.as_bytes().to_vec(), StringFormat::Literal),
            );
        }
        LinkTarget::Uri(uri) => {
            annot.set(
                "A",
                dictionary! {
                    "S" => "URI",
                    "URI" => Object::String(uri.as_bytes().to_vec(), StringFormat::Literal),
                },
            );
        }
    }
    annot
}

pub(crate) fn build_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let page_ids: Vec<ObjectId> = pages.iter().map(|_| doc.new_object_id()).collect();
    let mut named = Vec::new();

    for (page, page_id) in pages.iter().zip(&page_ids) {
        let mut operations = Vec::new();
        for (x, y, text) in &page.lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Integer(*x), Object::Integer(*y)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(
                    text.as_bytes().to_vec(),
                    StringFormat::Literal,
                )],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("fixture content encodes"),
        ));

        let mut annots = Vec::new();
        for link in &page.links {
            let annot = link_annotation(link, &page_ids, &mut named);
            annots.push(Object::Reference(doc.add_object(annot)));
        }

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !annots.is_empty() {
            page_dict.set("Annots", annots);
        }
        doc.objects.insert(*page_id, Object::Dictionary(page_dict));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => pages.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if !named.is_empty() {
        let mut dests = Dictionary::new();
        for (name, page) in named {
            dests.set(name.into_bytes(), fit_dest(page_ids[page]));
        }
        catalog.set("Dests", dests);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture PDF saves");
    buffer
}

/// `n` pages whose only text is `Page <k>` (1-based).
pub(crate) fn numbered_pdf(n: usize) -> Vec<u8> {
    let pages: Vec<FixturePage> = (1..=n)
        .map(|k| FixturePage::text(&format!("Page {}", k)))
        .collect();
    build_pdf(&pages)
}

/// Rendered text of every page, in order.
pub(crate) fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = crate::pdf::PdfDocument::from_bytes(bytes).expect("fixture loads");
    (0..doc.page_count())
        .map(|i| doc.page_text(i).expect("page text").text())
        .collect()
}

/// One page showing `content` verbatim, with `font` bound to `/F1`.
pub(crate) fn single_page_pdf(font: Dictionary, content: &[u8]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture PDF saves");
    buffer
}
