// Review report PDF generation
// Uses genpdf - requires Liberation or similar fonts in standard paths
use genpdf::style::{Color, Style};
use genpdf::{elements, Element};
use std::path::{Path, PathBuf};

use crate::models::ReviewJob;
use crate::report::{ReportError, ReportView};

const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/System/Library/Fonts/Supplemental",
    "/Library/Fonts",
];

const FONT_NAMES: &[&str] = &["LiberationSans", "DejaVuSans", "Arial"];

/// Layout of a report page flow, independent of fonts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfBlock {
    Title(String),
    Byline(String),
    Text(String),
    Spacer,
    PageBreak,
    Heading(String),
    Link { label: String, uri: String },
}

pub fn layout(view: &ReportView) -> Vec<PdfBlock> {
    let mut blocks = vec![
        PdfBlock::Title(view.title.clone()),
        PdfBlock::Byline(view.byline.clone()),
        PdfBlock::Spacer,
    ];

    for line in view.report.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            blocks.push(PdfBlock::Spacer);
        } else {
            blocks.push(PdfBlock::Text(line.replace('\t', "    ")));
        }
    }

    if !view.sources.is_empty() {
        blocks.push(PdfBlock::PageBreak);
        blocks.push(PdfBlock::Heading("Sources:".to_string()));
        blocks.extend(view.sources.iter().map(|s| PdfBlock::Link {
            label: s.label.clone(),
            uri: s.uri.clone(),
        }));
    }

    blocks
}

fn load_fonts(
    font_dir: Option<&Path>,
) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, ReportError> {
    let candidates: Vec<PathBuf> = font_dir
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_PATHS.iter().map(PathBuf::from))
        .collect();

    candidates
        .iter()
        .filter(|p| p.exists())
        .find_map(|path| {
            FONT_NAMES
                .iter()
                .find_map(|name| genpdf::fonts::from_files(path, name, None).ok())
        })
        .ok_or_else(|| {
            ReportError::Pdf(
                "No suitable fonts found. Install: apt install fonts-liberation".to_string(),
            )
        })
}

pub fn render_pdf(job: &ReviewJob, font_dir: Option<&Path>) -> Result<Vec<u8>, ReportError> {
    let view = ReportView::from_job(job)?;
    let font_family = load_fonts(font_dir)?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(view.title.clone());

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    for block in layout(&view) {
        match block {
            PdfBlock::Title(text) => {
                doc.push(elements::Paragraph::new(text).styled(Style::new().with_font_size(18)))
            }
            PdfBlock::Byline(text) => {
                doc.push(elements::Paragraph::new(text).styled(Style::new().with_font_size(10)))
            }
            PdfBlock::Text(text) => {
                doc.push(elements::Paragraph::new(text).styled(Style::new().with_font_size(12)))
            }
            PdfBlock::Spacer => doc.push(elements::Break::new(1)),
            PdfBlock::PageBreak => doc.push(elements::PageBreak::new()),
            PdfBlock::Heading(text) => {
                doc.push(elements::Paragraph::new(text).styled(Style::new().with_font_size(14)));
                doc.push(elements::Break::new(0.5));
            }
            PdfBlock::Link { label, uri } => {
                let link = Style::new().with_font_size(10).with_color(Color::Rgb(0, 0, 255));
                let muted = Style::new().with_font_size(10).with_color(Color::Greyscale(100));
                doc.push(elements::Paragraph::new(label).styled(link));
                doc.push(elements::Paragraph::new(uri).styled(muted));
                doc.push(elements::Break::new(0.5));
            }
        }
    }

    let mut bytes = Vec::new();
    doc.render(&mut bytes).map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(bytes)
}
