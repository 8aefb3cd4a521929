//! Bundle document renderer
//!
//! Lays out the "LIST HANDOVER" sheet for a bundle and writes it under the
//! configured output directory.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;
use uuid::Uuid;

use super::pdf::{A4_HEIGHT, A4_WIDTH, Page, PdfDocument, fit_text};
use super::status::HandoverStatus;
use super::types::{BundleActors, ShipmentDetail};
use crate::config::DocumentConfig;

const MARGIN: f32 = 40.0;
const ROW_HEIGHT: f32 = 18.0;
const QR_SIZE: f32 = 80.0;
/// Room the signature block needs below the table
const SIGNATURE_HEIGHT: f32 = 110.0;
const FOOTER_Y: f32 = 25.0;

/// (header, x offset from margin, width)
const COLUMNS: [(&str, f32, f32); 4] = [
    ("No", 0.0, 30.0),
    ("Customer", 30.0, 215.0),
    ("Shipment No", 245.0, 150.0),
    ("Movement Date", 395.0, 120.0),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Nothing to render for bundle {0}")]
    Empty(String),

    #[error("QR encoding failed: {0}")]
    Qr(String),

    #[error("Document write failed: {0}")]
    Io(String),
}

impl RenderError {
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::Empty(_) => "RENDER_EMPTY",
            RenderError::Qr(_) => "RENDER_QR",
            RenderError::Io(_) => "RENDER_IO",
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Io(e.to_string())
    }
}

/// Everything printed on one bundle document
#[derive(Debug, Clone)]
pub struct BundleDocument {
    pub document_no: String,
    pub status: HandoverStatus,
    pub details: Vec<ShipmentDetail>,
    pub actors: BundleActors,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Write the document and return where it was stored
    async fn render(&self, doc: &BundleDocument) -> Result<PathBuf, RenderError>;
}

pub struct PdfRenderer {
    output_dir: PathBuf,
    public_base_url: String,
}

impl PdfRenderer {
    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the PDF for `doc`; `file_name` is what the QR code links to
    pub fn layout(&self, doc: &BundleDocument, file_name: &str) -> Result<PdfDocument, RenderError> {
        if doc.details.is_empty() {
            return Err(RenderError::Empty(doc.document_no.clone()));
        }
        let url = format!("{}/{}", self.public_base_url, file_name);
        let qr = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)
            .map_err(|e| RenderError::Qr(e.to_string()))?;

        let mut pdf = PdfDocument::new();
        let page = pdf.add_page();
        let mut y = draw_heading(page, doc, &qr);
        y = draw_table_header(page, y);

        for (i, detail) in doc.details.iter().enumerate() {
            if y - ROW_HEIGHT < MARGIN + FOOTER_Y {
                let page = pdf.add_page();
                y = draw_table_header(page, A4_HEIGHT - MARGIN);
            }
            let page = last_page(&mut pdf);
            draw_row(page, y, i + 1, detail);
            y -= ROW_HEIGHT;
        }

        if y - SIGNATURE_HEIGHT < MARGIN {
            pdf.add_page();
            y = A4_HEIGHT - MARGIN;
        }
        draw_signatures(last_page(&mut pdf), y - 30.0, &doc.actors);

        let total = pdf.page_count();
        for (i, page) in pdf.pages_mut().iter_mut().enumerate() {
            page.text_centered(
                A4_WIDTH / 2.0,
                FOOTER_Y,
                8.0,
                false,
                &format!("{} - page {}/{}", doc.document_no, i + 1, total),
            );
        }
        Ok(pdf)
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(&self, doc: &BundleDocument) -> Result<PathBuf, RenderError> {
        let file_name = format!("handover_{}.pdf", Uuid::new_v4());
        let pdf = self.layout(doc, &file_name)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, pdf.to_bytes()).await?;
        Ok(path)
    }
}

fn last_page(pdf: &mut PdfDocument) -> &mut Page {
    let pages = pdf.pages_mut();
    let last = pages.len() - 1;
    &mut pages[last]
}

fn draw_heading(page: &mut Page, doc: &BundleDocument, qr: &QrCode) -> f32 {
    let top = A4_HEIGHT - MARGIN;
    page.text(MARGIN, top - 16.0, 16.0, true, "LIST HANDOVER");
    page.text(MARGIN, top - 40.0, 10.0, false, &format!("Status    : {}", doc.status));
    page.text(
        MARGIN,
        top - 55.0,
        10.0,
        false,
        &format!("Bundle No : {}", doc.document_no),
    );
    page.text(
        MARGIN,
        top - 70.0,
        10.0,
        false,
        &format!("Total     : {} shipment(s)", doc.details.len()),
    );
    draw_qr(page, qr, A4_WIDTH - MARGIN - QR_SIZE, top);
    top - QR_SIZE - 20.0
}

fn draw_qr(page: &mut Page, qr: &QrCode, x: f32, top: f32) {
    let width = qr.width();
    let module = QR_SIZE / width as f32;
    for (i, color) in qr.to_colors().into_iter().enumerate() {
        if color == Color::Dark {
            let (row, col) = (i / width, i % width);
            page.fill_rect(
                x + col as f32 * module,
                top - (row + 1) as f32 * module,
                module,
                module,
            );
        }
    }
}

fn draw_table_header(page: &mut Page, y: f32) -> f32 {
    for (title, offset, width) in COLUMNS {
        page.rect(MARGIN + offset, y - ROW_HEIGHT, width, ROW_HEIGHT);
        page.text(MARGIN + offset + 4.0, y - 12.5, 9.0, true, title);
    }
    y - ROW_HEIGHT
}

fn draw_row(page: &mut Page, y: f32, no: usize, detail: &ShipmentDetail) {
    let date = detail
        .movement_date
        .map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|| "-".to_string());
    let cells = [
        no.to_string(),
        detail.customer_name.clone(),
        detail.document_no.clone(),
        date,
    ];
    for ((_, offset, width), cell) in COLUMNS.iter().zip(cells.iter()) {
        page.rect(MARGIN + offset, y - ROW_HEIGHT, *width, ROW_HEIGHT);
        page.text(
            MARGIN + offset + 4.0,
            y - 12.5,
            9.0,
            false,
            &fit_text(cell, width - 8.0, 9.0),
        );
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%d-%m-%Y %H:%M UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn draw_signatures(page: &mut Page, y: f32, actors: &BundleActors) {
    let col = (A4_WIDTH - 2.0 * MARGIN) / 2.0;
    let left = MARGIN + col / 2.0;
    let right = MARGIN + col + col / 2.0;

    page.text_centered(left, y, 10.0, false, "Handed over by,");
    page.text_centered(right, y, 10.0, false, "Received by,");

    let name_y = y - 55.0;
    page.text_centered(left, name_y, 9.0, true, &actors.prev_actor_name);
    page.text_centered(right, name_y, 9.0, true, &actors.current_actor_name);
    page.line(left - 70.0, name_y - 3.0, left + 70.0, name_y - 3.0);
    page.line(right - 70.0, name_y - 3.0, right + 70.0, name_y - 3.0);

    page.text_centered(left, name_y - 15.0, 8.0, false, &format_time(actors.handover_time));
    page.text_centered(right, name_y - 15.0, 8.0, false, &format_time(actors.receive_time));
}
