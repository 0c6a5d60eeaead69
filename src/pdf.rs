//! PDF sink for [`ClassReport`].
//!
//! Emits a small PDF 1.4 document using only the base-14 Helvetica fonts, so
//! nothing has to be embedded. Those fonts have no Vietnamese glyphs, which
//! is why the report is transliterated before it gets here; any character
//! outside printable ASCII that still slips through is drawn as `?`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::report::{report_file_name, ClassReport, REPORT_HEADER};

const PAGE_WIDTH: f64 = 595.28;
const PAGE_HEIGHT: f64 = 841.89;
const POINTS_PER_MM: f64 = 72.0 / 25.4;

const MARGIN: f64 = 14.0 * POINTS_PER_MM;
const TITLE_TOP: f64 = 15.0 * POINTS_PER_MM;
const SUBTITLE_TOP: f64 = 25.0 * POINTS_PER_MM;
const TABLE_TOP: f64 = 35.0 * POINTS_PER_MM;
const TITLE_SIZE: f64 = 18.0;
const SUBTITLE_SIZE: f64 = 12.0;
const CELL_SIZE: f64 = 10.0;
const ROW_HEIGHT: f64 = 20.0;
const CELL_PADDING: f64 = 5.0;

const ELLIPSIS: &str = "...";

const COLUMN_SHARES: [f64; 4] = [0.1, 0.5, 0.2, 0.2];
const HEADER_FILL: (u8, u8, u8) = (16, 185, 129);
const STRIPE_FILL: (u8, u8, u8) = (245, 245, 245);

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // 'A'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // 'a'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn pdf_char(c: char) -> char {
    if (' '..='~').contains(&c) {
        c
    } else {
        '?'
    }
}

fn text_width(text: &str, size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| u32::from(HELVETICA_WIDTHS[pdf_char(c) as usize - 32]))
        .sum();
    f64::from(units) * size / 1000.0
}

/// `text` cut to at most `max_width` points, ending in `...` when shortened.
fn fit_text(text: &str, size: f64, max_width: f64) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }
    let budget = max_width - text_width(ELLIPSIS, size);
    let mut kept = String::new();
    let mut used = 0.0;
    for c in text.chars() {
        let advance = text_width(c.encode_utf8(&mut [0; 4]), size);
        if used + advance > budget {
            break;
        }
        used += advance;
        kept.push(c);
    }
    kept.push_str(ELLIPSIS);
    kept
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().map(pdf_char) {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn rgb((r, g, b): (u8, u8, u8)) -> String {
    format!(
        "{:.3} {:.3} {:.3}",
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0
    )
}

/// Content stream builder in top-left based coordinates.
#[derive(Default)]
struct Canvas {
    ops: String,
}

impl Canvas {
    fn fill_rect(&mut self, x: f64, top: f64, width: f64, height: f64, color: (u8, u8, u8)) {
        let y = PAGE_HEIGHT - top - height;
        self.ops.push_str(&format!(
            "{} rg\n{x:.2} {y:.2} {width:.2} {height:.2} re f\n",
            rgb(color)
        ));
    }

    fn text(&mut self, font: &str, size: f64, x: f64, baseline: f64, color: (u8, u8, u8), text: &str) {
        let y = PAGE_HEIGHT - baseline;
        self.ops.push_str(&format!(
            "BT\n{} rg\n/{font} {size:.1} Tf\n{x:.2} {y:.2} Td\n({}) Tj\nET\n",
            rgb(color),
            escape_text(text)
        ));
    }

    fn centered_text(&mut self, size: f64, baseline: f64, text: &str) {
        let x = (PAGE_WIDTH - text_width(text, size)) / 2.0;
        self.text("F1", size, x, baseline, (0, 0, 0), text);
    }
}

struct Table {
    columns: [f64; 4],
}

impl Table {
    fn new() -> Self {
        let width = PAGE_WIDTH - 2.0 * MARGIN;
        Self {
            columns: COLUMN_SHARES.map(|share| share * width),
        }
    }

    fn row(&self, canvas: &mut Canvas, top: f64, cells: &[String; 4], font: &str, fill: Option<(u8, u8, u8)>, ink: (u8, u8, u8)) {
        if let Some(color) = fill {
            canvas.fill_rect(MARGIN, top, self.columns.iter().sum(), ROW_HEIGHT, color);
        }
        let baseline = top + ROW_HEIGHT / 2.0 + CELL_SIZE * 0.35;
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(self.columns) {
            let fitted = fit_text(cell, CELL_SIZE, width - 2.0 * CELL_PADDING);
            canvas.text(font, CELL_SIZE, x + CELL_PADDING, baseline, ink, &fitted);
            x += width;
        }
    }
}

fn rows_fitting(table_top: f64) -> usize {
    let available = PAGE_HEIGHT - table_top - MARGIN - ROW_HEIGHT;
    ((available / ROW_HEIGHT).floor() as usize).max(1)
}

/// Lays the report out page by page, repeating the table header on each.
fn page_streams(report: &ClassReport) -> Vec<String> {
    let table = Table::new();
    let header = REPORT_HEADER.map(str::to_string);
    let mut pages = Vec::new();
    let mut remaining = report.rows.as_slice();
    let mut stripe = 0usize;

    loop {
        let mut canvas = Canvas::default();
        let table_top = if pages.is_empty() {
            canvas.centered_text(TITLE_SIZE, TITLE_TOP, &report.title);
            canvas.centered_text(SUBTITLE_SIZE, SUBTITLE_TOP, &report.subtitle);
            TABLE_TOP
        } else {
            MARGIN
        };

        table.row(&mut canvas, table_top, &header, "F2", Some(HEADER_FILL), (255, 255, 255));

        let take = rows_fitting(table_top).min(remaining.len());
        let (page_rows, rest) = remaining.split_at(take);
        for (i, row) in page_rows.iter().enumerate() {
            let top = table_top + ROW_HEIGHT * (i + 1) as f64;
            let fill = (stripe % 2 == 1).then_some(STRIPE_FILL);
            table.row(&mut canvas, top, &row.cells(), "F1", fill, (0, 0, 0));
            stripe += 1;
        }

        pages.push(canvas.ops);
        remaining = rest;
        if remaining.is_empty() {
            break;
        }
    }

    pages
}

struct PdfWriter {
    buffer: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buffer = b"%PDF-1.4\n".to_vec();
        buffer.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            buffer,
            offsets: Vec::new(),
        }
    }

    /// Objects must be added in id order starting at 1.
    fn object(&mut self, body: &str) {
        self.offsets.push(self.buffer.len());
        let id = self.offsets.len();
        self.buffer
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream(&mut self, content: &str) {
        let body = format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        );
        self.object(&body);
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_at = self.buffer.len();
        let count = self.offsets.len() + 1;
        let mut xref = format!("xref\n0 {count}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {count} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        ));
        self.buffer.extend_from_slice(xref.as_bytes());
        self.buffer
    }
}

/// Renders the report as PDF bytes. Same report in, same bytes out.
pub fn render_pdf(report: &ClassReport) -> Vec<u8> {
    let pages = page_streams(report);
    // 1 catalog, 2 page tree, 3-4 fonts, then a (page, content) pair per page
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 5 + 2 * i).collect();
    let kids: Vec<String> = page_ids.iter().map(|id| format!("{id} 0 R")).collect();

    let mut writer = PdfWriter::new();
    writer.object("<< /Type /Catalog /Pages 2 0 R >>");
    writer.object(&format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    writer.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>");
    writer.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>");

    for (content, page_id) in pages.iter().zip(&page_ids) {
        writer.object(&format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        writer.stream(content);
    }

    writer.finish()
}

/// Writes `Class_Report_<className>.pdf` into `dir`.
pub fn write_report_pdf(dir: &Path, class_name: &str, report: &ClassReport) -> anyhow::Result<PathBuf> {
    let path = dir.join(report_file_name(class_name));
    let bytes = render_pdf(report);
    std::fs::write(&path, &bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = report.rows.len(), bytes = bytes.len(), "Class report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportRow;

    fn report(rows: usize) -> ClassReport {
        ClassReport {
            title: "Class Report - 6A1".to_string(),
            subtitle: "Semester: HK1".to_string(),
            rows: (1..=rows)
                .map(|n| ReportRow {
                    number: n,
                    name: format!("Student {n}"),
                    average: "7.5".to_string(),
                    count: 3,
                })
                .collect(),
        }
    }

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn renders_title_header_and_rows() {
        let text = as_text(&render_pdf(&report(2)));

        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("(Class Report - 6A1) Tj"));
        assert!(text.contains("(Semester: HK1) Tj"));
        for label in REPORT_HEADER {
            assert!(text.contains(&format!("({label}) Tj")));
        }
        assert!(text.contains("(Student 2) Tj"));
        assert!(text.contains("/Count 1"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let bytes = render_pdf(&report(3));
        let xref_start = bytes.windows(5).rposition(|w| w == b"xref\n").unwrap();
        let tail = std::str::from_utf8(&bytes[xref_start..]).unwrap();
        let entries: Vec<usize> = tail
            .lines()
            .skip(3)
            .take_while(|line| line.ends_with(" n "))
            .map(|line| line[..10].parse().unwrap())
            .collect();

        assert_eq!(entries.len(), 6);
        for (i, offset) in entries.iter().enumerate() {
            let expected = format!("{} 0 obj", i + 1);
            assert!(bytes[*offset..].starts_with(expected.as_bytes()));
        }
        assert!(tail.contains(&format!("startxref\n{xref_start}\n")));
    }

    #[test]
    fn long_reports_span_pages() {
        let text = as_text(&render_pdf(&report(100)));
        assert!(text.contains("/Count 3"));
        assert!(text.contains("(Student 100) Tj"));
        assert_eq!(text.matches("(Average) Tj").count(), 3);
    }

    #[test]
    fn empty_report_still_has_a_page() {
        let text = as_text(&render_pdf(&report(0)));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("(Name) Tj"));
    }

    #[test]
    fn wide_cells_are_cut_to_their_column() {
        let mut long = report(1);
        long.rows[0].name = "Nguyen ".repeat(20);
        let text = as_text(&render_pdf(&long));
        assert!(!text.contains(&long.rows[0].name));

        let name_column = Table::new().columns[1] - 2.0 * CELL_PADDING;
        let fitted = fit_text(&long.rows[0].name, CELL_SIZE, name_column);
        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, CELL_SIZE) <= name_column);
        assert!(text.contains(&format!("({fitted}) Tj")));

        assert_eq!(fit_text("Nguyen An", CELL_SIZE, name_column), "Nguyen An");
    }

    #[test]
    fn escapes_and_replaces_text() {
        assert_eq!(escape_text("A (b) \\ c"), "A \\(b\\) \\\\ c");
        assert_eq!(escape_text("Hà"), "H?");
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(render_pdf(&report(5)), render_pdf(&report(5)));
    }

    #[test]
    fn writes_named_file() {
        let dir = std::env::temp_dir();
        let path = write_report_pdf(&dir, "6A1_pdf_test", &report(1)).unwrap();
        assert!(path.ends_with("Class_Report_6A1_pdf_test.pdf"));
        std::fs::remove_file(&path).unwrap();
    }
}
