//! Minimal OOXML writer tailored to schedule exports (C9).
//!
//! Writes a spec-valid workbook containing exactly the six parts a
//! consumer needs to open a one-sheet spreadsheet: content types, the
//! package relationships, the workbook, its relationships, one worksheet,
//! and an empty styles part. Every cell is an inline string so the writer
//! never needs a second pass to build a shared-string table.

use std::io::Write;

use cps_core::ScheduleRow;
use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

#[derive(Debug, Error)]
pub enum XlsxAdapterError {
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Excel-style base-26 column letters for a zero-based column index.
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        let remainder = index % 26;
        letters.push((b'A' + remainder as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn content_types_xml() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
        "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
        "<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>",
        "<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>",
        "<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>",
        "</Types>"
    )
    .to_string()
}

fn package_rels_xml() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>",
        "</Relationships>"
    )
    .to_string()
}

fn workbook_rels_xml() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>",
        "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
        "</Relationships>"
    )
    .to_string()
}

fn workbook_xml() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" ",
        "xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">",
        "<sheets><sheet name=\"Schedule\" sheetId=\"1\" r:id=\"rId1\"/></sheets>",
        "</workbook>"
    )
    .to_string()
}

fn styles_xml() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
        "<fonts count=\"1\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>",
        "<fills count=\"1\"><fill><patternFill patternType=\"none\"/></fill></fills>",
        "<borders count=\"1\"><border/></borders>",
        "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
        "<cellXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/></cellXfs>",
        "</styleSheet>"
    )
    .to_string()
}

fn sheet_xml(all_rows: &[Vec<String>]) -> String {
    let max_columns = all_rows.iter().map(Vec::len).max().unwrap_or(0);
    let max_rows = all_rows.len();
    let dimension = if max_columns == 0 || max_rows == 0 {
        "A1:A1".to_string()
    } else {
        format!("A1:{}{}", column_letter(max_columns - 1), max_rows)
    };

    let mut rows_xml = String::new();
    for (row_index, row) in all_rows.iter().enumerate() {
        let row_number = row_index + 1;
        let mut cells_xml = String::new();
        for (column_index, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let reference = format!("{}{row_number}", column_letter(column_index));
            cells_xml.push_str(&format!(
                "<c r=\"{reference}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                escape_xml(value)
            ));
        }
        rows_xml.push_str(&format!("<row r=\"{row_number}\">{cells_xml}</row>"));
    }

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
            "<dimension ref=\"{dimension}\"/>",
            "<sheetData>{sheet_data}</sheetData>",
            "</worksheet>"
        ),
        dimension = dimension,
        sheet_data = rows_xml,
    )
}

fn schedule_rows_as_strings(rows: &[ScheduleRow]) -> Vec<Vec<String>> {
    let header = vec![
        "uid".to_string(),
        "name".to_string(),
        "earliest_start".to_string(),
        "earliest_finish".to_string(),
        "latest_start".to_string(),
        "latest_finish".to_string(),
        "total_float_hours".to_string(),
        "is_critical".to_string(),
        "duration_days".to_string(),
        "is_milestone".to_string(),
        "constraint_type".to_string(),
        "constraint_date".to_string(),
    ];
    let mut all_rows = vec![header];
    for row in rows {
        all_rows.push(vec![
            row.uid.to_string(),
            row.name.clone(),
            row.earliest_start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.earliest_finish.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.latest_start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.latest_finish.format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{:.3}", row.total_float_hours),
            row.is_critical.to_string(),
            format!("{:.3}", row.duration_days),
            row.is_milestone.to_string(),
            row.constraint_type.map(|c| c.to_string()).unwrap_or_default(),
            row.constraint_date
                .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default(),
        ]);
    }
    all_rows
}

/// Writes a one-sheet XLSX workbook holding the schedule's row projection.
pub fn write_schedule<W: Write + std::io::Seek>(
    writer: W,
    rows: &[ScheduleRow],
) -> Result<(), XlsxAdapterError> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml().as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(package_rels_xml().as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml().as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml().as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(styles_xml().as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    zip.write_all(sheet_xml(&schedule_rows_as_strings(rows)).as_bytes())?;

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn column_letter_wraps_past_z() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
    }

    #[test]
    fn escapes_ampersand_and_angle_brackets() {
        assert_eq!(escape_xml("A & B < C"), "A &amp; B &lt; C");
    }

    #[test]
    fn sheet_dimension_matches_header_only_extent() {
        let xml = sheet_xml(&[vec!["uid".to_string(), "name".to_string()]]);
        assert!(xml.contains("dimension ref=\"A1:B1\""));
    }

    #[test]
    fn writes_a_valid_zip_with_expected_parts() {
        let mut buffer = Cursor::new(Vec::new());
        write_schedule(&mut buffer, &[]).unwrap();
        let bytes = buffer.into_inner();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"xl/worksheets/sheet1.xml".to_string()));
        assert!(names.contains(&"[Content_Types].xml".to_string()));
    }
}
