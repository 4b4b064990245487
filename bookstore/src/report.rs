//! Plain-text rendering of query results.
//!
//! Result sets print as boxed tables with a leading `(index)` column; the
//! explain statistics print as pretty JSON.

use bson::{Bson, Document};

const INDEX_HEADER: &str = "(index)";

/// Formats one cell. Strings print without quotes; missing values print empty.
fn cell(value: Option<&Bson>) -> String {
    match value {
        None | Some(Bson::Null) => String::new(),
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::Double(v)) => v.to_string(),
        Some(Bson::Int32(v)) => v.to_string(),
        Some(Bson::Int64(v)) => v.to_string(),
        Some(Bson::Boolean(v)) => v.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Column names in the order they first appear across `rows`.
fn columns(rows: &[&Document]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn separator(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut line = String::new();
    line.push(left);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            line.push(mid);
        }
        line.push_str(&"─".repeat(width + 2));
    }
    line.push(right);
    line
}

fn row_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("│");
    for (cell, width) in cells.iter().zip(widths) {
        line.push_str(&format!(" {:<width$} │", cell, width = *width));
    }
    line
}

/// Renders documents as a table. Non-document rows are skipped.
pub fn render_table(rows: &[Bson]) -> String {
    let documents = rows
        .iter()
        .filter_map(Bson::as_document)
        .collect::<Vec<_>>();
    let columns = columns(&documents);

    let mut header = vec![INDEX_HEADER.to_string()];
    header.extend(columns.iter().cloned());

    let body = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let mut cells = vec![i.to_string()];
            cells.extend(columns.iter().map(|c| cell(doc.get(c))));
            cells
        })
        .collect::<Vec<_>>();

    let widths = header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            body.iter()
                .map(|cells| cells[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect::<Vec<_>>();

    let mut lines = vec![
        separator(&widths, '┌', '┬', '┐'),
        row_line(&header, &widths),
        separator(&widths, '├', '┼', '┤'),
    ];
    lines.extend(body.iter().map(|cells| row_line(cells, &widths)));
    lines.push(separator(&widths, '└', '┴', '┘'));

    lines.join("\n")
}

/// Prints `title` followed by the table of `rows` to stdout.
pub fn print_table(title: &str, rows: &[Bson]) {
    println!("\n{}", title);
    println!("{}", render_table(rows));
}

/// Pretty-prints a BSON value as JSON with two-space indentation.
pub fn pretty_json(value: &Bson) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
