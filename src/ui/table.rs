//! Box-drawn tables for listings.

use console::{measure_text_width, pad_str, Alignment};

/// A simple table with a header row.
///
/// Widths are measured in terminal columns, so cells may hold status icons
/// or styled text.
#[derive(Debug)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            widths: headers.iter().map(|h| measure_text_width(h)).collect(),
        }
    }

    /// Add a row. Cells past the header count are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        let mut row = row;
        row.truncate(self.headers.len());
        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(measure_text_width(cell));
        }
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            self.border('┌', '┬', '┐'),
            self.row(&self.headers),
            self.border('├', '┼', '┤'),
        ];
        lines.extend(self.rows.iter().map(|r| self.row(r)));
        lines.push(self.border('└', '┴', '┘'));
        lines.join("\n")
    }

    fn border(&self, left: char, mid: char, right: char) -> String {
        let inner: Vec<String> = self.widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, inner.join(&mid.to_string()), right)
    }

    fn row(&self, cells: &[String]) -> String {
        let mut s = String::from("│");
        for (i, width) in self.widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            s.push_str(&format!(
                " {} │",
                pad_str(cell, *width, Alignment::Left, None)
            ));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_still_renders_headers() {
        let table = Table::new(&["#", "Step"]);
        assert!(table.is_empty());
        assert_eq!(table.render().lines().count(), 4);
    }

    #[test]
    fn columns_widen_to_fit() {
        let mut table = Table::new(&["#", "Step"]);
        table.add_row(vec!["1".to_string(), "Generate Precombined".to_string()]);
        let output = table.render();
        let widths: Vec<usize> = output.lines().map(measure_text_width).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
        assert!(output.contains("Generate Precombined"));
    }

    #[test]
    fn icons_do_not_break_alignment() {
        let mut table = Table::new(&["Status", "Step"]);
        table.add_row(vec!["✓".to_string(), "Build CDX".to_string()]);
        table.add_row(vec!["⊘".to_string(), "Compress PSG".to_string()]);
        let widths: Vec<usize> = table.render().lines().map(measure_text_width).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn missing_cells_are_blank() {
        let mut table = Table::new(&["A", "B", "C"]);
        table.add_row(vec!["only".to_string()]);
        assert!(table.render().contains("only"));
    }
}
