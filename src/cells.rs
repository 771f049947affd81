//! Row-oriented view of the discrete cell fields of one timestep.

use mcds_common::DiscreteCells;
use std::io::Write;
use std::path::Path;

/// One row per agent, one column per cell field.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

/// Borrowed view of a single agent's row.
#[derive(Debug, Clone, Copy)]
pub struct CellRow<'a> {
    columns: &'a [String],
    values: &'a [f64],
}

impl<'a> CellRow<'a> {
    /// Value of field `name` for this agent.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns.iter().position(|c| c == name).map(|idx| self.values[idx])
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }
}

impl CellTable {
    /// Transposes the column store into rows.
    pub fn from_cells(cells: &DiscreteCells) -> Self {
        let columns: Vec<String> = cells.field_names().to_vec();
        let data: Vec<&[f64]> = cells.iter().map(|(_, column)| column).collect();
        let rows = (0..cells.len())
            .map(|row| data.iter().map(|column| column[row]).collect())
            .collect();
        CellTable { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<CellRow<'_>> {
        self.rows.get(idx).map(|values| CellRow { columns: &self.columns, values: values.as_slice() })
    }

    pub fn rows(&self) -> impl Iterator<Item = CellRow<'_>> {
        self.rows.iter().map(move |values| CellRow { columns: &self.columns, values: values.as_slice() })
    }

    /// Copies one column out of the table.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Keeps the rows for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> CellTable
    where
        F: FnMut(&CellRow<'_>) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|values| keep(&CellRow { columns: &self.columns, values: values.as_slice() }))
            .cloned()
            .collect();
        CellTable { columns: self.columns.clone(), rows }
    }

    /// Writes the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the table to a CSV file at `path`.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> csv::Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> CellTable {
        let cells = DiscreteCells::new(
            vec!["ID".to_string(), "position_x".to_string(), "cell_type".to_string()],
            vec![vec![0.0, 1.0, 2.0], vec![-5.0, 12.5, 30.0], vec![0.0, 1.0, 1.0]],
        )
        .unwrap();
        CellTable::from_cells(&cells)
    }

    #[test]
    fn test_rows_follow_agents() {
        let table = sample_table();
        assert_eq!(table.len(), 3);
        let row = table.row(1).unwrap();
        assert_eq!(row.values(), &[1.0, 12.5, 1.0]);
        assert_eq!(row.get("position_x"), Some(12.5));
        assert_eq!(row.get("volume"), None);
        assert_eq!(table.column("cell_type"), Some(vec![0.0, 1.0, 1.0]));
    }

    #[test]
    fn test_filter_keeps_columns() {
        let table = sample_table();
        let typed = table.filter(|row| row.get("cell_type") == Some(1.0));
        assert_eq!(typed.columns(), table.columns());
        assert_eq!(typed.column("ID"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_write_csv() {
        let table = sample_table();
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ID,position_x,cell_type"));
        assert_eq!(lines.next(), Some("0,-5,0"));
        assert_eq!(lines.count(), 2);
    }
}
