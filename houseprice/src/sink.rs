//! CSV output for result tables.
//!
//! Fields are quoted only when they contain the separator, a quote or a
//! line break. The area table is written with a UTF-8 BOM so spreadsheet
//! tools pick the right encoding.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::aggregate::{ResultTable, TableRow};
use crate::errors::Result;

const BOM: &[u8] = "\u{feff}".as_bytes();
const SEP: char = ',';

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Writes one record followed by a newline.
pub fn write_record<W, S>(w: &mut W, cells: &[S]) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            write!(w, "{SEP}")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    writeln!(w)
}

/// Writes a header line and every row.
pub fn write_table<W, R>(mut w: W, table: &ResultTable<R>, with_bom: bool) -> io::Result<()>
where
    W: Write,
    R: TableRow,
{
    if with_bom {
        w.write_all(BOM)?;
    }
    write_record(&mut w, R::header())?;
    for row in table.rows() {
        write_record(&mut w, &row.cells())?;
    }
    w.flush()
}

/// Writes a table to a file, replacing it if present.
pub fn write_csv<R: TableRow>(
    path: impl AsRef<Path>,
    table: &ResultTable<R>,
    with_bom: bool,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_table(BufWriter::new(file), table, with_bom)?;
    info!(path = %path.display(), rows = table.len(), "Wrote CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AreaPriceRow, ItemResult, PriceValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quoting() {
        let mut out = Vec::new();
        write_record(&mut out, &["plain", "a,b", "say \"hi\"", "two\nlines"]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "plain,\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\n"
        );
    }

    #[test]
    fn test_enrichment_table_without_bom() {
        let mut row = ItemResult::default();
        row.location.address = "北京市海淀区&3栋".to_string();
        row.price = PriceValue::Numeric(52000);
        let table = ResultTable::new(vec![row]);

        let mut out = Vec::new();
        write_table(&mut out, &table, false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "address,lng,lat,precise,confidence,comprehension,level,price\n\
             北京市海淀区&3栋,0,0,0,0,0,无,52000\n"
        );
    }

    #[test]
    fn test_area_file_has_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.csv");
        let table = ResultTable::new(vec![AreaPriceRow {
            city: "北京".to_string(),
            district: "朝阳".to_string(),
            average_price: "65,000".to_string(),
        }]);

        write_csv(&path, &table, true).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(BOM));
        let text = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "city,district,averagePrice\n北京,朝阳,\"65,000\"\n");
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let mut out = Vec::new();
        write_table(&mut out, &ResultTable::<AreaPriceRow>::default(), false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "city,district,averagePrice\n");
    }
}
