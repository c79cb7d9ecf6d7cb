use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use calamine::{open_workbook, Reader, Xlsx};
use rust_xlsxwriter::Workbook;

use crate::error::{AppError, Result};
use crate::report::HISTORY_HEADER;

/// Append-only history log backed by a spreadsheet file. Rows are only ever
/// added; nothing here updates or deletes past submissions.
///
/// `.xlsx` files keep a single named worksheet that is created with the
/// header row on first write. `.csv` files get the header once and are then
/// appended in place.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    worksheet: String,
    // Appends read-modify-write a shared file; clones share one lock.
    lock: Arc<Mutex<()>>,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>, worksheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            worksheet: worksheet.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().unwrap();
        match self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("xlsx") => self.append_xlsx(rows),
            Some("csv") => self.append_csv(rows),
            other => Err(AppError::History(format!(
                "unsupported history format {:?} ({})",
                other.unwrap_or("none"),
                self.path.display()
            ))),
        }
    }

    fn append_csv(&self, rows: &[Vec<String>]) -> Result<()> {
        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        if fresh {
            writer.write_record(HISTORY_HEADER)?;
        }
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// xlsx has no in-place append, so the worksheet is read back and the
    /// whole workbook rewritten with the new rows at the end.
    fn append_xlsx(&self, rows: &[Vec<String>]) -> Result<()> {
        let mut all = self.read_existing()?;
        all.extend(rows.iter().cloned());

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(&self.worksheet)
            .map_err(|e| AppError::History(e.to_string()))?;
        for (col, title) in HISTORY_HEADER.iter().enumerate() {
            sheet.write_string(0, col as u16, *title)?;
        }
        for (i, row) in all.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                sheet.write_string(i as u32 + 1, col as u16, value)?;
            }
        }
        // Save to a sibling and swap it in so no reader sees a torn workbook.
        let tmp = self.path.with_extension("xlsx.tmp");
        workbook.save(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read_existing(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let range = match workbook.worksheet_range(&self.worksheet) {
            Ok(range) => range,
            // Workbook exists but the tab does not yet; start it fresh.
            Err(_) => return Ok(Vec::new()),
        };
        let mut out: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        if out
            .first()
            .and_then(|row| row.first())
            .is_some_and(|first| first == HISTORY_HEADER[0])
        {
            out.remove(0);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(tag: &str) -> Vec<String> {
        let mut row: Vec<String> = HISTORY_HEADER.iter().map(|_| String::new()).collect();
        row[0] = "01/02/2025".to_string();
        row[2] = tag.to_string();
        row
    }

    #[test]
    fn test_csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.csv"), "Histórico");
        log.append(&[sample_row("Financeiro")]).unwrap();
        log.append(&[sample_row("Comercial")]).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Data,"));
        assert!(lines[1].contains("Financeiro"));
        assert!(lines[2].contains("Comercial"));
    }

    #[test]
    fn test_xlsx_rows_accumulate_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.xlsx"), "Histórico");
        log.append(&[sample_row("Financeiro"), sample_row("Comercial")])
            .unwrap();
        log.append(&[sample_row("Loja")]).unwrap();

        let existing = log.read_existing().unwrap();
        assert_eq!(existing.len(), 3);
        assert_eq!(existing[0][2], "Financeiro");
        assert_eq!(existing[2][2], "Loja");
    }

    #[test]
    fn test_xlsx_worksheet_created_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.xlsx"), "Histórico");
        log.append(&[sample_row("Financeiro")]).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(log.path()).unwrap();
        let range = workbook.worksheet_range("Histórico").unwrap();
        let first: Vec<String> = range
            .rows()
            .next()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(first, HISTORY_HEADER);
    }

    #[test]
    fn test_concurrent_xlsx_appends_keep_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.xlsx"), "Histórico");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || log.append(&[sample_row(&format!("Setor {i}"))]))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(log.read_existing().unwrap().len(), 8);
    }

    #[test]
    fn test_concurrent_csv_appends_write_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.csv"), "Histórico");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || log.append(&[sample_row(&format!("Setor {i}"))]))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("Data,")).count(),
            1
        );
    }

    #[test]
    fn test_empty_append_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.xlsx"), "Histórico");
        log.append(&[]).unwrap();
        assert!(!log.path().exists());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("historico.ods"), "Histórico");
        assert!(log.append(&[sample_row("X")]).is_err());
    }
}
