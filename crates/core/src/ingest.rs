use crate::chunking::{split_records, ChunkingConfig};
use crate::extractor::{extract_pdf, ExtractedPdf};
use crate::{IngestError, IngestionOptions, Record};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = if recursive {
        WalkDir::new(folder)
    } else {
        WalkDir::new(folder).max_depth(1)
    };

    for entry in walker.into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub records: Vec<Record>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Loads every PDF in `directory` page by page and splits the pages into
/// overlapping windows. PDFs that cannot be read are reported, not fatal.
pub fn load_pdf_documents(
    directory: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    if !directory.is_dir() {
        return Err(IngestError::MissingDirectory(
            directory.display().to_string(),
        ));
    }

    let config = ChunkingConfig::from(options);
    config.validate()?;

    let mut records = Vec::new();
    let mut skipped_files = Vec::new();

    for path in discover_pdf_files(directory, options.recursive) {
        let page_records = extract_pdf(&path).map(|pdf| page_records(&path, &pdf));

        match page_records.and_then(|pages| split_records(&pages, config)) {
            Ok(windows) => records.extend(windows),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        records,
        skipped_files,
    })
}

fn page_records(path: &Path, pdf: &ExtractedPdf) -> Vec<Record> {
    let info = &pdf.info;
    let source = path.to_string_lossy().to_string();

    pdf.pages
        .iter()
        .map(|page| {
            let mut record = Record::new(page.text.clone());
            let text_fields = [
                ("title", &info.title),
                ("producer", &info.producer),
                ("creator", &info.creator),
                ("creationdate", &info.creation_date),
                ("moddate", &info.modification_date),
                ("author", &info.author),
            ];
            for (key, value) in text_fields {
                if let Some(value) = value {
                    record = record.with_metadata(key, value.clone());
                }
            }

            record
                .with_metadata("source", source.clone())
                .with_metadata("total_pages", i64::from(pdf.total_pages))
                .with_metadata("page", i64::from(page.number.saturating_sub(1)))
                .with_metadata("page_label", page.number.to_string())
        })
        .collect()
}

pub fn save_records(
    records: &[Record],
    filename: &str,
    directory: &Path,
) -> Result<PathBuf, IngestError> {
    if filename.trim().is_empty() {
        return Err(IngestError::InvalidArgument(
            "output filename is empty".to_string(),
        ));
    }

    fs::create_dir_all(directory)?;
    let path = directory.join(filename);
    let encoded = serde_json::to_string_pretty(records)?;
    fs::write(&path, encoded)?;

    info!(path = %path.display(), records = records.len(), "records saved");
    Ok(path)
}

pub fn load_records(filename: &str, directory: &Path) -> Result<Vec<Record>, IngestError> {
    let path = directory.join(filename);
    let raw = fs::read_to_string(&path)?;
    let records: Vec<Record> = serde_json::from_str(&raw)?;

    info!(path = %path.display(), records = records.len(), "records loaded");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, load_pdf_documents, load_records, save_records};
    use crate::{IngestError, IngestionOptions, Record};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_flat_unless_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.PDF")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.pdf"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("notes.txt"), b"not a pdf")?;

        assert_eq!(discover_pdf_files(base, false).len(), 1);
        assert_eq!(discover_pdf_files(base, true).len(), 2);
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_error() {
        let options = IngestionOptions::default();
        let result = load_pdf_documents(std::path::Path::new("/definitely/not/here"), &options);
        assert!(matches!(result, Err(IngestError::MissingDirectory(_))));
    }

    #[test]
    fn unreadable_pdfs_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let report = load_pdf_documents(dir.path(), &IngestionOptions::default())?;

        assert!(report.records.is_empty());
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn records_survive_a_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let output = dir.path().join("data");
        let records = vec![
            Record::new("Influenza causes fever and cough").with_metadata("source", "flu.pdf"),
            Record::new("Sốt xuất huyết").with_metadata("page", 1),
        ];

        let path = save_records(&records, "stack.json", &output)?;
        assert!(path.ends_with("data/stack.json"));

        let raw = fs::read_to_string(&path)?;
        assert!(raw.contains("\"page_content\""));

        let loaded = load_records("stack.json", &output)?;
        assert_eq!(loaded, records);
        Ok(())
    }
}
