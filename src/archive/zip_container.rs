//! ZIP assembly: one entry per page under its original filename.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

/// One assembled ZIP entry.
pub struct ZipEntry {
    /// Entry name: the page's original filename
    pub name: String,
    pub data: Vec<u8>,
}

/// Assemble an ordered entry list into a complete ZIP container.
///
/// Page images are already compressed, so entries are stored rather than
/// re-deflated.
pub fn assemble_zip(entries: &[ZipEntry]) -> Result<Vec<u8>, ArchiveError> {
    let assembly_err = |message: String| ArchiveError::FatalBuild { message };

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for entry in entries {
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| assembly_err(format!("ZIP entry {} failed: {e}", entry.name)))?;
        writer
            .write_all(&entry.data)
            .map_err(|e| assembly_err(format!("ZIP write {} failed: {e}", entry.name)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| assembly_err(format!("ZIP finish failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_assemble_round_trips() {
        let entries = vec![
            ZipEntry {
                name: "I1KG010001.jpg".to_string(),
                data: vec![1, 2, 3],
            },
            ZipEntry {
                name: "I1KG010002.jpg".to_string(),
                data: vec![4, 5],
            },
        ];
        let bytes = assemble_zip(&entries).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        // Entries keep input order and names.
        assert_eq!(archive.by_index(0).unwrap().name(), "I1KG010001.jpg");
        assert_eq!(archive.by_index(1).unwrap().name(), "I1KG010002.jpg");

        let mut data = Vec::new();
        archive.by_index(1).unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, vec![4, 5]);
    }

    #[test]
    fn test_empty_zip_assembles() {
        let bytes = assemble_zip(&[]).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
