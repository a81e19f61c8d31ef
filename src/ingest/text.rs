use anyhow::{Context, Result};
use std::path::Path;

/// Read a text or markdown note, tolerating stray non-UTF-8 bytes
pub fn extract(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read text file: {:?}", path))?;

    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bom_and_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("win.txt");
        std::fs::write(&path, "\u{feff}line one\r\nline two").unwrap();

        assert_eq!(extract(&path).unwrap(), "line one\nline two");
    }
}
