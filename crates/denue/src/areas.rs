//! Area code sources
//!
//! Areas come from an inline comma list or from a one-code-per-line file.
//! That file is produced from the INEGI geostatistical catalog, a Latin-1
//! tab-separated export whose `CVEGEO` column holds the 5-digit municipality
//! key.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::validate::pad_areas;

/// Catalog column holding the area key.
pub const DEFAULT_KEY_COLUMN: &str = "CVEGEO";

const AREA_WIDTH: usize = 5;

/// Latin-1 maps every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Five-digit keys from a Latin-1 tab-separated catalog, in file order.
///
/// The first line is the header. Values are trimmed of whitespace and
/// double quotes; anything that is not exactly five ASCII digits is skipped.
pub fn extract_area_codes(catalog: &[u8], key_column: &str) -> Result<Vec<String>> {
    let text = decode_latin1(catalog);
    let mut lines = text.lines();

    let header = lines.next().unwrap_or_default();
    let column = header
        .split('\t')
        .position(|name| clean(name) == key_column)
        .ok_or_else(|| Error::MissingColumn(key_column.to_string()))?;

    let codes: Vec<String> = lines
        .filter_map(|line| line.split('\t').nth(column))
        .map(clean)
        .filter(|key| key.len() == AREA_WIDTH && key.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_owned)
        .collect();
    debug!(column = key_column, codes = codes.len(), "catalog parsed");
    Ok(codes)
}

/// Read a catalog file and extract its area codes.
pub async fn read_catalog(path: &Path, key_column: &str) -> Result<Vec<String>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
    extract_area_codes(&bytes, key_column)
}

/// Write codes one per line, UTF-8.
pub async fn write_area_file(path: &Path, codes: &[String]) -> Result<()> {
    let mut contents = String::with_capacity(codes.len() * (AREA_WIDTH + 1));
    for code in codes {
        contents.push_str(code);
        contents.push('\n');
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| Error::io(path, e))?;
    info!(path = %path.display(), codes = codes.len(), "area file written");
    Ok(())
}

/// Non-blank lines of an area file, trimmed. No padding or validation.
pub async fn read_area_file(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Where the `--area` argument points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaSource {
    Inline(Vec<String>),
    File(PathBuf),
}

impl AreaSource {
    /// A value ending in `.txt` (any case) or naming an existing file is a
    /// path; anything else is a comma list.
    pub fn parse(arg: &str) -> Self {
        let arg = arg.trim();
        let path = Path::new(arg);
        if arg.to_ascii_lowercase().ends_with(".txt") || path.is_file() {
            return AreaSource::File(path.to_path_buf());
        }
        AreaSource::Inline(
            arg.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Raw area tokens, before padding.
    pub async fn load(&self) -> Result<Vec<String>> {
        match self {
            AreaSource::Inline(areas) => Ok(areas.clone()),
            AreaSource::File(path) => read_area_file(path).await,
        }
    }
}

/// Resolve an `--area` argument to padded, deduplicated codes.
pub async fn resolve_areas(arg: &str) -> Result<Vec<String>> {
    let raw = AreaSource::parse(arg).load().await?;
    Ok(pad_areas(raw))
}

fn clean(value: &str) -> &str {
    value.trim().trim_matches('"').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\"CVEGEO\"\tCVE_ENT\tNOM_MUN\r\n");
        bytes.extend_from_slice(b"\"01001\"\t01\tAguascalientes\r\n");
        // 0xE9 is Latin-1 for e-acute
        bytes.extend_from_slice(b"09015\t09\tCuauht\xe9moc\r\n");
        bytes.extend_from_slice(b"010\t01\tEstado\r\n");
        bytes.extend_from_slice(b"\t\t\r\n");
        bytes.extend_from_slice(b" 14039 \t14\tGuadalajara\n");
        bytes
    }

    #[test]
    fn latin1_decoding() {
        assert_eq!(decode_latin1(b"Cuauht\xe9moc"), "Cuauhtémoc");
        assert_eq!(decode_latin1(b"A\xf1o"), "Año");
    }

    #[test]
    fn extracts_five_digit_keys_in_order() {
        let codes = extract_area_codes(&catalog(), DEFAULT_KEY_COLUMN).unwrap();
        assert_eq!(codes, vec!["01001", "09015", "14039"]);
    }

    #[test]
    fn custom_column() {
        let codes = extract_area_codes(b"ID\tCLAVE\nx\t02004\ny\t2004\n", "CLAVE").unwrap();
        assert_eq!(codes, vec!["02004"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = extract_area_codes(b"A\tB\n1\t2\n", DEFAULT_KEY_COLUMN).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "CVEGEO"));

        assert!(extract_area_codes(b"", DEFAULT_KEY_COLUMN).is_err());
    }

    #[tokio::test]
    async fn area_file_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("AGEEML.txt");
        tokio::fs::write(&catalog_path, catalog()).await.unwrap();

        let codes = read_catalog(&catalog_path, DEFAULT_KEY_COLUMN).await.unwrap();
        let out = dir.path().join("municipios.txt");
        write_area_file(&out, &codes).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "01001\n09015\n14039\n"
        );
        assert_eq!(read_area_file(&out).await.unwrap(), codes);
    }

    #[tokio::test]
    async fn missing_area_file_is_io_error() {
        let err = resolve_areas("/nonexistent/municipios.txt").await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }), "{err}");
    }

    #[test]
    fn parse_inline_list() {
        assert_eq!(
            AreaSource::parse(" 01001, 9009 ,,0"),
            AreaSource::Inline(vec!["01001".into(), "9009".into(), "0".into()])
        );
    }

    #[test]
    fn parse_txt_suffix_as_file_in_any_case() {
        assert_eq!(
            AreaSource::parse("Municipios.TXT"),
            AreaSource::File(PathBuf::from("Municipios.TXT"))
        );
    }

    #[tokio::test]
    async fn existing_file_without_txt_suffix_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.lst");
        std::fs::write(&path, "1001\n\n  9009\nbad\n01001\n").unwrap();

        let arg = path.to_str().unwrap();
        assert_eq!(AreaSource::parse(arg), AreaSource::File(path.clone()));
        assert_eq!(resolve_areas(arg).await.unwrap(), vec!["01001", "09009"]);
    }

    #[tokio::test]
    async fn resolve_inline_pads_and_dedupes() {
        assert_eq!(
            resolve_areas("9,00009,0,123456").await.unwrap(),
            vec!["00009", "0"]
        );
    }
}
