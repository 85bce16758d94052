//! Tolerant CSV reader with delimiter, enclosure and charset auto-detection.
//!
//! Input is decoded to UTF-8 once, the format is guessed from a small
//! sample of lines, then rows are mapped to the header.
//!
//! # Example
//! ```ignore
//! use resolver::parser::{CsvReader, CsvReadOptions};
//!
//! let reader = CsvReader::new(b"egid;name\n42;Town hall", CsvReadOptions::default())?;
//! assert_eq!(reader.delimiter(), ';');
//! for row in reader.rows() {
//!     println!("{:?}", row?.get("egid"));
//! }
//! ```

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::collections::BTreeMap;

use crate::error::{CsvError, CsvResult};

pub const DELIMITER_CANDIDATES: [char; 3] = [',', ';', '\t'];
pub const ENCLOSURE_CANDIDATES: [char; 2] = ['"', '\''];
pub const DEFAULT_DELIMITER: char = ',';
pub const DEFAULT_ENCLOSURE: char = '"';

/// Lines inspected when guessing the format.
pub const GUESS_SAMPLE_LINES: usize = 3;

/// Caller pinned format; `None` means guess.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvReadOptions {
    pub delimiter: Option<char>,
    pub enclosure: Option<char>,
    pub charset: Option<String>,
}

/// One data row mapped to the header.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// Line number in the input (1-based, header is line 1).
    pub number: usize,
    pub values: BTreeMap<String, String>,
}

impl CsvRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

pub struct CsvReader {
    text: String,
    header: Vec<String>,
    delimiter: char,
    enclosure: char,
    charset: &'static Encoding,
}

impl CsvReader {
    pub fn new(bytes: &[u8], options: CsvReadOptions) -> CsvResult<Self> {
        if bytes.is_empty() {
            return Err(CsvError::EmptyFile);
        }

        let (charset, bom_len) = resolve_encoding(bytes, options.charset.as_deref())?;
        let text = decode_content(&bytes[bom_len..], charset);
        let text = match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        };
        if text.trim().is_empty() {
            return Err(CsvError::EmptyFile);
        }

        // Only the header is needed when nothing has to be guessed
        let pinned = options.delimiter.is_some() && options.enclosure.is_some();
        let sample = sample_lines(&text, if pinned { 1 } else { GUESS_SAMPLE_LINES });

        let delimiter = options.delimiter.unwrap_or_else(|| guess_delimiter(&sample));
        let enclosure = options.enclosure.unwrap_or_else(|| guess_enclosure(&sample));
        ensure_ascii("delimiter", delimiter)?;
        ensure_ascii("enclosure", enclosure)?;

        let header = read_header(&text, delimiter, enclosure)?;

        Ok(Self {
            text,
            header,
            delimiter,
            enclosure,
            charset,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.header.iter().any(|h| h == column)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn enclosure(&self) -> char {
        self.enclosure
    }

    /// Name of the charset the input was decoded from.
    pub fn charset(&self) -> &'static str {
        self.charset.name()
    }

    /// Data rows, lazily mapped to the header.
    pub fn rows(&self) -> CsvRows<'_> {
        let mut records = reader_builder(self.delimiter, self.enclosure)
            .from_reader(self.text.as_bytes())
            .into_records();
        // header
        records.next();
        CsvRows {
            header: &self.header,
            records,
        }
    }

    pub fn read_all(&self) -> CsvResult<Vec<CsvRow>> {
        self.rows().collect()
    }
}

pub struct CsvRows<'a> {
    header: &'a [String],
    records: csv::StringRecordsIntoIter<&'a [u8]>,
}

impl Iterator for CsvRows<'_> {
    type Item = CsvResult<CsvRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(malformed(e))),
            };
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let number = record.position().map(|p| p.line() as usize).unwrap_or(0);
            if record.len() != self.header.len() {
                return Some(Err(CsvError::RowWidth {
                    row: number,
                    expected: self.header.len(),
                    found: record.len(),
                }));
            }

            let values = self
                .header
                .iter()
                .cloned()
                .zip(record.iter().map(|cell| cell.trim().to_string()))
                .collect();
            return Some(Ok(CsvRow { number, values }));
        }
    }
}

fn reader_builder(delimiter: char, enclosure: char) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .quote(enclosure as u8);
    builder
}

fn malformed(err: csv::Error) -> CsvError {
    let row = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(0);
    CsvError::Malformed {
        row,
        message: err.to_string(),
    }
}

fn ensure_ascii(kind: &'static str, value: char) -> CsvResult<()> {
    if value.is_ascii() {
        Ok(())
    } else {
        Err(CsvError::UnsupportedCharacter { kind, value })
    }
}

fn read_header(text: &str, delimiter: char, enclosure: char) -> CsvResult<Vec<String>> {
    let mut reader = reader_builder(delimiter, enclosure).from_reader(text.as_bytes());
    let record = reader
        .records()
        .next()
        .ok_or(CsvError::EmptyFile)?
        .map_err(malformed)?;

    record
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let cell = cell.trim();
            if cell.is_empty() {
                Err(CsvError::EmptyHeaderCell { column: i + 1 })
            } else {
                Ok(cell.to_string())
            }
        })
        .collect()
}

/// First `count` non-blank lines.
pub fn sample_lines(text: &str, count: usize) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .take(count)
        .collect()
}

/// Guess the delimiter among [`DELIMITER_CANDIDATES`].
///
/// A candidate present in every sampled line wins, the most frequent in the
/// first line breaking ties; otherwise the most frequent in the first line.
pub fn guess_delimiter(sample: &[&str]) -> char {
    let Some(first) = sample.first() else {
        return DEFAULT_DELIMITER;
    };

    let mut best: Option<(char, usize)> = None;
    for candidate in DELIMITER_CANDIDATES {
        if !sample.iter().all(|line| line.contains(candidate)) {
            continue;
        }
        let count = first.matches(candidate).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((candidate, count));
        }
    }
    if let Some((delimiter, _)) = best {
        return delimiter;
    }

    DELIMITER_CANDIDATES
        .into_iter()
        .map(|c| (c, first.matches(c).count()))
        .filter(|(_, count)| *count > 0)
        .fold(None, |best: Option<(char, usize)>, (c, count)| match best {
            Some((_, b)) if b >= count => best,
            _ => Some((c, count)),
        })
        .map(|(c, _)| c)
        .unwrap_or(DEFAULT_DELIMITER)
}

/// Guess the enclosure: first candidate with a non-zero even count.
pub fn guess_enclosure(sample: &[&str]) -> char {
    ENCLOSURE_CANDIDATES
        .into_iter()
        .find(|candidate| {
            let count: usize = sample.iter().map(|line| line.matches(*candidate).count()).sum();
            count > 0 && count % 2 == 0
        })
        .unwrap_or(DEFAULT_ENCLOSURE)
}

/// Detect the charset of raw bytes using chardet.
pub fn detect_charset(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Encoding to decode with, and the length of a BOM to skip.
fn resolve_encoding(bytes: &[u8], declared: Option<&str>) -> CsvResult<(&'static Encoding, usize)> {
    let bom = Encoding::for_bom(bytes);
    let bom_len = bom.map(|(_, len)| len).unwrap_or(0);

    if let Some(label) = declared.map(str::trim).filter(|l| !l.is_empty()) {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CsvError::UnknownCharset(label.to_string()))?;
        return Ok((encoding, bom_len));
    }

    if let Some((encoding, len)) = bom {
        return Ok((encoding, len));
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Ok((UTF_8, 0));
    }

    let guessed = detect_charset(bytes);
    Ok((Encoding::for_label(guessed.as_bytes()).unwrap_or(WINDOWS_1252), 0))
}

/// Decode bytes to UTF-8 text.
pub fn decode_content(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}
