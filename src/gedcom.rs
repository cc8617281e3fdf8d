//! A tolerant reader for GEDCOM files.
//!
//! Files are turned into a tree of [`Element`]s, one per line, nested by
//! level number. Nothing about the meaning of tags is enforced here; see
//! [`records`] for extracting individuals and families.

use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::BackendError;

pub mod records;

pub use records::{ParsedFamily, ParsedIndividual};

lazy_static! {
    /// `level [@xref@] TAG [value]`
    static ref LINE: Regex =
        Regex::new(r"^\s*(\d{1,2})\s+(?:(@[^@\s]+@)\s+)?([A-Za-z0-9_]+)(?:[ \t](.*))?$")
            .unwrap();
}

const BYTE_ORDER_MARK: char = '\u{feff}';

/// How to treat input that breaks the GEDCOM line grammar.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseMode {
    /// Any violation fails the parse.
    Strict,

    /// Violations are recorded as warnings and the offending lines
    /// skipped or re-attached to the nearest open record.
    Lenient,
}

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode::Lenient
    }
}

/// A problem tolerated while parsing leniently.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

/// One GEDCOM line and the lines nested beneath it.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    level: usize,
    pointer: Option<String>,
    tag: String,
    value: Option<String>,
    line: usize,
    children: Vec<Element>,
}

impl Element {
    pub fn level(&self) -> usize {
        self.level
    }

    /// The cross-reference ID, e.g. `@I1@`.
    pub fn pointer(&self) -> Option<&str> {
        self.pointer.as_deref()
    }

    /// The tag, upper-cased.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The value, if it is not empty. Values are trimmed except on `CONC`
    /// and `CONT` lines.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The line the element was read from, starting at 1.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Returns the first child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn children_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Returns the value with `CONC` and `CONT` continuation lines
    /// joined in.
    pub fn full_value(&self) -> String {
        let mut full = self.value.clone().unwrap_or_default();

        for child in &self.children {
            match child.tag.as_str() {
                "CONC" => full.push_str(child.value().unwrap_or_default()),
                "CONT" => {
                    full.push('\n');
                    full.push_str(child.value().unwrap_or_default());
                }
                _ => {}
            }
        }

        full
    }

    /// Visits this element and everything below it, depth first.
    pub fn walk(&self) -> Box<dyn Iterator<Item = &Element> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(|c| c.walk())))
    }
}

/// A parsed GEDCOM file.
#[derive(Debug)]
pub struct Document {
    records: Vec<Element>,
    index: HashMap<String, usize>,
    warnings: Vec<ParseWarning>,
}

impl Document {
    fn new(records: Vec<Element>, warnings: Vec<ParseWarning>) -> Self {
        let mut index = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            if let Some(pointer) = record.pointer() {
                // the first record wins if a pointer is reused
                index.entry(pointer.to_owned()).or_insert(position);
            }
        }

        Document {
            records,
            index,
            warnings,
        }
    }

    /// The level-0 records, in file order.
    pub fn records(&self) -> &[Element] {
        &self.records
    }

    /// The level-0 `INDI` records, in file order.
    pub fn individuals(&self) -> impl Iterator<Item = &Element> {
        self.records.iter().filter(|r| r.tag == "INDI")
    }

    /// Looks up a level-0 record by pointer.
    pub fn record(&self, pointer: &str) -> Option<&Element> {
        self.index.get(pointer).map(|position| &self.records[*position])
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }
}

/// Reads GEDCOM files in the configured [`ParseMode`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Parser {
    mode: ParseMode,
}

impl Parser {
    pub fn new(mode: ParseMode) -> Self {
        Parser { mode }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Document, BackendError> {
        let bytes = std::fs::read(path).map_err(BackendError::UnreadableFile)?;

        self.parse_bytes(&bytes)
    }

    /// Parses raw file contents. Invalid UTF-8 is replaced rather than
    /// rejected.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Document, BackendError> {
        let text = String::from_utf8_lossy(bytes);

        self.parse_str(text.trim_start_matches(BYTE_ORDER_MARK))
    }

    pub fn parse_str(&self, text: &str) -> Result<Document, BackendError> {
        let mut builder = TreeBuilder::new(self.mode);

        let text = text.replace("\r\n", "\n");

        for (index, raw) in text.split(|c| c == '\n' || c == '\r').enumerate() {
            if raw.trim().is_empty() {
                continue;
            }

            builder.push_line(index + 1, raw)?;
        }

        builder.finish()
    }
}

struct TreeBuilder {
    mode: ParseMode,
    records: Vec<Element>,
    open: Vec<Element>,
    warnings: Vec<ParseWarning>,
}

impl TreeBuilder {
    fn new(mode: ParseMode) -> Self {
        TreeBuilder {
            mode,
            records: vec![],
            open: vec![],
            warnings: vec![],
        }
    }

    fn tolerate(&mut self, line: usize, message: String) -> Result<(), BackendError> {
        match self.mode {
            ParseMode::Strict => Err(BackendError::MalformedGedcom {
                line,
                reason: message,
            }),
            ParseMode::Lenient => {
                self.warnings.push(ParseWarning { line, message });
                Ok(())
            }
        }
    }

    fn push_line(&mut self, line: usize, raw: &str) -> Result<(), BackendError> {
        let captures = match LINE.captures(raw) {
            Some(captures) => captures,
            None => return self.tolerate(line, format!("unrecognized line {:?}", raw.trim())),
        };

        // at most two digits, so this cannot overflow
        let mut level: usize = captures[1].parse().unwrap_or_default();

        if level > 0 && self.open.is_empty() {
            return self.tolerate(line, format!("level {} line outside any record", level));
        }

        if level > self.open.len() {
            self.tolerate(
                line,
                format!("level {} follows level {}", level, self.open.len() - 1),
            )?;
            level = self.open.len();
        }

        if level == 0 && self.records.is_empty() && self.open.is_empty() {
            let tag = captures[3].to_ascii_uppercase();

            if self.mode == ParseMode::Strict && tag != "HEAD" {
                return Err(BackendError::MalformedGedcom {
                    line,
                    reason: format!("expected HEAD record, found {}", tag),
                });
            }
        }

        self.close_to(level);

        let tag = captures[3].to_ascii_uppercase();

        // continuation text is kept as written, spaces included
        let value = captures.get(4).map(|m| match tag.as_str() {
            "CONC" | "CONT" => m.as_str().to_owned(),
            _ => m.as_str().trim().to_owned(),
        });

        self.open.push(Element {
            level,
            pointer: captures.get(2).map(|m| m.as_str().to_owned()),
            tag,
            value: value.filter(|v| !v.is_empty()),
            line,
            children: vec![],
        });

        Ok(())
    }

    /// Closes open elements until `depth` remain.
    fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            let element = match self.open.pop() {
                Some(element) => element,
                None => break,
            };

            match self.open.last_mut() {
                Some(parent) => parent.children.push(element),
                None => self.records.push(element),
            }
        }
    }

    fn finish(mut self) -> Result<Document, BackendError> {
        self.close_to(0);

        if self.records.is_empty() {
            return Err(BackendError::MalformedGedcom {
                line: 0,
                reason: "no GEDCOM records found".to_owned(),
            });
        }

        Ok(Document::new(self.records, self.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseMode, Parser};
    use crate::errors::BackendError;

    const SAMPLE: &str = "0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 NAME Anna /Svensson/\n1 BIRT\n2 DATE 12 MAY 1930\n1 NOTE First line\n2 CONC  continued\n2 CONT second line\n0 @F1@ FAM\n1 WIFE @I1@\n0 TRLR\n";

    fn lenient() -> Parser {
        Parser::new(ParseMode::Lenient)
    }

    #[test]
    fn builds_a_tree() {
        let document = lenient().parse_str(SAMPLE).unwrap();

        let tags: Vec<_> = document.records().iter().map(|r| r.tag()).collect();
        assert_eq!(tags, vec!["HEAD", "INDI", "FAM", "TRLR"]);

        let anna = document.record("@I1@").unwrap();
        assert_eq!(anna.child("NAME").unwrap().value(), Some("Anna /Svensson/"));
        assert_eq!(
            anna.child("BIRT").unwrap().child("DATE").unwrap().value(),
            Some("12 MAY 1930")
        );
        assert_eq!(
            anna.child("NOTE").unwrap().full_value(),
            "First line continued\nsecond line"
        );
        assert_eq!(anna.walk().count(), 7);
        assert_eq!(document.individuals().count(), 1);
        assert!(document.warnings().is_empty());
    }

    #[test]
    fn handles_bom_and_line_endings() {
        let text = format!("\u{feff}{}", SAMPLE.replace('\n', "\r\n"));
        let document = lenient().parse_bytes(text.as_bytes()).unwrap();

        assert_eq!(document.records().len(), 4);
        assert_eq!(document.record("@F1@").unwrap().line(), 10);
    }

    #[test]
    fn tolerates_invalid_utf8() {
        let mut bytes = b"0 HEAD\n0 @I1@ INDI\n1 NAME J".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"rgen /Berg/\n");

        let document = lenient().parse_bytes(&bytes).unwrap();
        let name = document.record("@I1@").unwrap().child("NAME").unwrap();

        assert_eq!(name.value(), Some("J\u{fffd}rgen /Berg/"));
    }

    #[test]
    fn lenient_mode_records_warnings() {
        let text = "1 ORPHAN\n0 HEAD\nthis is not gedcom\n0 @I1@ indi\n3 NAME Deep /Level/\n0 TRLR";
        let document = lenient().parse_str(text).unwrap();

        let lines: Vec<_> = document.warnings().iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![1, 3, 5]);

        let individual = document.record("@I1@").unwrap();
        assert_eq!(individual.tag(), "INDI");
        assert_eq!(individual.child("NAME").unwrap().level(), 1);
    }

    #[test]
    fn strict_mode_rejects_violations() {
        let strict = Parser::new(ParseMode::Strict);

        assert!(strict.parse_str(SAMPLE).is_ok());
        assert!(matches!(
            strict.parse_str("0 HEAD\n0 @I1@ INDI\n2 NAME Deep /Level/"),
            Err(BackendError::MalformedGedcom { line: 3, .. })
        ));
        assert!(matches!(
            strict.parse_str("0 @I1@ INDI\n"),
            Err(BackendError::MalformedGedcom { line: 1, .. })
        ));
        assert!(matches!(
            strict.parse_str("0 HEAD\nnonsense"),
            Err(BackendError::MalformedGedcom { line: 2, .. })
        ));
    }

    #[test]
    fn rejects_files_without_records() {
        assert!(matches!(
            lenient().parse_str("\n\nnot a gedcom file\n"),
            Err(BackendError::MalformedGedcom { line: 0, .. })
        ));
    }
}
