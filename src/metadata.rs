use std::sync::OnceLock;

use regex::Regex;

use crate::extractor::ExtractedDocument;

/// Maximum characters kept as the abstract/snippet attribute.
const SNIPPET_MAX_CHARS: usize = 1200;

/// How many lines below the title are scanned for an author line.
const AUTHOR_SCAN_LINES: usize = 8;

/// Candidate metadata derived from extracted text. Every field is optional;
/// absence is a typed `None`, and the pipeline degrades gracefully (filename
/// title, empty author list) rather than failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    /// Explicit subject/venue metadata. When present it becomes the paper's
    /// topic; otherwise the top extracted keyword is synthesized into one.
    pub subject: Option<String>,
    pub year: Option<u16>,
    /// Normalized `https://doi.org/...` link.
    pub doi: Option<String>,
    /// Abstract when one was found, else a leading snippet of the text.
    pub snippet: Option<String>,
}

impl CandidateMetadata {
    /// Run the heuristics over an extracted document.
    pub fn resolve(doc: &ExtractedDocument) -> Self {
        let title = doc
            .title_hint
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| title_from_text(&doc.full_text));

        let authors = if doc.author_hints.is_empty() {
            authors_from_text(&doc.full_text, title.as_deref())
        } else {
            doc.author_hints.clone()
        };

        let subject = doc
            .subject_hint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let snippet = abstract_snippet(&doc.full_text)
            .or_else(|| leading_snippet(&doc.full_text));

        Self {
            title,
            authors,
            subject,
            year: year_from_text(&doc.full_text),
            doi: doi_from_text(&doc.full_text),
            snippet,
        }
    }
}

/// First plausible title line: non-empty, not an arXiv banner, within sane
/// length bounds.
fn title_from_text(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(5)
        .find(|line| {
            (4..=300).contains(&line.len())
                && !line.to_lowercase().starts_with("arxiv:")
        })
        .map(str::to_string)
}

fn authors_from_text(text: &str, title: Option<&str>) -> Vec<String> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    // Start scanning just below the title line when we know it.
    if let Some(title) = title {
        for line in lines.by_ref() {
            if line == title {
                break;
            }
        }
    }

    for line in lines.take(AUTHOR_SCAN_LINES) {
        let lower = line.to_lowercase();
        if lower.starts_with("abstract") {
            break;
        }
        if let Some(names) = split_author_line(line) {
            return names;
        }
    }

    Vec::new()
}

/// Split a line into author names if every comma/`and`-separated chunk looks
/// like a personal name (2-4 capitalized words, no digits or addresses).
fn split_author_line(line: &str) -> Option<Vec<String>> {
    if line.len() > 200
        || line.contains('@')
        || line.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }

    let chunks: Vec<&str> = line
        .split([',', ';'])
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if chunks.is_empty() {
        return None;
    }

    let all_names = chunks.iter().all(|chunk| {
        let words: Vec<&str> = chunk.split_whitespace().collect();
        (2..=4).contains(&words.len())
            && words.iter().all(|w| {
                w.chars().next().is_some_and(|c| c.is_uppercase())
            })
    });

    all_names.then(|| chunks.iter().map(|c| c.to_string()).collect())
}

fn abstract_snippet(text: &str) -> Option<String> {
    static ABSTRACT: OnceLock<Regex> = OnceLock::new();
    let re = ABSTRACT.get_or_init(|| {
        Regex::new(r"(?im)^\s*abstract\b[\s:.\-]*").unwrap()
    });

    let m = re.find(text)?;
    let body = text[m.end()..].trim_start();
    if body.is_empty() {
        return None;
    }
    Some(truncate_chars(body, SNIPPET_MAX_CHARS))
}

fn leading_snippet(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, SNIPPET_MAX_CHARS))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn year_from_text(text: &str) -> Option<u16> {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

    // Only trust the front matter; bibliographies are full of years.
    let head = truncate_chars(text, 2000);
    re.find(&head)?.as_str().parse().ok()
}

fn doi_from_text(text: &str) -> Option<String> {
    static DOI: OnceLock<Regex> = OnceLock::new();
    let re = DOI.get_or_init(|| {
        Regex::new(r"(?i)(?:doi:\s*)?\b(10\.\d{4,9}/[-._;()/:a-zA-Z0-9]+)")
            .unwrap()
    });

    let raw = re.captures(text)?.get(1)?.as_str();
    let cleaned = raw.trim_end_matches(['.', ',', ';', ')', '(', ']', '[']);
    Some(format!("https://doi.org/{cleaned}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> ExtractedDocument {
        ExtractedDocument {
            full_text: text.to_string(),
            pages: vec![text.to_string()],
            ..Default::default()
        }
    }

    const SAMPLE: &str = "\
Attention Is All You Need

Ashish Vaswani, Noam Shazeer, Niki Parmar

Abstract
The dominant sequence transduction models are based on complex
recurrent or convolutional neural networks.

Published 2017. doi:10.1000/182.
";

    #[test]
    fn resolves_title_from_first_line() {
        let meta = CandidateMetadata::resolve(&doc(SAMPLE));
        assert_eq!(meta.title.as_deref(), Some("Attention Is All You Need"));
    }

    #[test]
    fn resolves_author_line() {
        let meta = CandidateMetadata::resolve(&doc(SAMPLE));
        assert_eq!(
            meta.authors,
            vec!["Ashish Vaswani", "Noam Shazeer", "Niki Parmar"]
        );
    }

    #[test]
    fn resolves_abstract() {
        let meta = CandidateMetadata::resolve(&doc(SAMPLE));
        let snippet = meta.snippet.unwrap();
        assert!(snippet.starts_with("The dominant sequence"));
    }

    #[test]
    fn resolves_year_and_doi() {
        let meta = CandidateMetadata::resolve(&doc(SAMPLE));
        assert_eq!(meta.year, Some(2017));
        assert_eq!(meta.doi.as_deref(), Some("https://doi.org/10.1000/182"));
    }

    #[test]
    fn doi_trailing_punctuation_stripped() {
        let meta = CandidateMetadata::resolve(&doc(
            "Title line here\n\nSee doi: 10.1234/abc.def, for details",
        ));
        assert_eq!(
            meta.doi.as_deref(),
            Some("https://doi.org/10.1234/abc.def")
        );
    }

    #[test]
    fn hints_take_precedence() {
        let mut d = doc(SAMPLE);
        d.title_hint = Some("Metadata Title".into());
        d.author_hints = vec!["Robinson Fuller".into()];
        d.subject_hint = Some("Machine Translation".into());

        let meta = CandidateMetadata::resolve(&d);
        assert_eq!(meta.title.as_deref(), Some("Metadata Title"));
        assert_eq!(meta.authors, vec!["Robinson Fuller"]);
        assert_eq!(meta.subject.as_deref(), Some("Machine Translation"));
    }

    #[test]
    fn missing_everything_degrades_to_none() {
        let meta = CandidateMetadata::resolve(&doc("x"));
        assert_eq!(meta.title, None);
        assert!(meta.authors.is_empty());
        assert_eq!(meta.doi, None);
        assert_eq!(meta.year, None);
    }

    #[test]
    fn affiliation_line_is_not_authors() {
        let meta = CandidateMetadata::resolve(&doc(
            "A Title Of Substance\n\nDept. of CS, contact@example.edu\n",
        ));
        assert!(meta.authors.is_empty());
    }

    #[test]
    fn snippet_truncated_on_char_boundary() {
        let long = "é".repeat(3000);
        let meta = CandidateMetadata::resolve(&doc(&long));
        assert_eq!(meta.snippet.unwrap().chars().count(), SNIPPET_MAX_CHARS);
    }
}
