use std::collections::HashMap;

/// Default number of keywords retained per paper.
pub const DEFAULT_MAX_KEYWORDS: usize = 5;

/// Produces a ranked `(term, weight)` list from document text. The concrete
/// model behind this is opaque to the pipeline; weights are descending and
/// normalized so the top term has weight 1.0.
pub trait KeywordExtractor: Send + Sync {
    fn extract_keywords(&self, text: &str, max_k: usize) -> Vec<(String, f64)>;
}

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as",
    "at", "based", "be", "been", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "each", "for", "from", "had", "has",
    "have", "how", "however", "if", "in", "into", "is", "it", "its", "may",
    "more", "most", "no", "not", "of", "on", "one", "only", "or", "other",
    "our", "over", "paper", "propose", "proposed", "results", "show",
    "shown", "some", "such", "than", "that", "the", "their", "these",
    "this", "those", "through", "to", "two", "under", "use", "used",
    "using", "was", "we", "were", "when", "where", "which", "while",
    "will", "with", "within", "would",
];

/// Stopword-filtered term-frequency extraction. Deterministic: ties in
/// frequency break by term ascending, so repeated runs over identical text
/// always rank identically.
#[derive(Debug, Default)]
pub struct TermFrequencyExtractor;

impl TermFrequencyExtractor {
    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric() && c != '-')
            .map(|token| token.trim_matches('-').to_lowercase())
            .filter(|token| {
                token.len() >= 3
                    && token.chars().any(|c| c.is_alphabetic())
                    && !STOPWORDS.contains(&token.as_str())
            })
    }
}

impl KeywordExtractor for TermFrequencyExtractor {
    fn extract_keywords(&self, text: &str, max_k: usize) -> Vec<(String, f64)> {
        if max_k == 0 {
            return Vec::new();
        }

        let mut counts: HashMap<String, u64> = HashMap::new();
        for token in Self::tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_k);

        let max_count = match ranked.first() {
            Some((_, count)) => *count as f64,
            None => return Vec::new(),
        };

        ranked
            .into_iter()
            .map(|(term, count)| (term, count as f64 / max_count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_frequency() {
        let text = "graph graph graph embedding embedding retrieval";
        let keywords =
            TermFrequencyExtractor.extract_keywords(text, DEFAULT_MAX_KEYWORDS);

        assert_eq!(keywords[0].0, "graph");
        assert_eq!(keywords[0].1, 1.0);
        assert_eq!(keywords[1].0, "embedding");
        assert!(keywords[1].1 < 1.0);
    }

    #[test]
    fn filters_stopwords_and_short_tokens() {
        let text = "the of and we is at neural networks";
        let keywords = TermFrequencyExtractor.extract_keywords(text, 10);
        let terms: Vec<&str> =
            keywords.iter().map(|(t, _)| t.as_str()).collect();

        assert_eq!(terms, vec!["networks", "neural"]);
    }

    #[test]
    fn ties_break_alphabetically() {
        let text = "zebra alpha zebra alpha";
        let keywords = TermFrequencyExtractor.extract_keywords(text, 2);
        assert_eq!(keywords[0].0, "alpha");
        assert_eq!(keywords[1].0, "zebra");
    }

    #[test]
    fn respects_max_k() {
        let text = "one-shot two-shot three-shot four-shot five-shot six-shot";
        let keywords = TermFrequencyExtractor.extract_keywords(text, 3);
        assert_eq!(keywords.len(), 3);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(TermFrequencyExtractor.extract_keywords("", 5).is_empty());
        assert!(TermFrequencyExtractor
            .extract_keywords("a an the", 5)
            .is_empty());
    }

    #[test]
    fn hyphenated_terms_survive() {
        let text = "state-of-the-art state-of-the-art baseline";
        let keywords = TermFrequencyExtractor.extract_keywords(text, 5);
        assert_eq!(keywords[0].0, "state-of-the-art");
    }
}
