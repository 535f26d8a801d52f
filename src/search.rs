//! Substring index over entry names and paths with tf-idf style ranking.

use log::debug;

use crate::fs::Entry;

struct Document {
    entry: Entry,
    tokens: Vec<String>,
}

pub struct SearchIndex {
    documents: Vec<Document>,
}

impl SearchIndex {
    /// Returns `None` for an empty listing, which searches as "no index".
    pub fn build(entries: &[Entry]) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let documents: Vec<Document> = entries
            .iter()
            .map(|entry| {
                let mut tokens = tokenize(&entry.name);
                tokens.extend(tokenize(&entry.path));
                Document {
                    entry: entry.clone(),
                    tokens,
                }
            })
            .collect();
        debug!("search index built for {} entries", documents.len());
        Some(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Ranked matches, or `None` when the query is blank.
    ///
    /// Every query token must occur inside some token of the entry's name or path.
    pub fn search(&self, query: &str) -> Option<Vec<Entry>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        let terms = tokenize(trimmed);
        if terms.is_empty() {
            return Some(Vec::new());
        }

        let total = self.documents.len() as f64;
        let frequencies: Vec<Vec<usize>> = terms
            .iter()
            .map(|term| {
                self.documents
                    .iter()
                    .map(|doc| doc.tokens.iter().filter(|t| t.contains(term.as_str())).count())
                    .collect()
            })
            .collect();
        let idf: Vec<f64> = frequencies
            .iter()
            .map(|per_doc| {
                let df = per_doc.iter().filter(|&&tf| tf > 0).count() as f64;
                1.0 + (total / (1.0 + df)).ln()
            })
            .collect();

        let mut scored: Vec<(usize, f64)> = (0..self.documents.len())
            .filter(|&doc| frequencies.iter().all(|per_doc| per_doc[doc] > 0))
            .map(|doc| {
                let score = frequencies
                    .iter()
                    .zip(&idf)
                    .map(|(per_doc, idf)| per_doc[doc] as f64 * idf)
                    .sum();
                (doc, score)
            })
            .collect();
        scored.sort_by(|lhs, rhs| rhs.1.total_cmp(&lhs.1));

        debug!("search query={trimmed:?} results={}", scored.len());
        Some(
            scored
                .into_iter()
                .map(|(doc, _)| self.documents[doc].entry.clone())
                .collect(),
        )
    }
}

/// Lowercased runs of alphanumerics, `-`, and `'`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '-' || ch == '\''))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{dir, file};

    fn index() -> SearchIndex {
        SearchIndex::build(&[
            dir("/repo/src", "/repo"),
            file("/repo/src/main.rs", "/repo/src"),
            file("/repo/src/session.rs", "/repo/src"),
            file("/repo/README.md", "/repo"),
            file("/repo/docs/Main-Guide.md", "/repo/docs"),
        ])
        .expect("non-empty index")
    }

    fn paths(results: &[Entry]) -> Vec<&str> {
        results.iter().map(|entry| entry.path.as_str()).collect()
    }

    #[test]
    fn blank_query_returns_none() {
        assert!(index().search("").is_none());
        assert!(index().search("   ").is_none());
    }

    #[test]
    fn empty_listing_has_no_index() {
        assert!(SearchIndex::build(&[]).is_none());
    }

    #[test]
    fn substring_matches_anywhere_case_insensitively() {
        let results = index().search("SSIO").expect("results");
        assert_eq!(paths(&results), vec!["/repo/src/session.rs"]);

        let results = index().search("main").expect("results");
        let mut found = paths(&results);
        found.sort();
        assert_eq!(found, vec!["/repo/docs/Main-Guide.md", "/repo/src/main.rs"]);
    }

    #[test]
    fn every_query_token_must_match() {
        let results = index().search("main.rs").expect("results");
        assert_eq!(paths(&results), vec!["/repo/src/main.rs"]);
        assert!(index().search("main zzz").expect("results").is_empty());
    }

    #[test]
    fn entries_matching_more_tokens_rank_higher() {
        // "src" hits both name and path tokens of the directory itself.
        let results = index().search("src").expect("results");
        assert_eq!(results[0].path, "/repo/src");
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn tokenizer_splits_on_separators() {
        assert_eq!(
            tokenize("/a/B_c.d-e's"),
            vec!["a".to_string(), "b".to_string(), "c".to_string(), "d-e's".to_string()]
        );
    }
}
