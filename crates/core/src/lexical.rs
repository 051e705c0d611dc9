//! BM25 Okapi retriever over an in-memory record list.

use crate::traits::Retriever;
use crate::{Record, SearchError};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Literal pattern; compiling it cannot fail.
    PATTERN.get_or_init(|| Regex::new(r"\w+").expect("valid regex"))
}

/// Lowercased Unicode word runs; Vietnamese diacritics stay inside their word.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|found| found.as_str().to_string())
        .collect()
}

pub struct LexicalRetriever {
    records: Vec<Record>,
    term_frequencies: Vec<HashMap<String, u32>>,
    document_frequencies: HashMap<String, u32>,
    doc_lengths: Vec<usize>,
    average_length: f64,
    k: usize,
}

impl LexicalRetriever {
    pub fn from_records(records: Vec<Record>, k: usize) -> Self {
        let mut term_frequencies = Vec::with_capacity(records.len());
        let mut document_frequencies: HashMap<String, u32> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(records.len());

        for record in &records {
            let tokens = tokenize(&record.content);
            doc_lengths.push(tokens.len());

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0) += 1;
            }
            for term in frequencies.keys() {
                *document_frequencies.entry(term.clone()).or_insert(0) += 1;
            }
            term_frequencies.push(frequencies);
        }

        let average_length = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<usize>() as f64 / doc_lengths.len() as f64
        };

        Self {
            records,
            term_frequencies,
            document_frequencies,
            doc_lengths,
            average_length,
            k,
        }
    }

    /// One BM25 score per record, in corpus order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_terms = tokenize(query);
        let n = self.records.len() as f64;

        self.term_frequencies
            .iter()
            .zip(&self.doc_lengths)
            .map(|(frequencies, length)| {
                query_terms
                    .iter()
                    .filter_map(|term| {
                        let tf = f64::from(*frequencies.get(term)?);
                        let df = f64::from(self.document_frequencies.get(term).copied().unwrap_or(0));
                        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                        let norm = if self.average_length > 0.0 {
                            *length as f64 / self.average_length
                        } else {
                            0.0
                        };
                        Some(idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm)))
                    })
                    .sum()
            })
            .collect()
    }

    /// The `k` best records; records with equal scores keep corpus order.
    pub fn top(&self, query: &str) -> Vec<Record> {
        let scores = self.scores(query);
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|left, right| scores[*right].total_cmp(&scores[*left]));

        order
            .into_iter()
            .take(self.k)
            .map(|index| self.records[index].clone())
            .collect()
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Record>, SearchError> {
        Ok(self.top(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Record> {
        vec![
            Record::new("Bệnh tiểu đường gây khát nước"),
            Record::new("Cúm gây sốt, ho và đau họng"),
            Record::new("Sốt xuất huyết gây sốt cao và phát ban"),
            Record::new("Tăng huyết áp thường không có triệu chứng"),
        ]
    }

    #[test]
    fn tokenizer_keeps_vietnamese_words_whole() {
        assert_eq!(tokenize("Triệu chứng CÚM là gì?"), vec!["triệu", "chứng", "cúm", "là", "gì"]);
    }

    #[test]
    fn matching_records_rank_first() {
        let retriever = LexicalRetriever::from_records(corpus(), 2);
        let hits = retriever.top("sốt cao");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "Sốt xuất huyết gây sốt cao và phát ban");
        assert_eq!(hits[1].content, "Cúm gây sốt, ho và đau họng");
    }

    #[test]
    fn unmatched_query_returns_corpus_order() {
        let retriever = LexicalRetriever::from_records(corpus(), 3);
        let hits = retriever.top("xyz");
        let contents: Vec<_> = hits.iter().map(|record| record.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Bệnh tiểu đường gây khát nước",
                "Cúm gây sốt, ho và đau họng",
                "Sốt xuất huyết gây sốt cao và phát ban",
            ]
        );
    }

    #[test]
    fn result_never_exceeds_corpus() {
        let retriever = LexicalRetriever::from_records(vec![Record::new("only one")], 4);
        assert_eq!(retriever.top("one").len(), 1);
        assert!(LexicalRetriever::from_records(Vec::new(), 4).top("one").is_empty());
    }

    #[test]
    fn scores_are_non_negative() {
        let retriever = LexicalRetriever::from_records(corpus(), 4);
        assert!(retriever.scores("gây sốt").iter().all(|score| *score >= 0.0));
    }
}
