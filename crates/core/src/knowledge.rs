//! Knowledge corpus and lexical retriever.
//!
//! The corpus is a line-delimited JSON file of scraped site content,
//! loaded once at startup and immutable afterwards. Retrieval is plain
//! length-normalized token overlap; answers built from it quote the
//! matched paragraph instead of paraphrasing, and a confidence gate lets
//! callers decline to answer rather than stretch a weak match.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub usize);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// One paragraph of corpus content, with its source page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: DocumentId,
    pub url: String,
    pub title: String,
    pub paragraph: String,
}

#[derive(Debug, Deserialize)]
struct CorpusRecord {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Lines shorter than this are usually navigation crumbs; they are kept
/// only when they mention one of the house's signature terms.
const MIN_PARAGRAPH_CHARS: usize = 40;

const IMPORTANT_TERMS: &[&str] =
    &["jahanje", "ponij", "bunka", "marmelad", "salama", "klobasa", "liker"];

/// Stopwords stripped from queries and documents, Slovene plus the
/// English fillers that show up in mixed-language messages.
const STOPWORDS: &[&str] = &[
    "ali", "bi", "biti", "bo", "da", "do", "ga", "iz", "je", "jih", "jo", "kaj", "kako",
    "kdaj", "kdo", "ker", "kje", "kot", "koliko", "lahko", "mi", "moj", "moja", "moje",
    "na", "naj", "nas", "ne", "ni", "niso", "npr", "ob", "od", "pa", "pri", "se", "sem",
    "smo", "so", "ste", "te", "ta", "ti", "to", "tudi", "vam", "vas", "vi", "za",
    "and", "are", "for", "the", "you", "your", "what", "when", "where", "how",
];

pub struct KnowledgeStore {
    documents: Vec<KnowledgeDocument>,
    paragraph_tokens: Vec<BTreeSet<String>>,
    title_tokens: Vec<BTreeSet<String>>,
}

impl KnowledgeStore {
    pub fn empty() -> Self {
        Self { documents: Vec::new(), paragraph_tokens: Vec::new(), title_tokens: Vec::new() }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_jsonl(&raw))
    }

    /// Parse a line-delimited corpus. Malformed or empty lines are
    /// skipped, not fatal; the assistant can run on a partial corpus.
    pub fn from_jsonl(raw: &str) -> Self {
        let mut store = Self::empty();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(record) = serde_json::from_str::<CorpusRecord>(line) else {
                continue;
            };
            if record.url.is_empty() && record.title.is_empty() && record.content.is_empty() {
                continue;
            }
            for paragraph in split_paragraphs(&record.content) {
                let id = DocumentId(store.documents.len());
                store.paragraph_tokens.push(tokenize(&paragraph));
                store.title_tokens.push(tokenize(&record.title));
                store.documents.push(KnowledgeDocument {
                    id,
                    url: record.url.clone(),
                    title: record.title.clone(),
                    paragraph,
                });
            }
        }
        store
    }

    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.documents
    }

    pub fn get(&self, id: DocumentId) -> Option<&KnowledgeDocument> {
        self.documents.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn split_paragraphs(content: &str) -> Vec<String> {
    content
        .replace("\r\n", "\n")
        .split('\n')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .filter(|chunk| {
            chunk.chars().count() >= MIN_PARAGRAPH_CHARS || {
                let lowered = chunk.to_lowercase();
                IMPORTANT_TERMS.iter().any(|term| lowered.contains(term))
            }
        })
        .map(str::to_string)
        .collect()
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| token.chars().count() >= 3)
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Ephemeral retrieval hit; never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub id: DocumentId,
    pub score: f32,
}

pub struct Retriever {
    min_confidence: f32,
}

impl Default for Retriever {
    fn default() -> Self {
        Self { min_confidence: 0.2 }
    }
}

impl Retriever {
    pub fn with_min_confidence(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// Rank documents by length-normalized token overlap with the query:
    /// `(|paragraph ∩ query| + 0.5 * |title ∩ query|) / |query|`.
    /// Zero-overlap documents are excluded entirely, so a query sharing
    /// no token with the corpus returns an empty list. Ties keep corpus
    /// insertion order.
    pub fn retrieve(&self, store: &KnowledgeStore, query: &str, k: usize) -> Vec<ScoredDocument> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredDocument> = store
            .documents
            .iter()
            .map(|doc| {
                let paragraph_overlap =
                    overlap_count(&query_tokens, &store.paragraph_tokens[doc.id.0]);
                let title_overlap = overlap_count(&query_tokens, &store.title_tokens[doc.id.0]);
                let raw = paragraph_overlap as f32 + 0.5 * title_overlap as f32;
                ScoredDocument { id: doc.id, score: raw / query_tokens.len().max(1) as f32 }
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Retrieval with the grounding gate applied: hits below the
    /// confidence threshold or failing the overlap sanity rule are
    /// dropped. An empty result here means "decline to answer".
    pub fn retrieve_confident(
        &self,
        store: &KnowledgeStore,
        query: &str,
        k: usize,
    ) -> Vec<ScoredDocument> {
        let query_tokens = tokenize(query);
        self.retrieve(store, query, k)
            .into_iter()
            .filter(|hit| hit.score >= self.min_confidence)
            .filter(|hit| overlap_is_plausible(&query_tokens, &store.paragraph_tokens[hit.id.0]))
            .collect()
    }
}

fn overlap_count(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

/// Guard against single-token coincidences: long queries must share at
/// least two meaningful tokens and a quarter of their vocabulary; short
/// queries get by with two tokens or half of theirs.
fn overlap_is_plausible(query_tokens: &BTreeSet<String>, doc_tokens: &BTreeSet<String>) -> bool {
    if query_tokens.is_empty() {
        return true;
    }
    let overlap = overlap_count(query_tokens, doc_tokens);
    let ratio = overlap as f32 / query_tokens.len() as f32;
    if query_tokens.len() >= 6 {
        overlap >= 2 && ratio >= 0.25
    } else {
        overlap >= 2 || ratio >= 0.5
    }
}

/// Deterministic answer synthesis: quote the paragraph, trimmed at a
/// sentence boundary, with the source page appended. No model call.
pub fn snippet(document: &KnowledgeDocument) -> String {
    let mut text = document.paragraph.trim().to_string();
    if text.chars().count() > 500 {
        let clipped: String = text.chars().take(500).collect();
        text = match clipped.rfind(". ") {
            Some(boundary) => format!("{}.", &clipped[..boundary]),
            None => clipped,
        };
    }
    if document.url.is_empty() {
        text
    } else {
        format!("{text}\n\nVeč: {}", document.url)
    }
}

#[cfg(test)]
mod tests {
    use super::{snippet, DocumentId, KnowledgeStore, Retriever};

    fn corpus() -> KnowledgeStore {
        let raw = concat!(
            r#"{"url":"https://example.si/sobe","title":"Sobe in nočitve","content":"Gostje prenočijo v štirih klimatiziranih sobah s pogledom na Pohorje. Zajtrk iz domačih sestavin je vštet v ceno nočitve."}"#,
            "\n",
            r#"{"url":"https://example.si/izdelki","title":"Domači izdelki","content":"V domači trgovini ponujamo suhe salame, pohorsko bunko in borovničev liker.\nkratka vrstica"}"#,
            "\n",
            "not json at all\n",
            r#"{"url":"https://example.si/zivali","title":"Živali na kmetiji","content":"Na kmetiji živijo konji, zajci in kokoši. Jahanje ponija je za otroke možno ob spremstvu."}"#,
        );
        KnowledgeStore::from_jsonl(raw)
    }

    #[test]
    fn malformed_and_short_lines_are_skipped() {
        let store = corpus();
        // Three records survive; the bare "kratka vrstica" line does not.
        assert_eq!(store.len(), 3);
        assert!(store
            .documents()
            .iter()
            .all(|doc| !doc.paragraph.contains("kratka vrstica")));
    }

    #[test]
    fn short_lines_with_signature_terms_survive() {
        let store = KnowledgeStore::from_jsonl(
            r#"{"url":"","title":"Trgovina","content":"bunka in salama"}"#,
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn query_ranks_matching_paragraph_first() {
        let store = corpus();
        let retriever = Retriever::default();

        let hits = retriever.retrieve(&store, "ali je zajtrk vštet v ceno nočitve", 3);
        assert!(!hits.is_empty());
        let top = store.get(hits[0].id).expect("document");
        assert!(top.paragraph.contains("sobah"));
    }

    #[test]
    fn zero_overlap_query_returns_empty() {
        let store = corpus();
        let retriever = Retriever::default();

        let hits = retriever.retrieve(&store, "kvantna kromodinamika", 3);
        assert!(hits.is_empty());
    }

    #[test]
    fn results_are_truncated_to_k() {
        let store = corpus();
        let retriever = Retriever::default();

        let hits = retriever.retrieve(&store, "domači izdelki salame in liker s kmetije", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn weak_single_token_match_fails_the_grounding_gate() {
        let store = corpus();
        let retriever = Retriever::default();

        // "konji" appears in the corpus, but nothing else in this long
        // query does; the gate must reject the match.
        let hits = retriever.retrieve_confident(
            &store,
            "zanima me zgodovina tekmovalnih konji dirk v avstriji prosim",
            3,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn confident_match_passes_the_gate() {
        let store = corpus();
        let retriever = Retriever::default();

        let hits = retriever.retrieve_confident(&store, "jahanje ponija za otroke", 3);
        assert!(!hits.is_empty());
        let top = store.get(hits[0].id).expect("document");
        assert!(top.paragraph.contains("ponija"));
    }

    #[test]
    fn snippet_carries_source_url() {
        let store = corpus();
        let doc = store.get(DocumentId(0)).expect("document");
        let text = snippet(doc);
        assert!(text.contains("Več: https://example.si/sobe"));
    }

    #[test]
    fn long_paragraphs_are_trimmed_at_a_sentence() {
        let long_sentence = "Beseda domačija se ponavlja v tem dolgem opisu. ".repeat(20);
        let raw = format!(r#"{{"url":"","title":"Opis","content":"{long_sentence}"}}"#);
        let store = KnowledgeStore::from_jsonl(&raw);
        let doc = store.get(DocumentId(0)).expect("document");
        let text = snippet(doc);
        assert!(text.chars().count() <= 501);
        assert!(text.ends_with('.'));
    }
}
