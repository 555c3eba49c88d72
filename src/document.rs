//! The loaded document: paragraphs plus the flattened sentence list derived
//! from them.

use crate::extract::PageFragments;
use crate::reconstruct::TextReconstructor;
use crate::text_utils::split_sentences;
use serde::Serialize;

/// Paragraphs and sentences are only ever replaced together, so
/// `sentences` always equals the in-order split of `paragraphs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentModel {
    paragraphs: Vec<String>,
    sentences: Vec<String>,
    sentence_paragraph: Vec<usize>,
}

/// One paragraph as a renderer sees it: each sentence with its global index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphLayout {
    pub paragraph: usize,
    pub sentences: Vec<(usize, String)>,
}

impl DocumentModel {
    pub fn new(paragraphs: Vec<String>) -> Self {
        let mut model = Self::default();
        model.replace_paragraphs(paragraphs);
        model
    }

    pub fn from_pages(pages: &[PageFragments], reconstructor: &TextReconstructor) -> Self {
        Self::new(reconstructor.reconstruct(pages))
    }

    /// Swap in a new paragraph list. Sentences are computed before anything
    /// is replaced.
    pub fn replace_paragraphs(&mut self, paragraphs: Vec<String>) {
        let mut sentences = Vec::new();
        let mut sentence_paragraph = Vec::new();
        for (idx, paragraph) in paragraphs.iter().enumerate() {
            for sentence in split_sentences(paragraph) {
                sentences.push(sentence);
                sentence_paragraph.push(idx);
            }
        }

        self.paragraphs = paragraphs;
        self.sentences = sentences;
        self.sentence_paragraph = sentence_paragraph;
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn paragraph_of(&self, sentence: usize) -> Option<usize> {
        self.sentence_paragraph.get(sentence).copied()
    }

    /// Paragraphs joined by blank lines, the form an edit buffer starts from.
    pub fn joined_text(&self) -> String {
        self.paragraphs.join("\n\n")
    }

    pub fn layout(&self) -> Vec<ParagraphLayout> {
        let mut layout: Vec<ParagraphLayout> = (0..self.paragraphs.len())
            .map(|paragraph| ParagraphLayout {
                paragraph,
                sentences: Vec::new(),
            })
            .collect();
        for (idx, (sentence, paragraph)) in self
            .sentences
            .iter()
            .zip(&self.sentence_paragraph)
            .enumerate()
        {
            if let Some(entry) = layout.get_mut(*paragraph) {
                entry.sentences.push((idx, sentence.clone()));
            }
        }
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_utils::sentences_for;

    #[test]
    fn sentences_track_paragraphs() {
        let doc = DocumentModel::new(vec![
            "One. Two.".to_string(),
            "Three".to_string(),
        ]);
        assert_eq!(doc.sentences(), ["One.", "Two.", "Three"]);
        assert_eq!(doc.paragraph_of(1), Some(0));
        assert_eq!(doc.paragraph_of(2), Some(1));
        assert_eq!(doc.paragraph_of(3), None);
    }

    #[test]
    fn replacing_paragraphs_recomputes_sentences() {
        let mut doc = DocumentModel::new(vec!["Old text.".to_string()]);
        doc.replace_paragraphs(vec!["New. Words!".to_string()]);
        assert_eq!(doc.paragraphs(), ["New. Words!"]);
        assert_eq!(doc.sentences(), sentences_for(doc.paragraphs()).as_slice());
    }

    #[test]
    fn layout_carries_global_sentence_indices() {
        let doc = DocumentModel::new(vec!["A. B.".to_string(), "C.".to_string()]);
        let layout = doc.layout();
        assert_eq!(layout.len(), 2);
        assert_eq!(
            layout[0].sentences,
            vec![(0, "A.".to_string()), (1, "B.".to_string())]
        );
        assert_eq!(layout[1].sentences, vec![(2, "C.".to_string())]);
    }

    #[test]
    fn empty_document_has_no_sentences() {
        let doc = DocumentModel::default();
        assert!(doc.is_empty());
        assert!(doc.layout().is_empty());
        assert_eq!(doc.joined_text(), "");
    }
}
