mod deepl;
mod languages;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use crate::error::PipelineError;

pub use deepl::{DeepL, resolve_key};
pub use languages::{is_supported_source, is_supported_target, normalize_lang};

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

/// A remote or local service turning texts into the target language.
/// Implementations return exactly one translation per input, in order.
pub trait Translate: Send + Sync {
    fn translate<'a>(&'a self, texts: Vec<String>, target_lang: &'a str) -> TranslateFuture<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub original: String,
    pub translated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub target_lang: String,
    pub entries: Vec<TranslationEntry>,
}

impl TranslationResult {
    pub fn get(&self, original: &str) -> Option<&str> {
        let original = original.trim();
        self.entries
            .iter()
            .find(|entry| entry.original == original)
            .map(|entry| entry.translated.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validates the input, sends every distinct text once and maps the answers
/// back onto the input order.
pub async fn translate_texts(
    translator: &dyn Translate,
    texts: &[String],
    target_lang: &str,
) -> Result<TranslationResult> {
    let target_lang = normalize_lang(target_lang);
    if !is_supported_target(&target_lang) {
        return Err(PipelineError::UnsupportedLanguage(target_lang).into());
    }

    let mut originals = Vec::with_capacity(texts.len());
    for (index, text) in texts.iter().enumerate() {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyText { index }.into());
        }
        originals.push(text.to_string());
    }

    let mut unique: Vec<String> = Vec::new();
    for text in &originals {
        if !unique.contains(text) {
            unique.push(text.clone());
        }
    }
    if unique.is_empty() {
        return Ok(TranslationResult {
            target_lang,
            entries: Vec::new(),
        });
    }
    if unique.len() < originals.len() {
        debug!(
            "sending {} distinct text(s) out of {}",
            unique.len(),
            originals.len()
        );
    }

    let translated = translator.translate(unique.clone(), &target_lang).await?;
    if translated.len() != unique.len() {
        return Err(PipelineError::Translation(format!(
            "expected {} translation(s), got {}",
            unique.len(),
            translated.len()
        ))
        .into());
    }

    let entries = originals
        .into_iter()
        .map(|original| {
            let slot = unique
                .iter()
                .position(|candidate| *candidate == original)
                .unwrap_or_default();
            TranslationEntry {
                translated: translated[slot].clone(),
                original,
            }
        })
        .collect::<Vec<_>>();
    info!("translated {} text(s) to {}", entries.len(), target_lang);
    Ok(TranslationResult {
        target_lang,
        entries,
    })
}
