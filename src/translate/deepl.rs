use anyhow::{Result, anyhow};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;
use crate::settings::TranslateSettings;

use super::languages::{is_supported_source, normalize_lang};
use super::{Translate, TranslateFuture};

const FREE_BASE_URL: &str = "https://api-free.deepl.com";
const PRO_BASE_URL: &str = "https://api.deepl.com";
const QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug, Clone)]
pub struct DeepL {
    key: String,
    base_url: String,
    source_lang: Option<String>,
    client: reqwest::Client,
}

impl DeepL {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            base_url: default_base_url(&key),
            key,
            source_lang: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_source_lang(mut self, lang: Option<&str>) -> Result<Self> {
        self.source_lang = match lang.map(normalize_lang).filter(|lang| !lang.is_empty()) {
            Some(lang) if !is_supported_source(&lang) => {
                return Err(PipelineError::UnsupportedLanguage(lang).into());
            }
            other => other,
        };
        Ok(self)
    }

    pub fn from_settings(settings: &TranslateSettings, override_key: Option<&str>) -> Result<Self> {
        let key = resolve_key(override_key, &settings.api_key_env)?;
        let mut client = DeepL::new(key);
        if let Some(url) = settings.base_url.as_deref() {
            client = client.with_base_url(url);
        }
        client.with_source_lang(settings.source_lang.as_deref())
    }

    fn request<'a>(&'a self, texts: &'a [String], target_lang: &'a str) -> DeepLRequest<'a> {
        DeepLRequest {
            text: texts,
            target_lang,
            source_lang: self.source_lang.as_deref(),
        }
    }
}

impl Translate for DeepL {
    fn translate<'a>(&'a self, texts: Vec<String>, target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(async move {
            let url = format!("{}/v2/translate", self.base_url);
            debug!("POST {} ({} text(s))", url, texts.len());
            let response = self
                .client
                .post(&url)
                .header(AUTHORIZATION, format!("DeepL-Auth-Key {}", self.key))
                .json(&self.request(&texts, target_lang))
                .send()
                .await
                .map_err(|err| PipelineError::Translation(format!("request failed: {}", err)))?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(map_error(status.as_u16(), &body, target_lang).into());
            }
            parse_response(&body)
        })
    }
}

/// `--key` wins over the environment variable named in the settings.
pub fn resolve_key(override_key: Option<&str>, env_name: &str) -> Result<String> {
    if let Some(key) = override_key.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }
    std::env::var(env_name)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("DeepL API key not found (set {} or pass --key)", env_name))
}

fn default_base_url(key: &str) -> String {
    if let Ok(url) = std::env::var("DEEPL_BASE_URL") {
        if !url.trim().is_empty() {
            return url.trim().trim_end_matches('/').to_string();
        }
    }
    if key.ends_with(":fx") {
        FREE_BASE_URL.to_string()
    } else {
        PRO_BASE_URL.to_string()
    }
}

#[derive(Debug, Serialize)]
struct DeepLRequest<'a> {
    text: &'a [String],
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}

fn parse_response(body: &str) -> Result<Vec<String>> {
    let parsed: DeepLResponse = serde_json::from_str(body)
        .map_err(|err| PipelineError::Translation(format!("invalid DeepL response: {}", err)))?;
    Ok(parsed
        .translations
        .into_iter()
        .map(|translation| {
            if let Some(lang) = translation.detected_source_language.as_deref() {
                debug!("detected source language {}", lang);
            }
            translation.text
        })
        .collect())
}

fn map_error(status: u16, body: &str, target_lang: &str) -> PipelineError {
    let message = extract_deepl_error(body).unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => PipelineError::Auth { status },
        QUOTA_EXCEEDED => PipelineError::Translation("DeepL quota exceeded".to_string()),
        400 if message.to_ascii_lowercase().contains("target_lang") => {
            PipelineError::UnsupportedLanguage(target_lang.to_string())
        }
        _ => PipelineError::Translation(format!("DeepL API error ({}): {}", status, message)),
    }
}

fn extract_deepl_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        detail: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let mut parts = Vec::new();
    for part in [parsed.message, parsed.detail].into_iter().flatten() {
        if !part.trim().is_empty() {
            parts.push(part);
        }
    }
    (!parts.is_empty()).then(|| parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    #[test]
    fn request_body_snapshot() {
        let client = DeepL::new("secret:fx")
            .with_source_lang(Some("es"))
            .expect("source");
        let texts = vec!["¡Hola".to_string(), "amigo!".to_string()];
        assert_json_snapshot!(client.request(&texts, "EN-US"), @r#"
        {
          "text": [
            "¡Hola",
            "amigo!"
          ],
          "target_lang": "EN-US",
          "source_lang": "ES"
        }
        "#);
    }

    #[test]
    fn source_lang_is_omitted_when_unset() {
        let client = DeepL::new("secret");
        let texts = vec!["hola".to_string()];
        let body = serde_json::to_value(client.request(&texts, "DE")).expect("json");
        assert!(body.get("source_lang").is_none());
    }

    #[test]
    fn free_keys_use_free_endpoint() {
        if std::env::var("DEEPL_BASE_URL").is_ok() {
            return;
        }
        assert_eq!(DeepL::new("abc:fx").base_url, FREE_BASE_URL);
        assert_eq!(DeepL::new("abc").base_url, PRO_BASE_URL);
        assert_eq!(
            DeepL::new("abc").with_base_url("http://localhost:8080/").base_url,
            "http://localhost:8080"
        );
    }

    #[test]
    fn unsupported_source_lang_is_rejected() {
        let err = DeepL::new("abc").with_source_lang(Some("EN-US")).expect_err("source");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn parses_translations_in_order() {
        let body = r#"{"translations":[{"detected_source_language":"ES","text":"Hello"},{"text":"friend!"}]}"#;
        assert_eq!(parse_response(body).expect("parse"), vec!["Hello", "friend!"]);
        assert!(parse_response("<html>").is_err());
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(
            map_error(403, r#"{"message":"Wrong key"}"#, "DE"),
            PipelineError::Auth { status: 403 }
        ));
        assert!(matches!(
            map_error(456, "", "DE"),
            PipelineError::Translation(message) if message.contains("quota")
        ));
        assert!(matches!(
            map_error(400, r#"{"message":"Value for 'target_lang' not supported."}"#, "XX"),
            PipelineError::UnsupportedLanguage(lang) if lang == "XX"
        ));
        let other = map_error(500, r#"{"message":"Internal error"}"#, "DE");
        assert_eq!(
            other.to_string(),
            "translation failed: DeepL API error (500): Internal error"
        );
    }

    #[test]
    fn explicit_key_wins() {
        assert_eq!(
            resolve_key(Some(" k:fx "), "BUBBLE_TRANSLATOR_TEST_UNSET").expect("key"),
            "k:fx"
        );
        assert!(resolve_key(None, "BUBBLE_TRANSLATOR_TEST_UNSET").is_err());
    }
}
