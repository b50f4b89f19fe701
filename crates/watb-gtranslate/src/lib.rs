//! Google Translate adapter.
//!
//! Uses the public `translate_a/single` web endpoint (`client=gtx`), the same
//! one the browser widget talks to. No API key involved.

use async_trait::async_trait;

use watb_core::{
    errors::Error,
    langs::LangCode,
    translate::{ProviderReply, TranslateProvider, TranslationRequest},
    Result,
};

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Clone, Debug)]
pub struct GoogleTranslate {
    http: reqwest::Client,
}

impl GoogleTranslate {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        Self { http }
    }
}

impl Default for GoogleTranslate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslateProvider for GoogleTranslate {
    async fn translate(&self, req: &TranslationRequest) -> Result<ProviderReply> {
        // An unforced source means the endpoint detects the language itself.
        let source = match (&req.source, req.force_source) {
            (Some(code), true) => code.as_str().to_string(),
            _ => "auto".to_string(),
        };

        let resp = self
            .http
            .get(ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("dt", "t"),
                ("sl", source.as_str()),
                ("tl", req.target.as_str()),
                ("q", req.text.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Provider(format!("translate request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "translate failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Provider(format!("translate json error: {e}")))?;

        parse_reply(&v)
    }
}

/// Response layout: `[[["<chunk>","<original>",...],...],null,"<detected>",...]`.
fn parse_reply(v: &serde_json::Value) -> Result<ProviderReply> {
    let sentences = v
        .get(0)
        .and_then(|s| s.as_array())
        .ok_or_else(|| Error::Provider("translate response has no sentence list".to_string()))?;

    let mut text = String::new();
    for sentence in sentences {
        if let Some(chunk) = sentence.get(0).and_then(|c| c.as_str()) {
            text.push_str(chunk);
        }
    }

    if text.trim().is_empty() {
        return Err(Error::Provider("translate returned empty text".to_string()));
    }

    let detected = v.get(2).and_then(|d| d.as_str()).ok_or_else(|| {
        Error::Provider("translate response has no detected language".to_string())
    })?;

    Ok(ProviderReply {
        text,
        detected_source: LangCode::new(detected),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_a_multi_sentence_response() {
        let v = json!([
            [
                ["Halo dunia. ", "Hello world. ", null, null, 10],
                ["Apa kabar?", "How are you?", null, null, 10]
            ],
            null,
            "en"
        ]);

        let reply = parse_reply(&v).unwrap();
        assert_eq!(reply.text, "Halo dunia. Apa kabar?");
        assert_eq!(reply.detected_source, LangCode::new("en"));
    }

    #[test]
    fn normalizes_the_detected_language_code() {
        let v = json!([[["你好", "hello", null, null, 10]], null, "zh-cn"]);
        let reply = parse_reply(&v).unwrap();
        assert_eq!(reply.detected_source, LangCode::new("zh-CN"));
    }

    #[test]
    fn rejects_a_response_without_sentences() {
        let v = json!({ "error": "quota" });
        assert!(parse_reply(&v).is_err());
    }

    #[test]
    fn rejects_empty_translations() {
        let v = json!([[["", "", null, null, 10]], null, "en"]);
        assert!(parse_reply(&v).is_err());
    }

    #[test]
    fn rejects_a_response_without_a_detected_language() {
        let v = json!([[["Halo", "Hello", null, null, 10]], null, null]);
        assert!(parse_reply(&v).is_err());
    }
}
