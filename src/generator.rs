// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answer generation.
//!
//! Two backends. `Hosted` sends one chat-completion request with a context
//! window built from the top retrieved documents. `Template` classifies the
//! question by surface pattern and interpolates the best document's content.
//! Every hosted failure demotes to the template path for that call, so
//! generation never raises to the caller.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::{GenerationBackendKind, RagConfig};
use crate::errors::{RagError, Result};
use crate::retriever::ScoredDocument;

const NO_INFO_ANSWER: &str =
    "抱歉，我在知識庫中找不到相關資訊來回答您的問題。請嘗試提出其他財經相關問題。";

const SYSTEM_PROMPT: &str =
    "你是一個專業的台股財經助手，請根據提供的知識庫內容回答用戶的投資和財經相關問題。";

/// How the answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    SemanticGeneration,
    TemplateGeneration,
    Error,
}

/// Citation entry surfaced to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub similarity: f32,
    pub category: String,
}

/// Generator output, folded into the query result by the engine.
#[derive(Debug, Clone)]
pub struct Generated {
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<SourceRef>,
    pub method: Method,
}

/// Question shape, decided by surface keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionKind {
    Definitional,
    Procedural,
    Causal,
    Generic,
}

fn classify(query: &str) -> QuestionKind {
    let lower = query.to_lowercase();
    let contains_any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if contains_any(&["什麼是", "是什麼", "定義", "意思", "what is", "what does"]) {
        QuestionKind::Definitional
    } else if contains_any(&["如何", "怎麼", "方法", "步驟", "how to", "how do"]) {
        QuestionKind::Procedural
    } else if contains_any(&["為什麼", "原因", "影響", "why"]) {
        QuestionKind::Causal
    } else {
        QuestionKind::Generic
    }
}

/// Remote chat-completion backend.
pub struct HostedGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    max_context_length: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HostedGenerator {
    pub fn new(config: &RagConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.generation_endpoint(),
            model: config.generation_model(),
            api_key,
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            max_context_length: config.max_context_length(),
        })
    }

    /// Context window from the top three documents, truncated on a char
    /// boundary at the configured length.
    fn build_context(&self, docs: &[ScoredDocument]) -> String {
        let mut context = docs
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, d)| format!("來源 {}：{}\n{}", i + 1, d.document.title, d.document.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        if context.chars().count() > self.max_context_length {
            context = context.chars().take(self.max_context_length).collect();
        }
        context
    }

    /// One completion request. Fails on transport errors, non-2xx status, or
    /// a body without a choice; the caller demotes to the template path.
    pub async fn complete(&self, query: &str, docs: &[ScoredDocument]) -> Result<String> {
        let context = self.build_context(docs);
        let user_message = format!(
            "根據以下知識庫內容回答問題：\n\n{context}\n\n問題：{query}\n\n\
             請提供準確、專業且易懂的回答。如果知識庫內容不足以回答問題，請說明。"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": user_message},
                ],
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::backend_unavailable("completion response had no choices"))?;
        Ok(choice.message.content.trim().to_string())
    }
}

/// The selected generation backend.
pub enum GenerationBackend {
    Hosted(HostedGenerator),
    Template,
}

impl GenerationBackend {
    /// Select hosted generation when configured and an API key is present,
    /// template otherwise.
    pub fn probe(config: &RagConfig) -> Self {
        if config.generation_backend() == GenerationBackendKind::Template {
            info!("using template generation");
            return Self::Template;
        }
        match config.api_key() {
            Some(api_key) => match HostedGenerator::new(config, api_key) {
                Ok(hosted) => {
                    info!("using hosted generation");
                    Self::Hosted(hosted)
                }
                Err(e) => {
                    warn!("hosted generation unavailable: {e}");
                    Self::Template
                }
            },
            None => {
                info!("no API key configured; using template generation");
                Self::Template
            }
        }
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self, Self::Hosted(_))
    }

    /// Produce an answer from the ranked documents. The hosted call is only
    /// attempted when documents were retrieved; with none, the fixed
    /// no-information answer comes back directly. Total: hosted failures
    /// fall back to the template path.
    pub async fn generate(&self, query: &str, docs: &[ScoredDocument]) -> Generated {
        let sources = sources_from(docs);

        if !docs.is_empty() {
            if let Self::Hosted(hosted) = self {
                match hosted.complete(query, docs).await {
                    Ok(answer) => {
                        return Generated {
                            answer,
                            confidence: 0.9,
                            sources,
                            method: Method::SemanticGeneration,
                        };
                    }
                    Err(e) => warn!("hosted generation failed, using template: {e}"),
                }
            }
        }

        let (answer, confidence) = template_answer(query, docs);
        Generated {
            answer,
            confidence,
            sources,
            method: Method::TemplateGeneration,
        }
    }
}

/// Template-path answer and confidence: the top document's content wrapped
/// per question kind, with a pointer to the runner-up when its category
/// differs.
fn template_answer(query: &str, docs: &[ScoredDocument]) -> (String, f32) {
    let Some(best) = docs.first() else {
        return (NO_INFO_ANSWER.to_string(), 0.0);
    };
    let content = &best.document.content;

    let mut answer = match classify(query) {
        QuestionKind::Definitional => format!("根據我的了解，{content}"),
        QuestionKind::Procedural => {
            format!("關於您的問題，{content}\n\n您可以參考以上資訊來了解具體做法。")
        }
        QuestionKind::Causal => format!("這個問題的相關說明是：{content}"),
        QuestionKind::Generic => {
            format!("根據知識庫資料：{content}\n\n希望這個資訊對您有幫助。")
        }
    };

    if let Some(second) = docs.get(1) {
        if second.document.category != best.document.category {
            answer.push_str(&format!("\n\n另外，{}也值得了解。", second.document.title));
        }
    }

    (answer, best.score.clamp(0.0, 1.0))
}

fn sources_from(docs: &[ScoredDocument]) -> Vec<SourceRef> {
    docs.iter()
        .take(3)
        .map(|d| SourceRef {
            title: d.document.title.clone(),
            similarity: d.score,
            category: d.document.category.clone(),
        })
        .collect()
}
