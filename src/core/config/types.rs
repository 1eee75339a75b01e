//! Typed view of `config.yml`.
//!
//! Every section carries `#[serde(default)]` so a partial (or missing) file
//! still yields a complete configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub generation: GenerationConfig,
    pub safety: SafetyConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    /// Key used when a request names no session.
    pub default_key: String,
    /// Number of most recent turns sent to the prompt assembler.
    pub history_window: usize,
    pub max_message_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            default_key: "default".to_string(),
            history_window: 6,
            max_message_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub index_path: String,
    pub top_k: usize,
    /// Prepended to the user message before it is embedded.
    pub query_prefix: String,
    pub embedder: EmbedderConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: "qa_index.json".to_string(),
            top_k: 3,
            query_prefix: String::new(),
            embedder: EmbedderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            model: "bge-m3".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetUnit {
    Chars,
    Tokens,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_units: usize,
    pub unit: BudgetUnit,
    /// `tokenizer.json` used when `unit = tokens`.
    pub tokenizer_path: Option<String>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_units: 6000,
            unit: BudgetUnit::Chars,
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub instructions: String,
    pub history_header: String,
    pub context_header: String,
    pub question_header: String,
    /// Marks where the assistant's answer begins; also used to cut model output.
    pub answer_marker: String,
    pub user_label: String,
    pub assistant_label: String,
    pub budget: BudgetConfig,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            instructions: "너는 공감 능력이 뛰어나고, 실제 심리상담사처럼 섬세하게 상담을 진행하는 AI야.\n\
                상담자님의 감정에 진심으로 공감하고, 따뜻하고 배려 깊은 말투로 간결하게 답해줘."
                .to_string(),
            history_header: "[이전 대화]".to_string(),
            context_header: "[상담 참고 자료]".to_string(),
            question_header: "[상담자님의 현재 고민]".to_string(),
            answer_marker: "[AI 상담사의 답변]".to_string(),
            user_label: "상담자님".to_string(),
            assistant_label: "AI".to_string(),
            budget: BudgetConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Ollama,
    LlamaServer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub base_url: String,
    pub model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Ollama,
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "gemma3:12b-it-qat".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingStrategyConfig {
    pub name: String,
    pub do_sample: bool,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub repeat_penalty: Option<f32>,
    pub num_beams: u32,
    pub max_new_tokens: u32,
}

impl Default for DecodingStrategyConfig {
    fn default() -> Self {
        Self {
            name: "greedy".to_string(),
            do_sample: false,
            temperature: None,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            num_beams: 1,
            max_new_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: BackendConfig,
    /// Tried in order; the first success wins.
    pub strategies: Vec<DecodingStrategyConfig>,
    pub timeout_secs: u64,
    /// Size of the global execution slot pool.
    pub max_concurrent: usize,
    pub degraded_reply: String,
    pub strip_patterns: Vec<String>,
    /// Refuse to start when the backend does not answer its health check.
    pub require_backend_on_startup: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            strategies: vec![
                DecodingStrategyConfig {
                    name: "sampling".to_string(),
                    do_sample: true,
                    temperature: Some(0.7),
                    top_p: Some(0.9),
                    top_k: Some(50),
                    repeat_penalty: Some(1.1),
                    num_beams: 1,
                    max_new_tokens: 256,
                },
                DecodingStrategyConfig::default(),
            ],
            timeout_secs: 120,
            max_concurrent: 1,
            degraded_reply: "죄송합니다, 응답 생성 중 기술적 문제가 발생했습니다. 잠시 후 다시 시도해 주세요."
                .to_string(),
            strip_patterns: vec![
                r"<unused\d+>".to_string(),
                "<start_of_turn>(user|model)?".to_string(),
                "<end_of_turn>".to_string(),
                "<eos>".to_string(),
                "<bos>".to_string(),
            ],
            require_backend_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub crisis_keywords: Vec<String>,
    pub crisis_message: String,
    pub empty_message_reply: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            crisis_keywords: ["자살", "죽고", "죽을", "목숨", "목매", "뛰어내", "날 죽이", "내 목숨"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            crisis_message: "\n\n위기 상황에서는 전문가의 도움이 필요합니다. 다음 자살예방 핫라인으로 연락해주세요: 1393 (24시간 위기상담전화)"
                .to_string(),
            empty_message_reply: "상담 내용을 입력해 주세요 🙏".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub instructions: String,
    pub max_new_tokens: u32,
    pub no_history_reply: String,
    pub unparsable_reply: String,
    pub failure_reply: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            instructions: "너는 지금까지의 상담 대화를 바탕으로 상담자님의 감정 상태를 분석하는 심리상담사야.\n\
                Russell 감정 원형 모형에 따라 분석하고, 아래 JSON 형식으로만 답해줘.\n\
                {\"summary\": \"감정 요약\", \"scores\": {\"sadness\": 0, \"happiness\": 0, \"angry\": 0, \"neutral\": 0, \"other\": 0}, \
                \"valence\": \"positive | neutral | negative\", \"arousal\": \"high | medium | low\"}"
                .to_string(),
            max_new_tokens: 400,
            no_history_reply: "요약할 상담 기록이 없습니다.".to_string(),
            unparsable_reply: "JSON 형식을 파싱할 수 없습니다.".to_string(),
            failure_reply: "레포트를 생성하는 중 오류가 발생했습니다.".to_string(),
        }
    }
}
