//! Analysis and report generation stage

use super::AnalyseStage;
use crate::config::{AppConfig, LlmBackend};
use crate::engine::{AnalysisReport, StageResult};
use crate::error::{Result, StockError};
use crate::prompts::{AnalysisPrompt, register_prompts, render_analysis_prompt};
use crate::report::{ReportContent, ReportWriter};
use agent_core::{Agent, AgentHealth};
use agent_llm::providers::{OllamaConfig, OllamaProvider, OpenAIConfig, OpenAIProvider};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use async_trait::async_trait;
use chrono::Local;
use minijinja::Environment;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Placeholder key for OpenAI-compatible servers that don't check it
const UNUSED_API_KEY: &str = "not-needed";

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>.*?</think>")
        .unwrap_or_else(|e| unreachable!("think block pattern is valid: {e}"))
});

/// Remove `<think>…</think>` reasoning emitted by reasoning models
///
/// A dangling `</think>` (the opening tag is sometimes swallowed by the
/// server) drops everything before it.
pub fn strip_reasoning(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    let visible = match stripped.rfind("</think>") {
        Some(pos) => &stripped[pos + "</think>".len()..],
        None => &stripped,
    };
    visible.trim().to_string()
}

/// Build the reasoning backend selected by configuration
pub fn build_llm(config: &AppConfig) -> Result<Arc<dyn LLMProvider>> {
    let timeout_secs = config.llm_timeout.as_secs();
    let provider: Arc<dyn LLMProvider> = match config.llm_backend {
        LlmBackend::Ollama => Arc::new(OllamaProvider::with_config(
            OllamaConfig::new(config.llm_base_url.as_str()).with_timeout(timeout_secs),
        )?),
        LlmBackend::OpenAI => {
            let api_key = config.llm_api_key.as_deref().unwrap_or(UNUSED_API_KEY);
            Arc::new(OpenAIProvider::with_config(
                OpenAIConfig::new(api_key)
                    .with_api_base(config.llm_base_url.as_str())
                    .with_timeout(timeout_secs),
            )?)
        }
    };
    Ok(provider)
}

/// Agent that turns formatted market data into a persisted report
pub struct AnalyseAgent {
    llm: Arc<dyn LLMProvider>,
    config: Arc<AppConfig>,
    prompts: Environment<'static>,
    reports: ReportWriter,
    health: AgentHealth,
}

impl AnalyseAgent {
    /// Create an analyse agent over an existing backend
    ///
    /// Fails when the strategy definition does not exist.
    pub fn new(llm: Arc<dyn LLMProvider>, config: Arc<AppConfig>) -> Result<Self> {
        if !config.strategy_path.is_file() {
            return Err(StockError::io(
                &config.strategy_path,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "strategy definition not found",
                ),
            ));
        }

        let mut prompts = Environment::new();
        register_prompts(&mut prompts)?;
        let reports = ReportWriter::new(&config.output_dir)?;

        info!(
            "AnalyseAgent ready (backend: {}, model: {}, strategy: {})",
            llm.name(),
            config.llm_model,
            config.strategy_path.display()
        );

        Ok(Self {
            llm,
            config,
            prompts,
            reports,
            health: AgentHealth::Ready,
        })
    }

    /// Create an analyse agent with the backend selected by configuration
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let llm = build_llm(&config)?;
        Self::new(llm, config)
    }

    async fn load_strategy(&self) -> Result<String> {
        let path = &self.config.strategy_path;
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StockError::io(path, e))
    }

    /// Ask the backend for an analysis, retrying transient failures
    async fn complete(&self, prompt: AnalysisPrompt) -> Result<String> {
        let request = CompletionRequest::builder(self.config.llm_model.as_str())
            .system(prompt.system)
            .add_message(Message::user(prompt.user))
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build();

        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!("Backend attempt {}/{}", attempt, max_attempts);

            match self.llm.complete(request.clone()).await {
                Ok(response) => {
                    let analysis = strip_reasoning(&response.message.content);
                    if !analysis.is_empty() {
                        if let Some(usage) = response.usage {
                            debug!("Backend used {} tokens", usage.total());
                        }
                        return Ok(analysis);
                    }
                    warn!("Attempt {}/{}: backend returned no analysis", attempt, max_attempts);
                    last_error = Some(StockError::MalformedResponse(
                        "backend returned no analysis text".to_string(),
                    ));
                }
                Err(e) if e.is_retryable() => {
                    warn!("Attempt {}/{} failed: {}", attempt, max_attempts, e);
                    last_error = Some(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StockError::MalformedResponse("backend produced no response".to_string())
        }))
    }

    async fn analyse(&self, formatted_data: &str, symbols: &[String]) -> Result<AnalysisReport> {
        let strategy = self.load_strategy().await?;
        let prompt = render_analysis_prompt(&self.prompts, &strategy, formatted_data, symbols)?;

        let analysis = self.complete(prompt).await?;
        info!("Analysis complete ({} chars)", analysis.chars().count());

        let generated_at = Local::now();
        let rendered = self.reports.render(&ReportContent {
            generated_at,
            symbols,
            model: &self.config.llm_model,
            data_source: self.config.provider.label(),
            backend: self.config.llm_backend.label(),
            data: formatted_data,
            analysis: &analysis,
        })?;
        let report_path = self.reports.write(&rendered, symbols, generated_at).await?;
        info!("Report written to {}", report_path.display());

        let index_path = match self.reports.update_index().await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Report index not updated: {}", e);
                None
            }
        };

        Ok(AnalysisReport {
            report_path,
            index_path,
            analysis,
            symbols: symbols.to_vec(),
            model: self.config.llm_model.clone(),
            generated_at,
        })
    }
}

impl Agent for AnalyseAgent {
    fn name(&self) -> &str {
        "AnalyseAgent"
    }

    fn health(&self) -> AgentHealth {
        self.health
    }

    fn shutdown(&mut self) -> agent_core::Result<()> {
        self.health = AgentHealth::ShutDown;
        Ok(())
    }
}

#[async_trait]
impl AnalyseStage for AnalyseAgent {
    async fn execute(&self, formatted_data: &str, symbols: &[String]) -> StageResult<AnalysisReport> {
        if self.health == AgentHealth::ShutDown {
            return StageResult::error("AnalyseAgent has been shut down");
        }

        info!("Analysing {} symbol(s)", symbols.len());
        match self.analyse(formatted_data, symbols).await {
            Ok(report) => StageResult::success(report),
            Err(e) => {
                warn!("Analysis failed: {}", e);
                StageResult::error(format!("Analysis failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_llm::{CompletionResponse, LLMError, StopReason};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    enum Reply {
        Text(&'static str),
        Transient,
        Fatal,
    }

    struct ScriptedProvider {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_request(&self) -> CompletionRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Text(text)) => Ok(CompletionResponse {
                    message: Message::assistant(text),
                    stop_reason: StopReason::EndTurn,
                    usage: None,
                }),
                Some(Reply::Transient) => Err(LLMError::RequestFailed("503 Service Unavailable".to_string())),
                Some(Reply::Fatal) | None => Err(LLMError::AuthenticationFailed),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn config(root: &Path) -> Arc<AppConfig> {
        let strategy = root.join("rating.md");
        std::fs::write(&strategy, "## Technical (30%)\nScore momentum 1-5").unwrap();
        Arc::new(
            AppConfig::builder()
                .strategy_path(strategy)
                .output_dir(root.join("report"))
                .build()
                .unwrap(),
        )
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_strip_reasoning() {
        assert_eq!(
            strip_reasoning("<think>\nweigh RSI\n</think>\n\n## Rating\nBuy"),
            "## Rating\nBuy"
        );
        assert_eq!(strip_reasoning("plan</think>Hold"), "Hold");
        assert_eq!(strip_reasoning("<think>only thoughts</think>  \n"), "");
        assert_eq!(strip_reasoning("No reasoning here"), "No reasoning here");
    }

    #[test]
    fn test_missing_strategy_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(
            AppConfig::builder()
                .strategy_path(dir.path().join("absent.md"))
                .build()
                .unwrap(),
        );

        let result = AnalyseAgent::new(ScriptedProvider::new(vec![]), config);
        assert!(matches!(result, Err(StockError::Io { .. })));
    }

    #[test]
    fn test_build_llm_for_each_backend() {
        let config = AppConfig::default();
        assert_eq!(build_llm(&config).unwrap().name(), "ollama");

        let config = AppConfig::builder()
            .llm_backend(LlmBackend::OpenAI)
            .llm_base_url("http://localhost:1234/v1")
            .build()
            .unwrap();
        assert_eq!(build_llm(&config).unwrap().name(), "openai");
    }

    #[tokio::test]
    async fn test_execute_writes_report_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let llm = ScriptedProvider::new(vec![Reply::Text(
            "<think>check volume</think>\n| Symbol | Rating |\n|---|---|\n| NVDA | 4/5 |",
        )]);
        let agent = AnalyseAgent::new(llm.clone(), Arc::clone(&config)).unwrap();

        let result = agent
            .execute("## 英伟达 (NVDA.US)\n- **Last**: $102.35", &symbols(&["NVDA.US"]))
            .await;
        let report = result.data().unwrap();

        let file_name = report.report_path.file_name().unwrap().to_string_lossy();
        assert!(file_name.starts_with("stock_analysis_NVDA_"));
        assert!(report.report_path.starts_with(dir.path().join("report")));
        assert_eq!(report.analysis, "| Symbol | Rating |\n|---|---|\n| NVDA | 4/5 |");
        assert_eq!(report.model, "deepseek-r1:8b");

        let content = tokio::fs::read_to_string(&report.report_path).await.unwrap();
        assert!(content.contains("- **Last**: $102.35"));
        assert!(content.contains("| NVDA | 4/5 |"));
        assert!(!content.contains("check volume"));

        let index = tokio::fs::read_to_string(report.index_path.as_ref().unwrap())
            .await
            .unwrap();
        assert!(index.contains(file_name.as_ref()));

        let request = llm.last_request();
        assert_eq!(request.model, "deepseek-r1:8b");
        assert!(request.system.unwrap().contains("NVDA.US"));
        assert!(request.messages[0].content.contains("Score momentum 1-5"));
        assert!(request.messages[0].content.contains("## 英伟达 (NVDA.US)"));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedProvider::new(vec![
            Reply::Transient,
            Reply::Text("<think>nothing yet</think>"),
            Reply::Text("Hold"),
        ]);
        let agent = AnalyseAgent::new(llm.clone(), config(dir.path())).unwrap();

        let result = agent.execute("data", &symbols(&["AAPL.US"])).await;
        assert!(result.is_success());
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedProvider::new(vec![Reply::Transient, Reply::Transient, Reply::Transient]);
        let agent = AnalyseAgent::new(llm.clone(), config(dir.path())).unwrap();

        let result = agent.execute("data", &symbols(&["AAPL.US"])).await;
        assert!(result.error_message().unwrap().contains("503"));
        assert_eq!(llm.calls(), 3);
        assert!(!dir.path().join("report").exists());
    }

    #[tokio::test]
    async fn test_reasoning_only_answers_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedProvider::new(vec![
            Reply::Text("<think>a</think>"),
            Reply::Text("<think>b</think>"),
            Reply::Text("<think>c</think>"),
        ]);
        let agent = AnalyseAgent::new(llm.clone(), config(dir.path())).unwrap();

        let result = agent.execute("data", &symbols(&["AAPL.US"])).await;
        assert!(result.error_message().unwrap().contains("Malformed"));
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedProvider::new(vec![Reply::Fatal, Reply::Text("Hold")]);
        let agent = AnalyseAgent::new(llm.clone(), config(dir.path())).unwrap();

        let result = agent.execute("data", &symbols(&["AAPL.US"])).await;
        assert!(!result.is_success());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_strategy_is_read_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let llm = ScriptedProvider::new(vec![Reply::Text("Buy"), Reply::Text("Sell")]);
        let agent = AnalyseAgent::new(llm.clone(), Arc::clone(&config)).unwrap();

        agent.execute("data", &symbols(&["AAPL.US"])).await;
        std::fs::write(&config.strategy_path, "## Value (100%)\nPrefer low P/E").unwrap();
        agent.execute("data", &symbols(&["AAPL.US"])).await;
        assert!(llm.last_request().messages[0].content.contains("Prefer low P/E"));

        std::fs::remove_file(&config.strategy_path).unwrap();
        let result = agent.execute("data", &symbols(&["AAPL.US"])).await;
        assert!(result.error_message().unwrap().contains("rating.md"));
        assert_eq!(llm.calls(), 2);
    }
}
