//! Prompt templates for the analyse stage
//!
//! Templates are plain minijinja sources registered into an [`Environment`]
//! owned by the analyse agent:
//! - `system`: the analyst persona
//! - `user`: the analysis request built from strategy and market data

mod system;
mod user;

pub use system::*;
pub use user::*;

use crate::error::Result;
use minijinja::{Environment, context};

/// Rendered prompt pair for one analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
}

/// Register all analyse-stage prompts with the given environment
pub fn register_prompts(env: &mut Environment<'static>) -> Result<()> {
    env.add_template(ANALYST_SYSTEM, ANALYST_SYSTEM_TEMPLATE)?;
    env.add_template(ANALYSIS_REQUEST, ANALYSIS_REQUEST_TEMPLATE)?;
    Ok(())
}

/// Render the system and user prompts for one analysis
pub fn render_analysis_prompt(
    env: &Environment<'_>,
    strategy: &str,
    formatted_data: &str,
    symbols: &[String],
) -> Result<AnalysisPrompt> {
    let system = env
        .get_template(ANALYST_SYSTEM)?
        .render(context! { symbols => symbols })?;
    let user = env.get_template(ANALYSIS_REQUEST)?.render(context! {
        strategy => strategy.trim(),
        data => formatted_data.trim(),
        symbols => symbols,
    })?;

    Ok(AnalysisPrompt { system, user })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment<'static> {
        let mut env = Environment::new();
        register_prompts(&mut env).unwrap();
        env
    }

    #[test]
    fn test_register_all_prompts() {
        let env = env();
        assert!(env.get_template(ANALYST_SYSTEM).is_ok());
        assert!(env.get_template(ANALYSIS_REQUEST).is_ok());
    }

    #[test]
    fn test_render_analysis_prompt() {
        let symbols = vec!["NVDA.US".to_string(), "AAPL.US".to_string()];
        let prompt = render_analysis_prompt(
            &env(),
            "## Technical (30%)\nScore momentum 1-5",
            "# Real-time Market Data\n\n## 英伟达 (NVDA.US)",
            &symbols,
        )
        .unwrap();

        assert!(prompt.system.contains("NVDA.US, AAPL.US"));
        assert!(prompt.user.contains("Score momentum 1-5"));
        assert!(prompt.user.contains("## 英伟达 (NVDA.US)"));
        assert!(prompt.user.ends_with("Begin the analysis:"));
    }

    #[test]
    fn test_markup_is_not_escaped() {
        let prompt = render_analysis_prompt(
            &env(),
            "Rating <= 3 & trend \"down\"",
            "data",
            &["NVDA.US".to_string()],
        )
        .unwrap();
        assert!(prompt.user.contains("Rating <= 3 & trend \"down\""));
    }
}
