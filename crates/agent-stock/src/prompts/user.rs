//! User message template for the analyse stage

/// Template name of the analysis request
pub const ANALYSIS_REQUEST: &str = "stock.user.analysis_request";

/// Analysis request combining strategy and market data
///
/// Variables: `strategy` (framework text), `data` (formatted market data),
/// `symbols` (list of tickers).
pub const ANALYSIS_REQUEST_TEMPLATE: &str = r"# Analysis Task

## Scoring Framework

{{ strategy }}

## Market Data

{{ data }}

Using the framework and the data above, write a complete analysis report for {{ symbols | join(', ') }}. The report must include:
1. A composite scoring table (technical, fundamental and growth scores plus an overall rating for every stock)
2. Key insights: opportunities, risk warnings and an investment view
3. A detailed explanation of the analysis

Begin the analysis:";
