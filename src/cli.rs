//! Command-line argument parsing for athena-relay.

use athena_relay::config::RelayConfig;
use athena_relay::input::{looks_like_execution_id, QueryInput, QueryRequest};
use clap::Parser;
use std::path::PathBuf;

/// Run a SQL statement on an Athena-style engine and print the results as JSON.
#[derive(Parser, Debug)]
#[command(name = "athena-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL statement, or the id of an execution to pick up again
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database to run against
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub db: Option<String>,

    /// Data catalog to run against
    #[arg(long, value_name = "CATALOG")]
    pub catalog: Option<String>,

    /// Workgroup to submit to
    #[arg(short = 'w', long, value_name = "WORKGROUP")]
    pub workgroup: Option<String>,

    /// Fetch DML results in pages of this many rows (1-1000)
    #[arg(long, value_name = "ROWS")]
    pub page_size: Option<u32>,

    /// Continue a paginated read; QUERY must be the execution id
    #[arg(long, value_name = "TOKEN")]
    pub next_token: Option<String>,

    /// Positional execution parameter (repeatable)
    #[arg(long = "param", value_name = "VALUE")]
    pub params: Vec<String>,

    /// Include scan size, cost and timing statistics
    #[arg(long)]
    pub stats: bool,

    /// Print the execution id right after submission
    #[arg(long)]
    pub no_wait: bool,

    /// Wait for completion without reading results
    #[arg(long)]
    pub skip_results: bool,

    /// Print result lines as-is instead of decoding them
    #[arg(long)]
    pub raw: bool,

    /// Normalize date and timestamp columns to UTC
    #[arg(long)]
    pub utc_dates: bool,

    /// Follow pagination tokens until the last page
    #[arg(long)]
    pub all_pages: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(RelayConfig::default_path)
    }

    /// Applies flags that change client behavior rather than a single call.
    pub fn apply_to(&self, config: &mut RelayConfig) {
        if self.stats {
            config.get_stats = true;
        }
        if self.no_wait {
            config.wait_for_results = false;
        }
        if self.skip_results {
            config.skip_results = true;
        }
        if self.raw {
            config.format_json = false;
        }
        if self.utc_dates {
            config.utc_dates = true;
        }
    }

    /// Builds the query input. Plain SQL or a bare execution id stays as-is
    /// unless a per-call override is present.
    pub fn to_input(&self) -> QueryInput {
        let query = self.query.clone().unwrap_or_default();

        let has_overrides = self.db.is_some()
            || self.catalog.is_some()
            || self.workgroup.is_some()
            || self.page_size.is_some()
            || self.next_token.is_some()
            || !self.params.is_empty();
        if !has_overrides {
            return QueryInput::from(query);
        }

        let mut request = if self.next_token.is_some() || looks_like_execution_id(&query) {
            QueryRequest::resume(query, self.next_token.clone())
        } else {
            QueryRequest::sql(query)
        };
        request.db = self.db.clone();
        request.catalog = self.catalog.clone();
        request.workgroup = self.workgroup.clone();
        request.page_size = self.page_size;
        request.parameters = self.params.clone();
        QueryInput::Request(request)
    }
}
