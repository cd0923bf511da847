//! Query input forms.
//!
//! A query arrives as plain SQL, as a request object with per-call
//! overrides, or as the id of an execution that was already submitted.

use serde::{Deserialize, Serialize};

use crate::engine::ExecutionHandle;
use crate::error::{RelayError, Result};

/// Length of an engine execution id (a hyphenated UUID).
const EXECUTION_ID_LEN: usize = 36;

/// What to run, or what to pick up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Sql(String),
    Request(QueryRequest),
    Resume(ExecutionHandle),
}

/// Returns true for strings shaped like an execution id.
///
/// This is a shape check only: any 36-character string without whitespace
/// is taken as an id, so SQL of exactly that shape must be wrapped in
/// `QueryInput::Sql` or a `QueryRequest` explicitly.
pub fn looks_like_execution_id(s: &str) -> bool {
    s.chars().count() == EXECUTION_ID_LEN && !s.chars().any(char::is_whitespace)
}

impl From<String> for QueryInput {
    fn from(s: String) -> Self {
        if looks_like_execution_id(&s) {
            Self::Resume(ExecutionHandle::new(s))
        } else {
            Self::Sql(s)
        }
    }
}

impl From<&str> for QueryInput {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<QueryRequest> for QueryInput {
    fn from(request: QueryRequest) -> Self {
        Self::Request(request)
    }
}

impl From<ExecutionHandle> for QueryInput {
    fn from(handle: ExecutionHandle) -> Self {
        Self::Resume(handle)
    }
}

/// A query with per-call overrides of the client configuration.
///
/// Setting `execution_id` resumes that execution instead of submitting
/// `sql`; together with `next_token` it continues a paginated read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: Option<String>,
    pub db: Option<String>,
    pub catalog: Option<String>,
    pub workgroup: Option<String>,
    pub page_size: Option<u32>,
    pub next_token: Option<String>,
    pub execution_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl QueryRequest {
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    /// Continues reading the results of an earlier execution.
    pub fn resume(execution_id: impl Into<String>, next_token: Option<String>) -> Self {
        Self {
            execution_id: Some(execution_id.into()),
            next_token,
            ..Default::default()
        }
    }

    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = Some(workgroup.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_next_token(mut self, next_token: impl Into<String>) -> Self {
        self.next_token = Some(next_token.into());
        self
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }
}

/// Whether the lifecycle starts with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Submit(String),
    Resume(ExecutionHandle),
}

/// An input reduced to what the orchestrator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedQuery {
    pub target: Target,
    pub db: Option<String>,
    pub catalog: Option<String>,
    pub workgroup: Option<String>,
    pub page_size: Option<u32>,
    pub next_token: Option<String>,
    pub parameters: Vec<String>,
}

impl ResolvedQuery {
    fn new(target: Target) -> Self {
        Self {
            target,
            db: None,
            catalog: None,
            workgroup: None,
            page_size: None,
            next_token: None,
            parameters: Vec::new(),
        }
    }
}

impl QueryInput {
    /// Validates the input without touching the network.
    pub(crate) fn resolve(self) -> Result<ResolvedQuery> {
        match self {
            Self::Sql(sql) => Ok(ResolvedQuery::new(Target::Submit(require_sql(Some(sql))?))),
            Self::Resume(handle) => {
                if handle.as_str().trim().is_empty() {
                    return Err(RelayError::input("Execution id is empty"));
                }
                Ok(ResolvedQuery::new(Target::Resume(handle)))
            }
            Self::Request(request) => {
                let execution_id = request.execution_id.filter(|id| !id.trim().is_empty());
                let target = match execution_id {
                    Some(id) => Target::Resume(ExecutionHandle::new(id)),
                    None => {
                        if request.next_token.is_some() {
                            return Err(RelayError::input(
                                "next_token requires the execution_id it belongs to",
                            ));
                        }
                        Target::Submit(require_sql(request.sql)?)
                    }
                };
                Ok(ResolvedQuery {
                    target,
                    db: request.db,
                    catalog: request.catalog,
                    workgroup: request.workgroup,
                    page_size: request.page_size,
                    next_token: request.next_token,
                    parameters: request.parameters,
                })
            }
        }
    }
}

fn require_sql(sql: Option<String>) -> Result<String> {
    match sql {
        Some(sql) if !sql.trim().is_empty() => Ok(sql),
        _ => Err(RelayError::input("SQL query is missing")),
    }
}
