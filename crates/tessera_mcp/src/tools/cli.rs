//! CLI tools: thin wrappers over the project CLI.

use crate::cli_runner::{CliInvocation, CliRunner};
use crate::types::{parse_args, Tool, ToolError, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which sub-command a tool wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    Build,
    Compile,
    Docs,
    List,
    Parse,
    Run,
    Test,
    Show,
}

impl CliCommand {
    pub const ALL: [CliCommand; 8] = [
        CliCommand::Build,
        CliCommand::Compile,
        CliCommand::Docs,
        CliCommand::List,
        CliCommand::Parse,
        CliCommand::Run,
        CliCommand::Test,
        CliCommand::Show,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            CliCommand::Build => "build",
            CliCommand::Compile => "compile",
            CliCommand::Docs => "docs",
            CliCommand::List => "list",
            CliCommand::Parse => "parse",
            CliCommand::Run => "run",
            CliCommand::Test => "test",
            CliCommand::Show => "show",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CliCommand::Build => "Run, test, snapshot and seed the selected resources in dependency order.",
            CliCommand::Compile => "Compile the project's models to SQL without running them.",
            CliCommand::Docs => "Generate the project's documentation site.",
            CliCommand::List => "List the resources in the project, optionally filtered by selector and resource type.",
            CliCommand::Parse => "Parse the project and report any syntax or configuration errors.",
            CliCommand::Run => "Run the selected models against the warehouse.",
            CliCommand::Test => "Run the data tests of the selected resources.",
            CliCommand::Show => "Run a SQL query against the warehouse and return the rows as JSON.",
        }
    }

    fn selectable(self) -> bool {
        matches!(self, CliCommand::Build | CliCommand::List | CliCommand::Run | CliCommand::Test)
    }
}

#[derive(Deserialize, Default)]
struct SelectArgs {
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    resource_type: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ShowArgs {
    sql_query: String,
    #[serde(default)]
    limit: Option<i64>,
}

/// `show` arguments; a limit written in the SQL wins over the `limit` argument.
fn show_invocation(args: ShowArgs) -> CliInvocation {
    let mut cli = vec!["show".to_string(), "--inline".to_string(), args.sql_query.clone(), "--favor-state".to_string()];
    let cli_limit = if args.sql_query.to_lowercase().contains("limit") {
        Some(-1)
    } else {
        args.limit.filter(|l| *l != 0)
    };
    if let Some(limit) = cli_limit {
        cli.push("--limit".to_string());
        cli.push(limit.to_string());
    }
    cli.push("--output".to_string());
    cli.push("json".to_string());
    CliInvocation::new(cli)
}

pub fn tools(runner: Arc<CliRunner>) -> Vec<Arc<dyn Tool>> {
    CliCommand::ALL
        .into_iter()
        .map(|command| {
            Arc::new(CliTool {
                command,
                runner: runner.clone(),
            }) as Arc<dyn Tool>
        })
        .collect()
}

pub struct CliTool {
    command: CliCommand,
    runner: Arc<CliRunner>,
}

impl CliTool {
    pub fn new(command: CliCommand, runner: Arc<CliRunner>) -> Self {
        Self { command, runner }
    }

    fn invocation(&self, args: Value) -> Result<CliInvocation, ToolError> {
        let invocation = match self.command {
            CliCommand::Show => return Ok(show_invocation(parse_args(args)?)),
            CliCommand::Docs => CliInvocation::new(["docs", "generate"]),
            other => CliInvocation::new([other.tool_name()]),
        };
        if !self.command.selectable() {
            return Ok(invocation);
        }

        let args: SelectArgs = parse_args(args)?;
        let invocation = invocation.selector(args.selector);
        Ok(match self.command {
            CliCommand::List => invocation.resource_types(args.resource_type).timeout(LIST_TIMEOUT),
            _ => invocation,
        })
    }
}

#[async_trait]
impl Tool for CliTool {
    fn name(&self) -> &str {
        self.command.tool_name()
    }

    fn description(&self) -> &str {
        self.command.description()
    }

    fn input_schema(&self) -> ToolInputSchema {
        let selector = json!({
            "type": "string",
            "description": "Node selection syntax, e.g. `my_model+` or `tag:nightly`. Separate several selectors with spaces."
        });
        match self.command {
            CliCommand::Show => ToolInputSchema::with_properties(
                json!({
                    "sql_query": {"type": "string", "description": "SQL to run; may use ref() and source()"},
                    "limit": {"type": "integer", "description": "Maximum rows to return"}
                }),
                &["sql_query"],
            ),
            CliCommand::List => ToolInputSchema::with_properties(
                json!({
                    "selector": selector,
                    "resource_type": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Resource types to include, e.g. model, seed, source"
                    }
                }),
                &[],
            ),
            command if command.selectable() => ToolInputSchema::with_properties(json!({"selector": selector}), &[]),
            _ => ToolInputSchema::empty(),
        }
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let invocation = self.invocation(args)?;
        match self.runner.run(&invocation).await {
            Ok(output) => Ok(ToolResult::text(output)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}
