use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use dialogue_grounding_rs::annotation::{
    annotate_file, retry_file, strip_numbering_file, AnnotationConfig, AnnotationPipeline, Pacing, ParseMode,
};
use dialogue_grounding_rs::dataset::read_jsonl;
use dialogue_grounding_rs::generator::{GeminiClient, DEFAULT_API_KEY_VAR, DEFAULT_MODEL};
use dialogue_grounding_rs::logging::{init_logging, LogMode};
use dialogue_grounding_rs::manager::KnowledgeGraphManager;
use dialogue_grounding_rs::summaries::summarize_file;
use dialogue_grounding_rs::validation::{validate_context, validate_name};

#[derive(Clone)]
struct FactServer {
    manager: Arc<KnowledgeGraphManager>,
    tool_router: ToolRouter<Self>,
}

impl FactServer {
    fn new(manager: Arc<KnowledgeGraphManager>) -> Self {
        Self {
            manager,
            tool_router: Self::tool_router(),
        }
    }

    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "dialogue-grounding-rs".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                website_url: None,
                icons: None,
            },
            instructions: None,
        }
    }
}

#[tool_router]
impl FactServer {
    /// Facts relevant to one dialogue turn
    #[tool(
        name = "get_relevant_facts",
        description = "Return the ordered, deduplicated knowledge graph facts for a dialogue turn (mission, context, speaker, responding character)"
    )]
    async fn get_relevant_facts(
        &self,
        Parameters(args): Parameters<GetRelevantFactsArgs>,
    ) -> Result<CallToolResult, McpError> {
        validate_name(&args.speaker, "Speaker").map_err(invalid_params("Invalid speaker"))?;
        validate_name(&args.target, "Target").map_err(invalid_params("Invalid target"))?;
        validate_context(&args.context).map_err(invalid_params("Invalid context"))?;

        let facts = self
            .manager
            .get_relevant_facts(&args.mission, &args.context, &args.speaker, &args.target)
            .await;

        let text = if facts.is_empty() {
            "No relevant facts".to_string()
        } else {
            facts.join("\n")
        };

        Ok(CallToolResult {
            content: vec![Content::text(&text)],
            structured_content: Some(json!({ "facts": facts })),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Read entire relationship graph
    #[tool(
        name = "read_graph",
        description = "Read the entire relationship graph"
    )]
    async fn read_graph(&self) -> Result<CallToolResult, McpError> {
        let graph = self.manager.read_graph().await;

        let summary = format!(
            "Relationship graph contains {} entities and {} relations",
            graph.entities.len(),
            graph.relations.len()
        );

        Ok(CallToolResult {
            content: vec![Content::text(&summary)],
            structured_content: Some(json!(graph)),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Open specific nodes by names
    #[tool(
        name = "open_nodes",
        description = "Open specific entities of the relationship graph by name, with the relations among them"
    )]
    async fn open_nodes(
        &self,
        Parameters(args): Parameters<OpenNodesArgs>,
    ) -> Result<CallToolResult, McpError> {
        for name in &args.names {
            validate_name(name, "Entity name").map_err(invalid_params("Invalid entity name"))?;
        }

        let result = self.manager.open_nodes(args.names).await;

        let summary = format!(
            "Retrieved {} entities and {} relations",
            result.entities.len(),
            result.relations.len()
        );

        Ok(CallToolResult {
            content: vec![Content::text(&summary)],
            structured_content: Some(json!(result)),
            is_error: Some(false),
            meta: None,
        })
    }
}

#[tool_handler]
impl ServerHandler for FactServer {
    fn get_info(&self) -> ServerInfo {
        self.server_info()
    }
}

// Tool argument schemas

#[derive(Debug, Deserialize, JsonSchema)]
struct GetRelevantFactsArgs {
    /// Mission name of the turn
    #[serde(default)]
    mission: String,
    /// Flattened transcript with <Speaker> ... </Speaker> tags
    #[serde(default)]
    context: String,
    /// Character who spoke last
    speaker: String,
    /// Character who answers
    target: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct OpenNodesArgs {
    names: Vec<String>,
}

// Helper for error conversion
fn invalid_params<T: ToString>(msg: &'static str) -> impl FnOnce(T) -> McpError + Clone {
    move |err| McpError::invalid_params(msg, Some(json!({ "error": err.to_string() })))
}

// Command line

#[derive(Parser)]
#[command(name = "dialogue-grounding-rs", version, about = "Knowledge-graph grounding and action annotation for dialogue datasets")]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Graph snapshot JSON to use instead of the built-in lore
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Entity whose perspective facts are computed from
    #[arg(long, global = true)]
    protagonist: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the relevant facts for a dialogue turn or for every record of a JSONL file
    Facts {
        #[arg(long, conflicts_with_all = ["mission", "context", "speaker", "target"])]
        input: Option<PathBuf>,
        #[arg(long, default_value = "")]
        mission: String,
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, required_unless_present = "input")]
        speaker: Option<String>,
        #[arg(long, required_unless_present = "input")]
        target: Option<String>,
    },
    /// Label examples without an action through the annotation service
    Annotate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        batching: BatchArgs,
        #[command(flatten)]
        service: ServiceArgs,
        /// Skip examples already in the output file and append to it
        #[arg(long)]
        resume: bool,
    },
    /// Retry examples marked as failed and merge them back into the dataset
    Retry {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to overwriting the input
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        batching: BatchArgs,
        #[command(flatten)]
        service: ServiceArgs,
        /// Minimum seconds between two service calls
        #[arg(long, default_value_t = 3.0)]
        min_interval: f64,
        /// Calls per batch before giving up on it
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },
    /// Remove "N. " markers echoed back into action labels
    StripNumbering {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to overwriting the input
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Attach memory and knowledge summaries to every record
    Summarize {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 4)]
        batch_size: usize,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Dump the relationship graph (or some of its nodes) as JSON
    Graph {
        #[arg(long)]
        nodes: Vec<String>,
    },
    /// Serve read-only fact tools over MCP stdio
    Serve,
}

#[derive(Args)]
struct BatchArgs {
    #[arg(long, default_value_t = 10)]
    batch_size: usize,
    /// Fail a batch whose response line count differs from its size
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct ServiceArgs {
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Environment variable holding the API key
    #[arg(long, default_value = DEFAULT_API_KEY_VAR)]
    api_key_var: String,
}

impl ServiceArgs {
    fn client(&self) -> Result<GeminiClient, Box<dyn std::error::Error>> {
        Ok(GeminiClient::from_env(&self.api_key_var)?.with_model(&self.model))
    }
}

impl BatchArgs {
    fn config(&self, pacing: Pacing) -> AnnotationConfig {
        AnnotationConfig {
            batch_size: self.batch_size,
            parse_mode: if self.strict { ParseMode::Strict } else { ParseMode::Lenient },
            pacing,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout/stderr belong to the MCP protocol when serving
    let mode = match cli.command {
        Command::Serve => LogMode::Serve,
        _ => LogMode::Batch,
    };
    init_logging(mode, cli.log.as_deref())?;

    let manager = Arc::new(KnowledgeGraphManager::load(
        cli.graph.as_deref(),
        cli.protagonist.as_deref(),
    )?);

    match cli.command {
        Command::Facts {
            input,
            mission,
            context,
            speaker,
            target,
        } => {
            if let Some(input) = input {
                for (idx, example) in read_jsonl(&input)?.iter().enumerate() {
                    let facts = manager.retriever().facts_for(example);
                    println!("{}", json!({ "index": idx, "facts": facts }));
                }
            } else {
                let speaker = speaker.unwrap_or_default();
                let target = target.unwrap_or_default();
                for fact in manager
                    .get_relevant_facts(&mission, &context, &speaker, &target)
                    .await
                {
                    println!("- {fact}");
                }
            }
        }
        Command::Annotate {
            input,
            output,
            batching,
            service,
            resume,
        } => {
            let config = batching.config(Pacing::default());
            let mut pipeline = AnnotationPipeline::new(service.client()?, config)?;
            let report = annotate_file(&mut pipeline, &input, &output, resume).await?;
            info!(?report, "annotation complete");
        }
        Command::Retry {
            input,
            output,
            batching,
            service,
            min_interval,
            attempts,
        } => {
            let pacing = Pacing {
                min_interval: Duration::try_from_secs_f64(min_interval)?,
                attempts,
                ..AnnotationConfig::retry_defaults().pacing
            };
            let mut pipeline = AnnotationPipeline::new(service.client()?, batching.config(pacing))?;
            let output = output.unwrap_or_else(|| input.clone());
            let report = retry_file(&mut pipeline, &input, &output).await?;
            info!(?report, "retry complete");
        }
        Command::StripNumbering { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            strip_numbering_file(&input, &output)?;
        }
        Command::Summarize {
            input,
            output,
            batch_size,
            service,
        } => {
            let client = service.client()?;
            summarize_file(manager.retriever(), &client, &input, &output, batch_size).await?;
        }
        Command::Graph { nodes } => {
            let snapshot = if nodes.is_empty() {
                manager.read_graph().await
            } else {
                manager.open_nodes(nodes).await
            };
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Serve => {
            let server = FactServer::new(manager);
            let transport = stdio();
            let svc = server.serve(transport).await?;
            svc.waiting().await?;
        }
    }

    Ok(())
}
