use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use clap::Parser;
use navrewrite::{
    config::{self, OutputFormat, RewriteConfig},
    entity_catalog::EntityModel,
    query_planner::{
        count_collection_navigation_accesses,
        logical_expr::{Expr, ExprRef},
        rewrite_collection_navigations, rewrite_query,
    },
};

/// Navrewrite - rewrites collection navigations into correlated sub-queries
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Entity model YAML file [env: NAVREWRITE_MODEL]
    #[arg(long)]
    model: Option<PathBuf>,

    /// Query tree JSON file [env: NAVREWRITE_QUERY]
    #[arg(long)]
    query: Option<PathBuf>,

    /// Output format: json, pretty or text [env: NAVREWRITE_OUTPUT]
    #[arg(long)]
    output: Option<OutputFormat>,

    /// Reject query trees deeper than this [env: NAVREWRITE_MAX_TREE_DEPTH]
    #[arg(long)]
    max_tree_depth: Option<usize>,

    /// Check that rewriting the result again changes nothing [env: NAVREWRITE_VERIFY]
    #[arg(long)]
    verify_idempotence: bool,
}

impl Cli {
    /// Flags given on the command line override environment values.
    fn into_cli_config(self, env: RewriteConfig) -> config::CliConfig {
        config::CliConfig {
            model_path: self.model.unwrap_or(env.model_path),
            query_path: self.query.unwrap_or(env.query_path),
            max_tree_depth: self.max_tree_depth.unwrap_or(env.max_tree_depth),
            output_format: self.output.unwrap_or(env.output_format),
            verify_idempotence: self.verify_idempotence || env.verify_idempotence,
        }
    }
}

/// Load the model and query named by `config`, rewrite, and optionally
/// check that a second rewrite changes nothing.
fn rewrite_file(config: &RewriteConfig) -> anyhow::Result<ExprRef> {
    let model = EntityModel::from_yaml_file(&config.model_path)
        .with_context(|| format!("loading entity model {}", config.model_path.display()))?;

    let query = std::fs::read_to_string(&config.query_path)
        .with_context(|| format!("reading query {}", config.query_path.display()))?;
    let tree: Expr = serde_json::from_str(&query)
        .with_context(|| format!("parsing query {}", config.query_path.display()))?;
    let tree = Arc::new(tree);

    let depth = tree.depth();
    if depth > config.max_tree_depth {
        bail!(
            "query tree depth {} exceeds the configured maximum of {}",
            depth,
            config.max_tree_depth
        );
    }
    log::debug!(
        "Query tree depth {}, {} collection navigation access(es)",
        depth,
        count_collection_navigation_accesses(&tree, &model)
    );

    let rewritten = rewrite_query(tree, &model)?;

    if config.verify_idempotence {
        let again = rewrite_collection_navigations(&rewritten, &model)?;
        let remaining = count_collection_navigation_accesses(&rewritten, &model);
        if !Arc::ptr_eq(&again, &rewritten) || remaining > 0 {
            bail!(
                "rewrite is not idempotent: {} collection navigation access(es) left",
                remaining
            );
        }
        log::info!("Idempotence verified");
    }

    Ok(rewritten)
}

fn render(tree: &Expr, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(tree)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(tree)?,
        OutputFormat::Text => tree.to_string(),
    })
}

fn run(config: RewriteConfig) -> anyhow::Result<()> {
    let rewritten = rewrite_file(&config)?;
    println!("{}", render(&rewritten, config.output_format)?);
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = RewriteConfig::from_env()
        .map(|env| cli.into_cli_config(env))
        .and_then(RewriteConfig::from_cli);
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
