mod pipeline;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use newswire_collector::Collector;
use newswire_common::subject::render_subject_now;
use newswire_common::{AiConfig, ChatConfig, MailConfig, PipelineContext, RunnerConfig};
use newswire_deliver::{html_to_wrapped_text, ChatDeliverer, EmailDeliverer};
use newswire_evaluator::{EvalParams, Evaluator};
use newswire_store::Store;
use newswire_writer::{CliOverrides, FooterLinks, WriterJob, WriterKind};

use pipeline::PipelineRunner;

#[derive(Parser)]
#[command(name = "newswire", about = "News intelligence pipeline runtime")]
struct Cli {
    /// SQLite database path (overrides NEWSWIRE_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run configured pipelines: collect, evaluate, write, deliver.
    Run(RunArgs),
    /// Collect the given sources into the store.
    Collect(CollectArgs),
    /// Score pending articles with the configured LLM.
    Evaluate(EvaluateArgs),
    /// Compose a digest artifact from stored scores.
    Write(WriteArgs),
    /// Send an HTML digest by e-mail.
    DeliverEmail(DeliverEmailArgs),
    /// Send a markdown digest to a group chat.
    DeliverChat(DeliverChatArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Run the pipeline with this name.
    #[arg(long, conflicts_with_all = ["id", "all"])]
    name: Option<String>,
    /// Run the pipeline with this id.
    #[arg(long, conflicts_with = "all")]
    id: Option<i64>,
    /// Run all enabled pipelines sequentially.
    #[arg(long)]
    all: bool,
    /// With --all, run pipelines marked debug_enabled=1 instead.
    #[arg(long)]
    debug_only: bool,
    /// Ignore per-pipeline weekday restrictions.
    #[arg(long)]
    ignore_weekday: bool,
}

#[derive(Args)]
struct CollectArgs {
    /// Comma-separated source keys.
    #[arg(long)]
    sources: String,
}

#[derive(Args)]
struct EvaluateArgs {
    #[arg(long, default_value_t = 24)]
    hours: i64,
    #[arg(long, default_value_t = 50)]
    limit: usize,
    #[arg(long, default_value = "news_evaluator")]
    evaluator_key: String,
    /// Restrict to these categories (repeatable).
    #[arg(long)]
    category: Vec<String>,
    /// Restrict to these source keys (repeatable).
    #[arg(long)]
    source: Vec<String>,
    #[arg(long)]
    pipeline_id: Option<i64>,
    /// Re-evaluate articles that already have a review.
    #[arg(long)]
    overwrite: bool,
    /// Print results without writing to the store.
    #[arg(long)]
    dry_run: bool,
    /// Write the assembled prompt to this path and exit.
    #[arg(long)]
    export_prompt: Option<PathBuf>,
}

#[derive(Args)]
struct WriteArgs {
    /// Writer type: email_news | info_html | chat_md | chat_news | chat_minigame.
    #[arg(long = "type")]
    writer_type: String,
    #[arg(long)]
    hours: Option<i64>,
    /// Output path; defaults next to the database.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Comma-separated category filter.
    #[arg(long, default_value = "")]
    categories: String,
    /// JSON weight overrides, e.g. '{"timeliness":0.2}'.
    #[arg(long, default_value = "")]
    weights: String,
    /// JSON source bonus overrides, e.g. '{"openai.research":2}'.
    #[arg(long, default_value = "")]
    source_bonus: String,
    /// Per-category limit: integer or JSON map with "default".
    #[arg(long)]
    limit_per_cat: Option<String>,
    #[arg(long)]
    per_source_cap: Option<i64>,
    #[arg(long)]
    min_score: Option<f64>,
    #[arg(long)]
    pipeline_id: Option<i64>,
    #[arg(long, default_value = "news_evaluator")]
    evaluator_key: String,
}

#[derive(Args)]
struct DeliverEmailArgs {
    /// Path of the HTML artifact to send.
    #[arg(long)]
    html: PathBuf,
    #[arg(long, default_value = "")]
    subject: String,
    /// Comma-separated recipients.
    #[arg(long, default_value = "")]
    to: String,
    /// Print what would be sent without sending.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct DeliverChatArgs {
    /// Path of the markdown artifact to send.
    #[arg(long)]
    file: PathBuf,
    /// Send as an interactive card.
    #[arg(long)]
    as_card: bool,
    /// Broadcast to all visible chats.
    #[arg(long, conflicts_with = "chat_id")]
    to_all: bool,
    #[arg(long)]
    chat_id: Option<String>,
    #[arg(long, default_value = "")]
    title: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("newswire=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = RunnerConfig::from_env();
    if let Some(db) = &cli.db {
        config.db_path = db.display().to_string();
    }
    let store = Store::open(&config.db_path).await?;

    match cli.command {
        Command::Run(args) => {
            config.log_redacted();
            let runner = PipelineRunner::new(store, config);
            runner
                .run(
                    args.name.as_deref(),
                    args.id,
                    args.all,
                    args.debug_only,
                    args.ignore_weekday,
                )
                .await?;
        }
        Command::Collect(args) => {
            let keys: Vec<String> = args
                .sources
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            if keys.is_empty() {
                bail!("--sources requires at least one source key");
            }
            let collector = Collector::new(store)?;
            let stats = collector.collect(&keys).await?;
            println!(
                "collected {} sources ({} failed): {} parsed, {} new, {} details, {} backfilled",
                stats.sources_run,
                stats.sources_failed,
                stats.parsed,
                stats.inserted,
                stats.details_stored,
                stats.details_backfilled
            );
        }
        Command::Evaluate(args) => {
            if let Some(path) = args.export_prompt {
                let prompt_path = std::env::var("AI_PROMPT_PATH").ok().map(PathBuf::from);
                let content =
                    newswire_evaluator::export_prompt(&store, prompt_path.as_deref()).await?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, content)?;
                println!("prompt exported to {}", path.display());
                return Ok(());
            }
            let ai_config = AiConfig::from_env()?;
            let evaluator = Evaluator::from_config(store, &ai_config)?;
            let ctx = PipelineContext::new(args.pipeline_id, args.evaluator_key.clone());
            let params = EvalParams {
                hours: args.hours,
                limit: args.limit.max(1),
                overwrite: args.overwrite,
                categories: args.category,
                sources: args.source,
                dry_run: args.dry_run,
            };
            let stats = evaluator.run(&ctx, &params).await?;
            println!(
                "{} candidates, {} evaluated, {} failed",
                stats.candidates, stats.evaluated, stats.failed
            );
        }
        Command::Write(args) => {
            let kind = WriterKind::parse(&args.writer_type)
                .ok_or_else(|| anyhow!("unknown writer type: {}", args.writer_type))?;
            let ambient = PipelineContext::from_env();
            let ctx = PipelineContext::new(
                args.pipeline_id.or(ambient.pipeline_id),
                if args.evaluator_key.is_empty() {
                    ambient.evaluator_key
                } else {
                    args.evaluator_key.clone()
                },
            );
            let overrides = CliOverrides {
                hours: args.hours,
                categories: args
                    .categories
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect(),
                weights_json: args.weights,
                bonus_json: args.source_bonus,
                limit_per_category: args.limit_per_cat,
                per_source_cap: args.per_source_cap,
                min_score: args.min_score,
            };
            let job = WriterJob::load(&store, &ctx, kind, &overrides).await?;
            let content = job.render(&store, &ctx, &FooterLinks::default()).await?;
            let out_path = args.output.unwrap_or_else(|| {
                PathBuf::from(format!("digest.{}", kind.extension()))
            });
            if let Some(parent) = out_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&out_path, content)?;
            println!("written: {}", out_path.display());
        }
        Command::DeliverEmail(args) => {
            let html = std::fs::read_to_string(&args.html)
                .with_context(|| format!("reading {}", args.html.display()))?;
            let subject = if args.subject.trim().is_empty() {
                render_subject_now("")
            } else {
                render_subject_now(&args.subject)
            };
            let receivers: Vec<String> = args
                .to
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
            if receivers.is_empty() {
                bail!("--to requires at least one recipient");
            }
            let text = html_to_wrapped_text(&html);
            if args.dry_run {
                println!(
                    "[DRY-RUN] subject={subject} to={} bytes={}",
                    receivers.join(","),
                    html.len()
                );
                return Ok(());
            }
            let mail_config = MailConfig::from_env()?;
            let plain_only = mail_config.plain_only;
            let deliverer = EmailDeliverer::new(mail_config)?;
            let html_payload = if plain_only { None } else { Some(html.as_str()) };
            let id = deliverer
                .send(&receivers, &subject, html_payload, &text, None)
                .await?;
            println!("sent: {} -> {} (id={id})", args.html.display(), receivers.join(","));
        }
        Command::DeliverChat(args) => {
            let markdown = std::fs::read_to_string(&args.file)
                .with_context(|| format!("reading {}", args.file.display()))?;
            let chat_config = ChatConfig::from_env()?;
            let deliverer = ChatDeliverer::new(chat_config)?;
            let title = render_subject_now(&args.title);
            if args.to_all {
                let delivered = deliverer.broadcast_card(&title, &markdown).await?;
                println!("broadcast to {delivered} chats");
            } else {
                let chat_id = args
                    .chat_id
                    .or_else(|| deliverer.default_chat_id().map(str::to_string))
                    .ok_or_else(|| anyhow!("--chat-id or CHAT_DEFAULT_CHAT_ID is required"))?;
                if args.as_card {
                    deliverer.send_card(&chat_id, &title, &markdown).await?;
                } else {
                    deliverer.send_text(&chat_id, &markdown).await?;
                }
                println!("sent to chat {chat_id}");
            }
        }
    }
    Ok(())
}
