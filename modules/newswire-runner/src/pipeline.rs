//! Per-pipeline orchestration: gate, validate, collect, evaluate, write,
//! deliver. Failures are isolated per pipeline; the `--all` loop always
//! continues.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use tracing::warn;

use newswire_collector::Collector;
use newswire_common::datetime::offset_for;
use newswire_common::subject::{artifact_ts, date_zh, render_subject};
use newswire_common::{weekday, AiConfig, ChatConfig, MailConfig, PipelineContext, RunnerConfig};
use newswire_deliver::{html_to_wrapped_text, ChatDeliverer, EmailDeliverer};
use newswire_evaluator::{EvalParams, Evaluator};
use newswire_store::{
    Delivery, PipelineClassSets, PipelineFilters, PipelineRow, SourceRow, Store,
};
use newswire_writer::{CliOverrides, FooterLinks, WriterJob, WriterKind};

/// Sources younger than this are not re-collected.
const COLLECT_WINDOW_HOURS: i64 = 2;
const EVALUATE_LIMIT: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Done,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerOptions {
    pub debug_only: bool,
    pub ignore_weekday: bool,
    /// Skip debug pipelines in scheduled `--all` runs.
    pub skip_debug: bool,
}

pub struct PipelineRunner {
    store: Store,
    config: RunnerConfig,
}

impl PipelineRunner {
    pub fn new(store: Store, config: RunnerConfig) -> Self {
        Self { store, config }
    }

    /// Run pipelines by name, id, or all. Per-pipeline failures never
    /// abort the batch or the process exit code.
    pub async fn run(
        &self,
        name: Option<&str>,
        id: Option<i64>,
        all: bool,
        debug_only: bool,
        ignore_weekday: bool,
    ) -> Result<()> {
        let single_target = name.is_some() || id.is_some();
        let pipelines: Vec<PipelineRow> = if let Some(id) = id {
            self.store.pipeline_by_id(id).await?.into_iter().collect()
        } else if let Some(name) = name {
            self.store.pipeline_by_name(name).await?.into_iter().collect()
        } else if all {
            if debug_only {
                self.store.debug_pipelines().await?
            } else {
                self.store.enabled_pipelines().await?
            }
        } else {
            bail!("one of --name, --id or --all is required");
        };

        if pipelines.is_empty() {
            println!("no matching pipelines");
            return Ok(());
        }

        let options = RunnerOptions {
            debug_only,
            ignore_weekday,
            skip_debug: !single_target,
        };

        for pipeline in &pipelines {
            if debug_only && !pipeline.is_debug() {
                continue;
            }
            if !debug_only && !pipeline.is_enabled() {
                println!("[SKIP] {} (disabled)", pipeline.name);
                continue;
            }
            println!("[RUN] {} (id={})", pipeline.name, pipeline.id);
            let run_id = self.store.start_pipeline_run(pipeline.id).await.ok();
            let outcome = self.run_one(pipeline, options).await;
            let (status, detail) = match &outcome {
                RunOutcome::Done => ("done", String::new()),
                RunOutcome::Skipped(reason) => ("skipped", reason.clone()),
                RunOutcome::Failed(reason) => ("failed", reason.clone()),
            };
            if let Some(run_id) = run_id {
                if let Err(e) = self.store.finish_pipeline_run(run_id, status, &detail).await {
                    warn!(pipeline = pipeline.id, error = %e, "failed to record pipeline run");
                }
            }
            match outcome {
                RunOutcome::Done => println!("[DONE] {}", pipeline.name),
                RunOutcome::Skipped(reason) => println!("[SKIP] {}: {reason}", pipeline.name),
                RunOutcome::Failed(reason) => println!("[FAIL] {}: {reason}", pipeline.name),
            }
        }
        Ok(())
    }

    pub async fn run_one(&self, pipeline: &PipelineRow, options: RunnerOptions) -> RunOutcome {
        if options.skip_debug && pipeline.is_debug() && !options.debug_only {
            return RunOutcome::Skipped("debug_enabled=1".to_string());
        }

        // Weekday gating. Debug runs and FORCE_RUN bypass it.
        if !options.debug_only && !options.ignore_weekday && !self.config.force_run {
            if let Some(reason) = weekday_skip_reason(
                pipeline.weekdays_json.as_deref(),
                &self.config.tz,
            ) {
                return RunOutcome::Skipped(reason);
            }
        }

        match self.run_steps(pipeline).await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Failed(format!("{e:#}")),
        }
    }

    async fn run_steps(&self, pipeline: &PipelineRow) -> Result<RunOutcome> {
        // --- ValidateClass ---
        let class_sets = match pipeline.pipeline_class_id {
            Some(class_id) => self.store.class_sets(class_id).await?,
            None => PipelineClassSets::default(),
        };
        let filters = self.store.pipeline_filters(pipeline.id).await?;
        let writer_cfg = self
            .store
            .pipeline_writer(pipeline.id)
            .await?
            .ok_or_else(|| anyhow!("pipeline {} has no writer configured", pipeline.name))?;
        let writer_kind = WriterKind::parse(&writer_cfg.writer_type)
            .ok_or_else(|| anyhow!("unknown writer type: {}", writer_cfg.writer_type))?;

        if !class_sets.writers.is_empty() && !class_sets.writers.contains(&writer_cfg.writer_type) {
            bail!("writer type {} not allowed by pipeline class", writer_cfg.writer_type);
        }
        if !class_sets.evaluators.is_empty()
            && !class_sets.evaluators.contains(&pipeline.evaluator_key)
        {
            bail!("evaluator {} not allowed by pipeline class", pipeline.evaluator_key);
        }

        // Delivery invariant is checked before doing any work.
        let delivery = self.store.delivery(pipeline.id).await?;

        let categories = effective_categories(&filters, &class_sets);
        let sources = self.store.all_sources().await?;
        let selected = select_sources(&sources, &filters, &class_sets, &categories);
        if selected.is_empty() {
            return Ok(RunOutcome::Skipped("no matching sources".to_string()));
        }
        let selected_keys: Vec<String> = selected.iter().map(|s| s.key.clone()).collect();
        println!(
            "[PIPELINE {}] start {} | writer={} | evaluator={} | categories={} | sources={}",
            pipeline.id,
            pipeline.name,
            writer_cfg.writer_type,
            pipeline.evaluator_key,
            if categories.is_empty() {
                "all".to_string()
            } else {
                categories.join(",")
            },
            selected_keys.join(","),
        );

        // --- Collect ---
        let runnable = self.plan_collect(&selected).await?;
        if runnable.is_empty() {
            println!("[COLLECT] all sources ran within {COLLECT_WINDOW_HOURS}h, skipping");
        } else {
            println!("[COLLECT] {}", runnable.join(","));
            let collector = Collector::new(self.store.clone())?;
            let stats = collector.collect(&runnable).await?;
            println!(
                "[COLLECT] {} sources, {} new rows",
                stats.sources_run, stats.inserted
            );
        }

        // --- Evaluate ---
        let ctx = PipelineContext::new(Some(pipeline.id), pipeline.evaluator_key.clone());
        let hours = writer_cfg.hours.filter(|h| *h > 0).unwrap_or(24);
        let ai_config = AiConfig::from_env().context("evaluator configuration")?;
        let evaluator = Evaluator::from_config(self.store.clone(), &ai_config)?;
        let params = EvalParams {
            hours,
            limit: EVALUATE_LIMIT,
            overwrite: false,
            categories: categories.clone(),
            sources: selected_keys.clone(),
            dry_run: false,
        };
        println!(
            "[EVAL] {} hours={hours} cats={} srcs={}",
            ctx.evaluator_key,
            categories.join(","),
            selected_keys.len()
        );
        let eval_stats = evaluator.run(&ctx, &params).await?;
        println!(
            "[EVAL] {} evaluated, {} failed",
            eval_stats.evaluated, eval_stats.failed
        );

        // --- Write ---
        let offset = offset_for(&self.config.tz);
        let now = Utc::now();
        let ts = artifact_ts(now, offset);
        let footer = match &delivery {
            Delivery::Email(email) => FooterLinks::build(
                std::env::var("FRONTEND_BASE_URL").ok().as_deref(),
                Some(&email.email),
                Some(pipeline.id),
            ),
            Delivery::Chat(_) => FooterLinks::default(),
        };
        let job = WriterJob::load(&self.store, &ctx, writer_kind, &CliOverrides::default()).await?;
        let content = job.render(&self.store, &ctx, &footer).await?;

        let out_dir = self.output_dir(pipeline.id);
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;
        let out_path = out_dir.join(format!("{ts}.{}", writer_kind.extension()));
        std::fs::write(&out_path, &content)
            .with_context(|| format!("writing {}", out_path.display()))?;
        println!("[WRITE] {}", out_path.display());

        // --- Deliver ---
        match delivery {
            Delivery::Email(email) => {
                self.deliver_email(pipeline, &email.email, &email.subject_tpl, &content, &out_path, &footer, offset)
                    .await?;
            }
            Delivery::Chat(chat) => {
                let chat_config = ChatConfig::from_env()
                    .unwrap_or_else(|_| ChatConfig {
                        api_base: "https://open.feishu.cn".to_string(),
                        app_id: String::new(),
                        app_secret: String::new(),
                        default_chat_id: None,
                    })
                    .with_credentials(&chat.app_id, &chat.app_secret);
                if chat_config.app_id.is_empty() || chat_config.app_secret.is_empty() {
                    bail!("chat delivery is missing app credentials");
                }
                let deliverer = ChatDeliverer::new(chat_config)?;
                let title = render_subject(
                    chat.title_tpl.as_deref().unwrap_or(""),
                    &ts,
                    &date_zh(now, offset),
                );
                if chat.to_all_chat != 0 {
                    let delivered = deliverer.broadcast_card(&title, &content).await?;
                    println!("[DELIVER] chat broadcast to {delivered} chats");
                } else {
                    let chat_id = chat
                        .chat_id
                        .as_deref()
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| anyhow!("chat delivery is missing chat_id"))?;
                    deliverer.send_card(chat_id, &title, &content).await?;
                    println!("[DELIVER] chat card sent");
                }
            }
        }

        Ok(RunOutcome::Done)
    }

    #[allow(clippy::too_many_arguments)]
    async fn deliver_email(
        &self,
        pipeline: &PipelineRow,
        to: &str,
        subject_tpl: &str,
        html: &str,
        out_path: &Path,
        footer: &FooterLinks,
        offset: chrono::FixedOffset,
    ) -> Result<()> {
        let mail_config = MailConfig::from_env().context("mail configuration")?;
        let deliverer = EmailDeliverer::new(mail_config)?;

        let now = Utc::now();
        let subject = render_subject(subject_tpl, &artifact_ts(now, offset), &date_zh(now, offset));

        let mut text = html_to_wrapped_text(html);
        let mut footer_lines = Vec::new();
        if let Some(url) = &footer.unsubscribe_url {
            footer_lines.push(format!("退订：{url}"));
        }
        if let Some(url) = &footer.manage_url {
            footer_lines.push(format!("管理：{url}"));
        }
        if !footer_lines.is_empty() {
            text = format!("{text}\n\n{}", footer_lines.join("\n"));
        }

        // Plain-only mode keeps on-disk copies of what actually went out.
        let html_payload = if deliverer.plain_only() {
            let txt_path = out_path.with_extension("txt");
            if let Err(e) = std::fs::write(&txt_path, &text) {
                warn!(path = %txt_path.display(), error = %e, "failed to write plain copy");
            } else {
                println!("[DELIVER] wrote plain copy: {}", txt_path.display());
            }
            let eml_path = out_path.with_extension("eml");
            let eml = format!(
                "From: {}\nTo: {to}\nSubject: {subject}\nMIME-Version: 1.0\nContent-Type: text/plain; charset=\"utf-8\"\n\n{text}",
                std::env::var("MAIL_FROM").unwrap_or_default(),
            );
            if let Err(e) = std::fs::write(&eml_path, eml) {
                warn!(path = %eml_path.display(), error = %e, "failed to write eml dump");
            }
            None
        } else {
            Some(html)
        };

        let receivers = vec![to.to_string()];
        let message_id = deliverer
            .send(
                &receivers,
                &subject,
                html_payload,
                &text,
                footer.unsubscribe_url.as_deref(),
            )
            .await?;
        println!(
            "[DELIVER] email to {to} (pipeline={}, id={message_id})",
            pipeline.id
        );
        Ok(())
    }

    fn output_dir(&self, pipeline_id: i64) -> PathBuf {
        let data_dir = Path::new(&self.config.db_path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("data"));
        data_dir.join("output").join(format!("pipeline-{pipeline_id}"))
    }

    /// Among the pipeline's sources, run only those whose last run is
    /// older than the collect window or absent.
    pub async fn plan_collect(&self, sources: &[SourceRow]) -> Result<Vec<String>> {
        let cutoff = Utc::now() - Duration::hours(COLLECT_WINDOW_HOURS);
        let mut runnable = Vec::new();
        for source in sources {
            match self.store.last_run_at(source.id).await? {
                Some(last) if last >= cutoff => {}
                _ => runnable.push(source.key.clone()),
            }
        }
        Ok(runnable)
    }
}

/// Reason to skip for weekday gating, or None when allowed.
pub fn weekday_skip_reason(weekdays_json: Option<&str>, tz: &str) -> Option<String> {
    let days = weekday::coerce(weekdays_json);
    let offset = offset_for(tz);
    let today = newswire_common::datetime::today_iso_weekday(offset);
    match &days {
        None => None,
        Some(days) if weekday::is_allowed(Some(days), today) => None,
        Some(days) => Some(format!("weekday not allowed (today={today}; allowed={days:?})")),
    }
}

/// Explicit category selection: the filter's set when not "all", else the
/// class's allowed set (empty when unrestricted). Class restrictions
/// always intersect.
pub fn effective_categories(filters: &PipelineFilters, class_sets: &PipelineClassSets) -> Vec<String> {
    let mut categories: Vec<String> = if filters.all_categories {
        let mut all: Vec<String> = class_sets.categories.iter().cloned().collect();
        all.sort();
        all
    } else {
        filters.categories.clone()
    };
    if !class_sets.categories.is_empty() {
        categories.retain(|c| class_sets.categories.contains(c));
    }
    categories
}

/// The pipeline's admitted sources: enabled, category allowed by the
/// class, and (when not "all categories") either in the selected
/// categories or explicitly allow-listed. The class restriction dominates
/// the allow-list.
pub fn select_sources(
    sources: &[SourceRow],
    filters: &PipelineFilters,
    class_sets: &PipelineClassSets,
    selected_categories: &[String],
) -> Vec<SourceRow> {
    let include: HashSet<&str> = filters.include_src.iter().map(String::as_str).collect();
    sources
        .iter()
        .filter(|source| source.is_enabled())
        .filter(|source| {
            class_sets.categories.is_empty() || class_sets.categories.contains(&source.category_key)
        })
        .filter(|source| {
            filters.all_categories
                || selected_categories.contains(&source.category_key)
                || include.contains(source.key.as_str())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: i64, key: &str, category: &str, enabled: i64) -> SourceRow {
        SourceRow {
            id,
            key: key.into(),
            label: key.into(),
            enabled,
            category_key: category.into(),
            script_path: String::new(),
        }
    }

    fn class(categories: &[&str]) -> PipelineClassSets {
        PipelineClassSets {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            evaluators: HashSet::new(),
            writers: HashSet::new(),
        }
    }

    #[test]
    fn weekday_gate_semantics() {
        // Unrestricted and full-week sets always pass.
        assert!(weekday_skip_reason(None, "Asia/Shanghai").is_none());
        assert!(weekday_skip_reason(Some("[1,2,3,4,5,6,7]"), "Asia/Shanghai").is_none());
        // Empty set never runs.
        assert!(weekday_skip_reason(Some("[]"), "Asia/Shanghai").is_some());
        // A set excluding today is skipped: build the complement of today.
        let today = newswire_common::datetime::today_iso_weekday(offset_for("Asia/Shanghai"));
        let other = if today == 1 { 2 } else { 1 };
        assert!(weekday_skip_reason(Some(&format!("[{other}]")), "Asia/Shanghai").is_some());
        assert!(weekday_skip_reason(Some(&format!("[{today}]")), "Asia/Shanghai").is_none());
    }

    #[test]
    fn allow_listed_source_included_only_when_class_admits_its_category() {
        // Scenario: all_categories=0, categories=["tech"], include_src
        // carries a game-category source.
        let sources = vec![
            source(1, "tech-feed", "tech", 1),
            source(2, "game-feed", "game", 1),
            source(3, "disabled-feed", "tech", 0),
        ];
        let filters = PipelineFilters {
            all_categories: false,
            categories: vec!["tech".into()],
            all_src: false,
            include_src: vec!["game-feed".into()],
        };

        // Class admits both categories: the allow-list wins.
        let class_both = class(&["tech", "game"]);
        let categories = effective_categories(&filters, &class_both);
        let selected = select_sources(&sources, &filters, &class_both, &categories);
        let keys: Vec<&str> = selected.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["tech-feed", "game-feed"]);

        // Class admits only tech: the class restriction dominates and the
        // allow-listed game source is excluded.
        let class_tech = class(&["tech"]);
        let categories = effective_categories(&filters, &class_tech);
        let selected = select_sources(&sources, &filters, &class_tech, &categories);
        let keys: Vec<&str> = selected.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["tech-feed"]);
    }

    #[tokio::test]
    async fn weekend_pipeline_skips_on_other_days_unless_ignored() {
        let store = Store::in_memory().await.unwrap();
        let today = newswire_common::datetime::today_iso_weekday(offset_for("Asia/Shanghai"));
        let other = if today == 1 { 2 } else { 1 };
        sqlx::query("INSERT INTO pipelines (name, enabled, weekdays_json) VALUES ('p', 1, ?)")
            .bind(format!("[{other}]"))
            .execute(store.pool())
            .await
            .unwrap();
        let pipeline = store.pipeline_by_name("p").await.unwrap().unwrap();

        let config = RunnerConfig {
            db_path: ":memory:".into(),
            tz: "Asia/Shanghai".into(),
            force_run: false,
        };
        let runner = PipelineRunner::new(store, config);

        let outcome = runner.run_one(&pipeline, RunnerOptions::default()).await;
        assert!(matches!(outcome, RunOutcome::Skipped(reason) if reason.contains("weekday")));

        // --ignore-weekday forces the gate open; the pipeline then fails
        // later for having no writer configured, which proves it ran.
        let outcome = runner
            .run_one(
                &pipeline,
                RunnerOptions {
                    ignore_weekday: true,
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(outcome, RunOutcome::Failed(reason) if reason.contains("no writer")));
    }

    #[test]
    fn effective_categories_intersect_with_class() {
        let filters = PipelineFilters {
            all_categories: false,
            categories: vec!["tech".into(), "game".into()],
            all_src: true,
            include_src: Vec::new(),
        };
        let categories = effective_categories(&filters, &class(&["tech"]));
        assert_eq!(categories, vec!["tech".to_string()]);

        // all_categories with a class expands to the class set.
        let all = PipelineFilters::default();
        let categories = effective_categories(&all, &class(&["game", "tech"]));
        assert_eq!(categories, vec!["game".to_string(), "tech".to_string()]);

        // all_categories without a class means unrestricted (empty).
        let categories = effective_categories(&all, &class(&[]));
        assert!(categories.is_empty());
    }
}
