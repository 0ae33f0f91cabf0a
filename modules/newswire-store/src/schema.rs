//! Additive startup migrations.
//!
//! Every statement here is idempotent: `CREATE TABLE IF NOT EXISTS` for new
//! installs, plus `PRAGMA table_info`-guarded `ALTER TABLE ADD COLUMN` for
//! columns that arrived after a table first shipped. Nothing destructive.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS info (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        publish TEXT NOT NULL,
        title TEXT NOT NULL,
        link TEXT NOT NULL,
        category TEXT,
        detail TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_info_link_unique ON info (link)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        key        TEXT NOT NULL UNIQUE,
        label      TEXT NOT NULL,
        enabled    INTEGER NOT NULL DEFAULT 1,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        key          TEXT NOT NULL UNIQUE,
        label        TEXT NOT NULL,
        enabled      INTEGER NOT NULL DEFAULT 1,
        category_key TEXT NOT NULL,
        script_path  TEXT NOT NULL,
        created_at   TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at   TEXT DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (category_key) REFERENCES categories(key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sources_category ON sources (category_key, enabled)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS source_runs (
        source_id   INTEGER NOT NULL UNIQUE,
        last_run_at TEXT,
        FOREIGN KEY (source_id) REFERENCES sources(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_metrics (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        key            TEXT NOT NULL UNIQUE,
        label          TEXT NOT NULL,
        rate_guide     TEXT,
        default_weight REAL,
        active         INTEGER NOT NULL DEFAULT 1,
        sort_order     INTEGER NOT NULL DEFAULT 0,
        created_at     TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at     TEXT DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ai_metrics_active ON ai_metrics (active, sort_order)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS info_ai_scores (
        info_id    INTEGER NOT NULL,
        metric_id  INTEGER NOT NULL,
        score      INTEGER NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (info_id, metric_id),
        FOREIGN KEY (info_id) REFERENCES info(id),
        FOREIGN KEY (metric_id) REFERENCES ai_metrics(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS info_ai_review (
        info_id       INTEGER NOT NULL,
        evaluator_key TEXT NOT NULL DEFAULT 'news_evaluator',
        final_score   REAL NOT NULL DEFAULT 0.0,
        ai_comment    TEXT NOT NULL,
        ai_summary    TEXT NOT NULL,
        raw_response  TEXT,
        created_at    TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at    TEXT DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (info_id, evaluator_key),
        FOREIGN KEY (info_id) REFERENCES info(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipelines (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        name              TEXT NOT NULL UNIQUE,
        enabled           INTEGER NOT NULL DEFAULT 1,
        description       TEXT,
        created_at        TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at        TEXT DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_classes (
        id    INTEGER PRIMARY KEY AUTOINCREMENT,
        key   TEXT NOT NULL UNIQUE,
        label TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_class_categories (
        pipeline_class_id INTEGER NOT NULL,
        category_key      TEXT NOT NULL,
        UNIQUE (pipeline_class_id, category_key),
        FOREIGN KEY (pipeline_class_id) REFERENCES pipeline_classes(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_class_evaluators (
        pipeline_class_id INTEGER NOT NULL,
        evaluator_key     TEXT NOT NULL,
        UNIQUE (pipeline_class_id, evaluator_key),
        FOREIGN KEY (pipeline_class_id) REFERENCES pipeline_classes(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_class_writers (
        pipeline_class_id INTEGER NOT NULL,
        writer_type       TEXT NOT NULL,
        UNIQUE (pipeline_class_id, writer_type),
        FOREIGN KEY (pipeline_class_id) REFERENCES pipeline_classes(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_filters (
        pipeline_id      INTEGER NOT NULL UNIQUE,
        all_categories   INTEGER NOT NULL DEFAULT 1,
        categories_json  TEXT,
        all_src          INTEGER NOT NULL DEFAULT 1,
        include_src_json TEXT,
        FOREIGN KEY (pipeline_id) REFERENCES pipelines(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_writers (
        pipeline_id        INTEGER NOT NULL UNIQUE,
        type               TEXT NOT NULL,
        hours              INTEGER NOT NULL,
        weights_json       TEXT,
        bonus_json         TEXT,
        limit_per_category TEXT,
        per_source_cap     INTEGER,
        FOREIGN KEY (pipeline_id) REFERENCES pipelines(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_writer_metric_weights (
        pipeline_id INTEGER NOT NULL,
        metric_id   INTEGER NOT NULL,
        weight      REAL NOT NULL DEFAULT 0.0,
        enabled     INTEGER NOT NULL DEFAULT 1,
        UNIQUE (pipeline_id, metric_id),
        FOREIGN KEY (pipeline_id) REFERENCES pipelines(id),
        FOREIGN KEY (metric_id) REFERENCES ai_metrics(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_deliveries_email (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        pipeline_id INTEGER NOT NULL,
        email       TEXT NOT NULL,
        subject_tpl TEXT NOT NULL,
        UNIQUE (pipeline_id),
        FOREIGN KEY (pipeline_id) REFERENCES pipelines(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_deliveries_chat (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        pipeline_id INTEGER NOT NULL,
        app_id      TEXT NOT NULL,
        app_secret  TEXT NOT NULL,
        to_all_chat INTEGER NOT NULL DEFAULT 0,
        chat_id     TEXT,
        title_tpl   TEXT,
        UNIQUE (pipeline_id),
        FOREIGN KEY (pipeline_id) REFERENCES pipelines(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_runs (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        pipeline_id INTEGER NOT NULL,
        started_at  TEXT DEFAULT CURRENT_TIMESTAMP,
        finished_at TEXT,
        status      TEXT,
        summary     TEXT,
        FOREIGN KEY (pipeline_id) REFERENCES pipelines(id)
    )
    "#,
];

/// Columns added after their table first shipped. New columns default to
/// NULL and are treated as absent.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("info", "store_link", "TEXT"),
    ("info", "creator", "TEXT"),
    ("info", "img_link", "TEXT"),
    ("info_ai_review", "ai_key_concepts", "TEXT"),
    ("info_ai_review", "ai_summary_long", "TEXT"),
    ("pipelines", "debug_enabled", "INTEGER NOT NULL DEFAULT 0"),
    ("pipelines", "evaluator_key", "TEXT NOT NULL DEFAULT 'news_evaluator'"),
    ("pipelines", "pipeline_class_id", "INTEGER"),
    ("pipelines", "weekdays_json", "TEXT"),
    ("sources", "addresses_json", "TEXT"),
];

/// Seed rows for `ai_metrics`, inserted only for keys not already present.
pub const DEFAULT_METRIC_SEED: &[(&str, &str, &str, f64, i64)] = &[
    (
        "timeliness",
        "时效性",
        "5-当天/最新；3-一月内或时间无关（长期有价值）；1-过时",
        0.14,
        10,
    ),
    (
        "game_relevance",
        "游戏相关性",
        "5-核心聚焦游戏议题/数据/案例；3-泛娱乐与游戏相关；1-无关",
        0.20,
        20,
    ),
    (
        "mobile_game_relevance",
        "手游相关性",
        "5-聚焦手游（产品/发行/买量/市场数据）；3-部分相关；1-无关",
        0.09,
        30,
    ),
    (
        "ai_relevance",
        "AI相关性",
        "5-模型/算法/评测/标杆案例；3-泛AI应用；1-无关",
        0.14,
        40,
    ),
    (
        "tech_relevance",
        "科技相关性",
        "5-芯片/云/硬件/基础设施；3-泛科技商业动态；1-无关",
        0.11,
        50,
    ),
    (
        "quality",
        "文章质量",
        "5-结构严谨数据充分；3-结构一般信息适中；1-水文/缺依据",
        0.13,
        60,
    ),
    (
        "insight",
        "洞察力",
        "5-罕见且深刻的观点/关联/因果；3-常见分析；1-无洞见",
        0.08,
        70,
    ),
    (
        "depth",
        "深度",
        "5-分层拆解背景充分逻辑完整；3-覆盖关键事实；1-浅尝辄止",
        0.06,
        80,
    ),
    (
        "novelty",
        "新颖度",
        "5-罕见消息或独到观点；3-常见进展/整合；1-无新意",
        0.05,
        90,
    ),
];

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }

    for (table, column, decl) in ADDITIVE_COLUMNS {
        if !column_exists(pool, table, column).await? {
            let alter = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
            sqlx::query(&alter).execute(pool).await?;
        }
    }

    seed_default_metrics(pool).await?;
    Ok(())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .any(|row| row.get::<String, _>("name") == column))
}

async fn seed_default_metrics(pool: &SqlitePool) -> Result<()> {
    for (key, label, rate_guide, default_weight, sort_order) in DEFAULT_METRIC_SEED {
        sqlx::query(
            r#"
            INSERT INTO ai_metrics (key, label, rate_guide, default_weight, sort_order)
            SELECT ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM ai_metrics WHERE key = ?)
            "#,
        )
        .bind(key)
        .bind(label)
        .bind(rate_guide)
        .bind(default_weight)
        .bind(sort_order)
        .bind(key)
        .execute(pool)
        .await?;
    }
    Ok(())
}
