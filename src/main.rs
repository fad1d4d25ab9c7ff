use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sku_matcher::cli::{Cli, Commands};
use sku_matcher::index::BuildProgress;
use sku_matcher::{MatcherConfig, MatcherSettings, Prediction, ProductMatcher};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = MatcherConfig::load(cli.config.as_deref()).context("設定の読み込みに失敗")?;
    if let Some(images) = &cli.images {
        config.reference_images_dir = images.clone();
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog_csv_path = catalog.clone();
    }

    match cli.command {
        Commands::Index { json } => {
            let settings = config.validate()?;
            let (matcher, report) = build_matcher(settings, !json)?;

            if json {
                let out = serde_json::json!({
                    "skus": matcher.index().len(),
                    "fingerprint": matcher.index().fingerprint(),
                    "report": report,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            println!("✔ インデックス構築完了");
            println!("  参照フォルダ: {}", report.root.display());
            println!("  SKU数: {}", report.indexed_skus);
            println!("  参照画像: {}枚", report.indexed_images);
            println!("  フィンガープリント: {}", matcher.index().fingerprint());
            if let Some(issue) = &report.root_issue {
                println!("  ⚠ 参照フォルダ: {:?}", issue);
            }
            if let Some(issue) = &report.catalog_issue {
                println!("  ⚠ カタログ: {}", issue);
            }
            for skipped in &report.skipped_images {
                println!("  ⚠ スキップ: {} ({:?})", skipped.path.display(), skipped.reason);
            }
            if !report.sparse_images.is_empty() {
                println!("  記述子不足の画像: {}枚（色相のみ使用）", report.sparse_images.len());
            }
            if !report.dropped_skus.is_empty() {
                println!("  除外したSKU: {}", report.dropped_skus.join(", "));
            }
        }

        Commands::Predict { files } => {
            let settings = config.validate()?;
            let (matcher, _) = build_matcher(settings, false)?;

            for path in &files {
                let line = predict_file(&matcher, path);
                println!("{}", serde_json::to_string(&line)?);
            }
        }

        Commands::Config { show, init } => {
            if init {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => MatcherConfig::config_path()?,
                };
                MatcherConfig::default().save(&path)?;
                println!("✔ デフォルト設定を書き出しました: {}", path.display());
            }

            if show || !init {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sku_matcher=debug" } else { "sku_matcher=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_matcher(
    settings: MatcherSettings,
    show_progress: bool,
) -> Result<(ProductMatcher, sku_matcher::BuildReport)> {
    let bar = if show_progress {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} 参照画像")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let result = ProductMatcher::build_with_progress(settings, |event| match event {
        BuildProgress::Started { total_images } => bar.set_length(total_images as u64),
        BuildProgress::ImageDone => bar.inc(1),
    })
    .context("インデックス構築に失敗")?;

    bar.finish_and_clear();
    Ok(result)
}

#[derive(Serialize)]
struct PredictLine {
    file: String,
    predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn predict_file(matcher: &ProductMatcher, path: &Path) -> PredictLine {
    let file = path.display().to_string();
    let result = std::fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| matcher.predict_bytes(&bytes).map_err(anyhow::Error::from));

    match result {
        Ok(predictions) => PredictLine {
            file,
            predictions,
            error: None,
        },
        Err(e) => {
            tracing::warn!("照合できません: {} ({})", file, e);
            PredictLine {
                file,
                predictions: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}
