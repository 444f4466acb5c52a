use std::path::{Path, PathBuf};

use anyhow::Context;
use engine_logging::{engine_info, engine_warn, LogDestination};
use harvester_core::{Coverage, HarvestConfig, Session, SessionSummary};
use harvester_engine::{
    write_session_outputs, ConvergenceController, CsvRecordWriter, FetchSettings,
    ItemPassSettings, MetadataExtractor, MetadataPass, ReqwestFetcher, SessionRecord,
};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

use super::chromium::ChromiumBrowser;
use super::persistence::{self, Checkpointer};
use super::progress::LogProgress;

const CONFIG_FILENAME: &str = "harvester.ron";
const LOG_FILENAME: &str = "harvester.log";

pub async fn run_app() -> anyhow::Result<()> {
    let config = persistence::load_config(Path::new(CONFIG_FILENAME));
    engine_logging::initialize(LogDestination::Both, LevelFilter::Info, Path::new(LOG_FILENAME));
    engine_info!(
        "Harvesting {} (headless: {}, delay: {:?})",
        config.target_url,
        config.headless,
        config.delay()
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Interrupt received; stopping after the current step");
            interrupt.cancel();
        }
    });

    let summary = collect_links(&config, cancel.clone()).await?;
    print_closing_counts(&summary, config.expected_total);

    if summary.aborted || cancel.is_cancelled() {
        engine_warn!("Session was interrupted; skipping the metadata pass");
        return Ok(());
    }
    collect_metadata(&config, &summary.links, cancel).await
}

async fn collect_links(
    config: &HarvestConfig,
    cancel: CancellationToken,
) -> anyhow::Result<SessionSummary> {
    let target = config.target().context("invalid target_url")?;
    let output_dir = PathBuf::from(&config.output_dir);
    let seed = persistence::load_checkpoint(&output_dir, target.as_str());
    let checkpoint = Checkpointer::new(output_dir.clone(), target.as_str());
    let controller = ConvergenceController::from_config(config)
        .context("invalid base_url or target_url")?
        .with_cancel(cancel);

    let browser = ChromiumBrowser::launch(config.headless, config.browser_path.as_deref()).await?;
    let outcome = match browser.open_document(config.navigation_timeout()).await {
        Ok(doc) => {
            controller
                .run(&doc, Session::with_seed(target, seed), Some(&checkpoint))
                .await
        }
        Err(err) => {
            browser.close().await;
            return Err(err);
        }
    };
    browser.close().await;
    let outcome = outcome.context("catalog session failed")?;

    let scraped_at = chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string();
    let record = SessionRecord::from_summary(&outcome.summary, scraped_at);
    write_session_outputs(&output_dir, &config.output_stem, &record)
        .context("failed to write session outputs")?;
    if !outcome.summary.aborted {
        persistence::clear_checkpoint(&output_dir);
    }

    engine_info!(
        "Container '{}': {} initial, {} from pagination, {} from sweep",
        outcome.container_rule,
        outcome.initial_links,
        outcome.pagination.links_found(),
        outcome.sweep.new_links
    );
    Ok(outcome.summary)
}

async fn collect_metadata(
    config: &HarvestConfig,
    links: &[String],
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let output_dir = PathBuf::from(&config.output_dir);
    let page_settings = FetchSettings::from_config(config);
    let pages = ReqwestFetcher::new(page_settings.clone());
    let images = ReqwestFetcher::new(page_settings.for_images());
    let extractor = MetadataExtractor::default();
    let mut sink = CsvRecordWriter::create(&output_dir).context("failed to create metadata.csv")?;

    let report = MetadataPass::new(&pages, &images, &extractor, ItemPassSettings::from_config(config))
        .with_cancel(cancel)
        .run(links, &mut sink, &LogProgress)
        .await
        .context("failed to write metadata rows")?;

    println!(
        "Metadata: {} rows ({} complete, {} degraded, {} images) in {}",
        report.items,
        report.succeeded,
        report.failed,
        report.images_saved,
        output_dir.join(harvester_engine::METADATA_FILENAME).display()
    );
    Ok(())
}

fn print_closing_counts(summary: &SessionSummary, expected_total: Option<usize>) {
    println!("Total unique item links found: {}", summary.total_links);
    println!("Newly discovered this run: {}", summary.newly_discovered);
    if summary.degraded_container {
        println!("Warning: no collection container matched; the whole page was scanned");
    }
    if let Some(expected) = expected_total {
        match summary.coverage(expected) {
            Coverage::Percent(percent) => {
                println!("Coverage: {:.1}% of {} expected items", percent, expected)
            }
            Coverage::Extra(extra) => println!(
                "Found {} more than the {} expected items; some may be non-item links",
                extra, expected
            ),
        }
    }
}
