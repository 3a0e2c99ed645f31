use clap::Parser;
use woo_export::config::cli::{ActivityArgs, Cli, Command, ExportArgs, ResetArgs};
use woo_export::config::{resolve_site, ExportSection, SettingsOverrides, SiteEntry};
use woo_export::core::{PageSource, RowSink};
use woo_export::utils::monitor::SystemMonitor;
use woo_export::utils::shutdown::ShutdownSignal;
use woo_export::utils::validation::{validate_identifier, Validate};
use woo_export::utils::{error::Result, logger};
use woo_export::{
    reset_stream, CsvSink, ExportSettings, ExportSummary, ExportTarget, FileCheckpointStore,
    PaginatedExporter, SitesFile, StopReason, WooCommerceSource,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    tracing::info!("Starting woo-export");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Export failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let sites = SitesFile::load_optional(&cli.config)?;

    match &cli.command {
        Command::List => {
            list_websites(sites.as_ref());
            Ok(())
        }
        Command::Reset(args) => reset(cli, sites.as_ref(), args).await,
        Command::Export(args) => export(cli, sites.as_ref(), args).await,
    }
}

fn export_section(sites: Option<&SitesFile>) -> Option<&ExportSection> {
    sites.and_then(|s| s.export.as_ref())
}

fn sink_for(settings: &ExportSettings, stream_id: &str) -> CsvSink {
    let sink = CsvSink::new(&settings.data_dir);
    match &settings.output {
        Some(output) => sink.with_output_override(stream_id, output),
        None => sink,
    }
}

async fn export(cli: &Cli, sites: Option<&SitesFile>, args: &ExportArgs) -> Result<()> {
    let (website, mut entry) = resolve_site(sites, args.website.as_deref(), SiteEntry::from_env())?;
    validate_identifier("website", &website)?;

    let settings = ExportSettings::resolve(
        export_section(sites),
        &args.overrides(cli.data_dir.clone()),
    );
    settings.validate()?;

    let stream_id = args.target.stream_id(&website);
    let sink = sink_for(&settings, &stream_id);
    let checkpoints = FileCheckpointStore::new(&settings.data_dir);

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_os_signals();
    let monitor = SystemMonitor::new(cli.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    println!("🚀 Starting {} export for website '{}'", args.target, website);

    let summary = match args.target.rest_resource() {
        Some(resource) => {
            let site = entry.rest_config(&website)?;
            if let Some(domain) = &site.domain {
                tracing::info!("📊 Website: {}", domain);
            }
            let source = WooCommerceSource::new(&site, resource, settings.request_timeout)?;
            run_export(
                source,
                sink,
                checkpoints,
                &settings,
                shutdown,
                monitor,
                &stream_id,
                args.target,
            )
            .await?
        }
        None => {
            if let Some(prefix) = &args.activity.prefix {
                entry.database_table_prefix = Some(prefix.clone());
            }
            let source =
                activity_source(&entry, &args.activity, &settings, &checkpoints, &stream_id)
                    .await?;
            run_export(
                source,
                sink,
                checkpoints,
                &settings,
                shutdown,
                monitor,
                &stream_id,
                args.target,
            )
            .await?
        }
    };

    print_summary(&summary, &sink_for(&settings, &stream_id), &stream_id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_export<S: PageSource>(
    source: S,
    sink: CsvSink,
    checkpoints: FileCheckpointStore,
    settings: &ExportSettings,
    shutdown: ShutdownSignal,
    monitor: SystemMonitor,
    stream_id: &str,
    target: ExportTarget,
) -> Result<ExportSummary> {
    let exporter = PaginatedExporter::new(source, sink, checkpoints, settings.export_options())
        .with_shutdown(shutdown)
        .with_monitor(monitor);
    exporter.run(stream_id, target.transform()).await
}

#[cfg(feature = "activity")]
async fn activity_source(
    entry: &SiteEntry,
    args: &ActivityArgs,
    settings: &ExportSettings,
    checkpoints: &FileCheckpointStore,
    stream_id: &str,
) -> Result<woo_export::adapters::MySqlActivitySource> {
    use woo_export::adapters::{window_start, ActivityFilter, MySqlActivitySource};

    let db = entry.database_config()?;
    let since = match args.days {
        Some(days) => {
            let fresh = window_start(days, chrono::Utc::now().timestamp());
            Some(checkpoints.pin_window_start(stream_id, fresh).await?)
        }
        None => None,
    };
    let filter = ActivityFilter {
        event_id: (!args.all_events).then_some(args.event),
        since,
        user: args.user.clone(),
    };
    tracing::info!("🔌 Connecting to {} on {}", db.name, db.host);
    MySqlActivitySource::connect(&db, filter, settings.request_timeout).await
}

#[cfg(not(feature = "activity"))]
async fn activity_source(
    _entry: &SiteEntry,
    _args: &ActivityArgs,
    _settings: &ExportSettings,
    _checkpoints: &FileCheckpointStore,
    _stream_id: &str,
) -> Result<WooCommerceSource> {
    Err(woo_export::EtlError::ConfigError {
        message: "this build does not include the `activity` feature".to_string(),
    })
}

fn print_summary(summary: &ExportSummary, sink: &CsvSink, stream_id: &str) {
    match summary.stopped_reason {
        StopReason::NothingFound => println!("❌ No records found."),
        StopReason::Interrupted => {
            println!("⚠️ Process interrupted by user. Progress has been saved.")
        }
        reason => println!("✓ Stopped: {}", reason),
    }
    println!(
        "\n✅ Finished! Records written: {} (skipped: {}, pages: {})",
        summary.total_records_persisted, summary.records_dropped, summary.pages_persisted
    );
    if summary.total_records_persisted > 0 {
        println!("📁 Results saved to {}", sink.location(stream_id));
    }
}

async fn reset(cli: &Cli, sites: Option<&SitesFile>, args: &ResetArgs) -> Result<()> {
    let (website, _) = resolve_site(sites, args.website.as_deref(), SiteEntry::default())?;
    validate_identifier("website", &website)?;

    let settings = ExportSettings::resolve(
        export_section(sites),
        &SettingsOverrides {
            data_dir: cli.data_dir.clone(),
            output: args.output.clone(),
            ..Default::default()
        },
    );
    let checkpoints = FileCheckpointStore::new(&settings.data_dir);

    println!("🧹 Resetting export data for website '{}'...", website);
    let mut removed = 0;
    for target in args.targets() {
        let stream_id = target.stream_id(&website);
        let outcome = reset_stream(&stream_id, &sink_for(&settings, &stream_id), &checkpoints).await?;
        removed += usize::from(outcome.sink_removed) + usize::from(outcome.checkpoint_cleared);
    }

    if removed > 0 {
        println!("✅ Reset complete! Removed {} files.", removed);
    } else {
        println!("ℹ️ No export files found to remove.");
    }
    Ok(())
}

fn list_websites(sites: Option<&SitesFile>) {
    let mut websites: Vec<(String, SiteEntry)> = sites
        .map(|file| {
            file.websites
                .iter()
                .map(|(name, entry)| (name.clone(), entry.clone()))
                .collect()
        })
        .unwrap_or_default();

    let env = SiteEntry::from_env();
    if env.consumer_key.is_some() || env.database_host.is_some() {
        websites.push(("default".to_string(), env));
    }

    if websites.is_empty() {
        println!("No websites configured");
        return;
    }

    println!("Available websites:");
    println!("{}", "-".repeat(40));
    for (name, entry) in websites {
        println!("{}", name);
        println!("   URL: {}", entry.site_url.as_deref().unwrap_or("Unknown URL"));
        println!("   Domain: {}", entry.domain.as_deref().unwrap_or("Unknown Domain"));
    }
}
