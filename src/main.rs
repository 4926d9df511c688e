use anyhow::Context;
use clap::Parser;
use promo_booking::adapters::{build_dispatcher, MemoryStore, SystemClock};
use promo_booking::config::{CampaignConfig, Cli, Command, LogFormat, StorageBackend};
use promo_booking::core::{
    BookingRequest, CampaignService, CampaignStore, ClaimRef, Clock, GuestId,
};
use promo_booking::utils::error::{ErrorSeverity, PromoError};
use promo_booking::utils::validation::{parse_date, parse_time, Validate};
use promo_booking::utils::logger;
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 載入 TOML 配置
    let config = match CampaignConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    match config.log_format() {
        Ok(LogFormat::Json) => logger::init_json_logger(cli.verbose),
        _ => logger::init_cli_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting promo-booking for '{}'", config.campaign.name);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, &config).await {
        let Some(promo_error) = e.downcast_ref::<PromoError>() else {
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        };

        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Command failed: {:#} (Category: {:?}, Severity: {:?})",
            e,
            promo_error.category(),
            promo_error.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", promo_error.recovery_suggestion());

        eprintln!("❌ {}", promo_error.user_friendly_message());
        eprintln!("💡 建議: {}", promo_error.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match promo_error.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &Cli, config: &CampaignConfig) -> anyhow::Result<()> {
    if let Command::Check = cli.command {
        display_config_summary(config)?;
        println!("✅ Configuration is valid");
        return Ok(());
    }

    match config.storage_backend()? {
        StorageBackend::Memory => {
            tracing::warn!("⚠️ Using the in-memory store, nothing survives this invocation");
            execute(Arc::new(MemoryStore::new()), cli, config).await
        }
        StorageBackend::Postgres => run_with_postgres(cli, config).await,
    }
}

#[cfg(feature = "postgres")]
async fn run_with_postgres(cli: &Cli, config: &CampaignConfig) -> anyhow::Result<()> {
    let url = config
        .database_url()
        .context("storage.database_url is required for the postgres backend")?;
    let store = promo_booking::adapters::PgStore::connect(url).await?;
    store.migrate().await?;
    execute(Arc::new(store), cli, config).await
}

#[cfg(not(feature = "postgres"))]
async fn run_with_postgres(_cli: &Cli, _config: &CampaignConfig) -> anyhow::Result<()> {
    anyhow::bail!("this binary was built without the 'postgres' feature")
}

async fn execute<S: CampaignStore + 'static>(
    store: Arc<S>,
    cli: &Cli,
    config: &CampaignConfig,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = CampaignService::new(
        store,
        config.settings()?,
        build_dispatcher(config)?,
        clock.clone(),
    );

    if let Some(codes_file) = config.codes_file() {
        let added = service
            .registry()
            .import_csv_file(codes_file)
            .await
            .with_context(|| format!("seeding codes from {}", codes_file))?;
        tracing::info!("📥 {} new codes loaded from {}", added, codes_file);
    }

    match &cli.command {
        Command::Check => {}
        Command::Seed { file } => {
            let added = service.registry().import_csv_file(file).await?;
            println!("✅ Imported {} new codes from {}", added, file);
        }
        Command::Redeem {
            code,
            name: Some(name),
            contact: Some(contact),
        } => print_json(&service.redeem_with_identity(code, name, contact).await?)?,
        Command::Redeem { code, .. } => print_json(&service.redeem(code).await?)?,
        Command::Register {
            code,
            token,
            name,
            contact,
        } => {
            let claim = ClaimRef {
                code: code.trim().to_string(),
                token: token.parse().context("--token must be a UUID")?,
            };
            print_json(&service.finalize_identity(&claim, name, contact).await?)?;
        }
        Command::Availability { guest, from } => {
            let guest_id = parse_guest(guest)?;
            let from = match from {
                Some(raw) => parse_date("from", raw)?,
                None => clock.now().date(),
            };
            match service.list_availability(guest_id, from).await? {
                Some(availability) => print_json(&availability)?,
                None => anyhow::bail!("unknown guest {}", guest_id),
            }
        }
        Command::Book {
            guest,
            date,
            start,
            end,
            service: service_label,
        } => {
            let request = BookingRequest {
                guest_id: parse_guest(guest)?,
                date: parse_date("date", date)?,
                start: parse_time("start", start)?,
                end: parse_time("end", end)?,
                service_label: service_label.clone(),
            };
            print_json(&service.book(request).await?)?;
        }
    }

    Ok(())
}

fn parse_guest(raw: &str) -> anyhow::Result<GuestId> {
    raw.trim()
        .parse()
        .with_context(|| format!("'{}' is not a guest id", raw))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_config_summary(config: &CampaignConfig) -> anyhow::Result<()> {
    let window = config.promotion_window()?;

    println!("📋 Campaign: {}", config.campaign.name);
    println!(
        "   📅 Period: {} → {}",
        window.start_date.format("%d/%m/%Y"),
        window.end_date.format("%d/%m/%Y")
    );
    println!(
        "   🕐 Hours: {} - {} ({} min blocks)",
        window.daily_open.format("%H:%M"),
        window.daily_close.format("%H:%M"),
        window.block_duration.num_minutes()
    );
    if let Some(lead) = window.min_lead_time {
        println!("   ⏳ Minimum lead time: {} h", lead.num_hours());
    }
    println!("   🎟️ Claim TTL: {} min", config.claim_ttl().num_minutes());

    let grand_prize = config.grand_prize_codes();
    if !grand_prize.is_empty() {
        println!("   🏆 Grand prize codes: {}", grand_prize.join(", "));
    }

    println!("   💾 Storage: {:?}", config.storage_backend()?);
    if let Some(codes_file) = config.codes_file() {
        println!("   📥 Codes file: {}", codes_file);
    }
    println!("   📡 Channels: {:?}", config.channels()?);
    if let Some(owner) = config.owner_contact()? {
        println!("   👤 Owner contact: {} ({})", owner, owner.channel_name());
    }
    Ok(())
}
