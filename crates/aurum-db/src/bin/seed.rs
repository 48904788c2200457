//! # Seed Data Generator
//!
//! Populates a development database with parties, board rates and opening
//! stock so the settlement flow can be exercised by hand.
//!
//! ## Usage
//! ```bash
//! # Use aurum.toml (or the platform default) for the database path
//! cargo run -p aurum-db --bin seed
//!
//! # Explicit database / config file
//! cargo run -p aurum-db --bin seed -- --db ./data/aurum.db
//! cargo run -p aurum-db --bin seed -- --config ./aurum.toml
//! ```
//!
//! Re-running is safe: existing stock records are left alone, parties are
//! upserted, and rates are only added to an empty rate table.

use chrono::Duration;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use aurum_core::{CallerContext, Party, StoneRate};
use aurum_db::{AurumConfig, Database, ErrorKind};

/// (id, name, address, gstin, state code, phone)
const PARTIES: &[(&str, &str, &str, Option<&str>, &str, Option<&str>)] = &[
    ("party-walkin", "Walk-in Customer", "Counter sale", None, "27", None),
    (
        "party-meera",
        "Meera Shah",
        "12 Hill Road, Bandra, Mumbai",
        None,
        "27",
        Some("9820012345"),
    ),
    (
        "party-kgold",
        "Karnavati Gold LLP",
        "CG Road, Ahmedabad",
        Some("24AAKFK1234M1Z2"),
        "24",
        Some("7926401234"),
    ),
];

/// (purity id, metal, purity bps, ₹/g in paise)
const METAL_RATES: &[(&str, &str, i64, i64)] = &[
    ("24K", "gold", 9_990, 720_000),
    ("22K", "gold", 9_167, 660_000),
    ("18K", "gold", 7_500, 540_000),
    ("SLV925", "silver", 9_250, 8_500),
];

/// (clarity, color, carat band in thousandths, ₹/ct in paise)
const DIAMOND_RATES: &[(&str, &str, i64, i64, i64)] = &[
    ("VS1", "F", 0, 299, 3_500_000),
    ("VS1", "F", 300, 999, 5_500_000),
    ("VVS2", "E", 0, 299, 4_800_000),
    ("SI1", "H", 0, 999, 2_200_000),
];

/// (item id, warehouse, opening quantity)
const OPENING_STOCK: &[(&str, &str, i64)] = &[
    ("ring-22k-solitaire", "wh-main", 6),
    ("chain-22k-rope-20in", "wh-main", 12),
    ("bangle-22k-pair", "wh-main", 8),
    ("bangle-22k-pair", "wh-vault", 4),
    ("earring-18k-diamond", "wh-main", 10),
    ("anklet-silver-925", "wh-main", 25),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Aurum Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!("  -c, --config <PATH>   aurum.toml to load");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = AurumConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    info!(path = %config.database.path.display(), "Seeding database");
    let db = Database::from_config(&config).await?;
    let ctx = CallerContext::new("seed");

    for (id, name, address, gstin, state_code, phone) in PARTIES {
        db.parties()
            .upsert(&Party {
                id: id.to_string(),
                name: name.to_string(),
                address: address.to_string(),
                gstin: gstin.map(str::to_string),
                state_code: state_code.to_string(),
                phone: phone.map(str::to_string),
                updated_at: ctx.now,
            })
            .await?;
    }
    info!(count = PARTIES.len(), "Parties upserted");

    // backdated a day so the seeded rates are already in force
    let effective_from = ctx.now - Duration::days(1);
    if db.rates().latest_metal_rate("22K", ctx.now).await?.is_none() {
        for (purity_id, metal, purity_bps, paise) in METAL_RATES {
            db.rates()
                .insert_metal_rate(purity_id, metal, *purity_bps, *paise, effective_from)
                .await?;
        }
        for (clarity, color, from, to, paise) in DIAMOND_RATES {
            db.rates()
                .insert_stone_rate(&StoneRate {
                    id: Uuid::new_v4().to_string(),
                    stone_type: "diamond".to_string(),
                    clarity: clarity.to_string(),
                    color: color.to_string(),
                    cut: "excellent".to_string(),
                    carat_from_milli: *from,
                    carat_to_milli: *to,
                    rate_per_carat_paise: *paise,
                    effective_from,
                })
                .await?;
        }
        info!(
            metal = METAL_RATES.len(),
            stone = DIAMOND_RATES.len(),
            "Board rates inserted"
        );
    } else {
        warn!("Rate table already populated; skipping rates");
    }

    let ledger = db.stock_ledger();
    let mut opened = 0;
    for (item_id, warehouse_id, quantity) in OPENING_STOCK {
        match ledger.open_record(&ctx, item_id, warehouse_id, *quantity).await {
            Ok(_) => opened += 1,
            Err(e) if e.kind() == ErrorKind::InvalidState => {
                warn!(item_id, warehouse_id, "Stock record exists; skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
    info!(opened, "Opening stock recorded");

    db.close().await;
    println!("✓ Seed complete");
    Ok(())
}
