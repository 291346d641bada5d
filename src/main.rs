use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinic_cache::cache::CacheManager;
use clinic_cache::clinic::{
    CardRecord, ClinicCaches, ClinicDirectory, ClinicStore, Doctor, MemoryStore, Office, Patient,
    Specialization,
};
use clinic_cache::config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clinic_cache=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting clinic cache...");

    let config = Config::from_env()?;
    info!(
        default_max_size = config.cache.default.max_size,
        default_ttl_secs = config.cache.default.ttl.as_secs(),
        overrides = config.cache.overrides.len(),
        "Configuration loaded"
    );

    let manager = CacheManager::new();
    let caches = ClinicCaches::register(&manager, &config.cache)?;
    info!("Cache regions: {:?}", manager.region_names());

    let sweeper = config
        .cache
        .sweep_interval
        .map(|interval| manager.spawn_sweeper(interval))
        .transpose()?;

    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(50)));
    seed(&store).await?;
    let directory = ClinicDirectory::new(Arc::clone(&store), caches);

    // A burst of identical reads should reach the store once per lookup.
    let patients = join_all((0..32).map(|_| directory.patient(1))).await;
    let doctors = join_all((0..32).map(|_| directory.doctors())).await;
    for result in patients {
        result?;
    }
    for result in doctors {
        result?;
    }
    directory.card_history(1).await?;
    directory.offices().await?;
    directory.specializations().await?;
    info!(store_reads = store.reads(), "Warm-up burst finished");

    for stats in manager.stats() {
        info!(
            region = %stats.region,
            entries = stats.entries,
            hits = stats.hits,
            misses = stats.misses,
            loads = stats.loads,
            hit_ratio = stats.hit_ratio(),
            "Region stats"
        );
    }

    info!("Ready. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    if let Some(sweeper) = sweeper {
        sweeper.stop();
    }
    manager.clear_all();

    Ok(())
}

async fn seed(store: &MemoryStore) -> anyhow::Result<()> {
    store
        .save_specialization(Specialization {
            id: 1,
            name: "Therapy".to_string(),
        })
        .await?;
    store
        .save_office(Office {
            id: 1,
            number: "104".to_string(),
            floor: 1,
        })
        .await?;
    store
        .save_doctor(Doctor {
            id: 1,
            full_name: "Anna Petrova".to_string(),
            specialization_id: 1,
            office_id: Some(1),
        })
        .await?;
    store
        .save_patient(Patient {
            id: 1,
            full_name: "Ivan Sokolov".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1987, 9, 3).unwrap_or_default(),
            phone: Some("+7 900 000-00-00".to_string()),
        })
        .await?;
    store
        .add_card_record(CardRecord {
            id: 1,
            patient_id: 1,
            doctor_id: 1,
            visited_at: Utc.with_ymd_and_hms(2024, 2, 14, 9, 0, 0).single().unwrap_or_default(),
            diagnosis: "Seasonal allergy".to_string(),
            notes: None,
        })
        .await?;
    Ok(())
}
