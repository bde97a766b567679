use corner_core::config::{AppConfig, LoadOptions};
use corner_db::{connect_with_settings, migrations, DemoSeedDataset, SeedResult};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let run_result = seed_and_verify(&pool).await;
        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demo dataset ready: inserted {} of {} requests ({} already present)",
                seeded.inserted,
                seeded.total,
                seeded.total as u64 - seeded.inserted.min(seeded.total as u64)
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn seed_and_verify(
    pool: &corner_db::DbPool,
) -> Result<SeedResult, (&'static str, String, u8)> {
    migrations::run_pending(pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let seeded = DemoSeedDataset::load(pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = DemoSeedDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if verification.all_present {
        Ok(seeded)
    } else {
        let failed = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        Err(("seed_verification", verification_message(&failed), 6u8))
    }
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "demo requests failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}
