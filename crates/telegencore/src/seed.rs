//! Default tariffs for `seed-tariffs`

use rusqlite::Connection;

use crate::core::AppResult;
use crate::models::{Platform, TariffCode};
use crate::storage::billing::{delete_all_tariffs, upsert_period, upsert_tariff, NewTariff};

struct TariffSeed {
    tariff: NewTariff<'static>,
    /// (months, price in kopiyky)
    periods: &'static [(i64, i64)],
}

fn default_tariffs() -> [TariffSeed; 3] {
    [
        TariffSeed {
            tariff: NewTariff {
                code: TariffCode::Free,
                name: "Welcome",
                description: Some("Безкоштовний тестовий період для ознайомлення з сервісом"),
                channels_available: 1,
                sources_available: 2,
                generations_available: 300,
                platform: Platform::Both,
                trial_duration_days: 10,
            },
            // The trial subscription points at this period
            periods: &[(1, 0)],
        },
        TariffSeed {
            tariff: NewTariff {
                code: TariffCode::Basic,
                name: "Basic",
                description: Some("Базовий тариф для початківців"),
                channels_available: 1,
                sources_available: 5,
                generations_available: 1000,
                platform: Platform::Tg,
                trial_duration_days: 0,
            },
            periods: &[(1, 29_900), (6, 149_900), (9, 199_900), (12, 239_900)],
        },
        TariffSeed {
            tariff: NewTariff {
                code: TariffCode::Pro,
                name: "Pro",
                description: Some("Професійний тариф для досвідчених користувачів"),
                channels_available: 3,
                sources_available: 5,
                generations_available: 3000,
                platform: Platform::Both,
                trial_duration_days: 0,
            },
            periods: &[(1, 59_900), (6, 299_900), (9, 399_900), (12, 479_900)],
        },
    ]
}

/// What a seeding run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub cleared: usize,
    pub tariffs_created: Vec<String>,
    pub tariffs_updated: Vec<String>,
    pub periods_created: usize,
}

/// Upserts the free, basic and pro tariffs with their periods in one transaction.
///
/// With `clear`, all tariffs (and, through cascades, their periods and
/// subscriptions) are deleted first.
pub fn seed_tariffs(conn: &Connection, clear: bool) -> AppResult<SeedReport> {
    let tx = conn.unchecked_transaction()?;
    let mut report = SeedReport::default();

    if clear {
        report.cleared = delete_all_tariffs(&tx)?;
        log::warn!("🧹 Deleted {} tariffs", report.cleared);
    }

    for seed in default_tariffs() {
        let (tariff, inserted) = upsert_tariff(&tx, &seed.tariff)?;
        if inserted {
            report.tariffs_created.push(tariff.name.clone());
        } else {
            report.tariffs_updated.push(tariff.name.clone());
        }
        for &(months, price) in seed.periods {
            if upsert_period(&tx, tariff.id, months, price)? {
                report.periods_created += 1;
            }
        }
    }

    tx.commit()?;
    log::info!(
        "🌱 Tariffs seeded: {} created, {} updated, {} new periods",
        report.tariffs_created.len(),
        report.tariffs_updated.len(),
        report.periods_created
    );
    Ok(report)
}
