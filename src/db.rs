use std::fmt;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info, warn};

use crate::models::{
    AlertRecord, CurrentConditionsRecord, HourlyRecord, RawWeatherResponse, TransformedBundle,
};
use crate::transform::transform_current;

/// Rows written by one load call. `skipped` counts rows without a resolvable timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub current: usize,
    pub hourly: usize,
    pub alerts: usize,
    pub skipped: usize,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} current conditions, {} hourly, {} alerts ({} skipped)",
            self.current, self.hourly, self.alerts, self.skipped
        )
    }
}

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Writes the whole bundle in one transaction. Inserts are unconditional, so
/// loading an overlapping range twice stores duplicate rows.
pub async fn load(pool: &PgPool, bundle: &TransformedBundle) -> anyhow::Result<LoadSummary> {
    let mut tx = pool.begin().await.context("failed to start transaction")?;

    let inserted = insert_bundle(&mut tx, bundle).await;
    match inserted {
        Ok(summary) => {
            tx.commit().await.context("failed to commit weather batch")?;
            info!(%summary, "weather batch committed");
            Ok(summary)
        }
        Err(err) => {
            error!(error = %err, "insert failed, rolling back weather batch");
            tx.rollback()
                .await
                .context("failed to roll back weather batch")?;
            Err(err)
        }
    }
}

/// Single-table variant: stores only the current conditions of a raw payload.
pub async fn load_current_only(
    pool: &PgPool,
    raw: &RawWeatherResponse,
) -> anyhow::Result<LoadSummary> {
    let bundle = TransformedBundle {
        current_conditions: transform_current(raw),
        ..TransformedBundle::default()
    };

    if bundle.is_empty() {
        warn!("no currentConditions in the API response, nothing to insert");
        return Ok(LoadSummary::default());
    }

    load(pool, &bundle).await
}

async fn insert_bundle(
    conn: &mut PgConnection,
    bundle: &TransformedBundle,
) -> anyhow::Result<LoadSummary> {
    let mut summary = LoadSummary::default();

    if let Some(current) = &bundle.current_conditions {
        if insert_current(conn, current).await? {
            summary.current += 1;
        } else {
            summary.skipped += 1;
        }
    }

    for (index, hour) in bundle.hourly.iter().enumerate() {
        if insert_hourly(conn, hour)
            .await
            .with_context(|| format!("hourly row {index}"))?
        {
            summary.hourly += 1;
        } else {
            summary.skipped += 1;
        }
    }

    for alert in &bundle.alerts {
        insert_alert(conn, alert).await?;
        summary.alerts += 1;
    }

    Ok(summary)
}

async fn insert_current(
    conn: &mut PgConnection,
    record: &CurrentConditionsRecord,
) -> anyhow::Result<bool> {
    let Some(datetime) = record.datetime else {
        warn!("current conditions have no usable datetime, skipping insert");
        return Ok(false);
    };

    sqlx::query(
        r#"
        INSERT INTO current_conditions (
            datetime, temp, feelslike, dew, humidity, pressure, windspeed, windgust, winddir,
            visibility, cloudcover, precip, precipprob, uvindex, severerisk, conditions, description
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(datetime)
    .bind(record.temp)
    .bind(record.feelslike)
    .bind(record.dew)
    .bind(record.humidity)
    .bind(record.pressure)
    .bind(record.windspeed)
    .bind(record.windgust)
    .bind(record.winddir)
    .bind(record.visibility)
    .bind(record.cloudcover)
    .bind(record.precip)
    .bind(record.precipprob)
    .bind(record.uvindex)
    .bind(record.severerisk)
    .bind(record.conditions.as_deref())
    .bind(record.description.as_deref())
    .execute(&mut *conn)
    .await
    .context("failed to insert into current_conditions")?;

    Ok(true)
}

async fn insert_hourly(conn: &mut PgConnection, record: &HourlyRecord) -> anyhow::Result<bool> {
    let Some(datetime) = record.datetime else {
        warn!("hourly reading has no usable datetime, skipping insert");
        return Ok(false);
    };

    sqlx::query(
        r#"
        INSERT INTO hourly_weather (
            datetime, temp, feelslike, windspeed, windgust, winddir, precip, precipprob, humidity,
            visibility, cloudcover, pressure
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(datetime)
    .bind(record.temp)
    .bind(record.feelslike)
    .bind(record.windspeed)
    .bind(record.windgust)
    .bind(record.winddir)
    .bind(record.precip)
    .bind(record.precipprob)
    .bind(record.humidity)
    .bind(record.visibility)
    .bind(record.cloudcover)
    .bind(record.pressure)
    .execute(&mut *conn)
    .await
    .context("failed to insert into hourly_weather")?;

    Ok(true)
}

async fn insert_alert(conn: &mut PgConnection, record: &AlertRecord) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO weather_alerts (event, description, expires) VALUES ($1, $2, $3)")
        .bind(record.event.as_deref())
        .bind(record.description.as_deref())
        .bind(record.expires)
        .execute(&mut *conn)
        .await
        .context("failed to insert into weather_alerts")?;

    Ok(())
}
