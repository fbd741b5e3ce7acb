//! Summary statistics over price rows

use switchyard_common::collaborators::calculator::percentage_change;
use switchyard_common::collaborators::{
    ColumnStats, DatasetStatistics, DateRange, PriceRow, VolumeStats,
};
use switchyard_common::errors::{AppError, Result};

fn column(values: &[f64]) -> ColumnStats {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    // Sample standard deviation; a single row has none
    let std = if values.len() > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    ColumnStats {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean,
        std,
    }
}

/// Statistics for rows sorted by date
pub fn summarize(symbol: &str, rows: &[PriceRow]) -> Result<DatasetStatistics> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Err(AppError::InvalidFormat {
            message: format!("dataset {} has no rows", symbol),
        });
    };

    let series = |f: fn(&PriceRow) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
    let volumes: Vec<u64> = rows.iter().map(|r| r.volume).collect();
    let total: u64 = volumes.iter().sum();

    let period_change_pct = percentage_change(&[first.close, last.close])
        .ok()
        .and_then(|changes| changes.first().copied())
        .filter(|change| change.is_finite());

    Ok(DatasetStatistics {
        symbol: symbol.to_string(),
        total_days: rows.len(),
        open: column(&series(|r| r.open)),
        close: column(&series(|r| r.close)),
        high: column(&series(|r| r.high)),
        low: column(&series(|r| r.low)),
        volume: VolumeStats {
            total,
            mean: total as f64 / rows.len() as f64,
            min: volumes.iter().copied().min().unwrap_or(0),
            max: volumes.iter().copied().max().unwrap_or(0),
        },
        date_range: DateRange {
            start: first.date,
            end: last.date,
        },
        period_change_pct,
    })
}
