//! Sample price datasets written into an empty data directory

use chrono::NaiveDate;
use switchyard_common::collaborators::PriceRow;

// (open, close, high, low, volume) for 2024-01-01 ..= 2024-01-05
type Day = (f64, f64, f64, f64, u64);

const AAPL: [Day; 5] = [
    (150.0, 155.0, 157.0, 149.0, 1_000_000),
    (155.0, 160.0, 162.0, 154.0, 1_200_000),
    (160.0, 158.0, 161.0, 157.0, 1_100_000),
    (158.0, 165.0, 166.0, 157.0, 1_300_000),
    (165.0, 163.0, 167.0, 162.0, 1_150_000),
];

const GOOGL: [Day; 5] = [
    (2800.0, 2850.0, 2870.0, 2790.0, 500_000),
    (2850.0, 2900.0, 2920.0, 2840.0, 600_000),
    (2900.0, 2880.0, 2910.0, 2870.0, 550_000),
    (2880.0, 2950.0, 2960.0, 2870.0, 650_000),
    (2950.0, 2930.0, 2970.0, 2920.0, 580_000),
];

const MSFT: [Day; 5] = [
    (350.0, 355.0, 357.0, 349.0, 800_000),
    (355.0, 360.0, 362.0, 354.0, 900_000),
    (360.0, 358.0, 361.0, 357.0, 850_000),
    (358.0, 365.0, 366.0, 357.0, 950_000),
    (365.0, 363.0, 367.0, 362.0, 880_000),
];

fn rows(days: &[Day]) -> Vec<PriceRow> {
    days.iter()
        .zip(1u32..)
        .filter_map(|(&(open, close, high, low, volume), day)| {
            Some(PriceRow {
                date: NaiveDate::from_ymd_opt(2024, 1, day)?,
                open,
                close,
                high,
                low,
                volume,
            })
        })
        .collect()
}

/// Sample datasets keyed by symbol
pub fn sample_datasets() -> Vec<(&'static str, Vec<PriceRow>)> {
    vec![("AAPL", rows(&AAPL)), ("GOOGL", rows(&GOOGL)), ("MSFT", rows(&MSFT))]
}
