use crate::record::{BookingRecord, fields};
use serde::Serialize;
use std::collections::HashSet;

/// Aggregate statistics over every record a run produced — the numbers the
/// summary view is built from.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total_records: usize,
    pub in_custody: usize,
    pub released: usize,
    pub unique_names: usize,
    pub avg_days_served: f64,
    pub max_days_served: i64,
    pub min_days_served: i64,
}

impl RunReport {
    pub fn from_records(records: &[BookingRecord]) -> Self {
        tracing::debug!("Computing run report over {} records", records.len());

        let total_records = records.len();
        let in_custody = count_status(records, "In Custody");
        let released = count_status(records, "Released");

        let mut names = HashSet::new();
        for record in records {
            if let Some(name) = record.get(fields::NAME) {
                names.insert(name.to_string());
            }
        }

        let days_served: Vec<i64> = records
            .iter()
            .filter_map(|record| record.get(fields::TIME_SERVED_DAYS))
            .filter_map(|value| value.parse::<i64>().ok())
            .filter(|days| *days > 0)
            .collect();

        let avg_days_served = if days_served.is_empty() {
            0.0
        } else {
            days_served.iter().sum::<i64>() as f64 / days_served.len() as f64
        };

        tracing::info!(
            "Run report: {} records, {} in custody, {} released",
            total_records,
            in_custody,
            released
        );

        Self {
            total_records,
            in_custody,
            released,
            unique_names: names.len(),
            avg_days_served,
            max_days_served: days_served.iter().copied().max().unwrap_or(0),
            min_days_served: days_served.iter().copied().min().unwrap_or(0),
        }
    }
}

fn count_status(records: &[BookingRecord], status: &str) -> usize {
    records
        .iter()
        .filter(|record| record.get(fields::STATUS) == Some(status))
        .count()
}
