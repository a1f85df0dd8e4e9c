// Risk engine - point-in-time portfolio risk summary from accumulated tables
//
// Pure function of the positions, securities and exposures tables: dedup the
// append-only history (later rows win), restrict to the most recent date,
// aggregate instrument-level exposure across accounts, attach tickers and
// exposure coefficients, derive leverage/beta-adjusted market values.

use crate::cfg::Config;
use crate::store::{read_table, Frame};
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

// ============================================================================
// EXPOSURES REFERENCE
// ============================================================================

/// One row of the static exposures reference table. Maintained externally,
/// never written by the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Exposure {
    pub ticker: String,
    pub leverage: Option<f64>,
    pub beta: Option<f64>,
}

/// Load the exposures reference table from the package data directory.
pub fn read_exposures(cfg: &Config) -> Result<Vec<Exposure>> {
    let path = cfg.exposures_file();
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("opening exposures file {}", path.display()))?;
    let mut exposures = Vec::new();
    for row in reader.deserialize() {
        let exposure: Exposure =
            row.with_context(|| format!("reading exposures file {}", path.display()))?;
        exposures.push(exposure);
    }
    Ok(exposures)
}

// ============================================================================
// RISK SUMMARY
// ============================================================================

/// Metric rows of the summary, in presentation order.
pub const METRIC_LABELS: [&str; 9] = [
    "MV($)",
    "GrossMV($)",
    "BAGMV($)",
    "NetMV($)",
    "NetGrossMV($)",
    "Gross(%)",
    "BAG(%)",
    "NetMV(%)",
    "NetGrossMV(%)",
];

/// Portfolio risk summary for one date: dollar metrics plus percentages of
/// total market value, all rounded to 2 decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSummary {
    pub date: String,
    pub mv: f64,
    pub gross_mv: f64,
    pub bag_mv: f64,
    pub net_mv: f64,
    pub net_gross_mv: f64,
    pub gross_pct: f64,
    pub bag_pct: f64,
    pub net_mv_pct: f64,
    pub net_gross_mv_pct: f64,
}

impl RiskSummary {
    /// Metric values in `METRIC_LABELS` order.
    pub fn values(&self) -> [f64; 9] {
        [
            self.mv,
            self.gross_mv,
            self.bag_mv,
            self.net_mv,
            self.net_gross_mv,
            self.gross_pct,
            self.bag_pct,
            self.net_mv_pct,
            self.net_gross_mv_pct,
        ]
    }

    /// Transposed terminal table: one date column, one row per metric.
    pub fn render(&self) -> String {
        let labels: Vec<&str> = std::iter::once("Date").chain(METRIC_LABELS).collect();
        let mut values = vec![self.date.clone()];
        values.extend(self.values().iter().map(|v| fmt_number(*v)));

        let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0);
        let value_width = values.iter().map(|v| v.len()).max().unwrap_or(0);

        let mut out = String::new();
        let rule = |left: char, mid: char, fill: char, right: char| {
            let mut line = String::new();
            line.push(left);
            line.push_str(&fill.to_string().repeat(label_width + 2));
            line.push(mid);
            line.push_str(&fill.to_string().repeat(value_width + 2));
            line.push(right);
            line.push('\n');
            line
        };

        out.push_str(&rule('╒', '╤', '═', '╕'));
        for (i, (label, value)) in labels.iter().zip(&values).enumerate() {
            if i == 1 {
                out.push_str(&rule('╞', '╪', '═', '╡'));
            } else if i > 1 {
                out.push_str(&rule('├', '┼', '─', '┤'));
            }
            out.push_str(&format!(
                "│ {:<label_width$} │ {:>value_width$} │\n",
                label, value
            ));
        }
        out.push_str(&rule('╘', '╧', '═', '╛'));
        out
    }
}

/// Thousands-separated, 2 decimal places, matching the report style.
fn fmt_number(value: f64) -> String {
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if negative { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

// ============================================================================
// TABLE HELPERS
// ============================================================================

fn field<'a>(row: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    row.get(name).map(|s| s.as_str()).filter(|s| !s.is_empty())
}

fn field_f64(row: &IndexMap<String, String>, name: &str) -> Option<f64> {
    field(row, name).and_then(|s| s.parse().ok())
}

/// Sign convention of the upstream report: -1 / 0 / +1.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// RISK COMPUTATION
// ============================================================================

/// Compute the aggregate portfolio risk summary, optionally restricted to a
/// set of account ids.
pub fn risk(cfg: &Config, acctids: Option<&[String]>) -> Result<RiskSummary> {
    let exposures = read_exposures(cfg)?;
    let positions = read_table("positions", cfg)?;
    let securities = read_table("securities", cfg)?;
    compute_risk(&exposures, &positions, &securities, acctids)
}

/// Risk computation against already-loaded tables; deterministic in the
/// table contents.
pub fn compute_risk(
    exposures: &[Exposure],
    positions: &Frame,
    securities: &Frame,
    acctids: Option<&[String]>,
) -> Result<RiskSummary> {
    // Exposure coefficients by ticker
    let coeffs: HashMap<&str, (Option<f64>, Option<f64>)> = exposures
        .iter()
        .map(|e| (e.ticker.as_str(), (e.leverage, e.beta)))
        .collect();

    // Securities: last row per (ticker, date) wins, keep the join columns
    let mut tickers: IndexMap<(String, String, String), String> = IndexMap::new();
    {
        let mut latest: IndexMap<(String, String), &IndexMap<String, String>> = IndexMap::new();
        for row in securities.rows() {
            let ticker = field(row, "ticker").unwrap_or("").to_string();
            let date = field(row, "date").unwrap_or("").to_string();
            latest.insert((ticker, date), row);
        }
        for row in latest.values() {
            let key = (
                field(row, "date").unwrap_or("").to_string(),
                field(row, "uniqueid").unwrap_or("").to_string(),
                field(row, "uniqueidtype").unwrap_or("").to_string(),
            );
            if let Some(ticker) = field(row, "ticker") {
                tickers.insert(key, ticker.to_string());
            }
        }
    }

    // Positions: optional account filter, then last row per
    // (date, acctid, uniqueid, uniqueidtype) wins
    let filter: Option<HashSet<&str>> =
        acctids.map(|ids| ids.iter().map(|id| id.as_str()).collect());
    let mut deduped: IndexMap<(String, String, String, String), &IndexMap<String, String>> =
        IndexMap::new();
    for row in positions.rows() {
        if let Some(wanted) = &filter {
            match field(row, "acctid") {
                Some(acctid) if wanted.contains(acctid) => {}
                _ => continue,
            }
        }
        let key = (
            field(row, "date").unwrap_or("").to_string(),
            field(row, "acctid").unwrap_or("").to_string(),
            field(row, "uniqueid").unwrap_or("").to_string(),
            field(row, "uniqueidtype").unwrap_or("").to_string(),
        );
        deduped.insert(key, row);
    }

    // Most recent date only (ISO dates order lexicographically)
    let max_date = deduped
        .values()
        .filter_map(|row| field(row, "date"))
        .max()
        .map(|d| d.to_string());
    let Some(max_date) = max_date else {
        bail!("no positions on record; run aggregation first");
    };

    // Instrument-level exposure: sum mktval/units across accounts
    let mut portfolio: IndexMap<(String, String, String), (f64, f64)> = IndexMap::new();
    for row in deduped.values() {
        if field(row, "date") != Some(max_date.as_str()) {
            continue;
        }
        let key = (
            max_date.clone(),
            field(row, "uniqueidtype").unwrap_or("").to_string(),
            field(row, "uniqueid").unwrap_or("").to_string(),
        );
        let entry = portfolio.entry(key).or_insert((0.0, 0.0));
        entry.0 += field_f64(row, "mktval").unwrap_or(0.0);
        entry.1 += field_f64(row, "units").unwrap_or(0.0);
    }
    debug!(
        "risk summary over {} instrument(s) on {}",
        portfolio.len(),
        max_date
    );

    // Join tickers and coefficients, derive adjusted market values. Missing
    // ticker or coefficient propagates as an absent metric, not an error.
    let mut mv_total = 0.0;
    let mut gross_total = 0.0;
    let mut bag_total = 0.0;
    let mut net_total = 0.0;
    let mut net_gross_total = 0.0;
    for ((date, uniqueidtype, uniqueid), (mktval, _units)) in &portfolio {
        let ticker = tickers.get(&(date.clone(), uniqueid.clone(), uniqueidtype.clone()));
        let (leverage, beta) = ticker
            .and_then(|t| coeffs.get(t.as_str()).copied())
            .unwrap_or((None, None));
        let mv = *mktval;
        mv_total += mv;
        if let Some(leverage) = leverage {
            net_total += mv * sign(leverage);
            gross_total += mv * leverage.abs();
            net_gross_total += mv * leverage;
        }
        if let Some(beta) = beta {
            bag_total += mv * beta;
        }
    }

    Ok(RiskSummary {
        date: max_date,
        mv: round2(mv_total),
        gross_mv: round2(gross_total),
        bag_mv: round2(bag_total),
        net_mv: round2(net_total),
        net_gross_mv: round2(net_gross_total),
        gross_pct: round2(100.0 * gross_total / mv_total),
        bag_pct: round2(100.0 * bag_total / mv_total),
        net_mv_pct: round2(100.0 * net_total / mv_total),
        net_gross_mv_pct: round2(100.0 * net_gross_total / mv_total),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AccountContext, Record, Scalar};
    use chrono::{TimeZone, Utc};

    fn table_row(date: &str, fields: &[(&str, &str)]) -> Record {
        let dt = Utc
            .with_ymd_and_hms(2020, 5, 22, 12, 0, 0)
            .unwrap();
        let mut record = AccountContext::at(dt, "vanguard", "jane").to_record();
        // Overwrite the context date with the row's business date
        record.insert("date", Scalar::Text(date.to_string()));
        for (name, value) in fields {
            record.insert(*name, Scalar::Text(value.to_string()));
        }
        record
    }

    fn position(date: &str, acctid: &str, uniqueid: &str, mktval: &str, units: &str) -> Record {
        table_row(
            date,
            &[
                ("acctid", acctid),
                ("uniqueid", uniqueid),
                ("uniqueidtype", "TICKER"),
                ("mktval", mktval),
                ("units", units),
            ],
        )
    }

    fn security(date: &str, uniqueid: &str, ticker: &str) -> Record {
        table_row(
            date,
            &[
                ("uniqueid", uniqueid),
                ("uniqueidtype", "TICKER"),
                ("ticker", ticker),
            ],
        )
    }

    fn frame(records: &[Record]) -> Frame {
        Frame::from_records(records).unwrap()
    }

    fn exposure(ticker: &str, leverage: f64, beta: f64) -> Exposure {
        Exposure {
            ticker: ticker.to_string(),
            leverage: Some(leverage),
            beta: Some(beta),
        }
    }

    #[test]
    fn test_risk_concrete_scenario() {
        let positions = frame(&[position("2020-05-22", "A1", "X", "100", "10")]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        let exposures = vec![exposure("FOO", 2.0, 1.5)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.date, "2020-05-22");
        assert_eq!(summary.mv, 100.0);
        // NetMV = MV * sign(leverage) = 100 * sign(2) = 100
        assert_eq!(summary.net_mv, 100.0);
        assert_eq!(summary.gross_mv, 200.0);
        assert_eq!(summary.bag_mv, 150.0);
        assert_eq!(summary.net_gross_mv, 200.0);
        assert_eq!(summary.gross_pct, 200.0);
        assert_eq!(summary.bag_pct, 150.0);
        assert_eq!(summary.net_mv_pct, 100.0);
        assert_eq!(summary.net_gross_mv_pct, 200.0);
    }

    #[test]
    fn test_later_rows_win_dedup() {
        // Same position appended twice (re-run of aggregation); the later,
        // corrected row wins
        let positions = frame(&[
            position("2020-05-22", "A1", "X", "100", "10"),
            position("2020-05-22", "A1", "X", "120", "12"),
        ]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        let exposures = vec![exposure("FOO", 1.0, 1.0)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.mv, 120.0);
    }

    #[test]
    fn test_only_most_recent_date_counts() {
        let positions = frame(&[
            position("2020-05-21", "A1", "X", "999", "1"),
            position("2020-05-22", "A1", "X", "100", "10"),
        ]);
        let securities = frame(&[
            security("2020-05-21", "X", "FOO"),
            security("2020-05-22", "X", "FOO"),
        ]);
        let exposures = vec![exposure("FOO", 1.0, 1.0)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.date, "2020-05-22");
        assert_eq!(summary.mv, 100.0);
    }

    #[test]
    fn test_exposure_summed_across_accounts() {
        let positions = frame(&[
            position("2020-05-22", "A1", "X", "100", "10"),
            position("2020-05-22", "A2", "X", "50", "5"),
        ]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        let exposures = vec![exposure("FOO", 2.0, 1.0)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.mv, 150.0);
        assert_eq!(summary.gross_mv, 300.0);
    }

    #[test]
    fn test_account_filter() {
        let positions = frame(&[
            position("2020-05-22", "A1", "X", "100", "10"),
            position("2020-05-22", "A2", "X", "50", "5"),
        ]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        let exposures = vec![exposure("FOO", 1.0, 1.0)];

        let only_a2 = vec!["A2".to_string()];
        let summary =
            compute_risk(&exposures, &positions, &securities, Some(&only_a2)).unwrap();
        assert_eq!(summary.mv, 50.0);
    }

    #[test]
    fn test_missing_exposure_propagates_as_null_not_error() {
        // BAR has no exposures row: its MV counts, its adjusted metrics skip
        let positions = frame(&[
            position("2020-05-22", "A1", "X", "100", "10"),
            position("2020-05-22", "A1", "Y", "40", "4"),
        ]);
        let securities = frame(&[
            security("2020-05-22", "X", "FOO"),
            security("2020-05-22", "Y", "BAR"),
        ]);
        let exposures = vec![exposure("FOO", 2.0, 1.5)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.mv, 140.0);
        assert_eq!(summary.gross_mv, 200.0);
        assert_eq!(summary.bag_mv, 150.0);
        assert_eq!(summary.gross_pct, round2(100.0 * 200.0 / 140.0));
    }

    #[test]
    fn test_short_position_sign() {
        let positions = frame(&[position("2020-05-22", "A1", "X", "-100", "-10")]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        // Inverse fund: negative leverage
        let exposures = vec![exposure("FOO", -2.0, -1.0)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.mv, -100.0);
        assert_eq!(summary.net_mv, 100.0); // MV * sign(-2) = -100 * -1
        assert_eq!(summary.gross_mv, -200.0); // MV * |-2|
        assert_eq!(summary.net_gross_mv, 200.0); // MV * -2
    }

    #[test]
    fn test_zero_mv_percentages_are_undefined() {
        // Percentages divide by total MV; a flat book leaves them undefined
        // rather than erroring (matches the upstream report behavior)
        let positions = frame(&[position("2020-05-22", "A1", "X", "0", "10")]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        let exposures = vec![exposure("FOO", 2.0, 1.5)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        assert_eq!(summary.mv, 0.0);
        assert_eq!(summary.gross_mv, 0.0);
        assert!(summary.gross_pct.is_nan());
        assert!(summary.net_mv_pct.is_nan());
        // Rendering stays total, no panic
        assert!(summary.render().contains("NaN.00"));
    }

    #[test]
    fn test_no_positions_is_an_error() {
        let positions = Frame::new();
        let securities = Frame::new();
        let err = compute_risk(&[], &positions, &securities, None).unwrap_err();
        assert!(err.to_string().contains("no positions"));
    }

    #[test]
    fn test_render_layout() {
        let positions = frame(&[position("2020-05-22", "A1", "X", "1234567", "10")]);
        let securities = frame(&[security("2020-05-22", "X", "FOO")]);
        let exposures = vec![exposure("FOO", 1.0, 1.0)];

        let summary = compute_risk(&exposures, &positions, &securities, None).unwrap();
        let rendered = summary.render();
        assert!(rendered.contains("Date"));
        assert!(rendered.contains("2020-05-22"));
        assert!(rendered.contains("NetGrossMV(%)"));
        // Thousands separators in dollar metrics
        assert!(rendered.contains("1,234,567.00"));
    }

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(100.0), "100.00");
        assert_eq!(fmt_number(1234567.891), "1,234,567.89");
        assert_eq!(fmt_number(-1234.5), "-1,234.50");
        assert_eq!(fmt_number(0.0), "0.00");
    }
}
