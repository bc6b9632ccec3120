//! Conversion between domain records and Polars DataFrames.
//!
//! Readers accept the collectors' column names (English or Portuguese) and
//! coerce values leniently. Writers emit the fixed output schemas.

pub mod columns;

use std::collections::HashSet;

use polars::prelude::*;
use thiserror::Error;

use crate::domain::{
    normalize_ticker, CycleStatus, DistressEvent, DividendYield, IndicatorRecord,
    SectorClassifier,
};
use crate::scoring::ScoreRecord;
use crate::sector::SectorAggregateRecord;
use crate::valuation::ValuationRecord;
use columns::{date_values, f64_values, required_str_values, str_values};

/// Errors decoding or encoding a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

const TICKER: &[&str] = &["ticker", "papel", "symbol", "codigo"];

// ── Readers ─────────────────────────────────────────────────────────

/// Decode the indicator table. Blank tickers are skipped; the first row wins
/// for duplicated tickers.
pub fn indicators_from_frame(
    df: &DataFrame,
    classifier: &SectorClassifier,
) -> Result<Vec<IndicatorRecord>, TableError> {
    let tickers = required_str_values(df, TICKER)?;
    let sector = str_values(df, &["sector", "setor"])?;
    let subsector = str_values(df, &["subsector", "subsetor", "segmento"])?;
    let cycle = str_values(df, &["cycle", "ciclo", "status_ciclo"])?;

    let price = f64_values(df, &["price", "preco", "cotacao"])?;
    let pe = f64_values(df, &["pe_ratio", "pl", "p_l"])?;
    let pb = f64_values(df, &["pb_ratio", "pvp", "p_vp"])?;
    let roe = f64_values(df, &["roe"])?;
    let payout = f64_values(df, &["payout"])?;
    let total_debt = f64_values(df, &["total_debt", "divida_total"])?;
    let ebitda = f64_values(df, &["ebitda"])?;
    let debt_ebitda = f64_values(df, &["debt_to_ebitda", "divida_ebitda"])?;
    let beta = f64_values(df, &["beta"])?;
    let current_ratio = f64_values(df, &["current_ratio", "liquidez_corrente"])?;
    let liquidity = f64_values(df, &["avg_daily_liquidity", "liquidez_media_diaria"])?;
    let fcf_yield = f64_values(df, &["fcf_yield"])?;
    let growth = f64_values(df, &["growth_5y", "cagr_5a"])?;
    let market_cap = f64_values(df, &["market_cap", "valor_mercado"])?;
    let sentiment = f64_values(df, &["sentiment", "sentimento"])?;
    let eps = f64_values(df, &["eps", "lpa"])?;
    let bvps = f64_values(df, &["book_value_per_share", "vpa"])?;
    let dy_12m = f64_values(df, &["dy_12m"])?;
    let dy_5y = f64_values(df, &["dy_5y", "dy_5a"])?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(ticker) = tickers[i].as_deref().and_then(normalize_ticker) else {
            continue;
        };
        if !seen.insert(ticker.clone()) {
            continue;
        }
        records.push(IndicatorRecord {
            ticker,
            sector_class: classifier.classify(sector[i].as_deref()),
            sector: sector[i].clone(),
            subsector: subsector[i].clone(),
            price: price[i],
            pe_ratio: pe[i],
            pb_ratio: pb[i],
            roe: roe[i],
            payout: payout[i],
            total_debt: total_debt[i],
            ebitda: ebitda[i],
            debt_to_ebitda: debt_ebitda[i],
            beta: beta[i],
            current_ratio: current_ratio[i],
            avg_daily_liquidity: liquidity[i],
            fcf_yield: fcf_yield[i],
            growth_5y: growth[i],
            market_cap: market_cap[i],
            sentiment: sentiment[i],
            cycle: cycle[i].as_deref().and_then(CycleStatus::parse),
            eps: eps[i],
            book_value_per_share: bvps[i],
            dy_12m: dy_12m[i],
            dy_5y: dy_5y[i],
        });
    }
    Ok(records)
}

/// Decode the dividend-yield table.
pub fn dividend_yields_from_frame(df: &DataFrame) -> Result<Vec<DividendYield>, TableError> {
    let tickers = required_str_values(df, TICKER)?;
    let dy_12m = f64_values(df, &["dy_12m", "dividend_yield_12m"])?;
    let dy_5y = f64_values(df, &["dy_5y", "dy_5a", "dividend_yield_5y"])?;

    Ok((0..df.height())
        .filter_map(|i| {
            let ticker = tickers[i].as_deref().and_then(normalize_ticker)?;
            Some(DividendYield {
                ticker,
                dy_12m: dy_12m[i],
                dy_5y: dy_5y[i],
            })
        })
        .collect())
}

/// Decode the distress-event table.
pub fn distress_events_from_frame(df: &DataFrame) -> Result<Vec<DistressEvent>, TableError> {
    let company = str_values(df, &["company", "empresa", "razao_social", "nome"])?;
    let label = str_values(df, &["sector_label", "setor", "sector", "subsetor"])?;
    let entry = date_values(df, &["entry_date", "data_entrada"])?;
    let exit = date_values(df, &["exit_date", "data_saida"])?;
    let bankruptcy = date_values(df, &["bankruptcy_date", "data_falencia"])?;

    Ok((0..df.height())
        .map(|i| DistressEvent {
            company: company[i].clone().unwrap_or_default(),
            sector_label: label[i].clone(),
            entry_date: entry[i],
            exit_date: exit[i],
            bankruptcy_date: bankruptcy[i],
        })
        .collect())
}

/// Decode a previously written score table. Missing point columns read as 0.
pub fn scores_from_frame(df: &DataFrame) -> Result<Vec<ScoreRecord>, TableError> {
    let tickers = required_str_values(df, TICKER)?;
    let read = |name: &str| -> Result<Vec<f64>, TableError> {
        Ok(f64_values(df, &[name])?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect())
    };
    let dy_12m = read("dy_12m_pts")?;
    let dy_5y = read("dy_5y_pts")?;
    let payout = read("payout_pts")?;
    let roe = read("roe_pts")?;
    let pl = read("pl_pts")?;
    let pvp = read("pvp_pts")?;
    let debt_mktcap = read("debt_mktcap_pts")?;
    let debt_ebitda = read("debt_ebitda_pts")?;
    let growth = read("growth_pts")?;
    let sentiment = read("sentiment_pts")?;
    let total = read("score_total")?;

    Ok((0..df.height())
        .filter_map(|i| {
            let ticker = tickers[i].as_deref().and_then(normalize_ticker)?;
            Some(ScoreRecord {
                ticker,
                dy_12m_pts: dy_12m[i],
                dy_5y_pts: dy_5y[i],
                payout_pts: payout[i],
                roe_pts: roe[i],
                pl_pts: pl[i],
                pvp_pts: pvp[i],
                debt_mktcap_pts: debt_mktcap[i],
                debt_ebitda_pts: debt_ebitda[i],
                growth_pts: growth[i],
                sentiment_pts: sentiment[i],
                score_total: total[i],
            })
        })
        .collect())
}

/// Decode a previously written sector ranking, keeping row order.
pub fn sectors_from_frame(df: &DataFrame) -> Result<Vec<SectorAggregateRecord>, TableError> {
    let sector = required_str_values(df, &["sector"])?;
    let subsector = required_str_values(df, &["subsector"])?;
    let opt = |name: &str| f64_values(df, &[name]);
    let num = |name: &str| -> Result<Vec<f64>, TableError> {
        Ok(opt(name)?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
    };
    let count = |name: &str| -> Result<Vec<usize>, TableError> {
        Ok(opt(name)?
            .into_iter()
            .map(|v| v.map_or(0, |x| x.max(0.0) as usize))
            .collect())
    };

    let members = count("members")?;
    let mean_roe = opt("mean_roe")?;
    let mean_beta = opt("mean_beta")?;
    let mean_payout = opt("mean_payout")?;
    let mean_dy_5y = opt("mean_dy_5y")?;
    let mean_margin = opt("mean_margin_of_safety")?;
    let mean_score = num("mean_score")?;
    let high_count = count("high_quality_count")?;
    let low_count = count("low_quality_count")?;
    let open_events = count("open_distress_events")?;
    let dy = num("dy_pts")?;
    let roe = num("roe_pts")?;
    let beta = num("beta_pts")?;
    let payout = num("payout_pts")?;
    let high = num("high_quality_pts")?;
    let margin = num("margin_pts")?;
    let low = num("low_quality_pts")?;
    let distress = num("distress_pts")?;
    let final_score = num("pontuacao_final")?;
    let sector_score = num("pontuacao_setor")?;

    Ok((0..df.height())
        .map(|i| SectorAggregateRecord {
            sector: sector[i].clone().unwrap_or_default(),
            subsector: subsector[i].clone().unwrap_or_default(),
            members: members[i],
            mean_roe: mean_roe[i],
            mean_beta: mean_beta[i],
            mean_payout: mean_payout[i],
            mean_dy_5y: mean_dy_5y[i],
            mean_margin_of_safety: mean_margin[i],
            mean_score: mean_score[i],
            high_quality_count: high_count[i],
            low_quality_count: low_count[i],
            open_distress_events: open_events[i],
            dy_pts: dy[i],
            roe_pts: roe[i],
            beta_pts: beta[i],
            payout_pts: payout[i],
            high_quality_pts: high[i],
            margin_pts: margin[i],
            low_quality_pts: low[i],
            distress_pts: distress[i],
            pontuacao_final: final_score[i],
            pontuacao_setor: sector_score[i],
        })
        .collect())
}

// ── Writers ─────────────────────────────────────────────────────────

fn f64_column<T>(name: &str, rows: &[T], get: impl Fn(&T) -> f64) -> Column {
    Column::new(name.into(), rows.iter().map(get).collect::<Vec<f64>>())
}

fn opt_column<T>(name: &str, rows: &[T], get: impl Fn(&T) -> Option<f64>) -> Column {
    Column::new(name.into(), rows.iter().map(get).collect::<Vec<Option<f64>>>())
}

fn count_column<T>(name: &str, rows: &[T], get: impl Fn(&T) -> usize) -> Column {
    Column::new(
        name.into(),
        rows.iter().map(|r| get(r) as u64).collect::<Vec<u64>>(),
    )
}

fn text_column<T>(name: &str, rows: &[T], get: impl Fn(&T) -> String) -> Column {
    Column::new(name.into(), rows.iter().map(get).collect::<Vec<String>>())
}

/// Encode the score table: `ticker`, one column per criterion, `score_total`.
pub fn scores_to_frame(scores: &[ScoreRecord]) -> Result<DataFrame, TableError> {
    Ok(DataFrame::new(vec![
        text_column("ticker", scores, |s| s.ticker.clone()),
        f64_column("dy_12m_pts", scores, |s| s.dy_12m_pts),
        f64_column("dy_5y_pts", scores, |s| s.dy_5y_pts),
        f64_column("payout_pts", scores, |s| s.payout_pts),
        f64_column("roe_pts", scores, |s| s.roe_pts),
        f64_column("pl_pts", scores, |s| s.pl_pts),
        f64_column("pvp_pts", scores, |s| s.pvp_pts),
        f64_column("debt_mktcap_pts", scores, |s| s.debt_mktcap_pts),
        f64_column("debt_ebitda_pts", scores, |s| s.debt_ebitda_pts),
        f64_column("growth_pts", scores, |s| s.growth_pts),
        f64_column("sentiment_pts", scores, |s| s.sentiment_pts),
        f64_column("score_total", scores, |s| s.score_total),
    ])?)
}

/// Encode the sector ranking.
pub fn sectors_to_frame(records: &[SectorAggregateRecord]) -> Result<DataFrame, TableError> {
    Ok(DataFrame::new(vec![
        text_column("sector", records, |r| r.sector.clone()),
        text_column("subsector", records, |r| r.subsector.clone()),
        f64_column("pontuacao_setor", records, |r| r.pontuacao_setor),
        f64_column("pontuacao_final", records, |r| r.pontuacao_final),
        count_column("members", records, |r| r.members),
        opt_column("mean_roe", records, |r| r.mean_roe),
        opt_column("mean_beta", records, |r| r.mean_beta),
        opt_column("mean_payout", records, |r| r.mean_payout),
        opt_column("mean_dy_5y", records, |r| r.mean_dy_5y),
        opt_column("mean_margin_of_safety", records, |r| r.mean_margin_of_safety),
        f64_column("mean_score", records, |r| r.mean_score),
        count_column("high_quality_count", records, |r| r.high_quality_count),
        count_column("low_quality_count", records, |r| r.low_quality_count),
        count_column("open_distress_events", records, |r| r.open_distress_events),
        f64_column("dy_pts", records, |r| r.dy_pts),
        f64_column("roe_pts", records, |r| r.roe_pts),
        f64_column("beta_pts", records, |r| r.beta_pts),
        f64_column("payout_pts", records, |r| r.payout_pts),
        f64_column("high_quality_pts", records, |r| r.high_quality_pts),
        f64_column("margin_pts", records, |r| r.margin_pts),
        f64_column("low_quality_pts", records, |r| r.low_quality_pts),
        f64_column("distress_pts", records, |r| r.distress_pts),
    ])?)
}

/// Encode the valuation table.
pub fn valuations_to_frame(records: &[ValuationRecord]) -> Result<DataFrame, TableError> {
    Ok(DataFrame::new(vec![
        text_column("ticker", records, |r| r.ticker.clone()),
        opt_column("price", records, |r| r.price),
        opt_column("graham_value", records, |r| r.graham_value),
        f64_column("margin_of_safety", records, |r| r.margin_of_safety),
        opt_column("bazin_ceiling", records, |r| r.bazin_ceiling),
        Column::new(
            "cycle".into(),
            records
                .iter()
                .map(|r| r.cycle.map(|c| c.as_str().to_string()))
                .collect::<Vec<Option<String>>>(),
        ),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SectorClass;
    use crate::scoring::score;

    fn indicator_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("papel".into(), vec!["itub4.sa", "taee11", "", "ITUB4"]),
            Column::new(
                "setor".into(),
                vec!["Financeiro", "Utilidade Pública", "x", "Financeiro"],
            ),
            Column::new("subsetor".into(), vec!["Bancos", "Energia", "x", "Bancos"]),
            Column::new("roe".into(), vec!["16.0", "14", "1", "99"]),
            Column::new("pl".into(), vec![Some(8.0), Some(-5.0), None, None]),
            Column::new("ciclo".into(), vec!["Compra", "", "", ""]),
        ])
        .unwrap()
    }

    #[test]
    fn indicators_normalize_classify_and_dedupe() {
        let rows = indicators_from_frame(&indicator_frame(), &SectorClassifier::default()).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].ticker, "ITUB4");
        assert_eq!(rows[0].sector_class, SectorClass::Financial);
        assert_eq!(rows[0].roe, Some(16.0));
        assert_eq!(rows[0].cycle, Some(CycleStatus::Buy));

        assert_eq!(rows[1].ticker, "TAEE11");
        assert_eq!(rows[1].sector_class, SectorClass::General);
        assert_eq!(rows[1].pe_ratio, Some(-5.0));
        assert_eq!(rows[1].beta, None);
    }

    #[test]
    fn indicators_require_ticker_column() {
        let df = DataFrame::new(vec![Column::new("roe".into(), vec![1.0])]).unwrap();
        let err = indicators_from_frame(&df, &SectorClassifier::default()).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn(_)));
    }

    #[test]
    fn scores_survive_a_frame_trip() {
        let rows = indicators_from_frame(&indicator_frame(), &SectorClassifier::default()).unwrap();
        let scores: Vec<ScoreRecord> = rows.iter().map(score).collect();
        let df = scores_to_frame(&scores).unwrap();
        assert_eq!(df.width(), ScoreRecord::COLUMNS.len());
        assert_eq!(scores_from_frame(&df).unwrap(), scores);
    }

    #[test]
    fn sector_ranking_survives_a_frame_trip() {
        let record = SectorAggregateRecord {
            sector: "Utilidade Pública".into(),
            subsector: "Energia Elétrica".into(),
            members: 3,
            mean_roe: Some(14.0),
            mean_beta: None,
            mean_payout: Some(45.0),
            mean_dy_5y: Some(9.0),
            mean_margin_of_safety: Some(20.0),
            mean_score: 120.0,
            high_quality_count: 2,
            low_quality_count: 0,
            open_distress_events: 1,
            dy_pts: 120.0,
            roe_pts: 0.0,
            beta_pts: 0.0,
            payout_pts: 35.0,
            high_quality_pts: 10.0,
            margin_pts: 0.0,
            low_quality_pts: 0.0,
            distress_pts: -80.0,
            pontuacao_final: 85.0,
            pontuacao_setor: 85.0,
        };
        let df = sectors_to_frame(std::slice::from_ref(&record)).unwrap();
        assert_eq!(sectors_from_frame(&df).unwrap(), vec![record]);
    }

    #[test]
    fn distress_events_parse_dates() {
        let df = DataFrame::new(vec![
            Column::new("empresa".into(), vec!["A SA", "B SA"]),
            Column::new("setor".into(), vec!["Varejo", "Varejo"]),
            Column::new("data_entrada".into(), vec!["2021-05-01", "01/02/2019"]),
            Column::new("data_saida".into(), vec![None, Some("2022-01-01")]),
            Column::new("data_falencia".into(), vec![None::<&str>, None]),
        ])
        .unwrap();
        let events = distress_events_from_frame(&df).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_open());
        assert!(!events[1].is_open());
        assert_eq!(events[1].entry_date, chrono::NaiveDate::from_ymd_opt(2019, 2, 1));
    }

    #[test]
    fn dividend_yields_keyed_by_normalized_ticker() {
        let df = DataFrame::new(vec![
            Column::new("ticker".into(), vec!["bbas3.SA"]),
            Column::new("dy_12m".into(), vec![8.5]),
            Column::new("dy_5a".into(), vec![7.0]),
        ])
        .unwrap();
        let yields = dividend_yields_from_frame(&df).unwrap();
        assert_eq!(yields[0].ticker, "BBAS3");
        assert_eq!(yields[0].dy_5y, Some(7.0));
    }
}
