//! Full pipeline on collector-shaped CSV files in a temporary data root.

use polars::prelude::*;
use tempfile::TempDir;

use scorelab_core::table::{scores_from_frame, sectors_from_frame};
use scorelab_runner::report::REPORT_FILE_NAME;
use scorelab_runner::{Outcome, Pipeline, PipelineConfig, PipelineReport, Warehouse};

const INDICATORS: &str = "\
ticker,setor,subsetor,payout,roe,pl,pvp,divida_total,valor_mercado,divida_ebitda,cagr_5a,sentimento,preco,lpa,vpa
TAEE11.SA,Utilidade Pública,Energia Elétrica,45,14,10,0.5,3,10,0.8,20,80,35,4,20
ITUB4,Financeiro,Bancos,50,20,8,1.5,,,,10,60,30,3,20
,Financeiro,Bancos,50,20,8,1.5,,,,10,60,30,3,20
";

const DIVIDEND_YIELDS: &str = "\
ticker,dy_12m,dy_5y
TAEE11,6,9
ITUB4,7,6
";

const DISTRESS: &str = "\
empresa,setor,data_entrada,data_saida,data_falencia
Light,Energia Elétrica,2023-05-15,,
Oi,Telecomunicações,2016-06-20,2022-12-14,
";

fn seeded_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("indicadores.csv"), INDICATORS).unwrap();
    std::fs::write(raw.join("dividend_yield.csv"), DIVIDEND_YIELDS).unwrap();
    std::fs::write(raw.join("recuperacao_judicial.csv"), DISTRESS).unwrap();
    dir
}

fn pipeline(dir: &TempDir) -> Pipeline {
    let mut config = PipelineConfig::rooted_at(dir.path());
    config.current_partition = Some(2024);
    Pipeline::new(config)
}

#[test]
fn run_scores_aggregates_promotes_and_loads() {
    let dir = seeded_root();
    let pipeline = pipeline(&dir);
    let report = pipeline.run();
    assert!(report.is_success(), "{:#?}", report.summary_lines());

    let score_step = report.steps.iter().find(|s| s.step == "score").unwrap();
    assert_eq!(score_step.outcome, Outcome::Done { rows: 2 });

    let scores = scores_from_frame(&pipeline.trusted().read("scores").unwrap()).unwrap();
    let taee = scores.iter().find(|s| s.ticker == "TAEE11").unwrap();
    assert!((taee.score_total - 146.0).abs() < 1e-9, "got {}", taee.score_total);
    assert!(scores.iter().all(|s| s.score_total >= 0.0));

    let sectors = sectors_from_frame(&pipeline.trusted().read("sector_scores").unwrap()).unwrap();
    assert_eq!(sectors.len(), 2);
    let energy = sectors
        .iter()
        .find(|r| r.subsector == "Energia Elétrica")
        .unwrap();
    assert_eq!(energy.open_distress_events, 1);
    assert_eq!(energy.distress_pts, -80.0);
    let banks = sectors.iter().find(|r| r.subsector == "Bancos").unwrap();
    assert_eq!(banks.distress_pts, 0.0);
    assert_eq!(banks.members, 1);

    let warehouse = Warehouse::open(&pipeline.config().layers.warehouse).unwrap();
    let mut expected = vec![
        "dividend_yield",
        "indicadores",
        "recuperacao_judicial",
        "scores",
        "sector_scores",
        "valuation",
    ];
    expected.sort_unstable();
    assert_eq!(warehouse.table_names().unwrap(), expected);
    assert_eq!(warehouse.row_count("scores").unwrap(), 2);
}

#[test]
fn report_is_saved_next_to_the_warehouse() {
    let dir = seeded_root();
    let pipeline = pipeline(&dir);
    let report = pipeline.run();
    let path = pipeline.save_report(&report).unwrap();

    assert_eq!(path, dir.path().join("warehouse").join(REPORT_FILE_NAME));
    let loaded = PipelineReport::load(&path).unwrap();
    assert_eq!(loaded, report);
}

#[test]
fn rerun_gives_the_same_trusted_scores() {
    let dir = seeded_root();
    let pipeline = pipeline(&dir);
    pipeline.run();
    let first = pipeline.trusted().read("scores").unwrap();
    pipeline.run();
    let second = pipeline.trusted().read("scores").unwrap();

    let drop_stamp = |df: DataFrame| df.drop(scorelab_runner::LOAD_TIMESTAMP_COLUMN).unwrap();
    assert!(drop_stamp(first).equals(&drop_stamp(second)));
}

#[test]
fn without_distress_table_nobody_is_penalized() {
    let dir = seeded_root();
    std::fs::remove_file(dir.path().join("raw").join("recuperacao_judicial.csv")).unwrap();
    let pipeline = pipeline(&dir);
    let report = pipeline.run();
    assert!(report.is_success());

    let sectors = sectors_from_frame(&pipeline.trusted().read("sector_scores").unwrap()).unwrap();
    assert!(sectors.iter().all(|r| r.distress_pts == 0.0));
    assert!(matches!(
        report.table("recuperacao_judicial").unwrap().trusted,
        Some(Outcome::Skipped { .. })
    ));
}

#[test]
fn leftover_derived_tables_are_not_promoted_when_scoring_is_skipped() {
    let dir = seeded_root();
    let pipeline = pipeline(&dir);
    let first = pipeline.run();
    assert!(first.is_success());

    std::fs::remove_file(dir.path().join("raw").join("indicadores.csv")).unwrap();
    let second = pipeline.run();

    assert!(second.is_success(), "{:#?}", second.summary_lines());
    for table in ["scores", "valuation", "sector_scores"] {
        let entry = second.table(table).unwrap();
        assert!(
            matches!(entry.trusted, Some(Outcome::Skipped { .. })),
            "{table}: {:?}",
            entry.trusted
        );
    }
    let dy = second.table("dividend_yield").unwrap();
    assert!(matches!(dy.trusted, Some(Outcome::Done { .. })));

    // Trusted scores still carry the first run's load.
    let meta = pipeline.trusted().read_meta("scores").unwrap();
    assert_eq!(meta.promoted_at, first.started_at);
    let stamps = pipeline.trusted().read("scores").unwrap();
    let stamp = stamps
        .column(scorelab_runner::LOAD_TIMESTAMP_COLUMN)
        .unwrap()
        .str()
        .unwrap()
        .get(0)
        .map(str::to_string);
    assert_eq!(
        stamp,
        Some(first.started_at.format("%Y-%m-%d %H:%M:%S").to_string())
    );
}
