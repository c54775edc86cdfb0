use chrono::{Duration, NaiveDate};
use coherent::{
    to_hierarchical_dataset, LongRecord, Reconciler, TopDownConfig, TopDownReconciler, TsDataset,
    TsFrame, TARGET,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> coherent::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 1. Long sales records: (day, market, product, units)
    let start = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let sales: [(&str, &str, [f64; 4]); 4] = [
        ("north", "apples", [12.0, 10.0, 14.0, 13.0]),
        ("north", "pears", [4.0, 6.0, 5.0, 5.0]),
        ("south", "apples", [20.0, 22.0, 19.0, 21.0]),
        ("south", "pears", [9.0, 7.0, 8.0, 10.0]),
    ];
    let records: Vec<LongRecord> = sales
        .iter()
        .flat_map(|(market, product, units)| {
            units.iter().enumerate().map(move |(day, &v)| {
                LongRecord::new(start + Duration::days(day as i64), [*market, *product], v)
            })
        })
        .collect();

    // 2. Wide frame at the product level plus the implied hierarchy
    let (frame, hierarchy) = to_hierarchical_dataset(&records, &["market", "product"], "/")?;
    let hierarchy = Arc::new(hierarchy);
    println!("levels: {:?}", hierarchy.level_names());
    for level in hierarchy.level_names() {
        println!("  {level}: {:?}", hierarchy.level_segments(level)?);
    }
    let history = TsDataset::with_hierarchy(frame, Arc::clone(&hierarchy))?;

    // 3. Learn product shares of each market over the last three days
    let config = TopDownConfig::new("product", "market")
        .with_period_length(3)
        .with_method("PHA".parse()?);
    let mut reconciler = TopDownReconciler::from_config(config)?;
    reconciler.fit(&history)?;

    // 4. A market-level forecast for the next two days
    let horizon: Vec<_> = (4..6).map(|d| start + Duration::days(d)).collect();
    let forecast = TsFrame::from_columns(
        horizon,
        vec![
            ("north", TARGET, vec![20.0, 18.0]),
            ("south", TARGET, vec![30.0, 33.0]),
        ],
    )?;
    let forecast = TsDataset::with_hierarchy(forecast, Arc::clone(&hierarchy))?;

    // 5. Disaggregate to products and check they add back up
    let products = reconciler.reconcile(&forecast)?;
    for segment in products.segments() {
        println!("{segment}: {:?}", products.frame().column(segment, TARGET));
    }
    let markets = reconciler.aggregate(&products)?;
    for segment in markets.segments() {
        println!("{segment} (re-aggregated): {:?}", markets.frame().column(segment, TARGET));
    }
    Ok(())
}
