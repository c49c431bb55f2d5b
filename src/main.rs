use std::{env, fs, path::Path, process, sync::Arc};

use anyhow::{bail, Context};
use log::info;
use tokio::signal;

use price_predictor::{
    normalize::DISPLAY_COLUMNS, store, DisplayStore, FileKv, MinMaxNormalizer, Pipeline,
    PipelineConfig, PipelineEvent, PredictionRequest, RawRecord, RecordParser,
};

const USAGE: &str = "\
usage: price-predictor train <csv> [config.json]
       price-predictor predict <field=value>... [label=<text>] [actual_price=<price>]
       price-predictor normalize <csv> [column...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("train") if args.len() == 2 || args.len() == 3 => {
            train(&args[1], args.get(2).map(Path::new)).await
        }
        Some("predict") if args.len() > 1 => predict(&args[1..]),
        Some("normalize") if args.len() > 1 => normalize(&args[1], &args[2..]),
        _ => {
            eprintln!("{USAGE}");
            process::exit(2);
        }
    }
}

fn open_kv(config: &PipelineConfig) -> anyhow::Result<Arc<FileKv>> {
    let kv = FileKv::open(&config.store_dir)
        .with_context(|| format!("cannot open store at '{}'", config.store_dir.display()))?;

    Ok(Arc::new(kv))
}

fn open_pipeline(config: PipelineConfig) -> anyhow::Result<Pipeline> {
    let (models, datasets) = store::open_stores(open_kv(&config)?);

    Ok(Pipeline::init(models, datasets, config)?)
}

async fn train(csv: &str, config: Option<&Path>) -> anyhow::Result<()> {
    let config = PipelineConfig::load(config)?;
    let raw = fs::read(csv).with_context(|| format!("cannot read '{csv}'"))?;
    let pipeline = open_pipeline(config)?;

    let mut handle = pipeline.spawn(raw)?;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(PipelineEvent::DatasetReady { examples, dropped, cached }) => {
                    println!("dataset: {examples} examples, {dropped} dropped (cached: {cached})");
                }
                Some(PipelineEvent::ModelReady { iterations, error, cached }) => {
                    println!("model: {iterations} iterations, error {error} (cached: {cached})");
                }
                Some(PipelineEvent::Progress(_)) => {}
                Some(PipelineEvent::Finished(_)) | Some(PipelineEvent::Failed(_)) | None => break,
            },
            _ = signal::ctrl_c() => {
                info!("received SIGINT, cancelling");
                handle.cancel();
            }
        }
    }

    handle.wait().await?;
    Ok(())
}

fn predict(fields: &[String]) -> anyhow::Result<()> {
    let pipeline = open_pipeline(PipelineConfig::load(None)?)?;
    let mut request = PredictionRequest::new(RawRecord::new());

    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("expected <field>=<value>, got {field:?}");
        };

        match key {
            "label" => request.label = Some(value.to_string()),
            "actual_price" => {
                let price = value
                    .parse::<f64>()
                    .with_context(|| format!("actual_price is not a number: {value:?}"))?;
                request.actual_price = Some(price);
            }
            _ => request.record.insert(key, value),
        }
    }

    let prediction = pipeline.predictions().predict(request)?;
    println!("{}", serde_json::to_string(&prediction)?);
    Ok(())
}

fn normalize(csv: &str, columns: &[String]) -> anyhow::Result<()> {
    let config = PipelineConfig::load(None)?;
    let raw = fs::read(csv).with_context(|| format!("cannot read '{csv}'"))?;
    let records = RecordParser::new(config.parse)?.parse_bytes(&raw)?;

    let columns: Vec<&str> = if columns.is_empty() {
        DISPLAY_COLUMNS.to_vec()
    } else {
        columns.iter().map(String::as_str).collect()
    };

    let table = MinMaxNormalizer.table(&records, &columns);

    DisplayStore::new(open_kv(&config)?).save(&table)?;

    println!("{}", serde_json::to_string_pretty(&table.rows)?);
    Ok(())
}
