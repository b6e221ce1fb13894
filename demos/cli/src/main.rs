use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use observations_core::{
    format_display_value, format_encounter_title, format_header, parse_timestamp,
    ExtractedObservation, GroupingConfig, ObservationsByEncounter,
};
use observations_fhir::group_bundle_with_summary;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "observations-cli",
    about = "Nhóm observation trong bundle FHIR JSON theo lượt khám."
)]
struct Args {
    /// Đường dẫn tới file JSON bundle.
    #[arg(short, long)]
    input: PathBuf,

    /// File JSON ghi đè cấu hình mặc định (các trường tùy chọn).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// In kết quả dạng JSON thay vì bảng chữ.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("observations_fhir=info,observations_cli=info")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;
    let bundle: serde_json::Value = serde_json::from_str(&data)
        .with_context(|| format!("File {:?} không phải JSON hợp lệ", args.input))?;

    let (grouped, summary) = group_bundle_with_summary(&bundle, &config)?;
    tracing::info!(
        encounters = summary.encounters,
        standalone = summary.standalone,
        groups = summary.groups,
        dropped = summary.dropped,
        "grouped bundle"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&grouped)?);
    } else {
        for bucket in &grouped {
            print_bucket(bucket);
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GroupingConfig> {
    let Some(path) = path else {
        return Ok(GroupingConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file cấu hình {path:?}"))?;
    let overrides: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("File cấu hình {path:?} không hợp lệ"))?;

    let mut merged = serde_json::to_value(GroupingConfig::default())?;
    if let (Some(base), Some(overrides)) = (merged.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides {
            base.insert(key.clone(), value.clone());
        }
    }

    serde_json::from_value(merged).context("Cấu hình không hợp lệ")
}

fn print_bucket(bucket: &ObservationsByEncounter) {
    let title = bucket
        .encounter
        .as_ref()
        .map(|encounter| {
            let date = format_encounter_title(encounter, &format_date);
            format!("{date} · {}", encounter.encounter_type)
        })
        .unwrap_or_else(|| bucket.encounter_id.clone());
    println!("{title}");

    for observation in &bucket.observations {
        print_row(observation, 1);
    }
    for group in &bucket.grouped_observations {
        println!("  {}", format_header(&group.observation));
        for child in &group.children {
            print_row(child, 2);
        }
    }
    println!();
}

fn print_row(observation: &ExtractedObservation, depth: usize) {
    let indent = "  ".repeat(depth);
    let flag = match &observation.value {
        Some(value) if value.is_abnormal => " (!)",
        _ => "",
    };
    println!(
        "{indent}{}: {}{flag}",
        format_header(observation),
        format_display_value(observation, &translate)
    );
    for member in &observation.members {
        print_row(member, depth + 1);
    }
}

fn format_date(date: &str) -> String {
    match parse_timestamp(date) {
        Some(instant) if date.contains('T') => instant.format("%d-%b-%Y, %H:%M UTC").to_string(),
        Some(instant) => instant.format("%d-%b-%Y").to_string(),
        None => date.to_string(),
    }
}

fn translate(_key: &str, default: &str) -> String {
    default.to_string()
}
