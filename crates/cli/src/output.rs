//! Console rendering of transform results

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};

use spendmap_import::{summarize_store, LearnOutcome, MatchType, TransformSummary};

pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

fn create_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.to_vec());
    table
}

fn share(count: usize, total: usize) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", count as f64 * 100.0 / total as f64)
}

pub fn learn_outcome(outcome: &LearnOutcome, mapping: Option<&Path>) -> Result<()> {
    match outcome {
        LearnOutcome::Applied(stats) => {
            let line = format!(
                "[learn] added={} duplicate={} conflicting={} total_rules={}",
                stats.added, stats.duplicate, stats.conflicting, stats.total_rules
            );
            println!("{}", line.green());
            if stats.conflicting > 0 {
                println!(
                    "{}",
                    "[learn] conflicting labels kept their existing category".yellow()
                );
            }
            if let Some(path) = mapping {
                let by_type = summarize_store(path)?;
                let parts: Vec<String> = [MatchType::Exact, MatchType::Contains, MatchType::Regex]
                    .iter()
                    .map(|t| format!("{} {}", t.as_str(), by_type.get(t).copied().unwrap_or(0)))
                    .collect();
                println!("[learn] {} ({})", path.display(), parts.join(", "));
            }
        }
        LearnOutcome::Skipped { reason } => {
            println!("{}", format!("[learn] skipped: {reason}").yellow());
        }
    }
    Ok(())
}

pub fn written(summary: &TransformSummary) {
    println!("Wrote {}", summary.transformed_path.display());
    if let Some(path) = &summary.uncategorized_path {
        println!(
            "{}",
            format!(
                "Wrote {} ({} patterns to label)",
                path.display(),
                summary.uncategorized_patterns
            )
            .yellow()
        );
    }
    if let Some(path) = &summary.parquet_path {
        println!("Wrote {}", path.display());
    }
}

pub fn report(summary: &TransformSummary) {
    println!();
    println!("{}", "Match report".bold());
    println!("Rows: {}", summary.rows);

    let mut stages = create_table(&["Stage", "Rows", "Share"]);
    for (stage, count) in summary.stages.iter().filter(|(_, c)| *c > 0) {
        stages.add_row(vec![
            Cell::new(stage.as_str()),
            Cell::new(count).set_alignment(CellAlignment::Right),
            Cell::new(share(count, summary.rows)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{stages}");

    if !summary.top_merchants.is_empty() {
        println!();
        println!("{}", "Top merchants".bold());
        let mut merchants = create_table(&["Merchant", "Rows"]);
        for m in &summary.top_merchants {
            merchants.add_row(vec![
                Cell::new(&m.merchant),
                Cell::new(m.count).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{merchants}");
    }

    println!();
    println!("Uncategorized patterns: {}", summary.uncategorized_patterns);
    if let Some(path) = &summary.mapping_path {
        println!("Mapping: {} ({} rules)", path.display(), summary.mapping_rules);
    }
    if !summary.custom_categories.is_empty() {
        println!(
            "{}",
            format!(
                "Categories outside the built-in taxonomy: {}",
                summary.custom_categories.join(", ")
            )
            .yellow()
        );
    }
}
