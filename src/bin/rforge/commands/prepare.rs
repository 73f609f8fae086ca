use std::io::{self, Write};

use anyhow::{Context, Result};

use retro_forge::io::StoreLayout;
use retro_forge::prep::{DatasetPipeline, PrepConfig, RunSummary};
use retro_forge::{CachedCorpus, CorpusOptions};

use crate::cli::PrepareArgs;
use crate::config::build_prep_config;
use crate::display::{Context as DisplayContext, Progress, print_run_summary, print_skip_breakdown};

pub fn run_prepare(args: PrepareArgs, ctx: DisplayContext) -> Result<()> {
    let config = build_prep_config(&args)?;
    let layout = StoreLayout::new(&args.root);
    let pipeline = DatasetPipeline::new(layout.clone(), config.clone())
        .context("Invalid preparation settings")?;

    let total_steps = u8::try_from(args.splits.len()).unwrap_or(u8::MAX);
    let mut progress = Progress::new(ctx.interactive, total_steps);
    let mut summaries = Vec::with_capacity(args.splits.len());

    for split in &args.splits {
        let summary = pipeline
            .run(split, progress.observer())
            .with_context(|| format!("Failed to prepare split '{split}'"))?;

        let mut substeps = build_run_substeps(&summary);
        if let Some(step) = warm_cache(&layout, split, &config)? {
            substeps.push(step);
        }
        let substeps_ref: Vec<&str> = substeps.iter().map(|s| s.as_str()).collect();
        let description = if summary.up_to_date {
            format!("Split '{split}' already prepared")
        } else {
            format!("Prepared split '{split}'")
        };
        progress.complete_step(&description, &substeps_ref);

        summaries.push(summary);
    }

    progress.finish();

    if ctx.interactive {
        for summary in &summaries {
            print_run_summary(summary);
            print_skip_breakdown(&summary.skipped);
        }
    }

    if args.output.json {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &summaries)
            .context("Failed to write JSON summary")?;
        writeln!(stdout).context("Failed to write JSON summary")?;
    }

    Ok(())
}

/// Builds the consolidated cache right away so the first training epoch
/// does not pay for it.
fn warm_cache(layout: &StoreLayout, split: &str, config: &PrepConfig) -> Result<Option<String>> {
    if !(config.fast_read && config.save_cache) {
        return Ok(None);
    }
    let corpus = CachedCorpus::open(layout, split, CorpusOptions::from(config))
        .with_context(|| format!("Failed to build the record cache for '{split}'"))?;
    Ok(Some(format!("Cache holds {} records", corpus.len())))
}

fn build_run_substeps(summary: &RunSummary) -> Vec<String> {
    let mut steps = Vec::new();

    if summary.resumed_from > 0 && !summary.up_to_date {
        steps.push(format!("Resumed at reaction {}", summary.resumed_from));
    }
    steps.push(format!(
        "{} records from {} reactions",
        summary.written, summary.total
    ));

    let skipped = summary.skipped.total();
    if skipped > 0 {
        let top = summary
            .skipped
            .iter()
            .max_by_key(|(_, n)| *n)
            .map(|(reason, n)| format!(", mostly {reason} ({n})"))
            .unwrap_or_default();
        steps.push(format!("{skipped} skipped{top}"));
    }

    if summary.up_to_date {
        steps.push(format!("{} leaving groups", summary.registry_size));
    } else {
        steps.push(format!(
            "{} leaving groups ({} new)",
            summary.registry_size, summary.new_groups
        ));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_forge::prep::{SkipReason, SkipTally};

    #[test]
    fn substeps_report_skips_and_vocabulary() {
        let mut skipped = SkipTally::default();
        skipped.record(SkipReason::Alignment);
        skipped.record(SkipReason::Alignment);
        skipped.record(SkipReason::Parse);
        let summary = RunSummary {
            split: "train".to_string(),
            total: 10,
            written: 7,
            skipped,
            registry_size: 4,
            new_groups: 4,
            ..RunSummary::default()
        };

        let steps = build_run_substeps(&summary);
        assert_eq!(steps[0], "7 records from 10 reactions");
        assert_eq!(steps[1], "3 skipped, mostly alignment (2)");
        assert_eq!(steps[2], "4 leaving groups (4 new)");
    }
}
