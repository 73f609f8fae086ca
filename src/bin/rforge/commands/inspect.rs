use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use retro_forge::io::StoreLayout;
use retro_forge::prep::{Cursor, LeavingGroupRegistry};
use retro_forge::{CachedCorpus, CorpusOptions, LeavingGroup};

use crate::cli::InspectArgs;
use crate::display::{Context as DisplayContext, print_cursor, print_leaving_groups};
use crate::util::formula::hill_formula;
use crate::util::text::join_compact;

#[derive(Serialize)]
struct InspectReport<'a> {
    split: &'a str,
    cursor: Option<&'a Cursor>,
    records: Option<usize>,
    vocabulary: usize,
    top: Vec<GroupReport<'a>>,
}

#[derive(Serialize)]
struct GroupReport<'a> {
    id: usize,
    formula: String,
    na: usize,
    n: usize,
    gate_num: &'a [u32],
    rxn_type: &'a [u32],
    center_cnt: &'a [usize],
}

pub fn run_inspect(args: InspectArgs, ctx: DisplayContext) -> Result<()> {
    let layout = StoreLayout::new(&args.root);
    let registry = LeavingGroupRegistry::load(&layout.registry_file())
        .context("Failed to load the leaving-group registry")?;

    let cursor = registry.cursor(&args.split);
    let records = match cursor {
        Some(c) if c.complete => {
            let options = CorpusOptions {
                fast_read: false,
                save_cache: false,
            };
            let corpus = CachedCorpus::open(&layout, &args.split, options)
                .with_context(|| format!("Failed to open split '{}'", args.split))?;
            Some(corpus.len())
        }
        _ => None,
    };

    let top = most_frequent(registry.groups(), args.top);

    if ctx.interactive {
        print_cursor(&args.split, cursor, records);
        print_leaving_groups(&top, registry.len());
    }

    let mut stdout = io::stdout().lock();
    if args.output.json {
        let report = InspectReport {
            split: &args.split,
            cursor,
            records,
            vocabulary: registry.len(),
            top: top
                .iter()
                .map(|(id, group)| GroupReport {
                    id: *id,
                    formula: hill_formula(group),
                    na: group.na,
                    n: group.n,
                    gate_num: &group.gate_num,
                    rxn_type: &group.rxn_type,
                    center_cnt: &group.center_cnt,
                })
                .collect(),
        };
        serde_json::to_writer_pretty(&mut stdout, &report).context("Failed to write JSON report")?;
        writeln!(stdout).context("Failed to write JSON report")?;
    } else if !ctx.interactive {
        for (id, group) in &top {
            writeln!(
                stdout,
                "{id}\t{}\t{}\t{}",
                hill_formula(group),
                group.n,
                join_compact(&group.rxn_type)
            )
            .context("Failed to write report")?;
        }
    }

    Ok(())
}

/// The `limit` most frequent groups; ties keep the lower id first.
fn most_frequent(groups: &[LeavingGroup], limit: usize) -> Vec<(usize, &LeavingGroup)> {
    let mut ranked: Vec<_> = groups.iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.n.cmp(&a.1.n).then(a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}
