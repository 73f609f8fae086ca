use std::io::{self, Write};

use retro_forge::LeavingGroup;
use retro_forge::prep::{Cursor, RunSummary, SkipTally};

use crate::util::formula::hill_formula;
use crate::util::text::{join_compact, truncate};

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

pub fn print_run_summary(summary: &RunSummary) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut rows = vec![
        ("Raw Reactions", format!("{}", summary.total)),
        ("Records", format!("{}", summary.written)),
        ("Skipped", format!("{}", summary.skipped.total())),
        ("Vocabulary", format!("{}", summary.registry_size)),
    ];
    if !summary.up_to_date {
        rows.push(("New Groups", format!("{}", summary.new_groups)));
        rows.push(("Largest Product", format!("{} atoms", summary.largest_product)));
        rows.push((
            "Largest Group",
            format!("{} atoms", summary.largest_leaving_group),
        ));
        rows.push(("Most Regents", format!("{} atoms", summary.most_regents)));
    }
    if summary.resumed_from > 0 {
        rows.push(("Resumed At", format!("{}", summary.resumed_from)));
    }

    print_kv_table(&mut out, &format!("Split '{}'", summary.split), &rows);
}

pub fn print_skip_breakdown(tally: &SkipTally) {
    let total = tally.total();
    if total == 0 {
        return;
    }

    let stderr = io::stderr();
    let mut out = stderr.lock();

    let mut sorted: Vec<_> = tally
        .iter()
        .map(|(reason, n)| (reason.as_str().to_string(), n))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    print_distribution_table(&mut out, "Skipped Reactions", "Reason", &sorted, total);
}

pub fn print_cursor(split: &str, cursor: Option<&Cursor>, records: Option<usize>) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let rows = match cursor {
        None => vec![("Status", "not started".to_string())],
        Some(cursor) => {
            let status = if cursor.complete {
                "complete"
            } else {
                "in progress"
            };
            let mut rows = vec![
                ("Status", status.to_string()),
                ("Next Reaction", format!("{}", cursor.next_reaction)),
                ("Records", format!("{}", cursor.written)),
                ("Skipped", format!("{}", cursor.skipped.total())),
                ("Input SHA-256", cursor.input_sha256.clone()),
                ("Settings SHA-256", cursor.settings_sha256.clone()),
            ];
            if let Some(n) = records {
                rows.push(("Readable", format!("{n}")));
            }
            rows
        }
    };

    print_kv_table(&mut out, &format!("Split '{split}'"), &rows);
}

/// Lists `(id, group)` pairs as given.
pub fn print_leaving_groups(groups: &[(usize, &LeavingGroup)], vocabulary: usize) {
    let stderr = io::stderr();
    let mut out = stderr.lock();

    let id_w = 5usize;
    let formula_w = 12usize;
    let n_w = 7usize;
    let sep_overhead = 12;
    let types_w = SAFE_TABLE_WIDTH.saturating_sub(id_w + formula_w + n_w + sep_overhead);

    let _ = writeln!(
        out,
        "{}┌─ Leaving Groups ({} of {}) ─┐",
        INDENT,
        groups.len(),
        vocabulary
    );
    let _ = writeln!(
        out,
        "{}┌{}┬{}┬{}┬{}┐",
        INDENT,
        "─".repeat(id_w + 2),
        "─".repeat(formula_w + 2),
        "─".repeat(n_w + 2),
        "─".repeat(types_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:>id_w$} │ {:<formula_w$} │ {:>n_w$} │ {:<types_w$} │",
        INDENT, "Id", "Formula", "Seen", "Types / Centers",
    );
    let _ = writeln!(
        out,
        "{}├{}┼{}┼{}┼{}┤",
        INDENT,
        "─".repeat(id_w + 2),
        "─".repeat(formula_w + 2),
        "─".repeat(n_w + 2),
        "─".repeat(types_w + 2)
    );

    for (id, group) in groups {
        let types = format!(
            "{} / {}",
            join_compact(&group.rxn_type),
            join_compact(&group.center_cnt)
        );
        let _ = writeln!(
            out,
            "{}│ {:>id_w$} │ {:<formula_w$} │ {:>n_w$} │ {:<types_w$} │",
            INDENT,
            id,
            truncate(&hill_formula(group), formula_w),
            group.n,
            truncate(&types, types_w),
        );
    }

    let _ = writeln!(
        out,
        "{}└{}┴{}┴{}┴{}┘",
        INDENT,
        "─".repeat(id_w + 2),
        "─".repeat(formula_w + 2),
        "─".repeat(n_w + 2),
        "─".repeat(types_w + 2)
    );
}

fn print_distribution_table(
    out: &mut impl Write,
    title: &str,
    label: &str,
    data: &[(String, usize)],
    total: usize,
) {
    let name_w = 18usize;
    let count_w = 8usize;
    let sep_overhead = 6;
    let dist_w = SAFE_TABLE_WIDTH.saturating_sub(name_w + count_w + sep_overhead);
    let max_bar_width = dist_w.saturating_sub(8).min(20);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{name_line}┬{count_line}┬{dist_line}┐",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
        INDENT, label, "Count", "Share",
    );
    let _ = writeln!(
        out,
        "{}├{name_line}┼{count_line}┼{dist_line}┤",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );

    for (name, count) in data {
        let pct = (*count as f64 / total as f64) * 100.0;
        let bar = make_bar(pct, max_bar_width);
        let dist_cell = format!("{}  {:>5.1}%", bar, pct);
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            truncate(name, name_w),
            count,
            dist_cell,
        );
    }

    let _ = writeln!(
        out,
        "{}└{name_line}┴{count_line}┴{dist_line}┘",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 16usize;
    let sep_overhead = 6;
    let val_w = SAFE_TABLE_WIDTH.saturating_sub(key_w + sep_overhead);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{k_line}┬{v_line}┐",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<key_w$} │ {:>val_w$} │",
        INDENT, "Metric", "Value",
    );
    let _ = writeln!(
        out,
        "{}├{k_line}┼{v_line}┤",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );

    for (key, val) in rows {
        let _ = writeln!(
            out,
            "{}│ {:<key_w$} │ {:>val_w$} │",
            INDENT,
            truncate(key, key_w),
            truncate(val, val_w),
        );
    }

    let _ = writeln!(
        out,
        "{}└{k_line}┴{v_line}┘",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
}

fn make_bar(pct: f64, max_width: usize) -> String {
    let filled = ((pct / 100.0) * max_width as f64).round() as usize;
    let empty = max_width.saturating_sub(filled);
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
