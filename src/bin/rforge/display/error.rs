use std::io::{self, Write};

use anyhow::Error;

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    let msg = err.to_string();
    for line in wrap(&msg, 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 59) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    if let Some(hints) = HintCollector::collect(err) {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

struct HintCollector {
    hints: Vec<String>,
    has_typed_hints: bool,
}

impl HintCollector {
    fn new() -> Self {
        Self {
            hints: Vec::new(),
            has_typed_hints: false,
        }
    }

    fn collect(err: &Error) -> Option<Vec<String>> {
        let mut collector = Self::new();

        collector.collect_prep_hints(err);
        if !collector.has_typed_hints {
            if let Some(io_err) = err.downcast_ref::<retro_forge::io::Error>() {
                collector.mark_typed();
                collector.collect_store_hints(io_err);
            }
        }

        if !collector.has_typed_hints {
            collector.collect_fallback_hints(err);
        }

        if collector.hints.is_empty() {
            None
        } else {
            Some(collector.hints)
        }
    }

    fn add(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
    }

    fn mark_typed(&mut self) {
        self.has_typed_hints = true;
    }

    fn collect_prep_hints(&mut self, err: &Error) {
        use retro_forge::PrepError;

        let Some(prep_err) = err.downcast_ref::<PrepError>() else {
            return;
        };

        self.mark_typed();

        match prep_err {
            PrepError::MissingRawFile { path } => {
                self.add(format!(
                    "Expected raw reactions at '{}'",
                    path.display()
                ));
                self.add("Each split is read from <ROOT>/raw/<split>.csv");
                self.add("Use --split to choose which splits to prepare");
            }

            PrepError::InputChanged { path, .. } => {
                self.add(format!(
                    "'{}' changed since this split was started",
                    path.display()
                ));
                self.add("Restore the original file to resume the interrupted run");
                self.add("Or delete <ROOT>/processed to prepare everything from scratch");
            }

            PrepError::SettingsChanged { split, .. } => {
                self.add(format!(
                    "Split '{split}' was started with different size limits, seed or dataset type"
                ));
                self.add("Rerun with the settings used before to keep its records consistent");
                self.add("Or delete <ROOT>/processed to prepare everything from scratch");
            }

            PrepError::Config(_) => {
                self.add("Check the size limits: min-node must be below max-node");
                self.add("Counts such as workers and checkpoint-every must be positive");
            }

            PrepError::ConfigParse(_) => {
                self.add("Configuration file has invalid TOML syntax or unknown keys");
                self.add("Keys are kebab-case, e.g. max-node, dataset-type, workers");
            }

            PrepError::WorkerPool(_) => {
                self.add("Could not start the worker threads");
                self.add("Try a smaller --workers value");
            }

            PrepError::Io(io_err) => self.collect_store_hints(io_err),
        }
    }

    fn collect_store_hints(&mut self, err: &retro_forge::io::Error) {
        use retro_forge::io::Error as StoreError;

        match err {
            StoreError::Io { source, .. } => self.collect_std_io_hints(source),

            StoreError::Csv { .. } => {
                self.add("The raw CSV could not be read");
                self.add("Check for unbalanced quotes or invalid UTF-8");
            }

            StoreError::MissingColumn { column, .. } => {
                self.add(format!("The CSV header must contain a '{column}' column"));
                self.add("An optional 'class' column holds 1-indexed reaction types");
            }

            StoreError::Encode { .. } => {
                self.add("Failed to write a binary record");
                self.add("Check available disk space");
            }

            StoreError::Decode { .. } => {
                self.add("A processed file is truncated or was written by another version");
                self.add("Delete <ROOT>/processed and prepare the dataset again");
            }
        }
    }

    fn collect_std_io_hints(&mut self, source: &std::io::Error) {
        use std::io::ErrorKind;

        match source.kind() {
            ErrorKind::NotFound => {
                self.add("File or directory not found");
                self.add("Check the path spelling and ensure the split was prepared");
            }

            ErrorKind::PermissionDenied => {
                self.add("Permission denied accessing the file");
                self.add("Check file permissions with `ls -la`");
            }

            ErrorKind::InvalidData => {
                self.add("File contains invalid or corrupt data");
                self.add("Verify the file is not truncated or corrupted");
            }

            ErrorKind::WriteZero | ErrorKind::StorageFull => {
                self.add("Failed to write data (disk full?)");
                self.add("Check available disk space");
            }

            _ => {
                self.add("I/O operation failed");
                self.add("Check file path, permissions, and disk space");
            }
        }
    }

    fn collect_fallback_hints(&mut self, err: &Error) {
        let msg = error_chain_text(err);

        if msg.contains("no such file") || msg.contains("not found") {
            self.add("Check that the file path is correct");
            self.add("Verify the file exists and is readable");
            return;
        }

        if msg.contains("permission denied") {
            self.add("Check file permissions with `ls -la`");
            self.add("Ensure you have the required access rights");
        }
    }
}

fn error_chain_text(err: &Error) -> String {
    let mut text = String::new();

    text.push_str(&err.to_string());

    let mut source = err.source();
    while let Some(cause) = source {
        text.push('\n');
        text.push_str(&cause.to_string());
        source = cause.source();
    }

    text.to_lowercase()
}
