use std::io::{self, Write};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use retro_forge::prep::{Cursor, Event, Observer, Silent};

/// One bar per split, with a checkmark line left behind when it completes.
pub struct SplitBar {
    bar: Option<ProgressBar>,
    start: Instant,
    step: u8,
    total_steps: u8,
    step_start: Instant,
    written: usize,
    skipped: usize,
}

impl SplitBar {
    pub fn new(total_steps: u8) -> Self {
        let now = Instant::now();
        Self {
            bar: None,
            start: now,
            step: 0,
            total_steps,
            step_start: now,
            written: 0,
            skipped: 0,
        }
    }

    fn refresh_message(&self) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} written, {} skipped", self.written, self.skipped));
        }
    }

    pub fn complete_step(&mut self, description: &str, substeps: &[&str]) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        let elapsed = self.step_start.elapsed();
        let mut stderr = io::stderr().lock();

        let _ = writeln!(
            stderr,
            "  \x1b[32m✓\x1b[0m {:<44} {:>5.1}s",
            description,
            elapsed.as_secs_f64()
        );

        for substep in substeps {
            let _ = writeln!(stderr, "      \x1b[2m·\x1b[0m {}", substep);
        }
    }

    pub fn finish(mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        print_footer(self.start.elapsed());
    }
}

impl Observer for SplitBar {
    fn on_start(&mut self, split: &str, total: usize, resume_from: usize) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        self.step += 1;
        self.step_start = Instant::now();
        self.written = 0;
        self.skipped = 0;

        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} [{}/{}] {:<8} [{{bar:28.cyan/blue}}] {{pos}}/{{len}} {{msg}}",
                self.step, self.total_steps, split
            ))
            .expect("invalid template")
            .progress_chars("━╸ ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.set_position(resume_from.min(total) as u64);
        bar.enable_steady_tick(Duration::from_millis(80));

        self.bar = Some(bar);
        self.refresh_message();
    }

    fn on_reaction(&mut self, _index: usize, event: Event<'_>) {
        match event {
            Event::Written { .. } => self.written += 1,
            Event::Skipped(_) => self.skipped += 1,
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
        self.refresh_message();
    }

    fn on_checkpoint(&mut self, cursor: &Cursor) {
        if let Some(bar) = &self.bar {
            bar.set_position(cursor.next_reaction as u64);
        }
    }
}

fn print_footer(elapsed: Duration) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(
        stderr,
        "  \x1b[2m╺━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━╸\x1b[0m"
    );
    let _ = writeln!(stderr);
    let _ = writeln!(
        stderr,
        "  \x1b[32m✓\x1b[0m Preparation complete {:>29}",
        format!("Total: {:.2}s", elapsed.as_secs_f64())
    );
    let _ = writeln!(stderr);
}

pub enum Progress {
    Interactive(SplitBar),
    Silent(Silent),
}

impl Progress {
    pub fn new(interactive: bool, total_steps: u8) -> Self {
        if interactive {
            Self::Interactive(SplitBar::new(total_steps))
        } else {
            Self::Silent(Silent)
        }
    }

    pub fn observer(&mut self) -> &mut dyn Observer {
        match self {
            Self::Interactive(s) => s,
            Self::Silent(s) => s,
        }
    }

    pub fn complete_step(&mut self, description: &str, substeps: &[&str]) {
        match self {
            Self::Interactive(s) => s.complete_step(description, substeps),
            Self::Silent(_) => {}
        }
    }

    pub fn finish(self) {
        match self {
            Self::Interactive(s) => s.finish(),
            Self::Silent(_) => {}
        }
    }
}
