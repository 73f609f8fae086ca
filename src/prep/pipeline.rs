use std::collections::BTreeMap;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use super::align::AlignmentResolver;
use super::builder::{Draft, RecordBuilder};
use super::center;
use super::config::PrepConfig;
use super::error::{Error, Rejection, SkipReason};
use super::registry::{Cursor, LeavingGroupRegistry};
use crate::io::{self, AuditLog, RawReaction, StoreLayout};
use crate::parse::{MoleculeParser, SmilesParser, shuffle_map_numbers, split_reaction};

/// Skipped-reaction counters keyed by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipTally(BTreeMap<SkipReason, usize>);

impl SkipTally {
    pub fn record(&mut self, reason: SkipReason) {
        *self.0.entry(reason).or_default() += 1;
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Non-zero counters in [`SkipReason`] order.
    pub fn iter(&self) -> impl Iterator<Item = (SkipReason, usize)> + '_ {
        self.0.iter().map(|(r, n)| (*r, *n))
    }
}

/// A reaction that passed every check, waiting to be committed.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub draft: Draft,
    /// SMILES as aligned, after any map-number shuffle.
    pub reactant_smiles: String,
    pub product_smiles: String,
    pub n_product: usize,
    pub n_lg: usize,
    pub n_regents: usize,
}

/// Result of the per-reaction stage.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ready(Box<Prepared>),
    Skipped(Rejection),
}

/// What happened to one reaction during commit.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Written {
        record: usize,
        lg_id: usize,
        new_group: bool,
    },
    Skipped(&'a Rejection),
}

/// Hooks for progress reporting. Every method defaults to a no-op.
pub trait Observer {
    fn on_start(&mut self, _split: &str, _total: usize, _resume_from: usize) {}
    fn on_reaction(&mut self, _index: usize, _event: Event<'_>) {}
    fn on_checkpoint(&mut self, _cursor: &Cursor) {}
}

/// Observer that reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Observer for Silent {}

/// Outcome of [`DatasetPipeline::run`] for one split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub split: String,
    /// Raw reactions in the input file.
    pub total: usize,
    /// Reaction index this run started at.
    pub resumed_from: usize,
    /// Reactions handled by this run.
    pub processed: usize,
    /// Records in the split, including earlier runs.
    pub written: usize,
    /// Skips for the whole split, including earlier runs.
    pub skipped: SkipTally,
    pub registry_size: usize,
    pub new_groups: usize,
    pub largest_leaving_group: usize,
    pub largest_product: usize,
    pub most_regents: usize,
    /// The split was already complete; nothing was done.
    pub up_to_date: bool,
}

/// Orchestrates parsing, alignment, center extraction, deduplication and
/// record writing for one dataset root.
#[derive(Debug)]
pub struct DatasetPipeline<P = SmilesParser> {
    layout: StoreLayout,
    config: PrepConfig,
    parser: P,
    resolver: AlignmentResolver,
    builder: RecordBuilder,
}

impl DatasetPipeline {
    pub fn new(layout: StoreLayout, config: PrepConfig) -> Result<Self, Error> {
        Self::with_parser(layout, config, SmilesParser)
    }
}

impl<P: MoleculeParser> DatasetPipeline<P> {
    pub fn with_parser(layout: StoreLayout, config: PrepConfig, parser: P) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            resolver: AlignmentResolver::for_dataset(config.dataset_type),
            builder: RecordBuilder::new(config.limits()),
            layout,
            config,
            parser,
        })
    }

    /// Replaces the dataset's default regent handling.
    pub fn with_resolver(mut self, resolver: AlignmentResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Runs the pure per-reaction stage. Touches no shared state.
    pub fn process(&self, index: usize, raw: &RawReaction) -> Outcome {
        match self.try_process(index, raw) {
            Ok(prepared) => Outcome::Ready(Box::new(prepared)),
            Err(rejection) => Outcome::Skipped(rejection),
        }
    }

    fn try_process(&self, index: usize, raw: &RawReaction) -> Result<Prepared, Rejection> {
        let (reactant, product) = split_reaction(&raw.rxn_smiles)?;
        let shuffle = self.config.dataset_type.shuffles_map_numbers();
        let (reactant_smiles, product_smiles) = if shuffle {
            shuffle_map_numbers(reactant, product, &mut self.rng_for(index))
        } else {
            (reactant.to_string(), product.to_string())
        };

        let use_3d = self.config.use_3d_info;
        let product = self.parser.parse(&product_smiles, use_3d, true)?;
        if use_3d && product.dist_adj.is_none() {
            return Err(Rejection::Missing3d);
        }
        self.builder.check_product(product.n_atom)?;

        let reactant = self.parser.parse(&reactant_smiles, false, true)?;
        let alignment = self
            .resolver
            .resolve(&product, &reactant, &reactant_smiles)?;
        let n_regents = alignment.regents_idx.len();
        self.builder.check_reactant(reactant.n_atom, n_regents)?;
        self.builder.check_regents(n_regents)?;

        let reordered = reactant.select(&alignment.order);
        let center = center::extract(&product.bond_adj, &reordered.bond_adj, product.n_atom);
        if center.exceeds(self.config.center_cutoff) {
            return Err(Rejection::CenterCount {
                count: center.count,
                cutoff: self.config.center_cutoff,
            });
        }

        let draft = self.builder.prepare(
            &product,
            &reordered,
            &alignment,
            &center,
            raw.reaction_type(),
        )?;
        Ok(Prepared {
            draft,
            reactant_smiles,
            product_smiles,
            n_product: product.n_atom,
            n_lg: alignment.n_lg,
            n_regents,
        })
    }

    /// Per-reaction random source, independent of how many reactions ran
    /// before it.
    fn rng_for(&self, index: usize) -> StdRng {
        let mixed = (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        StdRng::seed_from_u64(self.config.seed ^ mixed)
    }

    fn process_chunk(
        &self,
        pool: Option<&ThreadPool>,
        base: usize,
        chunk: &[RawReaction],
    ) -> Vec<Outcome> {
        let run = |(offset, raw): (usize, &RawReaction)| self.process(base + offset, raw);
        match pool {
            Some(pool) => pool.install(|| chunk.par_iter().enumerate().map(run).collect()),
            None => chunk.iter().enumerate().map(run).collect(),
        }
    }

    /// Prepares `raw/<split>.csv`, resuming from the last checkpoint.
    pub fn run(&self, split: &str, observer: &mut dyn Observer) -> Result<RunSummary, Error> {
        let raw_path = self.layout.raw_file(split);
        if !raw_path.is_file() {
            return Err(Error::MissingRawFile { path: raw_path });
        }
        let input_sha256 = io::sha256_file(&raw_path)?;
        let settings_sha256 = self.config.fingerprint();
        let reactions = io::read_raw_reactions(&raw_path)?;
        let registry = LeavingGroupRegistry::load(&self.layout.registry_file())?;

        let cursor = match registry.cursor(split) {
            Some(saved) if saved.input_sha256 != input_sha256 => {
                return Err(Error::InputChanged {
                    path: raw_path,
                    expected: saved.input_sha256.clone(),
                    found: input_sha256,
                });
            }
            Some(saved) if saved.settings_sha256 != settings_sha256 => {
                return Err(Error::SettingsChanged {
                    split: split.to_string(),
                    expected: saved.settings_sha256.clone(),
                    found: settings_sha256,
                });
            }
            Some(saved) => saved.clone(),
            None => Cursor::new(input_sha256, settings_sha256),
        };

        let mut summary = RunSummary {
            split: split.to_string(),
            total: reactions.len(),
            resumed_from: cursor.next_reaction,
            ..RunSummary::default()
        };
        if cursor.complete {
            info!(
                "split '{split}' is already prepared ({} records)",
                cursor.written
            );
            summary.written = cursor.written;
            summary.skipped = cursor.skipped;
            summary.registry_size = registry.len();
            summary.up_to_date = true;
            return Ok(summary);
        }
        if cursor.next_reaction > 0 {
            info!(
                "resuming split '{split}' at reaction {} with {} records written",
                cursor.next_reaction, cursor.written
            );
        }

        io::remove_if_exists(&self.layout.cache_file(split))?;
        let audit = AuditLog::open(&self.layout.audit_file(split), cursor.written)?;
        observer.on_start(split, reactions.len(), cursor.next_reaction);

        let pool = if self.config.workers > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(self.config.workers)
                    .build()?,
            )
        } else {
            None
        };

        let start = cursor.next_reaction.min(reactions.len());
        let mut session = Session {
            split,
            layout: &self.layout,
            registry,
            cursor,
            audit,
            summary,
        };

        let step = self.config.checkpoint_every;
        for (n, chunk) in reactions[start..].chunks(step).enumerate() {
            let base = start + n * step;
            let outcomes = self.process_chunk(pool.as_ref(), base, chunk);
            for (offset, outcome) in outcomes.into_iter().enumerate() {
                session.commit(base + offset, outcome, observer)?;
            }
            session.cursor.next_reaction = base + chunk.len();
            session.checkpoint()?;
            observer.on_checkpoint(&session.cursor);
        }

        io::write_blob(&self.layout.count_file(split), &session.cursor.written)?;
        session.cursor.complete = true;
        session.checkpoint()?;

        let Session {
            registry,
            cursor,
            mut summary,
            ..
        } = session;
        summary.written = cursor.written;
        summary.skipped = cursor.skipped;
        summary.registry_size = registry.len();
        info!(
            "split '{split}': {} records written, {} skipped, {} leaving groups",
            summary.written,
            summary.skipped.total(),
            summary.registry_size
        );
        Ok(summary)
    }
}

/// Single-writer state of one run: everything `commit` mutates.
struct Session<'a> {
    split: &'a str,
    layout: &'a StoreLayout,
    registry: LeavingGroupRegistry,
    cursor: Cursor,
    audit: AuditLog,
    summary: RunSummary,
}

impl Session<'_> {
    fn commit(
        &mut self,
        index: usize,
        outcome: Outcome,
        observer: &mut dyn Observer,
    ) -> Result<(), Error> {
        self.summary.processed += 1;
        let prepared = match outcome {
            Outcome::Ready(prepared) => *prepared,
            Outcome::Skipped(rejection) => {
                debug!("reaction {index} skipped: {rejection}");
                self.cursor.skipped.record(rejection.reason());
                observer.on_reaction(index, Event::Skipped(&rejection));
                return Ok(());
            }
        };

        let (lg_id, new_group) = self.registry.lookup_or_insert(&prepared.draft.group);
        let record_no = self.cursor.written;
        let record = prepared.draft.finish(lg_id);
        io::write_blob(&self.layout.record_file(self.split, record_no), &record)?;
        self.audit
            .append(&prepared.reactant_smiles, &prepared.product_smiles)?;
        self.cursor.written += 1;

        let summary = &mut self.summary;
        summary.new_groups += usize::from(new_group);
        summary.largest_leaving_group = summary.largest_leaving_group.max(prepared.n_lg);
        summary.largest_product = summary.largest_product.max(prepared.n_product);
        summary.most_regents = summary.most_regents.max(prepared.n_regents);

        observer.on_reaction(
            index,
            Event::Written {
                record: record_no,
                lg_id,
                new_group,
            },
        );
        Ok(())
    }

    /// Flushes the audit trail, then commits registry and cursor together.
    fn checkpoint(&mut self) -> Result<(), Error> {
        self.audit.flush()?;
        self.registry.set_cursor(self.split, self.cursor.clone());
        self.registry.save(&self.layout.registry_file())?;
        debug!(
            "checkpoint '{}': next reaction {}, {} records",
            self.split, self.cursor.next_reaction, self.cursor.written
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prep::config::DatasetType;
    use crate::prep::error::AlignmentError;

    const ESTER_RXN: &str = "[CH3:1][O:2][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1.[OH2:11]>>[OH:11][C:3](=[O:4])[c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1";

    fn pipeline(config: PrepConfig) -> DatasetPipeline {
        DatasetPipeline::new(StoreLayout::new("unused"), config).unwrap()
    }

    fn raw(rxn: &str, class: Option<u32>) -> RawReaction {
        RawReaction {
            rxn_smiles: rxn.to_string(),
            class,
        }
    }

    fn full() -> PrepConfig {
        PrepConfig {
            dataset_type: DatasetType::UsptoFull,
            ..PrepConfig::default()
        }
    }

    #[test]
    fn tally_counts_per_reason() {
        let mut tally = SkipTally::default();
        tally.record(SkipReason::Parse);
        tally.record(SkipReason::Parse);
        tally.record(SkipReason::GateCount);
        assert_eq!(tally.get(SkipReason::Parse), 2);
        assert_eq!(tally.get(SkipReason::Alignment), 0);
        assert_eq!(tally.total(), 3);
        let reasons: Vec<_> = tally.iter().map(|(r, _)| r).collect();
        assert_eq!(reasons, vec![SkipReason::Parse, SkipReason::GateCount]);
    }

    #[test]
    fn ester_hydrolysis_is_prepared() {
        let outcome = pipeline(full()).process(0, &raw(ESTER_RXN, Some(6)));
        let Outcome::Ready(prepared) = outcome else {
            panic!("reaction should be accepted");
        };
        assert_eq!(prepared.n_product, 9);
        assert_eq!(prepared.n_lg, 2);
        assert_eq!(prepared.draft.group.na, 2);
        let record = prepared.draft.finish(0);
        assert_eq!(record.center_cnt, 1);
        assert_eq!(record.rxn_type, Some(5));
    }

    #[test]
    fn rejections_carry_reasons() {
        let p = pipeline(full());
        let reason = |rxn: &str| match p.process(0, &raw(rxn, None)) {
            Outcome::Skipped(r) => Some(r.reason()),
            Outcome::Ready(_) => None,
        };
        assert_eq!(reason("not a reaction"), Some(SkipReason::Parse));
        assert_eq!(reason("CCCC>>C1CC"), Some(SkipReason::Parse));
        assert_eq!(reason("[CH3:1][OH:2]>>[CH3:1][OH:2]"), Some(SkipReason::ProductSize));
        assert_eq!(
            reason("[CH3:1][CH2:2][CH2:3][OH:4]>>[CH3:1][CH2:2][CH2:3][OH:9]"),
            Some(SkipReason::Alignment)
        );
    }

    #[test]
    fn three_d_mode_skips_without_spatial_distances() {
        let p = pipeline(PrepConfig {
            use_3d_info: true,
            ..full()
        });
        match p.process(0, &raw(ESTER_RXN, None)) {
            Outcome::Skipped(r) => assert_eq!(r, Rejection::Missing3d),
            Outcome::Ready(_) => panic!("3-D mode must skip"),
        }
    }

    #[test]
    fn center_cutoff_rejects_large_centers() {
        let p = pipeline(PrepConfig {
            center_cutoff: 0,
            ..full()
        });
        match p.process(0, &raw(ESTER_RXN, None)) {
            Outcome::Skipped(r) => assert_eq!(
                r,
                Rejection::CenterCount {
                    count: 1,
                    cutoff: 0
                }
            ),
            Outcome::Ready(_) => panic!("center above cutoff must skip"),
        }
    }

    #[test]
    fn shuffled_map_numbers_are_reproducible_per_index() {
        let p = pipeline(PrepConfig::default());
        let reaction = raw(ESTER_RXN, None);
        let smiles = |index| match p.process(index, &reaction) {
            Outcome::Ready(prepared) => (prepared.reactant_smiles, prepared.product_smiles),
            Outcome::Skipped(r) => panic!("unexpected skip: {r}"),
        };
        assert_eq!(smiles(4), smiles(4));
        // Structure is unaffected by the relabeling.
        let Outcome::Ready(shuffled) = p.process(4, &reaction) else {
            panic!("reaction should be accepted");
        };
        assert_eq!(shuffled.n_lg, 2);
        assert_eq!(shuffled.draft.finish(0).center_cnt, 1);
    }

    #[test]
    fn alignment_error_wraps_into_rejection() {
        let r = Rejection::from(AlignmentError::MissingMap { map_number: 1 });
        assert_eq!(r.reason(), SkipReason::Alignment);
    }
}
