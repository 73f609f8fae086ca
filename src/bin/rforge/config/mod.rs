use anyhow::{Context, Result};

use retro_forge::prep::{DatasetType, PrepConfig};

use crate::cli::{DatasetKind, DatasetOptions, LimitOptions, PrepareArgs, RunOptions};

impl From<DatasetKind> for DatasetType {
    fn from(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Uspto50k => DatasetType::Uspto50k,
            DatasetKind::UsptoFull => DatasetType::UsptoFull,
            DatasetKind::Mit => DatasetType::Mit,
        }
    }
}

/// Starts from `--config` (or the defaults) and applies every flag given on
/// the command line.
pub fn build_prep_config(args: &PrepareArgs) -> Result<PrepConfig> {
    let mut config = match &args.config {
        Some(path) => PrepConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => PrepConfig::default(),
    };

    apply_dataset(&mut config, &args.dataset);
    apply_limits(&mut config, &args.limits);
    apply_run(&mut config, &args.run);

    config.validate().context("Invalid preparation settings")?;
    Ok(config)
}

fn apply_dataset(config: &mut PrepConfig, opts: &DatasetOptions) {
    if let Some(kind) = opts.dataset_type {
        config.dataset_type = kind.into();
    }
    config.known_regents |= opts.known_regents;
    config.use_3d_info |= opts.use_3d;
}

fn apply_limits(config: &mut PrepConfig, opts: &LimitOptions) {
    let overrides = [
        (&mut config.max_node, opts.max_node),
        (&mut config.min_node, opts.min_node),
        (&mut config.max_lg_na, opts.max_lg_na),
        (&mut config.max_gate_num_size, opts.max_gate_num_size),
        (&mut config.max_regents_na, opts.max_regents_na),
        (&mut config.center_cutoff, opts.center_cutoff),
    ];
    for (field, value) in overrides {
        if let Some(v) = value {
            *field = v;
        }
    }
}

fn apply_run(config: &mut PrepConfig, opts: &RunOptions) {
    if let Some(workers) = opts.workers {
        config.workers = workers;
    }
    if let Some(every) = opts.checkpoint_every {
        config.checkpoint_every = every;
    }
    if let Some(seed) = opts.seed {
        config.seed = seed;
    }
    if opts.no_save_cache {
        config.save_cache = false;
    }
    if opts.no_fast_read {
        config.fast_read = false;
    }
}
