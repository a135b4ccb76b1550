use std::path::{Path, PathBuf};

use anyhow::Context;
use disposetrack::{CodeModel, WeaveStats, Weaver, WeaverConfig};

use crate::app::Cli;

pub struct WeaveOptions<'a> {
    pub opt_out_marker: Option<&'a str>,
    pub show_stats: bool,
}

impl<'a> From<&'a Cli> for WeaveOptions<'a> {
    fn from(cli: &'a Cli) -> Self {
        Self {
            opt_out_marker: cli.opt_out_marker.as_deref(),
            show_stats: cli.stats,
        }
    }
}

/// Instruments every `(input, output)` pair, stopping at the first failure.
pub fn run(jobs: &[(PathBuf, PathBuf)], opts: &WeaveOptions) -> anyhow::Result<()> {
    for (input, output) in jobs {
        println!("Processing {} -> {}", input.display(), output.display());
        let stats = weave_file(input, output, opts)?;
        if opts.show_stats {
            eprintln!("  {stats}");
        }
    }
    Ok(())
}

fn weave_file(input: &Path, output: &Path, opts: &WeaveOptions) -> anyhow::Result<WeaveStats> {
    let mut model = CodeModel::from_path(input)
        .with_context(|| format!("failed to load model: {}", input.display()))?;

    let mut config = WeaverConfig::default();
    if let Some(marker) = opts.opt_out_marker {
        config = config.with_opt_out_marker(marker);
    }

    let stats = Weaver::new(config)
        .execute(&mut model)
        .with_context(|| format!("instrumentation failed: {}", input.display()))?;

    model
        .write_to_path(output)
        .with_context(|| format!("failed to write output: {}", output.display()))?;
    Ok(stats)
}
