use std::path::PathBuf;

use clap::{error::ErrorKind, CommandFactory, Parser};

/// disposetrack - instrument disposable types so leaked instances are reported at runtime
#[derive(Debug, Parser)]
#[command(
    name = "disposetrack",
    version,
    about,
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Code model files to instrument. Rewritten in place unless --output is given.
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write the instrumented model here instead (single input only).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Qualified name of the attribute that excludes a type from tracking.
    #[arg(long, value_name = "NAME")]
    pub opt_out_marker: Option<String>,

    /// Print weaving statistics for each file.
    #[arg(long)]
    pub stats: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Rejects argument combinations clap cannot express.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if self.output.is_some() && self.inputs.len() != 1 {
            return Err(Self::command().error(
                ErrorKind::ArgumentConflict,
                "--output accepts exactly one input",
            ));
        }
        Ok(())
    }

    /// `(input, output)` pairs in command-line order.
    pub fn jobs(&self) -> Vec<(PathBuf, PathBuf)> {
        match &self.output {
            Some(output) => self
                .inputs
                .iter()
                .map(|input| (input.clone(), output.clone()))
                .collect(),
            None => self
                .inputs
                .iter()
                .map(|input| (input.clone(), input.clone()))
                .collect(),
        }
    }
}
