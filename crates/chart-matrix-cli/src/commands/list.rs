//! List command - print the generated matrix

use clap::{Args, ValueEnum};

use chart_matrix::matrix;

use super::MatrixArgs;
use crate::Result;

/// Print the matrix without deploying anything
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub matrix: MatrixArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub output: OutputFormat,
}

/// Output format
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Columnar table (default)
    #[default]
    Table,
    /// JSON
    Json,
}

impl From<OutputFormat> for matrix::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => matrix::OutputFormat::Table,
            OutputFormat::Json => matrix::OutputFormat::Json,
        }
    }
}

/// Render the matrix selected by `args`
pub fn render(args: &ListArgs) -> Result<String> {
    let entries = args.matrix.entries()?;
    Ok(matrix::render(&entries, args.output.into())?)
}

/// Run the list command
pub fn run(args: ListArgs) -> Result<()> {
    println!("{}", render(&args)?);
    Ok(())
}
