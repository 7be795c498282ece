use std::path::PathBuf;

use clap::Parser;

/// cilshred - replace every method body of a .NET assembly with `nop; ret`
#[derive(Debug, Parser)]
#[command(name = "cilshred", version, about, long_about = None)]
pub struct Cli {
    /// Path to the .NET assembly file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to write the shredded assembly. Defaults to rewriting INPUT in place.
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Keep exception handlers, locals and stack depth of shredded bodies.
    #[arg(long = "keep-aux-tables")]
    pub keep_aux_tables: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_arguments() {
        let cli = Cli::parse_from(["cilshred", "Library.dll"]);
        assert_eq!(cli.input, PathBuf::from("Library.dll"));
        assert!(cli.output.is_none());
        assert!(!cli.verbose);
        assert!(!cli.keep_aux_tables);

        let cli = Cli::parse_from(["cilshred", "-v", "--keep-aux-tables", "in.dll", "out.dll"]);
        assert_eq!(cli.output, Some(PathBuf::from("out.dll")));
        assert!(cli.verbose);
        assert!(cli.keep_aux_tables);
    }
}
