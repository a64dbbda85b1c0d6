use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "gdtf-extract")]
#[command(version)]
#[command(about = "Print the fixture attributes of a GDTF file", long_about = None)]
#[command(after_help = "Examples:\n  \
  gdtf-extract Acme@Spot_700.gdtf            print name=value pairs in document order\n  \
  gdtf-extract --sorted fixture.gdtf         print pairs sorted by name\n  \
  RUST_LOG=debug gdtf-extract fixture.gdtf   show archive details while extracting")]
pub struct Cli {
    /// GDTF file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Sort attributes by name instead of document order
    #[arg(long)]
    pub sorted: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode, only print attributes
    #[arg(short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
