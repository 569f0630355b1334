use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "phototile",
    author,
    version,
    about = "Photo collage wallpaper daemon with GPU transitions"
)]
pub struct Args {
    /// Configuration file; defaults to `phototile.toml` in the user config
    /// directory.
    #[arg(long, value_name = "PATH", env = "PHOTOTILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional photo source directories, appended to the configured ones.
    #[arg(long = "source", value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// Override the surface resolution (e.g. `1920x1080`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Seed for the transition and photo-selection randomness.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources_and_size() {
        let args = Args::parse_from([
            "phototile",
            "--source",
            "/photos/a",
            "--source",
            "/photos/b",
            "--size",
            "1280x720",
        ]);
        assert_eq!(args.sources.len(), 2);
        assert_eq!(args.size.as_deref(), Some("1280x720"));
        assert!(args.config.is_none());
    }
}
