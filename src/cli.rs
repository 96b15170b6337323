use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the evidence collector.
#[derive(Parser, Debug)]
#[clap(name = "evidence-collector", about = "Live-response evidence collection with chain-of-custody hashing")]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a collection
    Collect(CollectOpts),

    /// List the available modules
    ListModules,

    /// Hash a file
    Hash {
        /// File to hash
        file: PathBuf,

        /// Algorithms (comma-separated: md5,sha1,sha256)
        #[clap(short, long, default_value = "md5,sha256", value_delimiter = ',')]
        algorithms: Vec<String>,
    },

    /// Verify a file against an expected digest
    Verify {
        /// File to verify
        file: PathBuf,

        /// Expected hex digest
        digest: String,

        /// Algorithm of the digest
        #[clap(short, long, default_value = "sha256")]
        algorithm: String,
    },

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "config.yaml")]
        path: PathBuf,
    },
}

/// Options for the collect subcommand.
#[derive(clap::Args, Debug)]
pub struct CollectOpts {
    /// Modules to run, in order (comma-separated; default: all)
    #[clap(short, long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Output directory (default: from configuration)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Skip archive compression
    #[clap(long)]
    pub no_compress: bool,

    /// Skip report generation
    #[clap(long)]
    pub no_report: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_collect_args_parsing() {
        let args = Args::parse_from([
            "evidence-collector",
            "collect",
            "--modules", "live_system,network",
            "--output", "/tmp/output",
            "--no-compress",
            "-v",
        ]);

        assert!(args.verbose);
        match args.command {
            Commands::Collect(opts) => {
                assert_eq!(opts.modules, vec!["live_system", "network"]);
                assert_eq!(opts.output, Some(PathBuf::from("/tmp/output")));
                assert!(opts.no_compress);
                assert!(!opts.no_report);
                assert!(opts.config.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_collect_defaults() {
        let args = Args::parse_from(["evidence-collector", "collect"]);
        match args.command {
            Commands::Collect(opts) => assert!(opts.modules.is_empty()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_hash_subcommand() {
        let args = Args::parse_from(["evidence-collector", "hash", "/tmp/image.raw", "-a", "sha1,sha256"]);
        match args.command {
            Commands::Hash { file, algorithms } => {
                assert_eq!(file, PathBuf::from("/tmp/image.raw"));
                assert_eq!(algorithms, vec!["sha1", "sha256"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verify_subcommand() {
        let args = Args::parse_from(["evidence-collector", "verify", "/tmp/a.bin", "ABCDEF"]);
        match args.command {
            Commands::Verify { digest, algorithm, .. } => {
                assert_eq!(digest, "ABCDEF");
                assert_eq!(algorithm, "sha256");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_config_subcommand() {
        let args = Args::parse_from(["evidence-collector", "init-config"]);
        match args.command {
            Commands::InitConfig { path } => assert_eq!(path, PathBuf::from("config.yaml")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
