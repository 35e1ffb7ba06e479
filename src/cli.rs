use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repomend::config::{FallbackPolicy, MissingTipPolicy, RepairConfig};

#[derive(Parser, Debug)]
#[command(name = "repomend", version, about = "Repair git repositories with null or missing object references")]
pub struct Cli {
    /// Path to the git repository
    #[arg(long, short = 'C', default_value = ".", global = true)]
    pub repo: PathBuf,

    /// Log every object decision
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log the elapsed time of every phase (disables progress bars)
    #[arg(long, global = true)]
    pub profile: bool,

    /// Repair policy file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Where broken references are pointed
    #[arg(long, value_enum, global = true)]
    pub fallback: Option<FallbackPolicy>,

    /// What to do with references whose commit cannot be read
    #[arg(long, value_enum, global = true)]
    pub missing_tip: Option<MissingTipPolicy>,

    /// Delete references that cannot be repointed
    #[arg(long, global = true)]
    pub delete_unrepairable: bool,

    /// Only check root trees, not every subtree
    #[arg(long, global = true)]
    pub shallow: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan and list issues (exit code 1 when any exist)
    Diagnose {
        /// Print the scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace bad objects, rewrite history and repoint references
    Fix {
        /// Show what would change without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the backup confirmation
        #[arg(long, short)]
        yes: bool,
        /// Print the repair report as JSON
        #[arg(long)]
        json: bool,
        /// Do not record this run in the journal
        #[arg(long)]
        no_journal: bool,
    },
    /// Succeed only when the repository has no issues
    Verify,
    /// List recent runs from the journal
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    /// Command-line flags win over the config file
    pub fn apply_overrides(&self, config: &mut RepairConfig) {
        if let Some(fallback) = self.fallback {
            config.fallback = fallback;
        }
        if let Some(missing_tip) = self.missing_tip {
            config.missing_tip = missing_tip;
        }
        if self.delete_unrepairable {
            config.delete_unrepairable_refs = true;
        }
        if self.shallow {
            config.deep_tree_scan = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_flags_parse() {
        let cli = Cli::try_parse_from(["repomend", "-C", "/tmp/repo", "fix", "--dry-run", "-y"]).unwrap();
        assert_eq!(cli.repo, PathBuf::from("/tmp/repo"));
        match cli.command {
            Command::Fix { dry_run, yes, json, no_journal } => {
                assert!(dry_run && yes);
                assert!(!json && !no_journal);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_overrides_win_over_config() {
        let cli = Cli::try_parse_from([
            "repomend",
            "verify",
            "--fallback",
            "preferred-branches",
            "--missing-tip",
            "fallback",
            "--shallow",
            "--delete-unrepairable",
        ])
        .unwrap();
        let mut config = RepairConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.fallback, FallbackPolicy::PreferredBranches);
        assert_eq!(config.missing_tip, MissingTipPolicy::Fallback);
        assert!(!config.deep_tree_scan);
        assert!(config.delete_unrepairable_refs);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::try_parse_from(["repomend", "history"]).unwrap();
        let mut config = RepairConfig {
            fallback: FallbackPolicy::None,
            ..RepairConfig::default()
        };
        cli.apply_overrides(&mut config);
        assert_eq!(config.fallback, FallbackPolicy::None);
        assert!(config.deep_tree_scan);
        assert!(matches!(cli.command, Command::History { limit: 10 }));
    }
}
