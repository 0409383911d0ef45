use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// POI-Scout - self-improving place search with question-driven selection
#[derive(Parser, Debug)]
#[command(name = "poiscout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory (default: POISCOUT_DATA_ROOT or ~/.poiscout)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Storage backend: memory | json | sqlite (default: POISCOUT_STORE or sqlite)
    #[arg(long, global = true, value_name = "BACKEND")]
    pub store: Option<String>,

    /// Append JSONL audit events to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub audit_log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for places matching a request, then build its decision tree
    Search {
        /// Natural-language request, e.g. "rainy afternoon with a toddler in Hangzhou"
        #[arg(value_name = "REQUEST")]
        request: String,

        /// Enable online optimization (reflect and revise the plan between rounds)
        #[arg(long, default_value = "false")]
        online_opt: bool,

        /// Optimization rounds (default: from env or 5)
        #[arg(long, value_name = "N")]
        opt_iterations: Option<u32>,

        /// Guide the initial plan with skills learned from earlier searches
        #[arg(long, default_value = "false")]
        use_skill: bool,

        /// Distill a new skill from this search's optimization
        #[arg(long, default_value = "false")]
        create_skill: bool,

        /// Skip building the decision tree
        #[arg(long, default_value = "false")]
        no_tree: bool,

        /// Task id to store the tree under (default: random)
        #[arg(long, value_name = "ID")]
        task_id: Option<String>,

        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Inspect the skill library
    #[command(subcommand)]
    Skills(SkillsAction),

    /// Inspect stored decision trees
    #[command(subcommand)]
    Trees(TreesAction),

    /// Replay answers on a stored tree and show where they lead
    Select {
        /// Task id of the tree
        #[arg(value_name = "TASK_ID")]
        task_id: String,

        /// Comma-separated answers, e.g. "A,B,A" (also accepts 1/2)
        #[arg(long, value_delimiter = ',', value_name = "ANSWERS")]
        answers: Vec<String>,

        /// Drop the last answer before showing the result
        #[arg(long, default_value = "false")]
        back: bool,

        /// Stop after the answers and list every remaining candidate
        #[arg(long, default_value = "false")]
        stop: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SkillsAction {
    /// List skills, oldest first
    List {
        /// Show only a greedy max-min diverse subset of this size
        #[arg(long, value_name = "K")]
        diverse: Option<usize>,

        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TreesAction {
    /// List stored trees, newest first
    List {
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Print a stored tree
    Show {
        #[arg(value_name = "TASK_ID")]
        task_id: String,

        #[arg(long, default_value = "false")]
        json: bool,
    },
}
