//! Command handlers. Each opens what it needs from the configured store and
//! prints to stdout; logs go to stderr.

mod search;
mod select;
mod skills;
mod trees;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use poiscout_core::capability::Embedder;
use poiscout_core::config::{LibraryConfig, PathsConfig, StoreBackend};
use poiscout_evolution::SkillLibrary;
use poiscout_store::{open_store, DocumentStore};
use poiscout_selector::TreeStore;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
    let paths = resolve_paths(&cli)?;
    match cli.command {
        Commands::Search {
            request,
            online_opt,
            opt_iterations,
            use_skill,
            create_skill,
            no_tree,
            task_id,
            json,
        } => {
            let args = search::SearchArgs {
                request,
                online_opt,
                opt_iterations,
                use_skill,
                create_skill,
                build_tree: !no_tree,
                task_id,
                json,
            };
            search::run(&paths, args).await
        }
        Commands::Skills(action) => skills::run(&paths, action),
        Commands::Trees(action) => trees::run(&paths, action),
        Commands::Select {
            task_id,
            answers,
            back,
            stop,
        } => select::run(&paths, &task_id, &answers, back, stop),
    }
}

fn resolve_paths(cli: &Cli) -> Result<PathsConfig> {
    let mut paths = PathsConfig::from_env();
    if let Some(root) = &cli.data_root {
        paths.data_root = root.clone();
    }
    if let Some(raw) = &cli.store {
        paths.store_backend = match StoreBackend::parse(raw) {
            Some(backend) => backend,
            None => bail!("Unknown store backend '{}' (expected memory, json or sqlite)", raw),
        };
    }
    Ok(paths)
}

pub(crate) fn open_documents(paths: &PathsConfig) -> Result<Arc<dyn DocumentStore>> {
    open_store(paths).with_context(|| format!("Failed to open store under {}", paths.data_root.display()))
}

pub(crate) fn open_trees(paths: &PathsConfig) -> Result<TreeStore> {
    Ok(TreeStore::new(open_documents(paths)?))
}

/// Library for read-only commands; nothing is embedded, so no API key is needed.
pub(crate) fn open_library_offline(paths: &PathsConfig) -> Result<SkillLibrary> {
    let store = open_documents(paths)?;
    SkillLibrary::open(Arc::new(OfflineEmbedder), store, LibraryConfig::from_env())
        .context("Failed to load skill library")
}

struct OfflineEmbedder;

#[async_trait]
impl Embedder for OfflineEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("embedding is not available in read-only commands")
    }
}
