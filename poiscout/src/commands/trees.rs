use anyhow::{bail, Result};
use poiscout_core::config::PathsConfig;
use poiscout_selector::{DecisionTree, Node, NodeId};

use crate::cli::TreesAction;

pub fn run(paths: &PathsConfig, action: TreesAction) -> Result<()> {
    let trees = super::open_trees(paths)?;
    match action {
        TreesAction::List { json } => {
            let summaries = trees.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No decision trees stored.");
            } else {
                for s in &summaries {
                    println!(
                        "{}  {}  {} place(s)  {}",
                        s.task_id,
                        s.created_at.format("%Y-%m-%d %H:%M"),
                        s.poi_count,
                        s.request
                    );
                }
            }
        }
        TreesAction::Show { task_id, json } => {
            let Some(tree) = trees.load(&task_id)? else {
                bail!("No decision tree stored for task '{}'", task_id);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                println!("Task {}: {}", tree.task_id, tree.request);
                println!(
                    "{} place(s), {} node(s), depth {}",
                    tree.pool.len(),
                    tree.nodes.len(),
                    tree.depth()
                );
                print_node(&tree, tree.root, "", "");
            }
        }
    }
    Ok(())
}

/// Indented outline of the subtree under `id`.
fn print_node(tree: &DecisionTree, id: NodeId, indent: &str, label: &str) {
    let Some(node) = tree.node(id) else {
        return;
    };
    match node {
        Node::Decision {
            question,
            option_a,
            option_b,
            branch_a,
            branch_b,
            ..
        } => {
            println!("{}{}? {}", indent, label, question);
            let child_indent = format!("{}    ", indent);
            print_node(tree, *branch_a, &child_indent, &format!("A ({}) -> ", option_a));
            print_node(tree, *branch_b, &child_indent, &format!("B ({}) -> ", option_b));
        }
        Node::Leaf { subset, .. } => {
            let names: Vec<String> = tree.subset_pois(*subset).into_iter().map(|p| p.name).collect();
            if names.is_empty() {
                println!("{}{}(no places)", indent, label);
            } else {
                println!("{}{}{}", indent, label, names.join(", "));
            }
        }
    }
}
