use anyhow::{anyhow, bail, Result};
use poiscout_core::config::PathsConfig;
use poiscout_core::Poi;
use poiscout_selector::{Advance, Answer};

pub fn run(paths: &PathsConfig, task_id: &str, raw_answers: &[String], back: bool, stop: bool) -> Result<()> {
    let trees = super::open_trees(paths)?;
    let Some(tree) = trees.load(task_id)? else {
        bail!("No decision tree stored for task '{}'", task_id);
    };
    let answers = raw_answers
        .iter()
        .filter(|a| !a.trim().is_empty())
        .map(|a| Answer::parse(a).ok_or_else(|| anyhow!("Invalid answer '{}' (use A or B)", a)))
        .collect::<Result<Vec<_>>>()?;

    let mut outcome = tree.resume(&answers)?;
    if back {
        let session = tree.back(outcome.session().clone())?;
        outcome = tree.resume(&session.answers())?;
    }

    for record in outcome.session().history() {
        println!("{} -> {}", record.question, record.chosen_option);
    }
    match outcome {
        Advance::Final { pois, .. } => {
            println!("Selected:");
            print_pois(&pois);
        }
        Advance::Continue(session) => {
            if stop {
                println!("Remaining candidates:");
                print_pois(&tree.current_pois(&session)?);
            } else if let Some((question, option_a, option_b)) = tree.current_question(&session) {
                println!("Next question: {}", question);
                println!("  A: {}", option_a);
                println!("  B: {}", option_b);
                println!("{} candidate(s) remain.", tree.current_pois(&session)?.len());
            }
        }
    }
    Ok(())
}

fn print_pois(pois: &[Poi]) {
    if pois.is_empty() {
        println!("  (no places match)");
    }
    for poi in pois {
        println!("  - {}", poi.describe());
    }
}
