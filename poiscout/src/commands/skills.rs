use anyhow::Result;
use poiscout_core::config::PathsConfig;
use poiscout_core::Skill;
use serde_json::json;

use crate::cli::SkillsAction;

pub fn run(paths: &PathsConfig, action: SkillsAction) -> Result<()> {
    match action {
        SkillsAction::List { diverse, json } => {
            let library = super::open_library_offline(paths)?;
            let skills = match diverse {
                Some(k) => library.diverse(k)?,
                None => library.all()?,
            };
            if json {
                let rows: Vec<_> = skills.iter().map(skill_json).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if skills.is_empty() {
                println!("No skills yet. Run `poiscout search --online-opt --create-skill ...` to distill some.");
                return Ok(());
            }
            println!("{} of {} skill(s):", skills.len(), library.len());
            for skill in &skills {
                println!(
                    "  [{}] {} (from {}, {})",
                    skill.id,
                    skill.text,
                    skill.source_task_id,
                    skill.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
    }
}

fn skill_json(skill: &Skill) -> serde_json::Value {
    json!({
        "id": skill.id,
        "text": skill.text,
        "source_task_id": skill.source_task_id,
        "created_at": skill.created_at.to_rfc3339(),
        "dimension": skill.embedding.len(),
    })
}
