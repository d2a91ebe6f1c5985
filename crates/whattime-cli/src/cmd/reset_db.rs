use anyhow::Context;
use std::io::{BufRead, Write};
use std::path::Path;
use whattime_core::RedbStore;

/// Delete the action database and create an empty one in its place.
///
/// Without `yes`, asks on stdin first; anything but `y`/`yes` cancels.
pub fn run(db_path: &Path, yes: bool) -> anyhow::Result<()> {
    if !db_path.exists() {
        println!("Database does not exist. Creating new database...");
        RedbStore::open(db_path)?;
        return Ok(());
    }

    if !yes {
        let prompt = format!(
            "WARNING: This will delete the database file at {}. Are you sure? [y/N]",
            db_path.display()
        );
        if !confirm(&prompt)? {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    std::fs::remove_file(db_path)
        .with_context(|| format!("failed to delete {}", db_path.display()))?;
    println!("Deleted database file at {}", db_path.display());
    tracing::warn!(path = %db_path.display(), "action database deleted");

    RedbStore::open(db_path)?;
    println!("Database has been reset.");
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
