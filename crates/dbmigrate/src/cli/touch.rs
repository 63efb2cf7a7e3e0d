use anyhow::Result;
use console::style;

use dbmigrate_core::MigrationDirectory;

pub fn execute(directory: &MigrationDirectory, name: &[String]) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!(
            "please pass a short name for the migration file, \
             either underscore or space separated words, \
             e.g. `dbmigrate touch create users`"
        );
    }

    let description = name.join("_");
    let path = directory.create_blank(&description)?;
    println!(
        "  {} Created {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_name_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let directory = MigrationDirectory::new(tmp.path());
        assert!(execute(&directory, &[]).is_err());
    }

    #[test]
    fn test_name_words_joined_by_underscore() {
        let tmp = TempDir::new().unwrap();
        let directory = MigrationDirectory::new(tmp.path());
        execute(&directory, &["add".into(), "users".into(), "table".into()]).unwrap();

        let files = directory.load().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].description, "add_users_table");
    }
}
