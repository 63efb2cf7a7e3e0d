mod directory;
mod file;
mod graph;

pub use directory::{DirectoryError, MigrationDirectory};
pub use file::{FileError, MigrationFile};
pub use graph::{GraphError, MigrationGraph};
