use std::collections::HashMap;

use super::file::MigrationFile;

/// Structural problems in the migration file set. Always fatal for the
/// run; never auto-repaired.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate migration identity {0}")]
    DuplicateIdentity(String),

    #[error("no root migration: every file declares a parent")]
    NoRoot,

    #[error("multiple root migrations: {0} and {1} both have no parent")]
    MultipleRoots(String, String),

    #[error("branching chain: {child_a} and {child_b} both declare parent {parent}")]
    Branching {
        parent: String,
        child_a: String,
        child_b: String,
    },

    #[error("migration {child} declares unknown parent {parent}")]
    DanglingParent { parent: String, child: String },

    #[error("cycle in migration chain at {0}")]
    Cycle(String),
}

/// Resolver for the migration dependency chain.
///
/// Migrations form a directed graph keyed by identity, with edges drawn
/// from each file's declared parent. A valid set resolves to a single
/// linear path from the root (no parent) to the tip. Anything else is a
/// structural error, not something to sort around: identities are not
/// required to be lexically ordered, so the chain is authoritative.
pub struct MigrationGraph;

impl MigrationGraph {
    /// Resolve a file set into root-to-tip order.
    ///
    /// The returned order defines both upgrade order (front to back) and
    /// downgrade order (back to front). Pure function; touches no
    /// database.
    pub fn resolve(files: Vec<MigrationFile>) -> Result<Vec<MigrationFile>, GraphError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_identity: HashMap<String, MigrationFile> = HashMap::with_capacity(files.len());
        let mut root: Option<String> = None;
        // parent identity -> child identity
        let mut children: HashMap<String, String> = HashMap::new();

        for file in files {
            if by_identity.contains_key(&file.identity) {
                return Err(GraphError::DuplicateIdentity(file.identity));
            }

            match &file.parent_identity {
                None => match &root {
                    None => root = Some(file.identity.clone()),
                    Some(existing) => {
                        return Err(GraphError::MultipleRoots(
                            existing.clone(),
                            file.identity.clone(),
                        ))
                    }
                },
                Some(parent) => {
                    if let Some(sibling) = children.get(parent) {
                        return Err(GraphError::Branching {
                            parent: parent.clone(),
                            child_a: sibling.clone(),
                            child_b: file.identity.clone(),
                        });
                    }
                    children.insert(parent.clone(), file.identity.clone());
                }
            }

            by_identity.insert(file.identity.clone(), file);
        }

        // Every declared parent must exist in the set.
        for (parent, child) in &children {
            if !by_identity.contains_key(parent) {
                return Err(GraphError::DanglingParent {
                    parent: parent.clone(),
                    child: child.clone(),
                });
            }
        }

        let root = root.ok_or(GraphError::NoRoot)?;

        // Walk child links from the root. A revisit or an overlong walk
        // means the parent links loop back on themselves.
        let total = by_identity.len();
        let mut chain = Vec::with_capacity(total);
        let mut current = root;
        loop {
            let file = by_identity
                .remove(&current)
                .ok_or_else(|| GraphError::Cycle(current.clone()))?;
            let next = children.get(&file.identity).cloned();
            chain.push(file);
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        // Nodes left over after the walk are unreachable from the root,
        // which can only happen if their parent links form a cycle.
        if chain.len() != total {
            let orphan = by_identity.keys().next().cloned().unwrap_or_default();
            return Err(GraphError::Cycle(orphan));
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn mig(identity: &str, parent: Option<&str>) -> MigrationFile {
        MigrationFile {
            identity: identity.to_string(),
            parent_identity: parent.map(String::from),
            description: format!("m{identity}"),
            upgrade_sql: String::new(),
            downgrade_sql: String::new(),
            path: PathBuf::from(format!("{identity}_m.sql")),
        }
    }

    fn identities(chain: &[MigrationFile]) -> Vec<&str> {
        chain.iter().map(|m| m.identity.as_str()).collect()
    }

    #[test]
    fn test_empty_set_resolves_empty() {
        assert!(MigrationGraph::resolve(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_single_root() {
        let chain = MigrationGraph::resolve(vec![mig("1", None)]).unwrap();
        assert_eq!(identities(&chain), ["1"]);
    }

    #[test]
    fn test_linear_chain_out_of_input_order() {
        let chain =
            MigrationGraph::resolve(vec![mig("3", Some("2")), mig("1", None), mig("2", Some("1"))])
                .unwrap();
        assert_eq!(identities(&chain), ["1", "2", "3"]);
    }

    #[test]
    fn test_chain_order_ignores_lexical_order() {
        // Identities deliberately sort the wrong way lexically.
        let chain =
            MigrationGraph::resolve(vec![mig("9", None), mig("10", Some("9")), mig("2", Some("10"))])
                .unwrap();
        assert_eq!(identities(&chain), ["9", "10", "2"]);
    }

    #[test]
    fn test_duplicate_identity() {
        let err = MigrationGraph::resolve(vec![mig("1", None), mig("1", None)]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateIdentity(id) if id == "1"));
    }

    #[test]
    fn test_no_root() {
        let err =
            MigrationGraph::resolve(vec![mig("1", Some("2")), mig("2", Some("1"))]).unwrap_err();
        assert!(matches!(err, GraphError::NoRoot));
    }

    #[test]
    fn test_multiple_roots() {
        let err = MigrationGraph::resolve(vec![mig("1", None), mig("2", None)]).unwrap_err();
        assert!(matches!(err, GraphError::MultipleRoots(_, _)));
    }

    #[test]
    fn test_branching() {
        let err = MigrationGraph::resolve(vec![
            mig("1", None),
            mig("2", Some("1")),
            mig("3", Some("1")),
        ])
        .unwrap_err();
        match err {
            GraphError::Branching { parent, .. } => assert_eq!(parent, "1"),
            other => panic!("expected Branching, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_parent() {
        let err = MigrationGraph::resolve(vec![mig("1", None), mig("2", Some("99"))]).unwrap_err();
        match err {
            GraphError::DanglingParent { parent, child } => {
                assert_eq!(parent, "99");
                assert_eq!(child, "2");
            }
            other => panic!("expected DanglingParent, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_detached_from_root() {
        // 1 is a valid root; 2 and 3 reference each other.
        let err = MigrationGraph::resolve(vec![
            mig("1", None),
            mig("2", Some("3")),
            mig("3", Some("2")),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }
}
