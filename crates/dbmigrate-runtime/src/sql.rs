//! SQL statement handling for migration bodies.

/// Split a migration body into individual statements on semicolons,
/// skipping separators inside single-quoted strings, line comments, and
/// dollar-quoted blocks (so PL/pgSQL function bodies stay intact).
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    let mut mode = Mode::Normal;

    while i < chars.len() {
        let c = chars[i];
        match &mode {
            Mode::Normal => match c {
                '\'' => {
                    mode = Mode::SingleQuote;
                    current.push(c);
                    i += 1;
                }
                '-' if chars.get(i + 1) == Some(&'-') => {
                    mode = Mode::LineComment;
                    current.push_str("--");
                    i += 2;
                }
                '$' => {
                    if let Some(tag) = read_dollar_tag(&chars[i..]) {
                        i += tag.len();
                        current.extend(tag.iter());
                        mode = Mode::DollarQuote(tag);
                    } else {
                        current.push(c);
                        i += 1;
                    }
                }
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                    i += 1;
                }
                _ => {
                    current.push(c);
                    i += 1;
                }
            },
            Mode::SingleQuote => {
                current.push(c);
                i += 1;
                if c == '\'' {
                    // '' is an escaped quote, not a terminator.
                    if chars.get(i) == Some(&'\'') {
                        current.push('\'');
                        i += 1;
                    } else {
                        mode = Mode::Normal;
                    }
                }
            }
            Mode::LineComment => {
                current.push(c);
                i += 1;
                if c == '\n' {
                    mode = Mode::Normal;
                }
            }
            Mode::DollarQuote(tag) => {
                if chars[i..].starts_with(tag.as_slice()) {
                    i += tag.len();
                    current.extend(tag.iter());
                    mode = Mode::Normal;
                } else {
                    current.push(c);
                    i += 1;
                }
            }
        }
    }

    push_statement(&mut statements, &current);
    statements
}

enum Mode {
    Normal,
    SingleQuote,
    LineComment,
    DollarQuote(Vec<char>),
}

/// A dollar-quote delimiter at the start of `chars`: `$$` or `$tag$`.
fn read_dollar_tag(chars: &[char]) -> Option<Vec<char>> {
    debug_assert_eq!(chars.first(), Some(&'$'));
    let mut j = 1;
    while let Some(&c) = chars.get(j) {
        if c == '$' {
            return Some(chars[..=j].to_vec());
        }
        if !c.is_alphanumeric() && c != '_' {
            return None;
        }
        j += 1;
    }
    None
}

/// Keep a statement unless it is empty or made of comment lines only.
fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let stmt = raw.trim();
    if stmt.is_empty() {
        return;
    }
    let all_comments = stmt.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with("--")
    });
    if !all_comments {
        statements.push(stmt.to_string());
    }
}

/// Whether a statement refuses to run inside a transaction block.
///
/// Such a step runs on a plain connection with the tracking-table write
/// immediately after, narrowing the step's atomicity guarantee.
pub fn requires_autocommit(statement: &str) -> bool {
    let norm = statement
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    norm.starts_with("VACUUM")
        || norm.starts_with("CREATE DATABASE")
        || norm.starts_with("DROP DATABASE")
        || norm.starts_with("CREATE TABLESPACE")
        || norm.starts_with("DROP TABLESPACE")
        || (norm.contains(" CONCURRENTLY")
            && (norm.starts_with("CREATE INDEX")
                || norm.starts_with("CREATE UNIQUE INDEX")
                || norm.starts_with("DROP INDEX")
                || norm.starts_with("REINDEX")))
        || (norm.starts_with("ALTER TYPE") && norm.contains(" ADD VALUE"))
}
