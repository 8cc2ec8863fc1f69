/// Initialization family of a dialect.
///
/// The family decides which setup statements the admission hook runs on a
/// freshly created connection. Dialects that are neither sqlite- nor
/// mysql-flavored get the identity check only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectFamily {
    Sqlite,
    Mysql,
    Generic,
}

impl DialectFamily {
    pub fn of(dialect: &str) -> Self {
        match dialect {
            "sqlite3" | "better-sqlite3" => DialectFamily::Sqlite,
            "mysql" | "mysql2" => DialectFamily::Mysql,
            _ => DialectFamily::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialectFamily::Sqlite => "sqlite",
            DialectFamily::Mysql => "mysql",
            DialectFamily::Generic => "generic",
        }
    }
}
