//! Statement rendering.
//!
//! Every statement the provider sends is built here, so quoting rules live in
//! one place: identifiers are double-quoted, string values single-quoted,
//! with embedded quotes doubled.

use std::fmt::{self, Write as _};

/// Quote an identifier: `my "db"` becomes `"my ""db"""`.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal: `it's` becomes `'it''s'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Dot-join quoted identifiers: `"db"."ns"."rel"`.
pub fn qualified_name(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join(".")
}

/// A typed value in a `WITH (...)` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Rendered as a string literal.
    Literal(String),
    /// Rendered as a quoted identifier (references another object).
    Ident(String),
    /// Rendered bare (`KAFKA`, `PLAIN`).
    Keyword(String),
    /// Rendered as a number.
    Int(i64),
    /// Rendered as `TRUE` / `FALSE`.
    Bool(bool),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Literal(s) => f.write_str(&quote_literal(s)),
            Param::Ident(s) => f.write_str(&quote_ident(s)),
            Param::Keyword(s) => f.write_str(s),
            Param::Int(n) => write!(f, "{}", n),
            Param::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// An ordered `WITH ( 'key' = value, ... )` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithClause {
    params: Vec<(String, Param)>,
}

impl WithClause {
    /// An empty clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value for the same key.
    pub fn set(&mut self, key: impl Into<String>, value: Param) -> &mut Self {
        let key = key.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Set a string literal parameter if present.
    pub fn literal(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, Param::Literal(v.to_string()));
        }
        self
    }

    /// Set a keyword parameter if present.
    pub fn keyword(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, Param::Keyword(v.to_string()));
        }
        self
    }

    /// Set an identifier parameter if present.
    pub fn ident(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, Param::Ident(v.to_string()));
        }
        self
    }

    /// Set an integer parameter if present.
    pub fn int(&mut self, key: &str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, Param::Int(v));
        }
        self
    }

    /// Set a boolean parameter if present.
    pub fn flag(&mut self, key: &str, value: Option<bool>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, Param::Bool(v));
        }
        self
    }

    /// Whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Value set for a key.
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for WithClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("WITH ( ")?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", quote_literal(key), value)?;
        }
        f.write_str(" )")
    }
}

fn with_suffix(stmt: &mut String, with: &WithClause) {
    if !with.is_empty() {
        let _ = write!(stmt, " {}", with);
    }
    stmt.push(';');
}

// Databases

/// `CREATE DATABASE "name";`
pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE {};", quote_ident(name))
}

/// `DROP DATABASE "name";`
pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE {};", quote_ident(name))
}

/// `LIST DATABASES;`
pub fn list_databases() -> String {
    "LIST DATABASES;".to_string()
}

// Namespaces

/// `CREATE SCHEMA "ns" IN DATABASE "db";`
pub fn create_namespace(database: &str, namespace: &str) -> String {
    format!(
        "CREATE SCHEMA {} IN DATABASE {};",
        quote_ident(namespace),
        quote_ident(database)
    )
}

/// `DROP SCHEMA "db"."ns";`
pub fn drop_namespace(database: &str, namespace: &str) -> String {
    format!("DROP SCHEMA {};", qualified_name(&[database, namespace]))
}

/// `LIST SCHEMAS IN DATABASE "db";`
pub fn list_namespaces(database: &str) -> String {
    format!("LIST SCHEMAS IN DATABASE {};", quote_ident(database))
}

// Stores

/// `CREATE STORE "name" WITH ( ... );`
pub fn create_store(name: &str, with: &WithClause) -> String {
    let mut stmt = format!("CREATE STORE {}", quote_ident(name));
    with_suffix(&mut stmt, with);
    stmt
}

/// `UPDATE STORE "name" WITH ( ... );`
pub fn update_store(name: &str, with: &WithClause) -> String {
    let mut stmt = format!("UPDATE STORE {}", quote_ident(name));
    with_suffix(&mut stmt, with);
    stmt
}

/// `DESCRIBE STORE "name";`
pub fn describe_store(name: &str) -> String {
    format!("DESCRIBE STORE {};", quote_ident(name))
}

/// `DROP STORE "name";`
pub fn drop_store(name: &str) -> String {
    format!("DROP STORE {};", quote_ident(name))
}

/// `LIST STORES;`
pub fn list_stores() -> String {
    "LIST STORES;".to_string()
}

// Schema registries

/// `CREATE SCHEMA_REGISTRY "name" WITH ( ... );`
pub fn create_schema_registry(name: &str, with: &WithClause) -> String {
    let mut stmt = format!("CREATE SCHEMA_REGISTRY {}", quote_ident(name));
    with_suffix(&mut stmt, with);
    stmt
}

/// `UPDATE SCHEMA_REGISTRY "name" WITH ( ... );`
pub fn update_schema_registry(name: &str, with: &WithClause) -> String {
    let mut stmt = format!("UPDATE SCHEMA_REGISTRY {}", quote_ident(name));
    with_suffix(&mut stmt, with);
    stmt
}

/// `DESCRIBE SCHEMA_REGISTRY "name";`
pub fn describe_schema_registry(name: &str) -> String {
    format!("DESCRIBE SCHEMA_REGISTRY {};", quote_ident(name))
}

/// `DROP SCHEMA_REGISTRY "name";`
pub fn drop_schema_registry(name: &str) -> String {
    format!("DROP SCHEMA_REGISTRY {};", quote_ident(name))
}

/// `LIST SCHEMA_REGISTRIES;`
pub fn list_schema_registries() -> String {
    "LIST SCHEMA_REGISTRIES;".to_string()
}

// Relations

/// `DESCRIBE RELATION "db"."ns"."name";`
pub fn describe_relation(database: &str, namespace: &str, name: &str) -> String {
    format!(
        "DESCRIBE RELATION {};",
        qualified_name(&[database, namespace, name])
    )
}

/// `DROP RELATION "db"."ns"."name";`
pub fn drop_relation(database: &str, namespace: &str, name: &str) -> String {
    format!(
        "DROP RELATION {};",
        qualified_name(&[database, namespace, name])
    )
}

/// `LIST RELATIONS IN SCHEMA "db"."ns";`
pub fn list_relations(database: &str, namespace: &str) -> String {
    format!(
        "LIST RELATIONS IN SCHEMA {};",
        qualified_name(&[database, namespace])
    )
}

// Entities

/// `CREATE ENTITY "name" IN STORE "store" WITH ( ... );`
pub fn create_entity(store: &str, name: &str, with: &WithClause) -> String {
    let mut stmt = format!(
        "CREATE ENTITY {} IN STORE {}",
        quote_ident(name),
        quote_ident(store)
    );
    with_suffix(&mut stmt, with);
    stmt
}

/// `DROP ENTITY "name" IN STORE "store";`
pub fn drop_entity(store: &str, name: &str) -> String {
    format!(
        "DROP ENTITY {} IN STORE {};",
        quote_ident(name),
        quote_ident(store)
    )
}

/// `LIST ENTITIES IN STORE "store";`
pub fn list_entities(store: &str) -> String {
    format!("LIST ENTITIES IN STORE {};", quote_ident(store))
}

// Regions

/// `LIST REGIONS;`
pub fn list_regions() -> String {
    "LIST REGIONS;".to_string()
}

/// Relation kinds a DDL statement can create.
pub const RELATION_KINDS: [&str; 3] = ["STREAM", "CHANGELOG", "TABLE"];

/// Replace the `WITH ( ... )` parameters of a statement so it can be logged.
///
/// Store and registry parameters carry credentials. Everything from the
/// first top-level `WITH (` onward is dropped. Statements without one are
/// returned unchanged.
pub fn redact(statement: &str) -> String {
    let mut quote: Option<char> = None;
    let mut prev = ' ';
    for (i, c) in statement.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if prev.is_whitespace() && opens_with_clause(&statement[i..]) => {
                return format!("{} WITH ( <redacted> );", statement[..i].trim_end());
            }
            None => {}
        }
        prev = c;
    }
    statement.to_string()
}

fn opens_with_clause(rest: &str) -> bool {
    rest.get(..4).is_some_and(|w| w.eq_ignore_ascii_case("WITH"))
        && rest[4..].trim_start().starts_with('(')
}

/// The object a `CREATE STREAM|CHANGELOG|TABLE` statement creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDdl {
    /// `STREAM`, `CHANGELOG` or `TABLE`.
    pub kind: String,
    /// Leading name parts: empty, `[namespace]` or `[database, namespace]`.
    pub qualifier: Vec<String>,
    /// The relation name.
    pub name: String,
}

impl RelationDdl {
    /// Whether the statement's qualifier, if any, names `database` and `namespace`.
    ///
    /// Bare parts are lowercased when parsed, so parts compare ignoring ASCII case.
    pub fn targets(&self, database: &str, namespace: &str) -> bool {
        let same = |a: &String, b: &str| a.eq_ignore_ascii_case(b);
        match self.qualifier.as_slice() {
            [] => true,
            [ns] => same(ns, namespace),
            [db, ns] => same(db, database) && same(ns, namespace),
            _ => false,
        }
    }
}

/// Parse a `CREATE` DDL statement for a relation.
///
/// Accepts `CREATE [OR REPLACE] STREAM|CHANGELOG|TABLE <name>` where `<name>`
/// is bare or double-quoted and may be qualified. Keywords are
/// case-insensitive, bare names are lowercased.
pub fn parse_relation_ddl(ddl: &str) -> Option<RelationDdl> {
    let mut rest = ddl.trim_start();
    let mut word = || -> Option<String> {
        rest = rest.trim_start();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        let (w, tail) = rest.split_at(end);
        rest = tail;
        Some(w.to_ascii_uppercase())
    };

    if word()? != "CREATE" {
        return None;
    }
    let mut kind = word()?;
    if kind == "OR" {
        if word()? != "REPLACE" {
            return None;
        }
        kind = word()?;
    }
    if !RELATION_KINDS.contains(&kind.as_str()) {
        return None;
    }

    let mut qualifier = parse_object_name(rest.trim_start())?;
    let name = qualifier.pop()?;
    Some(RelationDdl {
        kind,
        qualifier,
        name,
    })
}

fn parse_object_name(input: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        let part = if chars.peek() == Some(&'"') {
            chars.next();
            let mut ident = String::new();
            loop {
                match chars.next()? {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        ident.push('"');
                    }
                    '"' => break,
                    c => ident.push(c),
                }
            }
            ident
        } else {
            let mut ident = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' || c == '-' {
                    ident.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if ident.is_empty() {
                return None;
            }
            ident.to_lowercase()
        };
        parts.push(part);

        if chars.peek() == Some(&'.') {
            chars.next();
        } else {
            return Some(parts);
        }
    }
}
