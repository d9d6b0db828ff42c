//! SQL text for role management.
//!
//! Role names are identifiers, not values, so DDL cannot bind them as
//! parameters; they are quoted instead. Everything else is bound.

/// Existence check against the role catalog.
pub const ROLE_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1)";

/// Quote a role name as a SQL identifier.
#[must_use]
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `LIKE` pattern matching names that start with `prefix` literally.
#[must_use]
pub fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Direct members of role `$1` whose name matches one of `prefix_count`
/// patterns bound as `$2..`.
#[must_use]
pub fn managed_members_query(prefix_count: usize) -> String {
    let clauses = (0..prefix_count)
        .map(|i| format!("u.rolname LIKE ${} ESCAPE '\\'", i + 2))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!(
        "SELECT u.rolname FROM pg_catalog.pg_roles u \
         JOIN pg_catalog.pg_auth_members m ON m.member = u.oid \
         JOIN pg_catalog.pg_roles g ON g.oid = m.roleid \
         WHERE g.rolname = $1 AND ({clauses}) \
         ORDER BY u.rolname"
    )
}

#[must_use]
pub fn create_login_role(name: &str) -> String {
    format!("CREATE ROLE {} WITH LOGIN", quote_identifier(name))
}

#[must_use]
pub fn grant_role(role: &str, name: &str) -> String {
    format!("GRANT {} TO {}", quote_identifier(role), quote_identifier(name))
}

#[must_use]
pub fn revoke_role(role: &str, name: &str) -> String {
    format!("REVOKE {} FROM {}", quote_identifier(role), quote_identifier(name))
}

#[must_use]
pub fn drop_role(name: &str) -> String {
    format!("DROP ROLE {}", quote_identifier(name))
}
