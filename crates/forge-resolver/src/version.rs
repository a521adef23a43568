//! Permissive version-constraint checking (spec.md §4.D).

/// A parsed `<op><major>[.<minor>[.<patch>]]` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

/// Check whether `actual` (a dotted numeric version, e.g. `"1.4.2"`)
/// satisfies `constraint` (e.g. `">=1.2"`, `"<2"`, bare `"1.4"` meaning
/// `=1.4`).
///
/// Deliberately permissive per spec.md §9: a missing constraint always
/// satisfies, and a constraint that fails to parse also always satisfies
/// rather than rejecting the candidate. This may mask malformed `requires`
/// entries; callers wanting strict semantics should validate constraints
/// up front instead of relying on this function to reject them.
#[must_use]
pub fn satisfies_version(actual: &str, constraint: Option<&str>) -> bool {
    let Some(constraint) = constraint else {
        return true;
    };
    let constraint = constraint.trim();
    if constraint.is_empty() {
        return true;
    }

    let Some((op, rest)) = split_op(constraint) else {
        return true;
    };

    let Some(actual_triple) = parse_triple(actual) else {
        return true;
    };
    let Some(constraint_triple) = parse_triple(rest) else {
        return true;
    };

    match op {
        Op::Eq => actual_triple == constraint_triple,
        Op::Ge => actual_triple >= constraint_triple,
        Op::Le => actual_triple <= constraint_triple,
        Op::Gt => actual_triple > constraint_triple,
        Op::Lt => actual_triple < constraint_triple,
    }
}

fn split_op(constraint: &str) -> Option<(Op, &str)> {
    if let Some(rest) = constraint.strip_prefix(">=") {
        Some((Op::Ge, rest))
    } else if let Some(rest) = constraint.strip_prefix("<=") {
        Some((Op::Le, rest))
    } else if let Some(rest) = constraint.strip_prefix('>') {
        Some((Op::Gt, rest))
    } else if let Some(rest) = constraint.strip_prefix('<') {
        Some((Op::Lt, rest))
    } else if let Some(rest) = constraint.strip_prefix('=') {
        Some((Op::Eq, rest))
    } else {
        Some((Op::Eq, constraint))
    }
}

fn parse_triple(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.trim().splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    let patch = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_constraint_always_satisfies() {
        assert!(satisfies_version("1.0.0", None));
        assert!(satisfies_version("1.0.0", Some("")));
    }

    #[test]
    fn compares_numeric_triples_lexicographically() {
        assert!(satisfies_version("1.4.2", Some(">=1.2")));
        assert!(!satisfies_version("1.1.0", Some(">=1.2")));
        assert!(satisfies_version("1.0.0", Some("<2")));
        assert!(satisfies_version("2.0.0", Some("=2.0.0")));
        assert!(satisfies_version("2.0.0", Some("2.0.0")));
        assert!(!satisfies_version("2.0.1", Some("=2.0.0")));
    }

    #[test]
    fn unparseable_constraint_is_permissive() {
        assert!(satisfies_version("1.0.0", Some("whatever")));
        assert!(satisfies_version("not-a-version", Some(">=1.0.0")));
    }
}
