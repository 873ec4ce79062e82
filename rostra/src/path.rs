//! Path normalization and template compilation.
//!
//! Templates use a leading-colon convention for named segments
//! (`/users/:id`); each named segment matches exactly one non-slash path
//! segment. Patterns are compiled to a segment list rather than a regex so
//! capture order is exactly declaration order and specificity can be
//! computed per segment.

/// Join path segments into one normalized path.
///
/// Collapses repeated slashes, guarantees a single leading slash, trims the
/// trailing slash (unless the result is the bare root `/`), and treats empty
/// segments as no-ops. Idempotent: normalizing a normalized path is a no-op.
pub fn normalize<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::from("/");
    for segment in segments {
        for part in segment.as_ref().split('/').filter(|p| !p.is_empty()) {
            if out.len() > 1 {
                out.push('/');
            }
            out.push_str(part);
        }
    }
    out
}

/// One compiled template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal segment, matched exactly.
    Static(String),
    /// A named parameter segment, matching any one path segment.
    Param(String),
}

impl Segment {
    /// Whether this is a literal segment.
    pub fn is_static(&self) -> bool {
        matches!(self, Segment::Static(_))
    }
}

/// A compiled, matchable path pattern.
///
/// Invariant: `param_names().len()` equals the number of captures produced by
/// any successful [`PathPattern::matches`], and the order of both is the
/// left-to-right declaration order of the named segments.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compile a path template into a matchable pattern.
    pub fn compile(template: &str) -> Self {
        let source = normalize([template]);
        let mut segments = Vec::new();
        let mut param_names = Vec::new();
        for part in source.split('/').filter(|p| !p.is_empty()) {
            match part.strip_prefix(':') {
                Some(name) => {
                    param_names.push(name.to_owned());
                    segments.push(Segment::Param(name.to_owned()));
                }
                None => segments.push(Segment::Static(part.to_owned())),
            }
        }
        Self {
            source,
            segments,
            param_names,
        }
    }

    /// The normalized template this pattern was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names, in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Total number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of static (non-parameter) segments.
    pub fn static_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_static()).count()
    }

    /// Match a concrete path, returning captured parameter values in
    /// declaration order, or `None` if the path doesn't match.
    pub fn matches(&self, path: &str) -> Option<Vec<String>> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut captures = Vec::with_capacity(self.param_names.len());
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Static(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(_) => captures.push((*part).to_owned()),
            }
        }
        Some(captures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_joins_and_collapses() {
        assert_eq!(normalize(["/api", "/users", "/:id"]), "/api/users/:id");
        assert_eq!(normalize(["api//", "//users/"]), "/api/users");
        assert_eq!(normalize(["", "users", ""]), "/users");
        assert_eq!(normalize([""; 0]), "/");
        assert_eq!(normalize(["/"]), "/");
    }

    #[test]
    fn normalize_trims_single_trailing_slash() {
        assert_eq!(normalize(["/users/"]), "/users");
        assert_eq!(normalize(["/"]), "/");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(["/api/", "//users", ":id/"]);
        assert_eq!(normalize([once.as_str()]), once);

        let nested = normalize([normalize(["a", "b"]).as_str(), "c"]);
        assert_eq!(nested, normalize(["a", "b", "c"]));
    }

    #[test]
    fn compile_orders_params_left_to_right() {
        let pattern = PathPattern::compile("/users/:userId/posts/:postId");
        assert_eq!(pattern.param_names(), ["userId", "postId"]);
        assert_eq!(pattern.segment_count(), 4);
        assert_eq!(pattern.static_count(), 2);
    }

    #[test]
    fn matches_extracts_in_declaration_order() {
        let pattern = PathPattern::compile("/users/:userId/posts/:postId");
        let captures = pattern.matches("/users/7/posts/99").unwrap();
        assert_eq!(captures, ["7", "99"]);
        assert_eq!(captures.len(), pattern.param_names().len());
    }

    #[test]
    fn static_segments_must_match_exactly() {
        let pattern = PathPattern::compile("/users/:id");
        assert!(pattern.matches("/users/42").is_some());
        assert!(pattern.matches("/accounts/42").is_none());
        assert!(pattern.matches("/users").is_none());
        assert!(pattern.matches("/users/42/posts").is_none());
    }

    #[test]
    fn root_pattern_matches_root_only() {
        let pattern = PathPattern::compile("/");
        assert_eq!(pattern.matches("/"), Some(vec![]));
        assert!(pattern.matches("/users").is_none());
    }
}
