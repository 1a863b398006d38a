//! Requirement parsing for bucket-hosted packages.
//!
//! A requirement is a package name, optionally pinned with `==version`, and
//! optionally suffixed with an extras selector:
//!
//! ```text
//! name
//! name==1.2.3
//! name[test]
//! name==1.2.3[test, docs]
//! ```
//!
//! Requirements come either from a single command-line token or from a
//! requirements file holding one requirement per line.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::manager::{ManagerError, ManagerResult, ObjectLocation, VERSION_SEPARATOR};

/// Trailing extras selector: one or more characters, then `[...]` at the end.
const EXTRAS_PATTERN: &str = r"^(.+)(\[[^\]]+\])$";

fn extras_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EXTRAS_PATTERN).expect("extras pattern is valid"))
}

/// Split a requirement token into its base and trailing extras selector.
///
/// The extras value keeps its brackets. Tokens without a well-formed
/// trailing selector (including unbalanced brackets) have no extras.
///
/// # Examples
///
/// ```
/// use gspip::requirement::strip_extras;
///
/// assert_eq!(strip_extras("bar[extra1]"), ("bar", Some("[extra1]")));
/// assert_eq!(strip_extras("foo==1.0"), ("foo==1.0", None));
/// assert_eq!(strip_extras("broken[extra"), ("broken[extra", None));
/// ```
pub fn strip_extras(token: &str) -> (&str, Option<&str>) {
    match extras_regex().captures(token) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(base), Some(extras)) => (base.as_str(), Some(extras.as_str())),
            _ => (token, None),
        },
        None => (token, None),
    }
}

/// A single package requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    name: String,
    version: Option<String>,
    extras: Option<String>,
}

impl Requirement {
    /// Parse one requirement token.
    pub fn parse(token: &str) -> ManagerResult<Self> {
        parse_token(token, "requirement", None)
    }

    /// Bare package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Raw extras selector including brackets, if any.
    pub fn extras(&self) -> Option<&str> {
        self.extras.as_deref()
    }

    /// The requirement without extras: `name` or `name==version`.
    pub fn spec(&self) -> String {
        match &self.version {
            Some(version) => format!("{}{}{}", self.name, VERSION_SEPARATOR, version),
            None => self.name.clone(),
        }
    }

    /// Where this requirement's archive lives in the bucket.
    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::for_spec(&self.spec())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec())?;
        if let Some(extras) = &self.extras {
            write!(f, "{}", extras)?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_token(token: &str, origin: &str, line: Option<usize>) -> ManagerResult<Requirement> {
    let token = token.trim();
    let fail = |reason: &str| ManagerError::ParseFailed {
        origin: origin.to_string(),
        line,
        reason: reason.to_string(),
    };

    if token.is_empty() {
        return Err(fail("empty requirement"));
    }

    let (base, extras) = strip_extras(token);
    let (name, version) = match base.split_once(VERSION_SEPARATOR) {
        Some((name, version)) => (name, Some(version.to_string())),
        None => (base, None),
    };

    if name.is_empty() {
        return Err(fail("missing package name"));
    }
    if base.contains(['/', '\\']) {
        return Err(fail("requirement must not contain path separators"));
    }
    if name == "." || name == ".." {
        return Err(fail("package name must not be a relative path"));
    }

    Ok(Requirement {
        name: name.to_string(),
        version,
        extras: extras.map(str::to_string),
    })
}

/// Ordered requirements in input order. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementSet {
    requirements: Vec<Requirement>,
}

impl RequirementSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a requirement.
    pub fn push(&mut self, requirement: Requirement) {
        self.requirements.push(requirement);
    }

    /// Number of requirements.
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Iterate in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, Requirement> {
        self.requirements.iter()
    }
}

impl<'a> IntoIterator for &'a RequirementSet {
    type Item = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Requirement> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        Self {
            requirements: iter.into_iter().collect(),
        }
    }
}

/// Extras selectors keyed by archive base name.
///
/// The key is the part of the staged archive filename before its first `.`,
/// which is exactly what the installer derives when it walks the staging
/// directory. Versions of one package that agree up to their first `.`
/// share a key: `pkg==1.0[a]` and `pkg==1.5` both map to `pkg-1`, and the
/// last recorded extras apply to both archives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtrasMap {
    entries: HashMap<String, String>,
}

impl ExtrasMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the extras of a requirement, if it has any.
    pub fn record(&mut self, requirement: &Requirement) {
        if let Some(extras) = requirement.extras() {
            let key = requirement.location().archive_base_name();
            if let Some(previous) = self.entries.insert(key.clone(), extras.to_string()) {
                warn!(
                    key = %key,
                    previous = %previous,
                    extras = %extras,
                    "Extras for another requirement share this archive base name"
                );
            }
        }
    }

    /// Insert an extras selector for an archive base name.
    pub fn insert(&mut self, base_name: impl Into<String>, extras: impl Into<String>) {
        self.entries.insert(base_name.into(), extras.into());
    }

    /// Look up the extras for an archive base name.
    pub fn get(&self, base_name: &str) -> Option<&str> {
        self.entries.get(base_name).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requirement carried extras.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed requirements plus their extras.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRequirements {
    pub requirements: RequirementSet,
    pub extras: ExtrasMap,
}

impl ParsedRequirements {
    fn push(&mut self, requirement: Requirement) {
        self.extras.record(&requirement);
        self.requirements.push(requirement);
    }
}

/// Parse a requirement argument.
///
/// If `input` names an existing file it is read as a requirements file,
/// otherwise `input` itself is the only requirement.
pub fn parse_requirements(input: &str) -> ManagerResult<ParsedRequirements> {
    let path = Path::new(input);
    if path.is_file() {
        return parse_requirements_file(path);
    }

    let mut parsed = ParsedRequirements::default();
    parsed.push(Requirement::parse(input)?);
    Ok(parsed)
}

/// Parse a requirements file, one requirement per line.
pub fn parse_requirements_file(path: &Path) -> ManagerResult<ParsedRequirements> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::InvalidData {
            ManagerError::ParseFailed {
                origin: path.display().to_string(),
                line: None,
                reason: "file is not valid UTF-8".to_string(),
            }
        } else {
            ManagerError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    parse_requirement_lines(&content, &path.display().to_string())
}

/// Parse requirements from text. Blank lines and `#` comments are skipped.
pub fn parse_requirement_lines(content: &str, origin: &str) -> ManagerResult<ParsedRequirements> {
    let mut parsed = ParsedRequirements::default();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        parsed.push(parse_token(line, origin, Some(index + 1))?);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_bare_name() {
        let req = Requirement::parse("package").unwrap();
        assert_eq!(req.name(), "package");
        assert_eq!(req.version(), None);
        assert_eq!(req.extras(), None);
        assert_eq!(req.spec(), "package");
    }

    #[test]
    fn test_parse_versioned_with_extras() {
        let req = Requirement::parse("foo==1.2.3[extra_a, extra_b]").unwrap();
        assert_eq!(req.name(), "foo");
        assert_eq!(req.version(), Some("1.2.3"));
        assert_eq!(req.extras(), Some("[extra_a, extra_b]"));
        assert_eq!(req.spec(), "foo==1.2.3");
        assert_eq!(req.to_string(), "foo==1.2.3[extra_a, extra_b]");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let req: Requirement = "  bar[extra1]\n".parse().unwrap();
        assert_eq!(req.name(), "bar");
        assert_eq!(req.extras(), Some("[extra1]"));
    }

    #[test]
    fn test_unbalanced_bracket_has_no_extras() {
        let req = Requirement::parse("bar[extra1").unwrap();
        assert_eq!(req.name(), "bar[extra1");
        assert_eq!(req.extras(), None);
    }

    #[test]
    fn test_empty_brackets_have_no_extras() {
        assert_eq!(strip_extras("bar[]"), ("bar[]", None));
    }

    #[test]
    fn test_empty_requirement_is_rejected() {
        let err = Requirement::parse("   ").unwrap_err();
        assert!(matches!(err, ManagerError::ParseFailed { line: None, .. }));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = Requirement::parse("==1.0").unwrap_err();
        assert!(err.to_string().contains("missing package name"));
    }

    #[test]
    fn test_path_separators_are_rejected() {
        for token in ["../x", "a/b", "a\\b", "foo==../../x", "..", "."] {
            let err = Requirement::parse(token).unwrap_err();
            assert!(
                matches!(err, ManagerError::ParseFailed { .. }),
                "{token} should be rejected"
            );
        }
    }

    #[test]
    fn test_dotted_names_are_allowed() {
        let req = Requirement::parse("zope.interface==5.0").unwrap();
        assert_eq!(req.name(), "zope.interface");
    }

    #[test]
    fn test_extras_for_colliding_base_names_keep_last() {
        let parsed = parse_requirement_lines("pkg==1.0[a]\npkg==1.5[b]\n", "mem").unwrap();
        assert_eq!(parsed.extras.len(), 1);
        assert_eq!(parsed.extras.get("pkg-1"), Some("[b]"));
    }

    #[test]
    fn test_single_argument_yields_one_entry() {
        let parsed = parse_requirements("one-ring").unwrap();
        assert_eq!(parsed.requirements.len(), 1);
        assert!(parsed.extras.is_empty());
    }

    #[test]
    fn test_extras_keyed_by_archive_base_name() {
        let parsed = parse_requirements("bar[extra1]").unwrap();
        assert_eq!(parsed.extras.get("bar"), Some("[extra1]"));

        let parsed = parse_requirements("foo==1.2.3[test]").unwrap();
        assert_eq!(parsed.extras.get("foo-1"), Some("[test]"));
    }

    #[test]
    fn test_requirements_file_preserves_order_and_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "package").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "# internal packages").unwrap();
        writeln!(file, "versioned_package==1.3.1  ").unwrap();
        writeln!(file, "package").unwrap();
        writeln!(file, "bar[extra1]").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let parsed = parse_requirements(&path).unwrap();

        let specs: Vec<String> = parsed.requirements.iter().map(|r| r.spec()).collect();
        assert_eq!(
            specs,
            vec!["package", "versioned_package==1.3.1", "package", "bar"]
        );
        assert_eq!(parsed.extras.len(), 1);
        assert_eq!(parsed.extras.get("bar"), Some("[extra1]"));
    }

    #[test]
    fn test_requirements_file_reports_line_number() {
        let err = parse_requirement_lines("good\n\n==2.0\n", "reqs.txt").unwrap_err();
        match err {
            ManagerError::ParseFailed { origin, line, .. } => {
                assert_eq!(origin, "reqs.txt");
                assert_eq!(line, Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_utf8_file_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x66, 0x6f, 0xff, 0xfe, 0x0a]).unwrap();

        let err = parse_requirements_file(file.path()).unwrap_err();
        assert!(matches!(err, ManagerError::ParseFailed { .. }));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let set: RequirementSet = ["a", "a"]
            .iter()
            .map(|t| Requirement::parse(t).unwrap())
            .collect();
        assert_eq!(set.len(), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_split_then_rejoin_reconstructs_token(
                name in "[A-Za-z0-9_.=-]{1,20}",
                extras in "[A-Za-z0-9_, -]{1,20}"
            ) {
                let token = format!("{}[{}]", name, extras);
                let (base, found) = strip_extras(&token);
                prop_assert_eq!(base, name.as_str());
                let found = found.unwrap();
                prop_assert_eq!(format!("{}{}", base, found), token.clone());
            }

            #[test]
            fn test_name_never_contains_extras(
                name in "[A-Za-z0-9_-]{1,20}",
                extras in "[A-Za-z0-9_, ]{1,20}"
            ) {
                let req = Requirement::parse(&format!("{}[{}]", name, extras)).unwrap();
                prop_assert!(!req.name().contains('['));
                prop_assert_eq!(req.extras().unwrap(), format!("[{}]", extras));
            }

            #[test]
            fn test_file_with_n_lines_yields_n_entries(
                names in proptest::collection::vec("[a-z][a-z0-9_-]{0,10}", 0..20)
            ) {
                let content = names.join("\n\n");
                let parsed = parse_requirement_lines(&content, "mem").unwrap();
                let specs: Vec<String> = parsed.requirements.iter().map(|r| r.spec()).collect();
                prop_assert_eq!(specs, names);
            }
        }
    }
}
