//! Bucket naming conventions for package archives.
//!
//! This module is the single source of truth for where a package lives in the
//! bucket and what it is called once staged locally:
//! - Object paths (e.g., `foo/foo-1.2.3.tar.gz`)
//! - Staged archive filenames (e.g., `foo-1.2.3.tar.gz`)
//! - Archive base names used to match extras (e.g., `foo-1`)
//!
//! Publishers must upload every installable package following the same layout:
//! `{unversioned_name}/{name-with-hyphen-for-version}.tar.gz`.

/// Separator between package name and version in a requirement.
pub const VERSION_SEPARATOR: &str = "==";

/// Extension of every archive stored in the bucket.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Where a single requirement lives in the bucket and on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Package name with any version pin removed.
    pub name_no_version: String,
    /// Requirement with `==` replaced by `-`.
    pub name_versioned: String,
}

impl ObjectLocation {
    /// Locate the archive for a requirement spec (`name` or `name==version`).
    ///
    /// A spec containing more than one `==` is not supported; the string rules
    /// are applied as-is (prefix before the first `==`, every `==` replaced).
    ///
    /// # Examples
    ///
    /// ```
    /// use gspip::manager::ObjectLocation;
    ///
    /// let location = ObjectLocation::for_spec("foo==1.2.3");
    /// assert_eq!(location.name_no_version, "foo");
    /// assert_eq!(location.name_versioned, "foo-1.2.3");
    /// assert_eq!(location.object_path(), "foo/foo-1.2.3.tar.gz");
    /// assert_eq!(location.file_name(), "foo-1.2.3.tar.gz");
    /// ```
    pub fn for_spec(spec: &str) -> Self {
        let name_no_version = spec
            .split(VERSION_SEPARATOR)
            .next()
            .unwrap_or(spec)
            .to_string();
        let name_versioned = spec.replace(VERSION_SEPARATOR, "-");

        Self {
            name_no_version,
            name_versioned,
        }
    }

    /// Filename of the archive, both in the bucket and in the staging directory.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name_versioned, ARCHIVE_EXTENSION)
    }

    /// Full object path inside the bucket.
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.name_no_version, self.file_name())
    }

    /// Key the installer will derive from the staged archive filename.
    pub fn archive_base_name(&self) -> String {
        archive_base_name(&self.file_name()).to_string()
    }
}

/// Base name of a staged archive: everything before the first `.`.
///
/// # Examples
///
/// ```
/// use gspip::manager::archive_base_name;
///
/// assert_eq!(archive_base_name("bar.tar.gz"), "bar");
/// assert_eq!(archive_base_name("foo-1.2.3.tar.gz"), "foo-1");
/// assert_eq!(archive_base_name("noext"), "noext");
/// ```
pub fn archive_base_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unversioned_spec() {
        let location = ObjectLocation::for_spec("package");
        assert_eq!(location.name_no_version, "package");
        assert_eq!(location.name_versioned, "package");
        assert_eq!(location.object_path(), "package/package.tar.gz");
        assert_eq!(location.file_name(), "package.tar.gz");
    }

    #[test]
    fn test_versioned_spec() {
        let location = ObjectLocation::for_spec("versioned_package==1.3.1");
        assert_eq!(location.name_no_version, "versioned_package");
        assert_eq!(location.name_versioned, "versioned_package-1.3.1");
        assert_eq!(
            location.object_path(),
            "versioned_package/versioned_package-1.3.1.tar.gz"
        );
    }

    #[test]
    fn test_multiple_separators_apply_string_rules_verbatim() {
        let location = ObjectLocation::for_spec("a==1==2");
        assert_eq!(location.name_no_version, "a");
        assert_eq!(location.name_versioned, "a-1-2");
    }

    #[test]
    fn test_archive_base_name_matches_installer_derivation() {
        let location = ObjectLocation::for_spec("bar");
        assert_eq!(location.archive_base_name(), "bar");

        let location = ObjectLocation::for_spec("foo==1.2.3");
        assert_eq!(
            location.archive_base_name(),
            archive_base_name("foo-1.2.3.tar.gz")
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_unversioned_names_are_identity(name in "[A-Za-z0-9_][A-Za-z0-9_.-]{0,30}") {
                let location = ObjectLocation::for_spec(&name);
                prop_assert_eq!(&location.name_no_version, &name);
                prop_assert_eq!(&location.name_versioned, &name);
            }

            #[test]
            fn test_versioned_object_path(
                name in "[A-Za-z0-9_-]{1,20}",
                version in "[0-9]{1,3}(\\.[0-9]{1,3}){0,2}"
            ) {
                let location = ObjectLocation::for_spec(&format!("{}=={}", name, version));
                prop_assert_eq!(
                    location.object_path(),
                    format!("{}/{}-{}.tar.gz", name, name, version)
                );
            }
        }
    }
}
