//! Descriptor store: the `.vmx` file as an ordered list of `key = "value"` lines.
//!
//! Lines that are not settings are preserved verbatim. Keys are not unique by
//! construction, so a write updates *every* line defining the key and only
//! appends when none exists.

use crate::error::{DriverError, Result};
use std::path::{Path, PathBuf};

/// Line terminator used when writing descriptors back to disk.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
/// Line terminator used when writing descriptors back to disk.
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// In-memory descriptor contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lines(Vec<String>);

impl Lines {
    /// Split descriptor text into lines, dropping empty entries.
    pub fn parse(text: &str) -> Self {
        Self(
            text.split('\n')
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Iterate over the lines in file order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no lines.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a raw line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }

    /// Value of the first line of the form `name = "<value>"`.
    pub fn read_setting(&self, name: &str) -> Option<&str> {
        let prefix = setting_prefix(name);
        self.iter()
            .find_map(|line| line.strip_prefix(&prefix)?.strip_suffix('"'))
    }

    /// Set `name` to `value`, rewriting every line that defines it.
    pub fn write_setting(&mut self, name: &str, value: &str) {
        let prefix = setting_prefix(name);
        let replacement = setting_line(name, value);
        let mut found = false;
        for line in self.0.iter_mut().filter(|line| line.starts_with(&prefix)) {
            line.clone_from(&replacement);
            found = true;
        }
        if !found {
            self.0.push(replacement);
        }
    }

    /// Remove every line defining `name`. Returns the number removed.
    pub fn clear_setting(&mut self, name: &str) -> usize {
        let prefix = setting_prefix(name);
        self.remove_lines(|line| line.starts_with(&prefix))
    }

    /// Remove every line matching `predicate`. Returns the number removed.
    pub fn remove_lines(&mut self, mut predicate: impl FnMut(&str) -> bool) -> usize {
        let before = self.0.len();
        self.0.retain(|line| !predicate(line));
        before - self.0.len()
    }

    /// Render back to descriptor text, terminator after every line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.0 {
            out.push_str(line);
            out.push_str(LINE_ENDING);
        }
        out
    }
}

impl<S: Into<String>> FromIterator<S> for Lines {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

fn setting_prefix(name: &str) -> String {
    format!("{name} = \"")
}

/// Reject a setting that would not fit on one descriptor line.
///
/// # Errors
/// `InvalidRequest` if `name` is empty or either part contains a line
/// terminator.
pub fn check_setting(name: &str, value: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DriverError::InvalidRequest("setting name is empty".into()));
    }
    for (part, text) in [("name", name), ("value", value)] {
        if text.contains(['\n', '\r']) {
            return Err(DriverError::InvalidRequest(format!(
                "setting {part} for {name:?} contains a line terminator"
            )));
        }
    }
    Ok(())
}

/// Format a `name = "value"` setting line.
pub fn setting_line(name: &str, value: &str) -> String {
    format!("{name} = \"{value}\"")
}

/// A descriptor file on disk.
///
/// Every operation is a full read-modify-write of the file. There is no
/// locking: concurrent writers to the same descriptor race and the last write
/// wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    path: PathBuf,
}

impl Descriptor {
    /// Refer to a descriptor at `path` without checking that it exists.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Refer to an existing descriptor.
    ///
    /// # Errors
    /// Returns `DescriptorNotFound` if no file exists at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let descriptor = Self::new(path);
        descriptor.ensure_exists()?;
        Ok(descriptor)
    }

    /// Path of the descriptor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the descriptor and its disks.
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent()
    }

    /// Whether the backing file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Fail with `DescriptorNotFound` unless the backing file exists.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            Err(DriverError::DescriptorNotFound(self.path.clone()))
        }
    }

    /// Read and parse the descriptor.
    pub async fn load(&self) -> Result<Lines> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Lines::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DriverError::DescriptorNotFound(self.path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write `lines` back to the descriptor.
    pub async fn save(&self, lines: &Lines) -> Result<()> {
        tokio::fs::write(&self.path, lines.render()).await?;
        Ok(())
    }

    /// Load, apply `edit`, and save.
    pub async fn update<R>(&self, edit: impl FnOnce(&mut Lines) -> R) -> Result<R> {
        let mut lines = self.load().await?;
        let result = edit(&mut lines);
        self.save(&lines).await?;
        Ok(result)
    }

    /// Read a setting value.
    pub async fn read_setting(&self, name: &str) -> Result<Option<String>> {
        let lines = self.load().await?;
        Ok(lines.read_setting(name).map(str::to_owned))
    }

    /// Write a single setting.
    pub async fn write_setting(&self, name: &str, value: &str) -> Result<()> {
        check_setting(name, value)?;
        tracing::trace!(vmx = %self.path.display(), name, value, "Writing descriptor setting");
        self.update(|lines| lines.write_setting(name, value)).await
    }

    /// Write several settings in one read-modify-write cycle.
    pub async fn write_settings<K, V>(&self, settings: &[(K, V)]) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in settings {
            check_setting(name.as_ref(), value.as_ref())?;
        }
        self.update(|lines| {
            for (name, value) in settings {
                lines.write_setting(name.as_ref(), value.as_ref());
            }
        })
        .await
    }

    /// Remove every line defining `name`.
    pub async fn clear_setting(&self, name: &str) -> Result<usize> {
        self.update(|lines| lines.clear_setting(name)).await
    }

    /// Remove every line matching `predicate`.
    pub async fn remove_lines(&self, predicate: impl FnMut(&str) -> bool) -> Result<usize> {
        self.update(|lines| lines.remove_lines(predicate)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_empty_lines() {
        let lines = Lines::parse("a = \"1\"\n\n\r\nb = \"2\"\r\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.read_setting("b"), Some("2"));
    }

    #[test]
    fn test_write_then_read() {
        let mut lines = Lines::default();
        lines.write_setting("memsize", "2048");
        assert_eq!(lines.read_setting("memsize"), Some("2048"));

        lines.write_setting("displayName", "");
        assert_eq!(lines.read_setting("displayName"), Some(""));
    }

    #[test]
    fn test_write_is_idempotent() {
        let mut lines = Lines::parse(".encoding = \"UTF-8\"\n");
        lines.write_setting("numvcpus", "2");
        let count = lines.len();
        lines.write_setting("numvcpus", "2");
        assert_eq!(lines.len(), count);
    }

    #[test]
    fn test_write_updates_every_duplicate() {
        let mut lines = Lines::parse("memsize = \"512\"\nother = \"x\"\nmemsize = \"1024\"\n");
        lines.write_setting("memsize", "4096");
        let values: Vec<_> = lines.iter().filter(|l| l.starts_with("memsize")).collect();
        assert_eq!(values, vec!["memsize = \"4096\"", "memsize = \"4096\""]);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_prefix_match_is_exact_key() {
        let lines = Lines::parse("ethernet0.present = \"TRUE\"\n");
        assert_eq!(lines.read_setting("ethernet0"), None);
        assert_eq!(lines.read_setting("ethernet0.present"), Some("TRUE"));
    }

    #[test]
    fn test_clear_setting_removes_all_definitions() {
        let mut lines = Lines::parse("a = \"1\"\nb = \"2\"\na = \"3\"\n");
        assert_eq!(lines.clear_setting("a"), 2);
        assert_eq!(lines.read_setting("a"), None);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_render_preserves_unrelated_lines() {
        let text = format!("#!/usr/bin/vmware{LINE_ENDING}config.version = \"8\"{LINE_ENDING}");
        assert_eq!(Lines::parse(&text).render(), text);
    }

    #[test]
    fn test_check_setting_rejects_line_breaks() {
        assert!(check_setting("annotation", "two words").is_ok());
        assert!(check_setting("annotation", "").is_ok());
        assert!(matches!(
            check_setting("annotation", "x\"\nguestOS = \"other"),
            Err(DriverError::InvalidRequest(_))
        ));
        assert!(matches!(
            check_setting("annotation", "a\rb"),
            Err(DriverError::InvalidRequest(_))
        ));
        assert!(matches!(
            check_setting("guestOS\nmemsize", "1"),
            Err(DriverError::InvalidRequest(_))
        ));
        assert!(matches!(check_setting("", "1"), Err(DriverError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_multiline_value_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vm.vmx");
        std::fs::write(&path, "guestOS = \"ubuntu-64\"\n").unwrap();
        let descriptor = Descriptor::open(&path).unwrap();

        let result = descriptor
            .write_setting("annotation", "x\"\nguestOS = \"other")
            .await;
        assert!(matches!(result, Err(DriverError::InvalidRequest(_))));

        let result = descriptor
            .write_settings(&[("numvcpus", "2"), ("annotation", "a\r\nb")])
            .await;
        assert!(matches!(result, Err(DriverError::InvalidRequest(_))));

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "guestOS = \"ubuntu-64\"\n"
        );
    }

    #[tokio::test]
    async fn test_missing_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.vmx");

        assert!(matches!(
            Descriptor::open(&path),
            Err(DriverError::DescriptorNotFound(_))
        ));
        assert!(matches!(
            Descriptor::new(&path).read_setting("memsize").await,
            Err(DriverError::DescriptorNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vm.vmx");
        std::fs::write(&path, "config.version = \"8\"\n").unwrap();

        let descriptor = Descriptor::open(&path).unwrap();
        descriptor.write_setting("memsize", "1024").await.unwrap();
        descriptor
            .write_settings(&[("numvcpus", "4"), ("memsize", "2048")])
            .await
            .unwrap();

        assert_eq!(
            descriptor.read_setting("memsize").await.unwrap().as_deref(),
            Some("2048")
        );
        assert_eq!(descriptor.load().await.unwrap().len(), 3);

        descriptor.clear_setting("numvcpus").await.unwrap();
        assert_eq!(descriptor.read_setting("numvcpus").await.unwrap(), None);
    }
}
