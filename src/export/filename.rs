//! Output file naming for exported archives.

use std::path::{Path, PathBuf};

use crate::remote::ExportFormat;

/// Replaces every character outside `[alphanumeric . _ - space]` with `_`.
///
/// The mapping is one-for-one: the output has as many characters as the input.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Archive file name: `<key>_<sanitized name><extension>`.
#[must_use]
pub fn artifact_filename(key: &str, name: &str, format: ExportFormat) -> String {
    // keys never carry separators on a sane server, but never let one escape the output dir
    let key = key.replace(['/', '\\'], "_");
    format!(
        "{key}_{}{}",
        sanitize_name(name),
        format.archive_extension()
    )
}

/// Full archive path inside `output_dir`.
#[must_use]
pub fn artifact_path(output_dir: &Path, key: &str, name: &str, format: ExportFormat) -> PathBuf {
    output_dir.join(artifact_filename(key, name, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_replaces_one_for_one() {
        assert_eq!(sanitize_name(r#"My/Space: "2024""#), "My_Space_ _2024_");
    }

    #[test]
    fn test_sanitize_name_keeps_allowed_characters() {
        assert_eq!(sanitize_name("Team-Docs v1.2_final"), "Team-Docs v1.2_final");
        assert_eq!(sanitize_name("Ünïcödé Space"), "Ünïcödé Space");
    }

    #[test]
    fn test_sanitize_name_replaces_path_and_shell_characters() {
        assert_eq!(sanitize_name(r"a\b*c?d<e>f|g"), "a_b_c_d_e_f_g");
        assert_eq!(sanitize_name("tab\there"), "tab_here");
    }

    #[test]
    fn test_artifact_filename_html() {
        assert_eq!(
            artifact_filename("DOCS", r#"My/Space: "2024""#, ExportFormat::Html),
            "DOCS_My_Space_ _2024_.html.zip"
        );
    }

    #[test]
    fn test_artifact_filename_personal_key_and_xml() {
        assert_eq!(
            artifact_filename("~jdoe", "John Doe", ExportFormat::Xml),
            "~jdoe_John Doe.xml.zip"
        );
    }

    #[test]
    fn test_artifact_path_stays_in_output_dir() {
        let path = artifact_path(Path::new("/out"), "../X", "n", ExportFormat::Html);
        assert_eq!(path, Path::new("/out").join(".._X_n.html.zip"));
    }
}
