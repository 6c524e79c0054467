//! ExtensionClassifier - 拡張子の allow-list による分類

use std::collections::BTreeSet;

use crate::ports::{Classifier, Verdict};

/// Accepts keys whose final path segment ends in an allowed extension.
///
/// Matching ignores ASCII case, so `CAT.JPG` passes the default list.
#[derive(Debug, Clone)]
pub struct ExtensionClassifier {
    allowed: BTreeSet<String>,
}

impl ExtensionClassifier {
    /// Extensions are given without the leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for ExtensionClassifier {
    fn default() -> Self {
        Self::new(["jpg", "png"])
    }
}

impl Classifier for ExtensionClassifier {
    fn classify(&self, object_key: &str) -> Verdict {
        let file_name = object_key.rsplit('/').next().unwrap_or(object_key);
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                if self.allowed.contains(&ext.to_ascii_lowercase()) {
                    Verdict::Accept
                } else {
                    Verdict::Reject(format!("unsupported extension .{ext}"))
                }
            }
            _ => Verdict::Reject("no file extension".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cat.jpg", true)]
    #[case("cat.png", true)]
    #[case("CAT.JPG", true)]
    #[case("holiday photos/beach day.png", true)]
    #[case("doc.pdf", false)]
    #[case("archive.jpg.zip", false)]
    #[case("jpg", false)]
    #[case(".png", false)]
    #[case("photos.jpg/readme", false)]
    fn default_allow_list(#[case] key: &str, #[case] accepted: bool) {
        assert_eq!(ExtensionClassifier::default().classify(key).is_accept(), accepted);
    }

    #[test]
    fn rejection_names_the_extension() {
        let verdict = ExtensionClassifier::default().classify("doc.pdf");
        assert_eq!(verdict, Verdict::Reject("unsupported extension .pdf".into()));
    }

    #[test]
    fn custom_list_accepts_leading_dots() {
        let classifier = ExtensionClassifier::new([".gif", "WEBP"]);
        assert!(classifier.classify("a.gif").is_accept());
        assert!(classifier.classify("a.webp").is_accept());
        assert!(!classifier.classify("a.jpg").is_accept());
    }
}
