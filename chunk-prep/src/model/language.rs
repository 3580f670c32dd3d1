//! Language classification by file extension.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Supported source languages. JSP and XML are first-class: legacy webapps
/// keep most of their behavior there, not in Java alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageKind {
    Python,
    Java,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    C,
    Cpp,
    Jsp,
    Xml,
}

impl Display for LanguageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use LanguageKind::*;
        let s = match self {
            Python => "python",
            Java => "java",
            JavaScript => "javascript",
            TypeScript => "typescript",
            Go => "go",
            Rust => "rust",
            C => "c",
            Cpp => "cpp",
            Jsp => "jsp",
            Xml => "xml",
        };
        f.write_str(s)
    }
}

/// Classify a path by extension. Returns `None` for unsupported files;
/// those still get a `File` node in the graph but never reach the parser.
pub fn detect_language(path: &Path) -> Option<LanguageKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let kind = match ext.as_str() {
        "py" => LanguageKind::Python,
        "java" => LanguageKind::Java,
        "js" | "jsx" | "mjs" => LanguageKind::JavaScript,
        "ts" | "tsx" => LanguageKind::TypeScript,
        "go" => LanguageKind::Go,
        "rs" => LanguageKind::Rust,
        "c" | "h" => LanguageKind::C,
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => LanguageKind::Cpp,
        "jsp" | "jspf" => LanguageKind::Jsp,
        "xml" => LanguageKind::Xml,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(
            detect_language(Path::new("src/OrderAction.java")),
            Some(LanguageKind::Java)
        );
        assert_eq!(
            detect_language(Path::new("web/checkout.jsp")),
            Some(LanguageKind::Jsp)
        );
        assert_eq!(
            detect_language(Path::new("conf/struts-config.xml")),
            Some(LanguageKind::Xml)
        );
        assert_eq!(detect_language(Path::new("README")), None);
        assert_eq!(detect_language(Path::new("logo.png")), None);
    }
}
