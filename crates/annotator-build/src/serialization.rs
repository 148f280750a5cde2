//! XML settings files read by the analyzer and the scanner at startup.

use std::fmt::Write as _;
use std::path::Path;

use crate::{BuildError, Result};

/// Settings for the nullability checker's fix serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerSettings<'a> {
    pub suggest: bool,
    pub suggest_enclosing: bool,
    pub field_init_info: bool,
    pub nullable_annotation: &'a str,
    pub initializer_annotation: &'a str,
    pub output_dir: &'a Path,
}

impl CheckerSettings<'_> {
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n<serialization>\n");
        let _ = writeln!(
            xml,
            "  <suggest active=\"{}\" enclosing=\"{}\"/>",
            self.suggest, self.suggest_enclosing
        );
        let _ = writeln!(xml, "  <fieldInitInfo active=\"{}\"/>", self.field_init_info);
        xml.push_str("  <annotation>\n");
        let _ = writeln!(xml, "    <nullable>{}</nullable>", escape(self.nullable_annotation));
        let _ = writeln!(xml, "    <initializer>{}</initializer>", escape(self.initializer_annotation));
        xml.push_str("  </annotation>\n");
        let _ = writeln!(xml, "  <path>{}</path>", escape(&self.output_dir.display().to_string()));
        let _ = writeln!(xml, "  <uuid>{}</uuid>", uuid::Uuid::new_v4());
        xml.push_str("</serialization>\n");
        xml
    }
}

/// Settings for the scanner that emits call graphs and method metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerSettings<'a> {
    pub active: bool,
    pub output_dir: &'a Path,
}

impl ScannerSettings<'_> {
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n<scanner>\n");
        for tracker in ["method", "field", "call", "class"] {
            let _ = writeln!(xml, "  <{tracker} active=\"{}\"/>", self.active);
        }
        let _ = writeln!(xml, "  <path>{}</path>", escape(&self.output_dir.display().to_string()));
        xml.push_str("  <processor/>\n");
        xml.push_str("</scanner>\n");
        xml
    }
}

pub fn write_settings(path: &Path, xml: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, xml).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn child<'a, 'input>(node: roxmltree::Node<'a, 'input>, name: &str) -> roxmltree::Node<'a, 'input> {
        node.children()
            .find(|n| n.has_tag_name(name))
            .unwrap_or_else(|| panic!("missing <{name}>"))
    }

    #[test]
    fn checker_settings_are_well_formed() {
        let settings = CheckerSettings {
            suggest: true,
            suggest_enclosing: true,
            field_init_info: false,
            nullable_annotation: "javax.annotation.Nullable",
            initializer_annotation: "com.acme.Init",
            output_dir: Path::new("/tmp/out & more/0"),
        };
        let xml = settings.to_xml();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "serialization");

        let suggest = child(root, "suggest");
        assert_eq!(suggest.attribute("active"), Some("true"));
        assert_eq!(suggest.attribute("enclosing"), Some("true"));
        assert_eq!(child(root, "fieldInitInfo").attribute("active"), Some("false"));
        let annotation = child(root, "annotation");
        assert_eq!(child(annotation, "nullable").text(), Some("javax.annotation.Nullable"));
        assert_eq!(child(annotation, "initializer").text(), Some("com.acme.Init"));
        assert_eq!(child(root, "path").text(), Some("/tmp/out & more/0"));
        assert_eq!(child(root, "uuid").text().map(str::len), Some(36));
    }

    #[test]
    fn every_write_gets_a_fresh_uuid() {
        let settings = CheckerSettings {
            suggest: true,
            suggest_enclosing: true,
            field_init_info: true,
            nullable_annotation: "N",
            initializer_annotation: "I",
            output_dir: Path::new("/o"),
        };
        assert_ne!(settings.to_xml(), settings.to_xml());
    }

    #[test]
    fn scanner_settings_toggle_every_tracker() {
        let xml = ScannerSettings {
            active: true,
            output_dir: Path::new("/o/1"),
        }
        .to_xml();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "scanner");
        for tracker in ["method", "field", "call", "class"] {
            assert_eq!(child(root, tracker).attribute("active"), Some("true"));
        }
        assert_eq!(child(root, "path").text(), Some("/o/1"));
    }
}
