//! Template files with `$$NAME$$` hole markers.
//!
//! A template is the invariant scaffolding of one generated C file. Lines of
//! the form `$$NAME$$` (optionally surrounded by whitespace) are holes; the
//! emitters plug every hole with generated text. Hole bookkeeping is strict
//! in both directions: plugging an undefined hole and leaving a defined hole
//! unplugged are both fatal.

use std::collections::BTreeMap;
use std::path::Path;

use crate::EmitError;

/// Banner prepended to every rendered template.
pub const GENERATED_BANNER: &str = "/* ** AUTOMATICALLY GENERATED.  DO NOT MODIFY. ** */";

/// A loaded template: its lines plus the hole-name → line-index map.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    name: String,
    lines: Vec<String>,
    holes: BTreeMap<String, usize>,
}

impl TemplateFile {
    /// Read and scan a template from disk.
    pub fn load(path: &Path) -> Result<Self, EmitError> {
        let text = std::fs::read_to_string(path).map_err(|source| EmitError::TemplateIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&path.display().to_string(), &text)
    }

    /// Scan template text. `name` is only used in diagnostics.
    pub fn parse(name: &str, text: &str) -> Result<Self, EmitError> {
        let mut lines = Vec::new();
        let mut holes = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if let Some(hole) = hole_name(line) {
                if holes.insert(hole.to_owned(), index).is_some() {
                    return Err(EmitError::DuplicateHole {
                        template: name.to_owned(),
                        hole: hole.to_owned(),
                    });
                }
            }
            lines.push(line.to_owned());
        }
        if holes.is_empty() {
            return Err(EmitError::NoHoles {
                template: name.to_owned(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            lines,
            holes,
        })
    }

    /// Hole names defined by this template, in sorted order.
    pub fn holes(&self) -> impl Iterator<Item = &str> {
        self.holes.keys().map(String::as_str)
    }

    /// Render the template with every hole plugged.
    ///
    /// The rendered text starts with [`GENERATED_BANNER`]. Each `(hole,
    /// text)` pair replaces the hole's line verbatim.
    pub fn render(&self, fills: &[(&str, String)]) -> Result<String, EmitError> {
        let mut plugged: BTreeMap<usize, &str> = BTreeMap::new();
        let mut remaining = self.holes.clone();
        for (hole, text) in fills {
            let index = remaining.remove(*hole).ok_or_else(|| EmitError::UnknownHole {
                template: self.name.clone(),
                hole: (*hole).to_owned(),
                defined: self.holes().collect::<Vec<_>>().join(", "),
            })?;
            plugged.insert(index, text.as_str());
        }
        if !remaining.is_empty() {
            return Err(EmitError::UnfilledHoles {
                template: self.name.clone(),
                holes: remaining.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }

        let mut out = String::new();
        out.push_str(GENERATED_BANNER);
        out.push('\n');
        for (index, line) in self.lines.iter().enumerate() {
            match plugged.get(&index) {
                Some(text) => out.push_str(text),
                None => out.push_str(line),
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn hole_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("$$")?.strip_suffix("$$")?;
    if inner.is_empty() {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TEMPLATE: &str = "#include <stdio.h>\n$$TOKENS$$\nint x;\n  $$VALUES$$\n";

    #[test]
    fn finds_holes() {
        let t = TemplateFile::parse("parser.template.h", TEMPLATE).unwrap();
        assert_eq!(t.holes().collect::<Vec<_>>(), vec!["TOKENS", "VALUES"]);
    }

    #[test]
    fn renders_in_line_order() {
        let t = TemplateFile::parse("parser.template.h", TEMPLATE).unwrap();
        let out = t
            .render(&[("VALUES", "\tint num;".into()), ("TOKENS", "\tT_X = 0x102".into())])
            .unwrap();
        let expected = format!(
            "{GENERATED_BANNER}\n#include <stdio.h>\n\tT_X = 0x102\nint x;\n\tint num;\n"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn rejects_duplicate_hole() {
        let err = TemplateFile::parse("t", "$$A$$\n$$A$$\n").unwrap_err();
        assert!(matches!(err, EmitError::DuplicateHole { .. }));
    }

    #[test]
    fn rejects_holeless_template() {
        let err = TemplateFile::parse("t", "int x;\n").unwrap_err();
        assert!(matches!(err, EmitError::NoHoles { .. }));
    }

    #[rstest]
    #[case::unknown(&[("A", ""), ("B", "")])]
    #[case::unfilled(&[])]
    fn rejects_bad_fill_sets(#[case] fills: &[(&str, &str)]) {
        let t = TemplateFile::parse("t", "$$A$$\n").unwrap();
        let fills: Vec<(&str, String)> =
            fills.iter().map(|(h, s)| (*h, (*s).to_owned())).collect();
        assert!(t.render(&fills).is_err());
    }
}
