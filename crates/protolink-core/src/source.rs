//! Source locations and comments attached to declarations.

use prost_types::source_code_info::Location;
use prost_types::SourceCodeInfo;
use std::collections::HashMap;

/// Where a descriptor was declared and the comments around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Zero-based line the declaration starts on
    pub start_line: i32,
    /// Zero-based column the declaration starts at
    pub start_column: i32,
    /// Zero-based line the declaration ends on
    pub end_line: i32,
    /// Zero-based column just past the end of the declaration
    pub end_column: i32,
    /// Comment directly above the declaration
    pub leading_comments: String,
    /// Comment directly after the declaration
    pub trailing_comments: String,
    /// Detached comment blocks above the leading comment
    pub leading_detached_comments: Vec<String>,
}

impl Declaration {
    fn from_location(location: &Location) -> Option<Self> {
        // span is [start_line, start_column, end_column] when the
        // declaration fits on one line, otherwise four elements.
        let (start_line, start_column, end_line, end_column) = match location.span.as_slice() {
            &[line, start, end] => (line, start, line, end),
            &[start_line, start_column, end_line, end_column] => {
                (start_line, start_column, end_line, end_column)
            }
            _ => return None,
        };

        Some(Self {
            start_line,
            start_column,
            end_line,
            end_column,
            leading_comments: location.leading_comments().to_string(),
            trailing_comments: location.trailing_comments().to_string(),
            leading_detached_comments: location.leading_detached_comments.clone(),
        })
    }
}

/// Map declaration paths to their source info.
///
/// Only complete declarations are kept: paths with an even, non-empty length.
pub(crate) fn declarations(info: Option<&SourceCodeInfo>) -> HashMap<Vec<i32>, Declaration> {
    let Some(info) = info else {
        return HashMap::new();
    };

    info.location
        .iter()
        .filter(|location| !location.path.is_empty() && location.path.len() % 2 == 0)
        .filter_map(|location| {
            Declaration::from_location(location).map(|decl| (location.path.clone(), decl))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_element_span() {
        let info = SourceCodeInfo {
            location: vec![Location {
                path: vec![4, 0],
                span: vec![3, 0, 12],
                leading_comments: Some(" A message.\n".into()),
                trailing_comments: None,
                leading_detached_comments: vec![],
            }],
        };
        let map = declarations(Some(&info));
        let decl = &map[&vec![4, 0]];
        assert_eq!(decl.start_line, 3);
        assert_eq!(decl.end_line, 3);
        assert_eq!(decl.end_column, 12);
        assert_eq!(decl.leading_comments, " A message.\n");
    }

    #[test]
    fn test_odd_paths_ignored() {
        let info = SourceCodeInfo {
            location: vec![
                Location {
                    path: vec![4],
                    span: vec![0, 0, 1],
                    ..Default::default()
                },
                Location {
                    path: vec![],
                    span: vec![0, 0, 1],
                    ..Default::default()
                },
            ],
        };
        assert!(declarations(Some(&info)).is_empty());
        assert!(declarations(None).is_empty());
    }
}
