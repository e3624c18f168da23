//! Output adapters: DOT and plain-text renderers

pub mod dot;
pub mod text_dump;

use crate::features::points_to::infrastructure::flow_insensitive::FlowInsensitiveResult;
use crate::features::points_to::infrastructure::flow_sensitive::FlowSensitiveResult;

/// Solved memory data handed to the dumpers
pub enum PointsToData<'a> {
    None,
    FlowInsensitive(&'a FlowInsensitiveResult),
    FlowSensitive(&'a FlowSensitiveResult),
}

/// Crop long labels and escape double quotes
pub(crate) fn crop_label(label: &str) -> String {
    let mut out = String::new();
    for (i, c) in label.chars().enumerate() {
        if i >= 70 {
            out.push_str(" ...");
            break;
        }
        if c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_labels_are_cropped() {
        let long = "x".repeat(100);
        let cropped = crop_label(&long);
        assert!(cropped.ends_with(" ..."));
        assert_eq!(cropped.len(), 74);
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(crop_label(r#"say "hi""#), r#"say \"hi\""#);
    }
}
