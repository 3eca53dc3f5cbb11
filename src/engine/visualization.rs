//! Mermaid diagram helpers for compiled graphs
//!
//! The main entry point is `CompiledGraph::to_mermaid` (see
//! `workflow/compiled.rs`); this module only knows how to render single
//! nodes and edges.
//!
//! # Node Shapes
//!
//! | NodeKind       | Shape             | Mermaid Syntax  |
//! |----------------|-------------------|-----------------|
//! | SchemaTrigger  | Cylinder          | `id[(label)]`   |
//! | SqlGenerate    | Rectangle         | `id[label]`     |
//! | SqlExecute     | Subroutine        | `id[[label]]`   |
//! | Approval       | Hexagon           | `id{{label}}`   |
//! | Condition      | Diamond           | `id{label}`     |
//! | PassThrough    | Rounded Rectangle | `id(label)`     |
//! | Initial        | Rounded Rectangle | `id(label)`     |
//! | START/END      | Stadium           | `id([label])`   |

use super::vertex::VertexId;
use crate::workflow::node::NodeKind;

// ============================================================================
// ID Sanitization
// ============================================================================

/// Sanitize a vertex ID for use as a Mermaid node identifier.
///
/// Mermaid node IDs must be alphanumeric (plus underscores).
/// This function replaces any invalid characters with underscores.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

// ============================================================================
// Node Rendering
// ============================================================================

/// Render a node with the shape for its kind. `None` renders a stadium,
/// used for the START and END markers.
pub fn render_node(id: &VertexId, kind: Option<NodeKind>) -> String {
    let safe_id = sanitize_id(id.as_str());
    let label = id.as_str();

    match kind {
        Some(NodeKind::SchemaTrigger) => format!("    {}[({})]", safe_id, label),
        Some(NodeKind::SqlGenerate) => format!("    {}[{}]", safe_id, label),
        Some(NodeKind::SqlExecute) => format!("    {}[[{}]]", safe_id, label),
        Some(NodeKind::Approval) => format!("    {}{{{{{}}}}}", safe_id, label),
        Some(NodeKind::Condition) => format!("    {}{{{}}}", safe_id, label),
        Some(NodeKind::PassThrough) | Some(NodeKind::Initial) => {
            format!("    {}({})", safe_id, label)
        }
        None => format!("    {}([{}])", safe_id, label),
    }
}

/// Render a node with a CSS class, e.g. to mark where a run is suspended.
pub fn render_node_with_class(id: &VertexId, kind: Option<NodeKind>, class: &str) -> String {
    format!("{}:::{}", render_node(id, kind), class)
}

// ============================================================================
// Edge Rendering
// ============================================================================

/// Render an edge between two vertices.
///
/// - Unconditional edges: solid arrow `-->`
/// - Conditional edges: dotted arrow with label `-. "label" .->`
pub fn render_edge(from: &VertexId, to: &VertexId, condition: Option<&str>) -> String {
    let from_safe = sanitize_id(from.as_str());
    let to_safe = sanitize_id(to.as_str());

    match condition {
        Some(label) => format!(
            "    {} -. \"{}\" .-> {}",
            from_safe,
            label.replace('"', "'"),
            to_safe
        ),
        None => format!("    {} --> {}", from_safe, to_safe),
    }
}

// ============================================================================
// Style Definitions
// ============================================================================

/// CSS class definitions used by highlighted diagrams.
pub const STYLE_DEFS: &str = r#"
    classDef suspended fill:#FFE4B5,stroke:#FF8C00,stroke-width:2px
    classDef entry fill:#90EE90,stroke:#228B22,stroke-width:1px
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("simple"), "simple");
        assert_eq!(sanitize_id("should_continue"), "should_continue");
        assert_eq!(sanitize_id("sql-generate"), "sql_generate");
        assert_eq!(sanitize_id("with.dot"), "with_dot");
        assert_eq!(sanitize_id("a/b c"), "a_b_c");
    }

    #[test]
    fn test_render_edges() {
        let from = VertexId::new("should_continue");
        let to = VertexId::new("approval");
        assert_eq!(render_edge(&from, &to, None), "    should_continue --> approval");
        assert_eq!(
            render_edge(&from, &to, Some("yes")),
            "    should_continue -. \"yes\" .-> approval"
        );
        assert_eq!(
            render_edge(&from, &to, Some("status eq \"ok\"")),
            "    should_continue -. \"status eq 'ok'\" .-> approval"
        );
    }

    #[test]
    fn test_render_node_shapes() {
        let id = VertexId::new("n");
        assert_eq!(render_node(&id, Some(NodeKind::SchemaTrigger)), "    n[(n)]");
        assert_eq!(render_node(&id, Some(NodeKind::SqlGenerate)), "    n[n]");
        assert_eq!(render_node(&id, Some(NodeKind::SqlExecute)), "    n[[n]]");
        assert_eq!(render_node(&id, Some(NodeKind::Approval)), "    n{{n}}");
        assert_eq!(render_node(&id, Some(NodeKind::Condition)), "    n{n}");
        assert_eq!(render_node(&id, Some(NodeKind::PassThrough)), "    n(n)");
        assert_eq!(render_node(&id, None), "    n([n])");
    }

    #[test]
    fn test_render_node_with_class() {
        let id = VertexId::new("approval");
        assert_eq!(
            render_node_with_class(&id, Some(NodeKind::Approval), "suspended"),
            "    approval{{approval}}:::suspended"
        );
    }
}
