//! Structure validation for hierarchy descriptions.
//!
//! Detects the defects that keep a parent → children mapping from being a tree:
//! - Missing or multiple roots
//! - Segments claimed by more than one parent
//! - Cycles and segments unreachable from the root
//! - Duplicate children and level names
//!
//! [`HierarchicalStructure::new`](super::HierarchicalStructure::new) refuses any
//! description whose report is not healthy.

use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A problem that makes the description unusable.
    Error,
    /// The description cannot be interpreted as a tree at all.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Segment involved, if any.
    pub segment: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            segment: None,
        }
    }

    /// Attach the offending segment.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(segment) = &self.segment {
            write!(f, " (segment '{}')", segment)?;
        }
        Ok(())
    }
}

/// Report from validating a hierarchy description.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Add an error-level issue.
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message));
    }

    /// Add a critical-level issue.
    pub fn critical(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Critical, message));
    }

    /// Check if the report contains no errors or critical issues.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// Most severe issue, first reported wins ties.
    pub fn worst(&self) -> Option<&ValidationIssue> {
        self.issues
            .iter()
            .rev()
            .max_by_key(|issue| issue.severity)
    }

    /// Issues of a specific severity or higher.
    pub fn issues_at_level(&self, min_severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= min_severity)
            .collect()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "validation passed: no issues found");
        }
        let parts: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Validate that a parent → children mapping and its level names form a tree.
///
/// Level-count consistency needs node depths and is checked by the structure
/// itself once the arena is built.
pub fn validate_level_structure(
    level_structure: &BTreeMap<String, Vec<String>>,
    level_names: &[String],
) -> ValidationReport {
    let mut report = ValidationReport::new();

    if level_names.is_empty() {
        report.error("level names are empty");
    }
    let mut seen_levels = HashSet::new();
    for name in level_names {
        if !seen_levels.insert(name.as_str()) {
            report.error(format!("duplicate level name '{name}'"));
        }
    }

    let mut parent_of: BTreeMap<&str, &str> = BTreeMap::new();
    for (parent, children) in level_structure {
        if children.is_empty() {
            report.add(
                ValidationIssue::new(Severity::Warning, "parent declares no children")
                    .with_segment(parent.as_str()),
            );
        }
        let mut seen_children = HashSet::new();
        for child in children {
            if !seen_children.insert(child.as_str()) {
                report.add(
                    ValidationIssue::new(
                        Severity::Error,
                        format!("child listed twice under '{parent}'"),
                    )
                    .with_segment(child.as_str()),
                );
                continue;
            }
            if let Some(previous) = parent_of.insert(child.as_str(), parent.as_str()) {
                report.add(
                    ValidationIssue::new(
                        Severity::Error,
                        format!("segment has multiple parents: '{previous}', '{parent}'"),
                    )
                    .with_segment(child.as_str()),
                );
            }
        }
    }

    let all_nodes: BTreeSet<&str> = level_structure
        .iter()
        .flat_map(|(parent, children)| {
            std::iter::once(parent.as_str()).chain(children.iter().map(String::as_str))
        })
        .collect();
    let roots: Vec<&str> = all_nodes
        .iter()
        .copied()
        .filter(|node| !parent_of.contains_key(node))
        .collect();

    if roots.is_empty() {
        if !all_nodes.is_empty() {
            report.critical("no root segment found - hierarchy has cycles");
        }
        return report;
    } else if roots.len() > 1 {
        report.error(format!("multiple roots found: {:?}", roots));
    }

    // Reachability from the root(s)
    let mut reachable = HashSet::new();
    let mut stack = roots.clone();
    while let Some(node) = stack.pop() {
        if reachable.insert(node) {
            if let Some(children) = level_structure.get(node) {
                stack.extend(children.iter().map(String::as_str));
            }
        }
    }

    let orphans: Vec<&str> = all_nodes
        .iter()
        .copied()
        .filter(|node| !reachable.contains(node))
        .collect();
    if !orphans.is_empty() {
        report.error(format!(
            "{} segments not reachable from root, first few: {:?}",
            orphans.len(),
            &orphans[..orphans.len().min(5)]
        ));
    }

    fn detect_cycle<'a>(
        node: &'a str,
        level_structure: &'a BTreeMap<String, Vec<String>>,
        visited: &mut HashSet<&'a str>,
        in_stack: &mut HashSet<&'a str>,
    ) -> bool {
        if in_stack.contains(node) {
            return true;
        }
        if !visited.insert(node) {
            return false;
        }
        let _ = in_stack.insert(node);

        if let Some(children) = level_structure.get(node) {
            for child in children {
                if detect_cycle(child.as_str(), level_structure, visited, in_stack) {
                    return true;
                }
            }
        }

        let _ = in_stack.remove(node);
        false
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    for &root in &roots {
        if detect_cycle(root, level_structure, &mut visited, &mut in_stack) {
            report.critical("cycle detected in hierarchy structure");
            break;
        }
    }

    report
}
