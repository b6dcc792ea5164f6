//! Section-node reader
//!
//! Splits script text into a tree of lines. A line ending in `:` opens a
//! section whose children are the following lines indented deeper than it;
//! every other line is an entry. `#` starts a comment and `##` stands for a
//! literal `#`.

/// One non-empty script line
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Line text without comment, indentation and trailing `:`
    pub key: String,
    /// 1-based line number
    pub line: usize,
    /// Child lines of a section; `None` for plain entries
    pub children: Option<Vec<Node>>,
}

impl Node {
    pub fn entry(key: impl Into<String>, line: usize) -> Self {
        Self {
            key: key.into(),
            line,
            children: None,
        }
    }

    pub fn section(key: impl Into<String>, line: usize, children: Vec<Node>) -> Self {
        Self {
            key: key.into(),
            line,
            children: Some(children),
        }
    }

    pub fn is_section(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or_default()
    }
}

/// A line the reader had to skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    pub line: usize,
    pub message: String,
}

struct Level {
    /// `None` until the first child of a section fixes it
    indent: Option<String>,
    key: String,
    line: usize,
    nodes: Vec<Node>,
}

impl Level {
    fn close(self) -> Node {
        Node::section(self.key, self.line, self.nodes)
    }
}

/// Read `source` into top-level nodes
pub fn read_nodes(source: &str) -> (Vec<Node>, Vec<NodeError>) {
    let mut errors = Vec::new();
    let mut stack = vec![Level {
        indent: Some(String::new()),
        key: String::new(),
        line: 0,
        nodes: Vec::new(),
    }];

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = strip_comment(raw);
        let content = text.trim();
        if content.is_empty() {
            continue;
        }
        let indent = &text[..text.len() - text.trim_start().len()];

        // First line after a section header decides its indentation
        if stack.last().is_some_and(|level| level.indent.is_none()) {
            let parent_indent = stack
                .len()
                .checked_sub(2)
                .and_then(|i| stack[i].indent.clone())
                .unwrap_or_default();
            if indent.len() > parent_indent.len() && indent.starts_with(&parent_indent) {
                if let Some(top) = stack.last_mut() {
                    top.indent = Some(indent.to_string());
                }
            } else {
                close_top(&mut stack);
            }
        }

        if !stack.iter().any(|level| level.indent.as_deref() == Some(indent)) {
            let expected = stack.last().and_then(|level| level.indent.as_deref()).unwrap_or("");
            errors.push(NodeError {
                line,
                message: format!(
                    "indentation error: expected {}, found {}",
                    describe_indent(expected),
                    describe_indent(indent)
                ),
            });
            continue;
        }
        while stack.last().is_some_and(|level| level.indent.as_deref() != Some(indent)) {
            close_top(&mut stack);
        }

        match content.strip_suffix(':') {
            Some(key) => stack.push(Level {
                indent: None,
                key: key.trim_end().to_string(),
                line,
                nodes: Vec::new(),
            }),
            None => {
                if let Some(top) = stack.last_mut() {
                    top.nodes.push(Node::entry(content, line));
                }
            }
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    let nodes = stack.pop().map(|root| root.nodes).unwrap_or_default();
    (nodes, errors)
}

fn close_top(stack: &mut Vec<Level>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(level) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.nodes.push(level.close());
        }
    }
}

/// Cut a `#` comment; `##` is kept as one `#`
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '#' {
            if chars.peek() == Some(&'#') {
                chars.next();
                out.push('#');
                continue;
            }
            break;
        }
        out.push(c);
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

fn describe_indent(indent: &str) -> String {
    if indent.is_empty() {
        return "no indentation".to_string();
    }
    let tabs = indent.chars().filter(|&c| c == '\t').count();
    let count = indent.chars().count();
    match tabs {
        0 => format!("{} space{}", count, if count == 1 { "" } else { "s" }),
        t if t == count => format!("{} tab{}", count, if count == 1 { "" } else { "s" }),
        _ => format!("{} mixed whitespace characters", count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_sections() {
        let source = "\
on load:
    if {x} is 1:
        broadcast \"one\"
    broadcast \"done\"
";
        let (nodes, errors) = read_nodes(source);
        assert!(errors.is_empty());
        assert_eq!(nodes.len(), 1);
        let trigger = &nodes[0];
        assert_eq!(trigger.key, "on load");
        assert_eq!(trigger.children().len(), 2);
        let conditional = &trigger.children()[0];
        assert!(conditional.is_section());
        assert_eq!(conditional.key, "if {x} is 1");
        assert_eq!(conditional.children(), &[Node::entry("broadcast \"one\"", 3)]);
        assert_eq!(trigger.children()[1], Node::entry("broadcast \"done\"", 4));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let source = "# header\n\non load: # trailing\n\tbroadcast \"##1\" # note\n";
        let (nodes, errors) = read_nodes(source);
        assert!(errors.is_empty());
        assert_eq!(nodes[0].key, "on load");
        assert_eq!(nodes[0].children(), &[Node::entry("broadcast \"#1\"", 4)]);
    }

    #[test]
    fn test_empty_section() {
        let (nodes, errors) = read_nodes("on load:\non join:\n  broadcast \"hi\"\n");
        assert!(errors.is_empty());
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].children, Some(Vec::new()));
        assert_eq!(nodes[1].children().len(), 1);
    }

    #[test]
    fn test_indentation_mismatch_skips_line() {
        let source = "on load:\n    broadcast \"a\"\n  broadcast \"b\"\n    broadcast \"c\"\n";
        let (nodes, errors) = read_nodes(source);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 3);
        assert_eq!(errors[0].message, "indentation error: expected 4 spaces, found 2 spaces");
        assert_eq!(nodes[0].children().len(), 2);
    }

    #[test]
    fn test_unexpected_top_level_indentation() {
        let (nodes, errors) = read_nodes("  broadcast \"x\"\non load:\n\tstop\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(nodes.len(), 1);
    }
}
