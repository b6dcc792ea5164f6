//! Backtracking matcher
//!
//! Matching walks the element tree depth-first with an explicit
//! continuation of the elements that follow the current group. Placeholders
//! only yield split points; every complete split is handed to a sink which
//! decides whether it is acceptable (typically by parsing the placeholder
//! texts). Rejecting a split resumes backtracking.

use super::{Element, Pattern};

/// Outcome of a successful structural match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchState {
    /// OR of the marks of all matched alternatives
    pub mark: i32,
    /// Byte span of each placeholder; `None` if it sits in a skipped group
    pub spans: Vec<Option<(usize, usize)>>,
    /// Byte span of each regex group
    pub regexes: Vec<Option<(usize, usize)>>,
}

impl MatchState {
    /// Text of placeholder `index`
    pub fn span<'t>(&self, input: &'t str, index: usize) -> Option<&'t str> {
        self.spans
            .get(index)
            .copied()
            .flatten()
            .map(|(start, end)| &input[start..end])
    }

    /// Texts of the matched regex groups, in pattern order
    pub fn regex_texts(&self, input: &str) -> Vec<String> {
        self.regexes
            .iter()
            .flatten()
            .map(|&(start, end)| input[start..end].to_string())
            .collect()
    }
}

impl Pattern {
    /// Offer every structural match of `input` to `sink` until it accepts one.
    ///
    /// Returns whether a match was accepted.
    pub fn match_with(&self, input: &str, sink: &mut dyn FnMut(&MatchState) -> bool) -> bool {
        let mut matcher = Matcher {
            pattern: self,
            input,
            state: MatchState {
                mark: 0,
                spans: vec![None; self.placeholders.len()],
                regexes: vec![None; self.regexes.len()],
            },
            sink,
        };
        matcher.sequence(&self.elements, 0, None)
    }

    /// First structural match of `input`
    pub fn matches(&self, input: &str) -> Option<MatchState> {
        let mut found = None;
        self.match_with(input, &mut |state: &MatchState| {
            found = Some(state.clone());
            true
        });
        found
    }
}

/// Elements still to be matched once the current sequence is exhausted
struct Cont<'p, 'c> {
    elements: &'p [Element],
    next: Option<&'c Cont<'p, 'c>>,
}

struct Matcher<'p, 's> {
    pattern: &'p Pattern,
    input: &'p str,
    state: MatchState,
    sink: &'s mut dyn FnMut(&MatchState) -> bool,
}

impl<'p, 's> Matcher<'p, 's> {
    fn sequence(&mut self, elements: &'p [Element], pos: usize, cont: Option<&Cont<'p, '_>>) -> bool {
        let Some((first, rest)) = elements.split_first() else {
            return match cont {
                Some(cont) => self.sequence(cont.elements, pos, cont.next),
                None => pos == self.input.len() && (self.sink)(&self.state),
            };
        };

        match first {
            Element::Literal(literal) => match self.literal_end(pos, literal) {
                Some(end) => self.sequence(rest, end, cont),
                None => false,
            },

            Element::Space => {
                let tail = &self.input[pos..];
                let run = tail
                    .char_indices()
                    .find(|(_, c)| !c.is_whitespace())
                    .map_or(tail.len(), |(i, _)| i);
                if run > 0 {
                    self.sequence(rest, pos + run, cont)
                } else if pos == 0 || pos == self.input.len() || self.input[..pos].ends_with(char::is_whitespace) {
                    // Neighbouring optional groups were skipped
                    self.sequence(rest, pos, cont)
                } else {
                    false
                }
            }

            Element::Group { alternatives, optional } => {
                let after = Cont { elements: rest, next: cont };
                for alternative in alternatives {
                    let saved = self.state.mark;
                    self.state.mark |= alternative.mark;
                    if self.sequence(&alternative.elements, pos, Some(&after)) {
                        return true;
                    }
                    self.state.mark = saved;
                }
                *optional && self.sequence(rest, pos, cont)
            }

            Element::Placeholder(index) => {
                let mut ends = self.placeholder_ends(pos);
                if self.pattern.placeholders[*index].greedy {
                    ends.reverse();
                }
                for end in ends {
                    self.state.spans[*index] = Some((pos, end));
                    if self.sequence(rest, end, cont) {
                        return true;
                    }
                }
                self.state.spans[*index] = None;
                false
            }

            Element::Regex(index) => {
                let regex = &self.pattern.regexes[*index];
                let ends: Vec<usize> = self.input[pos..]
                    .char_indices()
                    .map(|(i, c)| pos + i + c.len_utf8())
                    .filter(|&end| regex.is_match(&self.input[pos..end]))
                    .collect();
                for end in ends {
                    self.state.regexes[*index] = Some((pos, end));
                    if self.sequence(rest, end, cont) {
                        return true;
                    }
                }
                self.state.regexes[*index] = None;
                false
            }
        }
    }

    fn literal_end(&self, pos: usize, literal: &str) -> Option<usize> {
        let tail = &self.input[pos..];
        let mut chars = tail.char_indices();
        for expected in literal.chars() {
            let (_, c) = chars.next()?;
            if !chars_eq(c, expected) {
                return None;
            }
        }
        Some(chars.next().map_or(self.input.len(), |(i, _)| pos + i))
    }

    /// Candidate end positions for a placeholder starting at `pos`, shortest
    /// first. A span never starts or ends with whitespace and never cuts
    /// through quotes, parentheses or braces.
    fn placeholder_ends(&self, pos: usize) -> Vec<usize> {
        let tail = &self.input[pos..];
        if tail.is_empty() || tail.starts_with(char::is_whitespace) {
            return Vec::new();
        }

        let mut ends = Vec::new();
        let mut depth = 0i32;
        let mut in_quote = false;
        for (i, c) in tail.char_indices() {
            if in_quote {
                in_quote = c != '"';
            } else {
                match c {
                    '"' => in_quote = true,
                    '(' | '{' => depth += 1,
                    ')' | '}' => {
                        depth -= 1;
                        if depth < 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if !in_quote && depth == 0 && !c.is_whitespace() {
                ends.push(pos + i + c.len_utf8());
            }
        }
        ends
    }
}

fn chars_eq(actual: char, expected: char) -> bool {
    actual == expected || actual.to_lowercase().eq(expected.to_lowercase())
}
