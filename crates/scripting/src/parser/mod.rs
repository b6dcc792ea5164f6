//! Expression and statement parser
//!
//! Statements (conditions, effects) and event headers are first-match: the
//! first registered element whose pattern matches and whose `init` accepts
//! the result wins. Expressions are chosen by priority bucket: every
//! candidate of a bucket is tried and the first success in registration
//! order is taken before any lower bucket is consulted.
//!
//! Failed attempts never abort parsing. Their errors collect in log frames
//! and only the most specific one is reported if nothing matches.

pub mod split;

use crate::event::EventClass;
use crate::expr::{convert_expression, EventValueExpression, ExpressionList, SimpleLiteral, VariableString};
use crate::kleenean::Kleenean;
use crate::log::{ErrorQuality, LogStack};
use crate::pattern::{MatchState, Pattern, Placeholder};
use crate::registry::{EventFactory, ExpressionInfo, ExpressionPriority, Registry, StatementFactory};
use crate::syntax::{Condition, Expression, ParseResult, Statement, TriggerEvent};
use crate::trigger::ItemId;
use crate::value::type_names;
use std::sync::Arc;
use trellis_core::SourceLocation;

/// Expressions may not nest deeper than this
const MAX_DEPTH: usize = 64;

/// A loop enclosing the line being parsed
#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub id: ItemId,
    pub return_type: String,
}

/// A parsed event header
#[derive(Debug)]
pub struct ParsedEvent {
    pub event: TriggerEvent,
    pub classes: Vec<&'static EventClass>,
    pub name: String,
}

/// Parser state for one script
pub struct ParserState {
    registry: Arc<Registry>,
    log: LogStack,
    events: Vec<&'static EventClass>,
    delay: Kleenean,
    loops: Vec<LoopInfo>,
    warn_missing_and: bool,
    depth: usize,
}

impl ParserState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            log: LogStack::new(),
            events: Vec::new(),
            delay: Kleenean::False,
            loops: Vec::new(),
            warn_missing_and: true,
            depth: 0,
        }
    }

    pub fn with_warn_missing_and(mut self, warn: bool) -> Self {
        self.warn_missing_and = warn;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ========== Logging ==========

    pub fn log(&self) -> &LogStack {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut LogStack {
        &mut self.log
    }

    pub fn error(&mut self, message: impl Into<String>, quality: ErrorQuality) {
        self.log.error(message, quality);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log.warning(message);
    }

    pub fn set_location(&mut self, script: &str, line: usize) {
        self.log.set_location(Some(SourceLocation::new(script, line)));
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.log.location()
    }

    // ========== Trigger state ==========

    /// Event classes of the trigger being parsed
    pub fn current_events(&self) -> &[&'static EventClass] {
        &self.events
    }

    pub fn set_current_events(&mut self, events: Vec<&'static EventClass>) {
        self.events = events;
    }

    /// Whether a delay may have happened before the line being parsed
    pub fn has_delay_before(&self) -> Kleenean {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Kleenean) {
        self.delay = delay;
    }

    /// Enclosing loops, innermost last
    pub fn loops(&self) -> &[LoopInfo] {
        &self.loops
    }

    pub fn push_loop(&mut self, info: LoopInfo) {
        self.loops.push(info);
    }

    pub fn pop_loop(&mut self) -> Option<LoopInfo> {
        self.loops.pop()
    }

    /// Reset per-trigger state
    pub fn start_trigger(&mut self, events: Vec<&'static EventClass>) {
        self.events = events;
        self.delay = Kleenean::False;
        self.loops.clear();
    }

    // ========== Expressions ==========

    /// Parse an expression for a placeholder
    pub fn parse_expression(&mut self, text: &str, slot: &Placeholder) -> Option<Box<dyn Expression>> {
        let text = text.trim();
        if text.is_empty() {
            self.error("Empty expression", ErrorQuality::NotAnExpression);
            return None;
        }
        if self.depth >= MAX_DEPTH {
            self.error(format!("'{}' is nested too deeply", text), ErrorQuality::SemanticError);
            return None;
        }

        self.depth += 1;
        let parsed = self.parse_expression_inner(text, slot);
        self.depth -= 1;

        let expr = parsed?;
        if slot.single && !expr.is_single() {
            let types = self.registry.types().describe_types(&slot.type_refs());
            self.error(
                format!("'{}' can only be a single value, i.e. {}, not more", text, types),
                ErrorQuality::SemanticError,
            );
            return None;
        }
        Some(expr)
    }

    fn parse_expression_inner(&mut self, text: &str, slot: &Placeholder) -> Option<Box<dyn Expression>> {
        if let Some(inner) = split::strip_parens(text) {
            return self.parse_expression(inner, slot);
        }

        let frame = self.log.open();
        if let Some(expr) = self.parse_single(text, slot) {
            self.log.close_success(frame);
            return Some(expr);
        }

        let list = match split::split_list(text) {
            Some(list) if list.items.len() > 1 => list,
            _ => {
                self.log.close_with_best_error(frame, None);
                return None;
            }
        };
        if list.is_mixed() {
            self.error(
                format!("'{}' mixes 'and' and 'or'; use parentheses to group the list", text),
                ErrorQuality::SemanticError,
            );
            self.log.close_with_best_error(frame, None);
            return None;
        }

        let item_slot = Placeholder {
            single: false,
            ..slot.clone()
        };
        let mut items = Vec::with_capacity(list.items.len());
        for item_text in &list.items {
            let item = match split::strip_parens(item_text) {
                Some(inner) => self.parse_expression(inner, &item_slot),
                None => self.parse_single(item_text, &item_slot),
            };
            match item {
                Some(item) => items.push(item),
                None => {
                    self.log.close_with_best_error(frame, None);
                    return None;
                }
            }
        }

        if list.is_comma_only() && self.warn_missing_and {
            self.warning(format!("List is missing 'and' or 'or', defaulting to 'and': {}", text));
        }
        self.log.close_success(frame);

        let registry = Arc::clone(&self.registry);
        let mut return_type = items[0].return_type().to_string();
        for item in &items[1..] {
            return_type = registry.types().common_supertype(&return_type, item.return_type()).to_string();
        }
        Some(Box::new(ExpressionList::new(items, list.is_and(), &return_type)))
    }

    /// Parse one value: a quoted string, a number, a registered expression
    /// or a literal of an accepted type
    fn parse_single(&mut self, text: &str, slot: &Placeholder) -> Option<Box<dyn Expression>> {
        let registry = Arc::clone(&self.registry);

        if let Some(content) = split::unquote(text) {
            let string = VariableString::parse(content, self)?;
            return self.accept(Box::new(string), text, slot);
        }

        if slot.literal_only {
            return self.parse_literal(text, slot);
        }

        if split::is_plain_number(text) && registry.acceptance(type_names::NUMBER, &slot.types).is_some() {
            if let Some(value) = registry.types().parse_literal(type_names::NUMBER, text) {
                return self.accept(Box::new(SimpleLiteral::new(value, type_names::NUMBER)), text, slot);
            }
        }

        for priority in ExpressionPriority::ALL {
            let mut chosen: Option<(Box<dyn Expression>, &str)> = None;
            for info in registry.expressions_in(priority) {
                if registry.acceptance(&info.return_type, &slot.types).is_none() {
                    continue;
                }
                let Some(expr) = self.try_expression(info, text) else {
                    continue;
                };
                let Some(expr) = convert_expression(expr, &slot.types, &registry) else {
                    continue;
                };
                if let Some((_, first)) = chosen.as_ref() {
                    tracing::debug!(
                        "'{}' also matches '{}'; keeping '{}' (registered first)",
                        text,
                        info.name,
                        first
                    );
                    continue;
                }
                chosen = Some((expr, &info.name));
            }
            if let Some((expr, _)) = chosen {
                return Some(expr);
            }
        }

        self.parse_literal(text, slot)
    }

    fn try_expression(&mut self, info: &ExpressionInfo, text: &str) -> Option<Box<dyn Expression>> {
        for (index, pattern) in info.patterns.iter().enumerate() {
            let Some(result) = self.match_pattern(pattern, index, text) else {
                continue;
            };
            let mut expr = (info.factory)();
            if expr.init(result, self) {
                return Some(expr);
            }
        }
        None
    }

    /// Literal of one of the accepted types
    fn parse_literal(&mut self, text: &str, slot: &Placeholder) -> Option<Box<dyn Expression>> {
        let registry = Arc::clone(&self.registry);
        for type_name in &slot.types {
            if let Some(value) = registry.types().parse_literal(type_name, text) {
                let return_type = value.type_name().to_string();
                return Some(Box::new(SimpleLiteral::new(value, &return_type)));
            }
        }
        let types = registry.types().describe_types(&slot.type_refs());
        self.error(format!("'{}' is not {}", text, types), ErrorQuality::NotAnExpression);
        None
    }

    /// Check or convert a parsed expression against the accepted types
    fn accept(&mut self, expr: Box<dyn Expression>, text: &str, slot: &Placeholder) -> Option<Box<dyn Expression>> {
        let registry = Arc::clone(&self.registry);
        let converted = convert_expression(expr, &slot.types, &registry);
        if converted.is_none() {
            let types = registry.types().describe_types(&slot.type_refs());
            self.error(format!("{} is not {}", text, types), ErrorQuality::SemanticError);
        }
        converted
    }

    // ========== Patterns ==========

    /// Match `text` against `pattern`, parsing every placeholder; splits
    /// whose placeholders fail to parse are backtracked over
    pub fn match_pattern(&mut self, pattern: &Pattern, index: usize, text: &str) -> Option<ParseResult> {
        let mut result = None;
        pattern.match_with(text, &mut |state: &MatchState| match self.parse_placeholders(pattern, text, state) {
            Some(expressions) => {
                result = Some(ParseResult {
                    matched_pattern: index,
                    mark: state.mark,
                    expressions,
                    regexes: state.regex_texts(text),
                    text: text.to_string(),
                });
                true
            }
            None => false,
        });
        result
    }

    fn parse_placeholders(
        &mut self,
        pattern: &Pattern,
        text: &str,
        state: &MatchState,
    ) -> Option<Vec<Option<Box<dyn Expression>>>> {
        let mut expressions = Vec::with_capacity(pattern.placeholders().len());
        for (index, slot) in pattern.placeholders().iter().enumerate() {
            match state.span(text, index) {
                Some(sub) => expressions.push(Some(self.parse_expression(sub, slot)?)),
                None => expressions.push(self.default_expression(slot)),
            }
        }
        Some(expressions)
    }

    /// Value of an omitted placeholder
    fn default_expression(&mut self, slot: &Placeholder) -> Option<Box<dyn Expression>> {
        if slot.nullable {
            return None;
        }
        let registry = Arc::clone(&self.registry);
        slot.types
            .iter()
            .filter(|t| registry.types().get(t).is_some_and(|info| info.has_event_default()))
            .find_map(|t| EventValueExpression::for_type(t, self))
            .map(|expr| Box::new(expr) as Box<dyn Expression>)
    }

    // ========== Statements ==========

    /// Parse a condition or effect line
    pub fn parse_statement(&mut self, text: &str) -> Option<Statement> {
        self.parse_statement_of(text, false)
    }

    /// Parse a line that must be a condition
    pub fn parse_condition(&mut self, text: &str) -> Option<Box<dyn Condition>> {
        match self.parse_statement_of(text, true)? {
            Statement::Condition(condition) => Some(condition),
            Statement::Effect(_) => None,
        }
    }

    fn parse_statement_of(&mut self, text: &str, conditions_only: bool) -> Option<Statement> {
        let text = text.trim();
        let registry = Arc::clone(&self.registry);
        let frame = self.log.open();

        for info in registry.statements() {
            if conditions_only && !info.is_condition() {
                continue;
            }
            for (index, pattern) in info.patterns.iter().enumerate() {
                let Some(result) = self.match_pattern(pattern, index, text) else {
                    continue;
                };
                let statement = match info.factory {
                    StatementFactory::Condition(factory) => {
                        let mut condition = factory();
                        condition.init(result, self).then(|| Statement::Condition(condition))
                    }
                    StatementFactory::Effect(factory) => {
                        let mut effect = factory();
                        effect.init(result, self).then(|| Statement::Effect(effect))
                    }
                };
                if let Some(statement) = statement {
                    tracing::trace!("'{}' parsed as {}", text, info.name);
                    self.log.close_success(frame);
                    return Some(statement);
                }
            }
        }

        let default = if conditions_only {
            format!("Can't understand this condition: '{}'", text)
        } else {
            format!("Can't understand this condition/effect: '{}'", text)
        };
        self.log.close_with_best_error(frame, Some((default.as_str(), ErrorQuality::None)));
        None
    }

    // ========== Events ==========

    /// Parse a trigger header such as `on script load` (the `on` is optional)
    pub fn parse_event(&mut self, text: &str) -> Option<ParsedEvent> {
        let trimmed = text.trim();
        let text = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("on ") => trimmed[3..].trim_start(),
            _ => trimmed,
        };
        let registry = Arc::clone(&self.registry);
        let frame = self.log.open();

        for info in registry.events() {
            // Placeholders in the header may refer to the event's values
            let previous = std::mem::replace(&mut self.events, info.classes.clone());
            for (index, pattern) in info.patterns.iter().enumerate() {
                let Some(result) = self.match_pattern(pattern, index, text) else {
                    continue;
                };
                let event = match info.factory {
                    EventFactory::Checked(factory) => {
                        let mut event = factory();
                        event.init(result, self).then(|| TriggerEvent::Checked(event))
                    }
                    EventFactory::SelfRegistering(factory) => {
                        let mut event = factory();
                        event.init(result, self).then(|| TriggerEvent::SelfRegistering(event))
                    }
                };
                if let Some(event) = event {
                    self.events = previous;
                    self.log.close_success(frame);
                    return Some(ParsedEvent {
                        event,
                        classes: info.classes.clone(),
                        name: info.name.clone(),
                    });
                }
            }
            self.events = previous;
        }

        let default = format!("Can't understand this event: '{}'", text);
        self.log.close_with_best_error(frame, Some((default.as_str(), ErrorQuality::None)));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::context::TriggerContext;
    use crate::error::Result;
    use crate::registry::RegistryBuilder;
    use crate::syntax::{Effect, SyntaxElement};
    use crate::types::ClassInfo;
    use crate::value::{HostObject, Value};

    /// An expression that only reports which registration produced it
    #[derive(Debug)]
    struct Tagged(&'static str);

    impl SyntaxElement for Tagged {
        fn init(&mut self, _result: ParseResult, _state: &mut ParserState) -> bool {
            true
        }

        fn describe(&self, _debug: bool) -> String {
            self.0.to_string()
        }
    }

    impl Expression for Tagged {
        fn return_type(&self) -> &str {
            "itemstack"
        }

        fn is_single(&self) -> bool {
            true
        }

        fn get_all(&self, _ctx: &mut TriggerContext) -> Result<Vec<Value>> {
            Ok(vec![Value::from(self.0)])
        }
    }

    fn parse_stack(text: &str) -> Option<Value> {
        let count = text.trim().parse::<u32>().ok()?;
        Some(Value::Object(HostObject::new("itemstack", &format!("{} stone", count))))
    }

    fn registry(register: impl FnOnce(&mut RegistryBuilder)) -> Arc<Registry> {
        let mut builder = RegistryBuilder::new();
        builtins::register_all(&mut builder).unwrap();
        builder
            .register_type(ClassInfo::new("itemstack", "item stack¦s").parser(parse_stack))
            .unwrap();
        register(&mut builder);
        builder.close().unwrap()
    }

    fn parse_described(registry: Arc<Registry>, text: &str) -> Option<String> {
        let mut state = ParserState::new(registry);
        state
            .parse_expression(text, &Placeholder::of(&["itemstack"]))
            .map(|expr| expr.describe(false))
    }

    #[test]
    fn test_pattern_bucket_beats_literal_fallback() {
        let registry = registry(|builder| {
            builder.register_expression(
                "apples",
                || Box::new(Tagged("apples")),
                "itemstack",
                ExpressionPriority::Pattern,
                &["%number% apples"],
            );
        });
        assert_eq!(parse_described(Arc::clone(&registry), "5 apples").as_deref(), Some("apples"));
        // A bare number still falls through to the type's literal parser
        let mut state = ParserState::new(registry);
        let literal = state.parse_expression("5", &Placeholder::of(&["itemstack"])).unwrap();
        assert_eq!(
            literal.literal_values(),
            Some(vec![Value::Object(HostObject::new("itemstack", "5 stone"))])
        );
    }

    #[test]
    fn test_higher_bucket_wins_regardless_of_registration_order() {
        let registry = registry(|builder| {
            builder.register_expression(
                "combined",
                || Box::new(Tagged("combined")),
                "itemstack",
                ExpressionPriority::Combined,
                &["stack of <.+>"],
            );
            builder.register_expression(
                "pattern",
                || Box::new(Tagged("pattern")),
                "itemstack",
                ExpressionPriority::Pattern,
                &["stack of <.+>"],
            );
            builder.register_expression(
                "simple",
                || Box::new(Tagged("simple")),
                "itemstack",
                ExpressionPriority::Simple,
                &["stack of <.+>"],
            );
        });
        assert_eq!(parse_described(registry, "stack of dirt").as_deref(), Some("simple"));
    }

    #[test]
    fn test_first_registration_wins_within_a_bucket() {
        let registry = registry(|builder| {
            builder.register_expression(
                "first",
                || Box::new(Tagged("first")),
                "itemstack",
                ExpressionPriority::Pattern,
                &["stack of <.+>"],
            );
            builder.register_expression(
                "second",
                || Box::new(Tagged("second")),
                "itemstack",
                ExpressionPriority::Pattern,
                &["[a] stack of <.+>"],
            );
        });
        assert_eq!(parse_described(registry, "stack of dirt").as_deref(), Some("first"));
    }

    #[test]
    fn test_list_errors() {
        let mut state = ParserState::new(registry(|_| {}));
        assert!(state.parse_expression("1, 2 and 3 or 4", &Placeholder::of(&["number"])).is_none());
        assert!(state.log().emitted().iter().any(|e| e.message.contains("mixes 'and' and 'or'")));

        let list = state.parse_expression("1, 2, 3", &Placeholder::of(&["number"])).unwrap();
        assert!(list.and());
        assert!(state.log().emitted().iter().any(|e| e.message.contains("missing 'and'")));

        assert!(state.parse_expression("1 and 2", &Placeholder::single(&["number"])).is_none());
        assert!(state.log().emitted().iter().any(|e| e.message.contains("can only be a single value")));
    }

    #[test]
    fn test_nesting_limit() {
        let mut state = ParserState::new(registry(|_| {}));
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(state.parse_expression(&deep, &Placeholder::of(&["number"])).is_none());
        let shallow = format!("{}1{}", "(".repeat(3), ")".repeat(3));
        assert!(state.parse_expression(&shallow, &Placeholder::of(&["number"])).is_some());
    }

    /// Only known names parse. A lenient parser would accept "stone, dirt"
    /// as one item type, since a single value is tried before list splitting.
    fn parse_item_type(text: &str) -> Option<Value> {
        let name = text.trim().to_lowercase();
        ["stone", "dirt", "grass"]
            .contains(&name.as_str())
            .then(|| Value::Object(HostObject::new("itemtype", &name)))
    }

    #[derive(Debug, Default)]
    struct ItemDrop {
        items: Option<Box<dyn Expression>>,
    }

    impl SyntaxElement for ItemDrop {
        fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
            self.items = result.take(0);
            true
        }

        fn describe(&self, _debug: bool) -> String {
            match &self.items {
                None => "drop nothing".to_string(),
                Some(items) => format!(
                    "drop {} item type(s), {}",
                    items.literal_values().map_or(0, |values| values.len()),
                    if items.and() { "all of them" } else { "one of them" }
                ),
            }
        }
    }

    impl Effect for ItemDrop {
        fn execute(&self, _ctx: &mut TriggerContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_optional_list_placeholder_in_statement() {
        let registry = registry(|builder| {
            builder
                .register_type(ClassInfo::new("itemtype", "itemtype¦s").parser(parse_item_type))
                .unwrap();
            builder.register_effect(
                "drop",
                || Box::new(ItemDrop::default()),
                &["drop[ping] [[of] %itemtypes%]"],
            );
        });
        let mut state = ParserState::new(registry);
        let mut described = |text: &str| state.parse_statement(text).map(|statement| statement.describe(false));

        assert_eq!(described("drop").as_deref(), Some("drop nothing"));
        assert_eq!(described("dropping").as_deref(), Some("drop nothing"));
        assert_eq!(
            described("drop of stone, dirt").as_deref(),
            Some("drop 2 item type(s), all of them")
        );
        assert_eq!(
            described("dropping stone and grass").as_deref(),
            Some("drop 2 item type(s), all of them")
        );
    }

    #[test]
    fn test_unknown_statement_reports_default_error() {
        let mut state = ParserState::new(registry(|_| {}));
        assert!(state.parse_statement("make it rain").is_none());
        let emitted = state.log().emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].message, "Can't understand this condition/effect: 'make it rain'");
    }
}
