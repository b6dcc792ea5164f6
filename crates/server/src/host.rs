//! Demo host vocabulary
//!
//! A console "server" whose only players are names typed on stdin. It adds
//! a `player` type and an `on chat` event to the built-in vocabulary.

use std::sync::Arc;
use trellis_scripting::builtins;
use trellis_scripting::{
    CheckedEvent, ClassInfo, Event, EventClass, EventFactory, Host, HostObject, ParseResult, ParserState, Registry,
    RegistryBuilder, Result, SyntaxElement, Value,
};

pub const PLAYER: &str = "player";

/// A player said something. Lines come from the stdin thread, so chat
/// events arrive asynchronously and are handed to the tick thread.
pub static CHAT: EventClass = EventClass {
    name: "chat",
    parent: None,
    values: &[PLAYER, "text"],
    cancellable: true,
    requires_main_thread: true,
};

/// Broadcasts go to stdout
#[derive(Debug, Default)]
pub struct ConsoleHost;

impl Host for ConsoleHost {
    fn broadcast(&self, message: &str) {
        println!("[broadcast] {}", message);
    }
}

/// `on chat` / `on chat containing "text"`
#[derive(Debug, Default)]
struct OnChat {
    containing: Option<String>,
}

impl SyntaxElement for OnChat {
    fn init(&mut self, mut result: ParseResult, _state: &mut ParserState) -> bool {
        self.containing = result
            .take(0)
            .and_then(|expr| expr.literal_values())
            .and_then(|values| values.first().and_then(|v| v.as_text().map(str::to_lowercase)));
        true
    }

    fn describe(&self, _debug: bool) -> String {
        match &self.containing {
            Some(text) => format!("chat containing \"{}\"", text),
            None => "chat".to_string(),
        }
    }
}

impl CheckedEvent for OnChat {
    fn check(&self, event: &Event) -> bool {
        let Some(wanted) = &self.containing else {
            return true;
        };
        event
            .value("text")
            .and_then(|v| v.as_text().map(|text| text.to_lowercase().contains(wanted.as_str())))
            .unwrap_or(false)
    }
}

/// Built-in vocabulary plus the console host's
pub fn registry() -> Result<Arc<Registry>> {
    let mut builder = RegistryBuilder::new();
    builtins::register_all(&mut builder)?;
    builder.register_type(
        ClassInfo::new(PLAYER, "player¦s")
            .event_default()
            .formatter(|value| value.as_object().map(|p| p.key().to_string()).unwrap_or_default()),
    )?;
    builder.register_converter(PLAYER, "text", |value| {
        value.as_object().map(|player| Value::Text(player.key().to_string()))
    });
    builder.register_event(
        "chat",
        EventFactory::Checked(|| Box::new(OnChat::default())),
        &[&CHAT],
        &["chat [containing %-*text%]"],
    );
    builder.close()
}

/// Chat event for a `name: message` console line
pub fn chat_event(line: &str) -> Option<Event> {
    let (name, message) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some(
        Event::new(&CHAT)
            .with_value(PLAYER, HostObject::new(PLAYER, name))
            .with_value("text", message.trim())
            .asynchronous(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_event_from_console_line() {
        let event = chat_event("alice: hello there").unwrap();
        assert_eq!(event.value("text"), Some(Value::from("hello there")));
        assert_eq!(event.value(PLAYER), Some(Value::Object(HostObject::new(PLAYER, "alice"))));
        assert!(event.is_asynchronous());
        assert!(chat_event("no separator").is_none());
        assert!(chat_event("two words: hi").is_none());
    }

    #[test]
    fn test_chat_filter() {
        let registry = registry().unwrap();
        let mut state = ParserState::new(registry);
        let parsed = state.parse_event("on chat containing \"Hello\"").unwrap();
        let trellis_scripting::syntax::TriggerEvent::Checked(check) = parsed.event else {
            panic!("chat is a checked event");
        };
        assert!(check.check(&chat_event("bob: well hello").unwrap()));
        assert!(!check.check(&chat_event("bob: goodbye").unwrap()));
    }
}
