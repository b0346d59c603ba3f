//! Durable facts about a user, gleaned from what they tell the assistant.

use super::{Role, Turn};
use db::Profile;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Upper bound on facts taken from a single model reply.
pub const MAX_FACTS: usize = 5;

const INSTRUCTIONS: &str = "You pull lasting facts about a user out of a chat transcript.\n\
    Reply with a JSON array of strings and nothing else.\n\
    Each fact is short, supported by the conversation, and likely to stay true.\n\
    Skip moods, one-off situations, and facts that are already known.\n\
    Return at most 5 facts in sentence case without trailing punctuation.";

static PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)my name is (\w+)", "User's name is {}"),
        (r"(?i)i am (\d+) years old", "User is {} years old"),
        (r"(?i)i live in ([^.,]+)", "User lives in {}"),
        (r"(?i)i work as a ([^.,]+)", "User works as a {}"),
        (r"(?i)i like ([^.,]+)", "User likes {}"),
        (r"(?i)i love ([^.,]+)", "User loves {}"),
        (r"(?i)i hate ([^.,]+)", "User dislikes {}"),
        (r"(?i)i prefer ([^.,]+)", "User prefers {}"),
    ]
    .into_iter()
    .filter_map(|(pattern, template)| match Regex::new(pattern) {
        Ok(regex) => Some((regex, template)),
        Err(err) => {
            log::error!("skipping fact pattern {pattern}: {err}");
            None
        }
    })
    .collect()
});

/// Offline extraction from a handful of self-descriptions such as "my name is ...".
pub fn from_patterns(message: &str) -> Vec<String> {
    PATTERNS
        .iter()
        .filter_map(|(regex, template)| {
            let capture = regex.captures(message)?.get(1)?.as_str().trim();
            Some(template.replace("{}", capture))
        })
        .collect()
}

/// Conversation asking the model for new facts given what is already stored.
pub fn request(known: &Profile, message: &str, response: &str) -> Vec<Turn> {
    let payload = json!({
        "knownFacts": known.facts,
        "recentInteractions": known.recent(5),
        "current": { "message": message, "response": response },
    });
    vec![
        Turn { role: Role::System, content: INSTRUCTIONS.into() },
        Turn {
            role: Role::User,
            content: format!("From the following JSON, extract new persistent user facts.\n\n{payload}"),
        },
    ]
}

/// Reads the JSON array out of a model reply, tolerating code fences or prose around it.
pub fn parse_list(reply: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Vec::new();
    };
    let Some(list) = reply.get(start..=end) else {
        return Vec::new();
    };
    let Ok(items) = serde_json::from_str::<Vec<Value>>(list) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|fact| !fact.is_empty())
        .take(MAX_FACTS)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{from_patterns, parse_list, request};
    use db::Profile;

    #[test]
    fn matches_self_descriptions() {
        let facts = from_patterns("Hello, my name is Alex and I live in Munich. I am 28 years old.");
        assert_eq!(facts, ["User's name is Alex", "User is 28 years old", "User lives in Munich"]);
        assert_eq!(from_patterns("I work as a designer, mostly"), ["User works as a designer"]);
        assert!(from_patterns("what is the weather like?").is_empty());
    }

    #[test]
    fn reads_fenced_lists() {
        let reply = "Sure!\n```json\n[\"User plays chess\", 4, \"  \", \"User lives in Bern\"]\n```";
        assert_eq!(parse_list(reply), ["User plays chess", "User lives in Bern"]);
        assert!(parse_list("no facts here").is_empty());
        assert!(parse_list("] backwards [").is_empty());
        assert!(parse_list("[not json]").is_empty());

        let many = r#"["a", "b", "c", "d", "e", "f"]"#;
        assert_eq!(parse_list(many).len(), 5);
    }

    #[test]
    fn request_carries_known_facts() {
        let mut profile = Profile::default();
        profile.learn("User likes tea");
        let turns = request(&profile, "I love hiking", "Nice!");
        assert_eq!(turns.len(), 2);
        assert!(turns[1].content.contains("User likes tea"));
        assert!(turns[1].content.contains("I love hiking"));
    }
}
