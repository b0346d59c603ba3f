//! Chat rendering of the quiz.

use super::session::{Standing, BONUS};
use crate::gateway::UserId;
use core::{fmt::Write, time::Duration};
use model::{quiz::MAX_CHOICES, Question};

const LETTERS: [char; MAX_CHOICES] = ['A', 'B', 'C', 'D', 'E', 'F'];

pub const NO_PARTICIPANTS: &str = "🏁 **Quiz over!** Nobody answered, so there are no participants to score.";
pub const UNKNOWN_PLAYER: &str = "Unknown player";
pub const NO_SCORES: &str = "🏆 No quiz scores yet. Start one with `!quiz`!";

pub fn letter(index: usize) -> char {
    LETTERS[index]
}

/// Parses a message consisting of a single choice letter, in either case.
pub fn parse_answer(content: &str, choices: usize) -> Option<usize> {
    let mut chars = content.trim().chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let index = LETTERS.iter().position(|&letter| letter == first.to_ascii_uppercase())?;
    (index < choices).then_some(index)
}

fn plural(count: impl Into<u64>, one: &'static str, many: &'static str) -> &'static str {
    if count.into() == 1 {
        one
    } else {
        many
    }
}

pub fn announcement(total: usize) -> String {
    let noun = plural(total as u64, "question", "questions");
    format!("🧠 **Quiz time!** {total} {noun} incoming. Answer all of them correctly for a **+{BONUS} Bonus**!")
}

pub fn question(question: &Question, number: usize, total: usize, window: Duration) -> String {
    let mut text = format!("**Question {number}/{total}**");
    if let Some(category) = &question.category {
        // Writing to a `String` never fails.
        let _ = write!(text, " · _{category}_");
    }
    let _ = write!(text, "\n{}\n", question.text);
    for (index, choice) in question.choices.iter().enumerate() {
        let _ = write!(text, "\n**{})** {choice}", letter(index));
    }
    let last = letter(question.choices.len() - 1);
    let secs = window.as_secs();
    let _ = write!(text, "\n\n⏱️ You have {secs} seconds. Reply with a single letter (A–{last}). Only your first answer counts!");
    text
}

pub fn closed(question_text: &str) -> String {
    format!("{question_text}\n\n⌛ Time's up!")
}

pub fn reveal(question: &Question, winners: &[UserId]) -> String {
    let letter = letter(question.correct_index);
    let choice = question.correct_choice().unwrap_or_default();
    if winners.is_empty() {
        return format!("✅ The correct answer was **{letter}) {choice}**. No one got it right this time.");
    }
    let mentions: Vec<_> = winners.iter().map(|user| format!("<@{user}>")).collect();
    format!("✅ The correct answer was **{letter}) {choice}**. Well done, {}!", mentions.join(", "))
}

/// One summary line, e.g. `2/2 correct, +4 points (+2 Bonus)`.
pub fn result(standing: &Standing, total: usize) -> String {
    let Standing { correct, points, bonus, .. } = *standing;
    let noun = plural(points, "point", "points");
    let mut line = format!("{correct}/{total} correct, +{points} {noun}");
    if bonus {
        let _ = write!(line, " (+{BONUS} Bonus)");
    }
    line
}

pub fn summary<'a>(rows: impl IntoIterator<Item = (&'a Standing, &'a str)>, total: usize) -> String {
    let mut text = String::from("🏁 **Quiz over!** Final results:");
    for (rank, (standing, name)) in (1..).zip(rows) {
        let _ = write!(text, "\n{rank}. **{name}**: {}", result(standing, total));
    }
    text
}

/// Numbered all-time ranking. Users without a cached name are mentioned instead.
pub fn leaderboard(entries: &[model::Standing]) -> String {
    if entries.is_empty() {
        return String::from(NO_SCORES);
    }
    let mut text = String::from("🏆 **Quiz leaderboard**");
    for (rank, entry) in (1..).zip(entries) {
        let noun = plural(entry.points, "point", "points");
        let _ = match &entry.name {
            Some(name) => write!(text, "\n{rank}. **{name}**: {} {noun}", entry.points),
            None => write!(text, "\n{rank}. <@{}>: {} {noun}", entry.user_id, entry.points),
        };
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_leaderboard() {
        assert_eq!(leaderboard(&[]), NO_SCORES);

        let entries = [
            model::Standing { user_id: 7, points: 12, name: Some(String::from("ada")) },
            model::Standing { user_id: 3, points: 1, name: None },
        ];
        assert_eq!(leaderboard(&entries), "🏆 **Quiz leaderboard**\n1. **ada**: 12 points\n2. <@3>: 1 point");
    }

    #[test]
    fn parses_single_letters_only() {
        assert_eq!(parse_answer("A", 4), Some(0));
        assert_eq!(parse_answer(" d ", 4), Some(3));
        assert_eq!(parse_answer("E", 4), None);
        assert_eq!(parse_answer("AB", 4), None);
        assert_eq!(parse_answer("A!", 4), None);
        assert_eq!(parse_answer("", 4), None);
        assert_eq!(parse_answer("Z", 6), None);
        assert_eq!(parse_answer("f", 6), Some(5));
    }

    #[test]
    fn renders_bonus_results() {
        let standing = Standing { user: UserId::new(1), correct: 2, points: 4, bonus: true };
        assert_eq!(result(&standing, 2), "2/2 correct, +4 points (+2 Bonus)");

        let standing = Standing { user: UserId::new(1), correct: 1, points: 1, bonus: false };
        assert_eq!(result(&standing, 3), "1/3 correct, +1 point");
    }

    #[test]
    fn renders_lettered_choices() {
        let q = Question {
            text: String::from("Largest planet?"),
            choices: vec![String::from("Mars"), String::from("Jupiter"), String::from("Venus")],
            correct_index: 1,
            category: Some(String::from("Space")),
        };
        let text = question(&q, 1, 2, Duration::from_secs(20));
        assert!(text.starts_with("**Question 1/2** · _Space_"));
        assert!(text.contains("**A)** Mars"));
        assert!(text.contains("**C)** Venus"));
        assert!(text.contains("20 seconds"));
        assert!(text.contains("(A–C)"));

        assert!(reveal(&q, &[]).contains("No one got it right"));
        assert!(reveal(&q, &[UserId::new(9)]).contains("**B) Jupiter**. Well done, <@9>!"));
    }
}
