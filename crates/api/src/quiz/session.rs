use crate::gateway::{ChannelId, UserId};
use model::Question;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

/// Extra points for answering every question of a session correctly.
pub const BONUS: u32 = 2;

/// Final result of one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub user: UserId,
    pub correct: u32,
    pub points: u32,
    pub bonus: bool,
}

/// Live state of one channel's quiz. Only the session's own runner ever touches it.
pub struct Session {
    channel: ChannelId,
    questions: Vec<Question>,
    current: usize,
    /// Recorded choice per participant, one map per question.
    answers: Vec<BTreeMap<UserId, usize>>,
    correct: BTreeMap<UserId, u32>,
    participants: BTreeSet<UserId>,
}

impl Session {
    pub fn new(channel: ChannelId, questions: Vec<Question>) -> Self {
        let answers = vec![BTreeMap::new(); questions.len()];
        Self {
            channel,
            questions,
            current: 0,
            answers,
            correct: BTreeMap::new(),
            participants: BTreeSet::new(),
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Zero-based index of the open question.
    pub fn position(&self) -> usize {
        self.current
    }

    /// The open question, or `None` once every question has been revealed.
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    pub fn advance(&mut self) {
        self.current += 1;
    }

    /// Records `choice` as the user's answer to the open question. Only the first valid answer counts.
    pub fn record(&mut self, user: UserId, choice: usize) -> bool {
        let Some(question) = self.questions.get(self.current) else {
            return false;
        };
        if choice >= question.choices.len() {
            return false;
        }

        match self.answers[self.current].entry(user) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(choice);
                self.participants.insert(user);
                true
            }
        }
    }

    /// Credits everyone who picked the right choice for the open question. Returns them in ID order.
    pub fn reveal(&mut self) -> Vec<UserId> {
        let Some(question) = self.questions.get(self.current) else {
            return Vec::new();
        };

        let winners: Vec<_> = self.answers[self.current]
            .iter()
            .filter(|&(_, &choice)| choice == question.correct_index)
            .map(|(&user, _)| user)
            .collect();
        for &user in &winners {
            *self.correct.entry(user).or_default() += 1;
        }
        winners
    }

    /// Everyone who answered at least once, best first: by points, then correct answers, then user ID.
    pub fn standings(&self) -> Vec<Standing> {
        let total = self.questions.len();
        let mut standings: Vec<_> = self
            .participants
            .iter()
            .map(|&user| {
                let correct = self.correct.get(&user).copied().unwrap_or_default();
                let bonus = total > 0 && correct as usize == total;
                let points = if bonus { correct + BONUS } else { correct };
                Standing { user, correct, points, bonus }
            })
            .collect();
        standings.sort_by(|a, b| {
            b.points.cmp(&a.points).then(b.correct.cmp(&a.correct)).then(a.user.cmp(&b.user))
        });
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, Standing, BONUS};
    use crate::gateway::{ChannelId, UserId};
    use model::Question;

    fn question(correct_index: usize) -> Question {
        Question {
            text: String::from("Pick one"),
            choices: vec![String::from("red"), String::from("green"), String::from("blue")],
            correct_index,
            category: None,
        }
    }

    fn session(answers: &[usize]) -> Session {
        Session::new(ChannelId::new(1), answers.iter().copied().map(question).collect())
    }

    #[test]
    fn first_answer_wins() {
        let mut quiz = session(&[1]);
        let user = UserId::new(5);
        assert!(quiz.record(user, 0));
        assert!(!quiz.record(user, 1));
        assert!(quiz.reveal().is_empty());
        assert_eq!(quiz.standings(), [Standing { user, correct: 0, points: 0, bonus: false }]);
    }

    #[test]
    fn ignores_choices_out_of_range() {
        let mut quiz = session(&[0]);
        assert!(!quiz.record(UserId::new(5), 3));
        assert!(quiz.standings().is_empty());
    }

    #[test]
    fn answers_are_tracked_per_question() {
        let mut quiz = session(&[0, 2]);
        let user = UserId::new(5);
        assert!(quiz.record(user, 0));
        assert_eq!(quiz.reveal(), [user]);
        quiz.advance();

        assert_eq!(quiz.position(), 1);
        assert!(quiz.record(user, 2));
        assert_eq!(quiz.reveal(), [user]);
        quiz.advance();
        assert!(quiz.current().is_none());
        assert!(!quiz.record(user, 0));

        let [standing]: [Standing; 1] = quiz.standings().try_into().unwrap();
        assert_eq!(standing, Standing { user, correct: 2, points: 2 + BONUS, bonus: true });
    }

    #[test]
    fn bonus_requires_every_answer_correct() {
        let mut quiz = session(&[0, 1]);
        let (ada, bob) = (UserId::new(1), UserId::new(2));
        quiz.record(ada, 0);
        quiz.record(bob, 0);
        quiz.reveal();
        quiz.advance();
        quiz.record(ada, 0);
        quiz.reveal();

        let standings = quiz.standings();
        assert_eq!(standings.len(), 2);
        assert!(standings.iter().all(|standing| standing.correct == 1 && standing.points == 1 && !standing.bonus));
    }

    #[test]
    fn standings_are_deterministic() {
        let mut quiz = session(&[0]);
        for id in [9, 3, 7] {
            quiz.record(UserId::new(id), 0);
        }
        quiz.record(UserId::new(1), 2);
        quiz.reveal();

        let order: Vec<_> = quiz.standings().into_iter().map(|standing| standing.user.get()).collect();
        assert_eq!(order, [3, 7, 9, 1]);
    }
}
