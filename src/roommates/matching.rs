//! Roommate compatibility scoring.
//!
//! Each habit both people filled in adds or removes points; a habit only one
//! of them set is ignored. Higher is a better match and the score can go
//! negative.

use crate::{
    accounts::repo_types::Account,
    roommates::{
        dto::{MatchedUser, RoommateMatch},
        preferences::{Cleanliness, GenderPreference, RoommatePreferences, SleepSchedule, Visitors},
    },
};

const SAME_HABIT: i32 = 2;
const CLOSE_HABIT: i32 = 1;
const SMOKING_MATCH: i32 = 3;
const SMOKING_MISMATCH: i32 = -3;
const GENDER_MISMATCH: i32 = -5;
const MAX_SHARED_INTERESTS: usize = 3;

fn sleep_points(a: SleepSchedule, b: SleepSchedule) -> i32 {
    if a == b {
        SAME_HABIT
    } else if a == SleepSchedule::Varies || b == SleepSchedule::Varies {
        CLOSE_HABIT
    } else {
        0
    }
}

fn cleanliness_points(a: Cleanliness, b: Cleanliness) -> i32 {
    use Cleanliness::{Clean, VeryClean};
    match (a, b) {
        _ if a == b => SAME_HABIT,
        (Clean, VeryClean) | (VeryClean, Clean) => CLOSE_HABIT,
        _ => 0,
    }
}

fn visitor_points(a: Visitors, b: Visitors) -> i32 {
    use Visitors::{Rarely, Sometimes};
    match (a, b) {
        _ if a == b => SAME_HABIT,
        (Sometimes, Rarely) | (Rarely, Sometimes) => CLOSE_HABIT,
        _ => 0,
    }
}

fn gender_points(a: GenderPreference, b: GenderPreference) -> i32 {
    let flexible = a == GenderPreference::NoPreference || b == GenderPreference::NoPreference;
    if !flexible && a != b {
        GENDER_MISMATCH
    } else {
        0
    }
}

pub fn compatibility_score(a: &RoommatePreferences, b: &RoommatePreferences) -> i32 {
    let mut score = 0;
    if let Some((x, y)) = a.sleep_schedule.zip(b.sleep_schedule) {
        score += sleep_points(x, y);
    }
    if let Some((x, y)) = a.cleanliness.zip(b.cleanliness) {
        score += cleanliness_points(x, y);
    }
    if let Some((x, y)) = a.study_habits.zip(b.study_habits) {
        if x == y {
            score += SAME_HABIT;
        }
    }
    if let Some((x, y)) = a.is_smoker.zip(b.is_smoker) {
        score += if x == y { SMOKING_MATCH } else { SMOKING_MISMATCH };
    }
    if let Some((x, y)) = a.has_pets.zip(b.has_pets) {
        if x == y {
            score += SAME_HABIT;
        }
    }
    if let Some((x, y)) = a.visitors.zip(b.visitors) {
        score += visitor_points(x, y);
    }
    if let Some((x, y)) = a.gender_preference.zip(b.gender_preference) {
        score += gender_points(x, y);
    }

    let shared = a
        .interests
        .iter()
        .filter(|i| b.interests.contains(i))
        .count();
    score + shared.min(MAX_SHARED_INTERESTS) as i32
}

/// Scores every other account that has preferences against `mine`, best
/// first. Equal scores keep the order of `candidates`.
pub fn rank(me: &Account, mine: &RoommatePreferences, candidates: Vec<Account>) -> Vec<RoommateMatch> {
    let mut matches: Vec<RoommateMatch> = candidates
        .into_iter()
        .filter(|c| c.id != me.id)
        .filter_map(|c| {
            let preferences = c.roommate_preferences?;
            Some(RoommateMatch {
                compatibility_score: compatibility_score(mine, &preferences),
                user: MatchedUser {
                    id: c.id,
                    username: c.username,
                },
                preferences,
            })
        })
        .collect();
    matches.sort_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));
    matches
}
