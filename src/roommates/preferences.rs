use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_INTERESTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepSchedule {
    Early,
    Late,
    Varies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cleanliness {
    VeryClean,
    Clean,
    Messy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyHabits {
    Quiet,
    Music,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visitors {
    Often,
    Sometimes,
    Rarely,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreference {
    Male,
    Female,
    NoPreference,
}

/// Living-habit profile an account uses for roommate matching. Stored on
/// the account; `PUT /roommates/preferences` replaces it as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoommatePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_schedule: Option<SleepSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanliness: Option<Cleanliness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_habits: Option<StudyHabits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_smoker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_pets: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitors: Option<Visitors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_preference: Option<GenderPreference>,
}

impl RoommatePreferences {
    /// Checks sizes, then trims the bio and lower-cases and dedupes interests.
    pub fn normalized(mut self) -> Result<Self, AppError> {
        self.bio = self
            .bio
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        if self.bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_CHARS) {
            return Err(AppError::validation(format!(
                "bio must be at most {MAX_BIO_CHARS} characters"
            )));
        }

        let mut interests: Vec<String> = Vec::with_capacity(self.interests.len());
        for raw in self.interests {
            let interest = raw.trim().to_lowercase();
            if !interest.is_empty() && !interests.contains(&interest) {
                interests.push(interest);
            }
        }
        if interests.len() > MAX_INTERESTS {
            return Err(AppError::validation(format!(
                "at most {MAX_INTERESTS} interests are allowed"
            )));
        }
        self.interests = interests;
        Ok(self)
    }
}
