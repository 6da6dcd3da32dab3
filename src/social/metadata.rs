//! Type-specific post payloads.
//!
//! A post's `type` selects exactly one variant; the JSON a client sends is
//! decoded against that variant only and rejected if it does not fit.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::db::models::PostType;
use crate::error::AppError;

const MAX_TAGS: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PostMetadata {
    Workout(WorkoutMetadata),
    Meal(MealMetadata),
    Quote(QuoteMetadata),
    Story(StoryMetadata),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkoutMetadata {
    pub title: String,
    pub exercises: Vec<Exercise>,
    /// Minutes
    pub duration: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Exercise {
    pub name: String,
    pub sets: Vec<ExerciseSet>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExerciseSet {
    pub reps: u32,
    pub weight: f64,
    pub unit: WeightUnit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Lbs,
    Kg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MealMetadata {
    pub name: String,
    pub meal_type: MealType,
    pub ingredients: Vec<Ingredient>,
    pub macros: Macros,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuoteMetadata {
    pub text: String,
    pub author: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoryMetadata {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PostMetadata {
    /// Decodes and validates client-supplied metadata for a post of `post_type`.
    pub fn parse(post_type: PostType, value: serde_json::Value) -> Result<Self, AppError> {
        let metadata = match post_type {
            PostType::Workout => PostMetadata::Workout(decode(post_type, value)?),
            PostType::Meal => PostMetadata::Meal(decode(post_type, value)?),
            PostType::Quote => PostMetadata::Quote(decode(post_type, value)?),
            PostType::Story => PostMetadata::Story(decode(post_type, value)?),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Reads metadata back from storage. Stored rows were validated on the
    /// way in, so a decode failure means the column was edited out of band.
    pub fn from_stored(post_type: PostType, raw: &str) -> Option<Self> {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Unreadable {} metadata: {}", post_type, e);
                return None;
            }
        };
        match Self::parse(post_type, value) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!("Stored {} metadata no longer valid: {}", post_type, e);
                None
            }
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        match self {
            PostMetadata::Workout(w) => {
                require_text("title", &w.title)?;
                if w.exercises.is_empty() {
                    return Err(invalid("a workout needs at least one exercise"));
                }
                if w.duration == 0 {
                    return Err(invalid("duration must be positive"));
                }
                for exercise in &w.exercises {
                    require_text("exercise name", &exercise.name)?;
                    for set in &exercise.sets {
                        if set.reps == 0 {
                            return Err(invalid("reps must be positive"));
                        }
                        if !set.weight.is_finite() || set.weight < 0.0 {
                            return Err(invalid("weight must be zero or more"));
                        }
                    }
                }
            }
            PostMetadata::Meal(m) => {
                require_text("name", &m.name)?;
                for ingredient in &m.ingredients {
                    require_text("ingredient name", &ingredient.name)?;
                }
                let macros = [
                    m.macros.calories,
                    m.macros.protein,
                    m.macros.carbs,
                    m.macros.fat,
                ];
                if macros.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(invalid("macros must be zero or more"));
                }
            }
            PostMetadata::Quote(q) => {
                require_text("text", &q.text)?;
                require_text("author", &q.author)?;
            }
            PostMetadata::Story(s) => {
                require_text("title", &s.title)?;
                require_text("content", &s.content)?;
                if s.tags.len() > MAX_TAGS {
                    return Err(invalid(&format!("at most {} tags", MAX_TAGS)));
                }
                if s.tags.iter().any(|t| t.trim().is_empty()) {
                    return Err(invalid("tags cannot be blank"));
                }
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(post_type: PostType, value: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::BadRequest(format!("Invalid {} metadata: {}", post_type, e)))
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(invalid(&format!("{} is required", field)));
    }
    Ok(())
}

fn invalid(reason: &str) -> AppError {
    AppError::BadRequest(format!("Invalid metadata: {}", reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leg_day() -> serde_json::Value {
        json!({
            "title": "Leg Day",
            "exercises": [{
                "name": "Barbell Squat",
                "sets": [
                    { "reps": 12, "weight": 185, "unit": "lbs" },
                    { "reps": 8, "weight": 225, "unit": "lbs" }
                ]
            }],
            "duration": 65
        })
    }

    #[test]
    fn workout_metadata_parses() {
        let metadata = PostMetadata::parse(PostType::Workout, leg_day()).unwrap();
        match metadata {
            PostMetadata::Workout(w) => {
                assert_eq!(w.title, "Leg Day");
                assert_eq!(w.exercises[0].sets.len(), 2);
                assert_eq!(w.exercises[0].sets[0].unit, WeightUnit::Lbs);
            }
            other => panic!("expected workout, got {:?}", other),
        }
    }

    #[test]
    fn metadata_for_another_type_is_rejected() {
        let quote = json!({ "text": "Show up.", "author": "Anon" });
        let err = PostMetadata::parse(PostType::Workout, quote).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let quote = json!({ "text": "Show up.", "author": "Anon", "mood": "fired up" });
        assert!(PostMetadata::parse(PostType::Quote, quote).is_err());
    }

    #[test]
    fn meal_requires_known_meal_type() {
        let meal = json!({
            "name": "Protein Bowl",
            "mealType": "brunch",
            "ingredients": [],
            "macros": { "calories": 650, "protein": 45, "carbs": 60, "fat": 22 }
        });
        assert!(PostMetadata::parse(PostType::Meal, meal).is_err());
    }

    #[test]
    fn negative_macros_are_rejected() {
        let meal = json!({
            "name": "Protein Bowl",
            "mealType": "lunch",
            "ingredients": [{ "name": "Rice", "amount": "1 cup" }],
            "macros": { "calories": -1, "protein": 45, "carbs": 60, "fat": 22 }
        });
        assert!(PostMetadata::parse(PostType::Meal, meal).is_err());
    }

    #[test]
    fn zero_rep_sets_are_rejected() {
        let mut workout = leg_day();
        workout["exercises"][0]["sets"][0]["reps"] = json!(0);
        assert!(PostMetadata::parse(PostType::Workout, workout).is_err());
    }

    #[test]
    fn story_tags_default_and_limit() {
        let story = json!({ "title": "Six months", "content": "Just show up." });
        let parsed = PostMetadata::parse(PostType::Story, story).unwrap();
        assert!(matches!(parsed, PostMetadata::Story(ref s) if s.tags.is_empty()));

        let tags: Vec<String> = (0..11).map(|n| format!("t{}", n)).collect();
        let story = json!({ "title": "Six months", "content": "Just show up.", "tags": tags });
        assert!(PostMetadata::parse(PostType::Story, story).is_err());
    }

    #[test]
    fn serializes_without_variant_tag() {
        let metadata = PostMetadata::parse(
            PostType::Quote,
            json!({ "text": "Show up.", "author": "Anon" }),
        )
        .unwrap();
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value, json!({ "text": "Show up.", "author": "Anon" }));
    }

    #[test]
    fn from_stored_drops_garbage() {
        assert!(PostMetadata::from_stored(PostType::Quote, "not json").is_none());
        assert!(PostMetadata::from_stored(PostType::Quote, "{\"text\":\"a\",\"author\":\"b\"}").is_some());
    }
}
