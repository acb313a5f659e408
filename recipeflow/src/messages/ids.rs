//! Typed identifiers carried on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::RecipeflowError;
use crate::utils::generate_uuid;

/// Identifier of a live recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    /// Creates a recipe id from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random recipe id.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_uuid().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the order a recipe was created for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation key of one dispatched step: the owning recipe and the
/// task's position in it.
///
/// On the wire this is `"<recipeId>.<index>"`. Parsing splits on the *last*
/// dot, so recipe ids containing dots still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    /// The owning recipe.
    pub recipe_id: RecipeId,
    /// Position of the task within the recipe, starting at 0.
    pub index: usize,
}

impl TaskId {
    /// Creates a task id.
    #[must_use]
    pub fn new(recipe_id: RecipeId, index: usize) -> Self {
        Self { recipe_id, index }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.recipe_id, self.index)
    }
}

impl FromStr for TaskId {
    type Err = RecipeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (recipe, index) = s
            .rsplit_once('.')
            .ok_or_else(|| RecipeflowError::Malformed(format!("task id '{s}' has no index")))?;

        if recipe.is_empty() {
            return Err(RecipeflowError::Malformed(format!(
                "task id '{s}' has no recipe id"
            )));
        }

        let index = index
            .parse::<usize>()
            .map_err(|e| RecipeflowError::Malformed(format!("task id '{s}': {e}")))?;

        Ok(Self::new(RecipeId::new(recipe), index))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
