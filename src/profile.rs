//! Farmer profile record
//!
//! The only persistent entity. Construction validates the name and age range,
//! and the three choice fields are closed enums instead of free text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_AGE: i64 = 10;
pub const MAX_AGE: i64 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Name cannot be empty.")]
    EmptyName,
    #[error("Age must be between 10 and 100, got {0}")]
    AgeOutOfRange(i64),
}

// ============ Choice Fields ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreferredLanguage {
    English,
    Malayalam,
    Both,
}

impl PreferredLanguage {
    pub const ALL: [PreferredLanguage; 3] = [
        PreferredLanguage::English,
        PreferredLanguage::Malayalam,
        PreferredLanguage::Both,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PreferredLanguage::English => "English",
            PreferredLanguage::Malayalam => "Malayalam",
            PreferredLanguage::Both => "Both",
        }
    }

    pub fn from_str(s: &str) -> Option<PreferredLanguage> {
        match s {
            "English" => Some(PreferredLanguage::English),
            "Malayalam" => Some(PreferredLanguage::Malayalam),
            "Both" => Some(PreferredLanguage::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FarmingType {
    Paddy,
    Coconut,
    Spices,
    Vegetables,
    Mixed,
}

impl FarmingType {
    pub const ALL: [FarmingType; 5] = [
        FarmingType::Paddy,
        FarmingType::Coconut,
        FarmingType::Spices,
        FarmingType::Vegetables,
        FarmingType::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FarmingType::Paddy => "Paddy",
            FarmingType::Coconut => "Coconut",
            FarmingType::Spices => "Spices",
            FarmingType::Vegetables => "Vegetables",
            FarmingType::Mixed => "Mixed",
        }
    }

    pub fn from_str(s: &str) -> Option<FarmingType> {
        match s {
            "Paddy" => Some(FarmingType::Paddy),
            "Coconut" => Some(FarmingType::Coconut),
            "Spices" => Some(FarmingType::Spices),
            "Vegetables" => Some(FarmingType::Vegetables),
            "Mixed" => Some(FarmingType::Mixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl ExperienceLevel {
    pub const ALL: [ExperienceLevel; 3] = [
        ExperienceLevel::Beginner,
        ExperienceLevel::Intermediate,
        ExperienceLevel::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "Beginner",
            ExperienceLevel::Intermediate => "Intermediate",
            ExperienceLevel::Expert => "Expert",
        }
    }

    pub fn from_str(s: &str) -> Option<ExperienceLevel> {
        match s {
            "Beginner" => Some(ExperienceLevel::Beginner),
            "Intermediate" => Some(ExperienceLevel::Intermediate),
            "Expert" => Some(ExperienceLevel::Expert),
            _ => None,
        }
    }
}

// ============ Farmer Profile ============

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(try_from = "ProfileFields")]
pub struct FarmerProfile {
    pub name: String,
    pub district: String,
    pub age: i64,
    pub language: PreferredLanguage,
    pub farming_type: FarmingType,
    pub experience: ExperienceLevel,
}

impl FarmerProfile {
    /// Build a validated profile. The name is trimmed and used as the primary key.
    pub fn new(
        name: &str,
        district: &str,
        age: i64,
        language: PreferredLanguage,
        farming_type: FarmingType,
        experience: ExperienceLevel,
    ) -> Result<Self, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(ProfileError::AgeOutOfRange(age));
        }

        Ok(Self {
            name: name.to_string(),
            district: district.trim().to_string(),
            age,
            language,
            farming_type,
            experience,
        })
    }
}

/// Unchecked wire shape; deserialized profiles go through `FarmerProfile::new`.
#[derive(Deserialize)]
struct ProfileFields {
    name: String,
    district: String,
    age: i64,
    language: PreferredLanguage,
    farming_type: FarmingType,
    experience: ExperienceLevel,
}

impl TryFrom<ProfileFields> for FarmerProfile {
    type Error = ProfileError;

    fn try_from(fields: ProfileFields) -> Result<Self, Self::Error> {
        FarmerProfile::new(
            &fields.name,
            &fields.district,
            fields.age,
            fields.language,
            fields.farming_type,
            fields.experience,
        )
    }
}
