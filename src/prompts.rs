// Advisory prompts - preset Kerala challenges and the expert-agronomist template

use crate::profile::{FarmerProfile, PreferredLanguage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    Waterlogging,
    CoconutPests,
    SoilAcidity,
    PepperPrices,
    SeasonalCrops,
}

impl Challenge {
    pub const ALL: [Challenge; 5] = [
        Challenge::Waterlogging,
        Challenge::CoconutPests,
        Challenge::SoilAcidity,
        Challenge::PepperPrices,
        Challenge::SeasonalCrops,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Challenge::Waterlogging => "Waterlogging & Heavy Rainfall",
            Challenge::CoconutPests => "Coconut Pests (Red Palm Weevil)",
            Challenge::SoilAcidity => "Soil Acidity (Laterite Soil)",
            Challenge::PepperPrices => "Pepper Price Fluctuations",
            Challenge::SeasonalCrops => "Seasonal Crop Choice",
        }
    }

    pub fn question(&self) -> &'static str {
        match self {
            Challenge::Waterlogging => {
                "Monsoon floods damage my paddy field every year. What can I do?"
            }
            Challenge::CoconutPests => {
                "My coconut trees are affected by red palm weevil pests. How to control them?"
            }
            Challenge::SoilAcidity => "My soil is acidic. Which crops will grow well?",
            Challenge::PepperPrices => "Pepper prices keep changing. Should I sell now?",
            Challenge::SeasonalCrops => {
                "It's September — what crops are best to grow in Kerala now?"
            }
        }
    }
}

/// A preset challenge or the farmer's own question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    Preset(Challenge),
    Custom(String),
}

impl Question {
    pub fn text(&self) -> &str {
        match self {
            Question::Preset(challenge) => challenge.question(),
            Question::Custom(text) => text.trim(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text().is_empty()
    }
}

/// Build the single prompt string sent for an advisory request.
pub fn build_advisory_prompt(profile: &FarmerProfile, question: &str) -> String {
    let language_rule = match profile.language {
        PreferredLanguage::Both => "- Give the answer in both Malayalam and English",
        PreferredLanguage::Malayalam => "- Write the whole answer in Malayalam",
        PreferredLanguage::English => "- Write the whole answer in English",
    };

    // Profile fields are substituted once; braces inside them stay literal.
    format!(
        r#"
You are an agriculture expert for Kerala with deep knowledge of local farming practices.

Give short, practical farming advice in {language}.
Explain the reason for each recommendation.
Keep responses concise and actionable.

User details:
Name: {name}
District: {district}
Farming type: {farming_type}
Experience: {experience}

Question: {question}

Format your response as:
- Use bullet points
- Add short reasoning after each point
- Keep language simple and farmer-friendly
- Give in 250 words
{language_rule}
"#,
        language = profile.language.as_str(),
        name = profile.name,
        district = profile.district,
        farming_type = profile.farming_type.as_str(),
        experience = profile.experience.as_str(),
        question = question.trim(),
        language_rule = language_rule,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ExperienceLevel, FarmingType};

    fn farmer(language: PreferredLanguage) -> FarmerProfile {
        FarmerProfile::new(
            "Sreeja",
            "Alappuzha",
            45,
            language,
            FarmingType::Paddy,
            ExperienceLevel::Intermediate,
        )
        .unwrap()
    }

    #[test]
    fn test_prompt_includes_profile_and_question() {
        let prompt = build_advisory_prompt(
            &farmer(PreferredLanguage::Malayalam),
            Challenge::Waterlogging.question(),
        );

        assert!(prompt.contains("advice in Malayalam"));
        assert!(prompt.contains("Name: Sreeja"));
        assert!(prompt.contains("District: Alappuzha"));
        assert!(prompt.contains("Farming type: Paddy"));
        assert!(prompt.contains("Experience: Intermediate"));
        assert!(prompt.contains("Question: Monsoon floods damage my paddy field"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_placeholder_text_in_fields_is_kept_verbatim() {
        let profile = FarmerProfile::new(
            "{language_rule}",
            "{experience} ward",
            38,
            PreferredLanguage::English,
            FarmingType::Spices,
            ExperienceLevel::Expert,
        )
        .unwrap();

        let prompt = build_advisory_prompt(&profile, "Is {district} good for {name}?");

        assert!(prompt.contains("Name: {language_rule}\n"));
        assert!(prompt.contains("District: {experience} ward\n"));
        assert!(prompt.contains("Experience: Expert\n"));
        assert!(prompt.contains("Question: Is {district} good for {name}?\n"));
        assert!(!prompt.contains("Expert ward"));
        assert_eq!(prompt.matches("- Write the whole answer in English").count(), 1);
    }

    #[test]
    fn test_bilingual_rule_only_for_both() {
        let both = build_advisory_prompt(&farmer(PreferredLanguage::Both), "Fertiliser timing?");
        let english = build_advisory_prompt(&farmer(PreferredLanguage::English), "Fertiliser timing?");

        assert!(both.contains("both Malayalam and English"));
        assert!(!english.contains("both Malayalam and English"));
    }

    #[test]
    fn test_question_text() {
        assert_eq!(
            Question::Preset(Challenge::PepperPrices).text(),
            "Pepper prices keep changing. Should I sell now?"
        );
        assert_eq!(Question::Custom("  Banana wilt?  ".to_string()).text(), "Banana wilt?");
        assert!(Question::Custom("   ".to_string()).is_blank());
        assert!(Challenge::ALL.iter().all(|c| !Question::Preset(*c).is_blank()));
    }
}
