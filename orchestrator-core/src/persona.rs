//! Typed persona configuration (§9 "Dynamic per-turn persona dict"), replacing
//! the free-form per-turn dict with an enumerated struct. Prompt assembly
//! only renders the populated subset (§4.7).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Identity {
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub location: Option<String>,
    pub languages: Vec<String>,
    pub physical_description: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Professional {
    pub current_role: Option<String>,
    pub company: Option<String>,
    pub years_of_experience: Option<u32>,
    pub areas_of_expertise: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Academics {
    pub school: Vec<String>,
    pub university: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Family {
    pub marital_status: Option<String>,
    pub spouse_name: Option<String>,
    pub children_count: Option<u32>,
    pub siblings_count: Option<u32>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Lifestyle {
    pub hobbies: Vec<String>,
    pub personal_interests: Vec<String>,
    pub lifestyle_description: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StrengthsAndWeaknesses {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub identity: Identity,
    pub professional: Professional,
    pub academics: Academics,
    pub family: Family,
    pub lifestyle: Lifestyle,
    pub strengths_and_weaknesses: StrengthsAndWeaknesses,
    pub expertise: Vec<String>,
    pub humor: Option<String>,
    pub expert_level: Option<String>,
    pub response_language: Option<String>,
}

impl PersonaConfig {
    /// The language constraint fed to the prompt assembler (§4.7): the
    /// persona's declared languages, or English when none are set.
    pub fn languages_or_default(&self) -> Vec<String> {
        if self.identity.languages.is_empty() {
            vec!["English".to_string()]
        } else {
            self.identity.languages.clone()
        }
    }
}
