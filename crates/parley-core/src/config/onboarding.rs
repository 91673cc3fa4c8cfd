use serde::{Deserialize, Deserializer, Serialize};

use super::defaults::*;
use crate::onboarding::FieldDefinition;

/// Both onboarding dialogs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    #[serde(
        default = "OnboardingFlowConfig::individual",
        deserialize_with = "individual_flow"
    )]
    pub individual: OnboardingFlowConfig,
    #[serde(default = "OnboardingFlowConfig::group", deserialize_with = "group_flow")]
    pub group: OnboardingFlowConfig,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            individual: OnboardingFlowConfig::individual(),
            group: OnboardingFlowConfig::group(),
        }
    }
}

/// One onboarding dialog (individual or group).
///
/// Fields are asked in the order they are declared. Keys missing from a
/// `[onboarding.*]` section keep that flow's own defaults.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingFlowConfig {
    pub enabled: bool,
    /// Literal message that restarts the dialog without a classifier call.
    pub trigger_phrase: String,
    /// Sent once every required field is collected.
    pub final_message: String,
    pub fields: Vec<FieldDefinition>,
}

/// A flow section as written in the file.
#[derive(Deserialize)]
struct FlowSection {
    enabled: Option<bool>,
    trigger_phrase: Option<String>,
    final_message: Option<String>,
    fields: Option<Vec<FieldDefinition>>,
}

impl FlowSection {
    fn over(self, base: OnboardingFlowConfig) -> OnboardingFlowConfig {
        OnboardingFlowConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            trigger_phrase: self.trigger_phrase.unwrap_or(base.trigger_phrase),
            final_message: self.final_message.unwrap_or(base.final_message),
            fields: self.fields.unwrap_or(base.fields),
        }
    }
}

fn individual_flow<'de, D: Deserializer<'de>>(d: D) -> Result<OnboardingFlowConfig, D::Error> {
    Ok(FlowSection::deserialize(d)?.over(OnboardingFlowConfig::individual()))
}

fn group_flow<'de, D: Deserializer<'de>>(d: D) -> Result<OnboardingFlowConfig, D::Error> {
    Ok(FlowSection::deserialize(d)?.over(OnboardingFlowConfig::group()))
}

impl OnboardingFlowConfig {
    pub fn individual() -> Self {
        Self {
            enabled: default_true(),
            trigger_phrase: default_trigger_phrase(),
            final_message: default_individual_final_message(),
            fields: default_individual_fields(),
        }
    }

    pub fn group() -> Self {
        Self {
            enabled: default_true(),
            trigger_phrase: default_trigger_phrase(),
            final_message: default_group_final_message(),
            fields: default_group_fields(),
        }
    }

    /// True when the flow is on and has something to ask.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.fields.is_empty()
    }
}
