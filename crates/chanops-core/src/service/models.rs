//! Known test models and bulk rewriting of channel model lists.

use serde::Serialize;

use chanops_types::channel::ChannelFilter;
use chanops_types::error::ChannelError;

use crate::repository::channel::ChannelRepository;

/// Models the tester knows how to probe.
pub const TESTER_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-1.5-pro-latest",
    "gemini-1.5-flash-latest",
];

/// Model list written by `models update`.
pub const GEMINI_25_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro-preview-03-25",
    "gemini-2.5-pro-preview-05-06",
    "gemini-2.5-pro-preview-06-05",
    "gemini-2.5-flash-preview-05-20",
    "gemini-2.5-flash-lite-preview-06-17",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelUpdatePlan {
    pub channel_id: i64,
    pub channel_name: String,
    pub channel_type: i64,
    pub current: String,
    pub new: String,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelUpdateReport {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

pub struct ModelService<R: ChannelRepository> {
    repo: R,
}

impl<R: ChannelRepository> ModelService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Compare each channel of the given types against the target list.
    pub async fn plan_update(&self, types: &[i64], target: &[&str]) -> Result<Vec<ModelUpdatePlan>, ChannelError> {
        let filter = ChannelFilter {
            types: types.to_vec(),
            ..Default::default()
        };
        let new = target.join(",");
        let plans = self
            .repo
            .list(&filter)
            .await?
            .into_iter()
            .map(|channel| ModelUpdatePlan {
                changed: channel.model_list() != target,
                channel_id: channel.id,
                channel_name: channel.name,
                channel_type: channel.channel_type,
                current: channel.models,
                new: new.clone(),
            })
            .collect();
        Ok(plans)
    }

    pub async fn apply(&self, plans: &[ModelUpdatePlan]) -> ModelUpdateReport {
        let mut report = ModelUpdateReport::default();
        for plan in plans {
            if !plan.changed {
                report.unchanged += 1;
                continue;
            }
            match self.repo.update_models(plan.channel_id, &plan.new).await {
                Ok(()) => {
                    report.updated += 1;
                    tracing::info!(channel_id = plan.channel_id, "updated model list");
                }
                Err(e) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{} (ID:{}): {e}", plan.channel_name, plan.channel_id));
                }
            }
        }
        report
    }
}
