//! Single-video inspection: sampler -> sectionalizer -> classifier.

use tracing::{debug, info};

use crate::classifier::{Classifier, SectionVerdict};
use crate::config::InspectionProfile;
use crate::error::{MediaError, MediaResult};
use crate::oracle::OracleSet;
use crate::progress::ProgressSender;
use crate::sampler::FrameSampler;
use crate::sectionalizer::Sectionalizer;
use crate::source::FrameSource;

/// Runs the per-video inspection loop with a fixed profile and oracle set.
pub struct VideoInspector {
    profile: InspectionProfile,
    oracles: OracleSet,
}

impl VideoInspector {
    pub fn new(profile: InspectionProfile, oracles: OracleSet) -> MediaResult<Self> {
        profile.validate()?;
        if profile.video_type.classifies_sections() && oracles.classifiers.is_none() {
            return Err(MediaError::invalid_profile(format!(
                "no classification oracles for {} footage",
                profile.video_type
            )));
        }
        Ok(Self { profile, oracles })
    }

    pub fn profile(&self) -> &InspectionProfile {
        &self.profile
    }

    /// Inspect one video, returning verdicts in section order.
    ///
    /// `progress` receives one update per retained frame and exactly one
    /// `Finished`, whether or not the inspection succeeds.
    pub async fn inspect(
        &self,
        source: Box<dyn FrameSource>,
        progress: &ProgressSender,
    ) -> MediaResult<Vec<SectionVerdict>> {
        let result = self.run(source, progress).await;
        progress.finished().await;
        result
    }

    async fn run(&self, source: Box<dyn FrameSource>, progress: &ProgressSender) -> MediaResult<Vec<SectionVerdict>> {
        let mut sampler = FrameSampler::new(source, &self.profile).await?;
        let mut sectionalizer = Sectionalizer::new(self.oracles.detector.clone(), &self.profile);
        let mut classifier = Classifier::new(self.oracles.classifiers.clone(), &self.profile)?;

        let total = sampler.expected_samples();
        let mut processed = 0u64;
        let mut verdicts = Vec::new();

        while let Some(sample) = sampler.next_sample().await {
            if let Some(section) = sectionalizer.push(sample).await? {
                verdicts.extend(classifier.consume(section).await?);
            }
            processed += 1;
            progress.progress(processed, total);
        }

        if let Some(section) = sectionalizer.finish().await? {
            verdicts.extend(classifier.consume(section).await?);
        }

        metrics::counter!("crtscan_samples_processed_total").increment(processed);
        for verdict in &verdicts {
            metrics::counter!(
                "crtscan_sections_total",
                "category" => verdict.verdict.category.as_str()
            )
            .increment(1);
            debug!(
                section = verdict.verdict.section_index,
                category = %verdict.verdict.category,
                start_ms = verdict.verdict.section_start_ms,
                end_ms = verdict.verdict.section_end_ms,
                "Section verdict"
            );
        }

        info!(
            samples = processed,
            sections = verdicts.len(),
            observed_fps = sampler.observed_fps(),
            "Inspection complete"
        );

        Ok(verdicts)
    }
}
