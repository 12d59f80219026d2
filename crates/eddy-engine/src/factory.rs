//! Builds analyses from a [`SessionConfig`].

use eddy_core::{AnalysisAdaptor, SharedComm};
use eddy_histogram::{Histogram, HistogramConfig};
use eddy_posthoc::PosthocWriter;
use eddy_requirements::DataRequirements;

use crate::config::{AnalysisConfig, ConfigError, SessionConfig};

/// Construct every enabled analysis, in configuration order.
pub fn build_analyses(
    config: &SessionConfig,
    comm: &SharedComm,
) -> Result<Vec<Box<dyn AnalysisAdaptor>>, ConfigError> {
    let mut analyses: Vec<Box<dyn AnalysisAdaptor>> = Vec::new();
    for (i, entry) in config.analysis.iter().enumerate() {
        if !entry.enabled() {
            tracing::debug!(index = i, kind = entry.type_name(), "analysis disabled");
            continue;
        }
        let invalid =
            |e: eddy_core::AnalysisError| ConfigError::Invalid(format!("analysis {i}: {e}"));
        match entry {
            AnalysisConfig::Histogram(h) => {
                let histogram = Histogram::new(
                    comm.clone(),
                    HistogramConfig {
                        bins: h.bins,
                        mesh: h.mesh.clone(),
                        association: h.association()?,
                        array: h.array.clone(),
                    },
                )
                .map_err(invalid)?;
                analyses.push(Box::new(histogram));
            }
            AnalysisConfig::Posthoc(p) => {
                let mut writer = PosthocWriter::new(comm.clone(), &p.output_dir);
                writer.set_mode(&p.mode).map_err(invalid)?;
                if !p.requirements.is_empty() {
                    writer.set_requirements(DataRequirements::from_configs(&p.requirements));
                }
                analyses.push(Box::new(writer));
            }
        }
        tracing::info!(index = i, kind = entry.type_name(), "configured analysis");
    }
    if analyses.is_empty() {
        tracing::warn!("no analyses enabled");
    }
    Ok(analyses)
}
