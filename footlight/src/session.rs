use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::analyze::analyze_firmware;
use crate::cache::AnalysisCache;
use crate::diagnostics_trace::maybe_write_analysis_trace;
use crate::error::AnalyzeError;
use crate::findings::FindingsConfig;
use crate::model::{AnalysisResult, AnalyzeParams};
use crate::resolver::PcIndex;

/// Explicit session state for the query handlers: the last successful
/// result and its PC index. Passed in rather than ambient, so the pipeline
/// stays side-effect-free and independently testable. Results are
/// replace-only; queries against a superseded snapshot keep working on the
/// `Arc` they already cloned.
pub struct AnalysisSession {
    config: FindingsConfig,
    cache: AnalysisCache,
    current: RwLock<Option<CurrentAnalysis>>,
}

#[derive(Clone)]
struct CurrentAnalysis {
    result: Arc<AnalysisResult>,
    pc_index: Arc<PcIndex>,
}

impl AnalysisSession {
    pub fn new(config: FindingsConfig) -> Self {
        AnalysisSession {
            config,
            cache: AnalysisCache::default(),
            current: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &FindingsConfig {
        &self.config
    }

    /// Run (or replay from cache) the full pipeline and make the result
    /// current for queries.
    pub fn analyze(&self, params: &AnalyzeParams) -> Result<Arc<AnalysisResult>, AnalyzeError> {
        let started = Instant::now();
        let result = Arc::new(analyze_firmware(params, &self.config, &self.cache)?);
        let pc_index = Arc::new(PcIndex::build(&result.symbols));
        maybe_write_analysis_trace(&result, started.elapsed());
        if let Ok(mut slot) = self.current.write() {
            *slot = Some(CurrentAnalysis {
                result: result.clone(),
                pc_index,
            });
        }
        Ok(result)
    }

    /// Install an already-built result (used by tests and by callers that
    /// run the pipeline through a custom inspector).
    pub fn install(&self, result: AnalysisResult) -> Arc<AnalysisResult> {
        let result = Arc::new(result);
        let pc_index = Arc::new(PcIndex::build(&result.symbols));
        if let Ok(mut slot) = self.current.write() {
            *slot = Some(CurrentAnalysis {
                result: result.clone(),
                pc_index,
            });
        }
        result
    }

    pub fn current(&self) -> Result<Arc<AnalysisResult>, AnalyzeError> {
        self.snapshot().map(|current| current.result)
    }

    pub fn pc_index(&self) -> Result<Arc<PcIndex>, AnalyzeError> {
        self.snapshot().map(|current| current.pc_index)
    }

    fn snapshot(&self) -> Result<CurrentAnalysis, AnalyzeError> {
        self.current
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| AnalyzeError::query("Symbol cache is empty. Run analysis first."))
    }
}
