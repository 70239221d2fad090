//! Combining the session's downloaded segments

use std::path::Path;

use crate::assembly::{Assembler, AssemblyReport};
use crate::error::Result;

use super::SegmentDownloader;

impl SegmentDownloader {
    /// Combine every downloaded segment into `output`, using ffmpeg if configured
    /// and available.
    ///
    /// See [`Assembler::combine`] for ordering and failure behavior. Segment files
    /// are never touched, so a failed combine can be retried.
    pub async fn combine(&self, output: &Path, prefer_remux: bool) -> Result<AssemblyReport> {
        let assembler = Assembler::from_config(&self.ctx.config.tools);
        self.combine_with(&assembler, output, prefer_remux).await
    }

    /// [`combine`](Self::combine) with a caller-supplied assembler
    pub async fn combine_with(
        &self,
        assembler: &Assembler,
        output: &Path,
        prefer_remux: bool,
    ) -> Result<AssemblyReport> {
        let downloaded = self.states.downloaded();
        assembler
            .combine(&self.ctx.job, &downloaded, output, prefer_remux)
            .await
    }
}
