//! Report generation: `Filtered -> Report`.

use std::io::Cursor;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Stage, StageKind, TickSummary, WorkerContext};
use crate::db::{analysis_repo, record_repo};
use crate::external::{ByteStream, FileInfo};
use crate::llm::report::render_html;
use crate::pipeline::{PipelineError, PipelineRecord, PipelineStatus};

/// Writes the narrative report, stores its HTML rendering and closes the
/// record.
pub struct ReportStage {
    ctx: WorkerContext,
}

impl ReportStage {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    async fn report(&self, mut record: PipelineRecord) -> Result<bool, PipelineError> {
        let applicant = self
            .ctx
            .directory
            .applicant(&record.space_id, &record.applicant_id)
            .await?;
        let vacancy = self
            .ctx
            .directory
            .vacancy(&record.space_id, &record.vacancy_id)
            .await?;
        let analyses = analysis_repo::list_by_record(&self.ctx.db, &record.id)?;

        let mut report = self
            .ctx
            .reports
            .write(&vacancy, &applicant, &record, &analyses)
            .await?;

        let html = render_html(&applicant, &vacancy, &record, &analyses, &report);
        let info = FileInfo {
            space_id: record.space_id.clone(),
            name: format!("report-{}.html", record.id),
            content_type: "text/html".to_string(),
        };
        let size = html.len() as u64;
        let stream: ByteStream = Box::pin(Cursor::new(html.into_bytes()));
        report.file_id = Some(self.ctx.storage.upload_object(&info, stream, size).await?);

        record.report = Some(report);
        record.status = PipelineStatus::Report;
        record_repo::save_with_transition(&self.ctx.db, &record, PipelineStatus::Filtered)?;
        log::info!("Report for record {} stored", record.id);
        Ok(true)
    }
}

#[async_trait]
impl Stage for ReportStage {
    fn kind(&self) -> StageKind {
        StageKind::Report
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, PipelineError> {
        let mut summary = TickSummary::default();
        for record in record_repo::list_by_status(&self.ctx.db, PipelineStatus::Filtered)? {
            if cancel.is_cancelled() {
                break;
            }
            let id = record.id.clone();
            let outcome = self.report(record).await;
            summary.record(self.kind(), &id, outcome);
        }
        Ok(summary)
    }
}
