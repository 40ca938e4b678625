use nexus_flow::{Graph, GraphBuilder, Result, Session};
use std::sync::Arc;

use crate::{
    analysis::AnalysisClient,
    models::UploadFile,
    reader::DocumentReader,
    tasks::{session_keys, AnalyzeDocumentTask, ExtractTextTask},
};

/// extract_text → analyze_document
pub fn build_ingestion_workflow(reader: Arc<DocumentReader>, client: Arc<AnalysisClient>) -> Graph {
    let extract_task = Arc::new(ExtractTextTask::new(reader));
    let analyze_task = Arc::new(AnalyzeDocumentTask::new(client));

    GraphBuilder::new("ingestion_workflow")
        .add_task(extract_task)
        .add_task(analyze_task)
        .add_edge(ExtractTextTask::ID, AnalyzeDocumentTask::ID)
        .build()
}

/// Session for one run, keyed by its run id and positioned at the extraction
/// step with the upload attached
pub fn create_ingestion_session(
    graph: &Graph,
    run_id: &str,
    upload: UploadFile,
) -> Result<Session> {
    let session = graph.new_session(run_id)?;
    session.context.attach(session_keys::UPLOAD, Arc::new(upload));
    Ok(session)
}
