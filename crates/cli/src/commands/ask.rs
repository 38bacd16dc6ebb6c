//! `pmassist ask`: run one query through the pipeline.

use pmassist_assistant::QueryRequest;
use pmassist_core::model::Principal;
use pmassist_core::session::SourceKind;

pub async fn run(
    principal: Principal,
    request: QueryRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::open_pipeline(&config).await?;

    let session = orchestrator.submit_query(principal, request).await?;

    println!("{}", session.response.as_deref().unwrap_or_default());
    println!();
    println!(
        "session {}  model {}  confidence {:.2}  {} ms",
        session.id,
        session.model.as_deref().unwrap_or("-"),
        session.confidence.unwrap_or_default(),
        session.response_time_ms
    );

    if !session.sources.is_empty() {
        println!("sources:");
        for source in &session.sources {
            let kind = match &source.kind {
                SourceKind::Project => "project",
                SourceKind::Task => "task",
                SourceKind::Other(tag) => tag.as_str(),
            };
            println!("  {kind:<8} {}  {}", source.id, source.name);
        }
    }

    Ok(())
}
