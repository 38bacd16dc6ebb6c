//! `pmassist history`: list a user's root sessions.

use pmassist_assistant::HistoryQuery;
use pmassist_core::model::Principal;

pub async fn run(
    principal: Principal,
    query: HistoryQuery,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::open_pipeline(&config).await?;

    let sessions = orchestrator.list_history(principal, query).await?;
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    for view in sessions {
        let s = &view.session;
        let project = view.project_name.as_deref().unwrap_or("-");
        println!(
            "{}  {}  [{}]  {}",
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.id,
            project,
            s.question
        );
    }

    Ok(())
}
