// Integration tests for model-backed decisions and their deterministic fallbacks

mod common;

#[cfg(test)]
mod model_fallback_tests {
    use std::sync::Arc;

    use diagnostic_engine_lib::config::EngineConfig;
    use diagnostic_engine_lib::interview::{AreaGraph, CompleteOptions};
    use diagnostic_engine_lib::models::{
        Area, ConfidenceTier, ResultSource, ScoreSource,
    };
    use diagnostic_engine_lib::storage::MemoryStore;

    use super::common::{
        create, drive, engine_with, engine_with_store, FailingClient, ScriptedClient, SlowClient,
    };

    #[test]
    fn test_risk_suggestions_exclude_detected_area() {
        let graph = AreaGraph::default();
        for area in Area::all() {
            let suggestions = graph.suggest_risk_scan_areas(*area, &[]);
            assert!(suggestions.len() >= 3, "{} got {:?}", area, suggestions);
            assert!(!suggestions.contains(area));
        }
    }

    #[test]
    fn test_technology_risk_suggestions_lead_with_critical_neighbour() {
        let graph = AreaGraph::default();
        let suggestions = graph.suggest_risk_scan_areas(Area::Technology, &[]);
        let critical: Vec<Area> = graph
            .get_critical_areas(Area::Technology)
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert!(!critical.is_empty());
        assert!(critical.contains(&suggestions[0]));
        assert_eq!(suggestions[0], Area::Finance);
    }

    #[tokio::test]
    async fn test_model_path_end_to_end() {
        let client = Arc::new(ScriptedClient::new(
            "technology",
            &["finance", "sales", "operations"],
        ));
        let engine = engine_with(client.clone());
        let id = create(&engine).await;
        drive(&engine, &id, "CTO/Technical lead").await;

        let session = engine.store().get_session(&id).await.unwrap();
        assert_eq!(session.detected_area, Some(Area::Technology));
        assert_eq!(session.expertise.as_ref().unwrap().source, ResultSource::Model);
        assert_eq!(
            session.risk_areas,
            Some(vec![Area::Finance, Area::Sales, Area::Operations])
        );

        let diagnostic = engine
            .complete(&id, CompleteOptions::default())
            .await
            .unwrap();
        assert!(diagnostic.degradations.is_empty());
        assert_eq!(diagnostic.recommendations[0].title, "Extend runway");
        assert_eq!(diagnostic.health_scores.len(), Area::all().len());
        let finance = diagnostic
            .health_scores
            .iter()
            .find(|s| s.area == Area::Finance)
            .unwrap();
        assert!(matches!(
            finance.source,
            ScoreSource::Model | ScoreSource::Blended
        ));

        // expertise + risk + diagnostic, one attempt each
        assert_eq!(client.calls(), 3);
        let cost = engine.cost(&id).await.unwrap();
        assert_eq!(cost.calls.len(), 3);
        assert!(cost.total_usd > 0.0);
    }

    #[tokio::test]
    async fn test_always_failing_model_still_produces_diagnostic() {
        let client = Arc::new(FailingClient::default());
        let engine = engine_with(client.clone());
        let id = create(&engine).await;
        let transcript = drive(&engine, &id, "CTO/Technical lead").await;
        assert!(transcript.last.unwrap().should_finish);

        let session = engine.store().get_session(&id).await.unwrap();
        let expertise = session.expertise.clone().unwrap();
        assert_eq!(expertise.source, ResultSource::Heuristic);
        assert_eq!(expertise.area, Area::Technology);

        // Graph fallback includes technology's strongest critical neighbour
        let risk_areas = session.risk_areas.clone().unwrap();
        assert_eq!(risk_areas.len(), 3);
        assert!(risk_areas.contains(&Area::Finance));
        assert!(!risk_areas.contains(&Area::Technology));
        assert_eq!(
            session.risk_selection.as_ref().unwrap().source,
            ResultSource::Graph
        );

        let diagnostic = engine
            .complete(&id, CompleteOptions::default())
            .await
            .unwrap();
        assert!(!diagnostic.degradations.is_empty());
        assert!(!diagnostic.recommendations.is_empty());
        assert!(diagnostic.confidence <= ConfidenceTier::Medium);

        // Each of the three operations tried twice
        assert_eq!(client.calls(), 6);
    }

    #[tokio::test]
    async fn test_slow_model_times_out_and_falls_back() {
        let mut config = EngineConfig::default();
        config.model.timeout_secs = 1;
        let engine = engine_with_store(Arc::new(SlowClient), Arc::new(MemoryStore::new()), config);
        let id = create(&engine).await;
        drive(&engine, &id, "Sales lead").await;

        let session = engine.store().get_session(&id).await.unwrap();
        assert_eq!(
            session.expertise.as_ref().unwrap().source,
            ResultSource::Heuristic
        );

        let cost = engine.cost(&id).await.unwrap();
        assert!(!cost.calls.is_empty());
        assert!(cost
            .calls
            .iter()
            .all(|c| c.outcome == diagnostic_engine_lib::orchestration::CallOutcome::Timeout));
    }

    #[tokio::test]
    async fn test_exhausted_budget_degrades_visibly() {
        let mut config = EngineConfig::default();
        config.model.max_cost_per_session_usd = 0.000_1;
        let client = Arc::new(ScriptedClient::new(
            "finance",
            &["sales", "operations", "strategy"],
        ));
        let engine = engine_with_store(client.clone(), Arc::new(MemoryStore::new()), config);
        let id = create(&engine).await;
        drive(&engine, &id, "Finance lead").await;

        let diagnostic = engine
            .complete(&id, CompleteOptions::default())
            .await
            .unwrap();
        assert!(diagnostic.degradations.iter().any(|d| d.contains("budget")));

        // Only the first call fit in the budget
        assert_eq!(client.calls(), 1);
    }
}
