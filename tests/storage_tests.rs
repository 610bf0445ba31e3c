// Integration tests for session persistence, expiry and diagnostic retrieval

mod common;

#[cfg(test)]
mod storage_integration_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use diagnostic_engine_lib::config::EngineConfig;
    use diagnostic_engine_lib::interview::CompleteOptions;
    use diagnostic_engine_lib::models::InterviewBlock;
    use diagnostic_engine_lib::orchestration::DisabledModelClient;
    use diagnostic_engine_lib::storage::{FileStore, KeyValueStore, MemoryStore};
    use diagnostic_engine_lib::EngineError;
    use tempfile::TempDir;

    use super::common::{create, drive, engine_with, engine_with_store};

    fn file_engine(dir: &TempDir) -> diagnostic_engine_lib::InterviewEngine {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()).unwrap());
        engine_with_store(Arc::new(DisabledModelClient), store, EngineConfig::default())
    }

    #[tokio::test]
    async fn test_file_store_session_survives_restart() {
        let dir = TempDir::new().unwrap();

        let id = {
            let engine = file_engine(&dir);
            let id = create(&engine).await;
            engine
                .submit_answer(
                    &id,
                    "ctx_company",
                    "We run a marketplace for refurbished industrial equipment",
                )
                .await
                .unwrap();
            id
        };

        let engine = file_engine(&dir);
        let session = engine.store().get_session(&id).await.unwrap();
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.current_block, InterviewBlock::Context);
        assert!(session.extracted_data.contains_key("company_description"));

        let next = engine.next_question(&id).await.unwrap();
        assert_eq!(next.question.unwrap().id, "ctx_industry");
    }

    #[tokio::test]
    async fn test_diagnostic_is_stored_and_complete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = file_engine(&dir);
        let id = create(&engine).await;
        drive(&engine, &id, "Operations lead").await;

        let first = engine.complete(&id, CompleteOptions::default()).await.unwrap();
        let second = engine.complete(&id, CompleteOptions::default()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.overall_score, second.overall_score);

        let restarted = file_engine(&dir);
        let fetched = restarted.diagnostic(&first.id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, id);
        assert_eq!(fetched.recommendations.len(), first.recommendations.len());
    }

    #[tokio::test]
    async fn test_complete_before_finish_is_refused() {
        let engine = engine_with(Arc::new(DisabledModelClient));
        let id = create(&engine).await;

        let err = engine
            .complete(&id, CompleteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AssessmentNotFinished(_)));
        assert_eq!(err.code(), "assessment_not_finished");
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with_store(
            Arc::new(DisabledModelClient),
            store.clone(),
            EngineConfig::default(),
        );
        let id = create(&engine).await;

        engine
            .store()
            .expire_session(&id, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            engine.next_question(&id).await,
            Err(EngineError::SessionNotFound(_))
        ));
        assert_eq!(engine.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let engine = engine_with(Arc::new(DisabledModelClient));
        let id = create(&engine).await;

        engine.delete_session(&id).await.unwrap();
        assert!(matches!(
            engine.stats(&id).await,
            Err(EngineError::SessionNotFound(_))
        ));
        assert!(matches!(
            engine.delete_session(&id).await,
            Err(EngineError::SessionNotFound(_))
        ));
    }
}
