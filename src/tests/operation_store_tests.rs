//! tests/operation_store_tests.rs
//! `OperationService` contra SQLite en memoria.

#[cfg(test)]
mod tests {
    use actix_rt::test;
    use sqlx::{Pool, Sqlite};

    use crate::models::operation_model::{OperationName, OperationState};
    use crate::services::operation_service::{OperationService, OperationStore};
    use crate::tests::{test_pool, THRESHOLD};

    async fn insert_raw(
        pool: &Pool<Sqlite>,
        event_id: i64,
        operation: &str,
        completed: bool,
        attempts: i64,
        message: Option<&str>,
    ) {
        sqlx::query(
            r#"
            INSERT INTO notificacion_operaciones (iclock_transaction_id, operacion, completada, intentos, error_mensaje)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(event_id)
        .bind(operation)
        .bind(completed)
        .bind(attempts)
        .bind(message)
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    async fn test_mark_completed_is_idempotent() {
        let store = OperationService::new(test_pool().await);

        store.mark_completed(10, OperationName::Email).await.unwrap();
        store.mark_completed(10, OperationName::Email).await.unwrap();

        let completed = store.completed_operations(10).await.unwrap();
        assert_eq!(completed.into_iter().collect::<Vec<_>>(), vec![OperationName::Email]);

        let record = store
            .get_record(10, OperationName::Email)
            .await
            .unwrap()
            .unwrap();
        assert!(record.completed);
        assert_eq!(record.attempts, 2);
        assert!(store.completed_operations(11).await.unwrap().is_empty());
    }

    #[test]
    async fn test_third_failure_blocks_once() {
        let store = OperationService::new(test_pool().await);
        let op = OperationName::ApiProexsi;

        let first = store.record_failure(20, op, "boom1", THRESHOLD).await.unwrap();
        assert_eq!(first.attempts, 1);
        assert_eq!(first.state, OperationState::Failed(1));
        assert!(!first.newly_blocked);

        let second = store.record_failure(20, op, "boom2", THRESHOLD).await.unwrap();
        assert_eq!(second.state, OperationState::Failed(2));
        assert!(!store.is_blocked(20, op, THRESHOLD).await.unwrap());

        let third = store.record_failure(20, op, "boom3", THRESHOLD).await.unwrap();
        assert_eq!(third.attempts, 3);
        assert_eq!(third.state, OperationState::Blocked);
        assert!(third.newly_blocked);
        assert!(store.is_blocked(20, op, THRESHOLD).await.unwrap());

        let record = store.get_record(20, op).await.unwrap().unwrap();
        assert_eq!(
            record.last_error.as_deref(),
            Some("BLOCKED: 3 fallos consecutivos. Último error: boom3")
        );

        let fourth = store.record_failure(20, op, "boom4", THRESHOLD).await.unwrap();
        assert!(!fourth.newly_blocked);

        let history = store.failure_history(20, op).await.unwrap();
        let messages: Vec<_> = history.iter().map(|h| h.message.as_str()).collect();
        assert_eq!(messages, vec!["boom1", "boom2", "boom3", "boom4"]);
        assert_eq!(store.count_blocked(op, THRESHOLD).await.unwrap(), 1);
    }

    #[test]
    async fn test_blocked_predicate_variants() {
        let pool = test_pool().await;
        let store = OperationService::new(pool.clone());
        let op = OperationName::ApiProexsi;

        insert_raw(&pool, 1, "api_proexsi", false, 1, Some("BLOQUEADO: 3 fallos")).await;
        insert_raw(&pool, 2, "api_proexsi", false, 1, Some("BLOCKED: manual")).await;
        insert_raw(&pool, 3, "api_proexsi", true, 7, Some("boom")).await;
        insert_raw(&pool, 4, "api_proexsi", false, 2, Some("timeout")).await;
        insert_raw(&pool, 5, "api_saturno", false, 9, Some("caído")).await;

        assert!(store.is_blocked(1, op, THRESHOLD).await.unwrap());
        assert!(store.is_blocked(2, op, THRESHOLD).await.unwrap());
        assert!(!store.is_blocked(3, op, THRESHOLD).await.unwrap());
        assert!(!store.is_blocked(4, op, THRESHOLD).await.unwrap());
        assert!(!store.is_blocked(99, op, THRESHOLD).await.unwrap());

        let blocked: Vec<i64> = store
            .list_blocked(THRESHOLD)
            .await
            .unwrap()
            .iter()
            .map(|r| r.event_id)
            .collect();
        assert_eq!(blocked, vec![1, 2]);
        assert_eq!(store.count_blocked(op, THRESHOLD).await.unwrap(), 2);
    }

    #[test]
    async fn test_failure_after_completion_keeps_record_completed() {
        let store = OperationService::new(test_pool().await);
        let op = OperationName::ApiProexsi;

        store.mark_completed(30, op).await.unwrap();
        let transition = store.record_failure(30, op, "tarde", THRESHOLD).await.unwrap();
        assert_eq!(transition.state, OperationState::Completed);

        let record = store.get_record(30, op).await.unwrap().unwrap();
        assert!(record.completed);
        assert_eq!(record.last_error, None);
    }

    #[test]
    async fn test_unlock_single_and_all() {
        let store = OperationService::new(test_pool().await);
        let op = OperationName::ApiProexsi;

        for event_id in [40, 41, 42] {
            for _ in 0..THRESHOLD {
                store.record_failure(event_id, op, "caído", THRESHOLD).await.unwrap();
            }
        }
        store.record_failure(43, op, "una vez", THRESHOLD).await.unwrap();

        assert!(store.unlock(40, THRESHOLD).await.unwrap());
        let record = store.get_record(40, op).await.unwrap().unwrap();
        assert_eq!(record.attempts, 0);
        assert_eq!(record.last_error, None);
        assert!(!store.is_blocked(40, op, THRESHOLD).await.unwrap());

        // No bloqueada: no cambia nada
        assert!(!store.unlock(40, THRESHOLD).await.unwrap());
        assert!(!store.unlock(43, THRESHOLD).await.unwrap());
        assert_eq!(store.get_record(43, op).await.unwrap().unwrap().attempts, 1);

        assert_eq!(store.unlock_all(THRESHOLD).await.unwrap(), 2);
        assert_eq!(store.count_blocked(op, THRESHOLD).await.unwrap(), 0);

        // Desbloqueada, vuelve a contar desde cero
        let again = store.record_failure(41, op, "otra vez", THRESHOLD).await.unwrap();
        assert_eq!(again.state, OperationState::Failed(1));
    }

    #[test]
    async fn test_list_for_event_only_returns_own_rows() {
        let store = OperationService::new(test_pool().await);

        store.mark_completed(50, OperationName::Email).await.unwrap();
        store
            .record_failure(50, OperationName::ApiProexsi, "x", THRESHOLD)
            .await
            .unwrap();
        store.mark_completed(51, OperationName::Email).await.unwrap();

        let records = store.list_for_event(50).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.event_id == 50));
    }
}
