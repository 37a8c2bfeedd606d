#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use rocket::tokio;

    use crate::auth::Role;
    use crate::db::{
        authenticate_client, create_client, create_client_session, create_lesson, delete_client,
        find_client_by_email, get_all_clients, get_client, get_lessons_for_client,
        get_session_by_token, get_tests_awaiting_review, get_tests_for_client, review_test,
        update_client,
    };
    use crate::error::AppError;
    use crate::models::ClientInput;
    use crate::test::test_db::{STANDARD_PASSWORD, TestDbBuilder};

    fn input<'a>(name: &'a str, email: &'a str) -> ClientInput<'a> {
        ClientInput {
            name,
            email,
            license_category: "B",
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_client() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let id = create_client(&test_db.pool, &input("Jane Doe", "jane@school.test"), "secret")
            .await
            .expect("Failed to create client");

        let client = get_client(&test_db.pool, id).await.unwrap();
        assert_eq!(client.name, "Jane Doe");
        assert_eq!(client.role, Role::Client);

        let by_email = find_client_by_email(&test_db.pool, "JANE@school.test")
            .await
            .unwrap()
            .expect("Email lookup should ignore case");
        assert_eq!(by_email.id, id);
    }

    #[tokio::test]
    async fn test_missing_client_is_not_found() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        match get_client(&test_db.pool, 42).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emails_are_unique_regardless_of_case() {
        let test_db = TestDbBuilder::new()
            .client("Jane Doe", "jane@school.test")
            .build()
            .await
            .unwrap();

        match create_client(&test_db.pool, &input("Jane Two", "Jane@School.test"), "x").await {
            Err(AppError::Validation(msg)) => assert!(msg.contains("already exists")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authenticate_client() {
        let test_db = TestDbBuilder::new()
            .client_with_password("Jane Doe", "jane@school.test", "s3cret")
            .build()
            .await
            .unwrap();

        let ok = authenticate_client(&test_db.pool, "jane@school.test", "s3cret")
            .await
            .unwrap();
        assert!(ok.is_some());

        let wrong = authenticate_client(&test_db.pool, "jane@school.test", STANDARD_PASSWORD)
            .await
            .unwrap();
        assert!(wrong.is_none());

        let unknown = authenticate_client(&test_db.pool, "nobody@school.test", "s3cret")
            .await
            .unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_clients_are_listed_by_name() {
        let test_db = TestDbBuilder::new()
            .client("zoe", "zoe@school.test")
            .admin("Adam", "adam@school.test")
            .client("Mia", "mia@school.test")
            .build()
            .await
            .unwrap();

        let names: Vec<String> = get_all_clients(&test_db.pool)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();

        assert_eq!(names, vec!["Adam", "Mia", "zoe"]);
    }

    #[tokio::test]
    async fn test_update_client_can_promote_to_admin() {
        let test_db = TestDbBuilder::new()
            .client("Jane Doe", "jane@school.test")
            .build()
            .await
            .unwrap();
        let id = test_db.client_id("jane@school.test").unwrap();

        let promoted = ClientInput {
            is_admin: true,
            ..input("Jane Doe", "jane@school.test")
        };
        update_client(&test_db.pool, id, &promoted, None).await.unwrap();

        let jane = get_client(&test_db.pool, id).await.unwrap();
        assert!(jane.is_admin);
        assert_eq!(jane.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_client_may_keep_own_email() {
        let test_db = TestDbBuilder::new()
            .client("Jane Doe", "jane@school.test")
            .build()
            .await
            .unwrap();
        let id = test_db.client_id("jane@school.test").unwrap();

        update_client(
            &test_db.pool,
            id,
            &input("Jane Smith", "jane@school.test"),
            Some("new-password"),
        )
        .await
        .expect("Keeping the same email must not conflict");

        let authenticated = authenticate_client(&test_db.pool, "jane@school.test", "new-password")
            .await
            .unwrap();
        assert_eq!(authenticated.map(|c| c.name), Some("Jane Smith".to_string()));
    }

    #[tokio::test]
    async fn test_delete_client_cascades() {
        let test_db = TestDbBuilder::new()
            .client("Jane Doe", "jane@school.test")
            .client("John Roe", "john@school.test")
            .lesson("jane@school.test", "Parking", "2024-01-10")
            .lesson("john@school.test", "Parking", "2024-01-11")
            .answered_test("jane@school.test", "2024-01-15", ["50", "Stop", "Mandatory"])
            .build()
            .await
            .unwrap();
        let jane_id = test_db.client_id("jane@school.test").unwrap();
        let john_id = test_db.client_id("john@school.test").unwrap();

        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();
        create_client_session(&test_db.pool, jane_id, "jane-token", expires_at)
            .await
            .unwrap();

        let deleted = delete_client(&test_db.pool, jane_id).await.unwrap();
        assert_eq!(deleted.name, "Jane Doe");

        assert!(get_lessons_for_client(&test_db.pool, jane_id).await.unwrap().is_empty());
        assert!(get_tests_for_client(&test_db.pool, jane_id).await.unwrap().is_empty());
        assert!(get_tests_awaiting_review(&test_db.pool).await.unwrap().is_empty());
        assert!(get_session_by_token(&test_db.pool, "jane-token").await.is_err());

        assert_eq!(get_lessons_for_client(&test_db.pool, john_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lesson_needs_an_existing_client() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        match create_lesson(&test_db.pool, 7, "Parking", date).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_only_submitted_unreviewed_tests_await_review() {
        let test_db = TestDbBuilder::new()
            .client("Jane Doe", "jane@school.test")
            .client("John Roe", "john@school.test")
            .client("Mia Wong", "mia@school.test")
            .test("jane@school.test", "2024-01-01")
            .answered_test("john@school.test", "2024-01-02", ["50", "Stop", "Mandatory"])
            .answered_test("mia@school.test", "2024-01-03", ["90", "Go", "Optional"])
            .build()
            .await
            .unwrap();
        let (johns, mias) = (test_db.test_ids[1], test_db.test_ids[2]);

        review_test(&test_db.pool, mias, false).await.unwrap();

        let pending: Vec<i64> = get_tests_awaiting_review(&test_db.pool)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(pending, vec![johns]);

        match review_test(&test_db.pool, 999, true).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}
