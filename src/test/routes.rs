#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use crate::test::test_db::STANDARD_PASSWORD;
    use crate::test::test_utils::{
        ADMIN_EMAIL, JANE_EMAIL, create_standard_test_db, follow, location, login_test_user,
        post_form, setup_test_client,
    };

    #[rocket::async_test]
    async fn test_public_pages_render_without_login() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        for page in ["/", "/services", "/contact", "/login"] {
            let response = client.get(page).dispatch().await;
            assert_eq!(response.status(), Status::Ok, "{} did not render", page);
        }

        let body = client.get("/").dispatch().await.into_string().await.unwrap();
        assert!(body.contains("Log in"));
    }

    #[rocket::async_test]
    async fn test_health_check() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "OK");
    }

    #[rocket::async_test]
    async fn test_unknown_path_is_not_found() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/no/such/page").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_contact_form_acknowledges_message() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = post_form(
            &client,
            "/contact",
            &[
                ("name", "Jane Doe"),
                ("email", "jane@example.com"),
                ("message", "When can I start?"),
            ],
        )
        .await;
        assert_eq!(location(&response).as_deref(), Some("/contact"));

        let page = follow(&client, response).await;
        assert!(page.contains("Thank you, Jane Doe. Your message has been received."));
    }

    #[rocket::async_test]
    async fn test_contact_form_rejects_bad_email() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = post_form(
            &client,
            "/contact",
            &[("name", "Jane"), ("email", "nope"), ("message", "Hello")],
        )
        .await;

        let page = follow(&client, response).await;
        assert!(page.contains("Please enter a valid email address."));
        assert!(!page.contains("Thank you"));
    }

    #[rocket::async_test]
    async fn test_login_lands_on_role_dashboard() {
        let test_db = create_standard_test_db().await;
        let (admin, test_db) = setup_test_client(test_db).await;

        let response = login_test_user(&admin, ADMIN_EMAIL, STANDARD_PASSWORD).await;
        assert_eq!(location(&response).as_deref(), Some("/admin"));

        let (client, _) = setup_test_client(test_db).await;

        // Emails are matched case-insensitively.
        let response = login_test_user(&client, "Jane@School.test", STANDARD_PASSWORD).await;
        assert_eq!(location(&response).as_deref(), Some("/client"));

        let dashboard = client.get("/client").dispatch().await;
        assert_eq!(dashboard.status(), Status::Ok);
        assert!(dashboard.into_string().await.unwrap().contains("Welcome, Jane Doe"));
    }

    #[rocket::async_test]
    async fn test_login_with_wrong_password_flashes_error() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = login_test_user(&client, JANE_EMAIL, "wrong_password").await;
        assert_eq!(location(&response).as_deref(), Some("/login"));

        let page = follow(&client, response).await;
        assert!(page.contains("Invalid email or password."));

        let response = login_test_user(&client, "nobody@school.test", STANDARD_PASSWORD).await;
        let page = follow(&client, response).await;
        assert!(page.contains("Invalid email or password."));
    }

    #[rocket::async_test]
    async fn test_client_pages_require_login() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/client").dispatch().await;
        assert_eq!(location(&response).as_deref(), Some("/login"));

        let page = follow(&client, response).await;
        assert!(page.contains("Please log in to continue."));

        let response = client.get("/client/1/take_test").dispatch().await;
        assert_eq!(location(&response).as_deref(), Some("/login"));
    }

    #[rocket::async_test]
    async fn test_admin_pages_bounce_non_admins_to_login() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/admin").dispatch().await;
        assert_eq!(location(&response).as_deref(), Some("/login"));

        login_test_user(&client, JANE_EMAIL, STANDARD_PASSWORD).await;

        for page in ["/admin", "/admin/add", "/admin/client/1"] {
            let response = client.get(page).dispatch().await;
            assert_eq!(
                location(&response).as_deref(),
                Some("/login"),
                "{} was reachable by a client",
                page
            );
        }

        let response = post_form(&client, "/admin/delete/1", &[]).await;
        assert_eq!(location(&response).as_deref(), Some("/login"));
    }
}
