#[cfg(test)]
pub mod test_db {
    use crate::db::{create_client, create_lesson, create_test, submit_test_answers};
    use crate::error::AppError;
    use crate::models::{ClientInput, NewQuestion};
    use crate::validation::parse_date;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn standard_questions() -> [NewQuestion; 3] {
        let question = |question: &str, correct: &str, false_answer: &str| NewQuestion {
            question: question.to_string(),
            correct_answer: correct.to_string(),
            false_answer: false_answer.to_string(),
        };

        [
            question("Speed limit in town?", "50", "90"),
            question("Red light means?", "Stop", "Go"),
            question("Seatbelts are?", "Mandatory", "Optional"),
        ]
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        clients: Vec<TestClient>,
        lessons: Vec<TestLesson>,
        tests: Vec<TestTest>,
    }

    pub struct TestClient {
        pub name: String,
        pub email: String,
        pub license_category: String,
        pub is_admin: bool,
        pub password: String,
    }

    pub struct TestLesson {
        pub email: String,
        pub description: String,
        pub date: String,
    }

    pub struct TestTest {
        pub email: String,
        pub date: String,
        pub answers: Option<[String; 3]>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn admin(mut self, name: &str, email: &str) -> Self {
            self.clients.push(TestClient {
                name: name.to_string(),
                email: email.to_string(),
                license_category: "A".to_string(),
                is_admin: true,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn client(mut self, name: &str, email: &str) -> Self {
            self.clients.push(TestClient {
                name: name.to_string(),
                email: email.to_string(),
                license_category: "B".to_string(),
                is_admin: false,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn client_with_password(mut self, name: &str, email: &str, password: &str) -> Self {
            self.clients.push(TestClient {
                name: name.to_string(),
                email: email.to_string(),
                license_category: "B".to_string(),
                is_admin: false,
                password: password.to_string(),
            });
            self
        }

        pub fn lesson(mut self, email: &str, description: &str, date: &str) -> Self {
            self.lessons.push(TestLesson {
                email: email.to_string(),
                description: description.to_string(),
                date: date.to_string(),
            });
            self
        }

        /// A test with the standard questions and no answers yet.
        pub fn test(mut self, email: &str, date: &str) -> Self {
            self.tests.push(TestTest {
                email: email.to_string(),
                date: date.to_string(),
                answers: None,
            });
            self
        }

        pub fn answered_test(mut self, email: &str, date: &str, answers: [&str; 3]) -> Self {
            self.tests.push(TestTest {
                email: email.to_string(),
                date: date.to_string(),
                answers: Some(answers.map(String::from)),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new("debug"))
                    .with_test_writer()
                    .try_init();
            });

            // A single connection that never closes keeps the in-memory
            // database alive for the whole test.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(sqlx::Error::from)?;

            let mut client_id_map: HashMap<String, i64> = HashMap::new();
            let mut test_ids: Vec<i64> = Vec::new();

            for client in &self.clients {
                let input = ClientInput {
                    name: &client.name,
                    email: &client.email,
                    license_category: &client.license_category,
                    is_admin: client.is_admin,
                };

                let id = create_client(&pool, &input, &client.password).await?;

                client_id_map.insert(client.email.clone(), id);
            }

            let owner = |email: &str| {
                client_id_map
                    .get(email)
                    .copied()
                    .ok_or_else(|| AppError::NotFound(format!("No test client {}", email)))
            };

            for lesson in &self.lessons {
                let client_id = owner(&lesson.email)?;
                let date = parse_date(&lesson.date)?;

                create_lesson(&pool, client_id, &lesson.description, date).await?;
            }

            for test in &self.tests {
                let client_id = owner(&test.email)?;
                let date = parse_date(&test.date)?;

                let id = create_test(&pool, client_id, date, &standard_questions()).await?;
                test_ids.push(id);

                // Answers land on the client's active test, which is this one
                // as long as tests are added in chronological order.
                if let Some(answers) = &test.answers {
                    let [a1, a2, a3] = answers;
                    submit_test_answers(&pool, client_id, [a1.as_str(), a2.as_str(), a3.as_str()])
                        .await?;
                }
            }

            Ok(TestDb {
                pool,
                client_id_map,
                test_ids,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub client_id_map: HashMap<String, i64>,
        /// Ids of created tests, in the order they were added.
        pub test_ids: Vec<i64>,
    }

    impl TestDb {
        pub fn client_id(&self, email: &str) -> Option<i64> {
            self.client_id_map.get(email).copied()
        }

        pub async fn session_count(&self, client_id: i64) -> Result<i64, sqlx::Error> {
            let (count,) = sqlx::query_as::<_, (i64,)>(
                "SELECT COUNT(*) FROM client_sessions WHERE client_id = ?",
            )
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;

            Ok(count)
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use rocket::http::{ContentType, Header};
    use rocket::local::asynchronous::{Client as LocalClient, LocalResponse};
    use url::form_urlencoded;

    use super::test_db::{TestDb, TestDbBuilder};
    use crate::env::AppConfig;
    use crate::init_rocket;

    pub const ADMIN_EMAIL: &str = "admin@school.test";
    pub const JANE_EMAIL: &str = "jane@school.test";
    pub const JOHN_EMAIL: &str = "john@school.test";

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("Admin", ADMIN_EMAIL)
            .client("Jane Doe", JANE_EMAIL)
            .client("John Roe", JOHN_EMAIL)
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (LocalClient, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), AppConfig::default());
        let client = LocalClient::tracked(rocket)
            .await
            .expect("Failed to create Rocket test client");

        (client, test_db)
    }

    /// Encodes `pairs` the way a browser submits an HTML form.
    pub fn form_body(pairs: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }

    pub async fn post_form<'c>(
        client: &'c LocalClient,
        uri: &str,
        pairs: &[(&str, &str)],
    ) -> LocalResponse<'c> {
        client
            .post(uri.to_string())
            .header(ContentType::Form)
            .body(form_body(pairs))
            .dispatch()
            .await
    }

    pub async fn login_test_user<'c>(
        client: &'c LocalClient,
        email: &str,
        password: &str,
    ) -> LocalResponse<'c> {
        post_form(client, "/login", &[("email", email), ("password", password)]).await
    }

    pub fn location(response: &LocalResponse<'_>) -> Option<String> {
        response.headers().get_one("Location").map(String::from)
    }

    /// Follows a redirect and returns the rendered page, flash message included.
    pub async fn follow(client: &LocalClient, response: LocalResponse<'_>) -> String {
        let target = location(&response).expect("Response was not a redirect");
        client
            .get(target)
            .header(Header::new("Accept", "text/html"))
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap_or_default()
    }
}
