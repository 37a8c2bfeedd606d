use crate::{
    auth::{Client, DbClient, DbUserSession, UserSession, hash_password},
    error::AppError,
    models::{ClientInput, DbLesson, DbTest, Lesson, NewQuestion, QUESTIONS_PER_TEST, Test},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

const CLIENT_COLUMNS: &str = "id, name, email, license_category, is_admin";

const TEST_COLUMNS: &str = "id, date, \
     question_1, correct_answer_1, false_answer_1, \
     question_2, correct_answer_2, false_answer_2, \
     question_3, correct_answer_3, false_answer_3, \
     answer_1, answer_2, answer_3, passed, reviewed, client_id";

fn email_conflict(err: sqlx::Error, email: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Validation(format!("A client with email {} already exists.", email));
        }
    }
    AppError::Database(err)
}

#[instrument]
pub async fn get_client(pool: &Pool<Sqlite>, id: i64) -> Result<Client, AppError> {
    info!("Fetching client by ID");
    let row = sqlx::query_as::<_, DbClient>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(client) => Ok(Client::from(client)),
        _ => Err(AppError::NotFound(format!(
            "Client with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_client_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<Client>, AppError> {
    info!("Finding client by email");
    let row = sqlx::query_as::<_, DbClient>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Client::from))
}

#[instrument]
pub async fn get_all_clients(pool: &Pool<Sqlite>) -> Result<Vec<Client>, AppError> {
    info!("Getting all clients");
    let rows = sqlx::query_as::<_, DbClient>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name COLLATE NOCASE, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Client::from).collect())
}

/// Returns the client only when the password matches. Unknown emails and wrong
/// passwords are indistinguishable to the caller.
#[instrument(skip_all, fields(email = %email))]
pub async fn authenticate_client(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<Client>, AppError> {
    info!("Authenticating client");
    let row = sqlx::query_as::<_, (i64, String)>("SELECT id, password FROM clients WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    let Some((id, hash)) = row else {
        return Ok(None);
    };

    match bcrypt::verify(password, &hash) {
        Ok(true) => Ok(Some(get_client(pool, id).await?)),
        _ => Ok(None),
    }
}

#[instrument(skip(pool, password), fields(email = %client.email))]
pub async fn create_client(
    pool: &Pool<Sqlite>,
    client: &ClientInput<'_>,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating new client");

    if find_client_by_email(pool, client.email).await?.is_some() {
        return Err(AppError::Validation(format!(
            "A client with email {} already exists.",
            client.email
        )));
    }

    let hashed_password = hash_password(password)?;

    let res = sqlx::query(
        "INSERT INTO clients (name, email, password, license_category, is_admin)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(client.name)
    .bind(client.email)
    .bind(hashed_password)
    .bind(client.license_category)
    .bind(client.is_admin)
    .execute(pool)
    .await
    .map_err(|err| email_conflict(err, client.email))?;

    Ok(res.last_insert_rowid())
}

/// A `None` password leaves the stored hash untouched.
#[instrument(skip(pool, password), fields(email = %client.email))]
pub async fn update_client(
    pool: &Pool<Sqlite>,
    id: i64,
    client: &ClientInput<'_>,
    password: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating client");

    get_client(pool, id).await?;

    let existing = sqlx::query_as::<_, (i64,)>("SELECT id FROM clients WHERE email = ? AND id != ?")
        .bind(client.email)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "A client with email {} already exists.",
            client.email
        )));
    }

    let hashed_password = password.map(hash_password).transpose()?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE clients SET name = ?, email = ?, license_category = ?, is_admin = ?
         WHERE id = ?",
    )
    .bind(client.name)
    .bind(client.email)
    .bind(client.license_category)
    .bind(client.is_admin)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|err| email_conflict(err, client.email))?;

    if let Some(hashed_password) = hashed_password {
        sqlx::query("UPDATE clients SET password = ? WHERE id = ?")
            .bind(hashed_password)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Deletes the client together with their lessons, tests and sessions.
#[instrument]
pub async fn delete_client(pool: &Pool<Sqlite>, id: i64) -> Result<Client, AppError> {
    info!("Deleting client and owned records");

    let client = get_client(pool, id).await?;

    let mut tx = pool.begin().await?;

    let lessons = sqlx::query("DELETE FROM lessons WHERE client_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let tests = sqlx::query("DELETE FROM tests WHERE client_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM client_sessions WHERE client_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM clients WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        lessons_removed = lessons.rows_affected(),
        tests_removed = tests.rows_affected(),
        "Client deleted"
    );

    Ok(client)
}

#[instrument]
pub async fn create_lesson(
    pool: &Pool<Sqlite>,
    client_id: i64,
    description: &str,
    date: NaiveDate,
) -> Result<i64, AppError> {
    info!("Creating lesson");
    get_client(pool, client_id).await?;

    let res = sqlx::query("INSERT INTO lessons (description, date, client_id) VALUES (?, ?, ?)")
        .bind(description)
        .bind(date)
        .bind(client_id)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_lessons_for_client(
    pool: &Pool<Sqlite>,
    client_id: i64,
) -> Result<Vec<Lesson>, AppError> {
    info!("Getting lessons for client");
    let rows = sqlx::query_as::<_, DbLesson>(
        "SELECT id, description, date, client_id FROM lessons
         WHERE client_id = ?
         ORDER BY date DESC, id DESC",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Lesson::from).collect())
}

#[instrument]
pub async fn delete_lesson(
    pool: &Pool<Sqlite>,
    client_id: i64,
    lesson_id: i64,
) -> Result<(), AppError> {
    info!("Deleting lesson");
    let res = sqlx::query("DELETE FROM lessons WHERE id = ? AND client_id = ?")
        .bind(lesson_id)
        .bind(client_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Lesson {} of client {} not found in database",
            lesson_id, client_id
        )));
    }

    Ok(())
}

#[instrument(skip(questions))]
pub async fn create_test(
    pool: &Pool<Sqlite>,
    client_id: i64,
    date: NaiveDate,
    questions: &[NewQuestion; QUESTIONS_PER_TEST],
) -> Result<i64, AppError> {
    info!("Creating test");
    get_client(pool, client_id).await?;

    let [q1, q2, q3] = questions;

    let res = sqlx::query(
        "INSERT INTO tests (date,
             question_1, correct_answer_1, false_answer_1,
             question_2, correct_answer_2, false_answer_2,
             question_3, correct_answer_3, false_answer_3,
             client_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(date)
    .bind(&q1.question)
    .bind(&q1.correct_answer)
    .bind(&q1.false_answer)
    .bind(&q2.question)
    .bind(&q2.correct_answer)
    .bind(&q2.false_answer)
    .bind(&q3.question)
    .bind(&q3.correct_answer)
    .bind(&q3.false_answer)
    .bind(client_id)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_test(pool: &Pool<Sqlite>, test_id: i64) -> Result<Test, AppError> {
    info!("Getting test");
    let row = sqlx::query_as::<_, DbTest>(&format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = ?"))
        .bind(test_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(test) => Ok(Test::from(test)),
        _ => Err(AppError::NotFound(format!(
            "Test with id {} not found in database",
            test_id
        ))),
    }
}

#[instrument]
pub async fn get_tests_for_client(
    pool: &Pool<Sqlite>,
    client_id: i64,
) -> Result<Vec<Test>, AppError> {
    info!("Getting tests for client");
    let rows = sqlx::query_as::<_, DbTest>(&format!(
        "SELECT {TEST_COLUMNS} FROM tests
         WHERE client_id = ?
         ORDER BY date DESC, id DESC"
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Test::from).collect())
}

/// The most recently dated test; on equal dates the highest id wins.
#[instrument]
pub async fn get_active_test(
    pool: &Pool<Sqlite>,
    client_id: i64,
) -> Result<Option<Test>, AppError> {
    info!("Getting active test for client");
    let row = sqlx::query_as::<_, DbTest>(&format!(
        "SELECT {TEST_COLUMNS} FROM tests
         WHERE client_id = ?
         ORDER BY date DESC, id DESC
         LIMIT 1"
    ))
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Test::from))
}

/// Submitted tests that no admin has looked at yet, oldest first.
#[instrument]
pub async fn get_tests_awaiting_review(pool: &Pool<Sqlite>) -> Result<Vec<Test>, AppError> {
    info!("Getting tests awaiting review");
    let rows = sqlx::query_as::<_, DbTest>(&format!(
        "SELECT {TEST_COLUMNS} FROM tests
         WHERE reviewed = 0
           AND answer_1 IS NOT NULL AND answer_2 IS NOT NULL AND answer_3 IS NOT NULL
         ORDER BY date, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Test::from).collect())
}

/// Writes the client's answers into their active test and sends it back for
/// review, discarding any earlier verdict. `Ok(None)` when the client has no
/// test at all.
#[instrument(skip(answers))]
pub async fn submit_test_answers(
    pool: &Pool<Sqlite>,
    client_id: i64,
    answers: [&str; QUESTIONS_PER_TEST],
) -> Result<Option<i64>, AppError> {
    info!("Submitting test answers");

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, DbTest>(&format!(
        "SELECT {TEST_COLUMNS} FROM tests
         WHERE client_id = ?
         ORDER BY date DESC, id DESC
         LIMIT 1"
    ))
    .bind(client_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(test) = row.map(Test::from) else {
        tx.rollback().await?;
        return Ok(None);
    };

    for (question, answer) in test.questions.iter().zip(answers) {
        if answer.is_empty() {
            return Err(AppError::Validation(
                "Please answer every question.".to_string(),
            ));
        }
        if !question.accepts(answer) {
            return Err(AppError::Validation(format!(
                "Answer to question {} must be one of the offered options.",
                question.number
            )));
        }
    }

    let [answer_1, answer_2, answer_3] = answers;

    sqlx::query(
        "UPDATE tests
         SET answer_1 = ?, answer_2 = ?, answer_3 = ?, reviewed = 0, passed = 0
         WHERE id = ?",
    )
    .bind(answer_1)
    .bind(answer_2)
    .bind(answer_3)
    .bind(test.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(test.id))
}

/// Records the admin's verdict. There is no way back to unreviewed other than
/// a fresh submission by the client.
#[instrument]
pub async fn review_test(pool: &Pool<Sqlite>, test_id: i64, passed: bool) -> Result<(), AppError> {
    info!("Reviewing test");
    let res = sqlx::query("UPDATE tests SET passed = ?, reviewed = 1 WHERE id = ?")
        .bind(passed)
        .bind(test_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Test with id {} not found in database",
            test_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn delete_test(pool: &Pool<Sqlite>, client_id: i64, test_id: i64) -> Result<(), AppError> {
    info!("Deleting test");
    let res = sqlx::query("DELETE FROM tests WHERE id = ? AND client_id = ?")
        .bind(test_id)
        .bind(client_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Test {} of client {} not found in database",
            test_id, client_id
        )));
    }

    Ok(())
}

#[instrument(skip(pool, token))]
pub async fn create_client_session(
    pool: &Pool<Sqlite>,
    client_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating client session");

    let res = sqlx::query(
        "INSERT INTO client_sessions (client_id, token, expires_at) VALUES (?, ?, ?)",
    )
    .bind(client_id)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, client_id, token, created_at, expires_at FROM client_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM client_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM client_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
