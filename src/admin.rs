use std::collections::HashMap;

use rocket::State;
use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::auth::{Admin, Permission};
use crate::db::{
    create_client, create_lesson, create_test, delete_client as remove_client,
    delete_lesson as remove_lesson, delete_test as remove_test, get_all_clients, get_client,
    get_lessons_for_client, get_test, get_tests_awaiting_review, get_tests_for_client,
    review_test as record_review, update_client,
};
use crate::error::AppError;
use crate::models::{ClientInput, NewQuestion, TestOverview};
use crate::routes::flash_view;
use crate::validation::{FlashOnInvalid, FormError, parse_date};

#[get("/admin")]
pub async fn admin_dashboard(
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::ViewAllClients)?;

    let clients = get_all_clients(db).await?;
    let names: HashMap<i64, &str> = clients.iter().map(|c| (c.id, c.name.as_str())).collect();

    let pending: Vec<TestOverview> = get_tests_awaiting_review(db)
        .await?
        .into_iter()
        .map(|test| {
            let client_name = names.get(&test.client_id).map(|name| name.to_string());
            TestOverview {
                client_name,
                ..TestOverview::from(test)
            }
        })
        .collect();

    Ok(Template::render(
        "admin",
        context! {
            title: "Administration",
            flash: flash_view(flash),
            clients: &clients,
            pending_reviews: pending,
            current_user: &admin.0,
        },
    ))
}

#[derive(FromForm, Validate)]
pub struct ClientForm {
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Name is required."))]
    name: String,
    #[field(default = String::new())]
    #[validate(email(message = "A valid email address is required."))]
    email: String,
    #[field(default = String::new())]
    #[validate(length(equal = 1, message = "License category must be a single character."))]
    license_category: String,
    #[field(default = String::new())]
    password: String,
    is_admin: bool,
}

impl ClientForm {
    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.license_category = self.license_category.trim().to_uppercase();
        self
    }

    fn as_input(&self) -> ClientInput<'_> {
        ClientInput {
            name: &self.name,
            email: &self.email,
            license_category: &self.license_category,
            is_admin: self.is_admin,
        }
    }
}

#[get("/admin/add")]
pub fn add_client_form(
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::ManageClients)?;

    Ok(Template::render(
        "add_client",
        context! {
            title: "Add client",
            flash: flash_view(flash),
            current_user: &admin.0,
        },
    ))
}

#[post("/admin/add", data = "<form>")]
pub async fn add_client(
    admin: Admin,
    form: Form<ClientForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, FormError> {
    admin.require_permission(Permission::ManageClients)?;

    let form = form.into_inner().normalized();
    form.validate().flash_on_invalid(uri!(add_client_form))?;

    if form.password.is_empty() {
        return Err(AppError::Validation(
            "All fields are required, including the password.".to_string(),
        )
        .into_flash(uri!(add_client_form)));
    }

    let id = create_client(db, &form.as_input(), &form.password)
        .await
        .flash_on_invalid(uri!(add_client_form))?;

    info!(client_id = id, admin = %admin.email, "Client added");

    Ok(Flash::success(
        Redirect::found(uri!(admin_dashboard)),
        format!("Client {} added successfully!", form.name),
    ))
}

#[get("/admin/edit/<id>")]
pub async fn edit_client_form(
    id: i64,
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::ManageClients)?;

    let client = get_client(db, id).await?;

    Ok(Template::render(
        "edit_client",
        context! {
            title: format!("Edit {}", client.name),
            flash: flash_view(flash),
            client: client,
            current_user: &admin.0,
        },
    ))
}

/// A blank password keeps the current one.
#[post("/admin/edit/<id>", data = "<form>")]
pub async fn edit_client(
    id: i64,
    admin: Admin,
    form: Form<ClientForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, FormError> {
    admin.require_permission(Permission::ManageClients)?;

    let form = form.into_inner().normalized();
    form.validate().flash_on_invalid(uri!(edit_client_form(id)))?;

    let password = Some(form.password.as_str()).filter(|p| !p.is_empty());

    update_client(db, id, &form.as_input(), password)
        .await
        .flash_on_invalid(uri!(edit_client_form(id)))?;

    info!(client_id = id, admin = %admin.email, "Client updated");

    Ok(Flash::success(
        Redirect::found(uri!(admin_dashboard)),
        format!("Client {} updated successfully!", form.name),
    ))
}

#[post("/admin/delete/<id>")]
pub async fn delete_client(
    id: i64,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    admin.require_permission(Permission::ManageClients)?;

    let client = remove_client(db, id).await?;

    info!(client_id = id, admin = %admin.email, "Client deleted");

    Ok(Flash::success(
        Redirect::found(uri!(admin_dashboard)),
        format!("Client {} deleted successfully!", client.name),
    ))
}

#[get("/admin/client/<client_id>")]
pub async fn client_detail(
    client_id: i64,
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::ViewAllClients)?;

    let client = get_client(db, client_id).await?;
    let lessons = get_lessons_for_client(db, client_id).await?;
    let tests: Vec<TestOverview> = get_tests_for_client(db, client_id)
        .await?
        .into_iter()
        .map(TestOverview::from)
        .collect();

    Ok(Template::render(
        "client_detail",
        context! {
            title: format!("Client {}", client.name),
            flash: flash_view(flash),
            client: client,
            lessons: lessons,
            tests: tests,
            current_user: &admin.0,
        },
    ))
}

#[derive(FromForm, Validate)]
pub struct LessonForm {
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Description is required."))]
    description: String,
    #[field(default = String::new())]
    date: String,
}

#[get("/admin/client/<client_id>/add_lesson")]
pub async fn add_lesson_form(
    client_id: i64,
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::ManageLessons)?;

    let client = get_client(db, client_id).await?;

    Ok(Template::render(
        "add_lesson",
        context! {
            title: format!("New lesson for {}", client.name),
            flash: flash_view(flash),
            client: client,
            current_user: &admin.0,
        },
    ))
}

#[post("/admin/client/<client_id>/add_lesson", data = "<form>")]
pub async fn add_lesson(
    client_id: i64,
    admin: Admin,
    form: Form<LessonForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, FormError> {
    admin.require_permission(Permission::ManageLessons)?;

    let mut form = form.into_inner();
    form.description = form.description.trim().to_string();

    let date = parse_date(&form.date).flash_on_invalid(uri!(add_lesson_form(client_id)))?;
    form.validate()
        .flash_on_invalid(uri!(add_lesson_form(client_id)))?;

    let id = create_lesson(db, client_id, &form.description, date).await?;

    info!(client_id, lesson_id = id, "Lesson added");

    Ok(Flash::success(
        Redirect::found(uri!(client_detail(client_id))),
        "Lesson added successfully!",
    ))
}

#[post("/admin/client/<client_id>/delete_lesson/<lesson_id>")]
pub async fn delete_lesson(
    client_id: i64,
    lesson_id: i64,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    admin.require_permission(Permission::ManageLessons)?;

    remove_lesson(db, client_id, lesson_id).await?;

    Ok(Flash::success(
        Redirect::found(uri!(client_detail(client_id))),
        "Lesson deleted successfully!",
    ))
}

#[derive(FromForm, Validate)]
pub struct TestForm {
    #[field(default = String::new())]
    date: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 1 is required."))]
    question_1: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 1 needs a correct answer."))]
    correct_answer_1: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 1 needs a false answer."))]
    false_answer_1: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 2 is required."))]
    question_2: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 2 needs a correct answer."))]
    correct_answer_2: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 2 needs a false answer."))]
    false_answer_2: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 3 is required."))]
    question_3: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 3 needs a correct answer."))]
    correct_answer_3: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Question 3 needs a false answer."))]
    false_answer_3: String,
}

impl TestForm {
    fn normalized(mut self) -> Self {
        for field in [
            &mut self.question_1,
            &mut self.correct_answer_1,
            &mut self.false_answer_1,
            &mut self.question_2,
            &mut self.correct_answer_2,
            &mut self.false_answer_2,
            &mut self.question_3,
            &mut self.correct_answer_3,
            &mut self.false_answer_3,
        ] {
            *field = field.trim().to_string();
        }
        self
    }

    fn questions(&self) -> Result<[NewQuestion; 3], AppError> {
        let question = |text: &str, correct: &str, false_answer: &str, number: usize| {
            let question = NewQuestion {
                question: text.to_string(),
                correct_answer: correct.to_string(),
                false_answer: false_answer.to_string(),
            };

            if question.correct_answer == question.false_answer {
                return Err(AppError::Validation(format!(
                    "Question {} needs two different answers.",
                    number
                )));
            }

            Ok(question)
        };

        Ok([
            question(&self.question_1, &self.correct_answer_1, &self.false_answer_1, 1)?,
            question(&self.question_2, &self.correct_answer_2, &self.false_answer_2, 2)?,
            question(&self.question_3, &self.correct_answer_3, &self.false_answer_3, 3)?,
        ])
    }
}

#[get("/admin/client/<client_id>/add_test")]
pub async fn add_test_form(
    client_id: i64,
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::AuthorTests)?;

    let client = get_client(db, client_id).await?;

    Ok(Template::render(
        "add_test",
        context! {
            title: format!("New test for {}", client.name),
            flash: flash_view(flash),
            client: client,
            question_numbers: [1, 2, 3],
            current_user: &admin.0,
        },
    ))
}

#[post("/admin/client/<client_id>/add_test", data = "<form>")]
pub async fn add_test(
    client_id: i64,
    admin: Admin,
    form: Form<TestForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, FormError> {
    admin.require_permission(Permission::AuthorTests)?;

    let form = form.into_inner().normalized();

    let date = parse_date(&form.date).flash_on_invalid(uri!(add_test_form(client_id)))?;
    form.validate()
        .flash_on_invalid(uri!(add_test_form(client_id)))?;
    let questions = form
        .questions()
        .flash_on_invalid(uri!(add_test_form(client_id)))?;

    let id = create_test(db, client_id, date, &questions).await?;

    info!(client_id, test_id = id, "Test added");

    Ok(Flash::success(
        Redirect::found(uri!(client_detail(client_id))),
        "Test added successfully!",
    ))
}

#[get("/admin/review_test/<test_id>")]
pub async fn review_test_form(
    test_id: i64,
    admin: Admin,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    admin.require_permission(Permission::ReviewTests)?;

    let test = get_test(db, test_id).await?;
    let client = get_client(db, test.client_id).await?;

    Ok(Template::render(
        "review_test",
        context! {
            title: format!("Review test for {}", client.name),
            flash: flash_view(flash),
            client: client,
            test: TestOverview::from(test),
            current_user: &admin.0,
        },
    ))
}

#[derive(FromForm)]
pub struct ReviewForm {
    passed: bool,
}

#[post("/admin/review_test/<test_id>", data = "<form>")]
pub async fn review_test(
    test_id: i64,
    admin: Admin,
    form: Form<ReviewForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    admin.require_permission(Permission::ReviewTests)?;

    record_review(db, test_id, form.passed).await?;

    info!(test_id, passed = form.passed, admin = %admin.email, "Test reviewed");

    Ok(Flash::success(
        Redirect::found(uri!(admin_dashboard)),
        "Test reviewed successfully!",
    ))
}

#[post("/admin/client/<client_id>/delete_test/<test_id>")]
pub async fn delete_test(
    client_id: i64,
    test_id: i64,
    admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    admin.require_permission(Permission::AuthorTests)?;

    remove_test(db, client_id, test_id).await?;

    Ok(Flash::success(
        Redirect::found(uri!(client_detail(client_id))),
        "Test deleted successfully!",
    ))
}
