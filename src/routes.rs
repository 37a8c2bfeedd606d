use rocket::State;
use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket_dyn_templates::{Template, context};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::auth::{Client, Permission};
use crate::db::{get_active_test, get_client, get_lessons_for_client, get_tests_for_client, submit_test_answers};
use crate::error::AppError;
use crate::models::{TestOverview, TestPaper};
use crate::validation::{FlashOnInvalid, FormError};

#[derive(Debug, Serialize)]
pub struct FlashView {
    pub kind: String,
    pub message: String,
}

pub fn flash_view(flash: Option<FlashMessage<'_>>) -> Option<FlashView> {
    flash.map(|flash| FlashView {
        kind: flash.kind().to_string(),
        message: flash.message().to_string(),
    })
}

#[get("/")]
pub fn index(current_user: Option<Client>) -> Template {
    Template::render(
        "index",
        context! {
            title: "Driving School",
            current_user: current_user,
        },
    )
}

#[get("/services")]
pub fn services(current_user: Option<Client>) -> Template {
    Template::render(
        "services",
        context! {
            title: "Our services",
            current_user: current_user,
        },
    )
}

#[derive(FromForm, Validate)]
pub struct ContactForm {
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Please tell us your name."))]
    name: String,
    #[field(default = String::new())]
    #[validate(email(message = "Please enter a valid email address."))]
    email: String,
    #[field(default = String::new())]
    #[validate(length(min = 1, message = "Please write a message."))]
    message: String,
}

#[get("/contact")]
pub fn contact(flash: Option<FlashMessage<'_>>, current_user: Option<Client>) -> Template {
    Template::render(
        "contact",
        context! {
            title: "Contact us",
            flash: flash_view(flash),
            current_user: current_user,
        },
    )
}

/// Messages are acknowledged but not stored.
#[post("/contact", data = "<form>")]
pub fn process_contact(form: Form<ContactForm>) -> Result<Flash<Redirect>, FormError> {
    let mut form = form.into_inner();
    form.name = form.name.trim().to_string();
    form.email = form.email.trim().to_string();
    form.message = form.message.trim().to_string();

    form.validate().flash_on_invalid("/contact")?;

    info!(email = %form.email, length = form.message.len(), "Contact message received");

    Ok(Flash::success(
        Redirect::found("/contact"),
        format!("Thank you, {}. Your message has been received.", form.name),
    ))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[get("/client")]
pub async fn client_dashboard(
    user: Client,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    user.require_permission(Permission::ViewOwnRecord)?;

    let lessons = get_lessons_for_client(db, user.id).await?;
    let tests: Vec<TestOverview> = get_tests_for_client(db, user.id)
        .await?
        .into_iter()
        .map(TestOverview::from)
        .collect();

    Ok(Template::render(
        "client_dashboard",
        context! {
            title: format!("Welcome, {}", user.name),
            flash: flash_view(flash),
            lessons: lessons,
            tests: tests,
            client: &user,
            current_user: &user,
        },
    ))
}

#[derive(FromForm)]
pub struct AnswersForm {
    #[field(default = String::new())]
    answer_1: String,
    #[field(default = String::new())]
    answer_2: String,
    #[field(default = String::new())]
    answer_3: String,
}

async fn submit_answers(
    db: &Pool<Sqlite>,
    client_id: i64,
    form: &AnswersForm,
    back_to: String,
) -> Result<Flash<Redirect>, FormError> {
    let answers = [
        form.answer_1.trim(),
        form.answer_2.trim(),
        form.answer_3.trim(),
    ];

    let submitted = submit_test_answers(db, client_id, answers)
        .await
        .flash_on_invalid(back_to)?;

    match submitted {
        Some(test_id) => {
            info!(client_id, test_id, "Test submitted for review");
            Ok(Flash::success(
                Redirect::found("/client"),
                "Test submitted successfully!",
            ))
        }
        None => Ok(Flash::warning(
            Redirect::found("/client"),
            "No test found to take!",
        )),
    }
}

/// Submits answers to the logged-in client's own active test.
#[post("/client", data = "<form>")]
pub async fn submit_own_test(
    user: Client,
    form: Form<AnswersForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, FormError> {
    user.require_permission(Permission::TakeOwnTest)?;

    submit_answers(db, user.id, &form, format!("/client/{}/take_test", user.id)).await
}

#[get("/client/<client_id>/take_test")]
pub async fn take_test_form(
    client_id: i64,
    user: Client,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    if !user.may_act_for(client_id) {
        return Err(AppError::Authorization(format!(
            "{} may not take tests of client {}",
            user.email, client_id
        )));
    }

    let client = get_client(db, client_id).await?;
    let test = get_active_test(db, client_id).await?;

    Ok(Template::render(
        "take_test",
        context! {
            title: "Take your test",
            flash: flash_view(flash),
            client: client,
            test: test.as_ref().map(TestPaper::from),
            current_user: &user,
        },
    ))
}

#[post("/client/<client_id>/take_test", data = "<form>")]
pub async fn take_test(
    client_id: i64,
    user: Client,
    form: Form<AnswersForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, FormError> {
    if !user.may_act_for(client_id) {
        return Err(AppError::Authorization(format!(
            "{} may not take tests of client {}",
            user.email, client_id
        ))
        .into());
    }

    get_client(db, client_id).await?;

    submit_answers(db, client_id, &form, format!("/client/{}/take_test", client_id)).await
}
