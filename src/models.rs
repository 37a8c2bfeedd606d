use chrono::NaiveDate;
use serde::Serialize;

pub const QUESTIONS_PER_TEST: usize = 3;

/// Fields an admin sets on a client record; the password travels separately.
#[derive(Debug, Clone)]
pub struct ClientInput<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub license_category: &'a str,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub client_id: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbLesson {
    pub id: Option<i64>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub client_id: Option<i64>,
}

impl From<DbLesson> for Lesson {
    fn from(lesson: DbLesson) -> Self {
        Self {
            id: lesson.id.unwrap_or_default(),
            description: lesson.description.unwrap_or_default(),
            date: lesson.date.unwrap_or_default(),
            client_id: lesson.client_id.unwrap_or_default(),
        }
    }
}

/// One authored question: a binary choice between a correct and a false answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub question: String,
    pub correct_answer: String,
    pub false_answer: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TestQuestion {
    pub number: usize,
    pub question: String,
    pub correct_answer: String,
    pub false_answer: String,
    pub answer: Option<String>,
}

impl TestQuestion {
    /// Both choices in a fixed order that does not reveal the correct one.
    pub fn options(&self) -> [String; 2] {
        let mut options = [self.correct_answer.clone(), self.false_answer.clone()];
        options.sort();
        options
    }

    pub fn accepts(&self, answer: &str) -> bool {
        answer == self.correct_answer || answer == self.false_answer
    }

    pub fn is_answered_correctly(&self) -> bool {
        self.answer.as_deref() == Some(self.correct_answer.as_str())
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Created,
    Submitted,
    Reviewed,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Test {
    pub id: i64,
    pub date: NaiveDate,
    pub questions: Vec<TestQuestion>,
    /// Only meaningful once `reviewed` is set.
    pub passed: bool,
    pub reviewed: bool,
    pub client_id: i64,
}

impl Test {
    pub fn is_submitted(&self) -> bool {
        self.questions.iter().all(|q| q.answer.is_some())
    }

    pub fn status(&self) -> TestStatus {
        if self.reviewed {
            TestStatus::Reviewed
        } else if self.is_submitted() {
            TestStatus::Submitted
        } else {
            TestStatus::Created
        }
    }

    pub fn correct_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.is_answered_correctly())
            .count()
    }
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTest {
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub question_1: Option<String>,
    pub correct_answer_1: Option<String>,
    pub false_answer_1: Option<String>,
    pub question_2: Option<String>,
    pub correct_answer_2: Option<String>,
    pub false_answer_2: Option<String>,
    pub question_3: Option<String>,
    pub correct_answer_3: Option<String>,
    pub false_answer_3: Option<String>,
    pub answer_1: Option<String>,
    pub answer_2: Option<String>,
    pub answer_3: Option<String>,
    pub passed: Option<bool>,
    pub reviewed: Option<bool>,
    pub client_id: Option<i64>,
}

fn question(
    number: usize,
    question: Option<String>,
    correct_answer: Option<String>,
    false_answer: Option<String>,
    answer: Option<String>,
) -> TestQuestion {
    TestQuestion {
        number,
        question: question.unwrap_or_default(),
        correct_answer: correct_answer.unwrap_or_default(),
        false_answer: false_answer.unwrap_or_default(),
        answer,
    }
}

impl From<DbTest> for Test {
    fn from(db: DbTest) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            date: db.date.unwrap_or_default(),
            questions: vec![
                question(1, db.question_1, db.correct_answer_1, db.false_answer_1, db.answer_1),
                question(2, db.question_2, db.correct_answer_2, db.false_answer_2, db.answer_2),
                question(3, db.question_3, db.correct_answer_3, db.false_answer_3, db.answer_3),
            ],
            passed: db.passed.unwrap_or_default(),
            reviewed: db.reviewed.unwrap_or_default(),
            client_id: db.client_id.unwrap_or_default(),
        }
    }
}

/// A test plus the derived fields list and review pages display.
#[derive(Debug, Serialize)]
pub struct TestOverview {
    #[serde(flatten)]
    pub test: Test,
    pub status: TestStatus,
    pub correct_count: usize,
    pub client_name: Option<String>,
}

impl From<Test> for TestOverview {
    fn from(test: Test) -> Self {
        Self {
            status: test.status(),
            correct_count: test.correct_count(),
            test,
            client_name: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaperQuestion {
    pub number: usize,
    pub question: String,
    pub options: [String; 2],
    pub answer: Option<String>,
}

/// What a client sees when taking a test; correct answers are not included.
#[derive(Debug, Serialize)]
pub struct TestPaper {
    pub id: i64,
    pub date: NaiveDate,
    pub status: TestStatus,
    pub questions: Vec<PaperQuestion>,
}

impl From<&Test> for TestPaper {
    fn from(test: &Test) -> Self {
        Self {
            id: test.id,
            date: test.date,
            status: test.status(),
            questions: test
                .questions
                .iter()
                .map(|q| PaperQuestion {
                    number: q.number,
                    question: q.question.clone(),
                    options: q.options(),
                    answer: q.answer.clone(),
                })
                .collect(),
        }
    }
}
