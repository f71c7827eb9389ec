#![allow(dead_code)]

use lessonpay::application::identity::NewUser;
use lessonpay::application::settlement::Initiation;
use lessonpay::application::{Collaborators, Platform};
use lessonpay::config::{AppConfig, SettlementConfig};
use lessonpay::domain::catalog::Lesson;
use lessonpay::domain::payment::{Gateway, PaymentAttempt};
use lessonpay::domain::ports::{GatewayHandle, Stores};
use lessonpay::domain::user::Role;
use lessonpay::domain::wallet::BankDetails;
use lessonpay::infrastructure::gateway::SimulatedGateway;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const COURSE: &str = "math101";
pub const FREE_LESSON: &str = "intro";
pub const PAID_LESSON: &str = "vectors";
pub const PRICE: u64 = 1500;

pub fn fast_config() -> AppConfig {
    AppConfig {
        settlement: SettlementConfig {
            confirmation_timeout: Duration::from_millis(300),
            gateway_call_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            ..SettlementConfig::default()
        },
        ..AppConfig::default()
    }
}

/// A platform over the given stores whose Paystack checkouts the test can script.
pub struct Harness {
    pub platform: Platform,
    pub paystack: SimulatedGateway,
    pub admin_id: String,
}

pub async fn harness() -> Harness {
    harness_with(Stores::in_memory(), SimulatedGateway::new(Gateway::Paystack, "https://pay.test")).await
}

pub async fn harness_with(stores: Stores, paystack: SimulatedGateway) -> Harness {
    let mut harness = Harness {
        platform: platform_with(stores, paystack.clone()),
        paystack,
        admin_id: String::new(),
    };
    harness.admin_id = harness.register("root", Role::Admin).await;
    harness
}

/// Wires a platform over existing stores without seeding anything.
pub fn platform_with(stores: Stores, paystack: SimulatedGateway) -> Platform {
    let config = fast_config();
    let mut collaborators = Collaborators::simulated(&config);
    collaborators
        .gateways
        .retain(|g| g.provider() != Gateway::Paystack);
    let scripted: GatewayHandle = Arc::new(paystack);
    collaborators.gateways.push(scripted);

    Platform::new(stores, collaborators, &config.settlement).unwrap()
}

impl Harness {
    pub async fn register(&self, name: &str, role: Role) -> String {
        let (user, token) = self
            .platform
            .identity
            .register(NewUser {
                role,
                email: format!("{name}@example.test"),
                name: name.to_string(),
                password: "password".to_string(),
                whatsapp: None,
            })
            .await
            .unwrap();
        self.platform.identity.confirm_email(&token).await.unwrap();
        user.id
    }

    pub async fn approved_teacher(&self, name: &str) -> String {
        let id = self.register(name, Role::Teacher).await;
        self.platform
            .admin
            .approve_teacher(&self.admin_id, &id)
            .await
            .unwrap();
        id
    }

    /// Publishes `math101` with a free intro and a paid lesson.
    pub async fn seed_course(&self, teacher_id: &str) {
        let catalog = &self.platform.catalog;
        catalog.publish_course(teacher_id, COURSE, "Mathematics").await.unwrap();
        catalog
            .put_lesson(teacher_id, COURSE, Lesson::free(FREE_LESSON))
            .await
            .unwrap();
        catalog
            .put_lesson(teacher_id, COURSE, Lesson::paid(PAID_LESSON, PRICE))
            .await
            .unwrap();
    }

    /// Teacher, student and course in one go; returns (teacher_id, student_id).
    pub async fn seeded(&self) -> (String, String) {
        let teacher = self.approved_teacher("ada").await;
        let student = self.register("bola", Role::Student).await;
        self.seed_course(&teacher).await;
        (teacher, student)
    }

    pub async fn checkout(&self, student_id: &str, gateway: Gateway) -> PaymentAttempt {
        match self
            .platform
            .settlement
            .initiate(student_id, COURSE, PAID_LESSON, gateway)
            .await
            .unwrap()
        {
            Initiation::Checkout(attempt) => attempt,
            other => panic!("expected a checkout, got {other:?}"),
        }
    }
}

pub fn bank() -> BankDetails {
    BankDetails {
        bank_name: "GTBank".to_string(),
        account_number: "0123456789".to_string(),
        account_name: "Ada Lovelace".to_string(),
    }
}

/// Writes a replay script with `rows` purchases by distinct students of one paid lesson.
pub fn generate_replay_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record(["op", "user", "target", "lesson", "amount"])?;
    wtr.write_record(["admin", "root", "", "", ""])?;
    wtr.write_record(["teacher", "ada", "", "", ""])?;
    wtr.write_record(["approve_teacher", "root", "ada", "", ""])?;
    wtr.write_record(["course", "ada", COURSE, "", ""])?;
    wtr.write_record(["lesson", "ada", COURSE, PAID_LESSON, "1000"])?;

    for i in 1..=rows {
        let student = format!("student{i}");
        wtr.write_record(["student", student.as_str(), "", "", ""])?;
        wtr.write_record(["purchase", student.as_str(), COURSE, PAID_LESSON, ""])?;
    }

    wtr.flush()?;
    Ok(())
}
