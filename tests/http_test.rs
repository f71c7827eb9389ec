mod common;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use common::{COURSE, FREE_LESSON, PAID_LESSON, harness};
use lessonpay::domain::wallet::Amount;
use lessonpay::infrastructure::gateway::SimulatedBehavior;
use lessonpay::interfaces::http::{ACTOR_HEADER, configure};
use rust_decimal_macros::dec;
use serde_json::{Value, json};

macro_rules! app {
    ($platform:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($platform.clone()))
                .configure(configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health() {
    let h = harness().await;
    let app = app!(h.platform);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_register_and_confirm() {
    let h = harness().await;
    let app = app!(h.platform);

    let req = test::TestRequest::post()
        .uri("/users")
        .set_json(json!({
            "role": "student",
            "email": "Bola@Example.test",
            "name": "Bola",
            "password": "pw",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["email"], "bola@example.test");
    assert!(body["user"].get("credentialHash").is_none());

    let token = body["confirmationToken"].as_str().unwrap();
    let req = test::TestRequest::post()
        .uri(&format!("/users/confirm/{token}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["emailConfirmed"], true);

    let admin = test::TestRequest::post()
        .uri("/users")
        .set_json(json!({
            "role": "admin",
            "email": "eve@example.test",
            "name": "Eve",
            "password": "pw",
        }))
        .to_request();
    assert_eq!(test::call_service(&app, admin).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_purchase_flow() {
    let h = harness().await;
    let (teacher, student) = h.seeded().await;
    let app = app!(h.platform);

    let access_uri = format!("/access/{student}/{COURSE}/{PAID_LESSON}");
    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri(&access_uri).to_request()).await;
    assert_eq!(body["allowed"], false);

    let initiate = || {
        test::TestRequest::post()
            .uri("/payments/initiate")
            .set_json(json!({
                "studentId": student,
                "courseKey": COURSE,
                "lessonId": PAID_LESSON,
                "gateway": "paystack",
            }))
            .to_request()
    };
    let body: Value = test::call_and_read_body_json(&app, initiate()).await;
    let reference = body["reference"].as_str().unwrap().to_string();
    assert!(body["redirectUrl"].as_str().unwrap().ends_with(&reference));

    let verify_uri = format!("/payments/verify/{reference}");
    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri(&verify_uri).to_request()).await;
    assert_eq!(body["status"], "VERIFIED");

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri(&access_uri).to_request()).await;
    assert_eq!(body["allowed"], true);

    let body: Value = test::call_and_read_body_json(&app, initiate()).await;
    assert_eq!(body["alreadyOwned"], true);

    let wallet = test::TestRequest::get()
        .uri(&format!("/wallet/{teacher}"))
        .insert_header((ACTOR_HEADER, teacher.as_str()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, wallet).await;
    assert_eq!(body["teacherId"], teacher);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_free_lesson_and_declined_payment() {
    let h = harness().await;
    let (_, student) = h.seeded().await;
    let app = app!(h.platform);

    let free = test::TestRequest::post()
        .uri("/payments/initiate")
        .set_json(json!({
            "studentId": student,
            "courseKey": COURSE,
            "lessonId": FREE_LESSON,
            "gateway": "paystack",
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, free).await;
    assert_eq!(body["free"], true);

    h.paystack
        .script_next(SimulatedBehavior::Decline("card expired".into()))
        .await;
    let paid = test::TestRequest::post()
        .uri("/payments/initiate")
        .set_json(json!({
            "studentId": student,
            "courseKey": COURSE,
            "lessonId": PAID_LESSON,
            "gateway": "paystack",
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, paid).await;
    let reference = body["reference"].as_str().unwrap();

    let verify = test::TestRequest::get()
        .uri(&format!("/payments/verify/{reference}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, verify).await;
    assert_eq!(body["status"], "FAILED");
    assert!(body["failure"].as_str().unwrap().contains("card expired"));
}

#[actix_web::test]
async fn test_withdrawal_admin_flow() {
    let h = harness().await;
    let (teacher, student) = h.seeded().await;
    h.platform
        .wallets
        .credit(&teacher, Amount::new(dec!(1000)).unwrap(), "opening balance", "seed-1")
        .await
        .unwrap();
    let app = app!(h.platform);

    let withdraw = |actor: &str, amount: &str| {
        test::TestRequest::post()
            .uri(&format!("/wallet/{teacher}/withdraw"))
            .insert_header((ACTOR_HEADER, actor.to_string()))
            .set_json(json!({
                "amount": amount,
                "bankDetails": {
                    "bankName": "GTBank",
                    "accountNumber": "0123456789",
                    "accountName": "Ada Lovelace",
                },
            }))
            .to_request()
    };

    let resp = test::call_service(&app, withdraw(&student, "100")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, withdraw(&teacher, "5000")).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = test::call_service(&app, withdraw(&teacher, "400")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let list = |actor: &str| {
        test::TestRequest::get()
            .uri("/admin/withdrawals")
            .insert_header((ACTOR_HEADER, actor.to_string()))
            .to_request()
    };
    assert_eq!(test::call_service(&app, list(&teacher)).await.status(), StatusCode::FORBIDDEN);

    let queue: Value = test::call_and_read_body_json(&app, list(&h.admin_id)).await;
    let queue = queue.as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["teacherName"], "ada");
    let tx_id = queue[0]["transaction"]["id"].as_str().unwrap().to_string();

    let resolve = || {
        test::TestRequest::post()
            .uri(&format!("/admin/withdrawals/{tx_id}/resolve"))
            .insert_header((ACTOR_HEADER, h.admin_id.clone()))
            .set_json(json!({ "outcome": "approve" }))
            .to_request()
    };
    let body: Value = test::call_and_read_body_json(&app, resolve()).await;
    assert_eq!(body["status"], "completed");

    let resp = test::call_service(&app, resolve()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_unknown_lesson_is_not_found() {
    let h = harness().await;
    h.seeded().await;
    let app = app!(h.platform);

    let req = test::TestRequest::get()
        .uri(&format!("/access/anyone/{COURSE}/missing"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/payments/verify/nope").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_wallet_routes_refuse_non_teachers_and_unknown_actors() {
    let h = harness().await;
    let (teacher, student) = h.seeded().await;
    let app = app!(h.platform);

    let withdraw = |actor: &str, owner: &str| {
        test::TestRequest::post()
            .uri(&format!("/wallet/{owner}/withdraw"))
            .insert_header((ACTOR_HEADER, actor.to_string()))
            .set_json(json!({
                "amount": "100",
                "bankDetails": {
                    "bankName": "GTBank",
                    "accountNumber": "0123456789",
                    "accountName": "Bola Ade",
                },
            }))
            .to_request()
    };

    let resp = test::call_service(&app, withdraw(&student, &student)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, withdraw("ghost", "ghost")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let view = test::TestRequest::get()
        .uri(&format!("/wallet/{teacher}"))
        .insert_header((ACTOR_HEADER, "ghost"))
        .to_request();
    assert_eq!(test::call_service(&app, view).await.status(), StatusCode::FORBIDDEN);

    let wallet = h.platform.wallets.wallet(&student).await.unwrap();
    assert!(wallet.transactions.is_empty());
}
