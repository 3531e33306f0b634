mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{create_ticket, register_employee, request_json, seed_user, setup};
use helpdesk::authz::Role;

#[tokio::test]
async fn register_create_and_fetch_ticket_flow() -> Result<()> {
    let t = setup().await?;

    let (user_id, token) = register_employee(&t.app, "Ada", "ada@example.com").await?;

    let ticket_id = create_ticket(&t.app, &token, "Laptop will not boot").await?;

    let (status, body) =
        request_json(&t.app, "GET", &format!("/tickets/{ticket_id}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "Laptop will not boot");
    assert_eq!(body["status"], "open");
    assert_eq!(body["created_by"], json!(user_id.to_string()));
    assert_eq!(body["assigned_to"], serde_json::Value::Null);

    // Field update by the creator while the ticket is still open
    let (status, body) = request_json(
        &t.app,
        "PUT",
        &format!("/tickets/{ticket_id}"),
        Some(&token),
        Some(json!({ "priority": "high", "category": "hardware" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["priority"], "high");
    assert_eq!(body["category"], "hardware");

    let (status, body) = request_json(&t.app, "GET", "/tickets", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));

    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email() -> Result<()> {
    let t = setup().await?;

    register_employee(&t.app, "Ada", "dup@example.com").await?;

    let (status, _) = request_json(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Ada 2", "email": "dup@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn login_and_me_roundtrip() -> Result<()> {
    let t = setup().await?;

    register_employee(&t.app, "Grace", "grace@example.com").await?;

    let (status, body) = request_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "grace@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = request_json(&t.app, "GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["role"], "employee");

    let (status, _) = request_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "grace@example.com", "password": "wrong-password" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn requests_without_token_are_rejected() -> Result<()> {
    let t = setup().await?;

    let (status, _) = request_json(&t.app, "GET", "/tickets", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn deactivated_account_is_rejected_before_handlers() -> Result<()> {
    let t = setup().await?;

    let (user_id, token) = register_employee(&t.app, "Mallory", "mallory@example.com").await?;

    sqlx::query("UPDATE users SET active = 0 WHERE id = ?")
        .bind(user_id)
        .execute(&t.pool)
        .await?;

    let (status, _) = request_json(&t.app, "GET", "/tickets", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn ticket_lists_are_scoped_per_role() -> Result<()> {
    let t = setup().await?;

    let (_, ada_token) = register_employee(&t.app, "Ada", "ada2@example.com").await?;
    let (_, bob_token) = register_employee(&t.app, "Bob", "bob@example.com").await?;
    let (agent_id, agent_token) = seed_user(&t.pool, Role::Agent, "agent@example.com").await?;
    let (_, supervisor_token) =
        seed_user(&t.pool, Role::Supervisor, "supervisor@example.com").await?;

    let ada_ticket = create_ticket(&t.app, &ada_token, "Ada's problem").await?;
    let _bob_ticket = create_ticket(&t.app, &bob_token, "Bob's problem").await?;

    // Employees only see their own tickets.
    let (_, body) = request_json(&t.app, "GET", "/tickets", Some(&ada_token), None).await?;
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));
    assert_eq!(body[0]["subject"], "Ada's problem");

    // Unassigned tickets are visible to every agent.
    let (_, body) = request_json(&t.app, "GET", "/tickets", Some(&agent_token), None).await?;
    assert_eq!(body.as_array().map(|a| a.len()), Some(2));

    // Once Ada's ticket is claimed, the other agent's queue shrinks to the
    // unclaimed pool.
    let (status, _) = request_json(
        &t.app,
        "POST",
        &format!("/tickets/{ada_ticket}/assign"),
        Some(&agent_token),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, other_agent_token) = seed_user(&t.pool, Role::Agent, "agent2@example.com").await?;
    let (_, body) =
        request_json(&t.app, "GET", "/tickets", Some(&other_agent_token), None).await?;
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));

    // The assignee keeps seeing the claimed ticket.
    let (_, body) = request_json(&t.app, "GET", "/tickets", Some(&agent_token), None).await?;
    let subjects: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["subject"].as_str())
        .collect();
    assert!(subjects.contains(&"Ada's problem"));
    assert_eq!(
        body.as_array()
            .unwrap()
            .iter()
            .find(|v| v["subject"] == "Ada's problem")
            .and_then(|v| v["assigned_to"].as_str()),
        Some(agent_id.to_string().as_str())
    );

    // Supervisors see everything.
    let (_, body) = request_json(&t.app, "GET", "/tickets", Some(&supervisor_token), None).await?;
    assert_eq!(body.as_array().map(|a| a.len()), Some(2));

    // Bob cannot read Ada's ticket.
    let (status, _) = request_json(
        &t.app,
        "GET",
        &format!("/tickets/{ada_ticket}"),
        Some(&bob_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn health_reports_db_status() -> Result<()> {
    let t = setup().await?;

    let (status, body) = request_json(&t.app, "GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);

    Ok(())
}
