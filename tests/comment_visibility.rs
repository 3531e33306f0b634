mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{create_ticket, register_employee, request_json, seed_user, setup};
use helpdesk::authz::Role;

async fn post_comment(
    app: &axum::Router,
    token: &str,
    ticket_id: Uuid,
    content: &str,
    internal: bool,
) -> Result<(StatusCode, serde_json::Value)> {
    request_json(
        app,
        "POST",
        &format!("/tickets/{ticket_id}/comments"),
        Some(token),
        Some(json!({ "content": content, "internal": internal })),
    )
    .await
}

#[tokio::test]
async fn internal_comments_are_hidden_from_the_creator() -> Result<()> {
    let t = setup().await?;

    let (_, employee_token) = register_employee(&t.app, "Elif", "vis@example.com").await?;
    let (_, agent_token) = seed_user(&t.pool, Role::Agent, "visagent@example.com").await?;
    let (_, supervisor_token) = seed_user(&t.pool, Role::Supervisor, "vissup@example.com").await?;

    let ticket_id = create_ticket(&t.app, &employee_token, "Printer jam").await?;

    let (status, _) = post_comment(&t.app, &employee_token, ticket_id, "It happened again", false).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post_comment(&t.app, &agent_token, ticket_id, "User seems to feed it staples", true).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post_comment(&t.app, &agent_token, ticket_id, "Please try tray 2", false).await?;
    assert_eq!(status, StatusCode::CREATED);

    // Employee view: internal note filtered out, order preserved.
    let (status, body) = request_json(
        &t.app,
        "GET",
        &format!("/tickets/{ticket_id}/comments"),
        Some(&employee_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["content"].as_str())
        .collect();
    assert_eq!(contents, vec!["It happened again", "Please try tray 2"]);
    assert!(body.as_array().unwrap().iter().all(|c| c["is_internal"] == false));

    // Agent-class viewers see the whole thread.
    for token in [&agent_token, &supervisor_token] {
        let (_, body) = request_json(
            &t.app,
            "GET",
            &format!("/tickets/{ticket_id}/comments"),
            Some(token),
            None,
        )
        .await?;
        assert_eq!(body.as_array().map(|a| a.len()), Some(3));
    }

    Ok(())
}

#[tokio::test]
async fn employees_cannot_author_internal_comments() -> Result<()> {
    let t = setup().await?;

    let (_, employee_token) = register_employee(&t.app, "Elif", "vis2@example.com").await?;
    let ticket_id = create_ticket(&t.app, &employee_token, "Secret?").await?;

    let (status, _) = post_comment(&t.app, &employee_token, ticket_id, "my own note", true).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn commenting_requires_a_relationship_with_the_ticket() -> Result<()> {
    let t = setup().await?;

    let (_, creator_token) = register_employee(&t.app, "Elif", "vis3@example.com").await?;
    let (_, other_token) = register_employee(&t.app, "Bob", "vis4@example.com").await?;
    let (_, agent_token) = seed_user(&t.pool, Role::Agent, "visagent2@example.com").await?;
    let (_, other_agent_token) = seed_user(&t.pool, Role::Agent, "visagent3@example.com").await?;

    let ticket_id = create_ticket(&t.app, &creator_token, "Who may speak").await?;

    // A stranger employee is denied outright.
    let (status, _) = post_comment(&t.app, &other_token, ticket_id, "drive-by", false).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unassigned: any agent may comment (triage behavior).
    let (status, _) = post_comment(&t.app, &other_agent_token, ticket_id, "looking", false).await?;
    assert_eq!(status, StatusCode::CREATED);

    // Claimed by agent 1: agent 2 loses access.
    request_json(
        &t.app,
        "POST",
        &format!("/tickets/{ticket_id}/assign"),
        Some(&agent_token),
        Some(json!({})),
    )
    .await?;
    let (status, _) = post_comment(&t.app, &other_agent_token, ticket_id, "still looking", false).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn comment_edit_and_delete_follow_ownership() -> Result<()> {
    let t = setup().await?;

    let (_, employee_token) = register_employee(&t.app, "Elif", "vis5@example.com").await?;
    let (_, agent_token) = seed_user(&t.pool, Role::Agent, "visagent4@example.com").await?;
    let (_, supervisor_token) = seed_user(&t.pool, Role::Supervisor, "vissup2@example.com").await?;
    let (_, admin_token) = seed_user(&t.pool, Role::Admin, "visadmin@example.com").await?;

    let ticket_id = create_ticket(&t.app, &employee_token, "Ownership").await?;

    let (_, comment) = post_comment(&t.app, &employee_token, ticket_id, "original", false).await?;
    let comment_id = comment["id"].as_str().unwrap().to_string();

    // The author edits: content changes, edited_at is stamped, the internal
    // flag is untouched.
    let (status, body) = request_json(
        &t.app,
        "PUT",
        &format!("/tickets/{ticket_id}/comments/{comment_id}"),
        Some(&employee_token),
        Some(json!({ "content": "edited" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "edited");
    assert!(body["edited_at"].is_string());
    assert_eq!(body["is_internal"], false);

    // Agent (claimed ticket or not) cannot edit someone else's comment.
    let (status, _) = request_json(
        &t.app,
        "PUT",
        &format!("/tickets/{ticket_id}/comments/{comment_id}"),
        Some(&agent_token),
        Some(json!({ "content": "hijacked" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Supervisors have no delete override either.
    let (status, _) = request_json(
        &t.app,
        "DELETE",
        &format!("/tickets/{ticket_id}/comments/{comment_id}"),
        Some(&supervisor_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin may delete anyone's comment.
    let (status, _) = request_json(
        &t.app,
        "DELETE",
        &format!("/tickets/{ticket_id}/comments/{comment_id}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = request_json(
        &t.app,
        "GET",
        &format!("/tickets/{ticket_id}/comments"),
        Some(&employee_token),
        None,
    )
    .await?;
    assert_eq!(body.as_array().map(|a| a.len()), Some(0));

    Ok(())
}
