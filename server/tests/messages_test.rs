//! Integration tests for message sending, history, and sidebar previews.

mod common;

use common::{register_user, start_test_server};
use serde_json::json;

#[tokio::test]
async fn send_requires_text_or_media() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let (token_a, _id_a) = register_user(&base_url, "empty_sender").await;
    let (_token_b, id_b) = register_user(&base_url, "empty_receiver").await;

    // No body, no media
    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Whitespace-only body is still empty
    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn send_rejects_self_and_unknown_receiver() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let (token, id) = register_user(&base_url, "loner").await;

    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "message": "hello me" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/api/messages/no-such-user", base_url))
        .bearer_auth(&token)
        .json(&json!({ "message": "hello void" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn message_kind_is_derived_from_content() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let (token_a, id_a) = register_user(&base_url, "kinds_sender").await;
    let (_token_b, id_b) = register_user(&base_url, "kinds_receiver").await;

    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .json(&json!({ "message": "plain text" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "text");
    assert_eq!(body["senderId"], id_a.as_str());
    assert_eq!(body["receiverId"], id_b.as_str());

    // Media only, kind inferred from the URL extension
    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .json(&json!({ "media": [{ "url": "https://cdn.example/pic.png?w=64" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "media");
    assert_eq!(body["message"], "");
    assert_eq!(body["media"][0]["kind"], "image");

    // Text plus media, with an explicit kind tag kept as-is
    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .json(&json!({
            "message": "check this out",
            "media": [{ "url": "https://cdn.example/clip.bin", "kind": "video" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "mixed");
    assert_eq!(body["media"][0]["kind"], "video");
}

#[tokio::test]
async fn send_rejects_too_many_attachments() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let (token_a, _id_a) = register_user(&base_url, "spammer").await;
    let (_token_b, id_b) = register_user(&base_url, "spammed").await;

    let media: Vec<_> = (0..6)
        .map(|i| json!({ "url": format!("https://cdn.example/{}.png", i) }))
        .collect();

    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .json(&json!({ "media": media }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn history_is_shared_and_chronological() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let (token_a, id_a) = register_user(&base_url, "historian").await;
    let (token_b, id_b) = register_user(&base_url, "subject").await;

    // Before any message the history is an empty list, not an error
    let resp = client
        .get(format!("{}/api/messages/{}", base_url, id_b))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let messages: serde_json::Value = resp.json().await.unwrap();
    assert!(messages.as_array().unwrap().is_empty());

    for text in ["first", "second"] {
        let resp = client
            .post(format!("{}/api/messages/{}", base_url, id_b))
            .bearer_auth(&token_a)
            .json(&json!({ "message": text }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }
    let resp = client
        .post(format!("{}/api/messages/{}", base_url, id_a))
        .bearer_auth(&token_b)
        .json(&json!({ "message": "third" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Both participants see the same chronological transcript
    for token in [&token_a, &token_b] {
        let other = if token == &token_a { &id_b } else { &id_a };
        let resp = client
            .get(format!("{}/api/messages/{}", base_url, other))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let messages: serde_json::Value = resp.json().await.unwrap();
        let texts: Vec<&str> = messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }
}

#[tokio::test]
async fn latest_returns_one_preview_per_conversation() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let (token_a, _id_a) = register_user(&base_url, "previewer").await;
    let (_token_b, id_b) = register_user(&base_url, "contact_one").await;
    let (_token_c, id_c) = register_user(&base_url, "contact_two").await;

    for (receiver, text) in [(&id_b, "to b, old"), (&id_b, "to b, new"), (&id_c, "to c")] {
        let resp = client
            .post(format!("{}/api/messages/{}", base_url, receiver))
            .bearer_auth(&token_a)
            .json(&json!({ "message": text }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = client
        .get(format!("{}/api/messages/latest", base_url))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let previews: serde_json::Value = resp.json().await.unwrap();
    let texts: Vec<&str> = previews
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();

    // One entry per conversation, newest conversation first, and only the
    // newest message of each
    assert_eq!(texts, vec!["to c", "to b, new"]);
}
