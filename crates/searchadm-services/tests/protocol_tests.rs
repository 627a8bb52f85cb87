//! Request/response protocol tests

mod common;

use common::service;
use pretty_assertions::assert_eq;
use searchadm_core::ErrorKind;
use searchadm_services::{AdminRequest, AdminResponse};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn error_kind(response: &AdminResponse) -> ErrorKind {
    response.error.as_ref().expect("error body").kind
}

#[tokio::test]
async fn test_registry_requests() {
    let (_bridge, service) = service(1);

    let response = service
        .handle_json(r#"{"op":"add_server","name":"primary","host":"10.0.0.5","port":9312}"#)
        .await;
    assert!(response.ok);
    let data = response.data.unwrap();
    assert_eq!(data["key"], "primary");
    assert_eq!(data["state"], "connected");

    let response = service.handle(AdminRequest::ListServers).await;
    assert_eq!(response.data, Some(json!(["primary"])));

    let response = service.handle(AdminRequest::GetDefaultServer).await;
    assert_eq!(response.data, Some(json!("primary")));

    let response = service.handle(AdminRequest::GetServer { name: None }).await;
    assert_eq!(response.data.unwrap()["stats"]["calls"], 1);

    let response = service.handle(AdminRequest::RegistryStatistics).await;
    let stats = response.data.unwrap();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["error_rate"], 0.0);

    let response = service
        .handle(AdminRequest::RemoveServer {
            name: "primary".into(),
        })
        .await;
    assert_eq!(response, AdminResponse::success(Value::Null));
}

#[tokio::test]
async fn test_errors_carry_kind_and_retryability() {
    let (bridge, service) = service(1);
    bridge.refuse("down");

    let response = service
        .handle_json(r#"{"op":"add_server","name":"x","host":"down","port":1}"#)
        .await;
    assert!(!response.ok);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::OpenFailed);
    assert!(error.retryable);
    assert!(error.message.contains("down:1 refused the connection"));

    let response = service.handle(AdminRequest::GetServer { name: Some("x".into()) }).await;
    assert_eq!(error_kind(&response), ErrorKind::NotConnected);

    let response = service
        .handle(AdminRequest::AddServer {
            name: "x".into(),
            host: "up".into(),
            port: 1,
            description: None,
        })
        .await;
    assert_eq!(error_kind(&response), ErrorKind::AlreadyExists);
    assert!(!response.error.unwrap().retryable);

    let response = service.handle(AdminRequest::GetInstance { id: None }).await;
    assert_eq!(error_kind(&response), ErrorKind::NoInstance);
}

#[tokio::test]
async fn test_malformed_requests_are_rejected() {
    let (_bridge, service) = service(1);

    let response = service.handle_json("not json").await;
    assert_eq!(error_kind(&response), ErrorKind::InvalidRequest);

    let response = service.handle_json(r#"{"op":"add_server","name":"x"}"#).await;
    assert_eq!(error_kind(&response), ErrorKind::InvalidRequest);

    let response = service
        .handle_json(r#"{"op":"start_monitoring","interval_ms":0}"#)
        .await;
    assert_eq!(error_kind(&response), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_pool_requests() {
    let (_bridge, service) = service(1);

    let response = service
        .handle_json(r#"{"op":"create_instance","host":"10.0.0.6","port":9312}"#)
        .await;
    let id = response.data.unwrap()["id"].as_str().unwrap().to_string();

    let response = service.handle(AdminRequest::GetDefaultInstanceId).await;
    assert_eq!(response.data, Some(json!({ "id": id })));

    let response = service
        .handle_json(&format!(r#"{{"op":"get_instance","id":"{id}"}}"#))
        .await;
    assert!(response.ok);
    let response = service
        .handle_json(&format!(r#"{{"op":"get_instance","id":"{id}"}}"#))
        .await;
    assert_eq!(error_kind(&response), ErrorKind::NotAvailable);
    assert!(response.error.unwrap().retryable);

    let response = service
        .handle_json(&format!(r#"{{"op":"release_instance","id":"{id}"}}"#))
        .await;
    assert!(response.ok);

    let response = service
        .handle_json(r#"{"op":"create_instance","host":"10.0.0.7","port":9312}"#)
        .await;
    assert_eq!(error_kind(&response), ErrorKind::PoolFull);

    let response = service.handle(AdminRequest::PoolStats).await;
    let stats = response.data.unwrap();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["idle"], 1);
    assert_eq!(stats["capacity"], 1);

    let response = service.handle(AdminRequest::Cleanup).await;
    assert_eq!(response.data.unwrap()["removed"], 1);
}

#[tokio::test]
async fn test_serve_json_lines_until_shutdown() {
    let (_bridge, service) = service(1);
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server);
    let (client_read, mut client_write) = tokio::io::split(client);

    client_write
        .write_all(
            concat!(
                r#"{"op":"add_server","name":"a","host":"h","port":1}"#,
                "\n\n",
                r#"{"op":"invoke","operation":"status"}"#,
                "\n",
                r#"{"op":"shutdown"}"#,
                "\n",
                r#"{"op":"list_servers"}"#,
                "\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    service
        .serve(BufReader::new(server_read), server_write)
        .await
        .unwrap();

    let mut lines = BufReader::new(client_read).lines();
    let mut responses = Vec::new();
    for _ in 0..3 {
        let line = lines.next_line().await.unwrap().unwrap();
        responses.push(serde_json::from_str::<AdminResponse>(&line).unwrap());
    }

    assert!(responses.iter().all(|r| r.ok));
    assert_eq!(responses[1].data.as_ref().unwrap()["operation"], "status");
    assert_eq!(responses[2].data.as_ref().unwrap()["registry"]["closed"], 1);
    assert!(service.list_servers().is_empty());
}
