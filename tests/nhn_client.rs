//! HTTP-level tests for the NHN backend and identity client against a local
//! one-shot responder.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use stratus::auth::{AuthError, AuthToken, Credentials, IdentityClient, TokenIssuer};
use stratus::backend::{ApiError, Backend};
use stratus::model::{
    FlavorId, InstanceId, InstanceStatus, SecurityGroupId, SecurityGroupRuleId, SecurityRule,
    ServerSpec, SubnetId, SubnetSpec, VpcId, VpcSpec,
};
use stratus::nhn::{Endpoints, NhnBackend};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use rstest::rstest;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one canned response and hands back the raw request text.
async fn respond_once(
    status_line: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind listener: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("listener addr: {err}"));
    let (sender, receiver) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.ok();
        stream.shutdown().await.ok();
        sender.send(request).ok();
    });
    (format!("http://{addr}"), receiver)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let Ok(read) = stream.read(&mut chunk).await else {
            break;
        };
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(chunk.get(..read).unwrap_or_default());
        if request_complete(&buffer) {
            break;
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn request_complete(buffer: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buffer);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= length
}

fn backend(base: &str) -> NhnBackend {
    let token = AuthToken::new(
        "token-123",
        Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("valid timestamp")),
    );
    NhnBackend::new(Endpoints::uniform(base), "tenant-1", token, TIMEOUT)
        .unwrap_or_else(|err| panic!("build backend: {err}"))
}

#[tokio::test]
async fn create_vpc_posts_body_with_token_and_reads_id() {
    let (base, request) = respond_once("201 Created", r#"{"vpc":{"id":"vpc-9","name":"web"}}"#).await;

    let vpc_id = backend(&base)
        .create_vpc(&VpcSpec {
            name: String::from("web"),
            cidr: String::from("10.0.0.0/16"),
        })
        .await
        .unwrap_or_else(|err| panic!("create vpc: {err}"));

    assert_eq!(vpc_id, VpcId::from("vpc-9"));
    let raw = request.await.unwrap_or_else(|err| panic!("request: {err}"));
    assert!(raw.starts_with("POST /v2.0/vpcs "), "request: {raw}");
    assert!(
        raw.to_ascii_lowercase().contains("x-auth-token: token-123"),
        "request: {raw}"
    );
    assert!(raw.contains(r#""cidrv4":"10.0.0.0/16""#), "request: {raw}");
}

#[tokio::test]
async fn unexpected_status_keeps_raw_body() {
    let body = r#"{"NeutronError":{"message":"Quota exceeded"}}"#;
    let (base, _request) = respond_once("409 Conflict", body).await;

    let err = backend(&base)
        .create_vpc(&VpcSpec {
            name: String::from("web"),
            cidr: String::from("10.0.0.0/16"),
        })
        .await
        .expect_err("conflict should be rejected");

    assert_eq!(
        err,
        ApiError::Rejected {
            operation: String::from("create vpc"),
            status: 409,
            body: String::from(body),
        }
    );
}

#[tokio::test]
async fn success_status_other_than_declared_is_rejected() {
    let (base, _request) = respond_once("200 OK", r#"{"vpc":{"id":"vpc-9"}}"#).await;

    let err = backend(&base)
        .create_vpc(&VpcSpec {
            name: String::from("web"),
            cidr: String::from("10.0.0.0/16"),
        })
        .await
        .expect_err("creation must answer 201");

    assert!(matches!(err, ApiError::Rejected { status: 200, .. }), "got {err:?}");
}

#[rstest]
#[case::ok("200 OK")]
#[case::created("201 Created")]
#[tokio::test]
async fn create_subnet_accepts_ok_or_created(#[case] status_line: &'static str) {
    let (base, request) = respond_once(
        status_line,
        r#"{"vpcsubnet":{"id":"S1","cidr":"10.0.1.0/24"}}"#,
    )
    .await;

    let subnet_id = backend(&base)
        .create_subnet(&SubnetSpec {
            vpc_id: VpcId::from("V1"),
            name: String::from("web-subnet"),
            cidr: String::from("10.0.1.0/24"),
        })
        .await
        .unwrap_or_else(|err| panic!("create subnet: {err}"));

    assert_eq!(subnet_id, SubnetId::from("S1"));
    let raw = request.await.unwrap_or_else(|err| panic!("request: {err}"));
    assert!(raw.starts_with("POST /v2.0/vpcsubnets "), "request: {raw}");
}

#[rstest]
#[case::ok("200 OK")]
#[case::created("201 Created")]
#[tokio::test]
async fn create_rule_accepts_ok_or_created(#[case] status_line: &'static str) {
    let (base, request) =
        respond_once(status_line, r#"{"security_group_rule":{"id":"SGR1"}}"#).await;

    let rule_id = backend(&base)
        .create_security_group_rule(
            &SecurityGroupId::from("SG1"),
            &SecurityRule::ingress_tcp(80, "0.0.0.0/0"),
        )
        .await
        .unwrap_or_else(|err| panic!("create rule: {err}"));

    assert_eq!(rule_id, SecurityGroupRuleId::from("SGR1"));
    let raw = request.await.unwrap_or_else(|err| panic!("request: {err}"));
    assert!(raw.starts_with("POST /v2.0/security-group-rules "), "request: {raw}");
}

#[tokio::test]
async fn create_subnet_rejects_accepted() {
    let (base, _request) = respond_once("202 Accepted", r#"{"vpcsubnet":{"id":"S1"}}"#).await;

    let err = backend(&base)
        .create_subnet(&SubnetSpec {
            vpc_id: VpcId::from("V1"),
            name: String::from("web-subnet"),
            cidr: String::from("10.0.1.0/24"),
        })
        .await
        .expect_err("202 is not a declared status");

    assert!(matches!(err, ApiError::Rejected { status: 202, .. }), "got {err:?}");
}

#[tokio::test]
async fn create_server_targets_tenant_path_and_expects_accepted() {
    let (base, request) = respond_once("202 Accepted", r#"{"server":{"id":"srv-1"}}"#).await;
    let spec = ServerSpec {
        name: String::from("web"),
        key_name: None,
        image_ref: String::from("img-1"),
        flavor_id: FlavorId::from("F1"),
        subnet_id: SubnetId::from("S1"),
        fixed_ip: None,
        security_group_names: vec![String::from("web-sg")],
        user_data: None,
        volume_size_gb: 30,
    };

    let instance_id = backend(&base)
        .create_server(&spec)
        .await
        .unwrap_or_else(|err| panic!("create server: {err}"));

    assert_eq!(instance_id, InstanceId::from("srv-1"));
    let raw = request.await.unwrap_or_else(|err| panic!("request: {err}"));
    assert!(raw.starts_with("POST /v2/tenant-1/servers "), "request: {raw}");
    assert!(!raw.contains("key_name"), "request: {raw}");
}

#[tokio::test]
async fn get_server_reads_status() {
    let (base, request) =
        respond_once("200 OK", r#"{"server":{"id":"srv-1","status":"BUILD"}}"#).await;

    let snapshot = backend(&base)
        .get_server(&InstanceId::from("srv-1"))
        .await
        .unwrap_or_else(|err| panic!("get server: {err}"));

    assert_eq!(snapshot.status, InstanceStatus::Building);
    let raw = request.await.unwrap_or_else(|err| panic!("request: {err}"));
    assert!(raw.starts_with("GET /v2/tenant-1/servers/srv-1 "), "request: {raw}");
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind listener: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("listener addr: {err}"));
    drop(listener);

    let err = backend(&format!("http://{addr}"))
        .find_external_network()
        .await
        .expect_err("nothing is listening");

    assert!(matches!(err, ApiError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn stalled_request_hits_the_request_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind listener: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("listener addr: {err}"));
    let server = tokio::spawn(async move {
        let accepted = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(accepted);
    });
    let token = AuthToken::new(
        "token-123",
        Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("valid timestamp")),
    );
    let backend = NhnBackend::new(
        Endpoints::uniform(&format!("http://{addr}")),
        "tenant-1",
        token,
        Duration::from_millis(200),
    )
    .unwrap_or_else(|err| panic!("build backend: {err}"));

    let instance_id = InstanceId::from("srv-1");
    let err = tokio::time::timeout(Duration::from_secs(3), backend.get_server(&instance_id))
        .await
        .unwrap_or_else(|_| panic!("request timeout was not applied"))
        .expect_err("stalled server never answers");

    assert!(matches!(err, ApiError::Transport { .. }), "got {err:?}");
    server.abort();
}

fn credentials() -> Credentials {
    Credentials {
        tenant_id: String::from("tenant-1"),
        username: String::from("operator@example.com"),
        password: String::from("api-password"),
    }
}

#[tokio::test]
async fn identity_client_issues_token() {
    let (base, request) = respond_once(
        "200 OK",
        r#"{"access":{"token":{"id":"tok-1","expires":"2099-01-01T00:00:00Z","tenant":{"id":"tenant-1"}}}}"#,
    )
    .await;
    let client = IdentityClient::with_url(format!("{base}/v2.0/tokens"), TIMEOUT)
        .unwrap_or_else(|err| panic!("build client: {err}"));

    let token = client
        .issue(&credentials())
        .await
        .unwrap_or_else(|err| panic!("issue token: {err}"));

    assert_eq!(token.secret(), "tok-1");
    let raw = request.await.unwrap_or_else(|err| panic!("request: {err}"));
    assert!(raw.starts_with("POST /v2.0/tokens "), "request: {raw}");
    assert!(raw.contains(r#""tenantId":"tenant-1""#), "request: {raw}");
    assert!(raw.contains(r#""passwordCredentials""#), "request: {raw}");
}

#[tokio::test]
async fn identity_client_surfaces_rejection() {
    let (base, _request) = respond_once("401 Unauthorized", r#"{"error":"bad credentials"}"#).await;
    let client = IdentityClient::with_url(base, TIMEOUT)
        .unwrap_or_else(|err| panic!("build client: {err}"));

    let err = client
        .issue(&credentials())
        .await
        .expect_err("credentials are refused");

    assert!(matches!(err, AuthError::Rejected { status: 401, .. }), "got {err:?}");
}
