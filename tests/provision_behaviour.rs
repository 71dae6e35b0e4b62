//! End-to-end behaviour of the provisioning pipeline against a scripted
//! provider.

use std::time::Duration;

use rstest::{fixture, rstest};
use stratus::backend::ApiError;
use stratus::cancel::Cancellation;
use stratus::model::{
    Flavor, FlavorId, FloatingIpId, GatewayId, InstanceId, NetworkId, PortId, RoutingTableId,
    SecurityGroupId, SecurityRule, SubnetId, SubnetSpec, VpcId, VpcSpec,
};
use stratus::poller::PollSettings;
use stratus::provision::{ProvisionOrchestrator, ProvisionRequest, Step, StepError};
use stratus::test_support::{Call, Operation, ScriptedBackend};

#[fixture]
fn request() -> ProvisionRequest {
    ProvisionRequest {
        vpc_name: String::from("web-vpc"),
        vpc_cidr: String::from("10.0.0.0/16"),
        subnet_name: String::from("web-subnet"),
        subnet_cidr: String::from("10.0.1.0/24"),
        gateway_name: None,
        security_group_name: String::from("web-sg"),
        security_group_description: String::from("web and ssh"),
        security_rules: vec![
            SecurityRule::ingress_tcp(80, "0.0.0.0/0"),
            SecurityRule::ingress_tcp(22, "0.0.0.0/0"),
        ],
        instance_name: String::from("web"),
        image_ref: String::from("img-1"),
        key_name: Some(String::from("deploy")),
        fixed_ip: None,
        preferred_flavor: String::from("m2.c1m2"),
        volume_size_gb: 30,
        user_data: Some(String::from("#!/bin/bash\n")),
    }
}

fn orchestrator(backend: &ScriptedBackend) -> ProvisionOrchestrator<ScriptedBackend> {
    ProvisionOrchestrator::new(backend.clone()).with_poll_settings(PollSettings {
        interval: Duration::from_secs(10),
        timeout: Duration::from_secs(600),
    })
}

fn rejected(operation: &str) -> ApiError {
    ApiError::Rejected {
        operation: operation.to_owned(),
        status: 400,
        body: String::from("{\"error\":\"bad request\"}"),
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn full_run_reports_floating_ip_address(request: ProvisionRequest) {
    let backend = ScriptedBackend::new().with_statuses(&["BUILD", "BUILD", "ACTIVE"]);

    let report = orchestrator(&backend)
        .run(&request)
        .await
        .unwrap_or_else(|failure| panic!("run should succeed: {failure}"));

    assert_eq!(report.address, "203.0.113.5");
    assert_eq!(report.url(), "http://203.0.113.5");
    assert_eq!(report.instance_id, InstanceId::from("I1"));
    assert_eq!(report.flavor.id, FlavorId::from("F1"));
    assert!(report.resources.rule_failures.is_empty());
    assert_eq!(report.resources.rule_ids.len(), 2);

    let calls = backend.calls();
    let expected_prefix = vec![
        Call::CreateVpc(VpcSpec {
            name: String::from("web-vpc"),
            cidr: String::from("10.0.0.0/16"),
        }),
        Call::CreateSubnet(SubnetSpec {
            vpc_id: VpcId::from("V1"),
            name: String::from("web-subnet"),
            cidr: String::from("10.0.1.0/24"),
        }),
        Call::GetVpc(VpcId::from("V1")),
        Call::FindExternalNetwork,
        Call::CreateInternetGateway {
            name: String::from("web-vpc-igw"),
            network: NetworkId::from("E1"),
        },
        Call::AttachGateway {
            routing_table: RoutingTableId::from("R1"),
            gateway: GatewayId::from("G1"),
        },
        Call::CreateSecurityGroup {
            name: String::from("web-sg"),
        },
        Call::CreateSecurityGroupRule {
            group: SecurityGroupId::from("SG1"),
            rule: SecurityRule::ingress_tcp(80, "0.0.0.0/0"),
        },
        Call::CreateSecurityGroupRule {
            group: SecurityGroupId::from("SG1"),
            rule: SecurityRule::ingress_tcp(22, "0.0.0.0/0"),
        },
        Call::ListFlavors,
    ];
    assert_eq!(calls.get(..expected_prefix.len()), Some(expected_prefix.as_slice()));

    let Some(Call::CreateServer(spec)) = calls.get(expected_prefix.len()) else {
        panic!("server creation should follow flavor selection: {calls:?}");
    };
    assert_eq!(spec.flavor_id, FlavorId::from("F1"));
    assert_eq!(spec.subnet_id, SubnetId::from("S1"));

    let tail: Vec<Operation> = calls
        .iter()
        .skip(expected_prefix.len() + 1)
        .map(Call::operation)
        .collect();
    assert_eq!(
        tail,
        vec![
            Operation::GetServer,
            Operation::GetServer,
            Operation::GetServer,
            Operation::ListPorts,
            Operation::CreateFloatingIp,
            Operation::AssociateFloatingIp,
        ]
    );
    assert_eq!(
        calls.last(),
        Some(&Call::AssociateFloatingIp {
            floating_ip: FloatingIpId::from("FIP1"),
            port: PortId::from("P1"),
        })
    );
}

#[rstest]
#[tokio::test]
async fn subnet_rejection_halts_before_routing_lookup(request: ProvisionRequest) {
    let backend =
        ScriptedBackend::new().failing(Operation::CreateSubnet, rejected("create subnet"));

    let failure = orchestrator(&backend)
        .run(&request)
        .await
        .expect_err("subnet failure should stop the run");

    assert_eq!(failure.step, Step::CreateSubnet);
    assert_eq!(failure.cause, StepError::Api(rejected("create subnet")));
    assert_eq!(failure.created.vpc_id, Some(VpcId::from("V1")));
    assert_eq!(
        backend.operations(),
        vec![Operation::CreateVpc, Operation::CreateSubnet]
    );
    for operation in [
        Operation::GetVpc,
        Operation::CreateInternetGateway,
        Operation::CreateSecurityGroup,
        Operation::CreateServer,
    ] {
        assert_eq!(backend.count(operation), 0, "{operation:?} should not run");
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn error_status_stops_before_port_lookup(request: ProvisionRequest) {
    let backend = ScriptedBackend::new().with_statuses(&["BUILD", "ERROR"]);

    let failure = orchestrator(&backend)
        .run(&request)
        .await
        .expect_err("errored instance should stop the run");

    assert_eq!(failure.step, Step::AwaitActivation);
    assert!(
        matches!(failure.cause, StepError::InstanceErrored { ref instance_id, .. } if *instance_id == InstanceId::from("I1")),
        "got {:?}",
        failure.cause
    );
    assert_eq!(failure.created.instance_id, Some(InstanceId::from("I1")));
    assert_eq!(backend.count(Operation::ListPorts), 0);
    assert_eq!(backend.count(Operation::CreateFloatingIp), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn activation_timeout_is_reported_separately(request: ProvisionRequest) {
    let backend = ScriptedBackend::new().with_statuses(&["BUILD"]);
    let orchestrator = ProvisionOrchestrator::new(backend.clone()).with_poll_settings(PollSettings {
        interval: Duration::from_secs(10),
        timeout: Duration::from_secs(30),
    });

    let failure = orchestrator
        .run(&request)
        .await
        .expect_err("instance never activates");

    assert_eq!(failure.step, Step::AwaitActivation);
    let StepError::ActivationTimedOut { waited, .. } = failure.cause else {
        panic!("expected timeout, got {:?}", failure.cause);
    };
    assert!(waited >= Duration::from_secs(30));
    assert_eq!(backend.count(Operation::ListPorts), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn activation_timeout_names_last_poll_error(request: ProvisionRequest) {
    let expired = ApiError::Rejected {
        operation: String::from("get server"),
        status: 401,
        body: String::from("token expired"),
    };
    let backend = ScriptedBackend::new().with_status_results(vec![Err(expired.clone())]);
    let orchestrator = ProvisionOrchestrator::new(backend.clone()).with_poll_settings(PollSettings {
        interval: Duration::from_secs(10),
        timeout: Duration::from_secs(30),
    });

    let failure = orchestrator
        .run(&request)
        .await
        .expect_err("every status poll is refused");

    assert_eq!(failure.step, Step::AwaitActivation);
    let StepError::ActivationTimedOut { ref last_error, .. } = failure.cause else {
        panic!("expected timeout, got {:?}", failure.cause);
    };
    assert_eq!(last_error.as_deref(), Some(&expired));
    let message = failure.to_string();
    assert!(message.contains("401"), "message: {message}");
    assert!(message.contains("token expired"), "message: {message}");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn instance_without_port_is_not_found(request: ProvisionRequest) {
    let backend = ScriptedBackend::new().with_ports(Vec::new());

    let failure = orchestrator(&backend)
        .run(&request)
        .await
        .expect_err("missing port should stop the run");

    assert_eq!(failure.step, Step::ResolvePort);
    assert_eq!(
        failure.cause,
        StepError::Api(ApiError::not_found("port for instance I1"))
    );
    assert_eq!(backend.count(Operation::CreateFloatingIp), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rule_failure_does_not_stop_the_run(request: ProvisionRequest) {
    let backend =
        ScriptedBackend::new().failing_rule(1, rejected("create security group rule"));

    let report = orchestrator(&backend)
        .run(&request)
        .await
        .unwrap_or_else(|failure| panic!("run should succeed: {failure}"));

    assert_eq!(report.resources.rule_ids.len(), 1);
    let refused: Vec<&SecurityRule> = report
        .resources
        .rule_failures
        .iter()
        .map(|failure| &failure.rule)
        .collect();
    assert_eq!(refused, vec![&SecurityRule::ingress_tcp(22, "0.0.0.0/0")]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn fallback_flavor_is_first_by_name(request: ProvisionRequest) {
    let backend = ScriptedBackend::new().with_flavors(vec![
        Flavor {
            id: FlavorId::from("F-large"),
            name: String::from("m3.large"),
        },
        Flavor {
            id: FlavorId::from("F-small"),
            name: String::from("m1.small"),
        },
    ]);

    let report = orchestrator(&backend)
        .run(&request)
        .await
        .unwrap_or_else(|failure| panic!("run should succeed: {failure}"));

    assert_eq!(report.flavor.name, "m1.small");
}

#[rstest]
#[tokio::test]
async fn cancelled_run_issues_no_calls(request: ProvisionRequest) {
    let backend = ScriptedBackend::new();
    let (handle, cancellation) = Cancellation::new();
    handle.cancel();

    let failure = orchestrator(&backend)
        .with_cancellation(cancellation)
        .run(&request)
        .await
        .expect_err("cancelled run should fail");

    assert_eq!(failure.step, Step::CreateVpc);
    assert_eq!(failure.cause, StepError::Cancelled);
    assert!(backend.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_activation_wait(request: ProvisionRequest) {
    let backend = ScriptedBackend::new().with_statuses(&["BUILD"]);
    let (handle, cancellation) = Cancellation::new();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.cancel();
    });

    let failure = orchestrator(&backend)
        .with_cancellation(cancellation)
        .run(&request)
        .await
        .expect_err("cancelled run should fail");
    canceller
        .await
        .unwrap_or_else(|err| panic!("canceller task: {err}"));

    assert_eq!(failure.step, Step::AwaitActivation);
    assert_eq!(failure.cause, StepError::Cancelled);
    assert_eq!(backend.count(Operation::GetServer), 3);
    assert_eq!(backend.count(Operation::ListPorts), 0);
}
