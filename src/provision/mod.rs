//! End-to-end provisioning of a web server in a fresh VPC.
//!
//! The pipeline is the ordered list in [`Step::ALL`]. Each step reads the
//! handles it needs from a [`ProvisionContext`] and returns a [`StepOutput`]
//! that is folded back into the context. The first failing step stops the run;
//! resources created before it are reported, not removed.

mod context;
mod error;
mod step;

use tracing::{info, warn};

use crate::backend::{ApiError, Backend};
use crate::cancel::Cancellation;
use crate::flavor::select_flavor;
use crate::model::{
    Flavor, InstanceId, SecurityGroupId, SecurityRule, ServerSpec, SubnetSpec, VpcSpec,
};
use crate::poller::{ActivationPoller, PollOutcome, PollSettings, ServerStatusProbe};
use crate::ports::resolve_port;
use crate::user_data::encode_user_data;

pub use context::{ProvisionContext, RuleFailure};
pub use error::{ProvisionFailure, StepError};
pub use step::{Step, StepOutput};

/// Desired shape of the provisioned environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// VPC name.
    pub vpc_name: String,
    /// VPC CIDR block.
    pub vpc_cidr: String,
    /// Subnet name.
    pub subnet_name: String,
    /// Subnet CIDR block, inside the VPC range.
    pub subnet_cidr: String,
    /// Internet gateway name; `<vpc_name>-igw` when absent.
    pub gateway_name: Option<String>,
    /// Security group name.
    pub security_group_name: String,
    /// Security group description.
    pub security_group_description: String,
    /// Rules added to the security group, in order.
    pub security_rules: Vec<SecurityRule>,
    /// Instance name.
    pub instance_name: String,
    /// Boot image identifier.
    pub image_ref: String,
    /// Key pair injected into the instance.
    pub key_name: Option<String>,
    /// Fixed address on the subnet.
    pub fixed_ip: Option<String>,
    /// Flavor name preferred by the selection policy.
    pub preferred_flavor: String,
    /// Boot volume size in gigabytes.
    pub volume_size_gb: u32,
    /// Startup script in plain text; encoded before it is sent.
    pub user_data: Option<String>,
}

impl ProvisionRequest {
    /// Gateway name, defaulting to `<vpc_name>-igw`.
    #[must_use]
    pub fn gateway_name(&self) -> String {
        self.gateway_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("{}-igw", self.vpc_name), str::to_owned)
    }
}

/// Outcome of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionReport {
    /// Public address bound to the instance.
    pub address: String,
    /// Provisioned instance.
    pub instance_id: InstanceId,
    /// Flavor the instance runs on.
    pub flavor: Flavor,
    /// Every handle produced by the run, including refused rules.
    pub resources: ProvisionContext,
}

impl ProvisionReport {
    /// Address as an HTTP URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }
}

/// Runs the provisioning pipeline against a [`Backend`].
#[derive(Debug)]
pub struct ProvisionOrchestrator<B> {
    backend: B,
    poll: PollSettings,
    cancellation: Cancellation,
}

impl<B: Backend> ProvisionOrchestrator<B> {
    /// Creates an orchestrator with default poll settings and no
    /// cancellation.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            poll: PollSettings::default(),
            cancellation: Cancellation::never(),
        }
    }

    /// Overrides the activation poll cadence and deadline.
    #[must_use]
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Observes `cancellation` between steps and while waiting for
    /// activation.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Runs every step in order and reports the reachable address.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionFailure`] naming the first step that failed, along
    /// with every handle created before it.
    pub async fn run(&self, request: &ProvisionRequest) -> Result<ProvisionReport, ProvisionFailure> {
        let mut context = ProvisionContext::default();
        for step in Step::ALL {
            if self.cancellation.is_cancelled() {
                return Err(Self::failure(step, StepError::Cancelled, context));
            }
            info!(step = %step, "starting");
            match self.run_step(step, request, &context).await {
                Ok(output) => {
                    context.record(output);
                    info!(step = %step, "done");
                }
                Err(cause) => {
                    warn!(step = %step, error = %cause, "step failed; stopping");
                    return Err(Self::failure(step, cause, context));
                }
            }
        }
        Self::report(context)
    }

    /// Executes a single step against `context` without recording its
    /// output.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::MissingHandle`] when a handle the step depends on
    /// is absent, or the error raised by the step's operation.
    pub async fn run_step(
        &self,
        step: Step,
        request: &ProvisionRequest,
        context: &ProvisionContext,
    ) -> Result<StepOutput, StepError> {
        let output = match step {
            Step::CreateVpc => {
                let spec = VpcSpec {
                    name: request.vpc_name.clone(),
                    cidr: request.vpc_cidr.clone(),
                };
                StepOutput::Vpc(self.backend.create_vpc(&spec).await?)
            }
            Step::CreateSubnet => {
                let spec = SubnetSpec {
                    vpc_id: context.require_vpc()?.clone(),
                    name: request.subnet_name.clone(),
                    cidr: request.subnet_cidr.clone(),
                };
                StepOutput::Subnet(self.backend.create_subnet(&spec).await?)
            }
            Step::ResolveRoutingTable => {
                let vpc_id = context.require_vpc()?;
                let subnet_id = context.require_subnet()?;
                let details = self.backend.get_vpc(vpc_id).await?;
                let table = details
                    .routing_table_for(subnet_id)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found(format!("routing table for vpc {vpc_id}")))?;
                StepOutput::RoutingTable(table)
            }
            Step::ResolveExternalNetwork => {
                StepOutput::ExternalNetwork(self.backend.find_external_network().await?)
            }
            Step::CreateInternetGateway => {
                let network_id = context.require_external_network()?;
                let name = request.gateway_name();
                StepOutput::Gateway(self.backend.create_internet_gateway(&name, network_id).await?)
            }
            Step::AttachGateway => {
                let table = context.require_routing_table()?;
                let gateway = context.require_gateway()?;
                self.backend.attach_gateway(table, gateway).await?;
                StepOutput::GatewayAttached
            }
            Step::CreateSecurityGroup => StepOutput::SecurityGroup(
                self.backend
                    .create_security_group(
                        &request.security_group_name,
                        &request.security_group_description,
                    )
                    .await?,
            ),
            Step::CreateSecurityRules => {
                let group = context.require_security_group()?;
                self.create_rules(group, &request.security_rules).await
            }
            Step::SelectFlavor => {
                let flavors = self.backend.list_flavors().await?;
                let flavor = select_flavor(&flavors, &request.preferred_flavor)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("flavor"))?;
                info!(flavor = %flavor.name, id = %flavor.id, "selected flavor");
                StepOutput::Flavor(flavor)
            }
            Step::CreateInstance => {
                context.require_security_group()?;
                let spec = ServerSpec {
                    name: request.instance_name.clone(),
                    key_name: request.key_name.clone(),
                    image_ref: request.image_ref.clone(),
                    flavor_id: context.require_flavor()?.id.clone(),
                    subnet_id: context.require_subnet()?.clone(),
                    fixed_ip: request.fixed_ip.clone(),
                    security_group_names: vec![request.security_group_name.clone()],
                    user_data: request.user_data.as_deref().map(encode_user_data),
                    volume_size_gb: request.volume_size_gb,
                };
                StepOutput::Instance(self.backend.create_server(&spec).await?)
            }
            Step::AwaitActivation => {
                let instance_id = context.require_instance()?;
                self.await_activation(instance_id).await?
            }
            Step::ResolvePort => {
                let instance_id = context.require_instance()?;
                StepOutput::Port(resolve_port(&self.backend, instance_id).await?)
            }
            Step::AllocateFloatingIp => {
                let network_id = context.require_external_network()?;
                StepOutput::FloatingIp(self.backend.create_floating_ip(network_id).await?)
            }
            Step::AssociateFloatingIp => {
                let floating_ip = context.require_floating_ip()?;
                let port_id = context.require_port()?;
                self.backend
                    .associate_floating_ip(&floating_ip.id, port_id)
                    .await?;
                StepOutput::FloatingIpAssociated
            }
        };
        Ok(output)
    }

    async fn create_rules(
        &self,
        group: &SecurityGroupId,
        rules: &[SecurityRule],
    ) -> StepOutput {
        let mut created = Vec::with_capacity(rules.len());
        let mut failed = Vec::new();
        for rule in rules {
            match self.backend.create_security_group_rule(group, rule).await {
                Ok(id) => created.push(id),
                Err(error) => {
                    warn!(rule = %rule, error = %error, "security rule was not created");
                    failed.push(RuleFailure {
                        rule: rule.clone(),
                        error,
                    });
                }
            }
        }
        StepOutput::SecurityRules { created, failed }
    }

    async fn await_activation(&self, instance_id: &InstanceId) -> Result<StepOutput, StepError> {
        let poller = ActivationPoller::new(ServerStatusProbe::new(&self.backend), self.poll);
        match poller.wait(instance_id, &self.cancellation).await {
            PollOutcome::Active(snapshot) => Ok(StepOutput::Activated(snapshot)),
            PollOutcome::Failed { reason } => Err(StepError::InstanceErrored {
                instance_id: instance_id.clone(),
                reason,
            }),
            PollOutcome::TimedOut {
                elapsed,
                last_status,
                last_error,
            } => Err(StepError::ActivationTimedOut {
                instance_id: instance_id.clone(),
                waited: elapsed,
                last_status,
                last_error: last_error.map(Box::new),
            }),
            PollOutcome::Cancelled => Err(StepError::Cancelled),
        }
    }

    fn failure(step: Step, cause: StepError, context: ProvisionContext) -> ProvisionFailure {
        ProvisionFailure {
            step,
            cause,
            created: Box::new(context),
        }
    }

    fn report(context: ProvisionContext) -> Result<ProvisionReport, ProvisionFailure> {
        match summarise(&context) {
            Ok((address, instance_id, flavor)) => Ok(ProvisionReport {
                address,
                instance_id,
                flavor,
                resources: context,
            }),
            Err(cause) => Err(Self::failure(Step::AssociateFloatingIp, cause, context)),
        }
    }
}

fn summarise(context: &ProvisionContext) -> Result<(String, InstanceId, Flavor), StepError> {
    if !context.floating_ip_associated {
        return Err(StepError::MissingHandle("floating ip association"));
    }
    let address = context.require_floating_ip()?.ip_address.clone();
    let instance_id = context.require_instance()?.clone();
    let flavor = context.require_flavor()?.clone();
    Ok((address, instance_id, flavor))
}
