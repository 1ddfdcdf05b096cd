//! Worker-side dispatch loop.
//!
//! An [`Actor`] owns one [`Subdomain`] and serves one Shadow over a
//! [`Channel`]: receive a header, decode the opcode, run the matching
//! subdomain operation, reply in the shape the opcode table prescribes.
//!
//! # Failure handling
//!
//! - Unknown opcode: logged, answered with `-1`, loop continues
//! - Missing constructor, undecodable or misplaced payload, rejected
//!   operation: answered with `-1`, loop continues
//! - A request header where a payload was expected: the current request
//!   gets `-1` and the header is served next
//! - Transport failure (peer gone, corrupt stream): the loop ends with an
//!   error

use tracing::{debug, info, warn};

use ddfem_core::{
    Channel, ChannelError, ChannelExt, ClassTag, DbTag, Frame, FrameKind, Header, Matrix,
    MovableObject, Opcode, Vector, STATUS_FAILURE, STATUS_SUCCESS,
};

use crate::analysis::ComponentKind;
use crate::broker::ObjectBroker;
use crate::config::ActorConfig;
use crate::error::{DomainError, DomainResult};
use crate::model::RayleighFactors;
use crate::Subdomain;

/// Lifecycle of an [`Actor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Serving requests.
    Running,
    /// `Terminate` received and acknowledged.
    Terminated,
}

/// Dispatch loop bound to one subdomain.
pub struct Actor<C: Channel, B: ObjectBroker> {
    channel: C,
    broker: B,
    subdomain: Subdomain,
    config: ActorConfig,
    last_header: Header,
    last_result: i32,
    state: ActorState,
    pending: Option<Header>,
}

/// `[num_external, num_dof]` as wire integers, `None` if either overflows.
fn remote_sizes(num_external: usize, num_dof: usize) -> Option<[i32; 2]> {
    Some([i32::try_from(num_external).ok()?, i32::try_from(num_dof).ok()?])
}

fn status(ok: bool) -> i32 {
    if ok {
        STATUS_SUCCESS
    } else {
        STATUS_FAILURE
    }
}

impl<C: Channel, B: ObjectBroker> Actor<C, B> {
    /// Actor with an empty subdomain; the Shadow's `SetTag` names it.
    pub fn new(channel: C, broker: B, config: ActorConfig) -> Self {
        Self::with_subdomain(channel, broker, Subdomain::new(0), config)
    }

    /// Actor serving an existing subdomain.
    pub fn with_subdomain(
        channel: C,
        broker: B,
        subdomain: Subdomain,
        config: ActorConfig,
    ) -> Self {
        Self {
            channel,
            broker,
            subdomain,
            config,
            last_header: Header::default(),
            last_result: STATUS_SUCCESS,
            state: ActorState::Running,
            pending: None,
        }
    }

    /// Lifecycle state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// The served subdomain.
    pub fn subdomain(&self) -> &Subdomain {
        &self.subdomain
    }

    /// Status of the last executed operation.
    pub fn last_result(&self) -> i32 {
        self.last_result
    }

    /// Header of the last request.
    pub fn last_header(&self) -> Header {
        self.last_header
    }

    /// Serve requests until `Terminate`, then hand the subdomain back.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Channel` if the transport fails before
    /// `Terminate` arrives.
    pub async fn run(mut self) -> DomainResult<Subdomain> {
        info!(actor = %self.config.name, partition = self.subdomain.tag(), "actor started");
        while self.state == ActorState::Running {
            self.step().await?;
        }
        info!(actor = %self.config.name, partition = self.subdomain.tag(), "actor terminated");
        Ok(self.subdomain)
    }

    /// Serve exactly one request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Channel` on transport failure.
    pub async fn step(&mut self) -> DomainResult<()> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => match self.channel.recv_header().await {
                Ok(header) => header,
                Err(ChannelError::UnexpectedFrame { got, .. }) => {
                    warn!(
                        actor = %self.config.name,
                        frame = %got,
                        "stray frame where a header was expected"
                    );
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            },
        };
        self.last_header = header;

        let opcode = match header.opcode() {
            Ok(opcode) => opcode,
            Err(err) => {
                warn!(actor = %self.config.name, code = err.0, "unsupported opcode");
                return self.reply(STATUS_FAILURE);
            }
        };
        if self.config.trace_frames {
            debug!(actor = %self.config.name, %opcode, fields = ?header.fields, "dispatch");
        }
        self.dispatch(opcode, header).await
    }

    fn reply(&mut self, result: i32) -> DomainResult<()> {
        self.last_result = result;
        self.channel.send_status(result)?;
        Ok(())
    }

    fn reply_result(&mut self, opcode: Opcode, result: DomainResult<()>) -> DomainResult<()> {
        match result {
            Ok(()) => self.reply(STATUS_SUCCESS),
            Err(err) => {
                warn!(actor = %self.config.name, %opcode, error = %err, "operation failed");
                self.reply(STATUS_FAILURE)
            }
        }
    }

    /// Receive the payload frame of the current request.
    ///
    /// `None` when the frame is of another kind or fails to decode. A
    /// header in payload position is kept for the next `step`.
    async fn recv_payload(
        &mut self,
        opcode: Opcode,
        expected: FrameKind,
    ) -> DomainResult<Option<Frame>> {
        let frame = match self.channel.recv_frame().await {
            Ok(frame) => frame,
            Err(err @ ChannelError::Codec(_)) => {
                warn!(%opcode, error = %err, "bad payload");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        match frame {
            frame if frame.kind() == expected => Ok(Some(frame)),
            Frame::Header(next) => {
                warn!(%opcode, %expected, "request header where a payload was expected");
                self.pending = Some(next);
                Ok(None)
            }
            other => {
                warn!(%opcode, %expected, got = %other.kind(), "bad payload");
                Ok(None)
            }
        }
    }

    async fn recv_float_payload(&mut self, opcode: Opcode) -> DomainResult<Option<f64>> {
        match self.recv_payload(opcode, FrameKind::Float).await? {
            Some(Frame::Float(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    async fn recv_vector_payload(&mut self, opcode: Opcode) -> DomainResult<Option<Vector>> {
        match self.recv_payload(opcode, FrameKind::Vector).await? {
            Some(Frame::Vector(vector)) => Ok(Some(vector)),
            _ => Ok(None),
        }
    }

    async fn recv_matrix_payload(&mut self, opcode: Opcode) -> DomainResult<Option<Matrix>> {
        match self.recv_payload(opcode, FrameKind::Matrix).await? {
            Some(Frame::Matrix(matrix)) => Ok(Some(matrix)),
            _ => Ok(None),
        }
    }

    async fn recv_object_payload(
        &mut self,
        opcode: Opcode,
    ) -> DomainResult<Option<(ClassTag, DbTag, Vec<u8>)>> {
        match self.recv_payload(opcode, FrameKind::Object).await? {
            Some(Frame::Object {
                class_tag,
                db_tag,
                bytes,
            }) => Ok(Some((class_tag, db_tag, bytes))),
            _ => Ok(None),
        }
    }

    /// Receive an object frame and decode it into a blank instance.
    ///
    /// `None` when the payload is missing, the class tag disagrees with the
    /// header, the broker has no constructor, or decoding fails.
    async fn receive_object<T, F>(
        &mut self,
        opcode: Opcode,
        header: Header,
        make: F,
    ) -> DomainResult<Option<T>>
    where
        T: MovableObject,
        F: FnOnce(&B, ClassTag) -> Option<T>,
    {
        let Some((class_tag, db_tag, bytes)) = self.recv_object_payload(opcode).await? else {
            return Ok(None);
        };
        if class_tag != header.arg1() {
            warn!(%opcode, header = header.arg1(), frame = class_tag, "class tag mismatch");
            return Ok(None);
        }
        let Some(mut object) = make(&self.broker, class_tag) else {
            warn!(%opcode, class_tag, "no constructor for class tag");
            return Ok(None);
        };
        if let Err(err) = object.recv_self(&bytes) {
            warn!(%opcode, class_tag, error = %err, "undecodable object");
            return Ok(None);
        }
        object.set_db_tag(db_tag);
        Ok(Some(object))
    }

    async fn add_with<T, F, A>(
        &mut self,
        opcode: Opcode,
        header: Header,
        make: F,
        add: A,
    ) -> DomainResult<()>
    where
        T: MovableObject,
        F: FnOnce(&B, ClassTag) -> Option<T>,
        A: FnOnce(&mut Subdomain, T) -> bool,
    {
        let accepted = match self.receive_object(opcode, header, make).await? {
            Some(object) => add(&mut self.subdomain, object),
            None => false,
        };
        self.reply(status(accepted))
    }

    async fn set_component(
        &mut self,
        opcode: Opcode,
        header: Header,
        kind: ComponentKind,
    ) -> DomainResult<()> {
        let result = match self
            .receive_object(opcode, header, |b, tag| b.new_analysis_component(tag))
            .await?
        {
            Some(component) => self.subdomain.set_component(kind, component),
            None => Err(DomainError::NoInstance {
                class_tag: header.arg1(),
            }),
        };
        self.reply_result(opcode, result)
    }

    async fn dispatch(&mut self, opcode: Opcode, header: Header) -> DomainResult<()> {
        match opcode {
            Opcode::SetTag => {
                self.subdomain.set_tag(header.arg1());
                self.reply(STATUS_SUCCESS)
            }
            Opcode::BuildPartition => {
                let builder = self
                    .receive_object(opcode, header, |b, tag| b.new_partition_builder(tag))
                    .await?;
                self.last_result = match builder {
                    Some(builder) => match self.subdomain.build(header.arg2(), builder) {
                        Ok(()) => STATUS_SUCCESS,
                        Err(err) => {
                            warn!(
                                actor = %self.config.name,
                                error = %err,
                                "partition build failed"
                            );
                            STATUS_FAILURE
                        }
                    },
                    None => STATUS_FAILURE,
                };
                Ok(())
            }
            Opcode::GetRemoteData => {
                let (external, num_dof) = self.subdomain.remote_data();
                match remote_sizes(external.len(), num_dof) {
                    Some(sizes) => {
                        self.channel.send_ints(sizes.to_vec())?;
                        if !external.is_empty() {
                            self.channel.send_ints(external)?;
                        }
                    }
                    None => {
                        warn!(
                            actor = %self.config.name,
                            num_external = external.len(),
                            num_dof,
                            "boundary too large to report"
                        );
                        self.channel.send_ints(vec![STATUS_FAILURE, STATUS_FAILURE])?;
                    }
                }
                Ok(())
            }

            Opcode::AddElement => {
                self.add_with(opcode, header, |b, tag| b.new_element(tag), Subdomain::add_element)
                    .await
            }
            Opcode::AddNode => {
                self.add_with(opcode, header, |b, tag| b.new_node(tag), Subdomain::add_node)
                    .await
            }
            Opcode::AddExternalNode => {
                self.add_with(
                    opcode,
                    header,
                    |b, tag| b.new_node(tag),
                    |s, node| s.add_external_node(&node),
                )
                    .await
            }
            Opcode::AddSpConstraint => {
                self.add_with(
                    opcode,
                    header,
                    |b, tag| b.new_sp_constraint(tag),
                    Subdomain::add_sp_constraint,
                )
                    .await
            }
            Opcode::AddMpConstraint => {
                self.add_with(
                    opcode,
                    header,
                    |b, tag| b.new_mp_constraint(tag),
                    Subdomain::add_mp_constraint,
                )
                    .await
            }
            Opcode::AddLoadPattern => {
                self.add_with(
                    opcode,
                    header,
                    |b, tag| b.new_load_pattern(tag),
                    Subdomain::add_load_pattern,
                )
                    .await
            }
            Opcode::AddNodalLoad => {
                let pattern = header.arg3();
                self.add_with(opcode, header, |b, tag| b.new_nodal_load(tag), |s, load| {
                    s.add_nodal_load(load, pattern)
                })
                .await
            }
            Opcode::AddElementalLoad => {
                let pattern = header.arg3();
                self.add_with(opcode, header, |b, tag| b.new_elemental_load(tag), |s, load| {
                    s.add_elemental_load(load, pattern)
                })
                .await
            }
            Opcode::AddSpConstraintToPattern => {
                let pattern = header.arg3();
                self.add_with(opcode, header, |b, tag| b.new_sp_constraint(tag), |s, sp| {
                    s.add_sp_constraint_to_pattern(sp, pattern)
                })
                .await
            }

            Opcode::RemoveElement => {
                let removed = self.subdomain.remove_element(header.arg1());
                self.reply(status(removed))
            }
            Opcode::RemoveNode => {
                let removed = self.subdomain.remove_node(header.arg1());
                self.reply(status(removed))
            }
            Opcode::RemoveSpConstraint => {
                let removed = self.subdomain.remove_sp_constraint(header.arg1());
                self.reply(status(removed))
            }
            Opcode::RemoveMpConstraint => {
                let removed = self.subdomain.remove_mp_constraint(header.arg1());
                self.reply(status(removed))
            }
            Opcode::RemoveLoadPattern => {
                let removed = self.subdomain.remove_load_pattern(header.arg1());
                self.reply(status(removed))
            }
            Opcode::RemoveNodalLoad => {
                let removed = self.subdomain.remove_nodal_load(header.arg1(), header.arg2());
                self.reply(status(removed))
            }
            Opcode::RemoveElementalLoad => {
                let removed = self.subdomain.remove_elemental_load(header.arg1(), header.arg2());
                self.reply(status(removed))
            }
            Opcode::RemoveSpConstraintFromPattern => {
                let removed = self
                    .subdomain
                    .remove_sp_constraint_from_pattern(header.arg1(), header.arg2());
                self.reply(status(removed))
            }

            Opcode::HasNode => {
                let found = self.subdomain.has_node(header.arg1());
                self.reply(status(found))
            }
            Opcode::HasElement => {
                let found = self.subdomain.has_element(header.arg1());
                self.reply(status(found))
            }
            Opcode::GetElement => match self.subdomain.element(header.arg1()) {
                Some(element) => {
                    self.channel.send_status(STATUS_SUCCESS)?;
                    self.channel.send_object(element)?;
                    self.last_result = STATUS_SUCCESS;
                    Ok(())
                }
                None => self.reply(STATUS_FAILURE),
            },
            Opcode::GetNode => match self.subdomain.node(header.arg1()) {
                Some(node) => {
                    self.channel.send_status(STATUS_SUCCESS)?;
                    self.channel.send_object(node)?;
                    self.last_result = STATUS_SUCCESS;
                    Ok(())
                }
                None => self.reply(STATUS_FAILURE),
            },
            Opcode::GetNodeDisp => match self.subdomain.node_disp(header.arg1()) {
                Some(disp) => {
                    let disp = disp.clone();
                    self.channel.send_status(STATUS_SUCCESS)?;
                    self.channel.send_vector(disp)?;
                    self.last_result = STATUS_SUCCESS;
                    Ok(())
                }
                None => self.reply(STATUS_FAILURE),
            },

            Opcode::ApplyLoad => {
                let Some(time) = self.recv_float_payload(opcode).await? else {
                    return self.reply(STATUS_FAILURE);
                };
                let result = self.subdomain.apply_load(time);
                self.reply_result(opcode, result)
            }
            Opcode::SetCommittedTime => {
                let Some(time) = self.recv_float_payload(opcode).await? else {
                    return self.reply(STATUS_FAILURE);
                };
                self.subdomain.set_committed_time(time);
                self.reply(STATUS_SUCCESS)
            }
            Opcode::GetCurrentTime => {
                self.channel.send_float(self.subdomain.current_time())?;
                Ok(())
            }
            Opcode::SetLoadConstant => {
                self.subdomain.set_load_constant();
                self.reply(STATUS_SUCCESS)
            }
            Opcode::Update => {
                let result = self.subdomain.update();
                self.reply_result(opcode, result)
            }
            Opcode::Commit => {
                let result = self.subdomain.commit();
                self.reply_result(opcode, result)
            }
            Opcode::RevertToLastCommit => {
                let result = self.subdomain.revert_to_last_commit();
                self.reply_result(opcode, result)
            }
            Opcode::RevertToStart => {
                let result = self.subdomain.revert_to_start();
                self.reply_result(opcode, result)
            }
            Opcode::SetMass => {
                let Some(mass) = self.recv_matrix_payload(opcode).await? else {
                    return self.reply(STATUS_FAILURE);
                };
                let result = self.subdomain.set_mass(header.arg1(), mass);
                self.reply_result(opcode, result)
            }
            Opcode::SetRayleighFactors => {
                let Some(factors) = self.recv_vector_payload(opcode).await? else {
                    return self.reply(STATUS_FAILURE);
                };
                match RayleighFactors::from_vector(&factors) {
                    Some(factors) => {
                        self.subdomain.set_rayleigh_factors(factors);
                        self.reply(STATUS_SUCCESS)
                    }
                    None => {
                        warn!(
                            actor = %self.config.name,
                            len = factors.len(),
                            "expected four rayleigh factors"
                        );
                        self.reply(STATUS_FAILURE)
                    }
                }
            }

            Opcode::ComputeTang => {
                let result = self.subdomain.compute_tang();
                self.reply_result(opcode, result)
            }
            Opcode::ComputeResidual => {
                let result = self.subdomain.compute_residual();
                self.reply_result(opcode, result)
            }
            Opcode::GetTang => {
                let n = self.subdomain.partition().num_dof();
                let tangent = self.subdomain.tang().unwrap_or_else(|_| Matrix::zeros((n, n)));
                self.channel.send_matrix(tangent)?;
                Ok(())
            }
            Opcode::GetResistingForce => {
                let n = self.subdomain.partition().num_dof();
                let force = self.subdomain.resisting_force().unwrap_or_else(|_| Vector::zeros(n));
                self.channel.send_vector(force)?;
                Ok(())
            }
            Opcode::ComputeNodalResponse => {
                let Some(boundary) = self.recv_vector_payload(opcode).await? else {
                    return self.reply(STATUS_FAILURE);
                };
                let result = self.subdomain.compute_nodal_response(&boundary);
                self.reply_result(opcode, result)
            }
            Opcode::Print => {
                info!(actor = %self.config.name, flag = header.arg1(), "{}", self.subdomain);
                Ok(())
            }

            Opcode::AddRecorder => {
                self.add_with(opcode, header, |b, tag| b.new_recorder(tag), Subdomain::add_recorder)
                    .await
            }
            Opcode::RemoveRecorder => {
                let removed = self.subdomain.remove_recorder(header.arg1());
                self.reply(status(removed))
            }
            Opcode::RemoveRecorders => {
                self.subdomain.remove_recorders();
                self.reply(STATUS_SUCCESS)
            }

            Opcode::SetAnalysis => {
                let attached = match self
                    .receive_object(opcode, header, |b, tag| b.new_analysis(tag))
                    .await?
                {
                    Some(engine) => {
                        self.subdomain.set_analysis(engine);
                        true
                    }
                    None => false,
                };
                self.reply(status(attached))
            }
            Opcode::SetAlgorithm => {
                self.set_component(opcode, header, ComponentKind::Algorithm)
                    .await
            }
            Opcode::SetIntegrator => {
                self.set_component(opcode, header, ComponentKind::Integrator)
                    .await
            }
            Opcode::SetLinearSolver => {
                self.set_component(opcode, header, ComponentKind::LinearSolver)
                    .await
            }
            Opcode::SetConvergenceTest => {
                self.set_component(opcode, header, ComponentKind::ConvergenceTest)
                    .await
            }
            Opcode::DomainChanged => {
                let result = self.subdomain.domain_changed();
                self.reply_result(opcode, result)
            }
            Opcode::ClearAnalysis => {
                self.subdomain.clear_analysis();
                self.reply(STATUS_SUCCESS)
            }
            Opcode::WipeAnalysis => {
                self.subdomain.wipe_analysis();
                self.reply(STATUS_SUCCESS)
            }
            Opcode::NewStep => {
                let Some(dt) = self.recv_float_payload(opcode).await? else {
                    return self.reply(STATUS_FAILURE);
                };
                let result = self.subdomain.new_step(dt);
                self.reply_result(opcode, result)
            }

            Opcode::BarrierCheck => {
                let coordinator = header.arg1();
                if coordinator != STATUS_SUCCESS {
                    warn!(
                        actor = %self.config.name,
                        coordinator,
                        "coordinator reported a failed round"
                    );
                }
                self.channel.send_status(self.last_result)?;
                Ok(())
            }
            Opcode::Terminate => {
                self.state = ActorState::Terminated;
                self.last_result = STATUS_SUCCESS;
                // A dropped Shadow does not wait for the ack.
                if let Err(err) = self.channel.send_status(STATUS_SUCCESS) {
                    debug!(actor = %self.config.name, error = %err, "terminate ack not delivered");
                }
                Ok(())
            }
        }
    }
}

impl<C: Channel, B: ObjectBroker> std::fmt::Debug for Actor<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("name", &self.config.name)
            .field("partition", &self.subdomain.tag())
            .field("state", &self.state)
            .field("last_result", &self.last_result)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Registry;
    use crate::model::{class_tags, Node};
    use ddfem_core::Frame;
    use ddfem_transport::MemoryChannel;

    fn actor() -> (MemoryChannel, Actor<MemoryChannel, Registry>) {
        let (shadow_end, actor_end) = MemoryChannel::pair();
        (shadow_end, Actor::new(actor_end, Registry::new(), ActorConfig::new("test")))
    }

    #[tokio::test]
    async fn test_unknown_opcode_is_answered() {
        let (mut peer, mut actor) = actor();
        peer.send_frame(Frame::Header(Header { fields: [999, 0, 0, 0] }))
            .expect("send");

        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);
        assert_eq!(actor.state(), ActorState::Running);
        assert_eq!(actor.last_result(), STATUS_FAILURE);
    }

    #[tokio::test]
    async fn test_class_tag_mismatch_is_rejected() {
        let (mut peer, mut actor) = actor();
        let node = Node::new(1, 2, vec![0.0]);
        peer.send_header(Header::object(Opcode::AddNode, class_tags::LOAD_PATTERN, 0, 0))
            .expect("send");
        peer.send_object(&node).expect("send");

        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);
        assert!(!actor.subdomain().has_node(1));
    }

    #[tokio::test]
    async fn test_missing_payload_does_not_end_loop() {
        let (mut peer, mut actor) = actor();
        peer.send_header(Header::new(Opcode::ApplyLoad)).expect("send");
        peer.send_ints(vec![1, 2]).expect("send");

        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);

        peer.send_header(Header::new(Opcode::Terminate)).expect("send");
        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_SUCCESS);
        assert_eq!(actor.state(), ActorState::Terminated);
    }

    #[tokio::test]
    async fn test_header_in_object_position_is_served_next() {
        let (mut peer, mut actor) = actor();
        peer.send_header(Header::object(Opcode::AddNode, class_tags::NODE, 0, 0))
            .expect("send");
        peer.send_header(Header::new(Opcode::Terminate)).expect("send");

        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);
        assert_eq!(actor.state(), ActorState::Running);

        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_SUCCESS);
        assert_eq!(actor.state(), ActorState::Terminated);
        assert_eq!(actor.last_header().opcode().expect("opcode"), Opcode::Terminate);
    }

    #[tokio::test]
    async fn test_header_in_float_position_is_served_next() {
        let (mut peer, mut actor) = actor();
        peer.send_header(Header::new(Opcode::NewStep)).expect("send");
        peer.send_header(Header::with_args(Opcode::HasNode, 3, 0, 0))
            .expect("send");

        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);
        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);
        assert_eq!(actor.last_header().opcode().expect("opcode"), Opcode::HasNode);
    }

    #[test]
    fn test_remote_sizes_reject_overflow() {
        assert_eq!(remote_sizes(2, 5), Some([2, 5]));
        assert_eq!(remote_sizes(usize::MAX, 5), None);
        assert_eq!(remote_sizes(1, i32::MAX as usize + 1), None);
    }

    #[tokio::test]
    async fn test_barrier_reports_last_result() {
        let (mut peer, mut actor) = actor();
        peer.send_header(Header::new(Opcode::ComputeTang)).expect("send");
        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);

        peer.send_header(Header::with_args(Opcode::BarrierCheck, STATUS_SUCCESS, 0, 0))
            .expect("send");
        actor.step().await.expect("step");
        assert_eq!(peer.recv_status().await.expect("status"), STATUS_FAILURE);
    }

    #[tokio::test]
    async fn test_peer_gone_ends_loop_with_error() {
        let (peer, actor) = actor();
        drop(peer);
        let result = actor.run().await;
        assert!(matches!(result, Err(DomainError::Channel(ChannelError::Closed))));
    }
}
