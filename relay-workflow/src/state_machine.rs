//! Decision state machines for workflow execution.
//!
//! Every commanded action (timer, activity, child workflow, external-workflow
//! cancellation, marker, search-attribute upsert) is tracked by one state
//! machine from creation through server acknowledgement to its terminal
//! state. The server is the ground truth: an event routed to a machine in an
//! illegal source state means non-determinism or client/server drift, and is
//! raised as a panic that the task processor captures and reports as a
//! decision-task failure.

use relay_proto::shared::{
    CancelTimerDecisionAttributes, Decision, DecisionAttributes, DecisionType,
    RecordMarkerDecisionAttributes, RequestCancelActivityTaskDecisionAttributes,
    RequestCancelExternalWorkflowExecutionDecisionAttributes,
    ScheduleActivityTaskDecisionAttributes, SearchAttributes,
    StartChildWorkflowExecutionDecisionAttributes, StartTimerDecisionAttributes,
    UpsertWorkflowSearchAttributesDecisionAttributes,
};
use std::collections::HashMap;

/// Marker name used to record local activity results in history.
pub const LOCAL_ACTIVITY_MARKER_NAME: &str = "LocalActivity";

/// Marker name used to record side effect values in history.
pub const SIDE_EFFECT_MARKER_NAME: &str = "SideEffect";

/// Lifecycle states of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    /// Created locally, command not yet sent.
    Created,
    /// Command sent to the server.
    DecisionSent,
    /// Canceled after the command was sent but before the server initiated it.
    CanceledBeforeInitiated,
    /// Server acknowledged the command.
    Initiated,
    /// The remote operation started (child workflows only).
    Started,
    /// Canceled after the server initiated the operation.
    CanceledAfterInitiated,
    /// Canceled after the remote operation started (child workflows only).
    CanceledAfterStarted,
    /// Cancellation command sent to the server.
    CancellationDecisionSent,
    /// Terminal: the operation closed after a cancellation command was sent.
    CompletedAfterCancellationDecisionSent,
    /// Terminal: the operation reached its outcome.
    Completed,
}

/// Kinds of commanded actions tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    Timer,
    Activity,
    ChildWorkflow,
    Cancellation,
    Marker,
    UpsertSearchAttributes,
}

/// Identity of a decision: kind plus a stable id (timer id, activity id,
/// workflow id, cancellation id, or marker id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionId {
    pub kind: DecisionKind,
    pub id: String,
}

impl DecisionId {
    pub fn new(kind: DecisionKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

fn panic_illegal_state(msg: String) -> ! {
    panic!("{}", msg)
}

/// One decision's state machine.
pub trait DecisionStateMachine: Send {
    fn get_state(&self) -> DecisionState;
    fn get_id(&self) -> &DecisionId;
    fn is_done(&self) -> bool;

    /// The command to emit for the current state, if any.
    fn get_decision(&self) -> Option<Decision>;

    /// Local cancellation of the commanded action.
    fn cancel(&mut self);

    /// The pending command (initial or cancellation) was handed to the server.
    fn handle_decision_sent(&mut self);

    fn handle_initiated_event(&mut self);
    fn handle_initiation_failed_event(&mut self);
    fn handle_started_event(&mut self);
    fn handle_completion_event(&mut self);
    fn handle_cancel_initiated_event(&mut self);
    fn handle_canceled_event(&mut self);
    fn handle_cancel_failed_event(&mut self);
}

/// Shared state and transitions; kind-specific machines wrap this and
/// override the edges that differ.
struct DecisionStateMachineBase {
    id: DecisionId,
    state: DecisionState,
    /// Transition history kept for the illegal-transition panic message.
    history: Vec<String>,
}

impl DecisionStateMachineBase {
    fn new(id: DecisionId) -> Self {
        Self {
            id,
            state: DecisionState::Created,
            history: vec![format!("{:?}", DecisionState::Created)],
        }
    }

    fn move_state(&mut self, next: DecisionState, event: &str) {
        self.history.push(format!("{} -> {:?}", event, next));
        self.state = next;
    }

    fn fail_state_transition(&self, event: &str) -> ! {
        panic_illegal_state(format!(
            "invalid state transition: attempt to '{}' while in state {:?} for {:?}, history {:?}",
            event, self.state, self.id, self.history
        ))
    }

    fn cancel(&mut self) {
        match self.state {
            // Never sent, so nothing to undo remotely.
            DecisionState::Created => self.move_state(DecisionState::Completed, "cancel"),
            DecisionState::DecisionSent => {
                self.move_state(DecisionState::CanceledBeforeInitiated, "cancel")
            }
            DecisionState::Initiated => {
                self.move_state(DecisionState::CanceledAfterInitiated, "cancel")
            }
            _ => self.fail_state_transition("cancel"),
        }
    }

    fn handle_decision_sent(&mut self) {
        if self.state == DecisionState::Created {
            self.move_state(DecisionState::DecisionSent, "decision sent");
        }
    }

    fn handle_initiated_event(&mut self) {
        match self.state {
            DecisionState::DecisionSent => self.move_state(DecisionState::Initiated, "initiated"),
            DecisionState::CanceledBeforeInitiated => {
                self.move_state(DecisionState::CanceledAfterInitiated, "initiated")
            }
            _ => self.fail_state_transition("initiated"),
        }
    }

    fn handle_initiation_failed_event(&mut self) {
        match self.state {
            DecisionState::DecisionSent | DecisionState::Initiated => {
                self.move_state(DecisionState::Completed, "initiation failed")
            }
            _ => self.fail_state_transition("initiation failed"),
        }
    }

    fn handle_started_event(&mut self) {
        match self.state {
            DecisionState::Initiated => self.move_state(DecisionState::Started, "started"),
            _ => self.fail_state_transition("started"),
        }
    }

    fn handle_completion_event(&mut self, event: &str) {
        match self.state {
            DecisionState::Initiated | DecisionState::CanceledAfterInitiated => {
                self.move_state(DecisionState::Completed, event)
            }
            DecisionState::CancellationDecisionSent => {
                self.move_state(DecisionState::CompletedAfterCancellationDecisionSent, event)
            }
            _ => self.fail_state_transition(event),
        }
    }

    fn handle_cancel_initiated_event(&mut self) {
        match self.state {
            // Acknowledgement of the cancellation command; no state change.
            DecisionState::CancellationDecisionSent => {}
            _ => self.fail_state_transition("cancel initiated"),
        }
    }

    fn handle_canceled_event(&mut self) {
        match self.state {
            DecisionState::CancellationDecisionSent => {
                self.move_state(DecisionState::Completed, "canceled")
            }
            _ => self.fail_state_transition("canceled"),
        }
    }

    fn is_done(&self) -> bool {
        matches!(
            self.state,
            DecisionState::Completed | DecisionState::CompletedAfterCancellationDecisionSent
        )
    }
}

/// Timer decision state machine.
///
/// Timers have no Started state; a sent cancellation cannot revert the timer
/// to a running state, so `cancel failed` completes the machine.
struct TimerDecisionStateMachine {
    base: DecisionStateMachineBase,
    attributes: StartTimerDecisionAttributes,
}

impl TimerDecisionStateMachine {
    fn new(attributes: StartTimerDecisionAttributes) -> Self {
        Self {
            base: DecisionStateMachineBase::new(DecisionId::new(
                DecisionKind::Timer,
                attributes.timer_id.clone(),
            )),
            attributes,
        }
    }
}

impl DecisionStateMachine for TimerDecisionStateMachine {
    fn get_state(&self) -> DecisionState {
        self.base.state
    }

    fn get_id(&self) -> &DecisionId {
        &self.base.id
    }

    fn is_done(&self) -> bool {
        self.base.is_done()
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::StartTimer,
                attributes: Some(DecisionAttributes::StartTimer(Box::new(
                    self.attributes.clone(),
                ))),
            }),
            DecisionState::CanceledAfterInitiated => Some(Decision {
                decision_type: DecisionType::CancelTimer,
                attributes: Some(DecisionAttributes::CancelTimer(Box::new(
                    CancelTimerDecisionAttributes {
                        timer_id: self.attributes.timer_id.clone(),
                    },
                ))),
            }),
            _ => None,
        }
    }

    fn cancel(&mut self) {
        self.base.cancel();
    }

    fn handle_decision_sent(&mut self) {
        match self.base.state {
            DecisionState::CanceledAfterInitiated => self
                .base
                .move_state(DecisionState::CancellationDecisionSent, "decision sent"),
            _ => self.base.handle_decision_sent(),
        }
    }

    fn handle_initiated_event(&mut self) {
        self.base.handle_initiated_event();
    }

    fn handle_initiation_failed_event(&mut self) {
        self.base.handle_initiation_failed_event();
    }

    fn handle_started_event(&mut self) {
        self.base.fail_state_transition("started");
    }

    fn handle_completion_event(&mut self) {
        self.base.handle_completion_event("fired");
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.base.handle_cancel_initiated_event();
    }

    fn handle_canceled_event(&mut self) {
        self.base.handle_canceled_event();
    }

    fn handle_cancel_failed_event(&mut self) {
        match self.base.state {
            // The cancel raced the timer firing; either way the timer is done.
            DecisionState::CancellationDecisionSent => self
                .base
                .move_state(DecisionState::Completed, "cancel failed"),
            _ => self.base.fail_state_transition("cancel failed"),
        }
    }
}

/// Activity decision state machine.
///
/// The server treats an activity start as initiation for decision purposes,
/// so there is no Started state here.
struct ActivityDecisionStateMachine {
    base: DecisionStateMachineBase,
    attributes: ScheduleActivityTaskDecisionAttributes,
}

impl ActivityDecisionStateMachine {
    fn new(attributes: ScheduleActivityTaskDecisionAttributes) -> Self {
        Self {
            base: DecisionStateMachineBase::new(DecisionId::new(
                DecisionKind::Activity,
                attributes.activity_id.clone(),
            )),
            attributes,
        }
    }
}

impl DecisionStateMachine for ActivityDecisionStateMachine {
    fn get_state(&self) -> DecisionState {
        self.base.state
    }

    fn get_id(&self) -> &DecisionId {
        &self.base.id
    }

    fn is_done(&self) -> bool {
        self.base.is_done()
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::ScheduleActivityTask,
                attributes: Some(DecisionAttributes::ScheduleActivityTask(Box::new(
                    self.attributes.clone(),
                ))),
            }),
            DecisionState::CanceledAfterInitiated => Some(Decision {
                decision_type: DecisionType::RequestCancelActivityTask,
                attributes: Some(DecisionAttributes::RequestCancelActivityTask(Box::new(
                    RequestCancelActivityTaskDecisionAttributes {
                        activity_id: self.attributes.activity_id.clone(),
                    },
                ))),
            }),
            _ => None,
        }
    }

    fn cancel(&mut self) {
        self.base.cancel();
    }

    fn handle_decision_sent(&mut self) {
        match self.base.state {
            DecisionState::CanceledAfterInitiated => self
                .base
                .move_state(DecisionState::CancellationDecisionSent, "decision sent"),
            _ => self.base.handle_decision_sent(),
        }
    }

    fn handle_initiated_event(&mut self) {
        self.base.handle_initiated_event();
    }

    fn handle_initiation_failed_event(&mut self) {
        self.base.handle_initiation_failed_event();
    }

    fn handle_started_event(&mut self) {
        self.base.fail_state_transition("started");
    }

    fn handle_completion_event(&mut self) {
        self.base.handle_completion_event("closed");
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.base.handle_cancel_initiated_event();
    }

    fn handle_canceled_event(&mut self) {
        self.base.handle_canceled_event();
    }

    fn handle_cancel_failed_event(&mut self) {
        self.base.fail_state_transition("cancel failed");
    }
}

/// Child workflow decision state machine.
///
/// Distinguishes Initiated from Started, and reverts to Started when a
/// cancellation request fails (the child proceeds).
struct ChildWorkflowDecisionStateMachine {
    base: DecisionStateMachineBase,
    attributes: StartChildWorkflowExecutionDecisionAttributes,
}

impl ChildWorkflowDecisionStateMachine {
    fn new(attributes: StartChildWorkflowExecutionDecisionAttributes) -> Self {
        Self {
            base: DecisionStateMachineBase::new(DecisionId::new(
                DecisionKind::ChildWorkflow,
                attributes.workflow_id.clone(),
            )),
            attributes,
        }
    }
}

impl DecisionStateMachine for ChildWorkflowDecisionStateMachine {
    fn get_state(&self) -> DecisionState {
        self.base.state
    }

    fn get_id(&self) -> &DecisionId {
        &self.base.id
    }

    fn is_done(&self) -> bool {
        self.base.is_done()
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::StartChildWorkflowExecution,
                attributes: Some(DecisionAttributes::StartChildWorkflowExecution(Box::new(
                    self.attributes.clone(),
                ))),
            }),
            DecisionState::CanceledAfterInitiated | DecisionState::CanceledAfterStarted => {
                Some(Decision {
                    decision_type: DecisionType::RequestCancelExternalWorkflowExecution,
                    attributes: Some(DecisionAttributes::RequestCancelExternalWorkflowExecution(
                        Box::new(RequestCancelExternalWorkflowExecutionDecisionAttributes {
                            namespace: self.attributes.namespace.clone(),
                            workflow_id: self.attributes.workflow_id.clone(),
                            run_id: String::new(),
                            control: String::new(),
                            child_workflow_only: true,
                        }),
                    )),
                })
            }
            _ => None,
        }
    }

    fn cancel(&mut self) {
        match self.base.state {
            DecisionState::Started => self
                .base
                .move_state(DecisionState::CanceledAfterStarted, "cancel"),
            _ => self.base.cancel(),
        }
    }

    fn handle_decision_sent(&mut self) {
        match self.base.state {
            DecisionState::CanceledAfterInitiated | DecisionState::CanceledAfterStarted => self
                .base
                .move_state(DecisionState::CancellationDecisionSent, "decision sent"),
            _ => self.base.handle_decision_sent(),
        }
    }

    fn handle_initiated_event(&mut self) {
        self.base.handle_initiated_event();
    }

    fn handle_initiation_failed_event(&mut self) {
        self.base.handle_initiation_failed_event();
    }

    fn handle_started_event(&mut self) {
        self.base.handle_started_event();
    }

    fn handle_completion_event(&mut self) {
        match self.base.state {
            DecisionState::Started | DecisionState::CanceledAfterStarted => {
                self.base.move_state(DecisionState::Completed, "closed")
            }
            _ => self.base.handle_completion_event("closed"),
        }
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.base.handle_cancel_initiated_event();
    }

    fn handle_canceled_event(&mut self) {
        self.base.handle_canceled_event();
    }

    fn handle_cancel_failed_event(&mut self) {
        match self.base.state {
            // The child could not be canceled and keeps running.
            DecisionState::CancellationDecisionSent => self
                .base
                .move_state(DecisionState::Started, "cancel failed"),
            _ => self.base.fail_state_transition("cancel failed"),
        }
    }
}

/// External-workflow cancellation state machine.
///
/// Emit-and-acknowledge only: Created -> DecisionSent -> Initiated ->
/// Completed, where both the success and the failure acknowledgement
/// complete the machine. Any acknowledgement after Completed is a
/// programmer error.
struct CancelExternalWorkflowDecisionStateMachine {
    base: DecisionStateMachineBase,
    attributes: RequestCancelExternalWorkflowExecutionDecisionAttributes,
}

impl CancelExternalWorkflowDecisionStateMachine {
    fn new(
        attributes: RequestCancelExternalWorkflowExecutionDecisionAttributes,
        cancellation_id: &str,
    ) -> Self {
        Self {
            base: DecisionStateMachineBase::new(DecisionId::new(
                DecisionKind::Cancellation,
                cancellation_id,
            )),
            attributes,
        }
    }
}

impl DecisionStateMachine for CancelExternalWorkflowDecisionStateMachine {
    fn get_state(&self) -> DecisionState {
        self.base.state
    }

    fn get_id(&self) -> &DecisionId {
        &self.base.id
    }

    fn is_done(&self) -> bool {
        self.base.is_done()
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(Decision {
                decision_type: DecisionType::RequestCancelExternalWorkflowExecution,
                attributes: Some(DecisionAttributes::RequestCancelExternalWorkflowExecution(
                    Box::new(self.attributes.clone()),
                )),
            }),
            _ => None,
        }
    }

    fn cancel(&mut self) {
        self.base.fail_state_transition("cancel");
    }

    fn handle_decision_sent(&mut self) {
        self.base.handle_decision_sent();
    }

    fn handle_initiated_event(&mut self) {
        self.base.handle_initiated_event();
    }

    fn handle_initiation_failed_event(&mut self) {
        self.base.fail_state_transition("initiation failed");
    }

    fn handle_started_event(&mut self) {
        self.base.fail_state_transition("started");
    }

    fn handle_completion_event(&mut self) {
        match self.base.state {
            DecisionState::Initiated => self.base.move_state(DecisionState::Completed, "closed"),
            _ => self.base.fail_state_transition("closed"),
        }
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.base.fail_state_transition("cancel initiated");
    }

    fn handle_canceled_event(&mut self) {
        self.base.fail_state_transition("canceled");
    }

    fn handle_cancel_failed_event(&mut self) {
        self.base.fail_state_transition("cancel failed");
    }
}

/// Emit-only state machine for markers and search-attribute upserts: no
/// server acknowledgement is awaited, so sending the command completes it.
struct CompleteOnSendStateMachine {
    base: DecisionStateMachineBase,
    decision: Decision,
}

impl CompleteOnSendStateMachine {
    fn new(id: DecisionId, decision: Decision) -> Self {
        Self {
            base: DecisionStateMachineBase::new(id),
            decision,
        }
    }
}

impl DecisionStateMachine for CompleteOnSendStateMachine {
    fn get_state(&self) -> DecisionState {
        self.base.state
    }

    fn get_id(&self) -> &DecisionId {
        &self.base.id
    }

    fn is_done(&self) -> bool {
        self.base.is_done()
    }

    fn get_decision(&self) -> Option<Decision> {
        match self.base.state {
            DecisionState::Created => Some(self.decision.clone()),
            _ => None,
        }
    }

    fn cancel(&mut self) {
        self.base.fail_state_transition("cancel");
    }

    fn handle_decision_sent(&mut self) {
        if self.base.state == DecisionState::Created {
            self.base
                .move_state(DecisionState::Completed, "decision sent");
        }
    }

    fn handle_initiated_event(&mut self) {
        self.base.fail_state_transition("initiated");
    }

    fn handle_initiation_failed_event(&mut self) {
        self.base.fail_state_transition("initiation failed");
    }

    fn handle_started_event(&mut self) {
        self.base.fail_state_transition("started");
    }

    fn handle_completion_event(&mut self) {
        self.base.fail_state_transition("closed");
    }

    fn handle_cancel_initiated_event(&mut self) {
        self.base.fail_state_transition("cancel initiated");
    }

    fn handle_canceled_event(&mut self) {
        self.base.fail_state_transition("canceled");
    }

    fn handle_cancel_failed_event(&mut self) {
        self.base.fail_state_transition("cancel failed");
    }
}

/// Registry of decision state machines for one workflow, with the ordered
/// emission queue and event-to-machine routing.
///
/// Single-reader single-writer within one decision task; external
/// synchronization is the caller's responsibility.
pub struct DecisionsHelper {
    decisions: HashMap<DecisionId, Box<dyn DecisionStateMachine>>,
    /// Emission order. Canceling an entry moves it to the back so its
    /// cancellation command is emitted after commands created before the
    /// cancel call.
    ordered_ids: Vec<DecisionId>,
    /// Event id the server will assign to the next decision produced by this
    /// task; seeded from the decision-started event id so marker ids are
    /// stable across replay.
    next_decision_event_id: i64,
    scheduled_event_id_to_activity_id: HashMap<i64, String>,
    initiated_event_id_to_cancellation_id: HashMap<i64, String>,
}

impl DecisionsHelper {
    pub fn new() -> Self {
        Self {
            decisions: HashMap::new(),
            ordered_ids: Vec::new(),
            next_decision_event_id: 0,
            scheduled_event_id_to_activity_id: HashMap::new(),
            initiated_event_id_to_cancellation_id: HashMap::new(),
        }
    }

    /// Seed the id source for this decision cycle. The server assigns the
    /// next decision's event id right after the started event's completion
    /// record, hence the +2. Must be called before any marker-creating call
    /// within the cycle.
    pub fn set_current_decision_started_event_id(&mut self, started_event_id: i64) {
        self.next_decision_event_id = started_event_id + 2;
    }

    /// The event id the server will assign to the next decision.
    pub fn get_next_id(&self) -> i64 {
        self.next_decision_event_id
    }

    fn add_decision(&mut self, machine: Box<dyn DecisionStateMachine>) -> DecisionId {
        let id = machine.get_id().clone();
        if self.decisions.contains_key(&id) {
            panic_illegal_state(format!("adding duplicate decision {:?}", id));
        }
        self.ordered_ids.push(id.clone());
        self.decisions.insert(id.clone(), machine);
        // Every decision consumes one server-side event id.
        self.next_decision_event_id += 1;
        id
    }

    /// Panics when the id is unknown: receiving an event for an untracked
    /// decision is client/server drift.
    pub fn get_decision(&mut self, id: &DecisionId) -> &mut dyn DecisionStateMachine {
        match self.decisions.get_mut(id) {
            Some(machine) => machine.as_mut(),
            None => panic_illegal_state(format!("unable to find decision {:?}", id)),
        }
    }

    fn move_decision_to_back(&mut self, id: &DecisionId) {
        self.ordered_ids.retain(|existing| existing != id);
        self.ordered_ids.push(id.clone());
    }

    // ---- creation operations ----

    pub fn start_timer(&mut self, attributes: StartTimerDecisionAttributes) -> DecisionId {
        self.add_decision(Box::new(TimerDecisionStateMachine::new(attributes)))
    }

    pub fn schedule_activity_task(
        &mut self,
        scheduled_event_id: i64,
        attributes: ScheduleActivityTaskDecisionAttributes,
    ) -> DecisionId {
        self.scheduled_event_id_to_activity_id
            .insert(scheduled_event_id, attributes.activity_id.clone());
        self.add_decision(Box::new(ActivityDecisionStateMachine::new(attributes)))
    }

    pub fn start_child_workflow_execution(
        &mut self,
        attributes: StartChildWorkflowExecutionDecisionAttributes,
    ) -> DecisionId {
        self.add_decision(Box::new(ChildWorkflowDecisionStateMachine::new(attributes)))
    }

    pub fn record_side_effect_marker(
        &mut self,
        side_effect_id: i64,
        details: Vec<u8>,
    ) -> DecisionId {
        let marker_id = format!("{}_{}", SIDE_EFFECT_MARKER_NAME, side_effect_id);
        let decision = Decision {
            decision_type: DecisionType::RecordMarker,
            attributes: Some(DecisionAttributes::RecordMarker(Box::new(
                RecordMarkerDecisionAttributes {
                    marker_name: SIDE_EFFECT_MARKER_NAME.to_string(),
                    details: Some(details),
                    header: None,
                },
            ))),
        };
        self.add_decision(Box::new(CompleteOnSendStateMachine::new(
            DecisionId::new(DecisionKind::Marker, marker_id),
            decision,
        )))
    }

    pub fn record_local_activity_marker(
        &mut self,
        activity_id: &str,
        details: Vec<u8>,
    ) -> DecisionId {
        let marker_id = format!("{}_{}", LOCAL_ACTIVITY_MARKER_NAME, activity_id);
        let decision = Decision {
            decision_type: DecisionType::RecordMarker,
            attributes: Some(DecisionAttributes::RecordMarker(Box::new(
                RecordMarkerDecisionAttributes {
                    marker_name: LOCAL_ACTIVITY_MARKER_NAME.to_string(),
                    details: Some(details),
                    header: None,
                },
            ))),
        };
        self.add_decision(Box::new(CompleteOnSendStateMachine::new(
            DecisionId::new(DecisionKind::Marker, marker_id),
            decision,
        )))
    }

    pub fn upsert_search_attributes(
        &mut self,
        upsert_id: &str,
        attributes: SearchAttributes,
    ) -> DecisionId {
        let decision = Decision {
            decision_type: DecisionType::UpsertWorkflowSearchAttributes,
            attributes: Some(DecisionAttributes::UpsertWorkflowSearchAttributes(Box::new(
                UpsertWorkflowSearchAttributesDecisionAttributes {
                    search_attributes: Some(attributes),
                },
            ))),
        };
        self.add_decision(Box::new(CompleteOnSendStateMachine::new(
            DecisionId::new(DecisionKind::UpsertSearchAttributes, upsert_id),
            decision,
        )))
    }

    /// Cancel a workflow we did not start (`child_workflow_only == false`,
    /// tracked by cancellation id) or a child workflow started by this
    /// workflow (`child_workflow_only == true`, routed through the existing
    /// child machine; the cancellation id is unused on the wire).
    pub fn request_cancel_external_workflow_execution(
        &mut self,
        namespace: &str,
        workflow_id: &str,
        run_id: &str,
        cancellation_id: &str,
        child_workflow_only: bool,
    ) -> DecisionId {
        if child_workflow_only {
            let id = DecisionId::new(DecisionKind::ChildWorkflow, workflow_id);
            self.get_decision(&id).cancel();
            self.move_decision_to_back(&id);
            return id;
        }
        let attributes = RequestCancelExternalWorkflowExecutionDecisionAttributes {
            namespace: namespace.to_string(),
            workflow_id: workflow_id.to_string(),
            run_id: run_id.to_string(),
            control: cancellation_id.to_string(),
            child_workflow_only: false,
        };
        self.add_decision(Box::new(CancelExternalWorkflowDecisionStateMachine::new(
            attributes,
            cancellation_id,
        )))
    }

    // ---- local cancellation ----

    pub fn cancel_timer(&mut self, timer_id: &str) {
        let id = DecisionId::new(DecisionKind::Timer, timer_id);
        self.get_decision(&id).cancel();
        self.move_decision_to_back(&id);
    }

    pub fn request_cancel_activity_task(&mut self, activity_id: &str) {
        let id = DecisionId::new(DecisionKind::Activity, activity_id);
        self.get_decision(&id).cancel();
        self.move_decision_to_back(&id);
    }

    // ---- timer history events ----

    pub fn handle_timer_started(&mut self, timer_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Timer, timer_id))
            .handle_initiated_event();
    }

    pub fn handle_timer_closed(&mut self, timer_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Timer, timer_id))
            .handle_completion_event();
    }

    pub fn handle_timer_canceled(&mut self, timer_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Timer, timer_id))
            .handle_canceled_event();
    }

    pub fn handle_cancel_timer_failed(&mut self, timer_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Timer, timer_id))
            .handle_cancel_failed_event();
    }

    // ---- activity history events ----

    pub fn handle_activity_task_scheduled(&mut self, scheduled_event_id: i64, activity_id: &str) {
        if !self
            .scheduled_event_id_to_activity_id
            .contains_key(&scheduled_event_id)
        {
            panic_illegal_state(format!(
                "lookup failed for scheduled event id {} (activity id {})",
                scheduled_event_id, activity_id
            ));
        }
        self.get_decision(&DecisionId::new(DecisionKind::Activity, activity_id))
            .handle_initiated_event();
    }

    pub fn handle_activity_task_closed(&mut self, activity_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Activity, activity_id))
            .handle_completion_event();
    }

    pub fn handle_activity_task_cancel_requested(&mut self, activity_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Activity, activity_id))
            .handle_cancel_initiated_event();
    }

    pub fn handle_activity_task_canceled(&mut self, activity_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::Activity, activity_id))
            .handle_canceled_event();
    }

    // ---- child workflow history events ----

    pub fn handle_start_child_workflow_execution_initiated(&mut self, workflow_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
            .handle_initiated_event();
    }

    pub fn handle_start_child_workflow_execution_failed(&mut self, workflow_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
            .handle_initiation_failed_event();
    }

    pub fn handle_child_workflow_execution_started(&mut self, workflow_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
            .handle_started_event();
    }

    pub fn handle_child_workflow_execution_closed(&mut self, workflow_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
            .handle_completion_event();
    }

    pub fn handle_child_workflow_execution_canceled(&mut self, workflow_id: &str) {
        self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
            .handle_canceled_event();
    }

    // ---- external cancellation history events ----

    /// An empty cancellation id (the `control` field of the initiated event)
    /// identifies a cancellation that targets a child workflow.
    fn is_cancel_event_for_child_workflow(cancellation_id: &str) -> bool {
        cancellation_id.is_empty()
    }

    pub fn handle_request_cancel_external_workflow_execution_initiated(
        &mut self,
        initiated_event_id: i64,
        workflow_id: &str,
        cancellation_id: &str,
    ) {
        if Self::is_cancel_event_for_child_workflow(cancellation_id) {
            self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
                .handle_cancel_initiated_event();
        } else {
            self.initiated_event_id_to_cancellation_id
                .insert(initiated_event_id, cancellation_id.to_string());
            self.get_decision(&DecisionId::new(DecisionKind::Cancellation, cancellation_id))
                .handle_initiated_event();
        }
    }

    pub fn handle_external_workflow_execution_cancel_requested(
        &mut self,
        initiated_event_id: i64,
        workflow_id: &str,
    ) {
        match self
            .initiated_event_id_to_cancellation_id
            .get(&initiated_event_id)
            .cloned()
        {
            Some(cancellation_id) => {
                self.get_decision(&DecisionId::new(
                    DecisionKind::Cancellation,
                    cancellation_id,
                ))
                .handle_completion_event();
            }
            // Cancellation of a child workflow; the child machine stays in
            // CancellationDecisionSent until the child actually closes.
            None => {
                self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
                    .handle_cancel_initiated_event();
            }
        }
    }

    pub fn handle_request_cancel_external_workflow_execution_failed(
        &mut self,
        initiated_event_id: i64,
        workflow_id: &str,
    ) {
        match self
            .initiated_event_id_to_cancellation_id
            .get(&initiated_event_id)
            .cloned()
        {
            // Failure completes an external cancellation the same way success
            // does; the caller learns the outcome from the event itself.
            Some(cancellation_id) => {
                self.get_decision(&DecisionId::new(
                    DecisionKind::Cancellation,
                    cancellation_id,
                ))
                .handle_completion_event();
            }
            None => {
                self.get_decision(&DecisionId::new(DecisionKind::ChildWorkflow, workflow_id))
                    .handle_cancel_failed_event();
            }
        }
    }

    // ---- emission ----

    /// Drain pending commands in emission order. With `mark_as_sent`, every
    /// machine observes that its pending command was handed to the server;
    /// without it the list is returned untouched (peek).
    pub fn get_decisions(&mut self, mark_as_sent: bool) -> Vec<Decision> {
        let mut result = Vec::new();
        for id in &self.ordered_ids {
            let machine = self
                .decisions
                .get_mut(id)
                .unwrap_or_else(|| panic_illegal_state(format!("unable to find decision {:?}", id)));
            if let Some(decision) = machine.get_decision() {
                result.push(decision);
            }
            if mark_as_sent {
                machine.handle_decision_sent();
            }
        }
        result
    }

    /// True when every tracked decision reached a terminal state.
    pub fn all_done(&self) -> bool {
        self.decisions.values().all(|machine| machine.is_done())
    }
}

impl Default for DecisionsHelper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{catch_panic, PanicError};

    fn timer_attributes(timer_id: &str) -> StartTimerDecisionAttributes {
        StartTimerDecisionAttributes {
            timer_id: timer_id.to_string(),
            start_to_fire_timeout_seconds: 10,
        }
    }

    fn activity_attributes(activity_id: &str) -> ScheduleActivityTaskDecisionAttributes {
        ScheduleActivityTaskDecisionAttributes {
            activity_id: activity_id.to_string(),
            ..Default::default()
        }
    }

    fn child_attributes(workflow_id: &str) -> StartChildWorkflowExecutionDecisionAttributes {
        StartChildWorkflowExecutionDecisionAttributes {
            workflow_id: workflow_id.to_string(),
            ..Default::default()
        }
    }

    fn run_and_catch_panic(f: impl FnOnce()) -> Option<PanicError> {
        catch_panic(f).err()
    }

    fn state(h: &mut DecisionsHelper, id: &DecisionId) -> DecisionState {
        h.get_decision(id).get_state()
    }

    #[test]
    fn timer_cancel_before_sent() {
        let timer_id = "test-timer-1";
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes(timer_id));
        assert_eq!(state(&mut h, &d), DecisionState::Created);
        h.cancel_timer(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 0);
    }

    #[test]
    fn timer_cancel_after_initiated() {
        let timer_id = "test-timer-1";
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes(timer_id));
        assert_eq!(state(&mut h, &d), DecisionState::Created);
        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::DecisionSent);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type, DecisionType::StartTimer);
        h.handle_timer_started(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);
        h.cancel_timer(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterInitiated);
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type, DecisionType::CancelTimer);
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);
        h.handle_timer_canceled(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
    }

    #[test]
    fn timer_completed_after_cancel() {
        let timer_id = "test-timer-1";
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes(timer_id));
        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::DecisionSent);
        assert_eq!(decisions.len(), 1);
        h.cancel_timer(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledBeforeInitiated);
        assert_eq!(h.get_decisions(true).len(), 0);
        h.handle_timer_started(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterInitiated);
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type, DecisionType::CancelTimer);
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);
        h.handle_timer_closed(timer_id);
        assert_eq!(
            state(&mut h, &d),
            DecisionState::CompletedAfterCancellationDecisionSent
        );
    }

    #[test]
    fn timer_complete_without_cancel() {
        let timer_id = "test-timer-1";
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes(timer_id));
        h.get_decisions(true);
        h.handle_timer_started(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);
        assert_eq!(h.get_decisions(false).len(), 0);
        h.handle_timer_closed(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
    }

    #[test]
    fn timer_panic_on_invalid_state_transition() {
        let timer_id = "test-timer-1";
        let mut h = DecisionsHelper::new();
        h.start_timer(timer_attributes(timer_id));
        h.get_decisions(true);
        h.handle_timer_started(timer_id);
        h.handle_timer_closed(timer_id);

        let panic_err = run_and_catch_panic(|| h.handle_cancel_timer_failed(timer_id));
        assert!(panic_err.is_some());
    }

    #[test]
    fn timer_cancel_failed_completes_pending_cancellation() {
        let timer_id = "test-timer-1";
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes(timer_id));
        h.get_decisions(true);
        h.handle_timer_started(timer_id);
        h.cancel_timer(timer_id);
        h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);
        h.handle_cancel_timer_failed(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
    }

    #[test]
    fn marker_ordered_before_timer_cancel() {
        let timer_id = "test-timer-1";
        let local_activity_id = "test-activity-1";
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes(timer_id));
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type, DecisionType::StartTimer);
        h.handle_timer_started(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);
        let m = h.record_local_activity_marker(local_activity_id, Vec::new());
        assert_eq!(state(&mut h, &m), DecisionState::Created);
        h.cancel_timer(timer_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterInitiated);
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].decision_type, DecisionType::RecordMarker);
        assert_eq!(decisions[1].decision_type, DecisionType::CancelTimer);
    }

    #[test]
    fn activity_complete_without_cancel() {
        let activity_id = "test-activity-1";
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);

        let schedule_id = h.get_next_id();
        let d = h.schedule_activity_task(schedule_id, activity_attributes(activity_id));
        assert_eq!(state(&mut h, &d), DecisionState::Created);
        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::DecisionSent);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::ScheduleActivityTask
        );

        h.handle_activity_task_scheduled(schedule_id, activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);

        h.handle_activity_task_closed(activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
    }

    #[test]
    fn activity_cancel_before_sent() {
        let activity_id = "test-activity-1";
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);

        let schedule_id = h.get_next_id();
        let d = h.schedule_activity_task(schedule_id, activity_attributes(activity_id));
        assert_eq!(state(&mut h, &d), DecisionState::Created);

        // Canceling before the decision is sent completes the machine directly.
        h.request_cancel_activity_task(activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
        assert_eq!(h.get_decisions(true).len(), 0);
    }

    #[test]
    fn activity_cancel_after_sent() {
        let activity_id = "test-activity-1";
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);

        let schedule_id = h.get_next_id();
        let d = h.schedule_activity_task(schedule_id, activity_attributes(activity_id));
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::ScheduleActivityTask
        );

        h.request_cancel_activity_task(activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledBeforeInitiated);
        assert_eq!(h.get_decisions(true).len(), 0);

        h.handle_activity_task_scheduled(schedule_id, activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterInitiated);
        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::RequestCancelActivityTask
        );

        h.handle_activity_task_canceled(activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
        assert_eq!(h.get_decisions(false).len(), 0);
    }

    #[test]
    fn activity_completed_after_cancel() {
        let activity_id = "test-activity-1";
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);

        let schedule_id = h.get_next_id();
        let d = h.schedule_activity_task(schedule_id, activity_attributes(activity_id));
        assert_eq!(h.get_decisions(true).len(), 1);

        h.request_cancel_activity_task(activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledBeforeInitiated);
        assert_eq!(h.get_decisions(true).len(), 0);

        h.handle_activity_task_scheduled(schedule_id, activity_id);
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterInitiated);
        assert_eq!(h.get_decisions(true).len(), 1);

        h.handle_activity_task_closed(activity_id);
        assert_eq!(
            state(&mut h, &d),
            DecisionState::CompletedAfterCancellationDecisionSent
        );
        assert_eq!(h.get_decisions(false).len(), 0);
    }

    #[test]
    fn activity_panic_on_invalid_state_transition() {
        let activity_id = "test-activity-1";
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);

        let schedule_id = h.get_next_id();
        h.schedule_activity_task(schedule_id, activity_attributes(activity_id));

        // Unknown activity id panics on lookup.
        let err = run_and_catch_panic(|| h.handle_activity_task_closed("invalid-activity-id"));
        assert!(err.is_some());

        h.get_decisions(true);
        h.handle_activity_task_scheduled(schedule_id, activity_id);

        // Canceled without a cancellation decision in flight is illegal.
        let err = run_and_catch_panic(|| h.handle_activity_task_canceled(activity_id));
        assert!(err.is_some());
    }

    #[test]
    fn child_workflow_basic() {
        let workflow_id = "test-child-workflow-1";
        let mut h = DecisionsHelper::new();

        let d = h.start_child_workflow_execution(child_attributes(workflow_id));
        assert_eq!(state(&mut h, &d), DecisionState::Created);

        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::DecisionSent);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::StartChildWorkflowExecution
        );

        h.handle_start_child_workflow_execution_initiated(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);
        assert_eq!(h.get_decisions(true).len(), 0);

        h.handle_child_workflow_execution_started(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Started);
        assert_eq!(h.get_decisions(true).len(), 0);

        h.handle_child_workflow_execution_closed(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
        assert_eq!(h.get_decisions(true).len(), 0);
    }

    #[test]
    fn child_workflow_cancel_succeed() {
        let namespace = "test-namespace";
        let workflow_id = "test-child-workflow";
        let cancellation_id = "";
        let initiated_event_id = 28;
        let mut h = DecisionsHelper::new();

        let d = h.start_child_workflow_execution(child_attributes(workflow_id));
        h.get_decisions(true);
        h.handle_start_child_workflow_execution_initiated(workflow_id);
        h.handle_child_workflow_execution_started(workflow_id);

        h.request_cancel_external_workflow_execution(
            namespace,
            workflow_id,
            "",
            cancellation_id,
            true,
        );
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterStarted);

        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::RequestCancelExternalWorkflowExecution
        );

        h.handle_request_cancel_external_workflow_execution_initiated(
            initiated_event_id,
            workflow_id,
            cancellation_id,
        );
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);

        h.handle_external_workflow_execution_cancel_requested(initiated_event_id, workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);

        h.handle_child_workflow_execution_canceled(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
    }

    #[test]
    fn child_workflow_invalid_states() {
        let namespace = "test-namespace";
        let workflow_id = "test-workflow-id";
        let cancellation_id = "";
        let initiated_event_id = 28;
        let mut h = DecisionsHelper::new();

        let d = h.start_child_workflow_execution(child_attributes(workflow_id));
        assert_eq!(state(&mut h, &d), DecisionState::Created);

        // Start failed before the decision was sent.
        let err =
            run_and_catch_panic(|| h.handle_start_child_workflow_execution_failed(workflow_id));
        assert!(err.is_some());

        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::DecisionSent);
        assert_eq!(decisions.len(), 1);

        // Completed before it was initiated.
        let err = run_and_catch_panic(|| h.handle_child_workflow_execution_closed(workflow_id));
        assert!(err.is_some());

        h.handle_start_child_workflow_execution_initiated(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);

        h.handle_child_workflow_execution_started(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Started);

        // Cancel failed before any cancel request was sent.
        let err = run_and_catch_panic(|| {
            h.handle_request_cancel_external_workflow_execution_failed(
                initiated_event_id,
                workflow_id,
            )
        });
        assert!(err.is_some());

        h.request_cancel_external_workflow_execution(
            namespace,
            workflow_id,
            "",
            cancellation_id,
            true,
        );
        assert_eq!(state(&mut h, &d), DecisionState::CanceledAfterStarted);

        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::RequestCancelExternalWorkflowExecution
        );

        // Start failed after it already started.
        let err =
            run_and_catch_panic(|| h.handle_start_child_workflow_execution_failed(workflow_id));
        assert!(err.is_some());

        // Initiated a second time.
        let err =
            run_and_catch_panic(|| h.handle_start_child_workflow_execution_initiated(workflow_id));
        assert!(err.is_some());

        h.handle_request_cancel_external_workflow_execution_initiated(
            initiated_event_id,
            workflow_id,
            cancellation_id,
        );
        assert_eq!(state(&mut h, &d), DecisionState::CancellationDecisionSent);

        h.handle_child_workflow_execution_closed(workflow_id);
        assert_eq!(
            state(&mut h, &d),
            DecisionState::CompletedAfterCancellationDecisionSent
        );

        // Canceled after it completed.
        let err = run_and_catch_panic(|| h.handle_child_workflow_execution_canceled(workflow_id));
        assert!(err.is_some());
    }

    #[test]
    fn child_workflow_cancel_failed() {
        let namespace = "test-namespace";
        let workflow_id = "test-workflow-id";
        let cancellation_id = "";
        let initiated_event_id = 28;
        let mut h = DecisionsHelper::new();

        let d = h.start_child_workflow_execution(child_attributes(workflow_id));
        h.get_decisions(true);
        h.handle_start_child_workflow_execution_initiated(workflow_id);
        h.handle_child_workflow_execution_started(workflow_id);
        h.request_cancel_external_workflow_execution(
            namespace,
            workflow_id,
            "",
            cancellation_id,
            true,
        );
        h.get_decisions(true);
        h.handle_request_cancel_external_workflow_execution_initiated(
            initiated_event_id,
            workflow_id,
            cancellation_id,
        );

        // The cancel request failed; the child keeps running.
        h.handle_request_cancel_external_workflow_execution_failed(
            initiated_event_id,
            workflow_id,
        );
        assert_eq!(state(&mut h, &d), DecisionState::Started);

        h.handle_child_workflow_execution_closed(workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
    }

    #[test]
    fn marker_state_machine() {
        let mut h = DecisionsHelper::new();

        let d = h.record_side_effect_marker(1, b"side-effect-value".to_vec());
        assert_eq!(state(&mut h, &d), DecisionState::Created);

        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type, DecisionType::RecordMarker);
        assert!(h.all_done());
    }

    #[test]
    fn upsert_search_attributes_state_machine() {
        let mut h = DecisionsHelper::new();

        let d = h.upsert_search_attributes("1", SearchAttributes::default());
        assert_eq!(state(&mut h, &d), DecisionState::Created);

        let decisions = h.get_decisions(true);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::UpsertWorkflowSearchAttributes
        );
    }

    #[test]
    fn cancel_external_workflow_succeed() {
        let namespace = "test-namespace";
        let workflow_id = "test-workflow-id";
        let run_id = "test-run-id";
        let cancellation_id = "1";
        let initiated_event_id = 28;
        let mut h = DecisionsHelper::new();

        let d = h.request_cancel_external_workflow_execution(
            namespace,
            workflow_id,
            run_id,
            cancellation_id,
            false,
        );
        assert!(!h.get_decision(&d).is_done());
        assert_eq!(state(&mut h, &d), DecisionState::Created);

        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::RequestCancelExternalWorkflowExecution
        );
        match decisions[0].attributes.as_ref().unwrap() {
            DecisionAttributes::RequestCancelExternalWorkflowExecution(attrs) => {
                assert_eq!(attrs.namespace, namespace);
                assert_eq!(attrs.workflow_id, workflow_id);
                assert_eq!(attrs.run_id, run_id);
                assert_eq!(attrs.control, cancellation_id);
                assert!(!attrs.child_workflow_only);
            }
            other => panic!("unexpected attributes: {:?}", other),
        }

        h.handle_request_cancel_external_workflow_execution_initiated(
            initiated_event_id,
            workflow_id,
            cancellation_id,
        );
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);

        h.handle_external_workflow_execution_cancel_requested(initiated_event_id, workflow_id);
        assert_eq!(state(&mut h, &d), DecisionState::Completed);

        // A failure acknowledgement after success is drift.
        let err = run_and_catch_panic(|| {
            h.handle_request_cancel_external_workflow_execution_failed(
                initiated_event_id,
                workflow_id,
            )
        });
        assert!(err.is_some());
    }

    #[test]
    fn cancel_external_workflow_failed() {
        let namespace = "test-namespace";
        let workflow_id = "test-workflow-id";
        let run_id = "test-run-id";
        let cancellation_id = "2";
        let initiated_event_id = 28;
        let mut h = DecisionsHelper::new();

        let d = h.request_cancel_external_workflow_execution(
            namespace,
            workflow_id,
            run_id,
            cancellation_id,
            false,
        );
        assert!(!h.get_decision(&d).is_done());

        let decisions = h.get_decisions(true);
        assert_eq!(decisions.len(), 1);
        assert_eq!(
            decisions[0].decision_type,
            DecisionType::RequestCancelExternalWorkflowExecution
        );

        h.handle_request_cancel_external_workflow_execution_initiated(
            initiated_event_id,
            workflow_id,
            cancellation_id,
        );
        assert_eq!(state(&mut h, &d), DecisionState::Initiated);

        h.handle_request_cancel_external_workflow_execution_failed(
            initiated_event_id,
            workflow_id,
        );
        assert_eq!(state(&mut h, &d), DecisionState::Completed);

        // A success acknowledgement after failure is drift.
        let err = run_and_catch_panic(|| {
            h.handle_external_workflow_execution_cancel_requested(initiated_event_id, workflow_id)
        });
        assert!(err.is_some());
    }

    #[test]
    fn first_drain_emits_in_creation_order() {
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);
        h.start_timer(timer_attributes("t1"));
        let schedule_id = h.get_next_id();
        h.schedule_activity_task(schedule_id, activity_attributes("a1"));
        h.record_local_activity_marker("la1", Vec::new());
        h.start_child_workflow_execution(child_attributes("c1"));

        let decisions = h.get_decisions(true);
        let kinds: Vec<DecisionType> = decisions.iter().map(|d| d.decision_type).collect();
        assert_eq!(
            kinds,
            vec![
                DecisionType::StartTimer,
                DecisionType::ScheduleActivityTask,
                DecisionType::RecordMarker,
                DecisionType::StartChildWorkflowExecution,
            ]
        );
    }

    #[test]
    fn drain_leaves_nothing_in_created() {
        let mut h = DecisionsHelper::new();
        h.set_current_decision_started_event_id(3);
        let t = h.start_timer(timer_attributes("t1"));
        let m = h.record_side_effect_marker(1, Vec::new());
        let schedule_id = h.get_next_id();
        let a = h.schedule_activity_task(schedule_id, activity_attributes("a1"));

        h.get_decisions(true);
        assert_eq!(state(&mut h, &t), DecisionState::DecisionSent);
        assert_eq!(state(&mut h, &m), DecisionState::Completed);
        assert_eq!(state(&mut h, &a), DecisionState::DecisionSent);
        assert!(!h.all_done());
        // Second drain is empty: everything already went out.
        assert_eq!(h.get_decisions(true).len(), 0);
    }

    #[test]
    fn peek_does_not_transition() {
        let mut h = DecisionsHelper::new();
        let d = h.start_timer(timer_attributes("t1"));
        let peeked = h.get_decisions(false);
        assert_eq!(peeked.len(), 1);
        assert_eq!(state(&mut h, &d), DecisionState::Created);
    }

    #[test]
    fn duplicate_decision_id_panics() {
        let mut h = DecisionsHelper::new();
        h.start_timer(timer_attributes("t1"));
        let err = run_and_catch_panic(|| {
            h.start_timer(timer_attributes("t1"));
        });
        assert!(err.is_some());
    }

    #[test]
    fn marker_ids_stable_across_replay() {
        let mut first = DecisionsHelper::new();
        first.set_current_decision_started_event_id(7);
        let a = first.get_next_id();
        first.record_side_effect_marker(a, Vec::new());
        let b = first.get_next_id();

        let mut replay = DecisionsHelper::new();
        replay.set_current_decision_started_event_id(7);
        let a2 = replay.get_next_id();
        replay.record_side_effect_marker(a2, Vec::new());
        let b2 = replay.get_next_id();

        assert_eq!(a, a2);
        assert_eq!(b, b2);
    }
}
