//! Board engine: lane partitioning and drag-and-drop status transitions.
//!
//! The board has five fixed lanes, one per `TaskStatus`, in display order. A drag
//! moves through a small state machine:
//!
//! ```text
//! Idle ── start_drag ──▶ Dragging(task)
//!   ▲                        │
//!   ├──── end_drag: lane ────┤  (move_task called exactly once)
//!   ├──── end_drag: no lane ─┤  (no mutation)
//!   └──── cancel_drag ───────┘  (no mutation)
//! ```
//!
//! Drop targets are resolved through the `DropTargetResolver` capability, so the state
//! machine does not care whether a drop came from the keyboard (container metadata) or
//! the mouse (geometric hit test against lane rectangles).

use ratatui::layout::{Position, Rect};

use crate::fields::TaskStatus;
use crate::task::Task;

/// A board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub status: TaskStatus,
    pub title: &'static str,
}

/// The five lanes in display order.
pub const LANES: [Lane; 5] = [
    Lane { status: TaskStatus::Backlog, title: "Backlog" },
    Lane { status: TaskStatus::Todo, title: "To Do" },
    Lane { status: TaskStatus::InProgress, title: "In Progress" },
    Lane { status: TaskStatus::InReview, title: "In Review" },
    Lane { status: TaskStatus::Done, title: "Done" },
];

/// The stable-order subsequence of `tasks` whose status is `status`.
pub fn tasks_for_lane<'a, I>(tasks: I, status: TaskStatus) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().filter(|t| t.status == status).collect()
}

/// A filtered task list partitioned into lanes. Every input task lands in exactly one lane.
#[derive(Debug, Default)]
pub struct Board<'a> {
    lanes: [Vec<&'a Task>; 5],
}

impl<'a> Board<'a> {
    pub fn partition<I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let tasks: Vec<&'a Task> = tasks.into_iter().collect();
        Board {
            lanes: LANES.map(|lane| tasks_for_lane(tasks.iter().copied(), lane.status)),
        }
    }

    pub fn lane(&self, status: TaskStatus) -> &[&'a Task] {
        &self.lanes[status.index()]
    }

    /// Lanes with their tasks, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&Lane, &[&'a Task])> + '_ {
        LANES.iter().map(move |lane| (lane, self.lane(lane.status)))
    }

    /// Total number of tasks across all lanes.
    pub fn len(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lane and row of a task, if it is on the board.
    pub fn locate(&self, task_id: &str) -> Option<(TaskStatus, usize)> {
        LANES.iter().find_map(|lane| {
            self.lane(lane.status)
                .iter()
                .position(|t| t.id == task_id)
                .map(|row| (lane.status, row))
        })
    }
}

/// The single status mutation the board is allowed to request.
pub trait TaskMover {
    /// Set the status of `task_id`. Returns whether a task was changed.
    fn move_task(&mut self, task_id: &str, status: TaskStatus) -> bool;
}

/// Where a drag currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { task_id: String, origin: TaskStatus },
}

/// What the gesture layer knows at the moment of release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropEvent {
    /// Lane reported by the drop container, when the gesture source has one.
    pub container: Option<TaskStatus>,
    /// Pointer position at release, when the gesture came from a pointer.
    pub pointer: Option<Position>,
}

impl DropEvent {
    pub fn on_container(status: TaskStatus) -> Self {
        DropEvent { container: Some(status), pointer: None }
    }

    pub fn at(column: u16, row: u16) -> Self {
        DropEvent { container: None, pointer: Some(Position::new(column, row)) }
    }
}

/// Resolves a drop to some lane or to no lane. Never fails.
pub trait DropTargetResolver {
    fn resolve_drop_target(&self, event: &DropEvent) -> Option<TaskStatus>;
}

/// Trusts the container metadata attached to the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerMetadata;

impl DropTargetResolver for ContainerMetadata {
    fn resolve_drop_target(&self, event: &DropEvent) -> Option<TaskStatus> {
        event.container
    }
}

/// Geometric hit test of the pointer against the lane rectangles from the last render.
#[derive(Debug, Clone, Default)]
pub struct LaneHitTest {
    bounds: Vec<(TaskStatus, Rect)>,
}

impl LaneHitTest {
    pub fn new(bounds: Vec<(TaskStatus, Rect)>) -> Self {
        LaneHitTest { bounds }
    }
}

impl DropTargetResolver for LaneHitTest {
    // Overlapping rectangles resolve to the first lane in display order.
    fn resolve_drop_target(&self, event: &DropEvent) -> Option<TaskStatus> {
        let pointer = event.pointer?;
        LANES.iter().map(|lane| lane.status).find(|status| {
            self.bounds
                .iter()
                .any(|(s, rect)| s == status && rect.contains(pointer))
        })
    }
}

/// Try `primary`, then `fallback`.
#[derive(Debug, Clone, Default)]
pub struct Fallback<A, B> {
    pub primary: A,
    pub fallback: B,
}

impl<A, B> Fallback<A, B> {
    pub fn new(primary: A, fallback: B) -> Self {
        Fallback { primary, fallback }
    }
}

impl<A: DropTargetResolver, B: DropTargetResolver> DropTargetResolver for Fallback<A, B> {
    fn resolve_drop_target(&self, event: &DropEvent) -> Option<TaskStatus> {
        self.primary
            .resolve_drop_target(event)
            .or_else(|| self.fallback.resolve_drop_target(event))
    }
}

/// The standard resolver: container metadata first, then lane geometry.
pub fn default_resolver(bounds: Vec<(TaskStatus, Rect)>) -> Fallback<ContainerMetadata, LaneHitTest> {
    Fallback::new(ContainerMetadata, LaneHitTest::new(bounds))
}

/// Result of ending a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The drop resolved to a lane and the store was asked to move the task.
    Moved { task_id: String, from: TaskStatus, to: TaskStatus },
    /// The drop landed outside every lane; nothing changed.
    NoTarget { task_id: String },
    /// The drop resolved to a lane but the store no longer holds the task.
    Missing { task_id: String },
    /// No drag was in progress.
    NotDragging,
}

/// Drag controller for one board.
#[derive(Debug, Default)]
pub struct BoardEngine {
    drag: DragState,
}

impl BoardEngine {
    pub fn new() -> Self {
        BoardEngine::default()
    }

    pub fn state(&self) -> &DragState {
        &self.drag
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn dragged_task(&self) -> Option<&str> {
        match &self.drag {
            DragState::Dragging { task_id, .. } => Some(task_id),
            DragState::Idle => None,
        }
    }

    /// Pick up `task`. Starting while already dragging replaces the previous drag.
    pub fn start_drag(&mut self, task: &Task) {
        if let DragState::Dragging { task_id, .. } = &self.drag {
            tracing::debug!(previous = %task_id, "drag replaced before drop");
        }
        tracing::debug!(task = %task.id, origin = %task.status, "drag started");
        self.drag = DragState::Dragging {
            task_id: task.id.clone(),
            origin: task.status,
        };
    }

    /// Abandon the drag without mutating anything.
    pub fn cancel_drag(&mut self) {
        if let DragState::Dragging { task_id, .. } = std::mem::take(&mut self.drag) {
            tracing::debug!(task = %task_id, "drag cancelled");
        }
    }

    /// Release the dragged task. On a resolved lane `mover` is called exactly once;
    /// otherwise nothing is mutated. The engine is idle afterwards in every case.
    pub fn end_drag<R, M>(&mut self, event: &DropEvent, resolver: &R, mover: &mut M) -> DropOutcome
    where
        R: DropTargetResolver + ?Sized,
        M: TaskMover + ?Sized,
    {
        let DragState::Dragging { task_id, origin } = std::mem::take(&mut self.drag) else {
            return DropOutcome::NotDragging;
        };
        match resolver.resolve_drop_target(event) {
            Some(to) if mover.move_task(&task_id, to) => DropOutcome::Moved { task_id, from: origin, to },
            Some(_) => {
                tracing::warn!(task = %task_id, "dropped task is no longer in the store");
                DropOutcome::Missing { task_id }
            }
            None => {
                tracing::debug!(task = %task_id, "drop outside any lane");
                DropOutcome::NoTarget { task_id }
            }
        }
    }
}
