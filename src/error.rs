//! Engine-level status codes.
//!
//! A typed enum rather than an `anyhow`-style opaque error: callers branch
//! on these (`send_get_final_status`, `task_get_status`'s siblings), so the
//! variant set is part of the public contract, not incidental detail.

use core::fmt;

/// Outcome of an engine API call or a finished task.
///
/// No variant here represents a radio driver wired up with missing
/// function pointers — that failure mode doesn't exist once the radio is
/// a statically-typed [`crate::phy::Radio`] implementation checked at
/// compile time; see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Status {
    /// Call succeeded, or task completed successfully.
    Ok,
    /// `device_init` failed to bring the radio up.
    DeviceNotRegistered,
    /// A send was attempted with `len > MAX_PAYLOAD`.
    SendDataLenAboveLimit,
    /// The radio driver returned a non-zero status from `device_send`.
    SendIo,
    /// `(len == 0) xor (payload == null)` or another malformed argument.
    SendBadArguments,
    /// The retransmission schedule ran out before an ACK arrived.
    SendNoAckRcvd,
    /// A task was created and is running.
    TaskCreatedOk,
    /// The task pool is full.
    UnableToCreateTask,
    /// No task exists with the given id.
    UnknownTaskId,
    /// The task is still in-flight; nothing to report yet.
    TaskUnderway,
    /// A receive task's deadline elapsed before a frame arrived.
    Timeout,
    /// Catch-all for states that should be unreachable.
    Undefined,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::DeviceNotRegistered => "DEVICE_NOT_REGISTERED",
            Status::SendDataLenAboveLimit => "SEND_DATA_LEN_ABOVE_LIMIT",
            Status::SendIo => "SEND_IO",
            Status::SendBadArguments => "SEND_BAD_ARGUMENTS",
            Status::SendNoAckRcvd => "SEND_NO_ACK_RCVD",
            Status::TaskCreatedOk => "TASK_CREATED_OK",
            Status::UnableToCreateTask => "UNABLE_TO_CREATE_TASK",
            Status::UnknownTaskId => "UNKNOWN_TASKID",
            Status::TaskUnderway => "TASK_UNDERWAY",
            Status::Timeout => "TIMEOUT",
            Status::Undefined => "UNDEFINED",
        };
        f.write_str(name)
    }
}
