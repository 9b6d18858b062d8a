pub mod booking;
pub mod seat;
pub mod show;
pub mod user;

pub use booking::{Booking, BookingStatus, CancelReason};
pub use seat::{LockedSeat, SeatMapEntry, SeatPosition, ShowSeat};
pub use show::{Movie, Room, Show};
pub use user::{Capability, Role, User};
