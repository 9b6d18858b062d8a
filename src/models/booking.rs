use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Статус бронирования. Все переходы возможны только из `PendingPayment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    CancelledByCustomer,
    CancelledBySystem,
    Expired,
    StaffCancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::PendingPayment,
        BookingStatus::Confirmed,
        BookingStatus::CancelledByCustomer,
        BookingStatus::CancelledBySystem,
        BookingStatus::Expired,
        BookingStatus::StaffCancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "PendingPayment",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::CancelledByCustomer => "CancelledByCustomer",
            BookingStatus::CancelledBySystem => "CancelledBySystem",
            BookingStatus::Expired => "Expired",
            BookingStatus::StaffCancelled => "StaffCancelled",
        }
    }

    /// Места такой брони считаются занятыми.
    pub fn holds_seats(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::Confirmed)
    }

    /// Статусы, из которых сотрудник может отменить бронь.
    pub fn is_staff_cancellable(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::Expired)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Причина отмены - подмножество статусов, в которые ведёт отмена.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    CancelledByCustomer,
    CancelledBySystem,
    Expired,
    #[default]
    StaffCancelled,
}

impl CancelReason {
    pub fn status(self) -> BookingStatus {
        match self {
            CancelReason::CancelledByCustomer => BookingStatus::CancelledByCustomer,
            CancelReason::CancelledBySystem => BookingStatus::CancelledBySystem,
            CancelReason::Expired => BookingStatus::Expired,
            CancelReason::StaffCancelled => BookingStatus::StaffCancelled,
        }
    }
}

impl FromStr for CancelReason {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<BookingStatus>()? {
            BookingStatus::CancelledByCustomer => Ok(CancelReason::CancelledByCustomer),
            BookingStatus::CancelledBySystem => Ok(CancelReason::CancelledBySystem),
            BookingStatus::Expired => Ok(CancelReason::Expired),
            BookingStatus::StaffCancelled => Ok(CancelReason::StaffCancelled),
            BookingStatus::PendingPayment | BookingStatus::Confirmed => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub booking_code: String,
    pub show_id: i64,
    pub customer_id: Option<String>,
    pub status: BookingStatus,
    /// Снимок суммы на момент брони, последующие изменения цен её не трогают
    pub total_cost: i64,
    pub purchased_at: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
    pub staff_confirmed_by: Option<String>,
    pub transaction_type: String,
}

pub const QR_TRANSACTION_TYPE: &str = "QRCode";

/// Новая бронь до вставки в БД.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_code: String,
    pub show_id: i64,
    pub customer_id: String,
    pub total_cost: i64,
    pub purchased_at: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
}

/// Код брони: `BK` + последние 10 цифр метки времени в микросекундах + 3 случайные цифры.
pub fn generate_booking_code(now: DateTime<Utc>) -> String {
    let stamp = now.timestamp_micros().rem_euclid(10_000_000_000);
    let suffix = Uuid::new_v4().as_u128() % 900 + 100;
    format!("BK{stamp:010}{suffix}")
}

/// Текст, который сотрудник ищет в назначении перевода.
pub fn payment_content(booking_code: &str) -> String {
    format!("TT {booking_code}")
}
