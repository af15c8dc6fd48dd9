//! Domain data structures for bins, occupancy, reports, the funds ledger, and statistics inputs.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        $(#[$meta])*
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl $name {
            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a recycling bin.
    BinId
);
string_id!(
    /// Identifier of an app user (the person recycling, or an admin).
    UserId
);
string_id!(
    /// Identifier of a user-submitted report.
    ReportId
);
string_id!(
    /// Identifier of an admin funds ledger entry.
    TransactionId
);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Geographic position of a bin.
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("fill level {0} is outside 0..=100")]
/// Raised when a fill level percentage is out of range.
pub struct FillLevelError(pub i64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
/// How full a bin is, in percent. Zero means empty.
pub struct FillLevel(u8);

impl FillLevel {
    /// Empty bin.
    pub const EMPTY: Self = Self(0);
    /// Completely full bin.
    pub const FULL: Self = Self(100);

    /// Percentage value.
    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for FillLevel {
    type Error = FillLevelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(percent) if percent <= 100 => Ok(Self(percent)),
            _ => Err(FillLevelError(value)),
        }
    }
}

impl From<FillLevel> for i64 {
    fn from(level: FillLevel) -> Self {
        i64::from(level.0)
    }
}

impl fmt::Display for FillLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Who, if anyone, currently holds a bin.
///
/// Stores persist this as a `status` string plus a nullable `currentUser`;
/// the pair is only ever built from this type so `active` always carries a user.
pub enum Occupancy {
    /// Nobody is using the bin.
    #[default]
    Inactive,
    /// The bin is activated for `occupant`.
    Active {
        /// User currently holding the bin.
        occupant: UserId,
    },
}

impl Occupancy {
    /// Storage status string (`active` / `inactive`).
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Occupancy::Inactive => "inactive",
            Occupancy::Active { .. } => "active",
        }
    }

    /// Current occupant, if any.
    #[must_use]
    pub fn occupant(&self) -> Option<&UserId> {
        match self {
            Occupancy::Inactive => None,
            Occupancy::Active { occupant } => Some(occupant),
        }
    }

    /// Whether the bin is in use.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Occupancy::Active { .. })
    }

    /// Build an active occupancy for `user`.
    #[must_use]
    pub fn held_by(user: UserId) -> Self {
        Occupancy::Active { occupant: user }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A physical recycling collection point.
pub struct Bin {
    /// Unique identifier.
    pub id: BinId,
    /// Display name, e.g. "Mobod MRF".
    pub name: String,
    /// Coordinates once a sensor integration provides them.
    pub location: Option<GeoPoint>,
    /// Current fill level.
    #[serde(default)]
    pub level: FillLevel,
    /// Current holder of the bin.
    #[serde(default)]
    pub occupancy: Occupancy,
    /// Picture of the bin, stored as a data URL.
    pub image: Option<String>,
    /// Most recently generated QR payload, kept for reprinting.
    pub qr_data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Kind of occupancy change recorded in the audit log.
pub enum Transition {
    /// A user activated the bin.
    Activated,
    /// The occupant released the bin.
    Deactivated,
    /// An admin cleared the bin on someone else's behalf.
    ForcedRelease,
}

impl fmt::Display for Transition {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Transition::Activated => "activated",
            Transition::Deactivated => "deactivated",
            Transition::ForcedRelease => "forced_release",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Immutable record of one occupancy change.
pub struct OccupancyEvent {
    /// Bin that changed.
    pub bin_id: BinId,
    /// User that triggered the change.
    pub user_id: UserId,
    /// What happened.
    pub transition: Transition,
    /// When it happened.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Problem report submitted by an app user.
pub struct Report {
    /// Unique identifier.
    pub id: ReportId,
    /// Name of the reporting user.
    pub user_name: String,
    /// Free-text description.
    pub description: String,
    /// Free-text location given by the user.
    pub location: String,
    /// Attached photo, if any.
    pub image: Option<String>,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Direction of an admin funds movement.
pub enum TransactionKind {
    /// Money added to the admin balance.
    Add,
    /// Money withdrawn, typically paying out redeemed points.
    Withdraw,
}

impl TransactionKind {
    /// Storage tag (`add` / `withdraw`).
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            TransactionKind::Add => "add",
            TransactionKind::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One entry of the admin funds ledger.
pub struct LedgerEntry {
    /// Unique identifier.
    pub id: TransactionId,
    /// Add or withdraw.
    pub kind: TransactionKind,
    /// Positive amount in pesos.
    pub amount: Decimal,
    /// Human-readable description.
    pub description: String,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
/// Ledger entry that has not been stored yet.
pub struct NewLedgerEntry {
    /// Add or withdraw.
    pub kind: TransactionKind,
    /// Positive amount in pesos.
    pub amount: Decimal,
    /// Human-readable description.
    pub description: String,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Whether an app account is in use.
pub enum AccountStatus {
    /// Account is active.
    Active,
    /// Account is disabled or dormant.
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// App user account, read for statistics only.
pub struct UserAccount {
    /// Unique identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Account status.
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Recyclable materials accepted by EcoEarn bins.
pub enum Material {
    /// Plastic bottles and containers.
    Plastic,
    /// Tin and aluminium cans.
    TinCans,
}

impl fmt::Display for Material {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Material::Plastic => "Plastic",
            Material::TinCans => "Tin Cans",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A completed recycling deposit, read for statistics only.
pub struct RecyclingRecord {
    /// Unique identifier.
    pub id: String,
    /// Depositing user.
    pub user_id: UserId,
    /// Depositing user's display name.
    pub user_name: String,
    /// What was deposited.
    pub material: Material,
    /// Number of items (or kilograms, depending on the bin sensor).
    pub quantity: f64,
    /// Points awarded for the deposit.
    pub points: u32,
    /// When the deposit was made.
    pub recorded_at: DateTime<Utc>,
    /// Base64 profile picture of the user, if the app stored one.
    pub profile_picture: Option<String>,
}
